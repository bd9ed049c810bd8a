//! The stateful bundle instance.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;

use crate::config::{BundleConfig, BundlerKind, InputSource};
use crate::engine::{engine_for, resolve::normalize, Bundler};
use crate::error::{BundleError, ConfigError, Result};
use crate::event::{BundleEvent, BundleId, EventSender};
use crate::output::{BuildOutput, OutputFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleStatus {
    Idle,
    Building,
    Writing,
    Error,
}

/// One configured bundler invocation.
///
/// `files` starts out as the entry inputs and is replaced by the engine's
/// dependency set after every successful build. A failed build leaves it at
/// the last successful set.
pub struct Bundle {
    id: BundleId,
    kind: BundlerKind,
    engine: Box<dyn Bundler>,
    events: EventSender,
    config: Option<BundleConfig>,
    status: BundleStatus,
    files: IndexSet<PathBuf>,
    last_output: Option<BuildOutput>,
}

impl std::fmt::Debug for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("files", &self.files.len())
            .finish_non_exhaustive()
    }
}

impl Bundle {
    /// A bundle backed by the built-in engine for `kind`.
    pub fn new(kind: BundlerKind, events: EventSender) -> Self {
        Self::with_engine(engine_for(kind), events)
    }

    pub fn with_engine(engine: Box<dyn Bundler>, events: EventSender) -> Self {
        Self {
            id: BundleId::next(),
            kind: engine.kind(),
            engine,
            events,
            config: None,
            status: BundleStatus::Idle,
            files: IndexSet::new(),
            last_output: None,
        }
    }

    pub fn id(&self) -> BundleId {
        self.id
    }

    pub fn kind(&self) -> BundlerKind {
        self.kind
    }

    pub fn status(&self) -> BundleStatus {
        self.status
    }

    pub fn config(&self) -> Option<&BundleConfig> {
        self.config.as_ref()
    }

    /// Absolute paths this bundle currently depends on.
    pub fn files(&self) -> &IndexSet<PathBuf> {
        &self.files
    }

    pub fn last_output(&self) -> Option<&BuildOutput> {
        self.last_output.as_ref()
    }

    /// Resolved output path, once set up.
    pub fn output(&self) -> Option<PathBuf> {
        let base = self.config.as_ref()?.base();
        base.output.as_deref().map(|o| base.resolve(o))
    }

    /// The input reference carried by build events.
    pub fn input_label(&self) -> String {
        self.config
            .as_ref()
            .map(|c| {
                c.base()
                    .input
                    .iter()
                    .map(InputSource::describe)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default()
    }

    /// Validate and freeze `config`. Calling it again re-validates and
    /// replaces the frozen configuration.
    pub fn setup(&mut self, config: BundleConfig) -> Result<(), ConfigError> {
        if config.kind() != self.kind {
            return Err(ConfigError::InvalidValue {
                field: "kind".to_string(),
                value: config.kind().to_string(),
                hint: format!("This bundle runs the {} engine", self.kind),
            });
        }
        config.validate()?;

        if self.last_output.is_none() {
            let base = config.base();
            self.files = base
                .input_files()
                .map(|p| normalize(&base.resolve(p)))
                .collect();
        }

        tracing::debug!(bundle = %self.id, kind = %self.kind, "bundle configured");
        self.config = Some(config);
        Ok(())
    }

    /// Run the engine. An empty `invalidated` list asks for a full build.
    pub async fn build(&mut self, invalidated: &[PathBuf]) -> Result<()> {
        let Some(config) = self.config.as_ref() else {
            return Err(BundleError::NotSetUp);
        };

        let input = self.input_label();
        let inline_code = config
            .base()
            .input
            .iter()
            .find_map(|i| i.inline_code().map(str::to_string));

        self.status = BundleStatus::Building;
        self.events.emit(
            self.id,
            BundleEvent::BuildStart {
                input: input.clone(),
                inline_code: inline_code.clone(),
                child: None,
            },
        );

        match self.engine.build(config, invalidated).await {
            Ok(output) => {
                for message in &output.warnings {
                    self.events.emit(
                        self.id,
                        BundleEvent::Warn {
                            message: message.clone(),
                        },
                    );
                }
                for child in &output.children {
                    for event in [
                        BundleEvent::BuildStart {
                            input: input.clone(),
                            inline_code: None,
                            child: Some(child.clone()),
                        },
                        BundleEvent::BuildEnd {
                            input: input.clone(),
                            inline_code: None,
                            child: Some(child.clone()),
                        },
                    ] {
                        self.events.emit(self.id, event);
                    }
                }
                self.events.emit(
                    self.id,
                    BundleEvent::BuildEnd {
                        input,
                        inline_code,
                        child: None,
                    },
                );
                self.events.emit(
                    self.id,
                    BundleEvent::Analysis {
                        report: output.analysis(),
                    },
                );
                self.events.emit(self.id, BundleEvent::BundleEnd);

                tracing::debug!(
                    bundle = %self.id,
                    files = output.files.len(),
                    invalidated = invalidated.len(),
                    "build finished"
                );
                self.files = output.files.clone();
                self.last_output = Some(output);
                self.status = BundleStatus::Idle;
                Ok(())
            }
            Err(err) => {
                tracing::debug!(bundle = %self.id, error = %err, "build failed");
                self.status = BundleStatus::Error;
                self.events.emit(
                    self.id,
                    BundleEvent::Error {
                        error: err.to_string(),
                    },
                );
                Err(err)
            }
        }
    }

    /// Persist the last successful build. Writing twice without a build in
    /// between produces identical bytes.
    pub async fn write(&mut self) -> Result<()> {
        let Some(output) = self.last_output.as_ref() else {
            return Err(BundleError::NothingToWrite);
        };

        self.status = BundleStatus::Writing;
        self.events
            .emit(self.id, BundleEvent::WriteStart { child: None });

        match write_outputs(&output.outputs, self.id, &self.events).await {
            Ok(()) => {
                self.events.emit(self.id, BundleEvent::WriteEnd { child: None });
                self.status = BundleStatus::Idle;
                Ok(())
            }
            Err(err) => {
                self.status = BundleStatus::Error;
                self.events.emit(
                    self.id,
                    BundleEvent::Error {
                        error: err.to_string(),
                    },
                );
                Err(err)
            }
        }
    }
}

async fn write_outputs(outputs: &[OutputFile], id: BundleId, events: &EventSender) -> Result<()> {
    for file in outputs {
        if let Some(parent) = file.path.parent() {
            create_dir(parent).await?;
        }
        tokio::fs::write(&file.path, &file.contents)
            .await
            .map_err(|source| BundleError::Write {
                path: file.path.clone(),
                source,
            })?;
        events.emit(
            id,
            BundleEvent::WriteProgress {
                output_file: file.path.display().to_string(),
            },
        );
    }
    Ok(())
}

async fn create_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| BundleError::Write {
            path: dir.to_path_buf(),
            source,
        })
}
