//! In-memory build results.

use std::path::PathBuf;

use indexmap::IndexSet;

/// One file produced by a build, not yet on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

impl OutputFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// Everything an engine returns from one successful build.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// Absolute paths the bundle depends on, entry first.
    pub files: IndexSet<PathBuf>,
    pub outputs: Vec<OutputFile>,
    pub warnings: Vec<String>,
    /// Sub-bundles discovered during the build (e.g. scripts referenced by a page).
    pub children: Vec<String>,
}

impl BuildOutput {
    pub fn analysis(&self) -> AnalysisReport {
        AnalysisReport {
            outputs: self
                .outputs
                .iter()
                .map(|o| OutputStat {
                    path: o.path.clone(),
                    bytes: o.contents.len() as u64,
                })
                .collect(),
            dependency_count: self.files.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputStat {
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisReport {
    pub outputs: Vec<OutputStat>,
    pub dependency_count: usize,
}

impl AnalysisReport {
    pub fn total_bytes(&self) -> u64 {
        self.outputs.iter().map(|o| o.bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_sizes() {
        let mut output = BuildOutput::default();
        output.files.insert(PathBuf::from("/p/a.js"));
        output.files.insert(PathBuf::from("/p/b.js"));
        output.outputs.push(OutputFile::new("/p/dist/a.js", "abc"));
        output.outputs.push(OutputFile::new("/p/dist/a.js.map", "{}"));

        let report = output.analysis();
        assert_eq!(report.dependency_count, 2);
        assert_eq!(report.outputs.len(), 2);
        assert_eq!(report.total_bytes(), 5);
    }
}
