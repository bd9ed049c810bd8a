//! The subset of `package.json` Strata reads.

use indexmap::IndexMap;
use serde::Deserialize;

/// Workspace declaration, either a bare list or the `{ "packages": [...] }` form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    List(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl Workspaces {
    pub fn patterns(&self) -> &[String] {
        match self {
            Workspaces::List(patterns) => patterns,
            Workspaces::Object { packages } => packages,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub workspaces: Option<Workspaces>,

    #[serde(default)]
    pub dependencies: IndexMap<String, String>,

    #[serde(default)]
    pub dev_dependencies: IndexMap<String, String>,

    #[serde(default)]
    pub peer_dependencies: IndexMap<String, String>,

    /// Script source built into the output fields below
    #[serde(default)]
    pub lib: Option<String>,

    /// ESM output
    #[serde(default)]
    pub module: Option<String>,

    /// CommonJS output
    #[serde(default)]
    pub main: Option<String>,

    /// IIFE output. Only the string form is buildable; the object form
    /// (module replacement map) is ignored.
    #[serde(default)]
    pub browser: Option<serde_json::Value>,

    /// Style source
    #[serde(default)]
    pub style: Option<String>,
}

impl PackageJson {
    pub fn browser_path(&self) -> Option<&str> {
        self.browser.as_ref().and_then(serde_json::Value::as_str)
    }

    /// Every dependency declaration, runtime first.
    pub fn all_dependencies(&self) -> impl Iterator<Item = (&String, &String)> {
        self.dependencies
            .iter()
            .chain(self.dev_dependencies.iter())
            .chain(self.peer_dependencies.iter())
    }
}
