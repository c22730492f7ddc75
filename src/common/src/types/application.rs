use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One catalog entry: a managed application and how to execute it.
///
/// Definitions are immutable once loaded; a catalog reload replaces the
/// whole set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDefinition {
    pub id: i64,
    pub name: String,
    pub exec: Exec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exec {
    #[serde(default)]
    pub working_directory: PathBuf,
    pub path: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub redirect_path: PathBuf,
}

impl Exec {
    /// Resolved absolute executable path. Rooted paths pass through;
    /// otherwise the working directory is tried first, with a `$PATH`
    /// lookup as fallback for executables that live elsewhere.
    pub fn absolute_path(&self) -> PathBuf {
        if self.path.is_absolute() {
            return self.path.clone();
        }
        let joined = self.working_directory.join(&self.path);
        if !joined.exists() {
            if let Some(found) = search_path(&self.path) {
                return found;
            }
        }
        joined
    }

    /// Resolved redirect target; relative paths are anchored at the
    /// working directory.
    pub fn absolute_redirect_path(&self) -> PathBuf {
        if self.redirect_path.is_absolute() {
            self.redirect_path.clone()
        } else {
            self.working_directory.join(&self.redirect_path)
        }
    }
}

fn search_path(exe: &Path) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(exe);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}
