use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::application::ApplicationDefinition;

/// A process observed in one scan of the OS process table. Never stored;
/// every scan produces a fresh set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveProcess {
    pub pid: i32,
    pub ppid: i32,
    pub path: PathBuf,
    pub args: Vec<String>,
    /// Resident set size in bytes: how much memory is needed.
    pub rss: u64,
    /// Proportional set size in bytes: how much is actually used.
    pub pss: u64,
}

impl fmt::Display for LiveProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})\t{}\t{}\t{}\t{:?}",
            self.pid,
            self.ppid,
            self.path.display(),
            format_bytes(self.rss),
            format_bytes(self.pss),
            self.args
        )
    }
}

fn format_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// A matched process with its descendants, built fresh per correlation
/// call and owned by that call's response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessTreeNode {
    pub process: LiveProcess,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ProcessTreeNode>,
}

/// A catalog definition together with the live process trees rooted at
/// its matched instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationView {
    #[serde(flatten)]
    pub definition: ApplicationDefinition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<ProcessTreeNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_render_in_iec_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn empty_instances_are_omitted_from_json() {
        let view = ApplicationView {
            definition: ApplicationDefinition {
                id: 7,
                name: "top".into(),
                exec: crate::types::Exec {
                    working_directory: "/tmp".into(),
                    path: "top".into(),
                    args: vec![],
                    redirect_path: "top.log".into(),
                },
            },
            instances: vec![],
        };
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("instances").is_none());
        assert_eq!(json["id"], 7);
    }
}
