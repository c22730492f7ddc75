use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use tracing::warn;

use warden_common::types::{
    ApplicationDefinition, ApplicationView, LiveProcess, ProcessTreeNode,
};

/// Merges the declarative catalog with one process-table snapshot.
///
/// Every definition yields a view. A live process becomes a root
/// instance of every definition it is [`similar`] to; processes matching
/// nothing appear in no view. The result is owned entirely by the
/// caller; nothing is cached between calls.
pub fn combine_theory_and_reality(
    definitions: &[ApplicationDefinition],
    processes: &[LiveProcess],
) -> Vec<ApplicationView> {
    // One ppid grouping per call, shared by every definition's tree fill.
    let mut ppid_to_processes: HashMap<i32, Vec<&LiveProcess>> = HashMap::new();
    for process in processes {
        ppid_to_processes
            .entry(process.ppid)
            .or_default()
            .push(process);
    }

    definitions
        .iter()
        .map(|definition| ApplicationView {
            definition: definition.clone(),
            instances: processes
                .iter()
                .filter(|process| similar(definition, process))
                .map(|process| attach_children(process, &ppid_to_processes))
                .collect(),
        })
        .collect()
}

/// The matching rule: equal executable basenames, the same filesystem
/// object (device and inode of the resolved definition path vs the
/// process path), and the process argv after argv[0] equal to the
/// configured argument list as an ordered sequence.
pub fn similar(definition: &ApplicationDefinition, process: &LiveProcess) -> bool {
    if definition.exec.path.file_name() != process.path.file_name() {
        return false;
    }
    let Some(definition_identity) = file_identity(&definition.exec.absolute_path()) else {
        return false;
    };
    let Some(process_identity) = file_identity(&process.path) else {
        return false;
    };
    if definition_identity != process_identity {
        return false;
    }
    let trailing = process.args.get(1..).unwrap_or(&[]);
    trailing == definition.exec.args.as_slice()
}

fn file_identity(path: &Path) -> Option<(u64, u64)> {
    match std::fs::metadata(path) {
        Ok(meta) => Some((meta.dev(), meta.ino())),
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), %err, "stat failed while matching, pair ignored");
            }
            None
        }
    }
}

/// Children at every depth come from the shared ppid grouping; process
/// ancestry is acyclic by OS construction.
fn attach_children(
    process: &LiveProcess,
    ppid_to_processes: &HashMap<i32, Vec<&LiveProcess>>,
) -> ProcessTreeNode {
    let children = ppid_to_processes
        .get(&process.pid)
        .map(|kids| {
            kids.iter()
                .map(|kid| attach_children(kid, ppid_to_processes))
                .collect()
        })
        .unwrap_or_default();
    ProcessTreeNode {
        process: process.clone(),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    use warden_common::types::Exec;

    fn definition(id: i64, dir: &Path, exe: &str, args: &[&str]) -> ApplicationDefinition {
        ApplicationDefinition {
            id,
            name: exe.to_string(),
            exec: Exec {
                working_directory: dir.to_path_buf(),
                path: PathBuf::from(exe),
                args: args.iter().map(|arg| arg.to_string()).collect(),
                redirect_path: PathBuf::from("out.log"),
            },
        }
    }

    fn live(pid: i32, ppid: i32, path: PathBuf, args: &[&str]) -> LiveProcess {
        LiveProcess {
            pid,
            ppid,
            path,
            args: args.iter().map(|arg| arg.to_string()).collect(),
            rss: 0,
            pss: 0,
        }
    }

    fn written(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        path
    }

    #[test]
    fn matching_processes_become_distinct_roots() {
        let dir = tempfile::tempdir().unwrap();
        let exe = written(dir.path(), "app");
        let def = definition(1, dir.path(), "app", &["-x"]);

        let processes = vec![
            live(10, 1, exe.clone(), &["app", "-x"]),
            live(11, 1, exe.clone(), &["app", "-x"]),
        ];
        let views = combine_theory_and_reality(&[def], &processes);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].instances.len(), 2);
        assert_eq!(views[0].instances[0].process.pid, 10);
        assert_eq!(views[0].instances[1].process.pid, 11);
    }

    #[test]
    fn same_basename_different_file_is_excluded() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        written(dir_a.path(), "app");
        let other = written(dir_b.path(), "app");

        let def = definition(1, dir_a.path(), "app", &[]);
        let views = combine_theory_and_reality(&[def], &[live(10, 1, other, &["app"])]);
        assert!(views[0].instances.is_empty());
    }

    #[test]
    fn symlinked_path_matches_through_file_identity() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let exe = written(dir_a.path(), "app");
        let link = dir_b.path().join("app");
        std::os::unix::fs::symlink(&exe, &link).unwrap();

        let def = definition(1, dir_a.path(), "app", &[]);
        let views = combine_theory_and_reality(&[def], &[live(10, 1, link, &["app"])]);
        assert_eq!(views[0].instances.len(), 1);
    }

    #[test]
    fn trailing_arguments_must_match_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let exe = written(dir.path(), "app");
        let def = definition(1, dir.path(), "app", &["-a", "-b"]);

        let wrong_order = live(10, 1, exe.clone(), &["app", "-b", "-a"]);
        let missing = live(11, 1, exe.clone(), &["app"]);
        let exact = live(12, 1, exe.clone(), &["app", "-a", "-b"]);

        let views = combine_theory_and_reality(&[def], &[wrong_order, missing, exact]);
        assert_eq!(views[0].instances.len(), 1);
        assert_eq!(views[0].instances[0].process.pid, 12);
    }

    #[test]
    fn one_process_can_root_several_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let exe = written(dir.path(), "app");
        let defs = vec![
            definition(1, dir.path(), "app", &[]),
            definition(2, dir.path(), "app", &[]),
        ];
        let views = combine_theory_and_reality(&defs, &[live(10, 1, exe, &["app"])]);
        assert_eq!(views[0].instances.len(), 1);
        assert_eq!(views[1].instances.len(), 1);
    }

    #[test]
    fn descendants_attach_by_ppid_at_every_depth() {
        let dir = tempfile::tempdir().unwrap();
        let exe = written(dir.path(), "app");
        let def = definition(1, dir.path(), "app", &[]);

        let processes = vec![
            live(10, 1, exe, &["app"]),
            // Children need not match the definition themselves.
            live(20, 10, PathBuf::from("/bin/true"), &["true"]),
            live(30, 20, PathBuf::from("/bin/true"), &["true"]),
            live(21, 10, PathBuf::from("/bin/false"), &["false"]),
        ];
        let views = combine_theory_and_reality(&[def], &processes);
        let root = &views[0].instances[0];
        assert_eq!(root.process.pid, 10);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].process.pid, 20);
        assert_eq!(root.children[0].children[0].process.pid, 30);
        assert_eq!(root.children[1].process.pid, 21);
    }

    #[test]
    fn every_definition_yields_a_view() {
        let dir = tempfile::tempdir().unwrap();
        written(dir.path(), "app");
        let defs = vec![definition(1, dir.path(), "app", &[])];
        let views = combine_theory_and_reality(&defs, &[]);
        assert_eq!(views.len(), 1);
        assert!(views[0].instances.is_empty());
    }
}
