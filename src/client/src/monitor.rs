use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{kill as send_signal, Signal};
use nix::unistd::Pid;
use procfs::process::Process;
use procfs::ProcError;

use warden_common::types::LiveProcess;

/// Scans the OS process table into fresh [`LiveProcess`] records.
///
/// Records the scanner cannot fully describe are skipped rather than
/// failing the scan: without root only the invoking user's processes
/// expose an executable path, and kernel threads carry no command line
/// or memory rollup.
pub fn scan() -> Result<Vec<LiveProcess>> {
    let mut out = Vec::new();
    for prc in procfs::process::all_processes().context("list /proc")? {
        let Ok(prc) = prc else {
            continue;
        };
        if let Some(live) = live_process(&prc)? {
            out.push(live);
        }
    }
    Ok(out)
}

fn live_process(prc: &Process) -> Result<Option<LiveProcess>> {
    let path = match prc.exe() {
        Ok(path) => path,
        Err(ProcError::PermissionDenied(_)) | Err(ProcError::NotFound(_)) => return Ok(None),
        Err(err) => return Err(err).context("read process exe"),
    };
    let stat = match prc.stat() {
        Ok(stat) => stat,
        // The process can vanish between the directory listing and here.
        Err(ProcError::PermissionDenied(_)) | Err(ProcError::NotFound(_)) => return Ok(None),
        Err(err) => return Err(err).context("read process stat"),
    };
    let args = match prc.cmdline() {
        Ok(args) => args,
        Err(ProcError::PermissionDenied(_)) | Err(ProcError::NotFound(_)) => return Ok(None),
        Err(err) => return Err(err).context("read process cmdline"),
    };
    let Some((rss, pss)) = memory_rollup(prc)? else {
        return Ok(None);
    };
    Ok(Some(LiveProcess {
        pid: stat.pid,
        ppid: stat.ppid,
        path,
        args,
        rss,
        pss,
    }))
}

fn memory_rollup(prc: &Process) -> Result<Option<(u64, u64)>> {
    let rollup = match prc.smaps_rollup() {
        Ok(rollup) => rollup,
        Err(ProcError::PermissionDenied(_)) | Err(ProcError::NotFound(_)) => return Ok(None),
        Err(err) => return Err(err).context("read smaps rollup"),
    };
    let mut rss = 0;
    let mut pss = 0;
    for map in &rollup.memory_map_rollup {
        if let Some(bytes) = map.extension.map.get("Rss") {
            rss += bytes;
        }
        if let Some(bytes) = map.extension.map.get("Pss") {
            pss += bytes;
        }
    }
    Ok(Some((rss, pss)))
}

/// Sends SIGTERM to the process. `Ok(false)` means no such process.
pub fn kill(pid: i32) -> Result<bool> {
    match send_signal(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(err) => Err(err).with_context(|| format!("kill pid {pid}")),
    }
}
