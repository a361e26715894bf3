//! Process registry backed by `/proc`.

use std::fs;

use anyhow::{Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::debug;

use crate::live::ProcessRegistry;

/// The live process table. Matches on `/proc/<pid>/comm`, which the kernel
/// truncates to 15 characters — long enough for the `panel-<id>-` and
/// `xfce4-panel` prefixes matched here.
pub struct ProcTable;

impl ProcessRegistry for ProcTable {
    fn find_by_prefix(&self, prefix: &str) -> Vec<i32> {
        let mut pids = Vec::new();
        let Ok(entries) = fs::read_dir("/proc") else {
            return pids;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(|s| s.parse::<i32>().ok()) else {
                continue;
            };
            let Ok(comm) = fs::read_to_string(entry.path().join("comm")) else {
                continue; // process raced away, or not ours to inspect
            };
            if comm.trim_end().starts_with(prefix) {
                debug!(pid, comm = %comm.trim_end(), "matched process");
                pids.push(pid);
            }
        }
        pids
    }

    fn terminate(&self, pid: i32) -> Result<()> {
        kill(Pid::from_raw(pid), Signal::SIGTERM)
            .context(format!("failed to signal pid {pid}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_prefix_matches_nothing_for_unlikely_name() {
        let table = ProcTable;
        assert!(table.find_by_prefix("zz-no-such-process-prefix-").is_empty());
    }

    #[test]
    fn test_terminate_missing_pid_is_an_error() {
        let table = ProcTable;
        // pid max on Linux is well below this
        assert!(table.terminate(i32::MAX).is_err());
    }
}
