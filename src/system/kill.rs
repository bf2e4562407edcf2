use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillResult {
    Success(u32),
    Failed(u32, String),
    NotFound(u32),
}

/// Terminates a process picked from the process table.
pub fn terminate_process(pid: u32) -> KillResult {
    let sysinfo_pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sysinfo_pid]),
        true,
        ProcessRefreshKind::nothing(),
    );

    let Some(process) = sys.process(sysinfo_pid) else {
        return KillResult::NotFound(pid);
    };

    let result = match process.kill_with(Signal::Kill) {
        Some(true) => KillResult::Success(pid),
        Some(false) => KillResult::Failed(pid, format!("Failed to terminate PID {pid}")),
        // Signal not supported on this platform, fall back to kill()
        None if process.kill() => KillResult::Success(pid),
        None => KillResult::Failed(pid, format!("Failed to terminate PID {pid} (permission denied?)")),
    };

    match &result {
        KillResult::Success(_) => tracing::info!(pid, "process terminated"),
        KillResult::Failed(_, reason) => tracing::warn!(pid, reason = %reason, "terminate failed"),
        KillResult::NotFound(_) => {}
    }
    result
}
