use regex::RegexBuilder;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

fn refreshed_for(pid: u32) -> System {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    sys
}

/// Executable name of a running process.
pub fn process_name(pid: u32) -> Option<String> {
    let sys = refreshed_for(pid);
    let process = sys.process(Pid::from_u32(pid))?;
    Some(process.name().to_string_lossy().into_owned())
}

/// Whether `pid` refers to a live process. Zombies count as gone.
pub fn is_pid_alive(pid: u32) -> bool {
    if !signal_zero(pid) {
        return false;
    }
    let sys = refreshed_for(pid);
    match sys.process(Pid::from_u32(pid)) {
        Some(process) => process.status() != ProcessStatus::Zombie,
        // signal 0 succeeded but the process table has no entry; trust the signal
        None => true,
    }
}

#[cfg(unix)]
fn signal_zero(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal;
    use nix::unistd::Pid as NixPid;

    match signal::kill(NixPid::from_raw(pid as i32), None) {
        Ok(()) => true,
        // exists, owned by someone else
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn signal_zero(pid: u32) -> bool {
    refreshed_for(pid).process(Pid::from_u32(pid)).is_some()
}

/// Whether an observed process name satisfies the expected name of a service.
///
/// The expected name is a case-insensitive pattern searched inside the actual name, so
/// `python` matches `python3`. An invalid pattern falls back to a plain substring test.
pub fn process_name_matches(expected: &str, actual: &str) -> bool {
    let expected = expected.trim();
    if expected.is_empty() || actual.is_empty() {
        return false;
    }

    match RegexBuilder::new(expected).case_insensitive(true).build() {
        Ok(re) => re.is_match(actual),
        Err(_) => actual.to_lowercase().contains(&expected.to_lowercase()),
    }
}
