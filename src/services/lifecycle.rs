use crate::error::{Result, SupervisorError};
use crate::models::{
    EventType, ManagedProcess, PortConflict, ProcessEvent, ProcessState, ServiceConfig,
    ServiceStatus,
};
use crate::services::process_checker::{is_pid_alive, process_name_matches};
use crate::supervisor::Supervisor;
use serde::Serialize;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a successful `start`.
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub service: String,
    /// Pid of the spawned child
    pub pid: u32,
    pub port: Option<u16>,
    /// The port was observed open before returning
    pub ready: bool,
}

/// What happened on each half of a restart.
#[derive(Debug, Clone, Serialize)]
pub struct RestartReport {
    pub service: String,
    pub stopped: bool,
    pub stop_error: Option<String>,
    pub started: bool,
    pub start_error: Option<String>,
    pub pid: Option<u32>,
}

/// Pids signalled while freeing a port.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KillReport {
    pub port: u16,
    pub killed: Vec<u32>,
    pub attempts: u32,
}

impl Supervisor {
    /// Spawn a service's start command.
    ///
    /// With `wait_for_ready` and a port, blocks until the port opens or `timeout` elapses.
    /// On timeout the child is left running and a `ReadinessTimeout` is returned.
    pub fn start(&self, name: &str, wait_for_ready: bool, timeout: Duration) -> Result<StartOutcome> {
        let (config, managed_pid) = {
            let mut state = self.lock();
            let config = state.registry.config(name)?;
            if !state.starting.insert(name.to_string()) {
                return Err(SupervisorError::StartInProgress(name.to_string()));
            }
            (config, state.managed.get(name).map(|m| m.pid))
        };
        let slot = StartSlot {
            supervisor: self,
            name,
        };

        let command = config
            .start_command
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| SupervisorError::NoStartCommand(name.to_string()))?;

        if let Some(pid) = managed_pid.filter(|&pid| is_pid_alive(pid)) {
            return Err(SupervisorError::AlreadyRunning {
                name: name.to_string(),
                pid,
            });
        }
        if let Some(port) = config.port {
            self.ensure_port_claimable(&config, port)?;
        }

        let child = match spawn_detached(&config, &command) {
            Ok(child) => child,
            Err(e) => {
                let mut state = self.lock();
                state.managed.remove(name);
                state.registry.set_status(name, ServiceStatus::Failed, None);
                state.record(
                    ProcessEvent::new(name, EventType::StartFailed, format!("spawn failed: {}", e))
                        .with_port(config.port),
                );
                log::error!("[{}] failed to spawn `{}`: {}", name, command, e);
                return Err(SupervisorError::Spawn {
                    name: name.to_string(),
                    source: e,
                });
            }
        };
        let pid = child.id();
        reap_in_background(name, child);

        {
            let mut state = self.lock();
            state.managed.insert(
                name.to_string(),
                ManagedProcess::new(name, pid, config.port, &command, config.working_dir.clone()),
            );
            state.registry.set_status(name, ServiceStatus::Starting, Some(pid));
            state.record(
                ProcessEvent::new(name, EventType::Starting, command.clone())
                    .with_pid(Some(pid))
                    .with_port(config.port),
            );
        }
        // the managed record now answers concurrent starts
        drop(slot);
        log::info!("[{}] spawned (pid={}, cmd={})", name, pid, command);

        let port = match config.port {
            Some(port) if wait_for_ready => port,
            _ => return Ok(self.finish_unwaited_start(&config, pid)),
        };

        if !self.wait_for_port(port, timeout) {
            let mut state = self.lock();
            state.record(
                ProcessEvent::new(
                    name,
                    EventType::StartTimeout,
                    format!("port {} not open after {}s", port, timeout.as_secs()),
                )
                .with_pid(Some(pid))
                .with_port(Some(port)),
            );
            log::warn!("[{}] port {} not ready after {:?}, pid {} left running", name, port, timeout, pid);
            return Err(SupervisorError::ReadinessTimeout {
                name: name.to_string(),
                port,
                pid,
                timeout_secs: timeout.as_secs(),
            });
        }

        let owner = self
            .inspector()
            .find_occupants(port)
            .into_iter()
            .find(|o| process_name_matches(&config.process_name, &o.process_name))
            .map_or(pid, |o| o.pid);

        let mut state = self.lock();
        if let Some(proc) = state.managed.get_mut(name).filter(|m| m.pid == pid) {
            proc.state = ProcessState::Running;
        }
        state.registry.set_status(name, ServiceStatus::Running, Some(owner));
        state.record(
            ProcessEvent::new(name, EventType::Started, format!("listening on port {}", port))
                .with_pid(Some(owner))
                .with_port(Some(port)),
        );
        log::info!("[{}] ready on port {} (pid={})", name, port, owner);

        Ok(StartOutcome {
            service: name.to_string(),
            pid,
            port: Some(port),
            ready: true,
        })
    }

    /// Refuse to start over a port that is already taken.
    fn ensure_port_claimable(&self, config: &ServiceConfig, port: u16) -> Result<()> {
        if self.inspector().is_port_free(port) {
            return Ok(());
        }
        let occupants = self.inspector().find_occupants(port);
        if let Some(owner) = occupants
            .iter()
            .find(|o| process_name_matches(&config.process_name, &o.process_name))
        {
            return Err(SupervisorError::AlreadyRunning {
                name: config.name.clone(),
                pid: owner.pid,
            });
        }
        Err(SupervisorError::PortConflict(PortConflict {
            service: config.name.clone(),
            port,
            expected: config.process_name.clone(),
            occupant: occupants.into_iter().next(),
        }))
    }

    fn finish_unwaited_start(&self, config: &ServiceConfig, pid: u32) -> StartOutcome {
        let name = config.name.as_str();
        let mut state = self.lock();
        if config.port.is_none() {
            if let Some(proc) = state.managed.get_mut(name).filter(|m| m.pid == pid) {
                proc.state = ProcessState::Running;
            }
            state.registry.set_status(name, ServiceStatus::Running, Some(pid));
        }
        state.record(
            ProcessEvent::new(name, EventType::Started, "spawned without readiness wait")
                .with_pid(Some(pid))
                .with_port(config.port),
        );
        StartOutcome {
            service: name.to_string(),
            pid,
            port: config.port,
            ready: false,
        }
    }

    fn wait_for_port(&self, port: u16, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let poll = self.settings().ready_poll_interval;
        loop {
            if !self.inspector().is_port_free(port) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(poll.min(deadline - now));
        }
    }

    /// Stop a service by freeing its port.
    ///
    /// The port occupant is killed rather than the remembered pid, since the supervisor may
    /// not be the parent of whatever holds the port now. Services without a port use their
    /// stop command, or the managed child when there is one.
    pub fn stop(&self, name: &str) -> Result<()> {
        let (config, managed_pid) = {
            let state = self.lock();
            let config = state.registry.config(name)?;
            (config, state.managed.get(name).map(|m| m.pid))
        };

        let outcome = match (config.port, &config.stop_command, managed_pid) {
            (Some(port), _, _) => {
                {
                    let mut state = self.lock();
                    if let Some(proc) = state.managed.get_mut(name) {
                        proc.state = ProcessState::Stopping;
                    }
                    state.registry.set_status(name, ServiceStatus::Stopping, managed_pid);
                }
                self.free_port(name, port, self.settings().kill_retries)
                    .map(|report| format!("port {} freed ({} pid(s) killed)", port, report.killed.len()))
            }
            (None, Some(stop_command), _) => {
                run_stop_command(&config, stop_command).map(|()| "stop command succeeded".to_string())
            }
            (None, None, Some(pid)) => {
                self.kill_by_pid(pid, false).map(|()| format!("managed pid {} killed", pid))
            }
            (None, None, None) => return Err(SupervisorError::NoPort(name.to_string())),
        };

        // a child that never opened its port, or outlived its stop command, goes too
        let outcome = outcome.and_then(|details| match managed_pid {
            Some(pid) if is_pid_alive(pid) => self
                .retire_child(pid)
                .map(|()| format!("{}; managed pid {} killed", details, pid)),
            _ => Ok(details),
        });

        let mut state = self.lock();
        match outcome {
            Ok(details) => {
                let ours = state.managed.get(name).map_or(false, |m| Some(m.pid) == managed_pid);
                let retired = if ours { state.managed.remove(name) } else { None };
                match retired {
                    Some(proc) => log::info!("[{}] stopped after {}s", name, proc.uptime_seconds()),
                    None => log::info!("[{}] stopped", name),
                }
                state.registry.set_status(name, ServiceStatus::Stopped, None);
                state.record(ProcessEvent::new(name, EventType::Stopped, details).with_port(config.port));
                Ok(())
            }
            Err(e) => {
                state.registry.set_status(name, ServiceStatus::Unknown, managed_pid);
                state.record(
                    ProcessEvent::new(name, EventType::StopFailed, e.to_string()).with_port(config.port),
                );
                log::warn!("[{}] stop failed: {}", name, e);
                Err(e)
            }
        }
    }

    /// Kill a managed child and wait until it is confirmed gone.
    fn retire_child(&self, pid: u32) -> Result<()> {
        self.kill_by_pid(pid, false)?;
        let deadline = Instant::now() + self.settings().term_grace;
        while is_pid_alive(pid) {
            if Instant::now() >= deadline {
                return Err(SupervisorError::KillFailed {
                    pid,
                    reason: "still alive after SIGKILL".to_string(),
                });
            }
            thread::sleep(Duration::from_millis(50));
        }
        Ok(())
    }

    /// Stop, pause for the socket to be released, then start with a readiness wait.
    pub fn restart(&self, name: &str, timeout: Duration) -> Result<RestartReport> {
        self.lock().registry.config(name)?;

        let stop = self.stop(name);
        thread::sleep(self.settings().restart_pause);
        let start = self.start(name, true, timeout);

        let report = RestartReport {
            service: name.to_string(),
            stopped: stop.is_ok(),
            stop_error: stop.err().map(|e| e.to_string()),
            started: start.is_ok(),
            pid: start.as_ref().ok().map(|o| o.pid),
            start_error: start.err().map(|e| e.to_string()),
        };

        let details = format!(
            "stop: {}; start: {}",
            report.stop_error.as_deref().unwrap_or("ok"),
            report.start_error.as_deref().unwrap_or("ok")
        );
        self.lock()
            .record(ProcessEvent::new(name, EventType::Restarted, details).with_pid(report.pid));
        Ok(report)
    }

    /// Terminate one process: SIGTERM, a short grace period, then SIGKILL if it is still
    /// alive. A process that is already gone counts as killed.
    pub fn kill_by_pid(&self, pid: u32, force: bool) -> Result<()> {
        let result = kill_pid(pid, force, self.settings().term_grace);
        let owner = self.owner_of(pid);
        let event = match &result {
            Ok(()) => ProcessEvent::new(&owner, EventType::Killed, if force { "SIGKILL" } else { "SIGTERM" }),
            Err(e) => ProcessEvent::new(&owner, EventType::KillFailed, e.to_string()),
        };
        self.lock().record(event.with_pid(Some(pid)));
        result
    }

    /// Free a service's port, killing whoever holds it.
    pub fn kill_service(&self, name: &str) -> Result<KillReport> {
        let port = self
            .lock()
            .registry
            .config(name)?
            .port
            .ok_or_else(|| SupervisorError::NoPort(name.to_string()))?;
        self.free_port(name, port, self.settings().kill_retries)
    }

    /// Repeatedly kill the current occupants of `port` until it is observed free.
    ///
    /// A free port returns immediately without killing anything. The last attempt uses
    /// SIGKILL straight away.
    pub(crate) fn free_port(&self, service: &str, port: u16, retries: u32) -> Result<KillReport> {
        let retries = retries.max(1);
        let mut report = KillReport {
            port,
            ..Default::default()
        };

        for attempt in 1..=retries {
            if self.inspector().is_port_free(port) {
                return Ok(report);
            }
            report.attempts = attempt;
            let force = attempt == retries;

            let occupants = self.inspector().find_occupants(port);
            if occupants.is_empty() {
                log::warn!("[{}] port {} is taken but no owner was found (attempt {})", service, port, attempt);
            }

            for occupant in occupants {
                let result = kill_pid(occupant.pid, force, self.settings().term_grace);
                let event = match &result {
                    Ok(()) => {
                        report.killed.push(occupant.pid);
                        ProcessEvent::new(
                            service,
                            EventType::Killed,
                            format!("killed {} holding port {}", occupant.process_name, port),
                        )
                    }
                    Err(e) => {
                        log::warn!("[{}] {}", service, e);
                        ProcessEvent::new(service, EventType::KillFailed, e.to_string())
                    }
                };
                self.lock()
                    .record(event.with_pid(Some(occupant.pid)).with_port(Some(port)));
            }

            thread::sleep(self.settings().kill_settle);
        }

        if self.inspector().is_port_free(port) {
            Ok(report)
        } else {
            Err(SupervisorError::PortStillOccupied {
                port,
                attempts: retries,
            })
        }
    }

    fn owner_of(&self, pid: u32) -> String {
        let state = self.lock();
        state
            .managed
            .values()
            .find(|m| m.pid == pid)
            .map(|m| m.service.clone())
            .or_else(|| {
                state
                    .registry
                    .list()
                    .into_iter()
                    .find(|s| s.pid == Some(pid))
                    .map(|s| s.config.name)
            })
            .unwrap_or_else(|| format!("pid:{}", pid))
    }
}

/// A service's claim on the start path, released when dropped.
struct StartSlot<'a> {
    supervisor: &'a Supervisor,
    name: &'a str,
}

impl Drop for StartSlot<'_> {
    fn drop(&mut self) {
        self.supervisor.lock().starting.remove(self.name);
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(not(unix))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Spawn in its own process group with all output discarded.
fn spawn_detached(config: &ServiceConfig, command: &str) -> std::io::Result<Child> {
    let mut cmd = shell_command(command);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd.spawn()
}

fn reap_in_background(name: &str, mut child: Child) {
    let label = name.to_string();
    let spawned = thread::Builder::new()
        .name(format!("reap-{}", name))
        .spawn(move || match child.wait() {
            Ok(status) => log::info!("[{}] child {} exited with {}", label, child.id(), status),
            Err(e) => log::debug!("[{}] wait failed: {}", label, e),
        });
    if let Err(e) = spawned {
        log::warn!("[{}] could not start reaper thread: {}", name, e);
    }
}

fn run_stop_command(config: &ServiceConfig, stop_command: &str) -> Result<()> {
    let mut cmd = shell_command(stop_command);
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }
    let status = cmd.status().map_err(|e| SupervisorError::StopCommand {
        name: config.name.clone(),
        detail: e.to_string(),
    })?;
    if status.success() {
        Ok(())
    } else {
        Err(SupervisorError::StopCommand {
            name: config.name.clone(),
            detail: format!("exited with {}", status),
        })
    }
}

/// Signal a process, escalating to SIGKILL after `grace` unless `force` already used it.
#[cfg(unix)]
pub fn kill_pid(pid: u32, force: bool, grace: Duration) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let raw = match i32::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => {
            return Err(SupervisorError::KillFailed {
                pid,
                reason: "not a valid process id".to_string(),
            })
        }
    };
    if pid == std::process::id() {
        return Err(SupervisorError::KillFailed {
            pid,
            reason: "refusing to signal the supervisor itself".to_string(),
        });
    }

    let target = Pid::from_raw(raw);
    let send = |sig: Signal| match signal::kill(target, sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(SupervisorError::KillFailed {
            pid,
            reason: e.to_string(),
        }),
    };

    if force {
        return send(Signal::SIGKILL);
    }

    send(Signal::SIGTERM)?;
    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !is_pid_alive(pid) {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(50));
    }
    if !is_pid_alive(pid) {
        return Ok(());
    }
    log::info!("pid {} ignored SIGTERM, sending SIGKILL", pid);
    send(Signal::SIGKILL)
}

#[cfg(not(unix))]
pub fn kill_pid(pid: u32, force: bool, grace: Duration) -> Result<()> {
    use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    let Some(process) = sys.process(Pid::from_u32(pid)) else {
        return Ok(());
    };
    if !force && process.kill_with(Signal::Term).unwrap_or(false) {
        thread::sleep(grace);
        if !is_pid_alive(pid) {
            return Ok(());
        }
    }
    if process.kill() || !is_pid_alive(pid) {
        Ok(())
    } else {
        Err(SupervisorError::KillFailed {
            pid,
            reason: "process refused to terminate".to_string(),
        })
    }
}
