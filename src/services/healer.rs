use crate::models::{EventType, PortConflict, ProcessEvent};
use crate::services::process_checker::process_name_matches;
use crate::supervisor::Supervisor;
use std::collections::BTreeMap;

impl Supervisor {
    /// Services whose port is held by something other than their expected process.
    ///
    /// A free port is not a conflict. An occupied port whose owner cannot be identified is.
    pub fn get_conflicts(&self) -> Vec<PortConflict> {
        self.observe_all()
            .into_iter()
            .filter_map(|(_, obs)| obs.conflict)
            .collect()
    }

    /// Free every conflicting port. Maps each conflicting service to whether its port was
    /// cleared. The rightful service is never started afterwards.
    ///
    /// An occupant that is itself the expected process of another registered service on the
    /// same port is left alone: that is a duplicate-port registration, not an intruder.
    pub fn heal_all(&self) -> BTreeMap<String, bool> {
        let conflicts = self.get_conflicts();
        let configs = self.lock().registry.configs();
        let mut results = BTreeMap::new();

        for conflict in conflicts {
            let name = conflict.service.clone();

            let claimed_by = conflict.occupant.as_ref().and_then(|occupant| {
                configs
                    .iter()
                    .find(|c| {
                        c.name != name
                            && c.port == Some(conflict.port)
                            && process_name_matches(&c.process_name, &occupant.process_name)
                    })
                    .map(|c| c.name.clone())
            });
            if let Some(owner) = claimed_by {
                log::warn!(
                    "[{}] port {} belongs to registered service '{}', not killing it",
                    name,
                    conflict.port,
                    owner
                );
                self.lock().record(
                    ProcessEvent::new(
                        &name,
                        EventType::HealFailed,
                        format!("port {} is also registered to '{}'", conflict.port, owner),
                    )
                    .with_port(Some(conflict.port)),
                );
                results.insert(name, false);
                continue;
            }

            log::info!("[{}] healing: {}", name, conflict);
            let healed = self.kill_service(&name);
            let event = match &healed {
                Ok(report) => ProcessEvent::new(
                    &name,
                    EventType::Healed,
                    format!("{} (killed {:?})", conflict, report.killed),
                ),
                Err(e) => {
                    log::warn!("[{}] heal failed: {}", name, e);
                    ProcessEvent::new(&name, EventType::HealFailed, e.to_string())
                }
            };
            self.lock().record(event.with_port(Some(conflict.port)));
            results.insert(name, healed.is_ok());
        }

        results
    }
}
