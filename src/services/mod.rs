pub mod event_log;
pub mod healer;
pub mod lifecycle;
pub mod monitor;
pub mod operations;
pub mod port_inspector;
pub mod process_checker;
pub mod registry;
pub mod snapshotter;

pub use port_inspector::{find_available_port, SystemPortInspector};
