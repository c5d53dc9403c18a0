//! 参考离散事件仿真框架。
//! Reference discrete-event harness.
//!
//! Drives [`Station`](crate::mac::Station)s over an idealised slotted
//! channel so the contention engine can be exercised end to end. There is no
//! propagation, mobility or addressing model here.

pub mod channel;
pub mod rate_control;
pub mod replications;
pub mod results;
pub mod scheduler;
pub mod simulation;

pub use channel::SlottedChannel;
pub use rate_control::RetryLimitManager;
pub use replications::run_replications;
pub use results::{jain_fairness, NetworkReport, ResultsAggregator, RunReport, StationReport};
pub use scheduler::EventQueue;
pub use simulation::Simulation;
