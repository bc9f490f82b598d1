//! Smoketest engine - runs configured commands per service and keeps the
//! latest outcome of each
//!
//! This module is responsible for:
//! - Running smoketest commands with a timeout
//! - Classifying failures into short messages
//! - Scheduling one loop per service
//! - Storing and publishing the latest outcomes

pub mod classifier;
pub mod runner;
pub mod service_loop;
pub mod store;
pub mod supervisor;
pub mod types;


pub use classifier::classify;
pub use runner::{CommandRunner, ProcessRunner, RunReport};
pub use service_loop::ServiceLoop;
pub use store::ResultStore;
pub use supervisor::Supervisor;
pub use types::{ServiceConfig, TestOutcome};
