//! # autobackup-daemon
//!
//! The backup orchestrator and its runtime shell.
//!
//! [`orchestrator::Orchestrator`] owns the single-flight guard and runs the
//! parse → mirror → commit/push pipeline on a detached blocking worker;
//! [`runtime`] wires the hourly scheduler, the Unix-socket command server and
//! signal handling together; [`protocol`] is the newline-delimited JSON
//! client/server contract.

pub mod error;
pub mod guard;
pub mod notify;
pub mod orchestrator;
pub mod protocol;
pub mod runtime;
pub mod scheduler;

pub use error::DaemonError;
pub use orchestrator::{Orchestrator, TriggerOutcome};
