//! Process-wide `tracing` setup shared by the Uppe binaries.

mod tracing;

pub use self::tracing::{LogGuard, LogOptions, LoggerError, init_tracing};
