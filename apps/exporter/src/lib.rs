//! Smoketest exporter - runs a shell command per service on a fixed interval
//! and exposes the latest outcomes as Prometheus gauges.

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod smoketest;
