use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};

use crate::metrics::PrometheusMetrics;
use crate::routes;

/// Bind the metrics endpoint. The returned server must be awaited or spawned
/// to start serving; signal handling is left to the caller.
pub fn bind(metrics: Arc<PrometheusMetrics>, addr: SocketAddr) -> io::Result<Server> {
    let metrics = web::Data::from(metrics);

    let server = HttpServer::new(move || {
        App::new().app_data(metrics.clone()).configure(routes::routes)
    })
    .workers(1)
    .disable_signals()
    .bind(addr)?
    .run();

    Ok(server)
}
