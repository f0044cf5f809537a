//! Here we expose prometheus metrics about augur

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;

/// config file options for the telemetry listener
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryEndpointSettings {
    pub bind_address: IpAddr,
    pub port: u16,
}

impl TelemetryEndpointSettings {
    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// Registers `collector` with the default registry and hands it back.
/// A collector that is registered already is handed back unchanged.
pub(crate) fn register_collector<C>(collector: C) -> Result<C, prometheus::Error>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    match prometheus::default_registry().register(Box::new(collector.clone())) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(collector),
        Err(err) => Err(err),
    }
}

async fn metrics_handler() -> Response<Body> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    Response::builder()
        .status(200)
        .header(CONTENT_TYPE, encoder.format_type())
        .body(Body::from(buffer))
        .unwrap()
}

pub async fn run_telemetry_endpoint(settings: &TelemetryEndpointSettings) {
    let app = Router::new().route("/metrics", get(metrics_handler));
    axum::Server::bind(&settings.to_socket_addr())
        .serve(app.into_make_service())
        .await
        .unwrap();
}
