//! rki-states - HTTP API over the RKI state-level COVID-19 feature services.
//!
//! # API Endpoints
//!
//! - `GET /states` - Current totals per state
//! - `GET /states/recovered` - Cumulative recovered per state
//! - `GET /states/new/:metric` - New cases, deaths or recoveries per state
//! - `GET /states/history/:metric[/:days]` - Daily series, optionally `?id=` one state
//! - `GET /states/age-groups` - Cases and deaths by age band, optionally `?id=` one state
//! - `GET /health` - Health check

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use rki_states::api::{AppState, router};
use rki_states::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("rki_states=info".parse()?))
        .init();

    let config = Config::from_env();

    info!(
        port = config.port,
        base_url = %config.arcgis_base_url,
        alternate = config.alternate_base_url.as_deref(),
        stale_after_hour = config.stale_after_hour,
        "Starting rki-states server"
    );

    let retriever = config.retriever()?;
    if config.alternate_base_url.is_none() {
        info!("No alternate source configured, staleness fallback disabled");
    }

    let app = router(AppState { retriever });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "rki-states is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
