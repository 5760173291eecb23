//! LLM Tuner HTTP API
//!
//! warp routes over [`tuner_core::Platform`], plus the helpers behind the
//! `llm-tuner` command-line tool.

#![warn(unreachable_pub)]

pub mod cli;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use error::{handle_rejection, ApiError, ErrorBody};
pub use routes::routes;
pub use state::AppState;

use anyhow::Context;
use std::net::SocketAddr;
use tuner_core::TunerConfig;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build services and serve until the process receives Ctrl-C
///
/// # Errors
///
/// Returns an error if the services cannot be built from `config` or the
/// listen address cannot be bound.
pub async fn serve(config: TunerConfig) -> anyhow::Result<()> {
    let bind: SocketAddr = config.server.bind;
    let state = AppState::from_config(config)?;
    let (addr, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(bind, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(%addr, version = VERSION, "llm-tuner listening");
    server.await;
    tracing::info!("server stopped");
    Ok(())
}
