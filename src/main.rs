//! `web-server` binary: serves a few demo routes.
//!
//! ```text
//! web-server [--config server.toml] [--address 127.0.0.1:8080]
//! ```

use std::path::PathBuf;

use axum::http::StatusCode;
use clap::Parser;
use serde_json::json;

use web_server::config::{load_config, ServerConfig};
use web_server::lifecycle::signals::shutdown_on_ctrl_c;
use web_server::observability::logging;
use web_server::{HttpServer, Server, WebError, WebResult};

#[derive(Parser)]
#[command(name = "web-server")]
#[command(about = "Minimal HTTP server with exact-match routing", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (host:port or :port); overrides the config file.
    #[arg(short, long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config_file = ?cli.config,
        "web-server starting"
    );

    let address = cli
        .address
        .clone()
        .unwrap_or_else(|| config.listener.bind_address.clone());

    let server = HttpServer::new(config);
    register_routes(&server)?;

    tokio::spawn(shutdown_on_ctrl_c(server.shutdown_handle()));

    server.start(&address).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn register_routes(server: &HttpServer) -> WebResult<()> {
    server.get("/ping", |ctx| {
        Box::pin(async move {
            ctx.text(StatusCode::OK, "pong");
        })
    })?;

    server.post("/echo", |ctx| {
        Box::pin(async move {
            match ctx.body().await {
                Ok(body) => {
                    let response = ctx.response();
                    response.set_status(StatusCode::OK);
                    response.write_bytes(&body);
                }
                Err(e @ WebError::BodyTooLarge { .. }) => {
                    ctx.text(StatusCode::PAYLOAD_TOO_LARGE, e.to_string())
                }
                Err(e) => ctx.text(StatusCode::BAD_REQUEST, e.to_string()),
            }
        })
    })?;

    server.get("/health", |ctx| {
        Box::pin(async move {
            let status = json!({ "status": "ok", "request_id": ctx.request_id().as_str() });
            if let Err(e) = ctx.json(StatusCode::OK, &status) {
                tracing::error!(error = %e, "Failed to encode health response");
                ctx.text(StatusCode::INTERNAL_SERVER_ERROR, "encoding failed");
            }
        })
    })?;

    Ok(())
}
