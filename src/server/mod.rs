use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::GatewayConfig;
use crate::executor::Gateway;
use handlers::{health_check, tx_commit_handler};

pub mod handlers;
pub mod models;

/// Payload ceiling for the JSON endpoints; large imports belong in
/// `LOAD CSV`, not in request bodies.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub struct AppState {
    pub gateway: Gateway,
}

pub async fn run() {
    dotenv().ok();

    // Load server configuration from environment variables
    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    run_with_config(config).await;
}

pub async fn run_with_config(config: GatewayConfig) {
    dotenv().ok();

    log::info!(
        "Server configuration: http={}:{}, bolt endpoint={} (ssr profile={}), fetch_size={}",
        config.http_host,
        config.http_port,
        config.driver_uri,
        config.profile_ssr,
        config.fetch_size
    );

    let gateway = Gateway::new(config.clone());

    if config.verify_connectivity {
        match gateway.router.pool().verify_connectivity().await {
            Ok(()) => log::info!("✓ Database connection verified"),
            Err(e) => {
                log::error!("✗ FATAL: Cannot reach the database at {}: {}", config.driver_uri, e);
                log::error!("  Startup aborted because verify_connectivity is set.");
                std::process::exit(1);
            }
        }
    }

    let app_state = AppState { gateway };

    let http_bind_address = format!("{}:{}", config.http_host, config.http_port);
    log::info!("Starting HTTP server on {}", http_bind_address);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/db/{database}/tx/commit", post(tx_commit_handler))
        .layer(CatchPanicLayer::new())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(Arc::new(app_state));

    let http_listener = match TcpListener::bind(&http_bind_address).await {
        Ok(listener) => {
            log::info!("Successfully bound HTTP listener to {}", http_bind_address);
            listener
        }
        Err(e) => {
            log::error!(
                "✗ FATAL: Failed to bind HTTP listener to {}: {}",
                http_bind_address,
                e
            );
            log::error!("  Is another process using port {}?", config.http_port);
            std::process::exit(1);
        }
    };

    let http_server = axum::serve(http_listener, app);

    println!("boltgate is running");
    println!("  HTTP API: http://{}", http_bind_address);
    println!("  Database: {}", config.driver_uri);

    if config.daemon {
        println!("Running in daemon mode - press Ctrl+C to stop");

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    log::error!("Failed to register SIGTERM handler: {}. Server will run without graceful shutdown.", e);
                    if let Err(e) = http_server.await {
                        log::error!("HTTP server error: {:?}", e);
                    }
                    return;
                }
            };
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(e) => {
                    log::error!("Failed to register SIGINT handler: {}. Server will run without graceful shutdown.", e);
                    if let Err(e) = http_server.await {
                        log::error!("HTTP server error: {:?}", e);
                    }
                    return;
                }
            };

            tokio::select! {
                result = http_server => {
                    if let Err(e) = result {
                        log::error!("HTTP server error: {:?}", e);
                    }
                }
                _ = sigterm.recv() => println!("Received SIGTERM, shutting down..."),
                _ = sigint.recv() => println!("Received SIGINT, shutting down..."),
            }
        }

        #[cfg(windows)]
        {
            tokio::select! {
                result = http_server => {
                    if let Err(e) = result {
                        log::error!("HTTP server error: {:?}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("Received shutdown signal, shutting down...");
                }
            }
        }

        println!("Server stopped");
    } else {
        // Run HTTP server (this will block until shutdown)
        if let Err(e) = http_server.await {
            log::error!("HTTP server fatal error: {:?}", e);
            std::process::exit(1);
        }
    }
}
