mod api;
mod app;
mod authentication;
mod config;
mod crud_ops;
mod entities;
mod error;
mod guards;
mod pages;
mod telemetry;
mod tokens;
mod web;


use tokio::net::TcpListener;

async fn run_server() -> Result<(), app::StartupError> {
    let config = config::Config::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let sqlite_pool = app::connect(&config.database_url).await?;
    let app = app::build_app(sqlite_pool, &config).await?;

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() {
    telemetry::init();

    if let Err(e) = run_server().await {
        tracing::error!(error = %e, "run server error");
        std::process::exit(1);
    };
}
