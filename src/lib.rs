pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod service;

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::service::CrmService;
use std::path::Path;
use tokio::net::TcpListener;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub async fn run(config: ServerConfig) -> AppResult<()> {
    match config.log_dir.as_deref() {
        Some(log_dir) => init_tracing(log_dir)?,
        None => init_stdout_tracing()?,
    }

    let service = CrmService::new(&config.database_path)?;
    tracing::info!(path = %service.database().path().display(), "database opened");

    let router = api::build_router(service, &config);
    let listener = TcpListener::bind(config.socket_addr()).await?;
    tracing::info!(addr = %config.socket_addr(), "listening");
    axum::serve(listener, router).await?;
    Ok(())
}

fn init_tracing(log_dir: &Path) -> AppResult<()> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "crm.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| AppError::Config(error.to_string()))
}

fn init_stdout_tracing() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .try_init()
        .map_err(|error| AppError::Config(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::init_stdout_tracing;
    use crate::errors::AppError;

    #[test]
    fn second_subscriber_install_is_reported() {
        let _ = init_stdout_tracing();
        let err = init_stdout_tracing().expect_err("subscriber already set");
        assert!(matches!(err, AppError::Config(_)));
    }
}
