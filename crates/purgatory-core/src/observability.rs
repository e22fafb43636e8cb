//! Observability - tracing subscriber の初期化
//!
//! `RUST_LOG` が設定されていれば設定ファイルの filter より優先します。

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("invalid log filter {filter:?}: {source}")]
    Filter {
        filter: String,
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TracingError> {
    let filter = build_env_filter(config, std::env::var("RUST_LOG").ok())?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_target(true))
            .try_init()?,
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact().with_target(false))
            .try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()?,
    }
    Ok(())
}

fn build_env_filter(
    config: &LoggingConfig,
    env_override: Option<String>,
) -> Result<EnvFilter, TracingError> {
    // a broken RUST_LOG falls back to the configured filter
    if let Some(directives) = env_override
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.filter).map_err(|source| TracingError::Filter {
        filter: config.filter.clone(),
        source,
    })
}
