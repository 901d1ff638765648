//! Logging setup.
//!
//! Logs go to stderr so that command output on stdout stays clean.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::CliError;

/// Filter used when neither `TASKSYNC_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_DIRECTIVES: &str = "tasksync=info";

/// Pick filter directives from `TASKSYNC_LOG`, then `RUST_LOG`, then the
/// default. Blank values are ignored.
pub fn filter_directives<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ["TASKSYNC_LOG", "RUST_LOG"]
        .iter()
        .find_map(|key| lookup(key).filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_DIRECTIVES.to_string())
}

/// Install the global subscriber, plain or JSON.
pub fn init_tracing(json: bool) -> Result<(), CliError> {
    let directives = filter_directives(|key| std::env::var(key).ok());
    let (env_filter, invalid) = match EnvFilter::try_new(&directives) {
        Ok(filter) => (filter, false),
        Err(_) => (EnvFilter::new(DEFAULT_DIRECTIVES), true),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| CliError::Telemetry(e.to_string()))?;

    if invalid {
        tracing::warn!(%directives, "Invalid log filter, using default");
    }
    tracing::debug!(%directives, json, "Logging initialized");
    Ok(())
}
