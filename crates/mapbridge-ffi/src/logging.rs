// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Optional `tracing` subscriber for hosts without one of their own.

use std::sync::OnceLock;

use mapbridge_engine::LOG_TARGET;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::error::BridgeError;
use crate::settings;

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Installs a stderr fmt subscriber. Later calls are no-ops.
///
/// The filter is `filter`, else the persisted `log_filter` setting, else
/// `RUST_LOG` with `info` as the default level. Engine events are off unless
/// the filter names the engine target explicitly.
pub fn init_logging(filter: Option<&str>) -> Result<(), BridgeError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }
    let directives = filter
        .map(str::to_owned)
        .or_else(|| settings::snapshot().log_filter);
    let mut env_filter = match directives {
        Some(spec) => EnvFilter::try_new(&spec)
            .map_err(|err| BridgeError::invalid(format!("log filter `{spec}`: {err}")))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    if !env_filter.to_string().contains(LOG_TARGET) {
        let quiet = format!("{LOG_TARGET}=off")
            .parse::<Directive>()
            .map_err(|err| BridgeError::Unknown(format!("log directive: {err}")))?;
        env_filter = env_filter.add_directive(quiet);
    }
    let _ = INSTALLED.set(());
    // Another global subscriber may already be installed by the host.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn bad_filter_is_rejected_then_install_is_idempotent() {
        let err = init_logging(Some("mapbridge=loudest")).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(_)));
        init_logging(Some("warn")).unwrap();
        init_logging(Some("mapbridge=loudest")).unwrap();
    }
}
