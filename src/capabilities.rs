//! One-shot probe of what the target DBMS supports.
//!
//! Runs lazily on first use and publishes its snapshot through a
//! `OnceCell`, so every later reader observes the same fully constructed
//! value without touching the database again.

use std::collections::HashMap;

use tokio::sync::OnceCell;

use crate::config::GatewayConfig;
use crate::driver::{SessionOptions, SessionRouter};
use crate::errors::GatewayError;

use boltr::types::BoltValue;

/// Process-wide capability snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Server-side routing: the cluster resolves read/write routing itself.
    pub ssr_available: bool,
    /// Enterprise edition, the precondition for impersonation.
    pub enterprise_edition: bool,
}

#[derive(Default)]
pub struct CapabilitiesProbe {
    cell: OnceCell<Capabilities>,
}

impl CapabilitiesProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, router: &SessionRouter, config: &GatewayConfig) -> Capabilities {
        *self
            .cell
            .get_or_init(|| async { probe(router, config).await })
            .await
    }
}

async fn probe(router: &SessionRouter, config: &GatewayConfig) -> Capabilities {
    let enterprise_edition = match probe_edition(router).await {
        Ok(enterprise) => enterprise,
        Err(e) => {
            log::warn!("edition probe failed, assuming community edition: {}", e);
            false
        }
    };

    let routing_scheme = config.uses_routing_scheme();
    let probed = if routing_scheme && !config.profile_ssr {
        match probe_routing_enabled(router).await {
            Ok(enabled) => Some(enabled),
            Err(e) => {
                log::warn!(
                    "server-side routing probe failed, falling back to default_to_ssr={}: {}",
                    config.default_to_ssr,
                    e
                );
                None
            }
        }
    } else {
        None
    };
    let ssr_available = decide_ssr(
        routing_scheme,
        config.profile_ssr,
        probed,
        config.default_to_ssr,
    );

    let capabilities = Capabilities {
        ssr_available,
        enterprise_edition,
    };
    log::info!(
        "database capabilities: ssr_available={} enterprise_edition={}",
        capabilities.ssr_available,
        capabilities.enterprise_edition
    );
    capabilities
}

/// SSR needs the routing URI scheme; a profile may force it; otherwise the
/// probed server setting decides, with a configured fallback when the
/// database was unreachable.
fn decide_ssr(routing_scheme: bool, forced: bool, probed: Option<bool>, fallback: bool) -> bool {
    if !routing_scheme {
        return false;
    }
    if forced {
        return true;
    }
    probed.unwrap_or(fallback)
}

async fn probe_edition(router: &SessionRouter) -> Result<bool, GatewayError> {
    let outcome = router
        .run_eager(
            &SessionOptions::system_read(),
            "CALL dbms.components() YIELD edition RETURN edition",
            HashMap::new(),
        )
        .await?;
    Ok(outcome
        .records
        .first()
        .and_then(|record| record.first())
        .and_then(|value| value.as_str())
        .map(|edition| edition.to_lowercase() == "enterprise")
        .unwrap_or(false))
}

async fn probe_routing_enabled(router: &SessionRouter) -> Result<bool, GatewayError> {
    let outcome = router
        .run_eager(
            &SessionOptions::system_read(),
            "CALL dbms.listConfig() YIELD name, value \
             WHERE name = 'dbms.routing.enabled' \
             RETURN toBoolean(value) AS enabled",
            HashMap::new(),
        )
        .await?;
    Ok(matches!(
        outcome.records.first().and_then(|record| record.first()),
        Some(BoltValue::Boolean(true))
    ))
}
