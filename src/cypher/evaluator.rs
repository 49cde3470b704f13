//! Derives a statement's execution requirements: where it may be routed
//! (readers / writers / server-side) and whether it must run auto-commit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::OnceCell;

use super::operators::plan_requires_writers;
use super::scanner;
use crate::capabilities::Capabilities;
use crate::driver::{SessionOptions, SessionRouter};
use crate::errors::GatewayError;

/// Where a statement may be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Readers,
    Writers,
    /// Server-side routing available: the cluster decides.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Retriable, wrapped in a driver transaction function.
    Managed,
    /// Auto-commit; the statement manages its own transactions.
    Implicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionRequirements {
    pub target: Target,
    pub mode: TransactionMode,
}

lazy_static! {
    // Cheap gates only; the token scanner makes the final call so that
    // backticked identifiers never flag.
    static ref CALL_IN_TX_PREFILTER: Regex =
        Regex::new(r"(?is)\bCALL\b.*\bIN\s+TRANSACTIONS\b").expect("valid regex");
    static ref PERIODIC_COMMIT_PREFILTER: Regex =
        Regex::new(r"(?i)\bUSING\s+PERIODIC\s+COMMIT\b").expect("valid regex");
}

/// A statement is implicit iff it contains `CALL { … } IN TRANSACTIONS` or
/// `USING PERIODIC COMMIT` outside of quotes. A failed scan defaults to
/// managed.
pub fn transaction_mode(text: &str) -> TransactionMode {
    if !CALL_IN_TX_PREFILTER.is_match(text) && !PERIODIC_COMMIT_PREFILTER.is_match(text) {
        return TransactionMode::Managed;
    }
    match scanner::scan_statement(text) {
        Some(flags) if flags.any() => TransactionMode::Implicit,
        _ => TransactionMode::Managed,
    }
}

/// Caches requirements per query text; each entry is computed at most once
/// even under concurrent first use. Invalidation is process restart.
pub struct QueryEvaluator {
    cache: Mutex<HashMap<String, Arc<OnceCell<ExecutionRequirements>>>>,
}

impl Default for QueryEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEvaluator {
    pub fn new() -> Self {
        QueryEvaluator {
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn evaluate(
        &self,
        router: &SessionRouter,
        capabilities: Capabilities,
        database: &str,
        text: &str,
    ) -> Result<ExecutionRequirements, GatewayError> {
        let cell = {
            let mut cache = self.cache.lock().expect("evaluator cache lock");
            Arc::clone(cache.entry(text.to_string()).or_default())
        };
        cell.get_or_try_init(|| self.compute(router, capabilities, database, text))
            .await
            .map(|requirements| *requirements)
    }

    async fn compute(
        &self,
        router: &SessionRouter,
        capabilities: Capabilities,
        database: &str,
        text: &str,
    ) -> Result<ExecutionRequirements, GatewayError> {
        let mode = transaction_mode(text);
        let target = if capabilities.ssr_available {
            Target::Auto
        } else {
            self.explain_target(router, database, text).await?
        };
        log::debug!("evaluated query: target={:?} mode={:?}", target, mode);
        Ok(ExecutionRequirements { target, mode })
    }

    /// Classifies by running `EXPLAIN` on a read-mode session and checking
    /// the plan's operators against the updating set.
    async fn explain_target(
        &self,
        router: &SessionRouter,
        database: &str,
        text: &str,
    ) -> Result<Target, GatewayError> {
        let options = SessionOptions {
            database: Some(database.to_string()),
            ..SessionOptions::system_read()
        };
        let explained = format!("EXPLAIN {}", text);
        let outcome = router.run_eager(&options, &explained, HashMap::new()).await;
        match outcome {
            Ok(outcome) => {
                let Some(plan) = outcome.summary.plan else {
                    // No plan in the summary: assume the worst.
                    return Ok(Target::Writers);
                };
                let names = plan.operator_names();
                if plan_requires_writers(names.iter().map(String::as_str)) {
                    Ok(Target::Writers)
                } else {
                    Ok(Target::Readers)
                }
            }
            Err(GatewayError::Database(e)) if e.is_syntax_error() => {
                Err(GatewayError::InvalidQuery(text.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}
