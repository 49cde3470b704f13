//! Execution orchestration: the two public operations of the gateway.
//!
//! `run` executes a container of statements sequentially, isolating
//! per-statement database errors so later statements still run; `stream`
//! produces a lazy record sequence for a single statement. Both derive each
//! statement's requirements through the evaluator and acquire a fresh
//! session per statement through the router.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use boltr::types::BoltValue;

use crate::auth::{AuthAdapter, Principal};
use crate::capabilities::{Capabilities, CapabilitiesProbe};
use crate::config::GatewayConfig;
use crate::cypher::{ExecutionRequirements, QueryEvaluator, Target, TransactionMode};
use crate::driver::{
    AccessMode, BookmarkManager, ConnectionPool, Counters, Notification, PoolConfig, RecordStream,
    SessionOptions, SessionRouter, TransactionKind,
};
use crate::errors::{GatewayError, ServerError};

/// Requested projection of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    Row,
    Graph,
}

impl ResultFormat {
    /// Case-insensitive, matching the HTTP API's `resultDataContents`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "row" => Some(ResultFormat::Row),
            "graph" => Some(ResultFormat::Graph),
            _ => None,
        }
    }
}

/// One statement, normalized and ready to execute.
#[derive(Debug, Clone)]
pub struct AnnotatedQuery {
    pub text: String,
    pub parameters: HashMap<String, BoltValue>,
    pub include_stats: bool,
    pub result_formats: Vec<ResultFormat>,
}

impl AnnotatedQuery {
    pub fn new(
        text: &str,
        parameters: HashMap<String, BoltValue>,
        include_stats: bool,
        result_formats: Vec<ResultFormat>,
    ) -> Result<Self, GatewayError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GatewayError::InvalidParameter(
                "Statement text must not be empty".to_string(),
            ));
        }
        let result_formats = if result_formats.is_empty() {
            vec![ResultFormat::Row]
        } else {
            result_formats
        };
        Ok(AnnotatedQuery {
            text: text.to_string(),
            parameters,
            include_stats,
            result_formats,
        })
    }

    pub fn wants(&self, format: ResultFormat) -> bool {
        self.result_formats.contains(&format)
    }
}

/// A batch of statements that execute sequentially on one logical stream.
#[derive(Debug, Default)]
pub struct QueryContainer {
    pub statements: Vec<AnnotatedQuery>,
}

/// One statement's fully collected outcome.
#[derive(Debug)]
pub enum EagerResult {
    Success(SuccessResult),
    Failure { error: ServerError },
}

#[derive(Debug)]
pub struct SuccessResult {
    pub columns: Vec<String>,
    pub records: Vec<Vec<BoltValue>>,
    pub counters: Counters,
    pub include_stats: bool,
    pub result_formats: Vec<ResultFormat>,
}

/// Accumulated outcome of a batch execution: results interleaved in
/// submission order, captured errors in order, and deduplicated
/// notifications.
#[derive(Debug, Default)]
pub struct ResultContainer {
    pub results: Vec<EagerResult>,
    pub notifications: Vec<Notification>,
    pub errors: Vec<ServerError>,
    seen_notifications: HashSet<(String, i64)>,
}

impl ResultContainer {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_notifications(&mut self, notifications: Vec<Notification>) {
        for notification in notifications {
            if self.seen_notifications.insert(notification.dedup_key()) {
                self.notifications.push(notification);
            }
        }
    }

    fn add_failure(&mut self, error: ServerError) {
        self.errors.push(error.clone());
        self.results.push(EagerResult::Failure { error });
    }
}

/// The process-wide context threaded through every handler: driver pool,
/// router, evaluator, capability snapshot, and the auth adapter.
pub struct Gateway {
    pub config: GatewayConfig,
    pub router: SessionRouter,
    pub evaluator: QueryEvaluator,
    pub auth: AuthAdapter,
    capabilities: CapabilitiesProbe,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        let pool = ConnectionPool::new(PoolConfig {
            address: config.bolt_address(),
            username: config.driver_username.clone(),
            password: config.driver_password.clone(),
            max_connections: config.max_connections,
        });
        let bookmarks = Arc::new(BookmarkManager::new());
        let router = SessionRouter::new(pool, bookmarks, config.fetch_size);
        let auth = AuthAdapter::new(config.driver_username.clone(), &config.driver_password);
        Gateway {
            router,
            evaluator: QueryEvaluator::new(),
            auth,
            capabilities: CapabilitiesProbe::new(),
            config,
        }
    }

    pub async fn capabilities(&self) -> Capabilities {
        self.capabilities.get(&self.router, &self.config).await
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Principal, GatewayError> {
        self.auth.authenticate(&self.router, username, password).await
    }

    /// Executes a batch. Statements run in submission order; a database
    /// error is captured and the batch continues; invalid queries,
    /// authentication and transport failures abort the whole batch.
    pub async fn run(
        &self,
        principal: &Principal,
        database: &str,
        container: QueryContainer,
    ) -> Result<ResultContainer, GatewayError> {
        let capabilities = self.capabilities().await;
        let mut out = ResultContainer::new();

        for query in &container.statements {
            let requirements = match self
                .evaluator
                .evaluate(&self.router, capabilities, database, &query.text)
                .await
            {
                Ok(requirements) => requirements,
                Err(GatewayError::Database(error)) => {
                    out.add_failure(error);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let options = self.session_options(principal, database, capabilities, requirements);
            match self
                .router
                .run_eager(&options, &query.text, query.parameters.clone())
                .await
            {
                Ok(outcome) => {
                    out.add_notifications(outcome.summary.notifications.clone());
                    out.results.push(EagerResult::Success(SuccessResult {
                        columns: outcome.columns,
                        records: outcome.records,
                        counters: outcome.summary.counters,
                        include_stats: query.include_stats,
                        result_formats: query.result_formats.clone(),
                    }));
                }
                Err(GatewayError::Database(error)) => out.add_failure(error),
                Err(e) => return Err(e),
            }
        }

        Ok(out)
    }

    /// Starts a single statement and returns its lazy record stream.
    pub async fn stream(
        &self,
        principal: &Principal,
        database: &str,
        query: &AnnotatedQuery,
    ) -> Result<RecordStream, GatewayError> {
        let capabilities = self.capabilities().await;
        let requirements = self
            .evaluator
            .evaluate(&self.router, capabilities, database, &query.text)
            .await?;
        let options = self.session_options(principal, database, capabilities, requirements);
        self.router
            .run_stream(&options, &query.text, query.parameters.clone())
            .await
    }

    fn session_options(
        &self,
        principal: &Principal,
        database: &str,
        capabilities: Capabilities,
        requirements: ExecutionRequirements,
    ) -> SessionOptions {
        SessionOptions {
            database: Some(database.to_string()),
            access_mode: match requirements.target {
                Target::Readers => AccessMode::Read,
                // AUTO routes itself; the gateway sends it as a write.
                Target::Writers | Target::Auto => AccessMode::Write,
            },
            impersonated_user: capabilities
                .enterprise_edition
                .then(|| principal.username.clone()),
            transaction: match requirements.mode {
                TransactionMode::Managed => TransactionKind::Managed,
                TransactionMode::Implicit => TransactionKind::AutoCommit,
            },
        }
    }
}
