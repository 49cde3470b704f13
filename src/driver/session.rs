//! Session acquisition and query execution.
//!
//! A session is the exclusive use of one pooled connection for one
//! statement. Its options (access mode, database, impersonated user,
//! bookmarks) travel in the Bolt `extra` dictionary of BEGIN or of an
//! auto-commit RUN. Managed executions wrap the statement in
//! BEGIN … COMMIT and retry transient failures; implicit executions run
//! auto-commit and are never retried.

use std::collections::HashMap;
use std::sync::Arc;

use boltr::client::BoltConnection;
use boltr::message::{ClientMessage, ServerMessage};
use boltr::types::{BoltDict, BoltValue};
use tokio::sync::mpsc;

use super::bookmarks::BookmarkManager;
use super::pool::{ConnectionPool, PooledConnection};
use super::retry::ExponentialBackoff;
use super::stream::{pump_records, PumpOutcome, RecordStream, StreamEvent};
use super::summary::{
    fields_from_metadata, server_error_from_metadata, ResultSummary,
};
use crate::errors::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// BEGIN … COMMIT wrapped, retried on transient failures.
    Managed,
    /// Auto-commit RUN; required for statements that manage their own
    /// transactions, never retried.
    AutoCommit,
}

/// Everything that shapes one session acquisition.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Target database; `None` lets the server pick its default (used by
    /// the capability and authentication probes).
    pub database: Option<String>,
    pub access_mode: AccessMode,
    pub impersonated_user: Option<String>,
    pub transaction: TransactionKind,
}

impl SessionOptions {
    /// A read-mode auto-commit session under the plain service identity.
    pub fn system_read() -> Self {
        SessionOptions {
            database: None,
            access_mode: AccessMode::Read,
            impersonated_user: None,
            transaction: TransactionKind::AutoCommit,
        }
    }
}

/// A fully collected result.
#[derive(Debug, Default)]
pub struct EagerOutcome {
    pub columns: Vec<String>,
    pub records: Vec<Vec<BoltValue>>,
    pub summary: ResultSummary,
}

/// Routes statements to sessions with the right options and drives them
/// through the pool. Shared process-wide.
pub struct SessionRouter {
    pool: Arc<ConnectionPool>,
    bookmarks: Arc<BookmarkManager>,
    fetch_size: i64,
    backoff: ExponentialBackoff,
}

impl SessionRouter {
    pub fn new(pool: Arc<ConnectionPool>, bookmarks: Arc<BookmarkManager>, fetch_size: i64) -> Self {
        SessionRouter {
            pool,
            bookmarks,
            fetch_size,
            backoff: ExponentialBackoff::default(),
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Runs a statement and collects every record before returning.
    pub async fn run_eager(
        &self,
        options: &SessionOptions,
        query: &str,
        parameters: HashMap<String, BoltValue>,
    ) -> Result<EagerOutcome, GatewayError> {
        match options.transaction {
            TransactionKind::AutoCommit => self.attempt_eager(options, query, parameters).await,
            TransactionKind::Managed => {
                let mut delays = self.backoff.delays();
                loop {
                    match self.attempt_eager(options, query, parameters.clone()).await {
                        Ok(outcome) => return Ok(outcome),
                        Err(e) if e.is_retriable() => match delays.next() {
                            Some(delay) => {
                                log::warn!(
                                    "transient failure, retrying in {:?}: {}",
                                    delay,
                                    e
                                );
                                tokio::time::sleep(delay).await;
                            }
                            None => return Err(e),
                        },
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }

    async fn attempt_eager(
        &self,
        options: &SessionOptions,
        query: &str,
        parameters: HashMap<String, BoltValue>,
    ) -> Result<EagerOutcome, GatewayError> {
        let mut pooled = self.pool.acquire().await?;
        let result = self
            .execute_eager(pooled.conn(), options, query, parameters)
            .await;
        if matches!(&result, Err(GatewayError::Transport(_))) {
            pooled.mark_broken();
        }
        result
    }

    async fn execute_eager(
        &self,
        conn: &mut BoltConnection,
        options: &SessionOptions,
        query: &str,
        parameters: HashMap<String, BoltValue>,
    ) -> Result<EagerOutcome, GatewayError> {
        let extra = self.session_extra(options);
        match options.transaction {
            TransactionKind::Managed => {
                conn.begin(extra).await.map_err(GatewayError::from_bolt)?;
                let run_meta = conn
                    .run(query, parameters, BoltDict::new())
                    .await
                    .map_err(GatewayError::from_bolt)?;
                let columns = fields_from_metadata(&run_meta);
                let (records, mut summary) = self.collect_records(conn).await?;
                let commit_meta = conn.commit().await.map_err(GatewayError::from_bolt)?;
                summary.merge(ResultSummary::from_metadata(&commit_meta));
                self.bookmarks
                    .update(options.database.as_deref(), summary.bookmark.clone());
                Ok(EagerOutcome {
                    columns,
                    records,
                    summary,
                })
            }
            TransactionKind::AutoCommit => {
                let run_meta = conn
                    .run(query, parameters, extra)
                    .await
                    .map_err(GatewayError::from_bolt)?;
                let columns = fields_from_metadata(&run_meta);
                let (records, summary) = self.collect_records(conn).await?;
                self.bookmarks
                    .update(options.database.as_deref(), summary.bookmark.clone());
                Ok(EagerOutcome {
                    columns,
                    records,
                    summary,
                })
            }
        }
    }

    async fn collect_records(
        &self,
        conn: &mut BoltConnection,
    ) -> Result<(Vec<Vec<BoltValue>>, ResultSummary), GatewayError> {
        let mut records = Vec::new();
        let mut summary = ResultSummary::default();
        loop {
            conn.send(&ClientMessage::pull_n(self.fetch_size))
                .await
                .map_err(GatewayError::from_bolt)?;
            loop {
                match conn.recv().await.map_err(GatewayError::from_bolt)? {
                    ServerMessage::Record { data } => records.push(data),
                    ServerMessage::Success { metadata } => {
                        let batch = ResultSummary::from_metadata(&metadata);
                        let has_more = batch.has_more;
                        summary.merge(batch);
                        if has_more {
                            break;
                        }
                        return Ok((records, summary));
                    }
                    ServerMessage::Failure { metadata } => {
                        return Err(GatewayError::Database(server_error_from_metadata(
                            &metadata,
                        )));
                    }
                    ServerMessage::Ignored => {
                        return Err(GatewayError::Transport(
                            "server ignored PULL request".into(),
                        ));
                    }
                }
            }
        }
    }

    /// Starts a statement and hands back a lazily pulled record stream. The
    /// retry window for managed executions closes once the RUN has been
    /// accepted; after the first record is on its way, failures are
    /// terminal.
    pub async fn run_stream(
        &self,
        options: &SessionOptions,
        query: &str,
        parameters: HashMap<String, BoltValue>,
    ) -> Result<RecordStream, GatewayError> {
        let mut delays = self.backoff.delays();
        let (pooled, columns) = loop {
            match self.start_stream(options, query, parameters.clone()).await {
                Ok(started) => break started,
                Err(e)
                    if options.transaction == TransactionKind::Managed && e.is_retriable() =>
                {
                    match delays.next() {
                        Some(delay) => {
                            log::warn!("transient failure, retrying in {:?}: {}", delay, e);
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        };

        let capacity = (self.fetch_size / 2).max(1) as usize;
        let (tx, rx) = mpsc::channel(capacity);
        let fetch_size = self.fetch_size;
        let managed = options.transaction == TransactionKind::Managed;
        let database = options.database.clone();
        let bookmarks = Arc::clone(&self.bookmarks);

        tokio::spawn(async move {
            let mut pooled = pooled;
            match pump_records(pooled.conn(), &tx, fetch_size).await {
                PumpOutcome::Complete(mut summary) => {
                    if managed {
                        match pooled.conn().commit().await {
                            Ok(commit_meta) => {
                                summary.merge(ResultSummary::from_metadata(&commit_meta));
                            }
                            Err(e) => {
                                pooled.mark_broken();
                                let _ = tx.send(StreamEvent::Error(GatewayError::from_bolt(e))).await;
                                return;
                            }
                        }
                    }
                    bookmarks.update(database.as_deref(), summary.bookmark.clone());
                    let _ = tx.send(StreamEvent::End(Box::new(summary))).await;
                }
                PumpOutcome::Cancelled => {
                    log::debug!("record stream cancelled by consumer");
                    if managed {
                        if let Err(e) = pooled.conn().rollback().await {
                            log::debug!("rollback after cancellation failed: {}", e);
                            pooled.mark_broken();
                        }
                    }
                }
                PumpOutcome::Failed(e) => {
                    if matches!(&e, GatewayError::Transport(_)) {
                        pooled.mark_broken();
                    }
                    let _ = tx.send(StreamEvent::Error(e)).await;
                }
            }
        });

        Ok(RecordStream::new(columns, rx))
    }

    async fn start_stream(
        &self,
        options: &SessionOptions,
        query: &str,
        parameters: HashMap<String, BoltValue>,
    ) -> Result<(PooledConnection, Vec<String>), GatewayError> {
        let mut pooled = self.pool.acquire().await?;
        let extra = self.session_extra(options);
        let started = async {
            let run_meta = match options.transaction {
                TransactionKind::Managed => {
                    pooled
                        .conn()
                        .begin(extra)
                        .await
                        .map_err(GatewayError::from_bolt)?;
                    pooled
                        .conn()
                        .run(query, parameters, BoltDict::new())
                        .await
                        .map_err(GatewayError::from_bolt)?
                }
                TransactionKind::AutoCommit => pooled
                    .conn()
                    .run(query, parameters, extra)
                    .await
                    .map_err(GatewayError::from_bolt)?,
            };
            Ok(fields_from_metadata(&run_meta))
        }
        .await;
        match started {
            Ok(columns) => Ok((pooled, columns)),
            Err(e) => {
                if matches!(&e, GatewayError::Transport(_)) {
                    pooled.mark_broken();
                }
                Err(e)
            }
        }
    }

    fn session_extra(&self, options: &SessionOptions) -> BoltDict {
        let mut extra = BoltDict::new();
        if options.access_mode == AccessMode::Read {
            extra.insert("mode".to_string(), BoltValue::String("r".to_string()));
        }
        if let Some(db) = &options.database {
            extra.insert("db".to_string(), BoltValue::String(db.clone()));
        }
        if let Some(user) = &options.impersonated_user {
            extra.insert("imp_user".to_string(), BoltValue::String(user.clone()));
        }
        let bookmarks = self.bookmarks.snapshot(options.database.as_deref());
        if !bookmarks.is_empty() {
            extra.insert(
                "bookmarks".to_string(),
                BoltValue::List(bookmarks.into_iter().map(BoltValue::String).collect()),
            );
        }
        extra
    }
}
