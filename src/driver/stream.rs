//! Incremental record streaming with flow control.
//!
//! Records are pulled in `fetch_size` batches and forwarded through a
//! bounded channel whose capacity is half the watermark, so a slow consumer
//! throttles the gateway instead of the gateway buffering a whole result.
//! Dropping the consumer discards the remainder server-side and returns the
//! connection to the pool.

use boltr::client::BoltConnection;
use boltr::message::{ClientMessage, ServerMessage};
use boltr::types::BoltValue;
use tokio::sync::mpsc;

use super::summary::{server_error_from_metadata, ResultSummary};
use crate::errors::GatewayError;

/// One event of a record stream: zero or more `Record`s, terminated by
/// exactly one `End` or `Error`.
#[derive(Debug)]
pub enum StreamEvent {
    Record(Vec<BoltValue>),
    End(Box<ResultSummary>),
    Error(GatewayError),
}

/// Consumer handle of a streaming execution. The producing task owns the
/// session and shuts it down when this handle is dropped.
pub struct RecordStream {
    columns: Vec<String>,
    rx: mpsc::Receiver<StreamEvent>,
}

impl RecordStream {
    pub(crate) fn new(columns: Vec<String>, rx: mpsc::Receiver<StreamEvent>) -> Self {
        RecordStream { columns, rx }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

/// Result of pumping a started result stream to its consumer.
pub(crate) enum PumpOutcome {
    /// All records delivered; carries the merged final summary.
    Complete(ResultSummary),
    /// The consumer went away; the result was discarded server-side.
    Cancelled,
    Failed(GatewayError),
}

/// Forwards records from the connection into the channel, PULLing
/// `fetch_size` at a time until the result is exhausted.
pub(crate) async fn pump_records(
    conn: &mut BoltConnection,
    tx: &mpsc::Sender<StreamEvent>,
    fetch_size: i64,
) -> PumpOutcome {
    let mut summary = ResultSummary::default();
    loop {
        if let Err(e) = conn.send(&ClientMessage::pull_n(fetch_size)).await {
            return PumpOutcome::Failed(GatewayError::from_bolt(e));
        }
        loop {
            match conn.recv().await {
                Ok(ServerMessage::Record { data }) => {
                    if tx.send(StreamEvent::Record(data)).await.is_err() {
                        return match drain_and_discard(conn).await {
                            Ok(()) => PumpOutcome::Cancelled,
                            Err(e) => PumpOutcome::Failed(e),
                        };
                    }
                }
                Ok(ServerMessage::Success { metadata }) => {
                    let batch = ResultSummary::from_metadata(&metadata);
                    let has_more = batch.has_more;
                    summary.merge(batch);
                    if has_more {
                        break;
                    }
                    return PumpOutcome::Complete(summary);
                }
                Ok(ServerMessage::Failure { metadata }) => {
                    return PumpOutcome::Failed(GatewayError::Database(
                        server_error_from_metadata(&metadata),
                    ));
                }
                Ok(ServerMessage::Ignored) => {
                    return PumpOutcome::Failed(GatewayError::Transport(
                        "server ignored PULL request".into(),
                    ));
                }
                Err(e) => return PumpOutcome::Failed(GatewayError::from_bolt(e)),
            }
        }
    }
}

/// Finishes the in-flight PULL batch without forwarding its records, then
/// DISCARDs whatever the server still holds.
async fn drain_and_discard(conn: &mut BoltConnection) -> Result<(), GatewayError> {
    let has_more = loop {
        match conn.recv().await.map_err(GatewayError::from_bolt)? {
            ServerMessage::Record { .. } => continue,
            ServerMessage::Success { metadata } => {
                break ResultSummary::from_metadata(&metadata).has_more;
            }
            ServerMessage::Failure { metadata } => {
                return Err(GatewayError::Database(server_error_from_metadata(&metadata)));
            }
            ServerMessage::Ignored => {
                return Err(GatewayError::Transport("server ignored PULL request".into()));
            }
        }
    };
    if !has_more {
        return Ok(());
    }
    conn.send(&ClientMessage::discard_all())
        .await
        .map_err(GatewayError::from_bolt)?;
    loop {
        match conn.recv().await.map_err(GatewayError::from_bolt)? {
            ServerMessage::Record { .. } => continue,
            ServerMessage::Success { .. } => return Ok(()),
            ServerMessage::Failure { metadata } => {
                return Err(GatewayError::Database(server_error_from_metadata(&metadata)));
            }
            ServerMessage::Ignored => {
                return Err(GatewayError::Transport(
                    "server ignored DISCARD request".into(),
                ));
            }
        }
    }
}
