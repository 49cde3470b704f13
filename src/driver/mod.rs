//! The Bolt session layer.
//!
//! `boltr` supplies the wire protocol (handshake, PackStream, message
//! framing); this module turns it into what the rest of the gateway needs:
//! a bounded pool of service-authenticated connections, sessions that carry
//! access mode / database / impersonation / bookmarks, managed transactions
//! with transient-failure retry, incremental record streams, and decoded
//! result summaries.

pub mod bookmarks;
pub mod pool;
pub mod retry;
pub mod session;
pub mod stream;
pub mod summary;

pub use bookmarks::BookmarkManager;
pub use pool::{ConnectionPool, PoolConfig};
pub use session::{AccessMode, EagerOutcome, SessionOptions, SessionRouter, TransactionKind};
pub use stream::{RecordStream, StreamEvent};
pub use summary::{Counters, Notification, Plan, ResultSummary};
