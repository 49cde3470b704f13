//! Process-wide bookmark bookkeeping.
//!
//! The gateway presents one causal chain per database: every committed
//! transaction's bookmark replaces the previous one for that database, and
//! every new session starts from the latest bookmark so a client reading
//! after a write through this gateway observes its own writes.

use std::collections::HashMap;
use std::sync::Mutex;

const DEFAULT_DATABASE_KEY: &str = "";

#[derive(Debug, Default)]
pub struct BookmarkManager {
    latest: Mutex<HashMap<String, String>>,
}

impl BookmarkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bookmarks a new session against `database` must wait for.
    pub fn snapshot(&self, database: Option<&str>) -> Vec<String> {
        let latest = self.latest.lock().expect("bookmark lock");
        latest
            .get(database.unwrap_or(DEFAULT_DATABASE_KEY))
            .map(|b| vec![b.clone()])
            .unwrap_or_default()
    }

    /// Advances the chain for `database`. A `None` bookmark (summary without
    /// one, e.g. a failed or read-only system query) leaves the chain alone.
    pub fn update(&self, database: Option<&str>, bookmark: Option<String>) {
        let Some(bookmark) = bookmark else { return };
        let mut latest = self.latest.lock().expect("bookmark lock");
        latest.insert(
            database.unwrap_or(DEFAULT_DATABASE_KEY).to_string(),
            bookmark,
        );
    }
}
