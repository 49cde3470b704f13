//! Decoding of Bolt SUCCESS metadata into typed summaries.
//!
//! RUN answers with the column names (`fields`), every PULL answers with a
//! summary that may carry `has_more`, update counters (`stats`), server
//! notifications, an `EXPLAIN` plan tree, and the causal bookmark.

use std::collections::HashSet;

use boltr::types::{BoltDict, BoltValue};

use crate::errors::ServerError;

/// Code and message from a FAILURE metadata dictionary.
pub fn server_error_from_metadata(meta: &BoltDict) -> ServerError {
    ServerError::new(
        meta.get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("Neo.DatabaseError.General.UnknownError"),
        meta.get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("the server reported no error message"),
    )
}

/// Column names from a RUN SUCCESS.
pub fn fields_from_metadata(meta: &BoltDict) -> Vec<String> {
    match meta.get("fields") {
        Some(BoltValue::List(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

/// Summary of a completed (or partially pulled) result.
#[derive(Debug, Clone, Default)]
pub struct ResultSummary {
    pub has_more: bool,
    pub bookmark: Option<String>,
    pub database: Option<String>,
    pub counters: Counters,
    pub notifications: Vec<Notification>,
    pub plan: Option<Plan>,
}

impl ResultSummary {
    pub fn from_metadata(meta: &BoltDict) -> Self {
        ResultSummary {
            has_more: matches!(meta.get("has_more"), Some(BoltValue::Boolean(true))),
            bookmark: get_string(meta, "bookmark"),
            database: get_string(meta, "db"),
            counters: match meta.get("stats") {
                Some(BoltValue::Dict(stats)) => Counters::from_stats(stats),
                _ => Counters::default(),
            },
            notifications: Notification::from_metadata(meta),
            plan: match meta.get("plan") {
                Some(value) => Plan::from_value(value),
                None => None,
            },
        }
    }

    /// Folds another partial summary into this one; PULL summaries arrive
    /// once per batch and only the last carries the counters and bookmark.
    pub fn merge(&mut self, other: ResultSummary) {
        self.has_more = other.has_more;
        if other.bookmark.is_some() {
            self.bookmark = other.bookmark;
        }
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.counters.contains_updates || !other.counters.is_empty() {
            self.counters = other.counters;
        }
        self.notifications.extend(other.notifications);
        if other.plan.is_some() {
            self.plan = other.plan;
        }
    }
}

fn get_string(meta: &BoltDict, key: &str) -> Option<String> {
    meta.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn get_int(meta: &BoltDict, key: &str) -> i64 {
    meta.get(key).and_then(|v| v.as_int()).unwrap_or(0)
}

/// Update counters from the `stats` summary entry. The wire uses
/// dash-separated keys and omits zero counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    pub nodes_created: i64,
    pub nodes_deleted: i64,
    pub relationships_created: i64,
    pub relationships_deleted: i64,
    pub properties_set: i64,
    pub labels_added: i64,
    pub labels_removed: i64,
    pub indexes_added: i64,
    pub indexes_removed: i64,
    pub constraints_added: i64,
    pub constraints_removed: i64,
    pub system_updates: i64,
    pub contains_updates: bool,
    pub contains_system_updates: bool,
}

impl Counters {
    pub fn from_stats(stats: &BoltDict) -> Self {
        let mut counters = Counters {
            nodes_created: get_int(stats, "nodes-created"),
            nodes_deleted: get_int(stats, "nodes-deleted"),
            relationships_created: get_int(stats, "relationships-created"),
            relationships_deleted: get_int(stats, "relationships-deleted"),
            properties_set: get_int(stats, "properties-set"),
            labels_added: get_int(stats, "labels-added"),
            labels_removed: get_int(stats, "labels-removed"),
            indexes_added: get_int(stats, "indexes-added"),
            indexes_removed: get_int(stats, "indexes-removed"),
            constraints_added: get_int(stats, "constraints-added"),
            constraints_removed: get_int(stats, "constraints-removed"),
            system_updates: get_int(stats, "system-updates"),
            contains_updates: matches!(stats.get("contains-updates"), Some(BoltValue::Boolean(true))),
            contains_system_updates: matches!(
                stats.get("contains-system-updates"),
                Some(BoltValue::Boolean(true))
            ),
        };
        if !counters.contains_system_updates {
            counters.contains_system_updates = counters.system_updates != 0;
        }
        if !counters.contains_updates {
            counters.contains_updates = !counters.is_empty() && counters.system_updates == 0;
        }
        counters
    }

    pub fn is_empty(&self) -> bool {
        self.nodes_created == 0
            && self.nodes_deleted == 0
            && self.relationships_created == 0
            && self.relationships_deleted == 0
            && self.properties_set == 0
            && self.labels_added == 0
            && self.labels_removed == 0
            && self.indexes_added == 0
            && self.indexes_removed == 0
            && self.constraints_added == 0
            && self.constraints_removed == 0
            && self.system_updates == 0
    }
}

/// A server warning attached to a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub code: String,
    pub title: String,
    pub description: String,
    pub severity: String,
    pub position: Option<NotificationPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPosition {
    pub offset: i64,
    pub line: i64,
    pub column: i64,
}

impl Notification {
    fn from_metadata(meta: &BoltDict) -> Vec<Notification> {
        let Some(BoltValue::List(items)) = meta.get("notifications") else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| match item {
                BoltValue::Dict(entry) => Some(Notification {
                    code: get_string(entry, "code").unwrap_or_default(),
                    title: get_string(entry, "title").unwrap_or_default(),
                    description: get_string(entry, "description").unwrap_or_default(),
                    severity: get_string(entry, "severity").unwrap_or_default(),
                    position: match entry.get("position") {
                        Some(BoltValue::Dict(pos)) => Some(NotificationPosition {
                            offset: get_int(pos, "offset"),
                            line: get_int(pos, "line"),
                            column: get_int(pos, "column"),
                        }),
                        _ => None,
                    },
                }),
                _ => None,
            })
            .collect()
    }

    /// Deduplication key: notifications repeated across statements collapse
    /// when they share a code and query position.
    pub fn dedup_key(&self) -> (String, i64) {
        (
            self.code.clone(),
            self.position.map(|p| p.offset).unwrap_or(-1),
        )
    }
}

/// An `EXPLAIN` plan node. Only the operator names matter to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub op_type: String,
    pub children: Vec<Plan>,
}

impl Plan {
    pub fn from_value(value: &BoltValue) -> Option<Plan> {
        let BoltValue::Dict(map) = value else {
            return None;
        };
        let op_type = get_string(map, "operatorType").unwrap_or_default();
        let children = match map.get("children") {
            Some(BoltValue::List(items)) => items.iter().filter_map(Plan::from_value).collect(),
            _ => Vec::new(),
        };
        Some(Plan { op_type, children })
    }

    /// Collects every operator name in the tree, raw (unnormalized).
    pub fn operator_names(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        self.collect_into(&mut names);
        names
    }

    fn collect_into(&self, names: &mut HashSet<String>) {
        names.insert(self.op_type.clone());
        for child in &self.children {
            child.collect_into(names);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boltr::types::BoltDict;

    fn dict(entries: &[(&str, BoltValue)]) -> BoltDict {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_fields_extraction() {
        let meta = dict(&[(
            "fields",
            BoltValue::List(vec![
                BoltValue::String("n".into()),
                BoltValue::String("m".into()),
            ]),
        )]);
        assert_eq!(fields_from_metadata(&meta), vec!["n", "m"]);
        assert!(fields_from_metadata(&BoltDict::new()).is_empty());
    }

    #[test]
    fn test_counters_from_stats() {
        let stats = dict(&[
            ("nodes-created", BoltValue::Integer(1)),
            ("labels-added", BoltValue::Integer(1)),
            ("properties-set", BoltValue::Integer(1)),
        ]);
        let counters = Counters::from_stats(&stats);
        assert_eq!(counters.nodes_created, 1);
        assert_eq!(counters.labels_added, 1);
        assert!(counters.contains_updates);
    }

    #[test]
    fn test_plan_tree_names() {
        let plan = dict(&[
            ("operatorType", BoltValue::String("ProduceResults@neo4j".into())),
            (
                "children",
                BoltValue::List(vec![BoltValue::Dict(dict(&[(
                    "operatorType",
                    BoltValue::String("Create".into()),
                )]))]),
            ),
        ]);
        let plan = Plan::from_value(&BoltValue::Dict(plan)).unwrap();
        let names = plan.operator_names();
        assert!(names.contains("ProduceResults@neo4j"));
        assert!(names.contains("Create"));
    }

    #[test]
    fn test_notifications_and_position() {
        let meta = dict(&[(
            "notifications",
            BoltValue::List(vec![BoltValue::Dict(dict(&[
                (
                    "code",
                    BoltValue::String("Neo.ClientNotification.Statement.CartesianProduct".into()),
                ),
                ("severity", BoltValue::String("WARNING".into())),
                (
                    "position",
                    BoltValue::Dict(dict(&[
                        ("offset", BoltValue::Integer(7)),
                        ("line", BoltValue::Integer(1)),
                        ("column", BoltValue::Integer(8)),
                    ])),
                ),
            ]))]),
        )]);
        let summary = ResultSummary::from_metadata(&meta);
        assert_eq!(summary.notifications.len(), 1);
        let n = &summary.notifications[0];
        assert_eq!(n.position.unwrap().offset, 7);
        assert_eq!(
            n.dedup_key(),
            (
                "Neo.ClientNotification.Statement.CartesianProduct".to_string(),
                7
            )
        );
    }

    #[test]
    fn test_has_more_and_bookmark() {
        let meta = dict(&[("has_more", BoltValue::Boolean(true))]);
        assert!(ResultSummary::from_metadata(&meta).has_more);
        let meta = dict(&[("bookmark", BoltValue::String("FB:kcwQ".into()))]);
        let summary = ResultSummary::from_metadata(&meta);
        assert!(!summary.has_more);
        assert_eq!(summary.bookmark.as_deref(), Some("FB:kcwQ"));
    }
}
