//! The classic Neo4j HTTP API view: per-result `columns`, `data[]` with
//! `row[]`/`meta[]`, an optional deduplicated `graph` projection, and the
//! update `stats` object.
//!
//! In this view nothing is tagged: entities collapse to their property maps
//! (their identity moves to the meta slot) and temporals render as bare
//! literals.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use boltr::types::{BoltDict, BoltNode, BoltValue};

use super::bolt_to_json::{
    format_local_datetime, format_local_time, format_offset_datetime, format_offset_time,
    format_zoned_datetime, point_value,
};
use super::temporal::{format_period, format_raw_duration, format_time_duration};
use super::{walk_path, PathStep};
use crate::codec::json_to_bolt::date_from_epoch_days;
use crate::driver::summary::Counters;

/// Renders a value for a legacy `row` slot.
pub fn row_value(value: &BoltValue) -> Value {
    match value {
        BoltValue::Null => Value::Null,
        BoltValue::Boolean(b) => Value::Bool(*b),
        BoltValue::Integer(i) => Value::from(*i),
        BoltValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        BoltValue::String(s) => Value::String(s.clone()),
        BoltValue::Bytes(b) => Value::String(hex::encode(b)),
        BoltValue::List(items) => Value::Array(items.iter().map(row_value).collect()),
        BoltValue::Dict(map) => Value::Object(row_map(map)),
        BoltValue::Node(node) => Value::Object(row_map(&node.properties)),
        BoltValue::Relationship(rel) => Value::Object(row_map(&rel.properties)),
        BoltValue::UnboundRelationship(rel) => Value::Object(row_map(&rel.properties)),
        BoltValue::Path(path) => Value::Array(
            walk_path(path)
                .iter()
                .map(|step| match step {
                    PathStep::Node(n) => Value::Object(row_map(&n.properties)),
                    PathStep::Relationship { rel, .. } => Value::Object(row_map(&rel.properties)),
                })
                .collect(),
        ),
        BoltValue::Date(d) => date_from_epoch_days(d.days)
            .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        BoltValue::Time(t) => Value::String(format_offset_time(t)),
        BoltValue::LocalTime(t) => Value::String(format_local_time(t)),
        BoltValue::DateTime(dt) => Value::String(format_offset_datetime(dt)),
        BoltValue::DateTimeZoneId(dt) => Value::String(format_zoned_datetime(dt)),
        BoltValue::LocalDateTime(dt) => Value::String(format_local_datetime(dt)),
        BoltValue::Duration(d) => {
            let literal = if d.days == 0 && d.seconds == 0 && d.nanoseconds == 0 && d.months != 0 {
                format_period(d.months)
            } else if d.months == 0 && d.days == 0 {
                format_time_duration(d.seconds, d.nanoseconds)
            } else {
                format_raw_duration(d.months, d.days, d.seconds, d.nanoseconds)
            };
            Value::String(literal)
        }
        BoltValue::Point2D(p) => point_value(p.srid, &[p.x, p.y]),
        BoltValue::Point3D(p) => point_value(p.srid, &[p.x, p.y, p.z]),
    }
}

fn row_map(map: &BoltDict) -> Map<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), row_value(v))).collect()
}

/// Renders a value for a legacy `meta` slot. Entities carry their identity
/// here; containers recurse; everything else has no metadata.
pub fn meta_value(value: &BoltValue) -> Value {
    match value {
        BoltValue::Node(node) => entity_meta(node.id, "node"),
        BoltValue::Relationship(rel) => entity_meta(rel.id, "relationship"),
        BoltValue::UnboundRelationship(rel) => entity_meta(rel.id, "relationship"),
        BoltValue::Path(path) => {
            // One (start, relationship, end) triple per segment.
            let steps = walk_path(path);
            let mut metas = Vec::new();
            for window in steps.windows(3) {
                if let [PathStep::Node(start), PathStep::Relationship { rel, .. }, PathStep::Node(end)] =
                    window
                {
                    metas.push(entity_meta(start.id, "node"));
                    metas.push(entity_meta(rel.id, "relationship"));
                    metas.push(entity_meta(end.id, "node"));
                }
            }
            if metas.is_empty() {
                if let Some(PathStep::Node(only)) = steps.first() {
                    metas.push(entity_meta(only.id, "node"));
                }
            }
            Value::Array(metas)
        }
        BoltValue::List(items) => Value::Array(items.iter().map(meta_value).collect()),
        _ => Value::Null,
    }
}

fn entity_meta(id: i64, entity_type: &str) -> Value {
    json!({ "id": id, "type": entity_type, "deleted": false })
}

/// Renders the legacy `stats` object. `relationship_deleted` keeps its
/// historical singular spelling.
pub fn stats_value(counters: &Counters) -> Value {
    json!({
        "contains_updates": counters.contains_updates,
        "nodes_created": counters.nodes_created,
        "nodes_deleted": counters.nodes_deleted,
        "properties_set": counters.properties_set,
        "relationships_created": counters.relationships_created,
        "relationship_deleted": counters.relationships_deleted,
        "labels_added": counters.labels_added,
        "labels_removed": counters.labels_removed,
        "indexes_added": counters.indexes_added,
        "indexes_removed": counters.indexes_removed,
        "constraints_added": counters.constraints_added,
        "constraints_removed": counters.constraints_removed,
        "contains_system_updates": counters.contains_system_updates,
        "system_updates": counters.system_updates,
    })
}

/// Accumulates the graph projection of a result: every node and relationship
/// referenced anywhere in the records, deduplicated by identity.
#[derive(Default)]
pub struct GraphCollector {
    nodes: BTreeMap<i64, Value>,
    relationships: BTreeMap<i64, Value>,
}

impl GraphCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collect(&mut self, value: &BoltValue) {
        match value {
            BoltValue::Node(node) => self.add_node(node),
            BoltValue::Relationship(rel) => {
                self.relationships.entry(rel.id).or_insert_with(|| {
                    json!({
                        "id": rel.id.to_string(),
                        "type": rel.rel_type,
                        "startNode": rel.start_node_id.to_string(),
                        "endNode": rel.end_node_id.to_string(),
                        "properties": Value::Object(row_map(&rel.properties)),
                    })
                });
            }
            BoltValue::Path(path) => {
                for step in walk_path(path) {
                    match step {
                        PathStep::Node(node) => self.add_node(node),
                        PathStep::Relationship { rel, start_id, end_id } => {
                            self.relationships.entry(rel.id).or_insert_with(|| {
                                json!({
                                    "id": rel.id.to_string(),
                                    "type": rel.rel_type,
                                    "startNode": start_id.to_string(),
                                    "endNode": end_id.to_string(),
                                    "properties": Value::Object(row_map(&rel.properties)),
                                })
                            });
                        }
                    }
                }
            }
            BoltValue::List(items) => items.iter().for_each(|item| self.collect(item)),
            BoltValue::Dict(map) => map.values().for_each(|item| self.collect(item)),
            _ => {}
        }
    }

    fn add_node(&mut self, node: &BoltNode) {
        self.nodes.entry(node.id).or_insert_with(|| {
            json!({
                "id": node.id.to_string(),
                "labels": node.labels,
                "properties": Value::Object(row_map(&node.properties)),
            })
        });
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }

    pub fn into_value(self) -> Value {
        json!({
            "nodes": self.nodes.into_values().collect::<Vec<_>>(),
            "relationships": self.relationships.into_values().collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boltr::types::{BoltDate, BoltRelationship};

    fn node_with_name(id: i64, label: &str, name: &str) -> BoltNode {
        let mut props = BoltDict::new();
        props.insert("name".to_string(), BoltValue::String(name.into()));
        BoltNode {
            id,
            labels: vec![label.to_string()],
            properties: props,
            element_id: id.to_string(),
        }
    }

    #[test]
    fn test_node_row_is_property_map() {
        let value = BoltValue::Node(node_with_name(1, "Hello", "World"));
        assert_eq!(row_value(&value), json!({ "name": "World" }));
        assert_eq!(
            meta_value(&value),
            json!({ "id": 1, "type": "node", "deleted": false })
        );
    }

    #[test]
    fn test_scalar_meta_is_null() {
        assert_eq!(meta_value(&BoltValue::Integer(1)), Value::Null);
        assert_eq!(meta_value(&BoltValue::String("x".into())), Value::Null);
    }

    #[test]
    fn test_temporal_rows_are_bare_literals() {
        assert_eq!(
            row_value(&BoltValue::Date(BoltDate { days: 0 })),
            json!("1970-01-01")
        );
    }

    #[test]
    fn test_graph_collector_dedups() {
        let node = BoltValue::Node(node_with_name(1, "Hello", "World"));
        let rel = BoltValue::Relationship(BoltRelationship {
            id: 9,
            start_node_id: 1,
            end_node_id: 1,
            rel_type: "SELF".into(),
            properties: BoltDict::new(),
            element_id: "9".into(),
            start_element_id: "1".into(),
            end_element_id: "1".into(),
        });
        let mut collector = GraphCollector::new();
        collector.collect(&node);
        collector.collect(&node);
        collector.collect(&rel);
        let graph = collector.into_value();
        assert_eq!(graph["nodes"].as_array().unwrap().len(), 1);
        assert_eq!(graph["nodes"][0]["labels"], json!(["Hello"]));
        assert_eq!(graph["relationships"].as_array().unwrap().len(), 1);
        assert_eq!(graph["relationships"][0]["startNode"], json!("1"));
    }

    #[test]
    fn test_stats_keys() {
        let counters = Counters {
            nodes_created: 1,
            labels_added: 1,
            properties_set: 1,
            contains_updates: true,
            ..Default::default()
        };
        let stats = stats_value(&counters);
        assert_eq!(stats["nodes_created"], json!(1));
        assert_eq!(stats["labels_added"], json!(1));
        assert_eq!(stats["properties_set"], json!(1));
        assert_eq!(stats["contains_updates"], json!(true));
        // Historical key spelling.
        assert!(stats.get("relationship_deleted").is_some());
    }
}
