//! JSON ↔ Cypher value mapping.
//!
//! This is the only place where dynamic shape exists in the gateway: the
//! request direction ([`json_to_bolt`]) turns parameter documents into Bolt
//! values, the response direction ([`bolt_to_json`]) renders Bolt values in
//! the tagged "new" format, and [`legacy`] builds the classic
//! columns/row/meta/graph view of the Neo4j HTTP API.

pub mod bolt_to_json;
pub mod json_to_bolt;
pub mod legacy;
pub mod temporal;

pub use bolt_to_json::encode_value;
pub use json_to_bolt::{decode_parameters, decode_value};

use boltr::types::{BoltNode, BoltPath, BoltUnboundRelationship};

/// One element of a path, in traversal order.
pub enum PathStep<'a> {
    Node(&'a BoltNode),
    Relationship {
        rel: &'a BoltUnboundRelationship,
        start_id: i64,
        end_id: i64,
    },
}

/// Expands a Bolt path into its alternating node/relationship sequence.
///
/// The wire format carries deduplicated node and relationship lists plus an
/// index sequence of (signed 1-based relationship index, 0-based node index)
/// pairs; a negative relationship index means the relationship is traversed
/// against its stored direction. A malformed sequence is cut short rather
/// than rejected.
pub fn walk_path(path: &BoltPath) -> Vec<PathStep<'_>> {
    let mut steps = Vec::new();
    let Some(first) = path.nodes.first() else {
        return steps;
    };
    steps.push(PathStep::Node(first));
    let mut last = first;
    for pair in path.indices.chunks(2) {
        let [rel_idx, node_idx] = pair else { break };
        let Some(next) = path.nodes.get(*node_idx as usize) else {
            break;
        };
        let step = if *rel_idx > 0 {
            path.rels.get((rel_idx - 1) as usize).map(|rel| PathStep::Relationship {
                rel,
                start_id: last.id,
                end_id: next.id,
            })
        } else {
            path.rels.get((-rel_idx - 1) as usize).map(|rel| PathStep::Relationship {
                rel,
                start_id: next.id,
                end_id: last.id,
            })
        };
        let Some(step) = step else { break };
        steps.push(step);
        steps.push(PathStep::Node(next));
        last = next;
    }
    steps
}

/// Coordinate reference systems for the four SRIDs Neo4j ships. The
/// registry links are decorative metadata preserved from the original API.
pub fn crs_for_srid(srid: i64) -> Option<(&'static str, &'static str)> {
    match srid {
        4326 => Some(("wgs-84", "http://spatialreference.org/ref/epsg/4326/ogcwkt/")),
        4979 => Some(("wgs-84-3d", "http://spatialreference.org/ref/epsg/4979/ogcwkt/")),
        7203 => Some(("cartesian", "http://spatialreference.org/ref/sr-org/7203/ogcwkt/")),
        9157 => Some(("cartesian-3d", "http://spatialreference.org/ref/sr-org/9157/ogcwkt/")),
        _ => None,
    }
}
