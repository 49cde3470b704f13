//! Plan operator classification for the read/write routing decision.
//!
//! Operator names come from `EXPLAIN` plan trees and arrive decorated, e.g.
//! `Expand(All)@neo4j`; they are normalized before lookup. Anything not in
//! either table is over-approximated as updating so an unknown operator can
//! never be routed to a read replica.

/// Operators that may mutate the graph or the schema.
const UPDATING_OPERATORS: &[&str] = &[
    "Create",
    "Merge",
    "LockingMerge",
    "Delete",
    "DetachDelete",
    "SetLabels",
    "RemoveLabels",
    "SetProperty",
    "SetProperties",
    "SetPropertiesFromMap",
    "SetNodeProperty",
    "SetNodeProperties",
    "SetNodePropertiesFromMap",
    "SetRelationshipProperty",
    "SetRelationshipProperties",
    "SetRelationshipPropertiesFromMap",
    "RemoveProperty",
    "Foreach",
    "ProcedureCall",
    "EmptyResult",
];

/// Read-only operators of the Cypher runtime.
const READ_OPERATORS: &[&str] = &[
    "AllNodesScan",
    "NodeByLabelScan",
    "UnionNodeByLabelsScan",
    "IntersectionNodeByLabelsScan",
    "NodeByIdSeek",
    "NodeByElementIdSeek",
    "NodeIndexSeek",
    "NodeUniqueIndexSeek",
    "NodeIndexSeekByRange",
    "NodeIndexScan",
    "NodeIndexContainsScan",
    "NodeIndexEndsWithScan",
    "MultiNodeIndexSeek",
    "AssertingMultiNodeIndexSeek",
    "DirectedRelationshipByIdSeek",
    "UndirectedRelationshipByIdSeek",
    "DirectedRelationshipByElementIdSeek",
    "UndirectedRelationshipByElementIdSeek",
    "DirectedRelationshipTypeScan",
    "UndirectedRelationshipTypeScan",
    "DirectedUnionRelationshipTypesScan",
    "UndirectedUnionRelationshipTypesScan",
    "DirectedAllRelationshipsScan",
    "UndirectedAllRelationshipsScan",
    "DirectedRelationshipIndexScan",
    "UndirectedRelationshipIndexScan",
    "DirectedRelationshipIndexSeek",
    "UndirectedRelationshipIndexSeek",
    "DirectedRelationshipIndexContainsScan",
    "UndirectedRelationshipIndexContainsScan",
    "DirectedRelationshipIndexEndsWithScan",
    "UndirectedRelationshipIndexEndsWithScan",
    "NodeCountFromCountStore",
    "RelationshipCountFromCountStore",
    "Expand",
    "OptionalExpand",
    "VarLengthExpand",
    "PruningVarLengthExpand",
    "BFSPruningVarLengthExpand",
    "ProjectEndpoints",
    "ShortestPath",
    "StatefulShortestPath",
    "Filter",
    "Projection",
    "CacheProperties",
    "Distinct",
    "OrderedDistinct",
    "EagerAggregation",
    "OrderedAggregation",
    "NodeHashJoin",
    "ValueHashJoin",
    "LeftOuterHashJoin",
    "RightOuterHashJoin",
    "TriadicSelection",
    "TriadicBuild",
    "TriadicFilter",
    "AssertSameNode",
    "AssertSameRelationship",
    "CartesianProduct",
    "Union",
    "OrderedUnion",
    "Unwind",
    "PartitionedUnwind",
    "Apply",
    "SemiApply",
    "AntiSemiApply",
    "Anti",
    "SelectOrSemiApply",
    "SelectOrAntiSemiApply",
    "LetSemiApply",
    "LetAntiSemiApply",
    "LetSelectOrSemiApply",
    "LetSelectOrAntiSemiApply",
    "RollUpApply",
    "Argument",
    "ArgumentTracker",
    "Optional",
    "Sort",
    "PartialSort",
    "Top",
    "Top1WithTies",
    "PartialTop",
    "Limit",
    "ExhaustiveLimit",
    "Skip",
    "Eager",
    "LoadCSV",
    "ProduceResults",
    "EmptyRow",
    "SubqueryForeach",
    "TransactionForeach",
    "TransactionApply",
];

/// Classification of a single (normalized) operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorClass {
    Updating,
    ReadOnly,
    Unknown,
}

/// Strips the `@database` suffix and any parenthesized annotation, e.g.
/// `Expand(All)@neo4j` → `Expand`.
pub fn normalize_operator(raw: &str) -> &str {
    let raw = raw.split('@').next().unwrap_or(raw);
    let raw = raw.split('(').next().unwrap_or(raw);
    raw.trim()
}

pub fn classify_operator(raw: &str) -> OperatorClass {
    let name = normalize_operator(raw);
    if UPDATING_OPERATORS.contains(&name)
        || name.starts_with("Create")
        || name.starts_with("Drop")
    {
        return OperatorClass::Updating;
    }
    if READ_OPERATORS.contains(&name) {
        return OperatorClass::ReadOnly;
    }
    OperatorClass::Unknown
}

/// Whether a plan containing these operators must be routed to writers.
/// Unknown operators count as updating.
pub fn plan_requires_writers<'a>(operators: impl IntoIterator<Item = &'a str>) -> bool {
    operators
        .into_iter()
        .any(|op| classify_operator(op) != OperatorClass::ReadOnly)
}
