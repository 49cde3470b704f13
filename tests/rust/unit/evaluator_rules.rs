//! Classification rules: transaction mode from the statement text, routing
//! target from plan operators.

use test_case::test_case;

use boltgate::cypher::evaluator::{transaction_mode, TransactionMode};
use boltgate::cypher::operators::{classify_operator, plan_requires_writers, OperatorClass};
use boltgate::driver::Plan;
use boltr::types::{BoltDict, BoltValue};

#[test_case("MATCH (n) RETURN n", TransactionMode::Managed; "plain read")]
#[test_case("CREATE (n) RETURN n", TransactionMode::Managed; "plain write")]
#[test_case(
    "USING PERIODIC COMMIT LOAD CSV FROM 'file:///a.csv' AS line CREATE (:Row)",
    TransactionMode::Implicit;
    "periodic commit"
)]
#[test_case(
    "MATCH (n) CALL { WITH n DETACH DELETE n } IN TRANSACTIONS",
    TransactionMode::Implicit;
    "call in transactions"
)]
#[test_case(
    "MATCH (n) CALL { WITH n DETACH DELETE n } IN TRANSACTIONS OF 500 ROWS",
    TransactionMode::Implicit;
    "call in transactions with batch size"
)]
#[test_case(
    "match (n) call { with n set n.x = 1 } in transactions",
    TransactionMode::Implicit;
    "lower case"
)]
#[test_case("CALL db.labels()", TransactionMode::Managed; "procedure call")]
#[test_case("CALL { MATCH (n) RETURN n } RETURN 1", TransactionMode::Managed; "plain subquery")]
#[test_case(
    "MATCH (`USING PERIODIC COMMIT`) RETURN 1",
    TransactionMode::Managed;
    "backticked periodic commit"
)]
#[test_case(
    "RETURN `CALL {} IN TRANSACTIONS` AS x",
    TransactionMode::Managed;
    "backticked call in transactions"
)]
#[test_case(
    "RETURN 'USING PERIODIC COMMIT' AS x",
    TransactionMode::Managed;
    "quoted periodic commit"
)]
#[test_case(
    "// USING PERIODIC COMMIT\nMATCH (n) RETURN n",
    TransactionMode::Managed;
    "commented periodic commit"
)]
fn mode_classification(query: &str, expected: TransactionMode) {
    assert_eq!(transaction_mode(query), expected);
}

#[test]
fn unknown_operators_route_to_writers() {
    assert_eq!(
        classify_operator("SomethingNew"),
        OperatorClass::Unknown
    );
    assert!(plan_requires_writers(["SomethingNew"]));
    assert!(plan_requires_writers(["AllNodesScan", "SomethingNew"]));
}

#[test]
fn updating_plan_routes_to_writers() {
    assert!(plan_requires_writers([
        "ProduceResults@neo4j",
        "EmptyResult",
        "Create"
    ]));
    assert!(plan_requires_writers(["ProduceResults", "Merge", "Filter"]));
    assert!(plan_requires_writers(["DropIndex"]));
}

#[test]
fn read_only_plan_routes_to_readers() {
    assert!(!plan_requires_writers([
        "ProduceResults@neo4j",
        "Projection",
        "Filter",
        "NodeByLabelScan",
        "Expand(All)"
    ]));
}

#[test]
fn plan_tree_walk_collects_nested_operators() {
    fn node(op: &str, children: Vec<BoltValue>) -> BoltValue {
        let mut dict = BoltDict::new();
        dict.insert(
            "operatorType".to_string(),
            BoltValue::String(op.to_string()),
        );
        if !children.is_empty() {
            dict.insert("children".to_string(), BoltValue::List(children));
        }
        BoltValue::Dict(dict)
    }

    let tree = node(
        "ProduceResults@neo4j",
        vec![node(
            "Projection@neo4j",
            vec![node("Create@neo4j", vec![node("Argument@neo4j", vec![])])],
        )],
    );
    let plan = Plan::from_value(&tree).unwrap();
    let names = plan.operator_names();
    assert_eq!(names.len(), 4);
    assert!(plan_requires_writers(names.iter().map(String::as_str)));
}
