//! Statement classification: transaction mode from a token scan, routing
//! target from an `EXPLAIN` plan.

pub mod evaluator;
pub mod operators;
pub mod scanner;

pub use evaluator::{
    transaction_mode, ExecutionRequirements, QueryEvaluator, Target, TransactionMode,
};
