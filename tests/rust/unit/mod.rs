//! Unit suite entry point.

mod batch_results;
mod codec_roundtrip;
mod config_loading;
mod evaluator_rules;
