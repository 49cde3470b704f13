//! Request and response shapes of the HTTP surface.
//!
//! The batch endpoint speaks the legacy Neo4j HTTP API envelope
//! (`results`/`notifications`/`errors`); the streaming endpoint emits one
//! compact object per record. Conversion into the core types validates
//! parameters through the codec.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use boltr::types::BoltValue;

use crate::codec::{self, legacy};
use crate::driver::Notification;
use crate::errors::{GatewayError, ServerError};
use crate::executor::{
    AnnotatedQuery, EagerResult, QueryContainer, ResultContainer, ResultFormat, SuccessResult,
};

/// One statement of a batch payload.
#[derive(Debug, Deserialize)]
pub struct StatementEntry {
    pub statement: String,
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
    #[serde(default, rename = "includeStats")]
    pub include_stats: bool,
    #[serde(default, rename = "resultDataContents")]
    pub result_data_contents: Option<Vec<String>>,
}

impl StatementEntry {
    pub fn into_annotated(self) -> Result<AnnotatedQuery, GatewayError> {
        let parameters = match &self.parameters {
            Some(map) => codec::decode_parameters(map)?,
            None => Default::default(),
        };
        let mut formats = Vec::new();
        if let Some(requested) = &self.result_data_contents {
            for raw in requested {
                let format = ResultFormat::parse(raw).ok_or_else(|| {
                    GatewayError::InvalidParameter(format!(
                        "Unknown result data content '{}'; supported are row, graph",
                        raw
                    ))
                })?;
                if !formats.contains(&format) {
                    formats.push(format);
                }
            }
        }
        AnnotatedQuery::new(&self.statement, parameters, self.include_stats, formats)
    }
}

/// The batch payload: `{"statements": [...]}`.
#[derive(Debug, Deserialize)]
pub struct StatementsPayload {
    #[serde(default)]
    pub statements: Vec<StatementEntry>,
}

impl StatementsPayload {
    pub fn into_container(self) -> Result<QueryContainer, GatewayError> {
        let statements = self
            .statements
            .into_iter()
            .map(StatementEntry::into_annotated)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(QueryContainer { statements })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEntry {
    pub code: String,
    pub message: String,
}

impl From<&ServerError> for ErrorEntry {
    fn from(error: &ServerError) -> Self {
        ErrorEntry {
            code: error.code.clone(),
            message: error.message.clone(),
        }
    }
}

/// The fixed body of an invalid-query rejection.
pub fn invalid_query_body(query_text: &str) -> Value {
    json!({
        "error": "Invalid query",
        "message": query_text,
        "status": 400,
    })
}

/// Renders the whole batch outcome in the legacy envelope.
pub fn render_batch_envelope(container: &ResultContainer) -> Value {
    let results: Vec<Value> = container
        .results
        .iter()
        .filter_map(|result| match result {
            EagerResult::Success(success) => Some(render_legacy_result(success)),
            EagerResult::Failure { .. } => None,
        })
        .collect();
    let errors: Vec<Value> = container
        .errors
        .iter()
        .map(|error| json!(ErrorEntry::from(error)))
        .collect();
    let notifications: Vec<Value> = container
        .notifications
        .iter()
        .map(render_notification)
        .collect();
    json!({
        "results": results,
        "notifications": notifications,
        "errors": errors,
    })
}

fn render_notification(notification: &Notification) -> Value {
    let mut rendered = Map::new();
    rendered.insert("code".to_string(), json!(notification.code));
    rendered.insert("severity".to_string(), json!(notification.severity));
    rendered.insert("title".to_string(), json!(notification.title));
    rendered.insert(
        "description".to_string(),
        json!(notification.description),
    );
    if let Some(position) = notification.position {
        rendered.insert(
            "position".to_string(),
            json!({
                "offset": position.offset,
                "line": position.line,
                "column": position.column,
            }),
        );
    }
    Value::Object(rendered)
}

/// Renders one successful result in the legacy shape: `columns`, `data[]`
/// with the requested projections per record, optional `stats`.
pub fn render_legacy_result(result: &SuccessResult) -> Value {
    let wants_row = result.result_formats.contains(&ResultFormat::Row);
    let wants_graph = result.result_formats.contains(&ResultFormat::Graph);

    let data: Vec<Value> = result
        .records
        .iter()
        .map(|record| {
            let mut entry = Map::new();
            if wants_row {
                entry.insert(
                    "row".to_string(),
                    Value::Array(record.iter().map(legacy::row_value).collect()),
                );
                entry.insert(
                    "meta".to_string(),
                    Value::Array(record.iter().map(legacy::meta_value).collect()),
                );
            }
            if wants_graph {
                let mut collector = legacy::GraphCollector::new();
                for value in record {
                    collector.collect(value);
                }
                entry.insert("graph".to_string(), collector.into_value());
            }
            Value::Object(entry)
        })
        .collect();

    let mut rendered = Map::new();
    rendered.insert("columns".to_string(), json!(result.columns));
    rendered.insert("data".to_string(), Value::Array(data));
    if result.include_stats {
        rendered.insert("stats".to_string(), legacy::stats_value(&result.counters));
    }
    Value::Object(rendered)
}

/// Renders one record in the streaming compact view: a single object
/// mapping column names to new-format values.
pub fn render_compact_record(columns: &[String], values: &[BoltValue]) -> Value {
    let mut record = Map::new();
    for (column, value) in columns.iter().zip(values.iter()) {
        record.insert(column.clone(), codec::encode_value(value));
    }
    Value::Object(record)
}
