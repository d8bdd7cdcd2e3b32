use serde::Deserialize;
use serde_json::Value;

use crate::error::MetricError;
use crate::kind::Kind;
use crate::metric::Metric;

/// Accepts either a single metric object or an array of metric objects, so that the same
/// decoder backs both the per-metric and batch JSON endpoints.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Value>),
    One(Value),
}

/// Decodes a JSON body into one or more metrics. Missing `value`/`delta` is accepted (the
/// metric-request form used by `/value`); an unknown `type` is rejected with
/// [`MetricError::InvalidType`] rather than a generic decode error.
pub fn decode_metrics(body: &[u8]) -> Result<Vec<Metric>, MetricError> {
    let one_or_many: OneOrMany = serde_json::from_slice(body).map_err(bad_value)?;
    let values = match one_or_many {
        OneOrMany::Many(values) => values,
        OneOrMany::One(value) => vec![value],
    };
    values.into_iter().map(decode_value).collect()
}

/// Decodes a single metric object, rejecting an array body.
pub fn decode_metric(body: &[u8]) -> Result<Metric, MetricError> {
    let value: Value = serde_json::from_slice(body).map_err(bad_value)?;
    decode_value(value)
}

fn decode_value(value: Value) -> Result<Metric, MetricError> {
    // Validate the kind ourselves first, so an unknown type maps to `InvalidType` instead of
    // the generic deserialization error that `Kind`'s derive would otherwise produce.
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| MetricError::InvalidType(String::new()))?;
    let _: Kind = kind.parse()?;
    serde_json::from_value(value).map_err(bad_value)
}

fn bad_value(e: serde_json::Error) -> MetricError {
    MetricError::BadValue {
        name: String::new(),
        kind: "unknown",
        reason: e.to_string(),
    }
}

/// Encodes a metric to its wire JSON form, omitting empty optional fields.
pub fn encode_metric(metric: &Metric) -> Result<Vec<u8>, MetricError> {
    serde_json::to_vec(metric).map_err(|e| MetricError::BackendError(e.to_string()))
}
