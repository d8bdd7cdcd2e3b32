//! The metric model: a typed value, its canonical text form, JSON codec, and HMAC-SHA256
//! integrity fingerprint. This is a leaf module — repositories depend on it, handlers depend on
//! repositories, and error kinds live here so both layers can match on the same set of variants.

mod codec;
mod error;
mod kind;
mod metric;

pub use codec::{decode_metric, decode_metrics, encode_metric};
pub use error::{MetricError, MetricResult};
pub use kind::Kind;
pub use metric::Metric;
