use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::MetricError;
use crate::kind::Kind;

type HmacSha256 = Hmac<Sha256>;

/// A single gauge or counter sample, plus its optional integrity fingerprint.
///
/// `value` is populated iff `kind == Gauge`; `delta` is populated iff `kind == Counter`. Both
/// are `None` on the wire form used for `/value` lookup requests, where only `id` and `type`
/// are meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "id")]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Kind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Metric {
    /// Constructs a metric request with no value populated, validating only the kind.
    pub fn raw(kind: &str, name: impl Into<String>) -> Result<Metric, MetricError> {
        let kind = kind.parse::<Kind>()?;
        Ok(Metric {
            name: name.into(),
            kind,
            value: None,
            delta: None,
            hash: None,
        })
    }

    /// Constructs a metric by parsing `text` according to `kind`: a float for gauges, a signed
    /// integer for counters. Used to decode the plain-text `/update/<kind>/<name>/<value>` path.
    pub fn raw_with_value(
        kind: &str,
        name: impl Into<String>,
        text: &str,
    ) -> Result<Metric, MetricError> {
        let name = name.into();
        let kind = kind.parse::<Kind>()?;
        match kind {
            Kind::Gauge => {
                let value = text.parse::<f64>().map_err(|e| MetricError::BadValue {
                    name: name.clone(),
                    kind: kind.as_str(),
                    reason: e.to_string(),
                })?;
                Ok(Metric {
                    name,
                    kind,
                    value: Some(value),
                    delta: None,
                    hash: None,
                })
            }
            Kind::Counter => {
                let delta = text.parse::<i64>().map_err(|e| MetricError::BadValue {
                    name: name.clone(),
                    kind: kind.as_str(),
                    reason: e.to_string(),
                })?;
                Ok(Metric {
                    name,
                    kind,
                    value: None,
                    delta: Some(delta),
                    hash: None,
                })
            }
        }
    }

    /// Formats the metric's current value as plain text, for the `/value/{kind}/{name}` response
    /// body. Returns an empty string if the relevant field isn't populated.
    pub fn to_text(&self) -> String {
        match self.kind {
            Kind::Gauge => self
                .value
                .map(|v| v.to_string())
                .unwrap_or_default(),
            Kind::Counter => self
                .delta
                .map(|d| d.to_string())
                .unwrap_or_default(),
        }
    }

    /// The canonical fingerprint string that integrity hashes are computed over. Bit-stable: it
    /// never varies with JSON field order or whitespace.
    ///
    /// - gauge: `"<name>:gauge:<value>"`, value formatted with six fractional digits.
    /// - counter: `"<name>:counter:<delta>"`.
    pub fn canonical_string(&self) -> Result<String, MetricError> {
        match self.kind {
            Kind::Gauge => {
                let value = self.value.ok_or_else(|| MetricError::BadValue {
                    name: self.name.clone(),
                    kind: self.kind.as_str(),
                    reason: "missing value".to_owned(),
                })?;
                Ok(format!("{}:gauge:{:.6}", self.name, value))
            }
            Kind::Counter => {
                let delta = self.delta.ok_or_else(|| MetricError::BadValue {
                    name: self.name.clone(),
                    kind: self.kind.as_str(),
                    reason: "missing delta".to_owned(),
                })?;
                Ok(format!("{}:counter:{}", self.name, delta))
            }
        }
    }

    /// Computes and stores the HMAC-SHA256 fingerprint under `key`. A no-op when `key` is empty,
    /// which allows rolling deployments where one side hasn't been configured with a key yet.
    pub fn set_hash(&mut self, key: &str) -> Result<(), MetricError> {
        if key.is_empty() {
            return Ok(());
        }
        let mac = new_mac(key, &self.canonical_string()?);
        self.hash = Some(hex::encode(mac.finalize().into_bytes()));
        Ok(())
    }

    /// Verifies the stored fingerprint against `key`. Tolerant: returns `true` if either `key`
    /// or the stored hash is empty, since that represents a side of the deployment that hasn't
    /// rolled out a key yet. Otherwise performs a constant-time comparison.
    pub fn check_hash(&self, key: &str) -> bool {
        let Some(stored) = self.hash.as_deref() else {
            return true;
        };
        if key.is_empty() || stored.is_empty() {
            return true;
        }
        let Ok(expected) = hex::decode(stored) else {
            return false;
        };
        let Ok(canonical) = self.canonical_string() else {
            return false;
        };
        new_mac(key, &canonical).verify_slice(&expected).is_ok()
    }
}

fn new_mac(key: &str, message: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so this never fails.
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    mac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_rejects_unknown_kind() {
        let err = Metric::raw("histogram", "Foo").unwrap_err();
        assert!(matches!(err, MetricError::InvalidType(_)));
    }

    #[test]
    fn raw_with_value_parses_gauge_and_counter() {
        let gauge = Metric::raw_with_value("gauge", "Alloc", "1.5").unwrap();
        assert_eq!(gauge.value, Some(1.5));
        assert_eq!(gauge.to_text(), "1.5");

        let counter = Metric::raw_with_value("counter", "Hits", "5").unwrap();
        assert_eq!(counter.delta, Some(5));
        assert_eq!(counter.to_text(), "5");
    }

    #[test]
    fn raw_with_value_rejects_unparseable_text() {
        let err = Metric::raw_with_value("gauge", "Foo", "not-a-number").unwrap_err();
        assert!(matches!(err, MetricError::BadValue { .. }));
    }

    #[test]
    fn canonical_string_uses_six_fractional_digits_for_gauges() {
        let m = Metric::raw_with_value("gauge", "Alloc", "1.5").unwrap();
        assert_eq!(m.canonical_string().unwrap(), "Alloc:gauge:1.500000");
    }

    #[test]
    fn canonical_string_uses_decimal_delta_for_counters() {
        let m = Metric::raw_with_value("counter", "PollCount", "29").unwrap();
        assert_eq!(m.canonical_string().unwrap(), "PollCount:counter:29");
    }

    #[test]
    fn set_hash_is_a_noop_with_empty_key() {
        let mut m = Metric::raw_with_value("gauge", "Alloc", "1.5").unwrap();
        m.set_hash("").unwrap();
        assert!(m.hash.is_none());
    }

    #[test]
    fn check_hash_round_trips_through_the_same_key() {
        let mut m = Metric::raw_with_value("gauge", "Alloc", "1.5").unwrap();
        m.set_hash("secret").unwrap();
        assert!(m.check_hash("secret"));
    }

    #[test]
    fn check_hash_rejects_a_different_key() {
        let mut m = Metric::raw_with_value("gauge", "Alloc", "1.5").unwrap();
        m.set_hash("secret").unwrap();
        assert!(!m.check_hash("wrong-key"));
    }

    #[test]
    fn check_hash_is_tolerant_when_either_side_has_no_key() {
        let mut m = Metric::raw_with_value("gauge", "Alloc", "1.5").unwrap();
        assert!(m.check_hash("secret")); // no stored hash yet

        m.set_hash("secret").unwrap();
        assert!(m.check_hash("")); // caller has no key configured
    }

    #[test]
    fn json_round_trip_omits_empty_fields() {
        let mut m = Metric::raw_with_value("counter", "PollCount", "29").unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert!(!json.contains("\"value\""));
        assert!(!json.contains("\"hash\""));

        m.set_hash("secret").unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"hash\""));

        let decoded: Metric = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, m);
    }
}
