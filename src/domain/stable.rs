//! Canonical, key-sorted serialization for equality and diffing.
//!
//! Two values are considered structurally equal when their canonical strings
//! match. Object keys are emitted in sorted order at every depth, regardless
//! of how `serde_json` was configured elsewhere in the dependency graph, and
//! an optional set of key names is dropped at every depth.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;

/// Keys that carry identity or time rather than structure.
pub const IDENTITY_AND_TIME_KEYS: [&str; 6] = [
    "id",
    "role_id",
    "channel_id",
    "created_at",
    "sent_at",
    "base64",
];

/// Canonical JSON serializer.
#[derive(Debug, Clone, Default)]
pub struct StableSerializer {
    excluded: BTreeSet<&'static str>,
}

impl StableSerializer {
    /// Creates a serializer that keeps every key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a serializer that drops the given keys at every depth.
    #[must_use]
    pub fn excluding(keys: &[&'static str]) -> Self {
        Self {
            excluded: keys.iter().copied().collect(),
        }
    }

    /// Serializes `value` to its canonical string.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if `value` cannot be serialized.
    pub fn to_canonical_string<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(value)?;
        let mut out = String::new();
        self.write_value(&value, &mut out)?;
        Ok(out)
    }

    /// Returns `true` if both values have the same canonical form.
    ///
    /// A value that fails to serialize never compares equal.
    #[must_use]
    pub fn equal<A: Serialize + ?Sized, B: Serialize + ?Sized>(&self, a: &A, b: &B) -> bool {
        match (self.to_canonical_string(a), self.to_canonical_string(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn write_value(&self, value: &Value, out: &mut String) -> Result<(), serde_json::Error> {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map
                    .keys()
                    .filter(|k| !self.excluded.contains(k.as_str()))
                    .collect();
                keys.sort();
                out.push('{');
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::to_string(key)?);
                    out.push(':');
                    if let Some(inner) = map.get(key) {
                        self.write_value(inner, out)?;
                    }
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.write_value(item, out)?;
                }
                out.push(']');
            }
            scalar => {
                let _ = write!(out, "{scalar}");
            }
        }
        Ok(())
    }
}
