//! Claim Types
//!
//! Claim set carried inside a signed token.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Unique token identifier.
pub const CLAIM_JTI: &str = "jti";
/// Issued-at timestamp (millisecond precision NumericDate).
pub const CLAIM_IAT: &str = "iat";
/// Not-before timestamp (seconds).
pub const CLAIM_NBF: &str = "nbf";
/// Expiry timestamp (seconds).
pub const CLAIM_EXP: &str = "exp";
/// Scene marker recording which scene produced the token.
pub const SCENE_CLAIM: &str = "jwt_scene";

/// Claims always set by the issuer; caller values are overwritten.
pub const RESERVED_CLAIMS: [&str; 5] = [CLAIM_JTI, CLAIM_IAT, CLAIM_NBF, CLAIM_EXP, SCENE_CLAIM];

/// Claims removed before a claim set is re-issued.
pub const REFRESH_STRIPPED_CLAIMS: [&str; 4] = [CLAIM_JTI, CLAIM_IAT, CLAIM_NBF, CLAIM_EXP];

/// Mapping from claim name to value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    /// Create empty claim set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert a claim, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Get a claim.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Remove a claim.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Check whether a claim is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Borrow the underlying JSON map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Token identifier.
    pub fn jti(&self) -> Option<&str> {
        self.0.get(CLAIM_JTI).and_then(Value::as_str)
    }

    /// Scene that produced the token.
    pub fn scene(&self) -> Option<&str> {
        self.0.get(SCENE_CLAIM).and_then(Value::as_str)
    }

    /// Issued-at in unix milliseconds.
    pub fn issued_at_ms(&self) -> Option<i64> {
        self.0.get(CLAIM_IAT).and_then(numeric_date_ms)
    }

    /// Not-before in unix seconds.
    pub fn not_before(&self) -> Option<i64> {
        self.0.get(CLAIM_NBF).and_then(numeric_date_secs)
    }

    /// Expiry in unix seconds.
    pub fn expires_at(&self) -> Option<i64> {
        self.0.get(CLAIM_EXP).and_then(numeric_date_secs)
    }

    /// Subject identity used for single-point login.
    ///
    /// Strings must be non-empty; numbers are rendered in decimal.
    pub fn subject(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Remove `jti`, `iat`, `nbf` and `exp`.
    pub fn strip_reserved(&mut self) {
        for name in REFRESH_STRIPPED_CLAIMS {
            self.0.remove(name);
        }
    }

    /// Copy of the claim set without any reserved claim.
    pub fn custom_claims(&self) -> ClaimSet {
        self.0
            .iter()
            .filter(|(name, _)| !RESERVED_CLAIMS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Encode unix milliseconds as a NumericDate with fractional seconds.
pub(crate) fn millis_to_numeric_date(millis: i64) -> Value {
    Number::from_f64(millis as f64 / 1000.0)
        .map(Value::Number)
        .unwrap_or_else(|| Value::from(millis.div_euclid(1000)))
}

fn numeric_date_ms(value: &Value) -> Option<i64> {
    if let Some(secs) = value.as_i64() {
        return secs.checked_mul(1000);
    }
    value.as_f64().map(|secs| (secs * 1000.0).round() as i64)
}

fn numeric_date_secs(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|secs| secs.floor() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_dates() {
        let claims = ClaimSet::new()
            .with(CLAIM_IAT, millis_to_numeric_date(1_700_000_000_123))
            .with(CLAIM_NBF, 1_700_000_000i64)
            .with(CLAIM_EXP, json!(1_700_003_600.9));

        assert_eq!(claims.issued_at_ms(), Some(1_700_000_000_123));
        assert_eq!(claims.not_before(), Some(1_700_000_000));
        assert_eq!(claims.expires_at(), Some(1_700_003_600));
    }

    #[test]
    fn test_subject_extraction() {
        let claims = ClaimSet::new()
            .with("uid", "u1")
            .with("num", 7)
            .with("empty", "")
            .with("flag", true);

        assert_eq!(claims.subject("uid"), Some("u1".to_string()));
        assert_eq!(claims.subject("num"), Some("7".to_string()));
        assert_eq!(claims.subject("empty"), None);
        assert_eq!(claims.subject("flag"), None);
        assert_eq!(claims.subject("missing"), None);
    }

    #[test]
    fn test_strip_reserved_keeps_scene_marker() {
        let mut claims = ClaimSet::new()
            .with(CLAIM_JTI, "app_1")
            .with(CLAIM_IAT, 1)
            .with(CLAIM_NBF, 1)
            .with(CLAIM_EXP, 2)
            .with(SCENE_CLAIM, "app")
            .with("uid", 7);

        claims.strip_reserved();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims.scene(), Some("app"));

        let custom = claims.custom_claims();
        assert_eq!(custom, ClaimSet::new().with("uid", 7));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let claims = ClaimSet::new().with("uid", 7);
        assert_eq!(serde_json::to_string(&claims).unwrap(), r#"{"uid":7}"#);
    }
}
