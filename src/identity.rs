// 🔑 Identity Keys - Stable cross-run record identity
// Identities arrive as int, float or string depending on the source; everything
// is compared on the decimal-stripped string form ("1042.0" == "1042")

use crate::record::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity values that never identify a real customer
pub const DEFAULT_SENTINELS: [&str; 3] = ["0", "1", ""];

/// Drop everything from the first `.` onward
pub fn strip_decimals(raw: &str) -> &str {
    match raw.find('.') {
        Some(pos) => &raw[..pos],
        None => raw,
    }
}

/// Normalised identity value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn new(raw: &str) -> Self {
        IdentityKey(strip_decimals(raw).to_string())
    }

    /// Key for a cell value; `None` for null
    pub fn from_value(value: &Value) -> Option<Self> {
        value.render().map(|s| IdentityKey::new(&s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_sentinel(&self, sentinels: &[String]) -> bool {
        sentinels.iter().any(|s| s == &self.0)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key for a value if it is a usable identity (non-null, not a sentinel)
pub fn valid_identity(value: &Value, sentinels: &[String]) -> Option<IdentityKey> {
    IdentityKey::from_value(value).filter(|key| !key.is_sentinel(sentinels))
}

/// Rewrite a value to its decimal-stripped text form; null stays null
pub fn normalize_identity_value(value: &Value) -> Value {
    match IdentityKey::from_value(value) {
        Some(key) => Value::Text(key.0),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentinels() -> Vec<String> {
        DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_float_and_text_identities_are_equal() {
        let from_float = IdentityKey::from_value(&Value::Float(1042.0)).unwrap();
        let from_text = IdentityKey::from_value(&Value::text("1042")).unwrap();
        let from_decimal_text = IdentityKey::from_value(&Value::text("1042.0")).unwrap();

        assert_eq!(from_float, from_text);
        assert_eq!(from_text, from_decimal_text);
        assert_eq!(from_float.as_str(), "1042");
    }

    #[test]
    fn test_sentinels_are_never_valid() {
        let s = sentinels();
        assert!(valid_identity(&Value::text("0"), &s).is_none());
        assert!(valid_identity(&Value::Float(1.0), &s).is_none());
        assert!(valid_identity(&Value::text(""), &s).is_none());
        assert!(valid_identity(&Value::Null, &s).is_none());
        assert_eq!(
            valid_identity(&Value::text("300"), &s).map(|k| k.to_string()),
            Some("300".to_string())
        );
    }

    #[test]
    fn test_normalize_identity_value() {
        assert_eq!(normalize_identity_value(&Value::Float(77.0)), Value::text("77"));
        assert_eq!(normalize_identity_value(&Value::Null), Value::Null);
    }
}
