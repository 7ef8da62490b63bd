//! Dot-path access into serde-serializable documents.
//!
//! Shared by the TOML config and the timer settings document so both can be
//! edited one key at a time from the CLI. Setting a key never changes its
//! JSON type: the new string is parsed according to the existing value.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ConfigError;

fn get_by_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    if key.is_empty() {
        return None;
    }

    let mut current = root;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

fn set_by_path(root: &mut Value, key: &str, value: &str) -> Result<(), ConfigError> {
    let unknown = || ConfigError::UnknownKey(key.to_string());
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };

    let mut parts = key.split('.').peekable();
    if key.is_empty() {
        return Err(unknown());
    }

    let mut current = root;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                Value::Bool(_) => Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                Value::Object(_) | Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                // Optional fields serialize as null; accept any JSON literal, else a string.
                Value::Null => serde_json::from_str(value)
                    .unwrap_or_else(|_| Value::String(value.to_string())),
                Value::String(_) => Value::String(value.to_string()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        current = current.get_mut(part).ok_or_else(unknown)?;
    }

    Err(unknown())
}

/// Read one value as a display string. Strings come back unquoted.
pub(crate) fn get_value<T: Serialize>(doc: &T, key: &str) -> Option<String> {
    let json = serde_json::to_value(doc).ok()?;
    match get_by_path(&json, key)? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Return a copy of `doc` with one key replaced.
pub(crate) fn with_value<T: Serialize + DeserializeOwned>(
    doc: &T,
    key: &str,
    value: &str,
) -> Result<T, ConfigError> {
    let mut json = serde_json::to_value(doc).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    set_by_path(&mut json, key, value)?;
    serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_supports_nested_keys() {
        let doc = json!({ "ledger": { "initial_coins": 100 }, "name": "x" });
        assert_eq!(get_value(&doc, "ledger.initial_coins").as_deref(), Some("100"));
        assert_eq!(get_value(&doc, "name").as_deref(), Some("x"));
        assert!(get_value(&doc, "ledger.missing").is_none());
        assert!(get_value(&doc, "").is_none());
    }

    #[test]
    fn set_keeps_existing_type() {
        let mut doc = json!({ "a": { "flag": true, "n": 1, "s": "x" } });
        set_by_path(&mut doc, "a.flag", "false").unwrap();
        set_by_path(&mut doc, "a.n", "42").unwrap();
        set_by_path(&mut doc, "a.s", "hello").unwrap();
        assert_eq!(doc, json!({ "a": { "flag": false, "n": 42, "s": "hello" } }));
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut doc = json!({ "a": { "flag": true } });
        assert!(matches!(
            set_by_path(&mut doc, "a.nope", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut doc = json!({ "a": { "flag": true } });
        assert!(matches!(
            set_by_path(&mut doc, "a.flag", "not_a_bool"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
