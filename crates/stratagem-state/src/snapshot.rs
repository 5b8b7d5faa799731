//! Decoding state snapshots delivered by collaborators.
//!
//! A snapshot is a JSON object:
//!
//! ```json
//! { "privilege": "limited", "facts": { "running-service:ssh": true, "os": "linux" } }
//! ```
//!
//! `privilege` is required. `facts` is optional and may only hold booleans or strings.

use serde_json::{Map, Value};
use stratagem_core::{FactValue, Privilege, Result, StratagemError, StateView};

use crate::state::State;

/// Parse a structured snapshot into canonical form.
pub fn decode_from_source(raw: &Value) -> Result<State> {
    let object = raw
        .as_object()
        .ok_or_else(|| StratagemError::malformed("State snapshot must be a JSON object"))?;

    let privilege = match object.get("privilege") {
        Some(Value::String(name)) => Privilege::parse(name).ok_or_else(|| {
            StratagemError::malformed(format!("Unknown privilege level '{}'", name))
        })?,
        Some(other) => {
            return Err(StratagemError::malformed(format!(
                "Field 'privilege' must be a string, got {}",
                other
            )))
        }
        None => return Err(StratagemError::malformed("Missing required field 'privilege'")),
    };

    let mut state = State::new(privilege);

    match object.get("facts") {
        None | Some(Value::Null) => {}
        Some(Value::Object(facts)) => {
            for (name, value) in facts {
                if name.trim().is_empty() {
                    return Err(StratagemError::malformed("Fact names cannot be empty"));
                }
                let value = match value {
                    Value::Bool(flag) => FactValue::Bool(*flag),
                    Value::String(label) => FactValue::Category(label.clone()),
                    other => {
                        return Err(StratagemError::malformed(format!(
                            "Fact '{}' must be a boolean or string, got {}",
                            name, other
                        )))
                    }
                };
                state.set_fact(name.clone(), value);
            }
        }
        Some(other) => {
            return Err(StratagemError::malformed(format!(
                "Field 'facts' must be an object, got {}",
                other
            )))
        }
    }

    Ok(state)
}

impl State {
    /// Re-serialize into the snapshot shape accepted by [`decode_from_source`].
    pub fn to_source(&self) -> Value {
        let facts: Map<String, Value> = self
            .facts()
            .map(|(name, value)| {
                let value = match value {
                    FactValue::Bool(flag) => Value::Bool(*flag),
                    FactValue::Category(label) => Value::String(label.clone()),
                };
                (name.to_string(), value)
            })
            .collect();

        serde_json::json!({
            "privilege": self.privilege().as_str(),
            "facts": facts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_snapshot() {
        let state = decode_from_source(&json!({
            "privilege": "limited",
            "facts": {"running-service:ssh": true, "os": "linux", "open-port:80": false}
        }))
        .unwrap();

        assert_eq!(state.privilege(), Privilege::Limited);
        assert_eq!(state.fact("os"), Some(&FactValue::from("linux")));
        assert_eq!(state.fact_count(), 2);
    }

    #[test]
    fn test_missing_privilege_is_malformed() {
        let err = decode_from_source(&json!({"facts": {}})).unwrap_err();
        assert!(matches!(err, StratagemError::MalformedState { .. }));
    }

    #[test]
    fn test_bad_values_are_malformed() {
        for raw in [
            json!("none"),
            json!({"privilege": "root"}),
            json!({"privilege": 3}),
            json!({"privilege": "none", "facts": []}),
            json!({"privilege": "none", "facts": {"port": 22}}),
            json!({"privilege": "none", "facts": {"": true}}),
        ] {
            assert!(matches!(
                decode_from_source(&raw),
                Err(StratagemError::MalformedState { .. })
            ));
        }
    }

    #[test]
    fn test_snapshot_round_trip() {
        let raw = json!({
            "privilege": "elevated",
            "facts": {"os": "linux", "open-port:22": true}
        });
        let state = decode_from_source(&raw).unwrap();
        assert_eq!(state.to_source(), raw);
        assert_eq!(decode_from_source(&state.to_source()).unwrap(), state);
    }
}
