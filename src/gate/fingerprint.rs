// ABOUTME: Parameter fingerprints — SHA-256 over a canonical JSON encoding of a tool call.
// ABOUTME: Object keys are sorted recursively so field order never changes the digest.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex SHA-256 digest binding an approval to an exact tool name and parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(tool_name: &str, params: &Value) -> Self {
        let mut canonical = String::new();
        canonical.push_str("{\"params\":");
        write_canonical(params, &mut canonical);
        canonical.push_str(",\"tool\":");
        write_string(tool_name, &mut canonical);
        canonical.push('}');

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        // Null, booleans, and numbers have a single serde_json rendering.
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_string()).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a: Value =
            serde_json::from_str(r#"{"command":"ls","cwd":"/tmp","env":{"A":"1","B":"2"}}"#)
                .unwrap();
        let b: Value =
            serde_json::from_str(r#"{"env":{"B":"2","A":"1"},"cwd":"/tmp","command":"ls"}"#)
                .unwrap();
        assert_eq!(Fingerprint::compute("exec", &a), Fingerprint::compute("exec", &b));
    }

    #[test]
    fn changing_any_value_changes_fingerprint() {
        let base = Fingerprint::compute("exec", &json!({"command": "ls", "timeout": 10}));
        assert_ne!(
            base,
            Fingerprint::compute("exec", &json!({"command": "ls -a", "timeout": 10}))
        );
        assert_ne!(
            base,
            Fingerprint::compute("exec", &json!({"command": "ls", "timeout": 11}))
        );
        assert_ne!(
            base,
            Fingerprint::compute("exec", &json!({"command": "ls", "timeout": "10"}))
        );
    }

    #[test]
    fn tool_name_is_part_of_the_identity() {
        let params = json!({"path": "/etc/hosts"});
        assert_ne!(
            Fingerprint::compute("read", &params),
            Fingerprint::compute("write", &params)
        );
    }

    #[test]
    fn array_order_matters() {
        assert_ne!(
            Fingerprint::compute("message", &json!({"to": ["a", "b"]})),
            Fingerprint::compute("message", &json!({"to": ["b", "a"]}))
        );
    }

    #[test]
    fn digest_is_lowercase_sha256_hex() {
        let fp = Fingerprint::compute("exec", &json!({}));
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
