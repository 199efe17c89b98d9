//! Query logging with credential masking
//!
//! Every adapter execution passes through here. Parameter values are
//! masked before they reach the log when the statement touches
//! credential-looking columns, or when a value itself is shaped like a
//! secret.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

static SENSITIVE_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(password|passwd|secret|token|api_key|credential)\b")
        .expect("sensitive-statement pattern compiles")
});

static SECRET_SHAPED_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(bearer\s+\S+|[A-Za-z0-9+/_\-]{40,}={0,2})$")
        .expect("secret-value pattern compiles")
});

const MASK: &str = "[masked]";

/// Logs executed statements at debug level and slow statements at warn
/// level, masking anything credential-looking first.
#[derive(Debug, Clone)]
pub struct QueryLogger {
    slow_threshold: Duration,
    enabled: bool,
}

impl Default for QueryLogger {
    fn default() -> Self {
        Self {
            slow_threshold: Duration::from_millis(500),
            enabled: true,
        }
    }
}

impl QueryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Record one execution. Driver errors are logged by the caller's
    /// propagation path; this hook only observes.
    pub fn record(&self, sql: &str, params: &[Value], elapsed: Duration, ok: bool) {
        if !self.enabled {
            return;
        }
        let masked = mask_params(sql, params);
        if elapsed >= self.slow_threshold {
            warn!(
                sql,
                params = ?masked,
                elapsed_ms = elapsed.as_millis() as u64,
                ok,
                "slow query"
            );
        } else {
            debug!(
                sql,
                params = ?masked,
                elapsed_ms = elapsed.as_millis() as u64,
                ok,
                "query executed"
            );
        }
    }
}

/// Render parameters for logging. A statement naming a credential column
/// masks every value; otherwise only secret-shaped values are masked.
fn mask_params(sql: &str, params: &[Value]) -> Vec<String> {
    let mask_all = SENSITIVE_STATEMENT.is_match(sql);
    params
        .iter()
        .map(|value| {
            if mask_all {
                return MASK.to_string();
            }
            match value {
                Value::String(s) if SECRET_SHAPED_VALUE.is_match(s) => MASK.to_string(),
                other => other.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statements_touching_credentials_mask_every_param() {
        let masked = mask_params(
            "UPDATE users SET password = $1 WHERE id = $2",
            &[json!("hunter2"), json!(7)],
        );
        assert_eq!(masked, vec![MASK.to_string(), MASK.to_string()]);
    }

    #[test]
    fn ordinary_statements_keep_params_visible() {
        let masked = mask_params(
            "SELECT * FROM users WHERE age > $1",
            &[json!(18)],
        );
        assert_eq!(masked, vec!["18".to_string()]);
    }

    #[test]
    fn secret_shaped_values_are_masked_individually() {
        let token = "aVeryLongLookingOpaqueCredentialValue1234567890abcd";
        let masked = mask_params(
            "INSERT INTO audit (actor, note) VALUES ($1, $2)",
            &[json!(token), json!("routine check")],
        );
        assert_eq!(masked[0], MASK);
        assert_eq!(masked[1], "\"routine check\"");
    }

    #[test]
    fn bearer_values_are_masked() {
        let masked = mask_params("SELECT $1", &[json!("Bearer abc.def.ghi")]);
        assert_eq!(masked, vec![MASK.to_string()]);
    }
}
