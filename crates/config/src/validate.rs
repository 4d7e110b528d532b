//! Configuration validation.
//!
//! Detects unknown or misspelled fields in the raw TOML and reports semantic
//! problems (missing credentials, unusable placeholder) that would only
//! surface at runtime.

use std::{collections::HashMap, path::Path};

use {postern_relay::Placeholder, secrecy::ExposeSecret};

use crate::schema::PosternConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "missing", "value"
    pub category: &'static str,
    /// Dotted path, e.g. "telegram.operator_id"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} [{}]: {}", self.severity, self.category, self.message)
        } else {
            write!(
                f,
                "{} [{}] {}: {}",
                self.severity, self.category, self.path, self.message
            )
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

const TELEGRAM_FIELDS: &[&str] = &[
    "token",
    "operator_id",
    "greeting",
    "acknowledgement",
    "confirm_delivery",
    "notify_unroutable",
    "header_title",
    "header_glyph_id",
    "poll_timeout_secs",
];
const RELAY_FIELDS: &[&str] = &["route_capacity", "route_ttl_secs", "placeholder"];
const METRICS_FIELDS: &[&str] = &["enabled", "listen"];

/// Field names per section, mirroring `schema.rs`.
fn known_fields() -> HashMap<&'static str, &'static [&'static str]> {
    HashMap::from([
        ("telegram", TELEGRAM_FIELDS),
        ("relay", RELAY_FIELDS),
        ("metrics", METRICS_FIELDS),
    ])
}

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

fn unknown_field(path: String, key: &str, candidates: &[&str]) -> Diagnostic {
    let message = match suggest(key, candidates, 3) {
        Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
        None => "unknown field".to_string(),
    };
    Diagnostic {
        severity: Severity::Error,
        category: "unknown-field",
        path,
        message,
    }
}

/// Validate a config file as the relay would load it, `POSTERN_*`
/// environment overrides included. Only TOML files get unknown-field
/// detection; other formats are type- and semantically checked after loading.
#[must_use]
pub fn validate(path: &Path) -> ValidationResult {
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");

    let mut result = if is_toml {
        match std::fs::read_to_string(path) {
            Ok(raw) => validate_toml(&crate::env_subst::substitute_env(&raw), true),
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    category: "syntax",
                    path: String::new(),
                    message: format!("failed to read config file: {e}"),
                }],
                config_path: None,
            },
        }
    } else {
        match crate::loader::load_config(path).and_then(|mut config| {
            crate::loader::apply_env_overrides(&mut config)?;
            Ok(config)
        }) {
            Ok(config) => validate_config(&config),
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    category: "type-error",
                    path: String::new(),
                    message: e.to_string(),
                }],
                config_path: None,
            },
        }
    };
    result.config_path = Some(path.to_path_buf());
    result
}

/// Validate a TOML string without file-system or environment side effects.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    validate_toml(toml_str, false)
}

fn validate_toml(toml_str: &str, apply_env: bool) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("TOML syntax error: {e}"),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    if let Some(table) = value.as_table() {
        let sections = known_fields();
        let section_names: Vec<&str> = sections.keys().copied().collect();
        for (key, child) in table {
            let Some(fields) = sections.get(key.as_str()) else {
                diagnostics.push(unknown_field(key.clone(), key, &section_names));
                continue;
            };
            if let Some(child_table) = child.as_table() {
                for child_key in child_table.keys() {
                    if !fields.contains(&child_key.as_str()) {
                        diagnostics.push(unknown_field(
                            format!("{key}.{child_key}"),
                            child_key,
                            fields,
                        ));
                    }
                }
            }
        }
    }

    match toml::from_str::<PosternConfig>(toml_str) {
        Ok(mut config) => {
            if apply_env && let Err(e) = crate::loader::apply_env_overrides(&mut config) {
                diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    category: "env",
                    path: String::new(),
                    message: e.to_string(),
                });
            }
            check_semantics(&config, &mut diagnostics);
        },
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Semantic checks on an already parsed config.
#[must_use]
pub fn validate_config(config: &PosternConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    check_semantics(config, &mut diagnostics);
    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_semantics(config: &PosternConfig, diagnostics: &mut Vec<Diagnostic>) {
    let token = config.telegram.token.expose_secret();
    if token.is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "missing",
            path: "telegram.token".into(),
            message: "bot token is required (set it here or via POSTERN_TELEGRAM_TOKEN)".into(),
        });
    } else if token.starts_with("${") {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "missing",
            path: "telegram.token".into(),
            message: "bot token references an unset environment variable".into(),
        });
    }

    if config.telegram.operator_id <= 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "missing",
            path: "telegram.operator_id".into(),
            message: "operator_id must be the operator's positive Telegram user id".into(),
        });
    }

    if config.telegram.poll_timeout_secs == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "value",
            path: "telegram.poll_timeout_secs".into(),
            message: "0 disables long polling and busy-loops getUpdates".into(),
        });
    }

    if config.relay.placeholder.parse::<Placeholder>().is_err() {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "value",
            path: "relay.placeholder".into(),
            message: "placeholder must be one character of exactly one UTF-16 code unit".into(),
        });
    }

    if config.relay.route_capacity == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "value",
            path: "relay.route_capacity".into(),
            message: "capacity 0 keeps a single route; replies to older messages are dropped"
                .into(),
        });
    }

    if config.relay.route_ttl_secs == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Info,
            category: "value",
            path: "relay.route_ttl_secs".into(),
            message: "routes never expire; only the capacity bound applies".into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    const VALID: &str = r#"
        [telegram]
        token = "123:ABC"
        operator_id = 1387024303

        [relay]
        route_capacity = 500
    "#;

    fn has(result: &ValidationResult, path: &str, severity: Severity) -> bool {
        result
            .diagnostics
            .iter()
            .any(|d| d.path == path && d.severity == severity)
    }

    #[rstest]
    #[case("server", "sever", 1)]
    #[case("bind", "bnd", 1)]
    #[case("cat", "car", 1)]
    #[case("", "abc", 3)]
    #[case("abc", "", 3)]
    #[case("hello", "hello", 0)]
    #[case("\u{1F4E9}a", "a", 1)]
    fn levenshtein_distance(#[case] a: &str, #[case] b: &str, #[case] expected: usize) {
        assert_eq!(levenshtein(a, b), expected);
    }

    #[test]
    fn valid_config_has_no_errors() {
        let result = validate_toml_str(VALID);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[test]
    fn misspelled_field_gets_suggestion() {
        let result = validate_toml_str(&format!("{VALID}\n[metrics]\nenabeld = true\n"));
        let diag = result
            .diagnostics
            .iter()
            .find(|d| d.path == "metrics.enabeld")
            .expect("unknown field diagnostic");
        assert_eq!(diag.category, "unknown-field");
        assert!(diag.message.contains("\"enabled\""));
    }

    #[test]
    fn unknown_section_is_reported() {
        let result = validate_toml_str(&format!("{VALID}\n[telegarm]\nx = 1\n"));
        let diag = result
            .diagnostics
            .iter()
            .find(|d| d.path == "telegarm")
            .expect("unknown section diagnostic");
        assert!(diag.message.contains("\"telegram\""));
    }

    #[test]
    fn missing_credentials_are_errors() {
        let result = validate_toml_str("[relay]\nroute_capacity = 5\n");
        assert!(has(&result, "telegram.token", Severity::Error));
        assert!(has(&result, "telegram.operator_id", Severity::Error));
    }

    #[test]
    fn unresolved_env_token_is_error() {
        let result = validate_toml_str(
            "[telegram]\ntoken = \"${POSTERN_UNSET_FOR_TEST}\"\noperator_id = 1\n",
        );
        assert!(has(&result, "telegram.token", Severity::Error));
    }

    #[rstest]
    #[case("\u{1F44D}")]
    #[case("ab")]
    #[case("")]
    fn wide_placeholder_is_error(#[case] placeholder: &str) {
        let raw = format!("{VALID}\nplaceholder = \"{placeholder}\"\n");
        let result = validate_toml_str(&raw);
        assert!(has(&result, "relay.placeholder", Severity::Error));
    }

    #[test]
    fn type_error_is_reported() {
        let result = validate_toml_str("[telegram]\noperator_id = \"me\"\n");
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.category == "type-error")
        );
    }

    #[test]
    fn syntax_error_stops_validation() {
        let result = validate_toml_str("[telegram\n");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].category, "syntax");
    }

    #[test]
    fn disabled_ttl_is_informational() {
        let result = validate_toml_str(&format!("{VALID}\nroute_ttl_secs = 0\n"));
        assert!(has(&result, "relay.route_ttl_secs", Severity::Info));
        assert_eq!(result.count(Severity::Error), 0);
    }

    #[test]
    fn validate_reads_file_and_records_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("postern.toml");
        std::fs::write(&path, VALID).unwrap();
        let result = validate(&path);
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
        assert!(!result.has_errors());
    }
}
