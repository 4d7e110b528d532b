use std::path::Path;

use {
    anyhow::Result,
    postern_config::{
        Severity, ValidationResult,
        validate::{self, validate_config},
    },
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub fn check(explicit: Option<&Path>, verbose: bool) -> Result<()> {
    let result = match crate::resolve_config_path(explicit) {
        Some(path) => {
            eprintln!("Checking {}\n", path.display());
            validate::validate(&path)
        },
        None => {
            eprintln!("No config file found; checking defaults and environment.\n");
            let mut config = postern_config::PosternConfig::default();
            postern_config::apply_env_overrides(&mut config)?;
            validate_config(&config)
        },
    };

    let errors = report(&result, verbose);
    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Print diagnostics and return the error count.
fn report(result: &ValidationResult, verbose: bool) -> usize {
    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    errors
}

#[cfg(test)]
mod tests {
    use {super::*, postern_config::Diagnostic};

    #[test]
    fn report_counts_errors_only() {
        let result = ValidationResult {
            diagnostics: vec![
                Diagnostic {
                    severity: Severity::Error,
                    category: "missing",
                    path: "telegram.token".into(),
                    message: "bot token is required".into(),
                },
                Diagnostic {
                    severity: Severity::Warning,
                    category: "value",
                    path: "relay.route_capacity".into(),
                    message: "0 is clamped to 1".into(),
                },
            ],
            config_path: None,
        };
        assert_eq!(report(&result, false), 1);
        assert_eq!(report(&ValidationResult::default(), true), 0);
    }
}
