//! Data-driven dangerous-pattern detection.
//!
//! Each rule is a `{pattern, kind, severity, description}` tuple evaluated
//! against the comment-stripped statement, so new patterns are additive and
//! independently testable. Rules fire regardless of statement kind: a file
//! read buried inside an otherwise-valid SELECT is still a violation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// What a security rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    DisallowedStatement,
    StackedStatements,
    FileAccess,
    ExtensionLoad,
    ProcessInvocation,
    EnvAccess,
    SuspiciousPattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// One detected violation, positioned where the offending text begins.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityViolation {
    pub kind: ViolationKind,
    pub description: String,
    pub severity: Severity,
    pub position: Option<usize>,
}

struct SecurityRule {
    pattern: Regex,
    kind: ViolationKind,
    severity: Severity,
    description: &'static str,
}

impl SecurityRule {
    fn new(
        pattern: &str,
        kind: ViolationKind,
        severity: Severity,
        description: &'static str,
    ) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("invalid security rule pattern"),
            kind,
            severity,
            description,
        }
    }
}

static DANGEROUS_PATTERNS: Lazy<Vec<SecurityRule>> = Lazy::new(|| {
    vec![
        SecurityRule::new(
            r"(?i)\bread_(?:csv|csv_auto|text|blob|json|json_auto|parquet)\s*\(",
            ViolationKind::FileAccess,
            Severity::Error,
            "file-reading table function",
        ),
        SecurityRule::new(
            r"(?i)\bglob\s*\(",
            ViolationKind::FileAccess,
            Severity::Error,
            "filesystem glob function",
        ),
        SecurityRule::new(
            r"(?i)\bload_extension\s*\(",
            ViolationKind::ExtensionLoad,
            Severity::Error,
            "dynamic extension loading",
        ),
        SecurityRule::new(
            r"(?i)^\s*(?:force\s+)?(?:install|load)\b",
            ViolationKind::ExtensionLoad,
            Severity::Error,
            "extension management statement",
        ),
        SecurityRule::new(
            r"(?i)\bxp_cmdshell\b",
            ViolationKind::ProcessInvocation,
            Severity::Error,
            "shell command execution",
        ),
        SecurityRule::new(
            r"(?i)\b(?:system|shell|popen|exec)\s*\(",
            ViolationKind::ProcessInvocation,
            Severity::Error,
            "process invocation function",
        ),
        SecurityRule::new(
            r"(?i)\bgetenv\s*\(",
            ViolationKind::EnvAccess,
            Severity::Error,
            "environment variable access",
        ),
        SecurityRule::new(
            r"(?i)\b(?:pg_sleep|sleep)\s*\(",
            ViolationKind::SuspiciousPattern,
            Severity::Warning,
            "time-delay function",
        ),
        SecurityRule::new(
            r"(?i)\bor\s+1\s*=\s*1\b",
            ViolationKind::SuspiciousPattern,
            Severity::Warning,
            "tautology predicate",
        ),
    ]
});

/// Evaluate every rule against the stripped statement.
pub fn scan(stripped_sql: &str) -> Vec<SecurityViolation> {
    DANGEROUS_PATTERNS
        .iter()
        .filter_map(|rule| {
            rule.pattern.find(stripped_sql).map(|m| SecurityViolation {
                kind: rule.kind,
                description: format!("Disallowed construct: {}", rule.description),
                severity: rule.severity,
                position: Some(m.start()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert!(!DANGEROUS_PATTERNS.is_empty());
    }

    #[test]
    fn test_file_access_detected() {
        let hits = scan("SELECT * FROM read_csv('/etc/passwd')");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, ViolationKind::FileAccess);
        assert_eq!(hits[0].severity, Severity::Error);
        assert_eq!(hits[0].position, Some(14));
    }

    #[test]
    fn test_extension_statement_detected() {
        let hits = scan("INSTALL httpfs");
        assert_eq!(hits[0].kind, ViolationKind::ExtensionLoad);
        // Only anchored at statement start: a column named "load" is fine
        assert!(scan("SELECT load FROM metrics").is_empty());
    }

    #[test]
    fn test_process_invocation_detected() {
        assert_eq!(
            scan("SELECT system('rm -rf /')")[0].kind,
            ViolationKind::ProcessInvocation
        );
        assert_eq!(
            scan("SELECT xp_cmdshell('dir')")[0].kind,
            ViolationKind::ProcessInvocation
        );
    }

    #[test]
    fn test_tautology_is_warning_only() {
        let hits = scan("SELECT * FROM users WHERE name = 'x' OR 1=1");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].severity, Severity::Warning);
    }

    #[test]
    fn test_case_insensitive() {
        assert!(!scan("SELECT * FROM READ_CSV('x')").is_empty());
        assert!(!scan("select LOAD_EXTENSION('evil')").is_empty());
    }

    #[test]
    fn test_clean_select_passes() {
        assert!(scan("SELECT region, SUM(amount) FROM sales GROUP BY region").is_empty());
    }
}
