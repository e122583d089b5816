//! Parameter-table validation (friendly errors)
//!
//! Runs before the plugin is built, so a bad table is explained in terms of the JSON rather
//! than as a bare `InvalidParameter` from the engine.

use std::collections::BTreeSet;

use shaderfx_engine::uniforms::declared_uniforms;
use shaderfx_engine::ParamDescriptor;
use shaderfx_engine::{loge, logi, logw};

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub level: IssueLevel,
    pub path: String,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Warn,
    Error,
}

impl ValidationIssue {
    pub fn warn(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Warn, path: path.into(), message: message.into(), hint }
    }
    pub fn error(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Error, path: path.into(), message: message.into(), hint }
    }
}

pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.level == IssueLevel::Error)
}

pub fn emit_issues(tag: &str, issues: &[ValidationIssue]) {
    for it in issues {
        let hint = it.hint.as_deref().map(|h| format!(" (hint: {h})")).unwrap_or_default();
        match it.level {
            IssueLevel::Warn => logw!(tag, "{}: {}{}", it.path, it.message, hint),
            IssueLevel::Error => loge!(tag, "{}: {}{}", it.path, it.message, hint),
        }
    }
}

/// One line even when there are zero issues, so the log shows validation ran.
pub fn emit_summary(tag: &str, label: &str, issues: &[ValidationIssue]) {
    let warns = issues.iter().filter(|i| i.level == IssueLevel::Warn).count();
    let errs = issues.iter().filter(|i| i.level == IssueLevel::Error).count();
    if errs == 0 && warns == 0 {
        logi!(tag, "validation: {label} OK (0 issues)");
    } else {
        logw!(tag, "validation: {label} issues found (errors={errs} warnings={warns})");
    }
}

/// Check a parameter table against itself and against the fragment shader it drives:
/// - duplicate names (error)
/// - empty, inverted or non-finite ranges, including spans that overflow (error)
/// - defaults outside the range (warning; allowed, they simply scale outside it)
/// - parameters with no matching `uniform` declaration (warning; uploads will be skipped)
pub fn validate_param_table(label: &str, params: &[ParamDescriptor], frag_src: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let declared: BTreeSet<String> = declared_uniforms(frag_src).into_iter().collect();

    let mut seen = BTreeSet::new();
    for (i, p) in params.iter().enumerate() {
        let base = format!("{label}:/params/{i}");
        let name = p.name.as_ref();

        if name.is_empty() {
            issues.push(ValidationIssue::error(
                format!("{base}/name"),
                "empty param name",
                Some("the name must match a uniform in the fragment shader".into()),
            ));
            continue;
        }

        if !seen.insert(name.to_string()) {
            issues.push(ValidationIssue::error(
                format!("{base}/name"),
                format!("duplicate param name '{name}'"),
                Some("param names must be unique; the host addresses params by index and name".into()),
            ));
        }

        if !p.min.is_finite() || !p.max.is_finite() || p.min >= p.max || !(p.max - p.min).is_finite() {
            issues.push(ValidationIssue::error(
                base.clone(),
                format!("invalid range min={} max={}", p.min, p.max),
                Some("min must be strictly below max, and max - min must be finite".into()),
            ));
        } else if p.default < p.min || p.default > p.max {
            issues.push(ValidationIssue::warn(
                format!("{base}/default"),
                format!("default {} is outside [{}, {}]", p.default, p.min, p.max),
                None,
            ));
        }

        if !declared.contains(name) {
            issues.push(ValidationIssue::warn(
                base,
                format!("no 'uniform ... {name};' in the fragment shader"),
                Some("the value will never reach the shader".into()),
            ));
        }
    }

    issues
}
