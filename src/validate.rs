//! sandbox.json validation (friendly errors)
//!
//! Runs over the raw JSON before anything is opened, so a typo is reported with *what* is
//! wrong, *where* it lives and *what to do*. Nothing here stops the sandbox; the loader has the
//! final word and falls back to defaults where it can.

use serde_json::Value;

use glsandbox_engine::audio::SampleFormat;
use glsandbox_engine::AssetsRoot;

use crate::{loge, logw};

const FILE: &str = "sandbox.json";

const TOP_LEVEL: &[&str] = &[
    "version",
    "vertex",
    "fragment",
    "model",
    "model_offset",
    "model_scale",
    "model_rotation",
    "smooth_normals",
    "window",
    "audio",
    "camera",
];

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

pub fn emit_issues(tag: &str, issues: &[ValidationIssue]) {
    for it in issues {
        let text = match &it.hint {
            Some(h) => format!("{}: {} (hint: {})", it.path, it.message, h),
            None => format!("{}: {}", it.path, it.message),
        };
        match it.level {
            IssueLevel::Warn => logw!(tag, "{text}"),
            IssueLevel::Error => loge!(tag, "{text}"),
        }
    }
}

/// Emit a one-line summary even when there are zero issues.
pub fn emit_summary(tag: &str, label: &str, issues: &[ValidationIssue]) {
    let warns = issues.iter().filter(|i| i.level == IssueLevel::Warn).count();
    let errs = issues.iter().filter(|i| i.level == IssueLevel::Error).count();
    if errs == 0 && warns == 0 {
        crate::logi!(tag, "validation: {label} OK (0 issues)");
    } else {
        crate::logw!(tag, "validation: {label} issues found (errors={errs} warnings={warns})");
    }
}

pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.level == IssueLevel::Error)
}

/// Check `sandbox.json` for mistakes the deserializer happily accepts.
pub fn validate_sandbox_json(v: &Value, assets: &AssetsRoot) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let Some(obj) = v.as_object() else {
        issues.push(ValidationIssue::error(
            format!("{FILE}:/"),
            "top level must be an object",
            Some("expected: { \"version\": 1, \"fragment\": \"shaders/sandbox.frag\", ... }".into()),
        ));
        return issues;
    };

    for key in obj.keys().filter(|k| !TOP_LEVEL.contains(&k.as_str())) {
        issues.push(ValidationIssue::warn(
            format!("{FILE}:/{}", escape_ptr(key)),
            format!("unknown field '{key}' is ignored"),
            Some("run with --strict to make unknown fields an error".into()),
        ));
    }

    match obj.get("version").map(Value::as_u64) {
        None | Some(Some(1)) => {}
        Some(_) => issues.push(ValidationIssue::warn(
            format!("{FILE}:/version"),
            "unsupported version (expected 1)",
            None,
        )),
    }

    for key in ["vertex", "fragment", "model"] {
        check_file(obj.get(key), key, assets, &mut issues);
    }

    if let Some(scale) = obj.get("model_scale") {
        if let Some(parts) = vec3(scale, "model_scale", &mut issues) {
            for (i, c) in parts.iter().enumerate() {
                if *c <= 0.0 {
                    issues.push(ValidationIssue::warn(
                        format!("{FILE}:/model_scale/{i}"),
                        format!("scale component {c} is not positive"),
                        Some("a zero or negative scale collapses or mirrors the model".into()),
                    ));
                }
            }
        }
    }
    for key in ["model_offset", "model_rotation"] {
        if let Some(val) = obj.get(key) {
            vec3(val, key, &mut issues);
        }
    }
    if obj.get("model").is_none() {
        for key in ["model_offset", "model_scale", "model_rotation"] {
            if obj.contains_key(key) {
                issues.push(ValidationIssue::warn(
                    format!("{FILE}:/{key}"),
                    "set without a model",
                    Some("the built-in quad ignores model placement".into()),
                ));
            }
        }
    }

    if let Some(window) = obj.get("window") {
        for key in ["width", "height"] {
            if window.get(key).and_then(Value::as_u64) == Some(0) {
                issues.push(ValidationIssue::error(
                    format!("{FILE}:/window/{key}"),
                    format!("window {key} is 0"),
                    Some("use a positive size, e.g. 800x600".into()),
                ));
            }
        }
    }

    if let Some(audio) = obj.get("audio") {
        if let Some(fmt) = audio.get("sample_format") {
            let known = fmt.as_str().and_then(SampleFormat::parse).is_some();
            if !known {
                issues.push(ValidationIssue::warn(
                    format!("{FILE}:/audio/sample_format"),
                    format!("unknown sample format {fmt}"),
                    Some("one of: u8, i8, u16, i16, u32, i32, f32".into()),
                ));
            }
        }
        if let Some(ch) = audio.get("channels").and_then(Value::as_u64) {
            if !(1..=2).contains(&ch) {
                issues.push(ValidationIssue::warn(
                    format!("{FILE}:/audio/channels"),
                    format!("{ch} channels requested"),
                    Some("only mono and stereo reach the audio textures".into()),
                ));
            }
        }
    }

    issues
}

fn check_file(v: Option<&Value>, key: &str, assets: &AssetsRoot, issues: &mut Vec<ValidationIssue>) {
    let Some(v) = v else {
        return;
    };
    let Some(rel) = v.as_str() else {
        issues.push(ValidationIssue::error(
            format!("{FILE}:/{key}"),
            "must be a string path",
            None,
        ));
        return;
    };
    let path = assets.resolve(rel);
    if !path.is_file() {
        issues.push(ValidationIssue::error(
            format!("{FILE}:/{key}"),
            format!("file not found: {}", path.display()),
            Some(format!("paths are relative to {}", assets.path().display())),
        ));
    }
}

fn vec3(v: &Value, key: &str, issues: &mut Vec<ValidationIssue>) -> Option<[f64; 3]> {
    let parts: Option<Vec<f64>> = v.as_array().map(|a| a.iter().filter_map(Value::as_f64).collect());
    match parts {
        Some(p) if p.len() == 3 && v.as_array().is_some_and(|a| a.len() == 3) => Some([p[0], p[1], p[2]]),
        _ => {
            issues.push(ValidationIssue::error(
                format!("{FILE}:/{key}"),
                "expected an array of three numbers",
                Some("e.g. [0.0, 1.0, 0.0]".into()),
            ));
            None
        }
    }
}

// RFC 6901 escaping for JSON pointer segments.
fn escape_ptr(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}
