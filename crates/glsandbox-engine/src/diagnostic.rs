//! Compiler diagnostics and the GLSL preamble they are measured against.
//!
//! Both stages get three precision `#define`s injected right after `#version` (or at the very
//! top when there is none). Drivers report line numbers in the injected text, so every line
//! pulled out of an info log is shifted back by [`PREAMBLE_LINES`] before it reaches the editor.

use std::sync::OnceLock;

use regex::Regex;

pub const PREAMBLE: &str = "#define lowp\n#define mediump\n#define highp\n";
pub const PREAMBLE_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem reported back to whoever supplied the source.
///
/// `stage == None` means the failure belongs to the program as a whole (link errors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileDiagnostic {
    pub stage: Option<Stage>,
    pub message: String,
    pub line: Option<usize>,
}

/// Insert [`PREAMBLE`] after the `#version` line, or prepend it.
pub fn with_preamble(source: &str) -> String {
    match version_line_end(source) {
        Some(end) if end == source.len() && !source.ends_with('\n') => format!("{source}\n{PREAMBLE}"),
        Some(end) => {
            let (head, tail) = source.split_at(end);
            format!("{head}{PREAMBLE}{tail}")
        }
        None => format!("{PREAMBLE}{source}"),
    }
}

// Byte offset just past the `#version` line, if it is the first thing after whitespace and
// comments.
fn version_line_end(source: &str) -> Option<usize> {
    let mut rest = source;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("//") {
            rest = after.find('\n').map_or("", |nl| &after[nl + 1..]);
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            rest = &after[after.find("*/")? + 2..];
        } else {
            rest = trimmed;
            break;
        }
    }
    if !rest.starts_with("#version") {
        return None;
    }
    let start = source.len() - rest.len();
    Some(rest.find('\n').map_or(source.len(), |nl| start + nl + 1))
}

fn error_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // mac  :<line>:
    // mesa :<line>(<errorcode>):
    RE.get_or_init(|| Regex::new(r":([0-9]+)(\([0-9]+\))?:").expect("valid error line pattern"))
}

/// Pull the first line number out of a driver info log and undo the preamble shift.
///
/// Lines that would land at or below zero after the shift are reported unshifted.
pub fn extract_error_line(log: &str) -> Option<usize> {
    let caps = error_line_regex().captures(log)?;
    let raw: usize = caps.get(1)?.as_str().parse().ok()?;
    if raw > PREAMBLE_LINES {
        Some(raw - PREAMBLE_LINES)
    } else {
        Some(raw)
    }
}
