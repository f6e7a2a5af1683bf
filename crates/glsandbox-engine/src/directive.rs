//! `#texture <name> <path>` directives in fragment sources.
//!
//! Handled in two passes so diagnostics always refer to the text the user typed:
//! 1) [`scan`] is pure and records byte ranges and line numbers against the original source.
//! 2) [`rewrite`] replaces the recorded ranges back-to-front with `uniform sampler2D <name>;`.
//!    No directive spans a newline, so the line count is unchanged.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ShaderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDirective {
    pub name: String,
    pub raw_path: String,
    /// Byte range of `#texture ...` in the original source.
    pub range: Range<usize>,
    /// Number of `\n` before the directive (0-based line index).
    pub line: usize,
}

/// A directive whose image was found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTexture {
    pub name: String,
    pub path: PathBuf,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedFragment {
    pub source: String,
    pub textures: Vec<ResolvedTexture>,
}

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(#texture[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]+([^\n\r]+))")
            .expect("valid texture directive pattern")
    })
}

pub fn scan(source: &str) -> Vec<TextureDirective> {
    directive_regex()
        .captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(1)?;
            let name = caps.get(2)?.as_str().to_string();
            let raw_path = caps.get(3)?.as_str().trim().to_string();
            let line = source[..whole.start()].matches('\n').count();
            Some(TextureDirective {
                name,
                raw_path,
                range: whole.range(),
                line,
            })
        })
        .collect()
}

pub fn sampler_declaration(name: &str) -> String {
    format!("uniform sampler2D {name};")
}

/// Replace every scanned directive with its sampler declaration.
pub fn rewrite(source: &str, directives: &[TextureDirective]) -> String {
    let mut out = source.to_string();
    let mut ordered: Vec<&TextureDirective> = directives.iter().collect();
    ordered.sort_by_key(|d| d.range.start);
    for d in ordered.into_iter().rev() {
        out.replace_range(d.range.clone(), &sampler_declaration(&d.name));
    }
    out
}

/// Resolve a directive path against the model directory when one exists, else the
/// working directory. Absolute paths are used as-is.
pub fn resolve_path(raw: &str, model_dir: Option<&Path>) -> PathBuf {
    match model_dir {
        Some(dir) if dir.is_dir() => dir.join(raw),
        _ => PathBuf::from(raw),
    }
}

/// Scan, check every referenced image exists, and rewrite.
///
/// Fails on the first directive (in source order) whose file is missing.
pub fn prepare_fragment(
    source: &str,
    model_dir: Option<&Path>,
) -> Result<PreparedFragment, ShaderError> {
    let directives = scan(source);
    let mut textures = Vec::with_capacity(directives.len());
    for d in &directives {
        let path = resolve_path(&d.raw_path, model_dir);
        if !path.is_file() {
            return Err(ShaderError::MissingTextureFile {
                path: PathBuf::from(&d.raw_path),
                line: d.line,
            });
        }
        let path = std::fs::canonicalize(&path).unwrap_or(path);
        textures.push(ResolvedTexture {
            name: d.name.clone(),
            path,
            line: d.line,
        });
    }
    Ok(PreparedFragment {
        source: rewrite(source, &directives),
        textures,
    })
}
