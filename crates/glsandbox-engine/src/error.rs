use std::path::PathBuf;

use crate::diagnostic::{CompileDiagnostic, Stage};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The `assets/` folder could not be found or was invalid.
    #[error("Could not locate assets/ starting from {}", start_dir.display())]
    AssetsNotFound { start_dir: PathBuf },

    /// I/O error reading a file.
    #[error("I/O error for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error for a file.
    #[error("JSON parse error for {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Config is syntactically valid but semantically invalid.
    #[error("Invalid config {}: {msg}", path.display())]
    InvalidConfig { path: PathBuf, msg: String },
}

/// Why a shader pair did not become the active program.
///
/// Every variant is recoverable: the previously active program (or the built-in default)
/// stays in place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShaderError {
    #[error("Image file does not exist: {}", path.display())]
    MissingTextureFile { path: PathBuf, line: usize },

    #[error("Image file could not be decoded: {} ({reason})", path.display())]
    UnreadableTexture {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Vertex shader compile error:\n{log}")]
    VertexCompileError { log: String, line: Option<usize> },

    #[error("Fragment shader compile error:\n{log}")]
    FragmentCompileError { log: String, line: Option<usize> },

    #[error("Program link error:\n{log}")]
    LinkError { log: String },
}

impl ShaderError {
    /// Flatten into the shape the editor collaborator consumes.
    pub fn diagnostic(&self) -> CompileDiagnostic {
        let (stage, line) = match self {
            ShaderError::MissingTextureFile { line, .. }
            | ShaderError::UnreadableTexture { line, .. } => (Some(Stage::Fragment), Some(*line)),
            ShaderError::VertexCompileError { line, .. } => (Some(Stage::Vertex), *line),
            ShaderError::FragmentCompileError { line, .. } => (Some(Stage::Fragment), *line),
            ShaderError::LinkError { .. } => (None, None),
        };
        CompileDiagnostic {
            stage,
            message: self.to_string(),
            line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshParseKind {
    Vertex,
    TexCoord,
    Normal,
}

impl std::fmt::Display for MeshParseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MeshParseKind::Vertex => "vertex",
            MeshParseKind::TexCoord => "uv",
            MeshParseKind::Normal => "normal",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("Failed to open model {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `v`/`vt`/`vn` line had a missing or malformed number.
    #[error("Failed to parse model {} ({kind}) at line {line}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        kind: MeshParseKind,
    },

    /// A face referenced a position that was never declared.
    #[error("Model {} references vertex {index} but only {count} exist", path.display())]
    BadIndex {
        path: PathBuf,
        index: i64,
        count: usize,
    },

    #[error("GPU upload failed: {0}")]
    Upload(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio input device available")]
    NoDevice,

    #[error("audio device reports no usable input configuration: {0}")]
    NoConfig(String),

    #[error("unsupported device sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to build audio input stream: {0}")]
    Stream(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_error_has_no_stage_or_line() {
        let d = ShaderError::LinkError { log: "boom".into() }.diagnostic();
        assert_eq!(d.stage, None);
        assert_eq!(d.line, None);
        assert!(d.message.contains("boom"));
    }

    #[test]
    fn missing_texture_is_a_fragment_diagnostic() {
        let err = ShaderError::MissingTextureFile {
            path: PathBuf::from("noise.png"),
            line: 4,
        };
        let d = err.diagnostic();
        assert_eq!(d.stage, Some(Stage::Fragment));
        assert_eq!(d.line, Some(4));
        assert!(d.message.contains("noise.png"), "got: {}", d.message);
    }

    #[test]
    fn mesh_parse_error_names_the_line_kind() {
        let err = MeshError::Parse {
            path: PathBuf::from("cube.obj"),
            line: 7,
            kind: MeshParseKind::TexCoord,
        };
        let msg = err.to_string();
        assert!(msg.contains("uv") && msg.contains('7'), "got: {msg}");
    }

    #[test]
    fn errors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EngineError>();
        assert_send_sync::<ShaderError>();
        assert_send_sync::<MeshError>();
    }
}
