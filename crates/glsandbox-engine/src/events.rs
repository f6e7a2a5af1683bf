use std::path::PathBuf;

use crossbeam_channel::Sender;

use crate::audio::SampleFormat;
use crate::diagnostic::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Everything the engine has to say. The host drains these and decides how to show them.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// General-purpose log line.
    Log {
        level: LogLevel,
        tag: &'static str,
        msg: String,
    },

    /// A compile attempt failed; the previous program stays active.
    Diagnostic {
        stage: Option<Stage>,
        message: String,
        line: Option<usize>,
    },

    /// Even the built-in default shaders failed to build.
    Fatal { message: String },

    /// The renderer window was closed by the user.
    Closed,

    /// A program was built and swapped in.
    ShaderCompiled { description: String },

    ModelLoaded {
        path: PathBuf,
        vertices: usize,
        indices: usize,
    },

    /// First frame of a new capture format arrived.
    AudioFormat {
        format: Option<SampleFormat>,
        channels: u16,
    },
}

/// Cloneable sending half handed to every engine component.
///
/// Sends never block and a disconnected receiver is ignored.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<Sender<EngineEvent>>,
}

impl EventSink {
    pub fn new(tx: Sender<EngineEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that drops everything.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, ev: EngineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(ev);
        }
    }

    pub fn log(&self, level: LogLevel, tag: &'static str, msg: impl Into<String>) {
        self.send(EngineEvent::Log {
            level,
            tag,
            msg: msg.into(),
        });
    }

    pub fn info(&self, tag: &'static str, msg: impl Into<String>) {
        self.log(LogLevel::Info, tag, msg);
    }

    pub fn warn(&self, tag: &'static str, msg: impl Into<String>) {
        self.log(LogLevel::Warn, tag, msg);
    }
}
