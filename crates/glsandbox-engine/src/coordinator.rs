//! Entry point for edited shader source.
//!
//! Each request is prepared without the GPU lock, built under it, and swapped in under it
//! again. Failures leave the active program in place; if nothing has ever compiled, the
//! fallback pair is tried exactly once per request and a failing fallback is terminal.

use std::path::PathBuf;
use std::sync::Arc;

use crate::compiler::{build, prepare, ShaderSource};
use crate::defaults::default_source;
use crate::diagnostic::CompileDiagnostic;
use crate::error::ShaderError;
use crate::events::{EngineEvent, EventSink};
use crate::gpu::Gpu;
use crate::monitor::ProgramMonitor;

const TAG: &str = "SHADER";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileTarget {
    User,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Uninitialized,
    Compiling(CompileTarget),
    Ready,
    /// Not even the fallback pair could be built.
    Error,
}

/// Answer to an editor's recompile request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecompileOutcome {
    pub ok: bool,
    pub diagnostics: Vec<CompileDiagnostic>,
}

pub struct HotReloadCoordinator<G: Gpu> {
    monitor: Arc<ProgramMonitor<G>>,
    events: EventSink,
    fallback: ShaderSource,
    model_dir: Option<PathBuf>,
    label: String,
    state: RenderState,
    ever_succeeded: bool,
}

impl<G: Gpu> HotReloadCoordinator<G> {
    pub fn new(monitor: Arc<ProgramMonitor<G>>, events: EventSink) -> Self {
        Self::with_fallback(monitor, events, default_source())
    }

    pub fn with_fallback(monitor: Arc<ProgramMonitor<G>>, events: EventSink, fallback: ShaderSource) -> Self {
        Self {
            monitor,
            events,
            fallback,
            model_dir: None,
            label: "user shaders".to_string(),
            state: RenderState::Uninitialized,
            ever_succeeded: false,
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Directive images resolve against this directory when it exists.
    pub fn set_model_dir(&mut self, dir: Option<PathBuf>) {
        self.model_dir = dir;
    }

    /// Name used in events and the window title for subsequent user sources.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Compile and swap; `true` when the new pair is now active.
    pub fn update_source(&mut self, vertex: &str, fragment: &str) -> bool {
        self.request_recompile(vertex, fragment).ok
    }

    pub fn request_recompile(&mut self, vertex: &str, fragment: &str) -> RecompileOutcome {
        let source = ShaderSource::new(vertex, fragment);
        let target = if source == self.fallback {
            CompileTarget::Fallback
        } else {
            CompileTarget::User
        };

        let label = match target {
            CompileTarget::User => self.label.clone(),
            CompileTarget::Fallback => "built-in default".to_string(),
        };

        match self.attempt(target, &source, &label) {
            Ok(()) => RecompileOutcome {
                ok: true,
                diagnostics: Vec::new(),
            },
            Err(err) => {
                let diagnostic = err.diagnostic();
                self.events.send(EngineEvent::Diagnostic {
                    stage: diagnostic.stage,
                    message: diagnostic.message.clone(),
                    line: diagnostic.line,
                });
                match target {
                    CompileTarget::Fallback => self.give_up(&err),
                    CompileTarget::User if !self.ever_succeeded => self.fall_back(),
                    CompileTarget::User => self.state = RenderState::Ready,
                }
                RecompileOutcome {
                    ok: false,
                    diagnostics: vec![diagnostic],
                }
            }
        }
    }

    fn attempt(&mut self, target: CompileTarget, source: &ShaderSource, label: &str) -> Result<(), ShaderError> {
        self.state = RenderState::Compiling(target);
        let built = prepare(source, self.model_dir.as_deref())
            .and_then(|prepared| self.monitor.with_gpu(|gpu| build(gpu, prepared, label)));
        let program = match built {
            Ok(p) => p,
            Err(e) => {
                self.state = RenderState::Error;
                return Err(e);
            }
        };

        self.monitor.swap(program);
        self.ever_succeeded = true;
        self.state = RenderState::Ready;
        self.events.send(EngineEvent::ShaderCompiled {
            description: label.to_string(),
        });
        Ok(())
    }

    fn fall_back(&mut self) {
        self.events.warn(TAG, "no program compiled yet; falling back to the built-in default");
        let fallback = self.fallback.clone();
        if let Err(err) = self.attempt(CompileTarget::Fallback, &fallback, "built-in default") {
            self.give_up(&err);
        }
    }

    fn give_up(&mut self, err: &ShaderError) {
        self.state = if self.ever_succeeded {
            RenderState::Ready
        } else {
            RenderState::Error
        };
        self.events.send(EngineEvent::Fatal {
            message: format!("Failed to compile default shader: {err}"),
        });
    }
}
