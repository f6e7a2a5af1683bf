//! The two ways a sandbox can run: against a GPU, or headless for checking sources.

use std::path::{Path, PathBuf};

use crate::compiler::{prepare, ShaderSource};
use crate::config::ModelRequest;
use crate::coordinator::RecompileOutcome;
use crate::error::MeshError;
use crate::events::{EngineEvent, EventSink};
use crate::gpu::Gpu;
use crate::mesh;
use crate::render::RenderLoop;

/// Headless runtime: everything up to the driver (directives, images, meshes), no GL.
#[derive(Debug)]
pub struct NullRuntime {
    events: EventSink,
    model_dir: Option<PathBuf>,
    smooth_normals: bool,
}

impl NullRuntime {
    pub fn new(events: EventSink, smooth_normals: bool) -> Self {
        Self {
            events,
            model_dir: None,
            smooth_normals,
        }
    }

    fn check(&mut self, source: &ShaderSource) -> RecompileOutcome {
        match prepare(source, self.model_dir.as_deref()) {
            Ok(prepared) => {
                self.events.info(
                    "CHECK",
                    format!("sources prepared ({} directive texture(s))", prepared.images.len()),
                );
                RecompileOutcome {
                    ok: true,
                    diagnostics: Vec::new(),
                }
            }
            Err(err) => {
                let d = err.diagnostic();
                self.events.send(EngineEvent::Diagnostic {
                    stage: d.stage,
                    message: d.message.clone(),
                    line: d.line,
                });
                RecompileOutcome {
                    ok: false,
                    diagnostics: vec![d],
                }
            }
        }
    }

    fn load(&mut self, request: &ModelRequest) -> Result<(), MeshError> {
        let mesh = mesh::load(&request.path, self.smooth_normals)?;
        self.events.send(EngineEvent::ModelLoaded {
            path: request.path.clone(),
            vertices: mesh.vertex_count(),
            indices: mesh.indices.len(),
        });
        self.model_dir = request.path.parent().map(Path::to_path_buf);
        Ok(())
    }
}

/// Exactly one kind of runtime is active; chosen when the sandbox starts.
pub enum Runtime<G: Gpu> {
    Live(RenderLoop<G>),
    Null(NullRuntime),
}

impl<G: Gpu> Runtime<G> {
    pub fn initialize(&mut self, source: &ShaderSource) -> bool {
        self.update_code(source).ok
    }

    pub fn update_code(&mut self, source: &ShaderSource) -> RecompileOutcome {
        match self {
            Runtime::Live(r) => r.request_recompile(&source.vertex, &source.fragment),
            Runtime::Null(n) => n.check(source),
        }
    }

    pub fn load_model(&mut self, request: &ModelRequest) -> Result<(), MeshError> {
        match self {
            Runtime::Live(r) => r.load_model(request),
            Runtime::Null(n) => n.load(request),
        }
    }

    /// The render loop, when there is one to drive.
    pub fn as_live_mut(&mut self) -> Option<&mut RenderLoop<G>> {
        match self {
            Runtime::Live(r) => Some(r),
            Runtime::Null(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Runtime::Live(_) => "live",
            Runtime::Null(_) => "null",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeGpu;

    #[test]
    fn null_runtime_resolves_textures_against_the_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        let obj = dir.path().join("tri.obj");
        std::fs::write(&obj, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        image::RgbaImage::new(1, 1).save(dir.path().join("t.png")).unwrap();

        let mut rt: Runtime<FakeGpu> = Runtime::Null(NullRuntime::new(EventSink::discard(), false));
        let src = ShaderSource::new("void main() {}", "#texture t t.png\nvoid main() {}\n");
        assert!(!rt.initialize(&src));

        rt.load_model(&ModelRequest::at_origin(&obj)).unwrap();
        assert!(rt.update_code(&src).ok);
        assert_eq!(rt.kind(), "null");
    }

    #[test]
    fn null_runtime_reports_missing_textures() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut rt: Runtime<FakeGpu> = Runtime::Null(NullRuntime::new(EventSink::new(tx), false));
        let outcome = rt.update_code(&ShaderSource::new("", "\n#texture a /no/such/file.png\n"));
        assert!(!outcome.ok);
        assert_eq!(outcome.diagnostics[0].line, Some(1));
        assert!(rx.try_iter().any(|e| matches!(e, EngineEvent::Diagnostic { .. })));
    }

    #[test]
    fn live_runtime_compiles_through_the_render_loop() {
        let live = RenderLoop::new(
            FakeGpu::default(),
            EventSink::discard(),
            crate::audio::FrameSlot::new(),
            crate::config::CameraConfig::default(),
        );
        let mut rt = Runtime::Live(live);
        assert!(rt.initialize(&crate::defaults::default_source()));
        assert_eq!(rt.kind(), "live");
        assert!(rt.as_live_mut().is_some_and(|r| r.frame(&Default::default(), 0.016)));
    }
}
