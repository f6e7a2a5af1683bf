//! Per-frame driver: audio intake, camera, uniforms, draw.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use glam::{Mat4, Vec2};

use crate::audio::{split_channels, FrameSlot, SampleFormat};
use crate::camera::{aspect_ratio, model_matrix, projection, CameraInput, CameraState, Matrices};
use crate::config::{CameraConfig, ModelRequest};
use crate::coordinator::{HotReloadCoordinator, RecompileOutcome, RenderState};
use crate::error::MeshError;
use crate::events::{EngineEvent, EventSink};
use crate::gpu::Gpu;
use crate::mesh;
use crate::monitor::{FrameUniforms, ProgramMonitor};

const TAG: &str = "RENDER";

#[derive(Debug, Clone, PartialEq)]
struct LoadedModel {
    path: PathBuf,
    transform: Mat4,
}

pub struct RenderLoop<G: Gpu> {
    monitor: Arc<ProgramMonitor<G>>,
    reload: HotReloadCoordinator<G>,
    events: EventSink,
    audio: FrameSlot,
    audio_format: Option<(Option<SampleFormat>, u16)>,
    camera: CameraState,
    camera_cfg: CameraConfig,
    model: Option<LoadedModel>,
    smooth_normals: bool,
    started: Instant,
    size: (u32, u32),
    mouse: Vec2,
}

impl<G: Gpu> RenderLoop<G> {
    pub fn new(gpu: G, events: EventSink, audio: FrameSlot, camera_cfg: CameraConfig) -> Self {
        let monitor = Arc::new(ProgramMonitor::new(gpu));
        let reload = HotReloadCoordinator::new(Arc::clone(&monitor), events.clone());
        Self::with_coordinator(monitor, reload, events, audio, camera_cfg)
    }

    pub fn with_coordinator(
        monitor: Arc<ProgramMonitor<G>>,
        reload: HotReloadCoordinator<G>,
        events: EventSink,
        audio: FrameSlot,
        camera_cfg: CameraConfig,
    ) -> Self {
        Self {
            monitor,
            reload,
            events,
            audio,
            audio_format: None,
            camera: CameraState::default(),
            camera_cfg,
            model: None,
            smooth_normals: false,
            started: Instant::now(),
            size: (1, 1),
            mouse: Vec2::ZERO,
        }
    }

    pub fn monitor(&self) -> &Arc<ProgramMonitor<G>> {
        &self.monitor
    }

    pub fn state(&self) -> RenderState {
        self.reload.state()
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn set_smooth_normals(&mut self, smooth: bool) {
        self.smooth_normals = smooth;
    }

    pub fn set_source_label(&mut self, label: impl Into<String>) {
        self.reload.set_label(label);
    }

    pub fn request_recompile(&mut self, vertex: &str, fragment: &str) -> RecompileOutcome {
        self.reload.request_recompile(vertex, fragment)
    }

    pub fn update_source(&mut self, vertex: &str, fragment: &str) -> bool {
        self.reload.update_source(vertex, fragment)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    /// Cursor position in window pixels.
    pub fn set_cursor(&mut self, x: f64, y: f64) {
        let (w, h) = self.size;
        self.mouse = Vec2::new(
            if w == 0 { 0.0 } else { (x / w as f64) as f32 },
            if h == 0 { 0.0 } else { (y / h as f64) as f32 },
        );
    }

    /// Load (or re-place) a model.
    ///
    /// The mesh is only re-read when the path changes; the transform is always updated on
    /// success. On failure the previous mesh and transform stay.
    pub fn load_model(&mut self, request: &ModelRequest) -> Result<(), MeshError> {
        let same_path = self.model.as_ref().is_some_and(|m| m.path == request.path);
        if !same_path {
            self.read_mesh(&request.path)?;
        }
        self.model = Some(LoadedModel {
            path: request.path.clone(),
            transform: model_matrix(request.offset, request.scale, request.rotation),
        });
        Ok(())
    }

    /// Re-read the current model file after it changed on disk. No-op without a model.
    pub fn reload_model(&mut self) -> Result<(), MeshError> {
        match self.model.as_ref().map(|m| m.path.clone()) {
            Some(path) => self.read_mesh(&path),
            None => Ok(()),
        }
    }

    fn read_mesh(&mut self, path: &Path) -> Result<(), MeshError> {
        let mesh = mesh::load(path, self.smooth_normals)?;
        self.monitor.replace_mesh(&mesh)?;
        self.events.send(EngineEvent::ModelLoaded {
            path: path.to_path_buf(),
            vertices: mesh.vertex_count(),
            indices: mesh.indices.len(),
        });
        self.reload.set_model_dir(path.parent().map(Path::to_path_buf));
        Ok(())
    }

    fn model_transform(&self) -> Mat4 {
        self.model.as_ref().map(|m| m.transform).unwrap_or(Mat4::IDENTITY)
    }

    /// Upload the newest pending audio frame, if any.
    fn pump_audio(&mut self) {
        let Some(frame) = self.audio.take() else {
            return;
        };
        let seen = (frame.format(), frame.channels);
        if self.audio_format != Some(seen) {
            self.audio_format = Some(seen);
            self.events.send(EngineEvent::AudioFormat {
                format: seen.0,
                channels: seen.1,
            });
        }
        let Some(payload) = split_channels(&frame) else {
            return;
        };
        if let Err(e) = self.monitor.upload_audio(&payload) {
            self.events.warn(TAG, format!("audio texture upload failed: {e}"));
        }
    }

    /// Uniform values for the current state, without touching the GPU.
    pub fn frame_uniforms(&self) -> FrameUniforms {
        let (w, h) = self.size;
        FrameUniforms {
            matrices: Matrices::new(self.camera.view(), projection(w, h), self.model_transform()),
            time_ms: self.started.elapsed().as_secs_f32() * 1000.0,
            mouse: self.mouse,
            aspect: aspect_ratio(w, h),
            viewport: self.size,
        }
    }

    /// Draw one frame. `dt` is the wall time since the previous frame in seconds.
    pub fn frame(&mut self, input: &CameraInput, dt: f32) -> bool {
        self.pump_audio();
        if !input.is_idle() {
            self.camera.apply(input, &self.camera_cfg, dt);
        }
        let uniforms = self.frame_uniforms();
        self.monitor.render(&uniforms)
    }

    pub fn shutdown(&mut self) {
        self.monitor.shutdown();
        self.events.send(EngineEvent::Closed);
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::audio::{AudioFrame, SampleKind};
    use crate::fake::{FakeGpu, UniformValue};

    const VERT: &str = "#version 330 core\nin vec3 position;\nin vec2 texCoord;\nin vec3 normal;\nuniform mat4 M;\nuniform mat4 MVP;\nvoid main() { gl_Position = MVP * M * vec4(position, 1.0); }\n";
    const FRAG: &str = "#version 330 core\nuniform vec2 mouse;\nuniform float u_aspect;\nout vec4 c;\nvoid main() { c = vec4(mouse, u_aspect, 1.0); }\n";
    const CUBE_FACE: &str = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";

    fn render_loop() -> (RenderLoop<FakeGpu>, FrameSlot, crossbeam_channel::Receiver<EngineEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let slot = FrameSlot::new();
        let r = RenderLoop::new(FakeGpu::default(), EventSink::new(tx), slot.clone(), CameraConfig::default());
        (r, slot, rx)
    }

    #[test]
    fn frames_draw_after_first_compile() {
        let (mut r, _slot, _rx) = render_loop();
        assert!(!r.frame(&CameraInput::default(), 0.016));
        assert!(r.update_source(VERT, FRAG));
        assert!(r.frame(&CameraInput::default(), 0.016));
        assert_eq!(r.state(), RenderState::Ready);
    }

    #[test]
    fn mouse_and_aspect_follow_the_window() {
        let (mut r, _slot, _rx) = render_loop();
        r.resize(400, 200);
        r.set_cursor(100.0, 50.0);
        assert!(r.update_source(VERT, FRAG));
        r.frame(&CameraInput::default(), 0.0);
        let handle = r.monitor().active_handle().unwrap();
        r.monitor().with_gpu(|gpu| {
            assert_eq!(gpu.uniform(handle, "mouse"), Some(&UniformValue::Vec2(Vec2::new(0.25, 0.25))));
            assert_eq!(gpu.uniform(handle, "u_aspect"), Some(&UniformValue::Float(2.0)));
        });
    }

    #[test]
    fn audio_frames_are_uploaded_and_format_reported_once() {
        let (mut r, slot, rx) = render_loop();
        assert!(r.update_source(VERT, FRAG));
        for _ in 0..2 {
            slot.publish(AudioFrame::from_samples(SampleKind::Signed, 2, &[1i16, 2, 3, 4]));
            r.frame(&CameraInput::default(), 0.016);
        }
        let formats = rx
            .try_iter()
            .filter(|e| matches!(e, EngineEvent::AudioFormat { .. }))
            .count();
        assert_eq!(formats, 1);
        r.monitor().with_gpu(|gpu| {
            assert_eq!(gpu.audio_uploads.len(), 4);
            assert!(gpu.audio_uploads.iter().all(|u| u.format == SampleFormat::I16 && u.samples == 2));
        });
    }

    #[test]
    fn unsupported_audio_is_dropped_silently() {
        let (mut r, slot, _rx) = render_loop();
        assert!(r.update_source(VERT, FRAG));
        slot.publish(AudioFrame {
            kind: SampleKind::Float,
            bits: 64,
            channels: 2,
            bytes: vec![0; 32],
        });
        assert!(r.frame(&CameraInput::default(), 0.016));
        r.monitor().with_gpu(|gpu| assert!(gpu.audio_uploads.is_empty()));
    }

    #[test]
    fn model_loading_updates_transform_and_keeps_mesh_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("quad.obj");
        std::fs::write(&good, CUBE_FACE).unwrap();
        let bad = dir.path().join("bad.obj");
        std::fs::write(&bad, "v 1 nope 2\n").unwrap();

        let (mut r, _slot, rx) = render_loop();
        assert!(r.update_source(VERT, FRAG));

        r.load_model(&ModelRequest::at_origin(&good)).unwrap();
        let moved = ModelRequest {
            offset: Vec3::new(1.0, 2.0, 3.0),
            ..ModelRequest::at_origin(&good)
        };
        r.load_model(&moved).unwrap();
        assert_eq!(r.frame_uniforms().matrices.model, Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));

        assert!(r.load_model(&ModelRequest::at_origin(&bad)).is_err());
        assert_eq!(r.frame_uniforms().matrices.model, Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));

        let loads = rx
            .try_iter()
            .filter(|e| matches!(e, EngineEvent::ModelLoaded { .. }))
            .count();
        assert_eq!(loads, 1);

        r.frame(&CameraInput::default(), 0.016);
        r.monitor().with_gpu(|gpu| {
            assert_eq!(gpu.live_meshes(), 1);
            let draw = gpu.draws.last().unwrap();
            assert!(draw.indexed);
            assert_eq!(draw.count, 6);
            assert!(draw.attribs.normal.is_some());
        });
    }

    #[test]
    fn reload_model_rereads_the_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.obj");
        std::fs::write(&path, CUBE_FACE).unwrap();

        let (mut r, _slot, rx) = render_loop();
        r.reload_model().unwrap();
        r.load_model(&ModelRequest::at_origin(&path)).unwrap();

        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        r.reload_model().unwrap();

        let vertices: Vec<usize> = rx
            .try_iter()
            .filter_map(|e| match e {
                EngineEvent::ModelLoaded { vertices, .. } => Some(vertices),
                _ => None,
            })
            .collect();
        assert_eq!(vertices, vec![4, 3]);
        r.monitor().with_gpu(|gpu| assert_eq!(gpu.live_meshes(), 1));
    }

    #[test]
    fn held_keys_move_the_camera() {
        let (mut r, _slot, _rx) = render_loop();
        let start = r.camera().position;
        let input = CameraInput {
            movement: Vec3::new(0.0, 1.0, 0.0),
            ..Default::default()
        };
        r.frame(&input, 1.0);
        let moved = r.camera().position - start;
        assert!((moved - Vec3::new(0.0, CameraConfig::default().move_speed, 0.0)).length() < 1e-5);
    }

    #[test]
    fn shutdown_emits_closed() {
        let (mut r, _slot, rx) = render_loop();
        assert!(r.update_source(VERT, FRAG));
        r.shutdown();
        assert!(rx.try_iter().any(|e| e == EngineEvent::Closed));
        assert!(!r.monitor().has_program());
    }
}
