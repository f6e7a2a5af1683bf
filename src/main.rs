//! glsandbox: a live GLSL sandbox.
//!
//! Opens a window with an OpenGL 3.3 core context, draws the configured shader pair over a
//! model (or a full-screen quad), feeds captured audio into `audioLeft`/`audioRight`, and
//! recompiles whenever a watched source file is saved. `--check` runs the same pipeline
//! headless up to the driver and exits.

mod audio_capture;
mod hotreload;
mod input;
mod logging;
mod validate;

use std::ffi::CString;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context as _};
use clap::Parser;
use crossbeam_channel::Receiver;
use glutin::config::ConfigTemplateBuilder;
use glutin::context::{ContextApi, ContextAttributesBuilder, NotCurrentContext, Version};
use glutin::display::GetGlDisplay;
use glutin::prelude::*;
use glutin::surface::{SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::DisplayBuilder;
use raw_window_handle::HasRawWindowHandle;
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::Window;

use glsandbox_engine::assets::read_to_string;
use glsandbox_engine::audio::FrameSlot;
use glsandbox_engine::gl::GlowGpu;
use glsandbox_engine::{
    load_sandbox_config, AssetsRoot, ConfigMode, EngineEvent, EventSink, ModelRequest, NullRuntime,
    RenderLoop, Runtime, SandboxConfig, ShaderSource,
};

use crate::hotreload::{HotReload, ReloadPlan, WatchTargets};
use crate::input::InputState;

#[derive(Debug, Parser)]
#[command(name = "glsandbox", version, about = "Live GLSL sandbox with hot reload")]
struct Args {
    /// assets/ directory (default: GLSANDBOX_ASSETS, then search upward)
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Vertex shader, overriding sandbox.json
    #[arg(long)]
    vertex: Option<PathBuf>,

    /// Fragment shader, overriding sandbox.json
    #[arg(long)]
    fragment: Option<PathBuf>,

    /// Wavefront OBJ model, overriding sandbox.json
    #[arg(long)]
    model: Option<PathBuf>,

    #[arg(long)]
    smooth_normals: bool,

    /// Reject unknown fields and unsupported versions in sandbox.json
    #[arg(long)]
    strict: bool,

    /// Append log lines to this file (default: GLSANDBOX_LOG_FILE)
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[arg(long)]
    no_audio: bool,

    /// Prepare sources and parse the model without opening a window
    #[arg(long)]
    check: bool,
}

fn main() {
    let args = Args::parse();
    let run_id = logging::init(logging::log_file_from(args.log_file.clone()));
    logi!("INIT", "run_id={run_id}");

    if let Err(e) = run(&args) {
        loge!("INIT", "{e:#}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let (assets, cfg) = load_session(args)?;
    if args.check {
        check(&cfg)
    } else {
        live(assets, args, cfg)
    }
}

fn find_assets(args: &Args) -> anyhow::Result<AssetsRoot> {
    if let Some(p) = &args.assets {
        return Ok(AssetsRoot::at(p)?);
    }
    let cwd = std::env::current_dir().context("current directory")?;
    let found = AssetsRoot::discover(&cwd).or_else(|_| AssetsRoot::discover(Path::new(env!("CARGO_MANIFEST_DIR"))))?;
    Ok(found)
}

fn load_session(args: &Args) -> anyhow::Result<(AssetsRoot, SandboxConfig)> {
    let assets = find_assets(args)?;
    logi!("INIT", "assets base: {}", assets.path().display());
    let cfg = load_config(&assets, args)?;
    Ok((assets, cfg))
}

fn load_config(assets: &AssetsRoot, args: &Args) -> anyhow::Result<SandboxConfig> {
    let mode = if args.strict {
        ConfigMode::Strict
    } else {
        ConfigMode::Lenient
    };
    let mut cfg = load_sandbox_config(assets, mode)?;

    match &cfg.source {
        Some(path) => {
            logi!("CONFIG", "loaded {}", path.display());
            let raw = read_to_string(path)
                .ok()
                .and_then(|t| serde_json::from_str::<serde_json::Value>(&t).ok());
            if let Some(v) = raw {
                let issues = validate::validate_sandbox_json(&v, assets);
                validate::emit_summary("CONFIG", "sandbox.json", &issues);
                validate::emit_issues("CONFIG", &issues);
            }
        }
        None => logi!("CONFIG", "no sandbox.json; using defaults"),
    }

    apply_overrides(&mut cfg, args);
    logi!("CONFIG", "vertex: {}", cfg.vertex.display());
    logi!("CONFIG", "fragment: {}", cfg.fragment.display());
    if let Some(m) = &cfg.model {
        logi!("CONFIG", "model: {}", m.path.display());
    }
    Ok(cfg)
}

fn apply_overrides(cfg: &mut SandboxConfig, args: &Args) {
    if let Some(v) = &args.vertex {
        cfg.vertex = v.clone();
    }
    if let Some(f) = &args.fragment {
        cfg.fragment = f.clone();
    }
    if let Some(m) = &args.model {
        let placed = cfg.model.take().unwrap_or_else(|| ModelRequest::at_origin(m));
        cfg.model = Some(ModelRequest {
            path: m.clone(),
            ..placed
        });
    }
    cfg.smooth_normals |= args.smooth_normals;
    if args.no_audio {
        cfg.audio.enabled = false;
    }
}

fn read_sources(cfg: &SandboxConfig) -> anyhow::Result<ShaderSource> {
    Ok(ShaderSource::new(read_to_string(&cfg.vertex)?, read_to_string(&cfg.fragment)?))
}

fn source_label(cfg: &SandboxConfig) -> String {
    let name = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| p.display().to_string())
    };
    format!("{} + {}", name(&cfg.vertex), name(&cfg.fragment))
}

/// Log everything pending; a successful compile also retitles the window.
fn drain_events(rx: &Receiver<EngineEvent>, window: Option<(&Window, &str)>) {
    for ev in rx.try_iter() {
        logging::log_engine_event(&ev);
        if let (EngineEvent::ShaderCompiled { description }, Some((w, base))) = (&ev, window) {
            w.set_title(&format!("{base} - {description}"));
        }
    }
}

fn check(cfg: &SandboxConfig) -> anyhow::Result<()> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut runtime: Runtime<GlowGpu> = Runtime::Null(NullRuntime::new(EventSink::new(tx), cfg.smooth_normals));
    logi!("CHECK", "runtime: {}", runtime.kind());

    let mut ok = true;
    if let Some(model) = &cfg.model {
        if let Err(e) = runtime.load_model(model) {
            loge!("MODEL", "{e}");
            ok = false;
        }
    }
    ok &= runtime.initialize(&read_sources(cfg)?);
    drain_events(&rx, None);

    if ok {
        logi!("CHECK", "OK");
        Ok(())
    } else {
        Err(anyhow!("check failed"))
    }
}

fn watch_targets(cfg: &SandboxConfig) -> WatchTargets {
    WatchTargets {
        vertex: Some(cfg.vertex.clone()),
        fragment: Some(cfg.fragment.clone()),
        model: cfg.model.as_ref().map(|m| m.path.clone()),
        config: cfg.source.clone(),
    }
}

fn start_watcher(cfg: &SandboxConfig) -> Option<HotReload> {
    match HotReload::new(watch_targets(cfg)) {
        Ok(w) => Some(w),
        Err(e) => {
            logw!("WATCH", "hot reload disabled: {e}");
            None
        }
    }
}

/// Everything the event loop owns besides the GL objects.
struct App {
    assets: AssetsRoot,
    cfg: SandboxConfig,
    runtime: Runtime<GlowGpu>,
    watcher: Option<HotReload>,
    input: InputState,
    last_frame: Instant,
}

impl App {
    fn renderer(&mut self) -> Option<&mut RenderLoop<GlowGpu>> {
        self.runtime.as_live_mut()
    }

    fn recompile(&mut self) {
        match read_sources(&self.cfg) {
            Ok(src) => {
                let outcome = self.runtime.update_code(&src);
                if !outcome.ok {
                    logw!("HOT", "compile failed; keeping previous program");
                }
            }
            Err(e) => logw!("HOT", "{e}"),
        }
    }

    fn place_model(&mut self) {
        if let Some(model) = self.cfg.model.clone() {
            if let Err(e) = self.runtime.load_model(&model) {
                logw!("MODEL", "{e}");
            }
        }
    }

    /// Returns whether the shaders were recompiled along the way.
    fn reload_config(&mut self, args: &Args) -> bool {
        let fresh = match load_config(&self.assets, args) {
            Ok(c) => c,
            Err(e) => {
                logw!("CONFIG", "reload failed, keeping previous settings: {e:#}");
                return false;
            }
        };
        let shaders_moved = fresh.vertex != self.cfg.vertex || fresh.fragment != self.cfg.fragment;
        let model_moved = fresh.model.as_ref().map(|m| &m.path) != self.cfg.model.as_ref().map(|m| &m.path);
        self.cfg = fresh;

        let smooth_normals = self.cfg.smooth_normals;
        if let Some(r) = self.renderer() {
            r.set_smooth_normals(smooth_normals);
        }
        self.place_model();
        if shaders_moved {
            let label = source_label(&self.cfg);
            if let Some(r) = self.renderer() {
                r.set_source_label(label);
            }
            self.recompile();
        }
        if shaders_moved || model_moved {
            self.watcher = start_watcher(&self.cfg);
        }
        shaders_moved
    }

    fn pump_hot_reload(&mut self, args: &Args) {
        let Some(pending) = self.watcher.as_ref().map(HotReload::drain) else {
            return;
        };
        for ev in &pending {
            logi!("WATCH", "change detected: {ev:?}");
        }
        let plan = ReloadPlan::from_events(pending);

        let recompiled = plan.reload_config && self.reload_config(args);
        if plan.recompile && !recompiled {
            self.recompile();
        }
        if plan.reload_model {
            if let Some(Err(e)) = self.renderer().map(|r| r.reload_model()) {
                logw!("MODEL", "{e}");
            }
        }
    }
}

fn live(assets: AssetsRoot, args: &Args, cfg: SandboxConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().map_err(|e| anyhow!("event loop: {e}"))?;

    let (width, height) = (cfg.window.width.max(1), cfg.window.height.max(1));
    let base_title = cfg.window.title.clone();
    let window_builder = winit::window::WindowBuilder::new()
        .with_title(&base_title)
        .with_inner_size(PhysicalSize::new(width, height));

    let template = ConfigTemplateBuilder::new().with_alpha_size(8).with_depth_size(24);
    let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));

    let (window, gl_config) = display_builder
        .build(&event_loop, template, |configs| {
            configs
                .reduce(|a, b| if a.num_samples() > b.num_samples() { a } else { b })
                .expect("glutin offers at least one config")
        })
        .map_err(|e| anyhow!("failed to build display: {e}"))?;
    let window = window.ok_or_else(|| anyhow!("no window created"))?;

    let raw_window_handle = window.raw_window_handle();
    let gl_display = gl_config.display();

    let context_attributes = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
        .build(Some(raw_window_handle));

    let not_current_gl_context: NotCurrentContext = unsafe {
        gl_display
            .create_context(&gl_config, &context_attributes)
            .context("create_context")?
    };

    let size = window.inner_size();
    let attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        raw_window_handle,
        NonZeroU32::new(size.width.max(1)).unwrap_or(NonZeroU32::MIN),
        NonZeroU32::new(size.height.max(1)).unwrap_or(NonZeroU32::MIN),
    );

    let gl_surface = unsafe {
        gl_display
            .create_window_surface(&gl_config, &attrs)
            .context("create_window_surface")?
    };

    let gl_context = not_current_gl_context
        .make_current(&gl_surface)
        .context("make_current")?;

    if let Err(e) = gl_surface.set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::MIN)) {
        logw!("GL", "vsync unavailable: {e}");
    }

    let gl = unsafe {
        glow::Context::from_loader_function(|s| match CString::new(s) {
            Ok(name) => gl_display.get_proc_address(&name) as *const _,
            Err(_) => std::ptr::null(),
        })
    };

    let (tx, rx) = crossbeam_channel::unbounded();
    let events = EventSink::new(tx);

    let mut gpu = GlowGpu::new(gl);
    if gpu.enable_debug_output(events.clone()) {
        logi!("GL", "KHR_debug output enabled");
    }

    let slot = FrameSlot::new();
    let _capture = if cfg.audio.enabled {
        match audio_capture::start(&cfg.audio, slot.clone()) {
            Ok(c) => Some(c),
            Err(e) => {
                logw!("AUDIO", "capture disabled: {e}");
                None
            }
        }
    } else {
        logi!("AUDIO", "capture disabled by config");
        None
    };

    let mut renderer = RenderLoop::new(gpu, events, slot, cfg.camera.clone());
    renderer.set_smooth_normals(cfg.smooth_normals);
    renderer.set_source_label(source_label(&cfg));
    renderer.resize(size.width, size.height);

    let mut app = App {
        assets,
        watcher: start_watcher(&cfg),
        runtime: Runtime::Live(renderer),
        cfg,
        input: InputState::default(),
        last_frame: Instant::now(),
    };
    logi!("INIT", "runtime: {}", app.runtime.kind());

    // The model directory decides where #texture paths resolve, so it goes first.
    app.place_model();
    let initial = read_sources(&app.cfg).unwrap_or_else(|e| {
        logw!("SHADER", "{e}; starting from the built-in default");
        glsandbox_engine::defaults::default_source()
    });
    // Even a failed default leaves the loop running; frames are just cleared.
    app.runtime.initialize(&initial);
    drain_events(&rx, Some((&window, base_title.as_str())));

    event_loop
        .run(|event, target| {
            target.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        if let Some(r) = app.renderer() {
                            r.shutdown();
                        }
                        drain_events(&rx, None);
                        target.exit();
                    }

                    WindowEvent::Resized(new_size) => {
                        if let (Some(w), Some(h)) = (NonZeroU32::new(new_size.width), NonZeroU32::new(new_size.height)) {
                            gl_surface.resize(&gl_context, w, h);
                        }
                        if let Some(r) = app.renderer() {
                            r.resize(new_size.width, new_size.height);
                        }
                        window.request_redraw();
                    }

                    WindowEvent::Focused(false) => app.input.release_all(),

                    WindowEvent::KeyboardInput { event, .. } => {
                        if let PhysicalKey::Code(code) = event.physical_key {
                            app.input.key(code, event.state);
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        app.input.cursor_moved(position.x, position.y);
                        if let Some(r) = app.renderer() {
                            r.set_cursor(position.x, position.y);
                        }
                    }

                    WindowEvent::MouseInput { state, button, .. } => app.input.mouse_button(button, state),

                    WindowEvent::RedrawRequested => {
                        let now = Instant::now();
                        let dt = now.duration_since(app.last_frame).as_secs_f32();
                        app.last_frame = now;

                        let camera = app.input.take();
                        if let Some(r) = app.renderer() {
                            r.frame(&camera, dt);
                        }
                        if let Err(e) = gl_surface.swap_buffers(&gl_context) {
                            logw!("GL", "swap_buffers failed: {e}");
                        }
                    }

                    _ => {}
                },

                Event::AboutToWait => {
                    app.pump_hot_reload(args);
                    drain_events(&rx, Some((&window, base_title.as_str())));
                    window.request_redraw();
                }

                _ => {}
            }
        })
        .map_err(|e| anyhow!("event loop failed: {e}"))
}
