use std::path::PathBuf;

use crate::gpu::{AttribLocations, Gpu};

/// Accepted spellings per logical input; the first one the program exposes wins.
pub const POSITION_NAMES: &[&str] = &["position", "a_position"];
pub const TEX_COORD_NAMES: &[&str] = &["texCoord", "a_texCoord", "uv"];
pub const NORMAL_NAMES: &[&str] = &["normal", "a_normal"];

pub const VIEW_NAMES: &[&str] = &["V", "u_view"];
pub const PROJECTION_NAMES: &[&str] = &["P", "u_projection"];
pub const MODEL_NAMES: &[&str] = &["M", "u_model"];
pub const MODEL_VIEW_NAMES: &[&str] = &["MV", "u_modelView"];
pub const MVP_NAMES: &[&str] = &["MVP", "u_mvp"];
pub const TIME_NAMES: &[&str] = &["time", "u_time", "iTime"];
pub const MOUSE_NAMES: &[&str] = &["mouse", "u_mouse", "iMouse"];
pub const ASPECT_NAMES: &[&str] = &["ratio", "ration", "u_aspect"];
pub const AUDIO_LEFT_NAMES: &[&str] = &["audioLeft"];
pub const AUDIO_RIGHT_NAMES: &[&str] = &["audioRight"];

pub const AUDIO_LEFT_UNIT: u32 = 0;
pub const AUDIO_RIGHT_UNIT: u32 = 1;
/// Directive textures occupy units from here on, in declaration order.
pub const FIRST_IMAGE_UNIT: u32 = 2;

#[derive(Debug, Clone)]
pub struct UniformLocations<L> {
    pub view: Option<L>,
    pub projection: Option<L>,
    pub model: Option<L>,
    pub model_view: Option<L>,
    pub mvp: Option<L>,
    pub time: Option<L>,
    pub mouse: Option<L>,
    pub aspect: Option<L>,
    pub audio_left: Option<L>,
    pub audio_right: Option<L>,
}

impl<L> UniformLocations<L> {
    pub fn resolve<G: Gpu<UniformLocation = L>>(gpu: &mut G, program: G::Program) -> Self {
        let mut find = |names: &[&str]| first_uniform(gpu, program, names);
        Self {
            view: find(VIEW_NAMES),
            projection: find(PROJECTION_NAMES),
            model: find(MODEL_NAMES),
            model_view: find(MODEL_VIEW_NAMES),
            mvp: find(MVP_NAMES),
            time: find(TIME_NAMES),
            mouse: find(MOUSE_NAMES),
            aspect: find(ASPECT_NAMES),
            audio_left: find(AUDIO_LEFT_NAMES),
            audio_right: find(AUDIO_RIGHT_NAMES),
        }
    }
}

pub fn resolve_attribs<G: Gpu>(gpu: &mut G, program: G::Program) -> AttribLocations {
    let mut find = |names: &[&str]| names.iter().find_map(|n| gpu.attrib_location(program, n));
    AttribLocations {
        position: find(POSITION_NAMES),
        tex_coord: find(TEX_COORD_NAMES),
        normal: find(NORMAL_NAMES),
    }
}

fn first_uniform<G: Gpu>(gpu: &mut G, program: G::Program, names: &[&str]) -> Option<G::UniformLocation> {
    names.iter().find_map(|n| gpu.uniform_location(program, n))
}

/// A directive image living on the GPU.
pub struct ProgramTexture<G: Gpu> {
    pub name: String,
    pub path: PathBuf,
    pub texture: G::Texture,
    pub unit: u32,
    pub location: Option<G::UniformLocation>,
}

/// A linked program with everything resolved against it.
///
/// Owned by the monitor while active; dropped only through `destroy`.
pub struct ShaderProgram<G: Gpu> {
    pub handle: G::Program,
    pub attribs: AttribLocations,
    pub uniforms: UniformLocations<G::UniformLocation>,
    pub textures: Vec<ProgramTexture<G>>,
    pub description: String,
}

impl<G: Gpu> std::fmt::Debug for ShaderProgram<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("handle", &self.handle)
            .field("attribs", &self.attribs)
            .field("textures", &self.textures.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field("description", &self.description)
            .finish()
    }
}

impl<G: Gpu> ShaderProgram<G> {
    /// Point every sampler at its fixed unit. The program must be in use.
    pub fn assign_sampler_units(&self, gpu: &mut G) {
        if let Some(loc) = &self.uniforms.audio_left {
            gpu.set_uniform_i32(loc, AUDIO_LEFT_UNIT as i32);
        }
        if let Some(loc) = &self.uniforms.audio_right {
            gpu.set_uniform_i32(loc, AUDIO_RIGHT_UNIT as i32);
        }
        for t in &self.textures {
            if let Some(loc) = &t.location {
                gpu.set_uniform_i32(loc, t.unit as i32);
            }
        }
    }

    /// Release the program and its directive textures.
    pub fn destroy(self, gpu: &mut G) {
        for t in self.textures {
            gpu.delete_texture(t.texture);
        }
        gpu.delete_program(self.handle);
    }
}
