//! The slice of the graphics API the engine needs.
//!
//! Everything GPU-facing goes through [`Gpu`] so the compile/swap/render logic can be exercised
//! without a context. `crate::gl::GlowGpu` is the real implementation.

use glam::{Mat4, Vec2};

use crate::audio::SampleFormat;
use crate::diagnostic::Stage;
use crate::mesh::Mesh;

/// RGBA8 pixels decoded from a directive image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Vertex attribute slots of a linked program. `None` when the shader does not use it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttribLocations {
    pub position: Option<u32>,
    pub tex_coord: Option<u32>,
    pub normal: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    /// 1-D single-channel float texture fed with audio samples.
    Audio,
    /// 2-D RGBA image from a `#texture` directive.
    Image,
}

pub trait Gpu {
    type Program: Copy + Eq + std::fmt::Debug;
    type Shader: Copy + std::fmt::Debug;
    type Texture: Copy + Eq + std::fmt::Debug;
    type UniformLocation: Clone + std::fmt::Debug;
    type MeshBuffers: std::fmt::Debug;

    /// Compile one stage. `Err` carries the driver's info log.
    fn compile_shader(&mut self, stage: Stage, source: &str) -> Result<Self::Shader, String>;
    fn delete_shader(&mut self, shader: Self::Shader);

    /// Link two compiled stages. The stages may be deleted afterwards either way.
    fn link_program(&mut self, vertex: Self::Shader, fragment: Self::Shader) -> Result<Self::Program, String>;
    fn delete_program(&mut self, program: Self::Program);
    fn use_program(&mut self, program: Option<Self::Program>);

    fn attrib_location(&mut self, program: Self::Program, name: &str) -> Option<u32>;
    fn uniform_location(&mut self, program: Self::Program, name: &str) -> Option<Self::UniformLocation>;

    fn set_uniform_i32(&mut self, location: &Self::UniformLocation, value: i32);
    fn set_uniform_f32(&mut self, location: &Self::UniformLocation, value: f32);
    fn set_uniform_vec2(&mut self, location: &Self::UniformLocation, value: Vec2);
    fn set_uniform_mat4(&mut self, location: &Self::UniformLocation, value: &Mat4);

    /// Upload an image with linear-mipmap minification and linear magnification.
    fn create_image_texture(&mut self, image: &DecodedImage) -> Result<Self::Texture, String>;
    fn create_audio_texture(&mut self) -> Result<Self::Texture, String>;
    /// Replace an audio texture's contents with `samples` elements of `format` read from `bytes`.
    fn upload_audio_texture(&mut self, texture: Self::Texture, format: SampleFormat, samples: usize, bytes: &[u8]);
    fn delete_texture(&mut self, texture: Self::Texture);
    fn bind_texture(&mut self, unit: u32, kind: TextureKind, texture: Option<Self::Texture>);

    fn upload_mesh(&mut self, mesh: &Mesh) -> Result<Self::MeshBuffers, String>;
    fn delete_mesh(&mut self, buffers: Self::MeshBuffers);
    /// Draw indexed when the buffers carry indices, else as ordered triangles.
    fn draw_mesh(&mut self, buffers: &Self::MeshBuffers, attribs: &AttribLocations);

    fn viewport(&mut self, width: u32, height: u32);
    fn clear(&mut self);
}
