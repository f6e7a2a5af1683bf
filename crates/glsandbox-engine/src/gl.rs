//! `Gpu` on top of a `glow` OpenGL 3.3 core context.

use glam::{Mat4, Vec2};
use glow::HasContext;

use crate::audio::SampleFormat;
use crate::diagnostic::Stage;
use crate::events::{EventSink, LogLevel};
use crate::gpu::{AttribLocations, DecodedImage, Gpu, TextureKind};
use crate::mesh::Mesh;

pub struct GlowGpu {
    gl: glow::Context,
}

#[derive(Debug)]
pub struct GlMesh {
    vao: glow::NativeVertexArray,
    positions: glow::NativeBuffer,
    uvs: glow::NativeBuffer,
    normals: glow::NativeBuffer,
    indices: Option<glow::NativeBuffer>,
    count: i32,
}

impl GlowGpu {
    /// Wrap a current context and set the fixed pipeline state.
    pub fn new(gl: glow::Context) -> Self {
        unsafe {
            gl.enable(glow::DEPTH_TEST);
            gl.depth_func(glow::LESS);
        }
        Self { gl }
    }

    /// Forward KHR_debug messages into the event stream. Returns `false` when unsupported.
    pub fn enable_debug_output(&mut self, events: EventSink) -> bool {
        if !self.gl.supports_debug() {
            return false;
        }
        unsafe {
            self.gl.enable(glow::DEBUG_OUTPUT);
            self.gl.debug_message_callback(move |source, kind, id, severity, message| {
                let level = match severity {
                    glow::DEBUG_SEVERITY_HIGH => LogLevel::Error,
                    glow::DEBUG_SEVERITY_MEDIUM => LogLevel::Warn,
                    glow::DEBUG_SEVERITY_LOW => LogLevel::Info,
                    _ => LogLevel::Debug,
                };
                events.log(level, "GL", format!("[src=0x{source:x} type=0x{kind:x} id={id}] {message}"));
            });
        }
        true
    }
}

fn sample_type(format: SampleFormat) -> u32 {
    match format {
        SampleFormat::U8 => glow::UNSIGNED_BYTE,
        SampleFormat::I8 => glow::BYTE,
        SampleFormat::U16 => glow::UNSIGNED_SHORT,
        SampleFormat::I16 => glow::SHORT,
        SampleFormat::U32 => glow::UNSIGNED_INT,
        SampleFormat::I32 => glow::INT,
        SampleFormat::F32 => glow::FLOAT,
    }
}

fn texture_target(kind: TextureKind) -> u32 {
    match kind {
        TextureKind::Audio => glow::TEXTURE_1D,
        TextureKind::Image => glow::TEXTURE_2D,
    }
}

impl Gpu for GlowGpu {
    type Program = glow::NativeProgram;
    type Shader = glow::NativeShader;
    type Texture = glow::NativeTexture;
    type UniformLocation = glow::NativeUniformLocation;
    type MeshBuffers = GlMesh;

    fn compile_shader(&mut self, stage: Stage, source: &str) -> Result<Self::Shader, String> {
        let kind = match stage {
            Stage::Vertex => glow::VERTEX_SHADER,
            Stage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe {
            let shader = self.gl.create_shader(kind)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if self.gl.get_shader_compile_status(shader) {
                Ok(shader)
            } else {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                Err(log)
            }
        }
    }

    fn delete_shader(&mut self, shader: Self::Shader) {
        unsafe { self.gl.delete_shader(shader) }
    }

    fn link_program(&mut self, vertex: Self::Shader, fragment: Self::Shader) -> Result<Self::Program, String> {
        unsafe {
            let program = self.gl.create_program()?;
            self.gl.attach_shader(program, vertex);
            self.gl.attach_shader(program, fragment);
            self.gl.link_program(program);
            self.gl.detach_shader(program, vertex);
            self.gl.detach_shader(program, fragment);
            if self.gl.get_program_link_status(program) {
                Ok(program)
            } else {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                Err(log)
            }
        }
    }

    fn delete_program(&mut self, program: Self::Program) {
        unsafe { self.gl.delete_program(program) }
    }

    fn use_program(&mut self, program: Option<Self::Program>) {
        unsafe { self.gl.use_program(program) }
    }

    fn attrib_location(&mut self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(program, name) }
    }

    fn uniform_location(&mut self, program: Self::Program, name: &str) -> Option<Self::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn set_uniform_i32(&mut self, location: &Self::UniformLocation, value: i32) {
        unsafe { self.gl.uniform_1_i32(Some(location), value) }
    }

    fn set_uniform_f32(&mut self, location: &Self::UniformLocation, value: f32) {
        unsafe { self.gl.uniform_1_f32(Some(location), value) }
    }

    fn set_uniform_vec2(&mut self, location: &Self::UniformLocation, value: Vec2) {
        unsafe { self.gl.uniform_2_f32(Some(location), value.x, value.y) }
    }

    fn set_uniform_mat4(&mut self, location: &Self::UniformLocation, value: &Mat4) {
        unsafe {
            self.gl
                .uniform_matrix_4_f32_slice(Some(location), false, &value.to_cols_array())
        }
    }

    fn create_image_texture(&mut self, image: &DecodedImage) -> Result<Self::Texture, String> {
        unsafe {
            let tex = self.gl.create_texture()?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(tex));
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                image.width as i32,
                image.height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(&image.rgba)),
            );
            self.gl.generate_mipmap(glow::TEXTURE_2D);
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR_MIPMAP_LINEAR as i32,
            );
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            Ok(tex)
        }
    }

    fn create_audio_texture(&mut self) -> Result<Self::Texture, String> {
        unsafe {
            let tex = self.gl.create_texture()?;
            self.gl.bind_texture(glow::TEXTURE_1D, Some(tex));
            self.gl
                .tex_parameter_i32(glow::TEXTURE_1D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_1D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_1D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            self.gl.bind_texture(glow::TEXTURE_1D, None);
            Ok(tex)
        }
    }

    fn upload_audio_texture(&mut self, texture: Self::Texture, format: SampleFormat, samples: usize, bytes: &[u8]) {
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_1D, Some(texture));
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_image_1d(
                glow::TEXTURE_1D,
                0,
                glow::R32F as i32,
                samples as i32,
                0,
                glow::RED,
                sample_type(format),
                glow::PixelUnpackData::Slice(Some(bytes)),
            );
            self.gl.bind_texture(glow::TEXTURE_1D, None);
        }
    }

    fn delete_texture(&mut self, texture: Self::Texture) {
        unsafe { self.gl.delete_texture(texture) }
    }

    fn bind_texture(&mut self, unit: u32, kind: TextureKind, texture: Option<Self::Texture>) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(texture_target(kind), texture);
        }
    }

    fn upload_mesh(&mut self, mesh: &Mesh) -> Result<Self::MeshBuffers, String> {
        unsafe {
            let vao = self.gl.create_vertex_array()?;
            self.gl.bind_vertex_array(Some(vao));

            let array = |data: &[f32]| -> Result<glow::NativeBuffer, String> {
                let buf = self.gl.create_buffer()?;
                self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buf));
                self.gl
                    .buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(data), glow::STATIC_DRAW);
                Ok(buf)
            };
            let positions = array(&mesh.positions)?;
            let uvs = array(&mesh.uvs)?;
            let normals = array(&mesh.normals)?;

            let indices = if mesh.is_indexed() {
                let buf = self.gl.create_buffer()?;
                self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(buf));
                self.gl.buffer_data_u8_slice(
                    glow::ELEMENT_ARRAY_BUFFER,
                    bytemuck::cast_slice(&mesh.indices),
                    glow::STATIC_DRAW,
                );
                Some(buf)
            } else {
                None
            };

            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);

            Ok(GlMesh {
                vao,
                positions,
                uvs,
                normals,
                indices,
                count: mesh.draw_count() as i32,
            })
        }
    }

    fn delete_mesh(&mut self, buffers: Self::MeshBuffers) {
        unsafe {
            self.gl.delete_vertex_array(buffers.vao);
            for buf in [Some(buffers.positions), Some(buffers.uvs), Some(buffers.normals), buffers.indices]
                .into_iter()
                .flatten()
            {
                self.gl.delete_buffer(buf);
            }
        }
    }

    fn draw_mesh(&mut self, buffers: &Self::MeshBuffers, attribs: &AttribLocations) {
        let streams = [
            (attribs.position, buffers.positions, 3),
            (attribs.tex_coord, buffers.uvs, 2),
            (attribs.normal, buffers.normals, 3),
        ];
        unsafe {
            self.gl.bind_vertex_array(Some(buffers.vao));
            for (loc, buf, size) in streams {
                if let Some(loc) = loc {
                    self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buf));
                    self.gl.enable_vertex_attrib_array(loc);
                    self.gl.vertex_attrib_pointer_f32(loc, size, glow::FLOAT, false, 0, 0);
                }
            }

            if buffers.indices.is_some() {
                self.gl
                    .draw_elements(glow::TRIANGLES, buffers.count, glow::UNSIGNED_INT, 0);
            } else {
                self.gl.draw_arrays(glow::TRIANGLES, 0, buffers.count);
            }

            for (loc, _, _) in streams {
                if let Some(loc) = loc {
                    self.gl.disable_vertex_attrib_array(loc);
                }
            }
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            self.gl.bind_vertex_array(None);
        }
    }

    fn viewport(&mut self, width: u32, height: u32) {
        unsafe { self.gl.viewport(0, 0, width as i32, height as i32) }
    }

    fn clear(&mut self) {
        unsafe {
            self.gl.clear_color(0.0, 0.0, 0.0, 1.0);
            self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }
}
