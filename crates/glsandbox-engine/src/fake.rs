//! Recording stand-in for a GL context.
//!
//! Declarations are read straight off the source text (`uniform ... name;` anywhere, `in ...
//! name;` in the vertex stage) and get slots in declaration order, so identical sources yield
//! identical locations. A line containing `SYNTAX_ERROR` fails compilation with a mesa-style
//! log; `LINK_ERROR` anywhere fails linking. Any call that touches a deleted object is
//! recorded in `violations`.

use std::collections::{HashMap, HashSet};

use glam::{Mat4, Vec2};

use crate::audio::SampleFormat;
use crate::diagnostic::Stage;
use crate::gpu::{AttribLocations, DecodedImage, Gpu, TextureKind};
use crate::mesh::Mesh;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeLocation {
    pub program: u32,
    pub slot: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Mat4(Mat4),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: Option<u32>,
    pub indexed: bool,
    pub count: usize,
    pub attribs: AttribLocations,
    pub bound: Vec<(u32, TextureKind, u32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioUpload {
    pub texture: u32,
    pub format: SampleFormat,
    pub samples: usize,
    pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeMesh {
    pub id: u32,
    pub count: usize,
    pub indexed: bool,
}

#[derive(Debug, Default)]
struct LinkedProgram {
    attribs: Vec<String>,
    uniforms: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FakeGpu {
    next_id: u32,
    shaders: HashMap<u32, (Stage, String)>,
    programs: HashMap<u32, LinkedProgram>,
    textures: HashSet<u32>,
    meshes: HashSet<u32>,
    current: Option<u32>,
    bound: HashMap<u32, (TextureKind, u32)>,
    stages: Vec<Stage>,
    last_image: Option<(u32, u32)>,
    pub uniforms: HashMap<(u32, String), UniformValue>,
    pub draws: Vec<DrawRecord>,
    pub audio_uploads: Vec<AudioUpload>,
    pub violations: Vec<String>,
    pub deleted_programs: Vec<u32>,
    pub clears: usize,
    pub viewport: Option<(u32, u32)>,
}

impl FakeGpu {
    fn fresh_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_live_program(&self, program: u32) -> bool {
        self.programs.contains_key(&program)
    }

    pub fn current_program(&self) -> Option<u32> {
        self.current
    }

    pub fn compiled_stages(&self) -> Vec<Stage> {
        self.stages.clone()
    }

    pub fn last_image_size(&self) -> Option<(u32, u32)> {
        self.last_image
    }

    pub fn location_name<'a>(&self, location: &'a FakeLocation) -> &'a str {
        &location.name
    }

    pub fn uniform(&self, program: u32, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(&(program, name.to_string()))
    }

    fn check_program(&mut self, op: &str, program: u32) {
        if !self.programs.contains_key(&program) {
            self.violations.push(format!("{op} on dead program {program}"));
        }
    }

    fn set_uniform(&mut self, location: &FakeLocation, value: UniformValue) {
        match self.current {
            Some(p) if p == location.program => {
                self.check_program("set_uniform", p);
                self.uniforms.insert((p, location.name.clone()), value);
            }
            other => self.violations.push(format!(
                "uniform {} of program {} set while {:?} is current",
                location.name, location.program, other
            )),
        }
    }
}

fn declared_name(line: &str, keyword: &str) -> Option<String> {
    let rest = line.trim().strip_prefix(keyword)?;
    let decl = rest.split(';').next()?;
    decl.split_whitespace().last().map(str::to_string)
}

impl Gpu for FakeGpu {
    type Program = u32;
    type Shader = u32;
    type Texture = u32;
    type UniformLocation = FakeLocation;
    type MeshBuffers = FakeMesh;

    fn compile_shader(&mut self, stage: Stage, source: &str) -> Result<u32, String> {
        self.stages.push(stage);
        if let Some(i) = source.lines().position(|l| l.contains("SYNTAX_ERROR")) {
            return Err(format!("0:{}(1): error: syntax error, unexpected IDENTIFIER", i + 1));
        }
        let id = self.fresh_id();
        self.shaders.insert(id, (stage, source.to_string()));
        Ok(id)
    }

    fn delete_shader(&mut self, shader: u32) {
        if self.shaders.remove(&shader).is_none() {
            self.violations.push(format!("delete of unknown shader {shader}"));
        }
    }

    fn link_program(&mut self, vertex: u32, fragment: u32) -> Result<u32, String> {
        let (vs, fs) = match (self.shaders.get(&vertex), self.shaders.get(&fragment)) {
            (Some((_, v)), Some((_, f))) => (v.clone(), f.clone()),
            _ => return Err("error: invalid shader object".to_string()),
        };
        if vs.contains("LINK_ERROR") || fs.contains("LINK_ERROR") {
            return Err("error: linking failed".to_string());
        }
        let mut linked = LinkedProgram::default();
        for line in vs.lines() {
            if let Some(n) = declared_name(line, "in ") {
                linked.attribs.push(n);
            }
        }
        for line in vs.lines().chain(fs.lines()) {
            if let Some(n) = declared_name(line, "uniform ") {
                if !linked.uniforms.contains(&n) {
                    linked.uniforms.push(n);
                }
            }
        }
        let id = self.fresh_id();
        self.programs.insert(id, linked);
        Ok(id)
    }

    fn delete_program(&mut self, program: u32) {
        if self.programs.remove(&program).is_none() {
            self.violations.push(format!("delete of unknown program {program}"));
        }
        if self.current == Some(program) {
            self.current = None;
        }
        self.deleted_programs.push(program);
    }

    fn use_program(&mut self, program: Option<u32>) {
        if let Some(p) = program {
            self.check_program("use_program", p);
        }
        self.current = program;
    }

    fn attrib_location(&mut self, program: u32, name: &str) -> Option<u32> {
        let linked = self.programs.get(&program)?;
        linked.attribs.iter().position(|a| a == name).map(|i| i as u32)
    }

    fn uniform_location(&mut self, program: u32, name: &str) -> Option<FakeLocation> {
        let linked = self.programs.get(&program)?;
        let slot = linked.uniforms.iter().position(|u| u == name)?;
        Some(FakeLocation {
            program,
            slot: slot as i32,
            name: name.to_string(),
        })
    }

    fn set_uniform_i32(&mut self, location: &FakeLocation, value: i32) {
        self.set_uniform(location, UniformValue::Int(value));
    }

    fn set_uniform_f32(&mut self, location: &FakeLocation, value: f32) {
        self.set_uniform(location, UniformValue::Float(value));
    }

    fn set_uniform_vec2(&mut self, location: &FakeLocation, value: Vec2) {
        self.set_uniform(location, UniformValue::Vec2(value));
    }

    fn set_uniform_mat4(&mut self, location: &FakeLocation, value: &Mat4) {
        self.set_uniform(location, UniformValue::Mat4(*value));
    }

    fn create_image_texture(&mut self, image: &DecodedImage) -> Result<u32, String> {
        let id = self.fresh_id();
        self.textures.insert(id);
        self.last_image = Some((image.width, image.height));
        Ok(id)
    }

    fn create_audio_texture(&mut self) -> Result<u32, String> {
        let id = self.fresh_id();
        self.textures.insert(id);
        Ok(id)
    }

    fn upload_audio_texture(&mut self, texture: u32, format: SampleFormat, samples: usize, bytes: &[u8]) {
        if !self.textures.contains(&texture) {
            self.violations.push(format!("audio upload into dead texture {texture}"));
        }
        self.audio_uploads.push(AudioUpload {
            texture,
            format,
            samples,
            bytes: bytes.len(),
        });
    }

    fn delete_texture(&mut self, texture: u32) {
        if !self.textures.remove(&texture) {
            self.violations.push(format!("delete of unknown texture {texture}"));
        }
        self.bound.retain(|_, (_, t)| *t != texture);
    }

    fn bind_texture(&mut self, unit: u32, kind: TextureKind, texture: Option<u32>) {
        match texture {
            Some(t) => {
                if !self.textures.contains(&t) {
                    self.violations.push(format!("bind of dead texture {t}"));
                }
                self.bound.insert(unit, (kind, t));
            }
            None => {
                self.bound.remove(&unit);
            }
        }
    }

    fn upload_mesh(&mut self, mesh: &Mesh) -> Result<FakeMesh, String> {
        let id = self.fresh_id();
        self.meshes.insert(id);
        Ok(FakeMesh {
            id,
            count: mesh.draw_count(),
            indexed: mesh.is_indexed(),
        })
    }

    fn delete_mesh(&mut self, buffers: FakeMesh) {
        if !self.meshes.remove(&buffers.id) {
            self.violations.push(format!("delete of unknown mesh {}", buffers.id));
        }
    }

    fn draw_mesh(&mut self, buffers: &FakeMesh, attribs: &AttribLocations) {
        if !self.meshes.contains(&buffers.id) {
            self.violations.push(format!("draw of dead mesh {}", buffers.id));
        }
        if let Some(p) = self.current {
            self.check_program("draw", p);
        }
        let mut bound: Vec<(u32, TextureKind, u32)> =
            self.bound.iter().map(|(u, (k, t))| (*u, *k, *t)).collect();
        bound.sort_by_key(|b| b.0);
        self.draws.push(DrawRecord {
            program: self.current,
            indexed: buffers.indexed,
            count: buffers.count,
            attribs: *attribs,
            bound,
        });
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.viewport = Some((width, height));
    }

    fn clear(&mut self) {
        self.clears += 1;
    }
}
