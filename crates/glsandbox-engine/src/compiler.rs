//! Turning a vertex/fragment source pair into a [`ShaderProgram`].
//!
//! Split into a CPU half ([`prepare`]: directives, file checks, image decoding) and a GPU half
//! ([`build`]: compile, link, resolve, upload). The CPU half never needs the GPU lock.

use std::path::Path;

use crate::diagnostic::{extract_error_line, with_preamble, Stage};
use crate::directive::{prepare_fragment, ResolvedTexture};
use crate::error::ShaderError;
use crate::gpu::{DecodedImage, Gpu};
use crate::program::{resolve_attribs, ProgramTexture, ShaderProgram, UniformLocations, FIRST_IMAGE_UNIT};

/// The text of one vertex/fragment pair as the user wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSource {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

/// A source pair ready for the driver: preamble injected, directives rewritten, images decoded.
#[derive(Debug, Clone)]
pub struct PreparedSources {
    pub vertex: String,
    pub fragment: String,
    pub images: Vec<(ResolvedTexture, DecodedImage)>,
}

pub fn prepare(source: &ShaderSource, model_dir: Option<&Path>) -> Result<PreparedSources, ShaderError> {
    let fragment = prepare_fragment(&source.fragment, model_dir)?;
    let images = fragment
        .textures
        .into_iter()
        .map(|t| decode_image(&t).map(|img| (t, img)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PreparedSources {
        vertex: with_preamble(&source.vertex),
        fragment: with_preamble(&fragment.source),
        images,
    })
}

/// Decode to RGBA8, flipped so row 0 is the bottom of the image.
pub fn decode_image(texture: &ResolvedTexture) -> Result<DecodedImage, ShaderError> {
    let img = image::open(&texture.path).map_err(|e| ShaderError::UnreadableTexture {
        path: texture.path.clone(),
        line: texture.line,
        reason: e.to_string(),
    })?;
    let rgba = img.flipv().to_rgba8();
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// Compile, link and resolve a prepared pair. Nothing is left allocated on failure.
pub fn build<G: Gpu>(gpu: &mut G, prepared: PreparedSources, description: &str) -> Result<ShaderProgram<G>, ShaderError> {
    let vertex = gpu
        .compile_shader(Stage::Vertex, &prepared.vertex)
        .map_err(|log| ShaderError::VertexCompileError {
            line: extract_error_line(&log),
            log,
        })?;

    let fragment = match gpu.compile_shader(Stage::Fragment, &prepared.fragment) {
        Ok(s) => s,
        Err(log) => {
            gpu.delete_shader(vertex);
            return Err(ShaderError::FragmentCompileError {
                line: extract_error_line(&log),
                log,
            });
        }
    };

    let linked = gpu.link_program(vertex, fragment);
    gpu.delete_shader(vertex);
    gpu.delete_shader(fragment);
    let handle = linked.map_err(|log| ShaderError::LinkError { log })?;

    let attribs = resolve_attribs(gpu, handle);
    let uniforms = UniformLocations::resolve(gpu, handle);

    let mut textures: Vec<ProgramTexture<G>> = Vec::with_capacity(prepared.images.len());
    for (i, (resolved, image)) in prepared.images.iter().enumerate() {
        match gpu.create_image_texture(image) {
            Ok(texture) => textures.push(ProgramTexture {
                name: resolved.name.clone(),
                path: resolved.path.clone(),
                texture,
                unit: FIRST_IMAGE_UNIT + i as u32,
                location: gpu.uniform_location(handle, &resolved.name),
            }),
            Err(reason) => {
                for t in textures {
                    gpu.delete_texture(t.texture);
                }
                gpu.delete_program(handle);
                return Err(ShaderError::UnreadableTexture {
                    path: resolved.path.clone(),
                    line: resolved.line,
                    reason,
                });
            }
        }
    }

    Ok(ShaderProgram {
        handle,
        attribs,
        uniforms,
        textures,
        description: description.to_string(),
    })
}

/// [`prepare`] followed by [`build`].
pub fn compile<G: Gpu>(
    gpu: &mut G,
    source: &ShaderSource,
    model_dir: Option<&Path>,
    description: &str,
) -> Result<ShaderProgram<G>, ShaderError> {
    let prepared = prepare(source, model_dir)?;
    build(gpu, prepared, description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeGpu;

    const VERT: &str = "#version 330 core\n\
                        in vec3 position;\n\
                        in vec2 texCoord;\n\
                        uniform mat4 MVP;\n\
                        out vec2 uv;\n\
                        void main() { uv = texCoord; gl_Position = MVP * vec4(position, 1.0); }\n";

    const FRAG: &str = "#version 330 core\n\
                        in vec2 uv;\n\
                        uniform float time;\n\
                        uniform sampler1D audioLeft;\n\
                        out vec4 color;\n\
                        void main() { color = vec4(uv, 0.0, 1.0); }\n";

    fn write_png(dir: &Path, name: &str) {
        image::RgbaImage::from_pixel(2, 3, image::Rgba([255, 0, 0, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn valid_pair_resolves_used_names() {
        let mut gpu = FakeGpu::default();
        let program = compile(&mut gpu, &ShaderSource::new(VERT, FRAG), None, "test").unwrap();
        assert!(program.attribs.position.is_some());
        assert!(program.attribs.tex_coord.is_some());
        assert!(program.attribs.normal.is_none());
        assert!(program.uniforms.mvp.is_some());
        assert!(program.uniforms.time.is_some());
        assert!(program.uniforms.audio_left.is_some());
        assert!(program.uniforms.mouse.is_none());
        assert_eq!(gpu.live_shaders(), 0);
        assert!(gpu.is_live_program(program.handle));
    }

    #[test]
    fn uniform_aliases_are_honoured() {
        let frag = "#version 330 core\nuniform float iTime;\nuniform float ration;\nout vec4 c;\nvoid main() { c = vec4(iTime * ration); }\n";
        let mut gpu = FakeGpu::default();
        let program = compile(&mut gpu, &ShaderSource::new(VERT, frag), None, "alias").unwrap();
        assert_eq!(gpu.location_name(program.uniforms.time.as_ref().unwrap()), "iTime");
        assert_eq!(gpu.location_name(program.uniforms.aspect.as_ref().unwrap()), "ration");
    }

    #[test]
    fn fragment_error_line_is_relative_to_user_source() {
        // Error on user line 4.
        let frag = "#version 330 core\nout vec4 c;\nvoid main() {\n  SYNTAX_ERROR\n}\n";
        let mut gpu = FakeGpu::default();
        let err = compile(&mut gpu, &ShaderSource::new(VERT, frag), None, "bad").unwrap_err();
        match err {
            ShaderError::FragmentCompileError { line, .. } => assert_eq!(line, Some(4)),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(gpu.live_shaders(), 0);
        assert_eq!(gpu.live_programs(), 0);
    }

    #[test]
    fn vertex_failure_skips_fragment_stage() {
        let vert = "#version 330 core\nSYNTAX_ERROR\n";
        let frag = "#version 330 core\nSYNTAX_ERROR\n";
        let mut gpu = FakeGpu::default();
        let err = compile(&mut gpu, &ShaderSource::new(vert, frag), None, "bad").unwrap_err();
        assert!(matches!(err, ShaderError::VertexCompileError { line: Some(2), .. }));
        assert_eq!(gpu.compiled_stages(), vec![Stage::Vertex]);
    }

    #[test]
    fn link_failure_has_no_stage() {
        let frag = "#version 330 core\n// LINK_ERROR\nout vec4 c;\nvoid main() {}\n";
        let mut gpu = FakeGpu::default();
        let err = compile(&mut gpu, &ShaderSource::new(VERT, frag), None, "bad").unwrap_err();
        assert!(matches!(err, ShaderError::LinkError { .. }));
        assert_eq!(err.diagnostic().stage, None);
        assert_eq!(gpu.live_shaders(), 0);
    }

    #[test]
    fn missing_directive_image_fails_before_any_gpu_work() {
        let dir = tempfile::tempdir().unwrap();
        let frag = "#version 330 core\nout vec4 c;\n#texture noise noise.png\nvoid main() {}\n";
        let mut gpu = FakeGpu::default();
        let err = compile(&mut gpu, &ShaderSource::new(VERT, frag), Some(dir.path()), "x").unwrap_err();
        assert_eq!(
            err,
            ShaderError::MissingTextureFile {
                path: "noise.png".into(),
                line: 2
            }
        );
        assert!(gpu.compiled_stages().is_empty());
    }

    #[test]
    fn undecodable_image_is_reported_with_its_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("junk.png"), b"not a png").unwrap();
        let frag = "#version 330 core\n#texture junk junk.png\nvoid main() {}\n";
        let err = prepare(&ShaderSource::new(VERT, frag), Some(dir.path())).unwrap_err();
        assert!(matches!(err, ShaderError::UnreadableTexture { line: 1, .. }));
    }

    #[test]
    fn directive_textures_get_units_from_two_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png");
        write_png(dir.path(), "b.png");
        let frag = "#version 330 core\n#texture first a.png\n#texture second b.png\nout vec4 c;\nvoid main() { c = texture(first, vec2(0)) + texture(second, vec2(0)); }\n";
        let mut gpu = FakeGpu::default();
        let program = compile(&mut gpu, &ShaderSource::new(VERT, frag), Some(dir.path()), "tex").unwrap();

        let units: Vec<(String, u32)> = program.textures.iter().map(|t| (t.name.clone(), t.unit)).collect();
        assert_eq!(units, vec![("first".to_string(), 2), ("second".to_string(), 3)]);
        assert!(program.textures.iter().all(|t| t.location.is_some()));
        assert_eq!(gpu.live_textures(), 2);
        assert_eq!(gpu.last_image_size(), Some((2, 3)));
    }

    #[test]
    fn identical_source_resolves_identical_locations() {
        let mut gpu = FakeGpu::default();
        let src = ShaderSource::new(VERT, FRAG);
        let a = compile(&mut gpu, &src, None, "a").unwrap();
        let b = compile(&mut gpu, &src, None, "b").unwrap();
        assert_ne!(a.handle, b.handle);
        assert_eq!(a.attribs, b.attribs);
        assert_eq!(
            a.uniforms.mvp.as_ref().map(|l| l.slot),
            b.uniforms.mvp.as_ref().map(|l| l.slot)
        );
        assert_eq!(
            a.uniforms.time.as_ref().map(|l| l.slot),
            b.uniforms.time.as_ref().map(|l| l.slot)
        );
    }
}
