//! Built-in shader pair shown whenever nothing else compiles.

use crate::compiler::ShaderSource;

pub const DEFAULT_VERTEX: &str = include_str!("../shaders/default.vert");
pub const DEFAULT_FRAGMENT: &str = include_str!("../shaders/default.frag");

pub fn default_source() -> ShaderSource {
    ShaderSource::new(DEFAULT_VERTEX, DEFAULT_FRAGMENT)
}
