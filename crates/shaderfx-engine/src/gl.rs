//! GL device seam.
//!
//! The plugin never talks to a GL binding directly; it drives a [`GlDevice`]. The production
//! implementation is [`crate::glow_device::GlowDevice`]. Every call assumes the host has made
//! the right GL context current on the calling thread.

use std::num::NonZeroU32;

use crate::error::EngineError;
use crate::geometry::QuadVertex;

/// Linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub NonZeroU32);

/// 2D texture owned by the host. GL name `0` (no texture) is not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub NonZeroU32);

impl TextureHandle {
    pub fn new(gl_name: u32) -> Option<Self> {
        NonZeroU32::new(gl_name).map(Self)
    }

    pub fn gl_name(self) -> u32 {
        self.0.get()
    }
}

/// Uploaded vertex data, ready to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(pub NonZeroU32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub multitexture: bool,
    pub shader_objects: bool,
    pub vertex_arrays: bool,
}

impl Capabilities {
    /// First missing feature, if any.
    pub fn check(&self) -> Result<(), EngineError> {
        if !self.multitexture {
            return Err(EngineError::MissingCapability { what: "multitexture" });
        }
        if !self.shader_objects {
            return Err(EngineError::MissingCapability { what: "shader objects" });
        }
        if !self.vertex_arrays {
            return Err(EngineError::MissingCapability { what: "vertex arrays" });
        }
        Ok(())
    }
}

pub trait GlDevice {
    fn capabilities(&self) -> Capabilities;

    /// Compile both stages and link. Compile/link diagnostics come back in the error.
    fn compile_program(&mut self, vert_src: &str, frag_src: &str) -> Result<ProgramHandle, EngineError>;
    fn delete_program(&mut self, program: ProgramHandle);
    fn use_program(&mut self, program: Option<ProgramHandle>);

    /// `None` when the program has no active uniform by that name.
    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<u32>;
    fn uniform_1f(&mut self, location: u32, v: f32);
    fn uniform_3f(&mut self, location: u32, v: [f32; 3]);
    fn uniform_1i(&mut self, location: u32, v: i32);

    /// Select texture unit `unit` (0-based, i.e. `GL_TEXTURE0 + unit`).
    fn active_texture(&mut self, unit: u32);
    fn bind_texture_2d(&mut self, texture: Option<TextureHandle>);
    /// Force `GL_REPEAT` on both axes of the currently bound 2D texture.
    fn set_texture_wrap_repeat(&mut self);

    fn create_geometry(&mut self, vertices: &[QuadVertex]) -> Result<GeometryHandle, EngineError>;
    /// Exactly one draw submission.
    fn draw_geometry(&mut self, geometry: GeometryHandle);
    fn delete_geometry(&mut self, geometry: GeometryHandle);
}
