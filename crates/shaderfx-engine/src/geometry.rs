//! Full-screen quad.

use crate::error::EngineError;
use crate::gl::{GeometryHandle, GlDevice};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

/// Covers NDC `[-1,1]²`, texture space `[0,1]²`.
///
/// Corner order is bottom-left, top-left, top-right, bottom-right. Changing it changes which
/// texture edge lands on which screen edge.
pub const FULLSCREEN_QUAD: [QuadVertex; 4] = [
    QuadVertex { position: [-1.0, -1.0], tex_coord: [0.0, 0.0] },
    QuadVertex { position: [-1.0, 1.0], tex_coord: [0.0, 1.0] },
    QuadVertex { position: [1.0, 1.0], tex_coord: [1.0, 1.0] },
    QuadVertex { position: [1.0, -1.0], tex_coord: [1.0, 0.0] },
];

/// Owns the uploaded quad for one initialized plugin instance.
#[derive(Debug)]
pub struct QuadEmitter {
    geometry: GeometryHandle,
}

impl QuadEmitter {
    pub fn create<D: GlDevice + ?Sized>(gl: &mut D) -> Result<Self, EngineError> {
        let geometry = gl.create_geometry(&FULLSCREEN_QUAD)?;
        Ok(Self { geometry })
    }

    /// Draw with whatever program and textures are bound.
    pub fn emit<D: GlDevice + ?Sized>(&self, gl: &mut D) {
        gl.draw_geometry(self.geometry);
    }

    pub fn release<D: GlDevice + ?Sized>(self, gl: &mut D) {
        gl.delete_geometry(self.geometry);
    }
}
