//! `GlDevice` on top of `glow`.
//!
//! Core profiles have no immediate mode, so geometry lives in a VAO + VBO pair:
//! attribute 0 = position (vec2), attribute 1 = texture coordinate (vec2), drawn as a
//! 4-vertex triangle fan.

use std::collections::HashMap;
use std::num::NonZeroU32;

use glow::HasContext;

use crate::error::{EngineError, ShaderStage};
use crate::geometry::QuadVertex;
use crate::gl::{Capabilities, GeometryHandle, GlDevice, ProgramHandle, TextureHandle};

pub const POSITION_ATTRIB: u32 = 0;
pub const TEX_COORD_ATTRIB: u32 = 1;

pub struct GlowDevice {
    gl: glow::Context,
    caps: Capabilities,
    /// VAO name -> (VBO, vertex count)
    buffers: HashMap<NonZeroU32, (glow::NativeBuffer, i32)>,
}

impl std::fmt::Debug for GlowDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowDevice")
            .field("caps", &self.caps)
            .field("geometries", &self.buffers.len())
            .finish()
    }
}

impl GlowDevice {
    /// # Safety
    /// `gl` must belong to a context that is current on this thread for every later call.
    pub unsafe fn new(gl: glow::Context) -> Self {
        let caps = detect_capabilities(&gl);
        Self {
            gl,
            caps,
            buffers: HashMap::new(),
        }
    }

    /// Raw context, for host-side work (viewport, clears, test textures).
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }
}

fn detect_capabilities(gl: &glow::Context) -> Capabilities {
    let v = gl.version();
    let ext = gl.supported_extensions();
    let has = |name: &str| ext.contains(name);

    // GLES 2 and desktop GL 2 both have multitexture + shader objects in core.
    let core_shaders = v.major >= 2;
    let core_vao = v.major >= 3;

    Capabilities {
        multitexture: core_shaders || (v.major == 1 && v.minor >= 3) || has("GL_ARB_multitexture"),
        shader_objects: core_shaders || has("GL_ARB_shader_objects"),
        vertex_arrays: core_vao
            || has("GL_ARB_vertex_array_object")
            || has("GL_OES_vertex_array_object")
            || has("GL_APPLE_vertex_array_object"),
    }
}

unsafe fn compile_stage(
    gl: &glow::Context,
    kind: u32,
    stage: ShaderStage,
    src: &str,
) -> Result<glow::NativeShader, EngineError> {
    let shader = gl
        .create_shader(kind)
        .map_err(|e| EngineError::GlCreate(format!("create {stage} shader: {e}")))?;
    gl.shader_source(shader, src);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(EngineError::ShaderCompile { stage, log });
    }
    Ok(shader)
}

impl GlDevice for GlowDevice {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn compile_program(&mut self, vert_src: &str, frag_src: &str) -> Result<ProgramHandle, EngineError> {
        let gl = &self.gl;
        unsafe {
            let vs = compile_stage(gl, glow::VERTEX_SHADER, ShaderStage::Vertex, vert_src)?;
            let fs = match compile_stage(gl, glow::FRAGMENT_SHADER, ShaderStage::Fragment, frag_src) {
                Ok(fs) => fs,
                Err(e) => {
                    gl.delete_shader(vs);
                    return Err(e);
                }
            };

            let program = match gl.create_program() {
                Ok(p) => p,
                Err(e) => {
                    gl.delete_shader(vs);
                    gl.delete_shader(fs);
                    return Err(EngineError::GlCreate(format!("create program: {e}")));
                }
            };
            gl.attach_shader(program, vs);
            gl.attach_shader(program, fs);
            // Shaders without explicit layout qualifiers still get the fixed slots.
            gl.bind_attrib_location(program, POSITION_ATTRIB, "a_position");
            gl.bind_attrib_location(program, TEX_COORD_ATTRIB, "a_tex_coord");
            gl.link_program(program);

            let linked = gl.get_program_link_status(program);
            let log = if linked { String::new() } else { gl.get_program_info_log(program) };

            gl.detach_shader(program, vs);
            gl.detach_shader(program, fs);
            gl.delete_shader(vs);
            gl.delete_shader(fs);

            if !linked {
                gl.delete_program(program);
                return Err(EngineError::ProgramLink { log });
            }

            Ok(ProgramHandle(program.0))
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        unsafe { self.gl.delete_program(glow::NativeProgram(program.0)) }
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        unsafe { self.gl.use_program(program.map(|p| glow::NativeProgram(p.0))) }
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<u32> {
        unsafe {
            self.gl
                .get_uniform_location(glow::NativeProgram(program.0), name)
                .map(|loc| loc.0)
        }
    }

    fn uniform_1f(&mut self, location: u32, v: f32) {
        unsafe {
            self.gl
                .uniform_1_f32(Some(&glow::NativeUniformLocation(location)), v)
        }
    }

    fn uniform_3f(&mut self, location: u32, v: [f32; 3]) {
        unsafe {
            self.gl
                .uniform_3_f32(Some(&glow::NativeUniformLocation(location)), v[0], v[1], v[2])
        }
    }

    fn uniform_1i(&mut self, location: u32, v: i32) {
        unsafe {
            self.gl
                .uniform_1_i32(Some(&glow::NativeUniformLocation(location)), v)
        }
    }

    fn active_texture(&mut self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn bind_texture_2d(&mut self, texture: Option<TextureHandle>) {
        unsafe {
            self.gl
                .bind_texture(glow::TEXTURE_2D, texture.map(|t| glow::NativeTexture(t.0)))
        }
    }

    fn set_texture_wrap_repeat(&mut self) {
        unsafe {
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
        }
    }

    fn create_geometry(&mut self, vertices: &[QuadVertex]) -> Result<GeometryHandle, EngineError> {
        let gl = &self.gl;
        let bytes: Vec<u8> = vertices
            .iter()
            .flat_map(|v| [v.position[0], v.position[1], v.tex_coord[0], v.tex_coord[1]])
            .flat_map(f32::to_ne_bytes)
            .collect();
        let stride = std::mem::size_of::<QuadVertex>() as i32;

        unsafe {
            let vao = gl
                .create_vertex_array()
                .map_err(|e| EngineError::GlCreate(format!("create_vertex_array failed: {e}")))?;
            let vbo = match gl.create_buffer() {
                Ok(b) => b,
                Err(e) => {
                    gl.delete_vertex_array(vao);
                    return Err(EngineError::GlCreate(format!("create_buffer failed: {e}")));
                }
            };

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, &bytes, glow::STATIC_DRAW);
            gl.enable_vertex_attrib_array(POSITION_ATTRIB);
            gl.vertex_attrib_pointer_f32(POSITION_ATTRIB, 2, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(TEX_COORD_ATTRIB);
            gl.vertex_attrib_pointer_f32(TEX_COORD_ATTRIB, 2, glow::FLOAT, false, stride, 8);
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            self.buffers.insert(vao.0, (vbo, vertices.len() as i32));
            Ok(GeometryHandle(vao.0))
        }
    }

    fn draw_geometry(&mut self, geometry: GeometryHandle) {
        let Some(&(_, count)) = self.buffers.get(&geometry.0) else {
            return;
        };
        unsafe {
            self.gl
                .bind_vertex_array(Some(glow::NativeVertexArray(geometry.0)));
            self.gl.draw_arrays(glow::TRIANGLE_FAN, 0, count);
            self.gl.bind_vertex_array(None);
        }
    }

    fn delete_geometry(&mut self, geometry: GeometryHandle) {
        unsafe {
            if let Some((vbo, _)) = self.buffers.remove(&geometry.0) {
                self.gl.delete_buffer(vbo);
            }
            self.gl
                .delete_vertex_array(glow::NativeVertexArray(geometry.0));
        }
    }
}
