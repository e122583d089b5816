//! Test doubles: a `GlDevice` that records calls, and a hand-driven clock.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

use crate::error::{EngineError, ShaderStage};
use crate::geometry::QuadVertex;
use crate::gl::{Capabilities, GeometryHandle, GlDevice, ProgramHandle, TextureHandle};
use crate::timing::Clock;
use crate::uniforms::declared_uniforms;

#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CompileProgram(ProgramHandle),
    DeleteProgram(ProgramHandle),
    UseProgram(Option<ProgramHandle>),
    UniformLocation(String),
    Uniform1f(u32, f32),
    Uniform3f(u32, [f32; 3]),
    Uniform1i(u32, i32),
    ActiveTexture(u32),
    BindTexture(Option<TextureHandle>),
    WrapRepeat,
    CreateGeometry(GeometryHandle),
    DrawGeometry(GeometryHandle),
    DeleteGeometry(GeometryHandle),
}

/// Fake GL. A "program" exposes exactly the uniforms its fragment source declares, located
/// at their declaration index.
#[derive(Debug)]
pub struct RecordingDevice {
    pub calls: Vec<GlCall>,
    pub caps: Capabilities,
    /// When set, the next compile fails with this log.
    pub fail_compile: Option<String>,
    pub fail_geometry: bool,
    programs: HashMap<ProgramHandle, Vec<String>>,
    geometries: HashSet<GeometryHandle>,
    last_program: Option<ProgramHandle>,
    next_id: u32,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            caps: Capabilities {
                multitexture: true,
                shader_objects: true,
                vertex_arrays: true,
            },
            fail_compile: None,
            fail_geometry: false,
            programs: HashMap::new(),
            geometries: HashSet::new(),
            last_program: None,
            next_id: 0,
        }
    }

    fn next_handle(&mut self) -> NonZeroU32 {
        self.next_id += 1;
        NonZeroU32::new(self.next_id).unwrap()
    }

    /// Location of `name` in the most recently compiled program.
    pub fn location_of(&self, name: &str) -> Option<u32> {
        let prog = self.last_program?;
        self.programs[&prog]
            .iter()
            .position(|n| n == name)
            .map(|i| i as u32)
    }

    /// Every float uploaded to the uniform called `name`, in order.
    pub fn floats_for(&self, name: &str) -> Vec<f32> {
        let Some(loc) = self.location_of(name) else {
            return Vec::new();
        };
        self.calls
            .iter()
            .filter_map(|c| match c {
                GlCall::Uniform1f(l, v) if *l == loc => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn vec3s_for(&self, name: &str) -> Vec<[f32; 3]> {
        let Some(loc) = self.location_of(name) else {
            return Vec::new();
        };
        self.calls
            .iter()
            .filter_map(|c| match c {
                GlCall::Uniform3f(l, v) if *l == loc => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, GlCall::DrawGeometry(_)))
            .count()
    }

    pub fn texture_binds(&self) -> Vec<Option<TextureHandle>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                GlCall::BindTexture(t) => Some(*t),
                _ => None,
            })
            .collect()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_geometries(&self) -> usize {
        self.geometries.len()
    }
}

impl GlDevice for RecordingDevice {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn compile_program(&mut self, _vert_src: &str, frag_src: &str) -> Result<ProgramHandle, EngineError> {
        if let Some(log) = self.fail_compile.take() {
            return Err(EngineError::ShaderCompile {
                stage: ShaderStage::Fragment,
                log,
            });
        }
        let handle = ProgramHandle(self.next_handle());
        self.programs.insert(handle, declared_uniforms(frag_src));
        self.last_program = Some(handle);
        self.calls.push(GlCall::CompileProgram(handle));
        Ok(handle)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.calls.push(GlCall::DeleteProgram(program));
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.calls.push(GlCall::UseProgram(program));
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.calls.push(GlCall::UniformLocation(name.to_string()));
        self.programs
            .get(&program)?
            .iter()
            .position(|n| n == name)
            .map(|i| i as u32)
    }

    fn uniform_1f(&mut self, location: u32, v: f32) {
        self.calls.push(GlCall::Uniform1f(location, v));
    }

    fn uniform_3f(&mut self, location: u32, v: [f32; 3]) {
        self.calls.push(GlCall::Uniform3f(location, v));
    }

    fn uniform_1i(&mut self, location: u32, v: i32) {
        self.calls.push(GlCall::Uniform1i(location, v));
    }

    fn active_texture(&mut self, unit: u32) {
        self.calls.push(GlCall::ActiveTexture(unit));
    }

    fn bind_texture_2d(&mut self, texture: Option<TextureHandle>) {
        self.calls.push(GlCall::BindTexture(texture));
    }

    fn set_texture_wrap_repeat(&mut self) {
        self.calls.push(GlCall::WrapRepeat);
    }

    fn create_geometry(&mut self, vertices: &[QuadVertex]) -> Result<GeometryHandle, EngineError> {
        assert_eq!(vertices.len(), 4);
        if self.fail_geometry {
            return Err(EngineError::GlCreate("create_vertex_array failed".into()));
        }
        let handle = GeometryHandle(self.next_handle());
        self.geometries.insert(handle);
        self.calls.push(GlCall::CreateGeometry(handle));
        Ok(handle)
    }

    fn draw_geometry(&mut self, geometry: GeometryHandle) {
        assert!(self.geometries.contains(&geometry), "draw of released geometry");
        self.calls.push(GlCall::DrawGeometry(geometry));
    }

    fn delete_geometry(&mut self, geometry: GeometryHandle) {
        self.geometries.remove(&geometry);
        self.calls.push(GlCall::DeleteGeometry(geometry));
    }
}

/// Clock whose reading is set by the test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f64) {
        *self.now.lock().unwrap() = seconds;
    }
}

impl Clock for ManualClock {
    fn seconds_since_start(&self) -> f64 {
        *self.now.lock().unwrap()
    }
}
