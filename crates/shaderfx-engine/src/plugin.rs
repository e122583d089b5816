//! Shader plugin state machine.
//!
//! `Uninitialized --initialize--> Ready --deinitialize--> Uninitialized`
//!
//! Only `Ready` accepts frames. Uniform locations are meaningful only while `Ready`; any failure
//! during initialize leaves the instance `Uninitialized` with every location reset.
//!
//! Per frame (all strictly sequential on the GL thread):
//! validate inputs → bind program → bind inputs (wrap forced to repeat) → upload params →
//! tick time + upload → upload resolution → draw quad → unbind inputs → unbind program.
//! A frame that fails validation touches no GL state at all.

use std::sync::Arc;

use crate::descriptor::{PluginInfo, PluginKind, ShaderSources};
use crate::error::EngineError;
use crate::geometry::QuadEmitter;
use crate::gl::{GlDevice, ProgramHandle, TextureHandle};
use crate::param::ParamBank;
use crate::timing::{Clock, TimeMode, TimingSource};
use crate::uniforms::{self, UniformBindings};
use crate::{logi, loge};

/// Host output area. Only width/height feed `iResolution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn sized(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// One host-supplied input texture. `handle == 0` is the null texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputTexture {
    pub width: u32,
    pub height: u32,
    pub handle: u32,
}

#[derive(Debug)]
struct GpuResources {
    program: ProgramHandle,
    quad: QuadEmitter,
}

#[derive(Debug)]
enum PluginState {
    Uninitialized,
    Ready(GpuResources),
}

#[derive(Debug)]
pub struct ShaderPlugin {
    name: String,
    kind: PluginKind,
    params: Arc<ParamBank>,
    shaders: ShaderSources,
    bindings: UniformBindings,
    timing: TimingSource,
    resolution: [f32; 3],
    state: PluginState,
    /// Per-frame scratch, sized to the input count once.
    frame_textures: Vec<TextureHandle>,
}

impl ShaderPlugin {
    pub fn new(info: &PluginInfo) -> Result<Self, EngineError> {
        Self::with_timing(info, TimingSource::new())
    }

    pub fn with_clock(info: &PluginInfo, clock: Box<dyn Clock>) -> Result<Self, EngineError> {
        Self::with_timing(info, TimingSource::with_clock(clock))
    }

    fn with_timing(info: &PluginInfo, timing: TimingSource) -> Result<Self, EngineError> {
        let params = ParamBank::from_descriptors(&info.params)?;
        let inputs = info.input_count();
        Ok(Self {
            name: info.name.clone(),
            kind: info.kind,
            bindings: UniformBindings::unresolved(params.len(), inputs),
            params: Arc::new(params),
            shaders: info.shaders.clone(),
            timing,
            resolution: [0.0; 3],
            state: PluginState::Uninitialized,
            frame_textures: Vec::with_capacity(inputs),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    pub fn input_count(&self) -> usize {
        self.kind.input_count()
    }

    /// Shared parameter list; clone the `Arc` to drive parameters from another thread.
    pub fn params(&self) -> &Arc<ParamBank> {
        &self.params
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, PluginState::Ready(_))
    }

    pub fn resolution(&self) -> [f32; 3] {
        self.resolution
    }

    pub fn elapsed_time(&self) -> f64 {
        self.timing.elapsed()
    }

    pub fn time_mode(&self) -> TimeMode {
        self.timing.mode()
    }

    pub fn bindings(&self) -> &UniformBindings {
        &self.bindings
    }

    pub fn shaders(&self) -> &ShaderSources {
        &self.shaders
    }

    /// Replace the shader text used by the next `initialize`. A running instance keeps its
    /// current program until re-initialized.
    pub fn set_shader_sources(&mut self, shaders: ShaderSources) {
        self.shaders = shaders;
    }

    pub fn initialize<D: GlDevice + ?Sized>(&mut self, gl: &mut D, viewport: Viewport) -> Result<(), EngineError> {
        if self.is_ready() {
            logi!("INIT", "{}: re-initialize, releasing previous GL resources", self.name);
            self.deinitialize(gl);
        }

        if let Err(e) = gl.capabilities().check() {
            loge!("INIT", "{}: {e}", self.name);
            return Err(e);
        }

        let program = match gl.compile_program(&self.shaders.vertex, &self.shaders.fragment) {
            Ok(p) => p,
            Err(e) => {
                loge!("SHADER", "{}: {e}", self.name);
                return Err(e);
            }
        };

        gl.use_program(Some(program));
        self.bindings
            .resolve_all(gl, program, self.params.iter().map(|p| p.name()));
        self.resolution = [viewport.width as f32, viewport.height as f32, 0.0];
        gl.use_program(None);

        let quad = match QuadEmitter::create(gl) {
            Ok(q) => q,
            Err(e) => {
                loge!("INIT", "{}: {e}", self.name);
                gl.delete_program(program);
                self.bindings.reset();
                return Err(e);
            }
        };

        self.state = PluginState::Ready(GpuResources { program, quad });
        logi!(
            "INIT",
            "{} ready ({}x{}, params={}, inputs={})",
            self.name,
            viewport.width,
            viewport.height,
            self.params.len(),
            self.input_count()
        );
        Ok(())
    }

    /// Render one frame. `inputs[i]` feeds `inputTexture<i>`; extra inputs are ignored.
    pub fn process_frame<D: GlDevice + ?Sized>(
        &mut self,
        gl: &mut D,
        inputs: &[Option<InputTexture>],
    ) -> Result<(), EngineError> {
        self.process_frame_at(gl, inputs, None)
    }

    /// `process_frame` with an explicit host time. `Some(t)` switches the instance to
    /// host-driven time (for good) once the inputs have been accepted.
    pub fn process_frame_at<D: GlDevice + ?Sized>(
        &mut self,
        gl: &mut D,
        inputs: &[Option<InputTexture>],
        time: Option<f64>,
    ) -> Result<(), EngineError> {
        let PluginState::Ready(res) = &self.state else {
            return Err(EngineError::NotReady);
        };
        collect_inputs(inputs, self.kind.input_count(), &mut self.frame_textures)?;
        if let Some(t) = time {
            self.timing.set_external(t);
        }

        gl.use_program(Some(res.program));

        for (unit, tex) in self.frame_textures.iter().enumerate() {
            gl.active_texture(unit as u32);
            gl.bind_texture_2d(Some(*tex));
            gl.set_texture_wrap_repeat();
        }

        for (p, loc) in self.params.iter().zip(&self.bindings.params) {
            uniforms::upload_f32(gl, *loc, p.scaled());
        }

        let t = self.timing.advance();
        uniforms::upload_f32(gl, self.bindings.time, t as f32);
        uniforms::upload_vec3(gl, self.bindings.resolution, self.resolution);

        res.quad.emit(gl);

        for unit in 0..self.frame_textures.len() {
            gl.active_texture(unit as u32);
            gl.bind_texture_2d(None);
        }
        gl.use_program(None);

        Ok(())
    }

    /// Release GL resources. Safe to call in any state, any number of times.
    pub fn deinitialize<D: GlDevice + ?Sized>(&mut self, gl: &mut D) {
        if let PluginState::Ready(res) = std::mem::replace(&mut self.state, PluginState::Uninitialized) {
            res.quad.release(gl);
            gl.delete_program(res.program);
            logi!("INIT", "{} released", self.name);
        }
        self.bindings.reset();
    }

    /// Host output size changed; takes effect on the next frame.
    pub fn resize(&mut self, viewport: Viewport) {
        self.resolution = [viewport.width as f32, viewport.height as f32, 0.0];
    }

    /// Normalized value of parameter `index`.
    pub fn get_parameter(&self, index: usize) -> Result<f32, EngineError> {
        Ok(self.params.checked(index)?.normalized())
    }

    /// Store a normalized value verbatim (no clamping).
    pub fn set_parameter(&self, index: usize, value: f32) -> Result<(), EngineError> {
        self.params.checked(index)?.set_normalized(value);
        Ok(())
    }

    /// Host supplies time from now on; self-driven timing never resumes.
    pub fn set_external_time(&mut self, seconds: f64) {
        self.timing.set_external(seconds);
    }
}

fn collect_inputs(
    inputs: &[Option<InputTexture>],
    need: usize,
    out: &mut Vec<TextureHandle>,
) -> Result<(), EngineError> {
    out.clear();
    if inputs.len() < need {
        return Err(EngineError::TooFewInputs {
            got: inputs.len(),
            need,
        });
    }
    for (slot, input) in inputs.iter().take(need).enumerate() {
        let tex = input
            .as_ref()
            .and_then(|t| TextureHandle::new(t.handle))
            .ok_or(EngineError::MissingInput { slot })?;
        out.push(tex);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ShaderSources;
    use crate::param::{ParamDescriptor, ParamType};
    use crate::testing::{GlCall, ManualClock, RecordingDevice};

    fn brightness_effect() -> PluginInfo {
        PluginInfo {
            params: vec![ParamDescriptor::new("brightness", ParamType::Standard, 0.0, 2.0, 1.0)],
            ..PluginInfo::effect()
        }
    }

    fn tex(handle: u32) -> Option<InputTexture> {
        Some(InputTexture {
            width: 64,
            height: 64,
            handle,
        })
    }

    fn ready(info: &PluginInfo) -> (ShaderPlugin, RecordingDevice, ManualClock) {
        let clock = ManualClock::new();
        let mut plugin = ShaderPlugin::with_clock(info, Box::new(clock.clone())).unwrap();
        let mut dev = RecordingDevice::new();
        plugin.initialize(&mut dev, Viewport::sized(640, 360)).unwrap();
        dev.calls.clear();
        (plugin, dev, clock)
    }

    #[test]
    fn effect_frame_uploads_brightness_and_advancing_time() {
        let info = brightness_effect();
        let mut plugin = ShaderPlugin::new(&info).unwrap();
        let mut dev = RecordingDevice::new();
        plugin.initialize(&mut dev, Viewport::sized(640, 360)).unwrap();
        assert!(plugin.is_ready());

        plugin.process_frame(&mut dev, &[tex(7)]).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        plugin.process_frame(&mut dev, &[tex(7)]).unwrap();

        assert_eq!(dev.floats_for("brightness"), vec![1.0, 1.0]);
        let times = dev.floats_for("iGlobalTime");
        assert_eq!(times.len(), 2);
        assert!(times[1] > times[0], "time did not advance: {times:?}");
        assert_eq!(dev.draw_count(), 2);
    }

    #[test]
    fn explicit_frame_time_latches_host_driven_time() {
        let (mut plugin, mut dev, clock) = ready(&brightness_effect());
        assert!(plugin.process_frame_at(&mut dev, &[None], Some(3.0)).is_err());
        assert_eq!(plugin.time_mode(), TimeMode::SelfDriven);

        plugin.process_frame_at(&mut dev, &[tex(1)], Some(3.0)).unwrap();
        clock.set(50.0);
        plugin.process_frame(&mut dev, &[tex(1)]).unwrap();
        assert_eq!(plugin.time_mode(), TimeMode::HostDriven);
        assert_eq!(dev.floats_for("iGlobalTime"), vec![3.0, 3.0]);
    }

    #[test]
    fn set_parameter_is_read_back_and_scaled_on_next_frame() {
        let (mut plugin, mut dev, _) = ready(&brightness_effect());

        plugin.set_parameter(0, 0.25).unwrap();
        assert_eq!(plugin.get_parameter(0).unwrap().to_bits(), 0.25_f32.to_bits());

        plugin.process_frame(&mut dev, &[tex(3)]).unwrap();
        assert_eq!(dev.floats_for("brightness"), vec![0.5]);
    }

    #[test]
    fn out_of_range_parameter_index_fails() {
        let (plugin, _, _) = ready(&brightness_effect());
        assert!(matches!(
            plugin.get_parameter(1),
            Err(EngineError::ParamIndex { index: 1, count: 1 })
        ));
        assert!(plugin.set_parameter(1, 0.5).is_err());
        assert_eq!(plugin.get_parameter(0).unwrap(), 0.5);
    }

    #[test]
    fn source_accepts_empty_input_list() {
        let (mut plugin, mut dev, _) = ready(&PluginInfo::source());
        plugin.process_frame(&mut dev, &[]).unwrap();
        assert_eq!(dev.draw_count(), 1);
        assert!(dev.texture_binds().is_empty());
    }

    #[test]
    fn too_few_inputs_fails_without_touching_gl() {
        let (mut plugin, mut dev, _) = ready(&PluginInfo::effect());
        let err = plugin.process_frame(&mut dev, &[]).unwrap_err();
        assert!(matches!(err, EngineError::TooFewInputs { got: 0, need: 1 }));
        assert!(dev.calls.is_empty());

        // rendering is attempted again on the next frame
        plugin.process_frame(&mut dev, &[tex(2)]).unwrap();
        assert_eq!(dev.draw_count(), 1);
    }

    #[test]
    fn null_input_fails_without_touching_gl() {
        let (mut plugin, mut dev, _) = ready(&PluginInfo::effect());
        assert!(matches!(
            plugin.process_frame(&mut dev, &[None]),
            Err(EngineError::MissingInput { slot: 0 })
        ));
        assert!(matches!(
            plugin.process_frame(&mut dev, &[tex(0)]),
            Err(EngineError::MissingInput { slot: 0 })
        ));
        assert!(dev.calls.is_empty());
    }

    #[test]
    fn extra_inputs_are_ignored() {
        let (mut plugin, mut dev, _) = ready(&PluginInfo::effect());
        plugin.process_frame(&mut dev, &[tex(4), None, tex(9)]).unwrap();
        assert_eq!(
            dev.texture_binds(),
            vec![TextureHandle::new(4), None]
        );
    }

    #[test]
    fn frame_follows_bind_upload_draw_unbind_order() {
        let (mut plugin, mut dev, clock) = ready(&brightness_effect());
        clock.set(1.5);
        plugin.process_frame(&mut dev, &[tex(5)]).unwrap();

        let loc = |name: &str| dev.location_of(name).unwrap();
        let program = match dev.calls.first() {
            Some(GlCall::UseProgram(Some(p))) => *p,
            other => panic!("frame must start by binding the program, got {other:?}"),
        };
        let geometry = dev
            .calls
            .iter()
            .find_map(|c| match c {
                GlCall::DrawGeometry(g) => Some(*g),
                _ => None,
            })
            .unwrap();

        assert_eq!(
            dev.calls,
            vec![
                GlCall::UseProgram(Some(program)),
                GlCall::ActiveTexture(0),
                GlCall::BindTexture(TextureHandle::new(5)),
                GlCall::WrapRepeat,
                GlCall::Uniform1f(loc("brightness"), 1.0),
                GlCall::Uniform1f(loc("iGlobalTime"), 1.5),
                GlCall::Uniform3f(loc("iResolution"), [640.0, 360.0, 0.0]),
                GlCall::DrawGeometry(geometry),
                GlCall::ActiveTexture(0),
                GlCall::BindTexture(None),
                GlCall::UseProgram(None),
            ]
        );
    }

    #[test]
    fn host_time_freezes_self_driven_updates() {
        let (mut plugin, mut dev, clock) = ready(&PluginInfo::source());
        clock.set(4.0);
        plugin.process_frame(&mut dev, &[]).unwrap();

        plugin.set_external_time(2.5);
        assert_eq!(plugin.time_mode(), TimeMode::HostDriven);
        clock.set(9.0);
        plugin.process_frame(&mut dev, &[]).unwrap();
        clock.set(12.0);
        plugin.process_frame(&mut dev, &[]).unwrap();

        assert_eq!(dev.floats_for("iGlobalTime"), vec![4.0, 2.5, 2.5]);
        assert_eq!(plugin.elapsed_time(), 2.5);
    }

    #[test]
    fn process_before_initialize_or_after_deinitialize_fails() {
        let mut plugin = ShaderPlugin::new(&PluginInfo::source()).unwrap();
        let mut dev = RecordingDevice::new();
        assert!(matches!(
            plugin.process_frame(&mut dev, &[]),
            Err(EngineError::NotReady)
        ));

        plugin.initialize(&mut dev, Viewport::sized(8, 8)).unwrap();
        plugin.deinitialize(&mut dev);
        assert!(!plugin.is_ready());
        assert_eq!(dev.live_programs(), 0);
        assert_eq!(dev.live_geometries(), 0);
        assert!(matches!(
            plugin.process_frame(&mut dev, &[]),
            Err(EngineError::NotReady)
        ));

        // idempotent
        let before = dev.calls.len();
        plugin.deinitialize(&mut dev);
        assert_eq!(dev.calls.len(), before);
    }

    #[test]
    fn compile_failure_leaves_instance_inert() {
        let mut plugin = ShaderPlugin::new(&PluginInfo::effect()).unwrap();
        let mut dev = RecordingDevice::new();
        dev.fail_compile = Some("0:12: 'foo' : undeclared identifier".into());

        let err = plugin.initialize(&mut dev, Viewport::sized(8, 8)).unwrap_err();
        assert!(matches!(err, EngineError::ShaderCompile { .. }));
        assert!(!plugin.is_ready());
        assert!(plugin.bindings().params.iter().all(|l| !l.is_found()));

        dev.calls.clear();
        assert!(plugin.process_frame(&mut dev, &[tex(1)]).is_err());
        plugin.deinitialize(&mut dev);
        assert!(dev.calls.is_empty());

        // a later initialize on a working context succeeds
        plugin.initialize(&mut dev, Viewport::sized(8, 8)).unwrap();
        assert!(plugin.is_ready());
    }

    #[test]
    fn missing_capability_fails_before_compiling() {
        let mut plugin = ShaderPlugin::new(&PluginInfo::effect()).unwrap();
        let mut dev = RecordingDevice::new();
        dev.caps.multitexture = false;
        assert!(matches!(
            plugin.initialize(&mut dev, Viewport::sized(8, 8)),
            Err(EngineError::MissingCapability { what: "multitexture" })
        ));
        assert!(dev.calls.is_empty());
        assert!(!plugin.is_ready());
    }

    #[test]
    fn geometry_failure_releases_program() {
        let mut plugin = ShaderPlugin::new(&PluginInfo::source()).unwrap();
        let mut dev = RecordingDevice::new();
        dev.fail_geometry = true;
        assert!(plugin.initialize(&mut dev, Viewport::sized(8, 8)).is_err());
        assert!(!plugin.is_ready());
        assert_eq!(dev.live_programs(), 0);
        assert!(!plugin.bindings().time.is_found());
    }

    #[test]
    fn shader_without_a_parameter_uniform_still_renders() {
        let frag = "
            uniform sampler2D inputTexture0;
            uniform float iGlobalTime;
            uniform vec3 iResolution;
            uniform float brightness;
        ";
        let info = PluginInfo {
            shaders: ShaderSources::with_fragment(frag),
            ..PluginInfo::effect()
        };
        let (mut plugin, mut dev, _) = ready(&info);
        assert!(plugin.bindings().params[0].is_found());
        assert!(!plugin.bindings().params[1].is_found());
        assert!(!plugin.bindings().params[2].is_found());

        plugin.process_frame(&mut dev, &[tex(1)]).unwrap();
        let float_uploads = dev
            .calls
            .iter()
            .filter(|c| matches!(c, GlCall::Uniform1f(..)))
            .count();
        // brightness + time only
        assert_eq!(float_uploads, 2);
        assert_eq!(dev.draw_count(), 1);
    }

    #[test]
    fn resolution_tracks_viewport_and_resize() {
        let (mut plugin, mut dev, _) = ready(&PluginInfo::source());
        assert_eq!(plugin.resolution(), [640.0, 360.0, 0.0]);
        plugin.resize(Viewport::sized(1920, 1080));
        plugin.process_frame(&mut dev, &[]).unwrap();
        assert_eq!(dev.vec3s_for("iResolution"), vec![[1920.0, 1080.0, 0.0]]);
    }

    #[test]
    fn reinitialize_replaces_previous_program() {
        let (mut plugin, mut dev, _) = ready(&PluginInfo::source());
        plugin.set_parameter(2, 0.75).unwrap();
        plugin.set_shader_sources(ShaderSources::with_fragment(
            "uniform float iGlobalTime;\nuniform float hue;",
        ));
        plugin.initialize(&mut dev, Viewport::sized(320, 200)).unwrap();

        assert!(plugin.shaders().fragment.ends_with("uniform float hue;"));
        assert_eq!(dev.live_programs(), 1);
        assert_eq!(dev.live_geometries(), 1);
        assert!(plugin.bindings().params[2].is_found());
        assert!(!plugin.bindings().resolution.is_found());
        // values survive a shader swap
        assert_eq!(plugin.get_parameter(2).unwrap(), 0.75);
    }

    #[test]
    fn params_are_shared_with_other_threads() {
        let (mut plugin, mut dev, _) = ready(&brightness_effect());
        let bank = Arc::clone(plugin.params());
        std::thread::spawn(move || bank.get(0).unwrap().set_normalized(1.0))
            .join()
            .unwrap();
        plugin.process_frame(&mut dev, &[tex(1)]).unwrap();
        assert_eq!(dev.floats_for("brightness"), vec![2.0]);
    }
}
