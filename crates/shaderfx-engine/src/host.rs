//! FFGL-style host boundary.
//!
//! Everything the host sees is a `u32` code. Parameter values travel as the raw bit pattern of
//! an `f32`; that reinterpretation happens here and nowhere else.

use crate::descriptor::{PluginInfo, PluginKind};
use crate::error::EngineError;
use crate::gl::GlDevice;
use crate::plugin::{InputTexture, ShaderPlugin, Viewport};
use crate::{logi, loge};

pub const FF_SUCCESS: u32 = 0;
pub const FF_FAIL: u32 = 0xFFFF_FFFF;

pub const FF_TRUE: u32 = 1;
pub const FF_FALSE: u32 = 0;

pub const FF_EFFECT: u32 = 0;
pub const FF_SOURCE: u32 = 1;

/// Plugin names are fixed 16-byte fields in the host ABI.
pub const PLUGIN_NAME_LEN: usize = 16;

pub fn encode_param(value: f32) -> u32 {
    value.to_bits()
}

pub fn decode_param(bits: u32) -> f32 {
    f32::from_bits(bits)
}

pub fn kind_code(kind: PluginKind) -> u32 {
    match kind {
        PluginKind::Effect => FF_EFFECT,
        PluginKind::Source => FF_SOURCE,
    }
}

/// Host `SetParameter` payload. The host passes it by pointer, so it may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetParameter {
    pub index: u32,
    pub value: u32,
}

/// Host `ProcessOpenGL` payload.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOpenGl<'a> {
    pub inputs: &'a [Option<InputTexture>],
}

/// What the host reads at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPluginInfo {
    pub plugin_type: u32,
    pub unique_id: [u8; 4],
    /// NUL-padded, truncated to [`PLUGIN_NAME_LEN`].
    pub name: [u8; PLUGIN_NAME_LEN],
    pub min_inputs: u32,
    pub max_inputs: u32,
}

impl HostPluginInfo {
    pub fn from_info(info: &PluginInfo) -> Self {
        let mut name = [0u8; PLUGIN_NAME_LEN];
        let bytes = info.name.as_bytes();
        let n = bytes.len().min(PLUGIN_NAME_LEN);
        name[..n].copy_from_slice(&bytes[..n]);

        let inputs = info.input_count() as u32;
        Self {
            plugin_type: kind_code(info.kind),
            unique_id: info.id,
            name,
            min_inputs: inputs,
            max_inputs: inputs,
        }
    }

    /// The name field up to the first NUL. A multi-byte char cut by truncation shows as U+FFFD.
    pub fn name_lossy(&self) -> std::borrow::Cow<'_, str> {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(PLUGIN_NAME_LEN);
        String::from_utf8_lossy(&self.name[..end])
    }
}

/// One plugin instance as the host drives it, together with the GL device of the context
/// the host renders on.
#[derive(Debug)]
pub struct HostInstance<D: GlDevice> {
    info: HostPluginInfo,
    plugin: ShaderPlugin,
    gl: D,
    /// Set while frames are being rejected so a stuck host does not flood the log.
    frame_failing: bool,
}

impl<D: GlDevice> HostInstance<D> {
    pub fn new(info: &PluginInfo, gl: D) -> Result<Self, EngineError> {
        Ok(Self::from_plugin(HostPluginInfo::from_info(info), ShaderPlugin::new(info)?, gl))
    }

    pub fn from_plugin(info: HostPluginInfo, plugin: ShaderPlugin, gl: D) -> Self {
        Self {
            info,
            plugin,
            gl,
            frame_failing: false,
        }
    }

    pub fn plugin_info(&self) -> &HostPluginInfo {
        &self.info
    }

    pub fn plugin(&self) -> &ShaderPlugin {
        &self.plugin
    }

    pub fn plugin_mut(&mut self) -> &mut ShaderPlugin {
        &mut self.plugin
    }

    pub fn device(&self) -> &D {
        &self.gl
    }

    pub fn init_gl(&mut self, viewport: Viewport) -> u32 {
        self.frame_failing = false;
        to_code("InitGL", self.plugin.initialize(&mut self.gl, viewport))
    }

    pub fn process_opengl(&mut self, frame: ProcessOpenGl<'_>) -> u32 {
        match self.plugin.process_frame(&mut self.gl, frame.inputs) {
            Ok(()) => {
                if self.frame_failing {
                    logi!("HOST", "ProcessOpenGL recovered");
                    self.frame_failing = false;
                }
                FF_SUCCESS
            }
            Err(e) => {
                if !self.frame_failing {
                    loge!("HOST", "ProcessOpenGL failed: {e}");
                    self.frame_failing = true;
                }
                FF_FAIL
            }
        }
    }

    pub fn deinit_gl(&mut self) -> u32 {
        self.plugin.deinitialize(&mut self.gl);
        FF_SUCCESS
    }

    /// Normalized value as a bit pattern, or `FF_FAIL` for a bad index.
    ///
    /// `FF_FAIL` is also the bit pattern of one NaN; the host ABI cannot tell them apart.
    pub fn get_parameter(&self, index: u32) -> u32 {
        match self.plugin.get_parameter(index as usize) {
            Ok(v) => encode_param(v),
            Err(e) => {
                loge!("HOST", "GetParameter failed: {e}");
                FF_FAIL
            }
        }
    }

    pub fn set_parameter(&self, request: Option<SetParameter>) -> u32 {
        let Some(req) = request else {
            loge!("HOST", "SetParameter called without a payload");
            return FF_FAIL;
        };
        to_code(
            "SetParameter",
            self.plugin.set_parameter(req.index as usize, decode_param(req.value)),
        )
    }

    pub fn set_time(&mut self, seconds: f64) -> u32 {
        self.plugin.set_external_time(seconds);
        FF_SUCCESS
    }

    pub fn supports_set_time(&self) -> u32 {
        FF_TRUE
    }

    pub fn parameter_name(&self, index: u32) -> Option<&str> {
        self.plugin.params().get(index as usize).map(|p| p.name())
    }

    pub fn parameter_type(&self, index: u32) -> u32 {
        self.plugin
            .params()
            .get(index as usize)
            .map_or(FF_FAIL, |p| p.kind().code())
    }

    /// Default normalized value as a bit pattern, or `FF_FAIL`.
    pub fn parameter_default(&self, index: u32) -> u32 {
        self.plugin
            .params()
            .get(index as usize)
            .map_or(FF_FAIL, |p| encode_param(p.default_normalized()))
    }

    /// Scaled value as display text.
    pub fn parameter_display(&self, index: u32) -> Option<String> {
        self.plugin
            .params()
            .get(index as usize)
            .map(|p| format!("{:.3}", p.scaled()))
    }
}

fn to_code(call: &str, r: Result<(), EngineError>) -> u32 {
    match r {
        Ok(()) => FF_SUCCESS,
        Err(e) => {
            loge!("HOST", "{call} failed: {e}");
            FF_FAIL
        }
    }
}
