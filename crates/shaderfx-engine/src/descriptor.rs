//! Plugin descriptors: what a host sees before any instance exists.
//!
//! Two variants ship built in, each fixed at build time:
//! - `source`: generator, no input textures
//! - `effect`: one input texture
//!
//! Shader text is embedded from `shaders/`.

use std::borrow::Cow;

use serde::Deserialize;

use crate::param::{ParamDescriptor, ParamType};

pub const QUAD_VERT: &str = include_str!("../shaders/quad.vert");
pub const EFFECT_FRAG: &str = include_str!("../shaders/effect.frag");
pub const SOURCE_FRAG: &str = include_str!("../shaders/source.frag");

pub const EFFECT_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("brightness", ParamType::Standard, 0.0, 2.0, 1.0),
    ParamDescriptor::new("warp", ParamType::Standard, 0.0, 0.1, 0.02),
    ParamDescriptor::new("speed", ParamType::Standard, 0.0, 4.0, 1.0),
];

pub const SOURCE_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("speed", ParamType::Standard, 0.0, 4.0, 1.0),
    ParamDescriptor::new("scale", ParamType::Standard, 1.0, 20.0, 6.0),
    ParamDescriptor::new("hue", ParamType::Standard, 0.0, 1.0, 0.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Source,
    #[default]
    Effect,
}

impl PluginKind {
    /// Number of input textures an instance of this kind consumes.
    pub fn input_count(self) -> usize {
        match self {
            PluginKind::Source => 0,
            PluginKind::Effect => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PluginKind::Source => "source",
            PluginKind::Effect => "effect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: Cow<'static, str>,
    pub fragment: Cow<'static, str>,
}

impl ShaderSources {
    pub fn for_kind(kind: PluginKind) -> Self {
        let fragment = match kind {
            PluginKind::Source => SOURCE_FRAG,
            PluginKind::Effect => EFFECT_FRAG,
        };
        Self {
            vertex: Cow::Borrowed(QUAD_VERT),
            fragment: Cow::Borrowed(fragment),
        }
    }

    /// Built-in vertex shader with a custom fragment shader.
    pub fn with_fragment(fragment: impl Into<String>) -> Self {
        Self {
            vertex: Cow::Borrowed(QUAD_VERT),
            fragment: Cow::Owned(fragment.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PluginInfo {
    /// Four-byte unique id the host registers the plugin under.
    pub id: [u8; 4],
    pub name: String,
    pub kind: PluginKind,
    pub params: Vec<ParamDescriptor>,
    pub shaders: ShaderSources,
}

impl PluginInfo {
    pub fn source() -> Self {
        Self {
            id: *b"SFXS",
            name: "ShaderFX Source".to_string(),
            kind: PluginKind::Source,
            params: SOURCE_PARAMS.to_vec(),
            shaders: ShaderSources::for_kind(PluginKind::Source),
        }
    }

    pub fn effect() -> Self {
        Self {
            id: *b"SFXE",
            name: "ShaderFX Effect".to_string(),
            kind: PluginKind::Effect,
            params: EFFECT_PARAMS.to_vec(),
            shaders: ShaderSources::for_kind(PluginKind::Effect),
        }
    }

    pub fn builtin(kind: PluginKind) -> Self {
        match kind {
            PluginKind::Source => Self::source(),
            PluginKind::Effect => Self::effect(),
        }
    }

    pub fn input_count(&self) -> usize {
        self.kind.input_count()
    }
}
