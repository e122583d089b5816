//! Preview-host configuration.
//!
//! - `assets/preview(.<os>).json`: window, plugin kind, overrides, control surfaces
//! - parameter tables: `{ "version": 1, "params": [ {name, type, min, max, default} ] }`
//!
//! Both are optional; absent files mean built-in defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::assets::{read_text, AssetsRoot};
use crate::descriptor::PluginKind;
use crate::error::EngineError;
use crate::param::ParamDescriptor;

/// How strictly to interpret config files.
///
/// - `Lenient`: unknown fields are ignored, missing keys fall back to defaults.
/// - `Strict`: unknown top-level fields and unsupported versions are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigMode {
    #[default]
    Lenient,
    Strict,
}

fn default_version() -> u32 {
    1
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_osc_bind() -> String {
    "0.0.0.0:9000".to_string()
}

fn default_osc_prefix() -> String {
    "/shaderfx".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OscConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_osc_bind")]
    pub bind: String,
    /// Address prefix, e.g. `/shaderfx` → `/shaderfx/param/brightness`.
    #[serde(default = "default_osc_prefix")]
    pub prefix: String,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_osc_bind(),
            prefix: default_osc_prefix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MidiConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Case-insensitive substring match against MIDI input port names.
    #[serde(default)]
    pub preferred_device_contains: Option<String>,
    /// 1-16; `None` listens on every channel.
    #[serde(default)]
    pub channel: Option<u8>,
    /// Parameter name -> CC number.
    #[serde(default)]
    pub cc: HashMap<String, u8>,
}

/// Typed view of `preview.json`. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewJson {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub kind: PluginKind,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Fragment shader override (relative to assets/).
    #[serde(default)]
    pub frag: Option<String>,
    /// Parameter table override (relative to assets/).
    #[serde(default)]
    pub params: Option<String>,
    #[serde(default)]
    pub host_time: bool,
    #[serde(default)]
    pub osc: OscConfig,
    #[serde(default)]
    pub midi: MidiConfig,
}

/// `PreviewJson` that fails on unknown top-level fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct PreviewJsonStrict {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    kind: PluginKind,
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
    #[serde(default)]
    frag: Option<String>,
    #[serde(default)]
    params: Option<String>,
    #[serde(default)]
    host_time: bool,
    #[serde(default)]
    osc: OscConfig,
    #[serde(default)]
    midi: MidiConfig,
}

impl From<PreviewJsonStrict> for PreviewJson {
    fn from(s: PreviewJsonStrict) -> Self {
        Self {
            version: s.version,
            kind: s.kind,
            width: s.width,
            height: s.height,
            frag: s.frag,
            params: s.params,
            host_time: s.host_time,
            osc: s.osc,
            midi: s.midi,
        }
    }
}

impl Default for PreviewJson {
    fn default() -> Self {
        Self {
            version: default_version(),
            kind: PluginKind::default(),
            width: default_width(),
            height: default_height(),
            frag: None,
            params: None,
            host_time: false,
            osc: OscConfig::default(),
            midi: MidiConfig::default(),
        }
    }
}

/// `preview.json` with paths resolved against the assets directory.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// File the config came from; `None` when running on defaults.
    pub source: Option<PathBuf>,
    pub kind: PluginKind,
    pub width: u32,
    pub height: u32,
    pub frag_path: Option<PathBuf>,
    pub params_path: Option<PathBuf>,
    pub host_time: bool,
    pub osc: OscConfig,
    pub midi: MidiConfig,
}

impl PreviewConfig {
    fn resolve(json: PreviewJson, assets: &AssetsRoot, source: Option<PathBuf>) -> Self {
        Self {
            source,
            kind: json.kind,
            width: json.width,
            height: json.height,
            frag_path: json.frag.as_deref().map(|s| assets.resolve(s)),
            params_path: json.params.as_deref().map(|s| assets.resolve(s)),
            host_time: json.host_time,
            osc: json.osc,
            midi: json.midi,
        }
    }
}

/// Parse and validate `preview.json` text.
pub fn parse_preview_json(path: &Path, src: &str, mode: ConfigMode) -> Result<PreviewJson, EngineError> {
    let json_err = |e| EngineError::Json {
        path: path.to_path_buf(),
        source: e,
    };
    let pj: PreviewJson = match mode {
        ConfigMode::Lenient => serde_json::from_str(src).map_err(json_err)?,
        ConfigMode::Strict => serde_json::from_str::<PreviewJsonStrict>(src)
            .map_err(json_err)?
            .into(),
    };

    let invalid = |msg: String| EngineError::InvalidConfig {
        path: path.to_path_buf(),
        msg,
    };

    if mode == ConfigMode::Strict && pj.version != 1 {
        return Err(invalid(format!(
            "unsupported preview.json version {} (expected 1)",
            pj.version
        )));
    }
    if pj.width == 0 || pj.height == 0 {
        return Err(invalid(format!("window size must be non-zero ({}x{})", pj.width, pj.height)));
    }
    if let Some(ch) = pj.midi.channel {
        if !(1..=16).contains(&ch) {
            return Err(invalid(format!("midi.channel must be 1-16, got {ch}")));
        }
    }
    if let Some((name, cc)) = pj.midi.cc.iter().find(|(_, cc)| **cc > 127) {
        return Err(invalid(format!("midi.cc.{name} must be 0-127, got {cc}")));
    }

    Ok(pj)
}

/// Load `preview(.<os>).json` from the assets directory, or defaults when it is absent.
pub fn load_preview_config(assets: &AssetsRoot, mode: ConfigMode) -> Result<PreviewConfig, EngineError> {
    let path = assets.pick_platform_json("preview");
    if !path.exists() {
        return Ok(PreviewConfig::resolve(PreviewJson::default(), assets, None));
    }
    let src = read_text(&path)?;
    let pj = parse_preview_json(&path, &src, mode)?;
    Ok(PreviewConfig::resolve(pj, assets, Some(path)))
}

#[derive(Debug, Clone, Deserialize)]
struct ParamsJson {
    #[serde(default = "default_version")]
    version: u32,
    params: Vec<ParamDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParamsJsonStrict {
    #[serde(default = "default_version")]
    version: u32,
    params: Vec<ParamDescriptor>,
}

/// Parse a parameter table. Range checks happen later, when the table becomes a `ParamBank`.
pub fn parse_param_table(path: &Path, src: &str, mode: ConfigMode) -> Result<Vec<ParamDescriptor>, EngineError> {
    let json_err = |e| EngineError::Json {
        path: path.to_path_buf(),
        source: e,
    };
    let (version, params) = match mode {
        ConfigMode::Lenient => {
            let pj: ParamsJson = serde_json::from_str(src).map_err(json_err)?;
            (pj.version, pj.params)
        }
        ConfigMode::Strict => {
            let pj: ParamsJsonStrict = serde_json::from_str(src).map_err(json_err)?;
            (pj.version, pj.params)
        }
    };

    if mode == ConfigMode::Strict && version != 1 {
        return Err(EngineError::InvalidConfig {
            path: path.to_path_buf(),
            msg: format!("unsupported params version {version} (expected 1)"),
        });
    }
    Ok(params)
}

pub fn load_param_table(path: &Path, mode: ConfigMode) -> Result<Vec<ParamDescriptor>, EngineError> {
    let src = read_text(path)?;
    parse_param_table(path, &src, mode)
}
