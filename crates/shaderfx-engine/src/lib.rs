//! Full-screen shader video plugin: parameters, timing, uniform binding and the per-frame
//! render cycle behind an FFGL-style host boundary.

pub mod logging;

pub mod assets;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod geometry;
pub mod gl;
pub mod glow_device;
pub mod host;
pub mod param;
pub mod plugin;
pub mod timing;
pub mod uniforms;

#[cfg(test)]
mod testing;

pub use descriptor::{PluginInfo, PluginKind, ShaderSources};
pub use error::EngineError;
pub use gl::GlDevice;
pub use glow_device::GlowDevice;
pub use host::HostInstance;
pub use param::{ParamBank, ParamDescriptor, ParamType, Parameter};
pub use plugin::{InputTexture, ShaderPlugin, Viewport};
