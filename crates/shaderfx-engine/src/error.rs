use std::{fmt, path::PathBuf};

/// Which half of the shader pair a compile diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    /// The `assets/` folder could not be found or was invalid.
    AssetsNotFound { start_dir: PathBuf },
    /// I/O error reading a file.
    Io { path: PathBuf, source: std::io::Error },
    /// JSON parse error for a file.
    Json { path: PathBuf, source: serde_json::Error },

    /// JSON-to-typed deserialization error (when the JSON is already parsed).
    JsonValue { path: PathBuf, source: serde_json::Error },

    /// Config is syntactically valid but semantically invalid.
    InvalidConfig { path: PathBuf, msg: String },

    /// A parameter descriptor cannot be turned into a parameter (empty or inverted range).
    InvalidParameter { name: String, msg: String },
    /// Parameter index outside the plugin's parameter list.
    ParamIndex { index: usize, count: usize },

    /// The GL context lacks a feature the plugin needs.
    MissingCapability { what: &'static str },
    /// Shader stage failed to compile; `log` is the driver's info log.
    ShaderCompile { stage: ShaderStage, log: String },
    /// Program failed to link; `log` is the driver's info log.
    ProgramLink { log: String },
    /// A GL object could not be created.
    GlCreate(String),

    /// A frame or GL call arrived before a successful initialize.
    NotReady,
    /// Host supplied fewer input textures than the plugin consumes.
    TooFewInputs { got: usize, need: usize },
    /// A required input slot was empty or held the null texture.
    MissingInput { slot: usize },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::AssetsNotFound { start_dir } => {
                write!(f, "Could not locate assets/ starting from {}", start_dir.display())
            }
            EngineError::Io { path, source } => {
                write!(f, "I/O error for {}: {}", path.display(), source)
            }
            EngineError::Json { path, source } => {
                write!(f, "JSON parse error for {}: {}", path.display(), source)
            }
            EngineError::JsonValue { path, source } => {
                write!(f, "JSON deserialize error for {}: {}", path.display(), source)
            }
            EngineError::InvalidConfig { path, msg } => {
                write!(f, "Invalid config {}: {}", path.display(), msg)
            }
            EngineError::InvalidParameter { name, msg } => {
                write!(f, "Invalid parameter '{}': {}", name, msg)
            }
            EngineError::ParamIndex { index, count } => {
                write!(f, "Parameter index {} out of range (count={})", index, count)
            }
            EngineError::MissingCapability { what } => {
                write!(f, "GL context is missing required capability: {}", what)
            }
            EngineError::ShaderCompile { stage, log } => {
                write!(f, "{} shader compile error:\n{}", stage, log)
            }
            EngineError::ProgramLink { log } => write!(f, "Program link error:\n{}", log),
            EngineError::GlCreate(msg) => write!(f, "GL object creation failed: {}", msg),
            EngineError::NotReady => f.write_str("plugin is not initialized"),
            EngineError::TooFewInputs { got, need } => {
                write!(f, "frame has {} input texture(s), plugin needs {}", got, need)
            }
            EngineError::MissingInput { slot } => {
                write!(f, "input texture slot {} is empty", slot)
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io { source, .. } => Some(source),
            EngineError::Json { source, .. } => Some(source),
            EngineError::JsonValue { source, .. } => Some(source),
            _ => None,
        }
    }
}
