//! Plugin parameters.
//!
//! A parameter stores a single **normalized** value (nominally `0..1`) and a physical range
//! `(min, max)`. The shader only ever sees the scaled value:
//!
//! `scaled = min + normalized * (max - min)`
//!
//! Hosts set and read the normalized value, possibly from a UI thread while the render thread
//! uploads. The value lives in an `AtomicU32` holding the `f32` bit pattern, so a concurrent
//! reader observes either the old or the new value, never a torn one.
//!
//! No clamping happens anywhere in this module: out-of-range normalized values pass straight
//! through and scale outside `(min, max)`. Hosts rely on seeing exactly what they set.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::Deserialize;

use crate::error::EngineError;

/// Semantic parameter type. Affects how a host draws the control, not rendering.
///
/// Discriminants are the FFGL parameter type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Boolean = 0,
    Event = 1,
    Red = 2,
    Green = 3,
    Blue = 4,
    Xpos = 5,
    Ypos = 6,
    #[default]
    Standard = 10,
    Text = 100,
}

impl ParamType {
    pub fn code(self) -> u32 {
        self as u32
    }
}

fn default_one() -> f32 {
    1.0
}

/// One row of a plugin's parameter table.
///
/// `default` is in physical units (same space as `min`/`max`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ParamDescriptor {
    pub name: Cow<'static, str>,
    #[serde(default, rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub min: f32,
    #[serde(default = "default_one")]
    pub max: f32,
    #[serde(default)]
    pub default: f32,
}

impl ParamDescriptor {
    pub const fn new(name: &'static str, kind: ParamType, min: f32, max: f32, default: f32) -> Self {
        Self {
            name: Cow::Borrowed(name),
            kind,
            min,
            max,
            default,
        }
    }
}

#[derive(Debug)]
pub struct Parameter {
    name: String,
    kind: ParamType,
    min: f32,
    max: f32,
    default_normalized: f32,
    value: AtomicU32,
}

impl Parameter {
    /// Build a parameter from a physical initial value.
    ///
    /// Fails when the range is empty or inverted, or when its bounds or span are not finite.
    pub fn new(
        name: impl Into<String>,
        min: f32,
        max: f32,
        value: f32,
        kind: ParamType,
    ) -> Result<Self, EngineError> {
        let name = name.into();
        if !min.is_finite() || !max.is_finite() {
            return Err(EngineError::InvalidParameter {
                name,
                msg: format!("range must be finite (min={min} max={max})"),
            });
        }
        if min >= max {
            return Err(EngineError::InvalidParameter {
                name,
                msg: format!("min must be below max (min={min} max={max})"),
            });
        }
        let span = max - min;
        if !span.is_finite() {
            return Err(EngineError::InvalidParameter {
                name,
                msg: format!("range span overflows (min={min} max={max})"),
            });
        }

        let normalized = (value - min) / span;
        Ok(Self {
            name,
            kind,
            min,
            max,
            default_normalized: normalized,
            value: AtomicU32::new(normalized.to_bits()),
        })
    }

    pub fn from_descriptor(d: &ParamDescriptor) -> Result<Self, EngineError> {
        Self::new(d.name.as_ref(), d.min, d.max, d.default, d.kind)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamType {
        self.kind
    }

    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    pub fn normalized(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::Relaxed))
    }

    /// Store a normalized value verbatim (no clamping).
    pub fn set_normalized(&self, v: f32) {
        self.value.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn default_normalized(&self) -> f32 {
        self.default_normalized
    }

    /// Value handed to the shader.
    pub fn scaled(&self) -> f32 {
        self.min + self.normalized() * (self.max - self.min)
    }

    /// Store a physical value by normalizing it into the parameter's range (no clamping).
    pub fn set_scaled(&self, v: f32) {
        self.set_normalized((v - self.min) / (self.max - self.min));
    }

    pub fn reset(&self) {
        self.set_normalized(self.default_normalized);
    }
}

/// Ordered, fixed-size parameter list. Index = host-visible parameter number.
///
/// Shared between the render thread and control threads behind an `Arc`.
#[derive(Debug)]
pub struct ParamBank {
    params: Vec<Parameter>,
}

impl ParamBank {
    pub fn from_descriptors(descriptors: &[ParamDescriptor]) -> Result<Self, EngineError> {
        let params = descriptors
            .iter()
            .map(Parameter::from_descriptor)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { params })
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.params.get(index)
    }

    /// Like `get`, but with an error naming the bad index.
    pub fn checked(&self, index: usize) -> Result<&Parameter, EngineError> {
        self.params.get(index).ok_or(EngineError::ParamIndex {
            index,
            count: self.params.len(),
        })
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    pub fn by_name(&self, name: &str) -> Option<&Parameter> {
        self.index_of(name).and_then(|i| self.params.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn reset_defaults(&self) {
        for p in &self.params {
            p.reset();
        }
    }
}
