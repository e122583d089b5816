//! Uniform binding.
//!
//! Names are resolved to locations once per compiled program, right after compile + bind.
//! A missing uniform is a warning, not an error: shader authors may leave out uniforms they do
//! not use (and drivers strip unused ones). Uploads to an unresolved location are no-ops.

use crate::gl::{GlDevice, ProgramHandle};
use crate::logw;

/// Resolved uniform location; `-1` means "not found".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation(i32);

impl UniformLocation {
    pub const NOT_FOUND: UniformLocation = UniformLocation(-1);

    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn is_found(self) -> bool {
        self.0 >= 0
    }

    fn slot(self) -> Option<u32> {
        u32::try_from(self.0).ok()
    }
}

impl Default for UniformLocation {
    fn default() -> Self {
        Self::NOT_FOUND
    }
}

pub const TIME_UNIFORM: &str = "iGlobalTime";
pub const RESOLUTION_UNIFORM: &str = "iResolution";

/// Sampler uniform name for input slot `index` (`inputTexture0`, `inputTexture1`, ...).
pub fn input_texture_uniform(index: usize) -> String {
    format!("inputTexture{index}")
}

pub fn resolve<D: GlDevice + ?Sized>(gl: &mut D, program: ProgramHandle, name: &str) -> UniformLocation {
    match gl.uniform_location(program, name) {
        Some(loc) => match i32::try_from(loc) {
            Ok(loc) => UniformLocation(loc),
            Err(_) => {
                logw!("UNIFORM", "location {loc} for '{name}' does not fit a GL int; ignoring");
                UniformLocation::NOT_FOUND
            }
        },
        None => {
            logw!("UNIFORM", "could not locate uniform '{name}' in shader (uploads will be skipped)");
            UniformLocation::NOT_FOUND
        }
    }
}

pub fn upload_f32<D: GlDevice + ?Sized>(gl: &mut D, loc: UniformLocation, v: f32) {
    if let Some(slot) = loc.slot() {
        gl.uniform_1f(slot, v);
    }
}

pub fn upload_vec3<D: GlDevice + ?Sized>(gl: &mut D, loc: UniformLocation, v: [f32; 3]) {
    if let Some(slot) = loc.slot() {
        gl.uniform_3f(slot, v);
    }
}

pub fn upload_i32<D: GlDevice + ?Sized>(gl: &mut D, loc: UniformLocation, v: i32) {
    if let Some(slot) = loc.slot() {
        gl.uniform_1i(slot, v);
    }
}

/// Uniform names declared at file scope in GLSL source, in declaration order.
///
/// A plain text scan (`[layout(...)] uniform <type> <name>[ = init][, <name>...];`), good
/// enough for validating parameter tables against a shader before compiling it.
pub fn declared_uniforms(src: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in src.lines() {
        let line = strip_layout(line.split("//").next().unwrap_or("").trim());
        let Some(rest) = line.strip_prefix("uniform ") else {
            continue;
        };
        let mut decl = rest.split(';').next().unwrap_or("").trim_start();
        // skip precision qualifiers and the type
        loop {
            let Some((word, tail)) = decl.split_once(char::is_whitespace) else {
                decl = "";
                break;
            };
            decl = tail.trim_start();
            if !matches!(word, "lowp" | "mediump" | "highp") {
                break;
            }
        }
        for name in split_top_level(decl) {
            let name = name.split(['=', '[']).next().unwrap_or("").trim();
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// `layout(location = 0) uniform ...` -> `uniform ...`
fn strip_layout(line: &str) -> &str {
    let Some(rest) = line.strip_prefix("layout") else {
        return line;
    };
    let rest = rest.trim_start();
    if !rest.starts_with('(') {
        return line;
    }
    match rest.find(')') {
        Some(end) => rest[end + 1..].trim_start(),
        None => line,
    }
}

/// Split on commas outside parentheses, so `vec2(1.0, 2.0)` initializers stay whole.
fn split_top_level(decl: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in decl.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&decl[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&decl[start..]);
    parts
}

/// Every location one plugin instance uploads to.
///
/// Sized once at construction (one entry per parameter, one per input slot); `resolve_all`
/// fills it after a compile and `reset` puts everything back to `NOT_FOUND`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBindings {
    pub params: Vec<UniformLocation>,
    pub inputs: Vec<UniformLocation>,
    pub time: UniformLocation,
    pub resolution: UniformLocation,
}

impl UniformBindings {
    pub fn unresolved(param_count: usize, input_count: usize) -> Self {
        Self {
            params: vec![UniformLocation::NOT_FOUND; param_count],
            inputs: vec![UniformLocation::NOT_FOUND; input_count],
            time: UniformLocation::NOT_FOUND,
            resolution: UniformLocation::NOT_FOUND,
        }
    }

    /// Resolve all locations against `program`, which must be bound.
    ///
    /// Sampler `inputTexture<i>` is pointed at texture unit `i` while we are here.
    pub fn resolve_all<'a, D: GlDevice + ?Sized>(
        &mut self,
        gl: &mut D,
        program: ProgramHandle,
        param_names: impl IntoIterator<Item = &'a str>,
    ) {
        for (slot, name) in self.params.iter_mut().zip(param_names) {
            *slot = resolve(gl, program, name);
        }

        for (unit, slot) in self.inputs.iter_mut().enumerate() {
            *slot = resolve(gl, program, &input_texture_uniform(unit));
            upload_i32(gl, *slot, unit as i32);
        }

        self.time = resolve(gl, program, TIME_UNIFORM);
        self.resolution = resolve(gl, program, RESOLUTION_UNIFORM);
    }

    pub fn reset(&mut self) {
        self.params.fill(UniformLocation::NOT_FOUND);
        self.inputs.fill(UniformLocation::NOT_FOUND);
        self.time = UniformLocation::NOT_FOUND;
        self.resolution = UniformLocation::NOT_FOUND;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{GlCall, RecordingDevice};

    const FRAG: &str = "
        uniform float brightness;
        uniform sampler2D inputTexture0;
        uniform float iGlobalTime;
    ";

    fn compiled(dev: &mut RecordingDevice) -> ProgramHandle {
        dev.compile_program("void main(){}", FRAG).unwrap()
    }

    #[test]
    fn missing_uniform_resolves_to_sentinel() {
        let mut dev = RecordingDevice::new();
        let prog = compiled(&mut dev);
        let found = resolve(&mut dev, prog, "brightness");
        assert!(found.is_found());
        let missing = resolve(&mut dev, prog, "contrast");
        assert_eq!(missing, UniformLocation::NOT_FOUND);
        assert_eq!(missing.raw(), -1);
    }

    #[test]
    fn lookups_are_case_sensitive() {
        let mut dev = RecordingDevice::new();
        let prog = compiled(&mut dev);
        assert!(!resolve(&mut dev, prog, "Brightness").is_found());
    }

    #[test]
    fn sentinel_upload_is_a_no_op() {
        let mut dev = RecordingDevice::new();
        upload_f32(&mut dev, UniformLocation::NOT_FOUND, 1.0);
        upload_vec3(&mut dev, UniformLocation::NOT_FOUND, [1.0, 2.0, 0.0]);
        upload_i32(&mut dev, UniformLocation::NOT_FOUND, 3);
        assert!(dev.calls.is_empty());
    }

    #[test]
    fn resolve_all_tolerates_missing_names_and_sets_sampler_units() {
        let mut dev = RecordingDevice::new();
        let prog = compiled(&mut dev);
        dev.calls.clear();

        let mut b = UniformBindings::unresolved(2, 1);
        b.resolve_all(&mut dev, prog, ["brightness", "warp"]);

        assert!(b.params[0].is_found());
        assert!(!b.params[1].is_found());
        assert!(b.inputs[0].is_found());
        assert!(b.time.is_found());
        assert!(!b.resolution.is_found());

        let sampler = b.inputs[0].raw() as u32;
        assert!(dev.calls.contains(&GlCall::Uniform1i(sampler, 0)));

        b.reset();
        assert_eq!(b, UniformBindings::unresolved(2, 1));
    }

    #[test]
    fn declared_uniforms_scans_glsl() {
        let src = "
            #version 330 core
            uniform sampler2D inputTexture0;
            uniform highp float iGlobalTime; // seconds
            uniform vec3 iResolution;
            uniform float a, b;
            uniform float weights[4];
            // uniform float commented;
            float not_a_uniform;
        ";
        assert_eq!(
            declared_uniforms(src),
            ["inputTexture0", "iGlobalTime", "iResolution", "a", "b", "weights"]
        );
    }

    #[test]
    fn declared_uniforms_handles_initializers_and_layout() {
        let src = "
            uniform float brightness = 1.0;
            layout(location = 3) uniform float warp;
            layout (location=4) uniform vec2 offset = vec2(0.5, 0.5), scale;
        ";
        assert_eq!(declared_uniforms(src), ["brightness", "warp", "offset", "scale"]);
    }

    #[test]
    fn input_uniform_names_are_indexed() {
        assert_eq!(input_texture_uniform(0), "inputTexture0");
        assert_eq!(input_texture_uniform(3), "inputTexture3");
    }
}
