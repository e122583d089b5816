//! ShaderFX preview host.
//!
//! Plays the host side of the plugin contract in a window: init, one process call per redraw,
//! deinit on exit, parameter get/set from control threads (OSC, MIDI) and optional SetTime.

mod hotreload;
mod midi;
mod osc;
mod validate;

use std::ffi::CString;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context};
use glow::HasContext;

use glutin::config::ConfigTemplateBuilder;
use glutin::context::{ContextApi, ContextAttributesBuilder, NotCurrentContext, Version};
use glutin::display::GetGlDisplay;
use glutin::prelude::*;
use glutin::surface::{SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::DisplayBuilder;

use raw_window_handle::HasRawWindowHandle;

use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};

use shaderfx_engine::assets::{read_text, AssetsRoot};
use shaderfx_engine::config::{load_param_table, load_preview_config, ConfigMode};
use shaderfx_engine::host::{ProcessOpenGl, FF_SUCCESS};
use shaderfx_engine::{logging, loge, logi, logw};
use shaderfx_engine::{GlowDevice, HostInstance, InputTexture, PluginInfo, PluginKind, ShaderSources, Viewport};

const CHECKER_SIZE: i32 = 256;
const CHECKER_CELL: i32 = 32;

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    kind: Option<PluginKind>,
    strict: bool,
    log_file: Option<PathBuf>,
    host_time: bool,
}

fn parse_kind(s: &str) -> anyhow::Result<PluginKind> {
    match s {
        "source" => Ok(PluginKind::Source),
        "effect" => Ok(PluginKind::Effect),
        other => bail!("unknown plugin kind '{other}' (expected source|effect)"),
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut it = args.into_iter();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--kind" => {
                let v = it.next().context("--kind needs a value")?;
                out.kind = Some(parse_kind(&v)?);
            }
            "--strict" => out.strict = true,
            "--log-file" => {
                let v = it.next().context("--log-file needs a path")?;
                out.log_file = Some(PathBuf::from(v));
            }
            "--host-time" => out.host_time = true,
            other => bail!("unknown argument '{other}'"),
        }
    }
    Ok(out)
}

fn main() {
    if let Err(e) = run() {
        loge!("INIT", "{e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    // --log-file wins over SHADERFX_LOG_FILE
    let log_file = args.log_file.clone().or_else(|| {
        std::env::var("SHADERFX_LOG_FILE")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    });
    let run_id = logging::init(log_file);
    logi!("INIT", "run_id={run_id}");

    let mode = if args.strict { ConfigMode::Strict } else { ConfigMode::Lenient };

    let start_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let assets = AssetsRoot::discover(start_dir).unwrap_or_else(|e| {
        logw!("INIT", "{e}; running on built-in defaults");
        AssetsRoot::at(start_dir.join("assets"))
    });
    logi!("INIT", "assets base: {}", assets.path().display());

    let cfg = load_preview_config(&assets, mode)?;
    match &cfg.source {
        Some(p) => logi!("INIT", "preview config: {}", p.display()),
        None => logi!("INIT", "preview config: defaults (no preview.json)"),
    }

    let kind = args.kind.unwrap_or(cfg.kind);
    let mut info = PluginInfo::builtin(kind);
    let mut params_label = format!("builtin {} params", kind.as_str());
    if let Some(p) = &cfg.params_path {
        info.params = load_param_table(p, mode)?;
        params_label = p.display().to_string();
        logi!("PARAMS", "loaded {} param(s) from {params_label}", info.params.len());
    }
    if let Some(f) = &cfg.frag_path {
        info.shaders = ShaderSources::with_fragment(read_text(f)?);
        logi!("INIT", "fragment shader: {}", f.display());
    }

    let issues = validate::validate_param_table(&params_label, &info.params, &info.shaders.fragment);
    validate::emit_summary("CONFIG", &params_label, &issues);
    validate::emit_issues("CONFIG", &issues);
    if validate::has_errors(&issues) {
        bail!("parameter table {params_label} has errors");
    }

    let mut host_time = args.host_time || cfg.host_time;

    let event_loop = EventLoop::new().map_err(|e| anyhow!("EventLoop::new failed: {e}"))?;
    let window_builder = winit::window::WindowBuilder::new()
        .with_title(format!("shaderfx preview: {} ({})", info.name, kind.as_str()))
        .with_inner_size(PhysicalSize::new(cfg.width, cfg.height));

    let template = ConfigTemplateBuilder::new().with_alpha_size(8).with_depth_size(0);
    let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));

    let (window, gl_config) = display_builder
        .build(&event_loop, template, |configs| {
            configs
                .reduce(|a, b| if a.num_samples() > b.num_samples() { a } else { b })
                .expect("glutin offers at least one matching config")
        })
        .map_err(|e| anyhow!("failed to build display: {e}"))?;

    let window = window.context("no window created")?;

    let raw_window_handle = window.raw_window_handle();
    let gl_display = gl_config.display();

    let context_attributes = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
        .build(Some(raw_window_handle));

    let not_current_gl_context: NotCurrentContext =
        unsafe { gl_display.create_context(&gl_config, &context_attributes) }.context("create_context failed")?;

    let size = window.inner_size();
    let attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        window.raw_window_handle(),
        NonZeroU32::new(size.width.max(1)).context("zero width")?,
        NonZeroU32::new(size.height.max(1)).context("zero height")?,
    );

    let gl_surface =
        unsafe { gl_display.create_window_surface(&gl_config, &attrs) }.context("create_window_surface failed")?;

    let gl_context = not_current_gl_context
        .make_current(&gl_surface)
        .context("make_current failed")?;

    if let Some(one) = NonZeroU32::new(1) {
        gl_surface.set_swap_interval(&gl_context, SwapInterval::Wait(one)).ok();
    }

    let gl = unsafe {
        glow::Context::from_loader_function(|s| match CString::new(s) {
            Ok(c) => gl_display.get_proc_address(&c) as *const _,
            Err(_) => std::ptr::null(),
        })
    };
    // Context is current on this thread for the rest of the program.
    let device = unsafe { GlowDevice::new(gl) };
    logi!("INIT", "GL device: {device:?}");

    let mut host = HostInstance::new(&info, device)?;
    let hi = host.plugin_info();
    logi!(
        "INIT",
        "plugin '{}' id={} type={} inputs={}..{}",
        hi.name_lossy(),
        String::from_utf8_lossy(&hi.unique_id),
        hi.plugin_type,
        hi.min_inputs,
        hi.max_inputs
    );
    let checker = match kind {
        PluginKind::Effect => Some(unsafe { create_checkerboard(host.device().gl())? }),
        PluginKind::Source => None,
    };

    if host.init_gl(Viewport::sized(size.width, size.height)) != FF_SUCCESS {
        bail!("plugin failed to initialize (see log above)");
    }

    let bank = Arc::clone(host.plugin().params());
    let _osc = osc::connect_osc(&cfg.osc, Arc::clone(&bank));
    let _midi = midi::connect_midi(&cfg.midi, Arc::clone(&bank));

    let frag_path = cfg.frag_path.clone();
    let hot = frag_path.as_deref().and_then(|p| match hotreload::HotReload::new(p) {
        Ok(h) => {
            logi!("WATCH", "watching {}", p.display());
            Some(h)
        }
        Err(e) => {
            logw!("WATCH", "hot reload disabled: {e}");
            None
        }
    });

    let start = Instant::now();
    logi!("INIT", "keys: Esc quit | R reset params | T host-driven time | P print params");

    event_loop.run(move |event, target| {
        target.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => target.exit(),

                WindowEvent::KeyboardInput { event, .. } => {
                    if !event.state.is_pressed() || event.repeat {
                        return;
                    }
                    match event.physical_key {
                        PhysicalKey::Code(KeyCode::Escape) => target.exit(),
                        PhysicalKey::Code(KeyCode::KeyR) => {
                            bank.reset_defaults();
                            logi!("PARAMS", "reset to defaults");
                        }
                        PhysicalKey::Code(KeyCode::KeyT) => {
                            if !host_time {
                                host_time = true;
                                logi!("TIME", "switched to host-driven time (permanent)");
                            }
                        }
                        PhysicalKey::Code(KeyCode::KeyP) => print_params(&host),
                        _ => {}
                    }
                }

                WindowEvent::Resized(new_size) => {
                    if let (Some(w), Some(h)) = (NonZeroU32::new(new_size.width), NonZeroU32::new(new_size.height)) {
                        gl_surface.resize(&gl_context, w, h);
                        host.plugin_mut().resize(Viewport::sized(new_size.width, new_size.height));
                    }
                }

                WindowEvent::RedrawRequested => {
                    let size = window.inner_size();

                    if let (Some(hot), Some(path)) = (&hot, frag_path.as_deref()) {
                        if hot.changed() {
                            reload_fragment(&mut host, path, Viewport::sized(size.width, size.height));
                        }
                    }

                    unsafe {
                        let gl = host.device().gl();
                        gl.viewport(0, 0, size.width as i32, size.height as i32);
                        gl.clear_color(0.0, 0.0, 0.0, 1.0);
                        gl.clear(glow::COLOR_BUFFER_BIT);
                    }

                    if host_time {
                        host.set_time(start.elapsed().as_secs_f64());
                    }

                    let inputs: Vec<Option<InputTexture>> = checker
                        .map(|tex| InputTexture {
                            width: CHECKER_SIZE as u32,
                            height: CHECKER_SIZE as u32,
                            handle: tex.0.get(),
                        })
                        .into_iter()
                        .map(Some)
                        .collect();
                    host.process_opengl(ProcessOpenGl { inputs: &inputs });

                    if let Err(e) = gl_surface.swap_buffers(&gl_context) {
                        loge!("RENDER", "swap_buffers failed: {e}");
                        target.exit();
                    }
                }

                _ => {}
            },

            Event::AboutToWait => {
                window.request_redraw();
            }

            Event::LoopExiting => {
                host.deinit_gl();
                if let Some(tex) = checker {
                    unsafe { host.device().gl().delete_texture(tex) };
                }
                logi!("INIT", "shutdown");
            }

            _ => {}
        }
    })
    .map_err(|e| anyhow!("event loop failed: {e}"))?;

    Ok(())
}

fn print_params(host: &HostInstance<GlowDevice>) {
    let count = host.plugin().params().len() as u32;
    for i in 0..count {
        let name = host.parameter_name(i).unwrap_or("?");
        let shown = host.parameter_display(i).unwrap_or_default();
        let n = host.plugin().get_parameter(i as usize).unwrap_or(f32::NAN);
        logi!("PARAMS", "#{i} {name} = {shown} (normalized {n:.3})");
    }
    logi!(
        "PARAMS",
        "time={:.3}s mode={:?}",
        host.plugin().elapsed_time(),
        host.plugin().time_mode()
    );
}

/// Re-read the fragment shader and re-run init. Parameter values are untouched.
fn reload_fragment(host: &mut HostInstance<GlowDevice>, path: &Path, viewport: Viewport) {
    let src = match read_text(path) {
        Ok(s) => s,
        Err(e) => {
            logw!("WATCH", "reload skipped: {e}");
            return;
        }
    };
    if host.plugin().is_ready() && host.plugin().shaders().fragment == src.as_str() {
        return;
    }

    let descriptors: Vec<_> = host
        .plugin()
        .params()
        .iter()
        .map(|p| {
            let (min, max) = p.range();
            shaderfx_engine::ParamDescriptor {
                name: p.name().to_string().into(),
                kind: p.kind(),
                min,
                max,
                default: min + p.default_normalized() * (max - min),
            }
        })
        .collect();
    let issues = validate::validate_param_table(&path.display().to_string(), &descriptors, &src);
    validate::emit_issues("WATCH", &issues);

    host.plugin_mut().set_shader_sources(ShaderSources::with_fragment(src));
    if host.init_gl(viewport) == FF_SUCCESS {
        logi!("WATCH", "reloaded {}", path.display());
    } else {
        logw!("WATCH", "reload failed; plugin is idle until the shader compiles");
    }
}

/// Host-side input texture. Wrap is clamp-to-edge on purpose: the plugin must force repeat.
unsafe fn create_checkerboard(gl: &glow::Context) -> anyhow::Result<glow::NativeTexture> {
    let mut pixels = Vec::with_capacity((CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
    for y in 0..CHECKER_SIZE {
        for x in 0..CHECKER_SIZE {
            let on = ((x / CHECKER_CELL) + (y / CHECKER_CELL)) % 2 == 0;
            let (r, g, b) = if on { (230, 230, 230) } else { (40, 60, 110) };
            pixels.extend_from_slice(&[r, g, b, 255]);
        }
    }

    let tex = gl.create_texture().map_err(|e| anyhow!("create_texture failed: {e}"))?;
    gl.bind_texture(glow::TEXTURE_2D, Some(tex));
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
    gl.tex_image_2d(
        glow::TEXTURE_2D,
        0,
        glow::RGBA as i32,
        CHECKER_SIZE,
        CHECKER_SIZE,
        0,
        glow::RGBA,
        glow::UNSIGNED_BYTE,
        glow::PixelUnpackData::Slice(Some(&pixels)),
    );
    gl.bind_texture(glow::TEXTURE_2D, None);
    Ok(tex)
}
