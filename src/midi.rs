//! MIDI CC input.
//!
//! Control-change messages whose CC number is mapped in `preview.json` set the matching
//! parameter's normalized value to `value / 127`.

use std::collections::HashMap;
use std::sync::Arc;

use midir::{Ignore, MidiInput, MidiInputConnection};

use shaderfx_engine::config::MidiConfig;
use shaderfx_engine::{logi, logw, ParamBank};

/// CC number -> parameter index, plus an optional channel filter (wire value 0-15).
#[derive(Debug, Clone, Default)]
pub struct CcMap {
    channel: Option<u8>,
    by_cc: HashMap<u8, usize>,
}

impl CcMap {
    pub fn build(cfg: &MidiConfig, bank: &ParamBank) -> Self {
        let mut by_cc = HashMap::new();
        for (name, cc) in &cfg.cc {
            match bank.index_of(name) {
                Some(i) => {
                    if let Some(prev) = by_cc.insert(*cc, i) {
                        logw!("MIDI", "cc {cc} mapped twice; '{name}' replaces param #{prev}");
                    }
                }
                None => logw!("MIDI", "cc map names unknown param '{name}'"),
            }
        }
        Self {
            channel: cfg.channel.map(|c| c.saturating_sub(1)),
            by_cc,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_cc.is_empty()
    }

    /// Decode a raw MIDI message into `(param index, normalized value)` if it is a mapped CC.
    pub fn decode(&self, msg: &[u8]) -> Option<(usize, f32)> {
        let [status, cc, val] = *msg else {
            return None;
        };
        if status & 0xF0 != 0xB0 {
            return None;
        }
        let ch = status & 0x0F;
        if self.channel.is_some_and(|want| want != ch) {
            return None;
        }
        let index = *self.by_cc.get(&cc)?;
        Some((index, f32::from(val) / 127.0))
    }
}

pub fn connect_midi(cfg: &MidiConfig, bank: Arc<ParamBank>) -> Option<MidiInputConnection<()>> {
    if !cfg.enabled {
        return None;
    }
    let map = CcMap::build(cfg, &bank);
    if map.is_empty() {
        logw!("MIDI", "enabled but no cc mappings resolved; not connecting");
        return None;
    }

    let mut midi_in = match MidiInput::new("shaderfx-midi") {
        Ok(m) => m,
        Err(e) => {
            logw!("MIDI", "failed to create MIDI input: {e}");
            return None;
        }
    };
    midi_in.ignore(Ignore::None);

    let ports = midi_in.ports();
    if ports.is_empty() {
        logi!("MIDI", "No MIDI input ports detected.");
        return None;
    }

    let preferred = cfg.preferred_device_contains.as_ref().map(|s| s.to_lowercase());
    let chosen = preferred
        .and_then(|pref| {
            ports.iter().find(|p| {
                midi_in
                    .port_name(p)
                    .is_ok_and(|name| name.to_lowercase().contains(&pref))
            })
        })
        .or_else(|| ports.first())
        .cloned()?;

    let port_name = midi_in.port_name(&chosen).unwrap_or_else(|_| "Unknown".into());
    logi!("MIDI", "Connecting input: {port_name}");

    let conn = midi_in.connect(
        &chosen,
        "shaderfx-midi-in",
        move |_ts, msg, _| {
            if let Some((index, v)) = map.decode(msg) {
                if let Some(p) = bank.get(index) {
                    p.set_normalized(v);
                }
            }
        },
        (),
    );

    match conn {
        Ok(c) => Some(c),
        Err(e) => {
            logw!("MIDI", "Failed to connect MIDI input: {e}");
            None
        }
    }
}
