//! OSC input (UDP).
//!
//! Two styles of control:
//! - **Normalized**: `/prefix/param/<name|index>` with a float, stored verbatim.
//! - **Raw**:        `/prefix/raw/<name>` with a physical value, normalized into the range.
//!
//! Introspection, answered to the sender:
//!   /prefix/list/params   -> /prefix/reply/list/params   (string args: param names, in index order)
//!   /prefix/get/<name>    -> /prefix/reply/get/<name>    (floats: normalized, scaled, min, max)
//!                                                          or ("unknown_param")
//!   /prefix/list/mappings -> /prefix/reply/list/mappings (string args: route patterns)

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use rosc::{OscMessage, OscPacket, OscType};

use shaderfx_engine::config::OscConfig;
use shaderfx_engine::{logi, logw, ParamBank, Parameter};

pub struct OscHandle {
    stop_tx: crossbeam_channel::Sender<()>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl Drop for OscHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

pub fn connect_osc(cfg: &OscConfig, bank: Arc<ParamBank>) -> Option<OscHandle> {
    if !cfg.enabled {
        return None;
    }

    let sock = match UdpSocket::bind(&cfg.bind) {
        Ok(s) => s,
        Err(e) => {
            logw!("OSC", "Failed to bind {}: {e}", cfg.bind);
            return None;
        }
    };
    if let Err(e) = sock.set_nonblocking(true) {
        logw!("OSC", "set_nonblocking failed: {e}");
        return None;
    }

    let prefix = cfg.prefix.trim_end_matches('/').to_string();
    logi!("OSC", "listening on {} prefix={prefix}", cfg.bind);

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

    let spawned = std::thread::Builder::new().name("osc".to_string()).spawn(move || {
        let mut buf = [0u8; 2048];
        loop {
            if stop_rx.try_recv().is_ok() {
                break;
            }

            match sock.recv_from(&mut buf) {
                Ok((sz, from)) => match rosc::decoder::decode_udp(&buf[..sz]) {
                    Ok((_rest, pkt)) => handle_packet(pkt, &prefix, &bank, &sock, from),
                    Err(e) => logw!("OSC", "undecodable packet from {from}: {e}"),
                },
                Err(_e) => {
                    // no data
                    std::thread::sleep(Duration::from_millis(2));
                }
            }
        }
        logi!("OSC", "stopped");
    });

    match spawned {
        Ok(join) => Some(OscHandle {
            stop_tx,
            join: Some(join),
        }),
        Err(e) => {
            logw!("OSC", "failed to spawn osc thread: {e}");
            None
        }
    }
}

fn handle_packet(pkt: OscPacket, prefix: &str, bank: &ParamBank, sock: &UdpSocket, from: SocketAddr) {
    match pkt {
        OscPacket::Message(msg) => {
            if let Some(reply) = handle_message(prefix, &msg, bank) {
                send_reply(sock, from, reply);
            }
        }
        OscPacket::Bundle(b) => {
            for p in b.content {
                handle_packet(p, prefix, bank, sock, from);
            }
        }
    }
}

fn send_reply(sock: &UdpSocket, to: SocketAddr, msg: OscMessage) {
    match rosc::encoder::encode(&OscPacket::Message(msg)) {
        Ok(buf) => {
            let _ = sock.send_to(&buf, to);
        }
        Err(e) => logw!("OSC", "encode error: {e}"),
    }
}

fn first_float(args: &[OscType]) -> Option<f32> {
    match args.first()? {
        OscType::Float(v) => Some(*v),
        OscType::Double(v) => Some(*v as f32),
        OscType::Int(v) => Some(*v as f32),
        _ => None,
    }
}

/// `name` or a decimal index.
fn lookup<'a>(bank: &'a ParamBank, key: &str) -> Option<&'a Parameter> {
    bank.by_name(key)
        .or_else(|| key.parse::<usize>().ok().and_then(|i| bank.get(i)))
}

/// Apply one message. Returns the reply to send back, if the message asks for one.
pub fn handle_message(prefix: &str, msg: &OscMessage, bank: &ParamBank) -> Option<OscMessage> {
    let route = msg.addr.strip_prefix(prefix)?;

    if let Some(key) = route.strip_prefix("/param/") {
        match (lookup(bank, key), first_float(&msg.args)) {
            (Some(p), Some(v)) => p.set_normalized(v),
            (None, _) => logw!("OSC", "{}: unknown param '{key}'", msg.addr),
            (_, None) => logw!("OSC", "{}: expected a numeric argument", msg.addr),
        }
        return None;
    }

    if let Some(key) = route.strip_prefix("/raw/") {
        match (lookup(bank, key), first_float(&msg.args)) {
            (Some(p), Some(v)) => p.set_scaled(v),
            (None, _) => logw!("OSC", "{}: unknown param '{key}'", msg.addr),
            (_, None) => logw!("OSC", "{}: expected a numeric argument", msg.addr),
        }
        return None;
    }

    if route == "/list/params" || route == "/list" {
        let args = bank.iter().map(|p| OscType::String(p.name().to_string())).collect();
        return Some(OscMessage {
            addr: format!("{prefix}/reply/list/params"),
            args,
        });
    }

    if let Some(key) = route.strip_prefix("/get/") {
        let args = match lookup(bank, key) {
            Some(p) => {
                let (min, max) = p.range();
                vec![
                    OscType::Float(p.normalized()),
                    OscType::Float(p.scaled()),
                    OscType::Float(min),
                    OscType::Float(max),
                ]
            }
            None => vec![OscType::String("unknown_param".into())],
        };
        return Some(OscMessage {
            addr: format!("{prefix}/reply/get/{key}"),
            args,
        });
    }

    if route == "/list/mappings" || route == "/mappings" {
        let args = [
            format!("prefix={prefix}"),
            format!("{prefix}/param/<name|index> (normalized)"),
            format!("{prefix}/raw/<name|index> (physical value)"),
            format!("{prefix}/list/params"),
            format!("{prefix}/get/<name|index>"),
        ]
        .into_iter()
        .map(OscType::String)
        .collect();
        return Some(OscMessage {
            addr: format!("{prefix}/reply/list/mappings"),
            args,
        });
    }

    None
}
