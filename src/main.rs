/*!
 * Teleport - Command Line Entry Point
 *
 * Runs one endpoint of a teleport link in its own process:
 * - receive: bind an ephemeral port, print it, print every token as hex
 * - send: connect to TELEPORT_REMOTE and forward hex tokens read from stdin
 */

use actor_teleport::core::limits::IDLE_POLL_INTERVAL;
use actor_teleport::{
    get_receiver_class, get_sender_class, init_tracing, receiver_port, set_sender_remote_address,
    ActionScheduler, LinkState, TeleportConfig, TokenFifo,
};
use miette::{miette, IntoDiagnostic, WrapErr};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_TOKEN_SIZE: usize = 4;
const ROUND: Duration = Duration::from_secs(1);

fn main() -> miette::Result<()> {
    init_tracing();

    let config = TeleportConfig::from_env();
    let token_size = match env::var("TELEPORT_TOKEN_SIZE") {
        Ok(value) => value
            .parse::<usize>()
            .into_diagnostic()
            .wrap_err_with(|| format!("TELEPORT_TOKEN_SIZE '{}' is not a size", value))?,
        Err(_) => DEFAULT_TOKEN_SIZE,
    };
    let mode = env::var("TELEPORT_MODE").unwrap_or_else(|_| "receive".to_string());
    info!(mode = %mode, token_size, config = ?config, "Teleport starting");

    match mode.as_str() {
        "receive" => run_receiver(config, token_size),
        "send" => {
            let remote = env::var("TELEPORT_REMOTE")
                .into_diagnostic()
                .wrap_err("TELEPORT_REMOTE must be set in send mode")?;
            let (host, port) = parse_remote(&remote)?;
            run_sender(config, token_size, host, port)
        }
        other => Err(miette!(
            help = "use TELEPORT_MODE=receive or TELEPORT_MODE=send",
            "unknown mode '{}'",
            other
        )),
    }
}

fn run_receiver(config: TeleportConfig, token_size: usize) -> miette::Result<()> {
    let class = get_receiver_class(token_size)?;
    let mut scheduler = ActionScheduler::with_config(config);
    let port = TokenFifo::with_default_capacity(token_size);
    let id = scheduler.spawn(&class, "receiver", port.clone());

    let bound = receiver_port(scheduler.endpoint(id))
        .ok_or_else(|| miette!("receiver could not bind a port"))?;
    println!("{}", bound);
    io::stdout().flush().into_diagnostic()?;

    loop {
        scheduler.run_until(ROUND, |s| !s.port(id).is_empty());
        for token in port.drain() {
            let hex = encode_hex(&token);
            info!(token = %hex, "Token received");
            println!("{}", hex);
        }
        if scheduler.endpoint(id).link_state() == LinkState::Broken {
            return Err(miette!("receiver stopped serving"));
        }
    }
}

fn run_sender(
    config: TeleportConfig,
    token_size: usize,
    host: &str,
    port_number: u16,
) -> miette::Result<()> {
    let class = get_sender_class(token_size)?;
    let mut scheduler = ActionScheduler::with_config(config);
    let port = TokenFifo::with_default_capacity(token_size);
    let id = scheduler.spawn(&class, "sender", port.clone());
    set_sender_remote_address(scheduler.endpoint(id), host, port_number);

    let input_done = Arc::new(AtomicBool::new(false));
    {
        let port = port.clone();
        let wake = scheduler.wake_signal();
        let input_done = Arc::clone(&input_done);
        thread::Builder::new()
            .name("teleport-stdin".to_string())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match decode_hex(line) {
                        Some(token) if token.len() == token_size => {
                            while !port.push(&token) {
                                thread::sleep(IDLE_POLL_INTERVAL);
                            }
                            wake.notify();
                        }
                        _ => warn!(line = %line, token_size, "Skipping malformed token"),
                    }
                }
                input_done.store(true, Ordering::Release);
                wake.notify();
            })
            .into_diagnostic()
            .wrap_err("could not start stdin reader")?;
    }

    let flushed = |s: &ActionScheduler| {
        input_done.load(Ordering::Acquire)
            && s.port(id).is_empty()
            && !s
                .endpoint(id)
                .as_sender()
                .is_some_and(|sender| sender.has_pending_token())
    };
    while !scheduler.run_until(ROUND, &flushed) {
        if scheduler.endpoint(id).link_state() == LinkState::Broken {
            return Err(miette!("sender lost its connection to {}:{}", host, port_number));
        }
    }

    let stats = scheduler.endpoint(id).stats();
    info!(
        stats = %serde_json::to_string(&stats).into_diagnostic()?,
        "All tokens sent"
    );
    scheduler.shutdown();
    Ok(())
}

fn parse_remote(remote: &str) -> miette::Result<(&str, u16)> {
    let (host, port) = remote
        .rsplit_once(':')
        .ok_or_else(|| miette!("TELEPORT_REMOTE '{}' is not host:port", remote))?;
    let port = port
        .parse()
        .into_diagnostic()
        .wrap_err_with(|| format!("bad port in TELEPORT_REMOTE '{}'", remote))?;
    Ok((host, port))
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 || !text.is_ascii() {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}
