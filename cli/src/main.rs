//! chainlisten CLI — follow a contract event from the terminal.
//!
//! Usage:
//! ```bash
//! # Stream decoded Transfer events as JSON lines
//! chainlisten listen --url wss://eth.example/ws \
//!     --address 0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48 \
//!     --abi erc20.json --event Transfer
//!
//! # Print the topic hash an event subscribes to
//! chainlisten topic --abi erc20.json --event Transfer
//! ```

mod tracing_setup;

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use chainlisten_core::{ListenerConfig, ListenerTimings, LogDecoder};
use chainlisten_evm::AbiLogDecoder;
use chainlisten_ws::ResilientListener;

use crate::tracing_setup::{init_tracing, LogConfig};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "listen" => cmd_listen(&args[2..]).await,
        "topic" => cmd_topic(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("chainlisten {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("chainlisten {}", env!("CARGO_PKG_VERSION"));
    println!("Follow a contract event over a self-healing WebSocket subscription\n");
    println!("USAGE:");
    println!("    chainlisten <COMMAND>\n");
    println!("COMMANDS:");
    println!("    listen     Subscribe to an event and print each occurrence as JSON");
    println!("    topic      Print the topic hash of an event");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("LISTEN FLAGS:");
    println!("    --url <URL>               WebSocket RPC endpoint (ws:// or wss://)  [required]");
    println!("    --address <0x..>          Contract address  [required]");
    println!("    --abi <FILE>              Contract ABI JSON  [required]");
    println!("    --event <NAME>            Event name  [required]");
    println!("    --keep-alive-ms <N>       Health check interval  [default: 60000]");
    println!("    --probe-timeout-ms <N>    Health check reply timeout  [default: 15000]");
    println!("    --reconnect-ms <N>        Delay before reconnecting  [default: 1000]");
    println!("    --json                    Emit logs as JSON\n");
    println!("TOPIC FLAGS:");
    println!("    --abi <FILE>              Contract ABI JSON  [required]");
    println!("    --event <NAME>            Event name  [required]");
}

async fn cmd_listen(args: &[String]) -> anyhow::Result<()> {
    let url = parse_flag(args, "--url").ok_or_else(|| anyhow!("--url is required"))?;
    let address = parse_flag(args, "--address").ok_or_else(|| anyhow!("--address is required"))?;
    let event = parse_flag(args, "--event").ok_or_else(|| anyhow!("--event is required"))?;
    let decoder = load_decoder(args)?;
    let timings = parse_timings(args)?;

    init_tracing(&LogConfig {
        json: has_flag(args, "--json"),
        ..LogConfig::default()
    });

    let config = ListenerConfig::new(url, address, event, Arc::new(decoder))
        .with_timings(timings)
        .with_callback(|event| match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize event"),
        });

    let handle = ResilientListener::spawn(config)?;
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    tracing::info!("shutting down");
    handle.stop();
    handle.join().await;
    Ok(())
}

fn cmd_topic(args: &[String]) -> anyhow::Result<()> {
    let event = parse_flag(args, "--event").ok_or_else(|| anyhow!("--event is required"))?;
    let decoder = load_decoder(args)?;
    let topic = decoder.topic_hash(&event)?;
    println!("{topic}");
    Ok(())
}

fn load_decoder(args: &[String]) -> anyhow::Result<AbiLogDecoder> {
    let path = parse_flag(args, "--abi").ok_or_else(|| anyhow!("--abi is required"))?;
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading ABI file {path}"))?;
    Ok(AbiLogDecoder::from_abi_json(&json)?)
}

fn parse_timings(args: &[String]) -> anyhow::Result<ListenerTimings> {
    let mut timings = ListenerTimings::default();
    if let Some(ms) = parse_ms(args, "--keep-alive-ms")? {
        timings.keep_alive_interval_ms = ms;
    }
    if let Some(ms) = parse_ms(args, "--probe-timeout-ms")? {
        timings.probe_timeout_ms = ms;
    }
    if let Some(ms) = parse_ms(args, "--reconnect-ms")? {
        timings.reconnect_delay_ms = ms;
    }
    Ok(timings)
}

fn parse_ms(args: &[String], flag: &str) -> anyhow::Result<Option<u64>> {
    parse_flag(args, flag)
        .map(|v| v.parse::<u64>().with_context(|| format!("{flag} expects milliseconds, got '{v}'")))
        .transpose()
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
