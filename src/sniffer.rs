//! MIDI port listing and control-change sniffer
//!
//! Helps write the action table: `--list-ports` shows what can go into
//! `InputMidiName`, `--sniff` prints the channel and controller of every fader
//! you move.

use anyhow::{Context, Result};
use colored::*;
use tokio::sync::mpsc;

use crate::midi::{self, ControlChangeEvent, MidiEvent, MidiInputDevice};

/// Print available MIDI ports
pub fn list_ports_formatted() {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());
    print_port_group("Input Ports:", midi::list_input_ports());
    print_port_group("Output Ports:", midi::list_output_ports());
    println!();
}

fn print_port_group(title: &str, ports: Result<Vec<String>, midi::MidiError>) {
    println!("\n{}", title.bold());
    match ports {
        Ok(ports) if ports.is_empty() => println!("  {}", "No ports found".dimmed()),
        Ok(ports) => {
            for port in ports {
                println!("  {}", port);
            }
        }
        Err(e) => println!("  {}", e.to_string().red()),
    }
}

/// Action-table fragment matching a control change
pub fn config_hint(cc: &ControlChangeEvent) -> String {
    format!("Channel: {}, Controller: {}", cc.channel, cc.controller)
}

/// Print incoming events until Ctrl+C.
///
/// Listens on `port` when given, otherwise on every input port.
pub async fn run_cli_sniffer(port: Option<&str>) -> Result<()> {
    println!("{}", "=== MIDI Sniffer ===".bold().cyan());
    println!("Press Ctrl+C to exit\n");

    let (tx, mut rx) = mpsc::channel(1000);

    let devices = match port {
        Some(port) => vec![MidiInputDevice::open(port, tx)
            .with_context(|| format!("Failed to open MIDI input '{}'", port))?],
        None => MidiInputDevice::open_all(tx).context("Failed to open MIDI inputs")?,
    };

    if devices.is_empty() {
        anyhow::bail!("No MIDI input ports found");
    }
    for device in &devices {
        println!("Listening on {}", device.port_name().bright_white());
    }
    println!("{}\n", "─".repeat(60).dimmed());

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("\n{}", "Sniffer stopped".yellow());
    Ok(())
}

fn print_event(event: &MidiEvent) {
    let timestamp = chrono::Local::now().format("%H:%M:%S%.3f").to_string();

    match event {
        MidiEvent::ControlChange(cc) => println!(
            "[{}] {} => {}  {}",
            timestamp.dimmed(),
            event.to_string().bright_yellow(),
            config_hint(cc).green(),
            format!("value {}", cc.value).dimmed()
        ),
        other => println!("[{}] {}", timestamp.dimmed(), other.to_string().bright_black()),
    }
}
