//! MIDI input ports (midir)
//!
//! Opens a hardware input port and feeds parsed events into a tokio channel.
//! The midir callback runs on the driver's own thread, so it never blocks:
//! a full queue drops the event.

use midir::{MidiInput, MidiInputConnection, MidiInputPort, MidiOutput};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{format_hex, MidiEvent};

/// Client name announced to the MIDI subsystem
const CLIENT_NAME: &str = "pa-midi-ctl";

#[derive(Error, Debug)]
pub enum MidiError {
    #[error("failed to initialise MIDI {direction}: {reason}")]
    Init {
        direction: &'static str,
        reason: String,
    },

    #[error("MIDI input port '{0}' not found")]
    PortNotFound(String),

    #[error("failed to connect to MIDI input port '{port}': {reason}")]
    Connect { port: String, reason: String },
}

fn new_input(client: &str) -> Result<MidiInput, MidiError> {
    MidiInput::new(client).map_err(|e| MidiError::Init {
        direction: "input",
        reason: e.to_string(),
    })
}

/// Names of all MIDI input ports
pub fn list_input_ports() -> Result<Vec<String>, MidiError> {
    let midi_in = new_input(&format!("{}-scanner", CLIENT_NAME))?;
    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect())
}

/// Names of all MIDI output ports
pub fn list_output_ports() -> Result<Vec<String>, MidiError> {
    let midi_out =
        MidiOutput::new(&format!("{}-scanner", CLIENT_NAME)).map_err(|e| MidiError::Init {
            direction: "output",
            reason: e.to_string(),
        })?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect())
}

/// Pick the port named `wanted`, falling back to a case-insensitive substring match
pub fn find_port<'a>(names: &'a [String], wanted: &str) -> Option<&'a String> {
    names.iter().find(|name| *name == wanted).or_else(|| {
        let wanted = wanted.to_lowercase();
        names
            .iter()
            .find(|name| name.to_lowercase().contains(&wanted))
    })
}

/// An open MIDI input port. Dropping it closes the port.
pub struct MidiInputDevice {
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidiInputDevice {
    /// Open the input port matching `wanted` and forward its events to `tx`
    pub fn open(wanted: &str, tx: mpsc::Sender<MidiEvent>) -> Result<Self, MidiError> {
        let midi_in = new_input(CLIENT_NAME)?;

        let ports: Vec<(MidiInputPort, String)> = midi_in
            .ports()
            .into_iter()
            .filter_map(|port| midi_in.port_name(&port).ok().map(|name| (port, name)))
            .collect();
        debug!("Found {} MIDI input ports", ports.len());

        let names: Vec<String> = ports.iter().map(|(_, name)| name.clone()).collect();
        let chosen = find_port(&names, wanted)
            .ok_or_else(|| MidiError::PortNotFound(wanted.to_string()))?
            .clone();

        let (port, _) = ports
            .into_iter()
            .find(|(_, name)| *name == chosen)
            .ok_or_else(|| MidiError::PortNotFound(wanted.to_string()))?;

        Self::connect(midi_in, port, chosen, tx)
    }

    /// Open every input port, used by the sniffer when no port is configured
    pub fn open_all(tx: mpsc::Sender<MidiEvent>) -> Result<Vec<Self>, MidiError> {
        let mut devices = Vec::new();
        for name in list_input_ports()? {
            devices.push(Self::open(&name, tx.clone())?);
        }
        Ok(devices)
    }

    fn connect(
        midi_in: MidiInput,
        port: MidiInputPort,
        port_name: String,
        tx: mpsc::Sender<MidiEvent>,
    ) -> Result<Self, MidiError> {
        info!("Connecting to MIDI input port: {}", port_name);

        let connection = midi_in
            .connect(
                &port,
                CLIENT_NAME,
                move |_timestamp, data, _| match MidiEvent::parse(data) {
                    Some(event) => {
                        if tx.try_send(event).is_err() {
                            debug!(
                                "MIDI event queue full or closed, dropping {}",
                                format_hex(data)
                            );
                        }
                    }
                    None => debug!("Failed to parse MIDI: {}", format_hex(data)),
                },
                (),
            )
            .map_err(|e| MidiError::Connect {
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            _connection: connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}
