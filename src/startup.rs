//! Startup checks on the configured MIDI ports

use thiserror::Error;

use crate::midi::input::find_port;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StartupError {
    #[error(
        "InputMidiName must be set.\nPossible input values are: \n\n{}\n\n\
         Possible output values are\n\n{}",
        .inputs.join("\n"),
        .outputs.join("\n")
    )]
    MissingInputPort {
        inputs: Vec<String>,
        outputs: Vec<String>,
    },
}

impl StartupError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::MissingInputPort { .. } => 1,
        }
    }
}

/// Reject an empty `InputMidiName`, listing the ports the user could pick.
///
/// `list_ports` is only called on failure and returns (inputs, outputs).
pub fn require_input_port<F>(name: &str, list_ports: F) -> Result<(), StartupError>
where
    F: FnOnce() -> (Vec<String>, Vec<String>),
{
    if !name.is_empty() {
        return Ok(());
    }

    let (inputs, outputs) = list_ports();
    Err(StartupError::MissingInputPort { inputs, outputs })
}

/// Whether the reserved `OutputMidiName` is present
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPortStatus {
    Unset,
    Present(String),
    Missing(String),
}

pub fn output_port_status(name: &str, available: &[String]) -> OutputPortStatus {
    if name.is_empty() {
        return OutputPortStatus::Unset;
    }

    match find_port(available, name) {
        Some(port) => OutputPortStatus::Present(port.clone()),
        None => OutputPortStatus::Missing(name.to_string()),
    }
}
