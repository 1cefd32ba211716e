//! pa-midi-ctl - drive PulseAudio / PipeWire volumes from a MIDI controller
//!
//! Faders and knobs are mapped to sinks, sources and per-application streams by
//! name. Names are resolved against a live registry that follows the audio
//! server as streams come and go.
//!
//! Pipeline: MIDI event → [`router::EventRouter`] → [`executor::VolumeCommandExecutor`]
//! → [`registry::TargetRegistry`] lookup → [`pulse::AudioBackend::set_volume`].

pub mod config;
pub mod executor;
pub mod midi;
pub mod paths;
pub mod pulse;
pub mod registry;
pub mod router;
pub mod sniffer;
pub mod startup;

#[cfg(test)]
pub(crate) mod testing;
