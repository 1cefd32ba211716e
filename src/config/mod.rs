//! Configuration management
//!
//! Loads the YAML action table and MIDI port names. The configuration is read
//! once at startup and never mutated afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::pulse::TargetKind;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    #[serde(default)]
    pub midi_actions: Vec<MidiAction>,
    /// MIDI input port to open
    #[serde(default)]
    pub input_midi_name: String,
    /// MIDI output port. Reserved: nothing is sent to it.
    #[serde(default)]
    pub output_midi_name: String,
}

/// Kind of MIDI message an action reacts to
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum MidiActionType {
    ControlChange,
}

/// Effect applied to the audio target
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum EffectKind {
    VolumeChange,
    /// Accepted in configuration, not acted upon yet
    Mute,
}

/// One row of the action table
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MidiAction {
    pub action_type: MidiActionType,
    pub channel: u8,
    pub controller: u8,
    /// Controller value treated as 100%
    pub max_input_value: u32,
    pub action: PulseAudioAction,
}

/// What a matched MIDI action does on the audio server
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PulseAudioAction {
    pub target_type: TargetKind,
    pub target_name: String,
    pub action_type: EffectKind,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        for (idx, action) in self.midi_actions.iter().enumerate() {
            action
                .validate()
                .with_context(|| format!("Invalid MidiActions entry {}", idx))?;
        }
        Ok(())
    }
}

impl MidiAction {
    fn validate(&self) -> Result<()> {
        if self.channel > 15 {
            anyhow::bail!("Channel {} is invalid (must be 0-15)", self.channel);
        }
        if self.controller > 127 {
            anyhow::bail!("Controller {} is invalid (must be 0-127)", self.controller);
        }
        if self.max_input_value == 0 {
            anyhow::bail!("MaxInputValue must be greater than 0");
        }
        if self.action.target_name.is_empty() {
            anyhow::bail!("TargetName cannot be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
InputMidiName: "nanoKONTROL2 MIDI 1"
OutputMidiName: "nanoKONTROL2 MIDI 1"
MidiActions:
  - ActionType: ControlChange
    Channel: 0
    Controller: 7
    MaxInputValue: 127
    Action:
      TargetType: Sink
      TargetName: "Speakers"
      ActionType: VolumeChange
  - ActionType: ControlChange
    Channel: 1
    Controller: 10
    MaxInputValue: 127
    Action:
      TargetType: PlaybackStream
      TargetName: "Firefox"
      ActionType: Mute
"#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();

        assert_eq!(config.input_midi_name, "nanoKONTROL2 MIDI 1");
        assert_eq!(config.midi_actions.len(), 2);

        let first = &config.midi_actions[0];
        assert_eq!(first.action_type, MidiActionType::ControlChange);
        assert_eq!(first.channel, 0);
        assert_eq!(first.controller, 7);
        assert_eq!(first.max_input_value, 127);
        assert_eq!(first.action.target_type, TargetKind::Sink);
        assert_eq!(first.action.target_name, "Speakers");
        assert_eq!(first.action.action_type, EffectKind::VolumeChange);

        assert_eq!(config.midi_actions[1].action.action_type, EffectKind::Mute);
    }

    #[test]
    fn test_missing_port_names_default_to_empty() {
        let config = AppConfig::from_yaml("MidiActions: []\n").unwrap();
        assert!(config.input_midi_name.is_empty());
        assert!(config.output_midi_name.is_empty());
    }

    #[test]
    fn test_zero_max_input_value_rejected() {
        let yaml = SAMPLE.replacen("MaxInputValue: 127", "MaxInputValue: 0", 1);
        let err = AppConfig::from_yaml(&yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("MaxInputValue"));
    }

    #[test]
    fn test_channel_out_of_range_rejected() {
        let yaml = SAMPLE.replacen("Channel: 1", "Channel: 16", 1);
        let err = AppConfig::from_yaml(&yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("entry 1"));
    }

    #[test]
    fn test_controller_out_of_range_rejected() {
        let yaml = SAMPLE.replacen("Controller: 7", "Controller: 128", 1);
        assert!(AppConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_unknown_target_type_rejected() {
        let yaml = SAMPLE.replacen("TargetType: Sink", "TargetType: Speaker", 1);
        assert!(AppConfig::from_yaml(&yaml).is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, SAMPLE)?;

        let config = AppConfig::load(&path).await?;
        assert_eq!(config.midi_actions.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = AppConfig::load("/nonexistent/pa-midi-ctl.yaml").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
