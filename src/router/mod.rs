//! Event router - matches MIDI events against the action table
//!
//! Every configured action whose channel and controller match an incoming
//! Control Change fires, in configuration order. One fader may drive several
//! targets. Matching and normalization never fail; execution failures are
//! logged and do not stop the remaining actions.


use tracing::{debug, trace, warn};

use crate::config::{EffectKind, MidiAction, MidiActionType};
use crate::executor::{VolumeCommand, VolumeCommandExecutor};
use crate::midi::{ControlChangeEvent, MidiEvent};

/// Controller value scaled by the action's maximum input value.
///
/// Not clamped: a controller sending more than `max_input_value` yields > 1.0.
pub fn normalize(value: u8, max_input_value: u32) -> f64 {
    f64::from(value) / f64::from(max_input_value)
}

pub struct EventRouter {
    actions: Vec<MidiAction>,
    executor: VolumeCommandExecutor,
}

impl EventRouter {
    pub fn new(actions: Vec<MidiAction>, executor: VolumeCommandExecutor) -> Self {
        Self { actions, executor }
    }

    /// Actions triggered by a Control Change, in configuration order
    pub fn matching_actions<'a>(
        &'a self,
        event: &'a ControlChangeEvent,
    ) -> impl Iterator<Item = &'a MidiAction> + 'a {
        self.actions.iter().filter(move |action| {
            action.action_type == MidiActionType::ControlChange
                && action.channel == event.channel
                && action.controller == event.controller
        })
    }

    /// Dispatch one incoming MIDI event
    pub async fn handle(&self, event: &MidiEvent) {
        match event {
            MidiEvent::ControlChange(cc) => self.handle_control_change(cc).await,
            other => trace!("Ignoring {}", other),
        }
    }

    async fn handle_control_change(&self, event: &ControlChangeEvent) {
        for action in self.matching_actions(event) {
            let normalized = normalize(event.value, action.max_input_value);

            match action.action.action_type {
                EffectKind::VolumeChange => {
                    let cmd = VolumeCommand {
                        target_kind: action.action.target_type,
                        target_name: action.action.target_name.clone(),
                        normalized_volume: normalized,
                    };

                    if let Err(e) = self.executor.execute(&cmd).await {
                        warn!(
                            "Failed to apply volume to {} [{}]: {}",
                            cmd.target_kind, cmd.target_name, e
                        );
                    }
                }
                EffectKind::Mute => {
                    debug!(
                        "Mute is not implemented, ignoring action for {} [{}]",
                        action.action.target_type, action.action.target_name
                    );
                }
            }
        }

        debug!(
            "Saw ControlChange input on Channel {}, Controller {}, with value {}",
            event.channel, event.controller, event.value
        );
    }
}
