//! Switcher state and the state machine that applies classified messages.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::event::SwitcherEvent;
use crate::message::{DeviceError, Message, classify};
use crate::types::Input;

/// Last known state of the switcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitcherState {
    /// Video input, once known.
    pub current_input: Option<Input>,
    /// Audio input, once known.
    pub audio_input: Option<Input>,
    /// Auto-switch mode. Updated optimistically by mode commands and
    /// corrected by the next status dump.
    pub auto_mode: bool,
    /// Mode as last reported by the device itself.
    pub confirmed_auto_mode: Option<bool>,
    /// True while a connection is open.
    pub available: bool,
    /// Firmware version from the status dump.
    pub firmware_version: Option<String>,
}

impl SwitcherState {
    /// Apply a classified message. Returns whether any field changed.
    pub fn apply(&mut self, message: &Message) -> bool {
        let before = self.clone();

        match message {
            Message::InputConfirmation {
                input,
                video,
                audio,
            } => {
                if *video {
                    self.current_input = Some(*input);
                }
                if *audio {
                    self.audio_input = Some(*input);
                }
                info!(
                    video = ?self.current_input,
                    audio = ?self.audio_input,
                    "switcher input updated"
                );
            }
            Message::StatusDump(status) => {
                if let Some(video) = status.video {
                    self.current_input = Some(video);
                }
                if let Some(audio) = status.audio {
                    self.audio_input = Some(audio);
                }
                if let Some(auto) = status.auto_mode {
                    self.auto_mode = auto;
                    self.confirmed_auto_mode = Some(auto);
                }
                if let Some(firmware) = &status.firmware {
                    self.firmware_version = Some(firmware.clone());
                }
                info!(
                    input = ?self.current_input,
                    mode = if self.auto_mode { "auto" } else { "manual" },
                    firmware = ?self.firmware_version,
                    "status received"
                );
            }
            Message::FrontPanelChange { input } => {
                self.current_input = Some(*input);
                self.audio_input = Some(*input);
                info!(%input, "front panel changed input");
            }
            Message::ReconfigNotice => {
                info!("audio levels changed from the front panel");
            }
            Message::ErrorResponse(DeviceError::BlockedByAutoMode) => {
                warn!("device rejected input change: auto-switch mode is active (E06)");
            }
            Message::ErrorResponse(DeviceError::Other(code)) => {
                warn!(code = %code, "device reported an error");
            }
            Message::Unrecognized(line) => {
                debug!(line = %line, "unhandled message from device");
            }
        }

        *self != before
    }

    /// Optimistic mode write. Returns whether the mode changed.
    pub fn set_auto_mode(&mut self, enable: bool) -> bool {
        std::mem::replace(&mut self.auto_mode, enable) != enable
    }

    /// Returns whether availability changed.
    pub fn set_available(&mut self, available: bool) -> bool {
        std::mem::replace(&mut self.available, available) != available
    }

    /// True while an optimistic mode write has not been confirmed by a
    /// status dump.
    pub fn auto_mode_pending(&self) -> bool {
        self.confirmed_auto_mode != Some(self.auto_mode)
    }
}

/// When to emit [`SwitcherEvent::StateChanged`] after a received message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotifyPolicy {
    /// After every classified message, including ones that changed nothing.
    #[default]
    EveryMessage,
    /// Only when a message changed at least one field.
    OnChange,
}

impl NotifyPolicy {
    pub fn should_notify(self, changed: bool) -> bool {
        match self {
            NotifyPolicy::EveryMessage => true,
            NotifyPolicy::OnChange => changed,
        }
    }
}

/// Working copy of the state owned by the IO task. Publishes snapshots
/// and emits notifications.
pub(crate) struct StateTracker {
    state: SwitcherState,
    state_tx: Arc<watch::Sender<SwitcherState>>,
    event_tx: broadcast::Sender<SwitcherEvent>,
    policy: NotifyPolicy,
}

impl StateTracker {
    pub fn new(
        state_tx: Arc<watch::Sender<SwitcherState>>,
        event_tx: broadcast::Sender<SwitcherEvent>,
        policy: NotifyPolicy,
    ) -> Self {
        let state = state_tx.borrow().clone();
        Self {
            state,
            state_tx,
            event_tx,
            policy,
        }
    }

    pub fn state(&self) -> &SwitcherState {
        &self.state
    }

    /// Classify and apply one framed line.
    pub fn handle_line(&mut self, line: &str) {
        let Some(message) = classify(line) else {
            return;
        };
        debug!(?message, "received from device");
        let changed = self.state.apply(&message);
        self.publish(changed);
        if self.policy.should_notify(changed) {
            self.notify(SwitcherEvent::StateChanged);
        }
    }

    pub fn set_auto_mode(&mut self, enable: bool) {
        let changed = self.state.set_auto_mode(enable);
        self.publish(changed);
        if changed {
            self.notify(SwitcherEvent::StateChanged);
        }
    }

    /// The stream failed underneath the IO task.
    pub fn connection_lost(&mut self) {
        let changed = self.state.set_available(false);
        self.publish(changed);
        self.notify(SwitcherEvent::StateChanged);
        self.notify(SwitcherEvent::Disconnected);
    }

    fn publish(&self, changed: bool) {
        if changed {
            self.state_tx.send_replace(self.state.clone());
        }
    }

    fn notify(&self, event: SwitcherEvent) {
        let _ = self.event_tx.send(event);
    }
}
