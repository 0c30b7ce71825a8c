//! Classification of received SIS lines.
//!
//! [`classify`] is a pure function over a closed set of [`Message`] variants;
//! applying them to state is the job of [`SwitcherState::apply`](crate::SwitcherState::apply).

use tracing::warn;

use crate::types::Input;

/// Error code the device sends when an input change is refused because
/// auto-switch mode is active.
pub const AUTO_MODE_BLOCKED: &str = "E06";

/// A classified line received from the switcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `In<n> All|Vid|Aud`: routing now points at `input`.
    InputConfirmation { input: Input, video: bool, audio: bool },
    /// Response to the `I` query.
    StatusDump(StatusDump),
    /// `C<n>`: input selected on the front panel (video and audio).
    FrontPanelChange { input: Input },
    /// `Reconfig`/`RECONFIG`: audio levels changed out of band.
    ReconfigNotice,
    /// `E0x`/`E1x` error response.
    ErrorResponse(DeviceError),
    /// Anything else, including prefixed lines whose number did not parse.
    Unrecognized(String),
}

/// Fields of a `V<n> A<n> F<n> QVER<ver> M<n>` status line. Fields that
/// were missing or failed to parse are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDump {
    pub video: Option<Input>,
    pub audio: Option<Input>,
    pub auto_mode: Option<bool>,
    pub firmware: Option<String>,
    pub input_count: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// `E06`: input change rejected while auto mode is active.
    BlockedByAutoMode,
    Other(String),
}

impl DeviceError {
    fn from_code(code: &str) -> Self {
        if code == AUTO_MODE_BLOCKED {
            DeviceError::BlockedByAutoMode
        } else {
            DeviceError::Other(code.to_string())
        }
    }

    pub fn code(&self) -> &str {
        match self {
            DeviceError::BlockedByAutoMode => AUTO_MODE_BLOCKED,
            DeviceError::Other(code) => code,
        }
    }
}

/// Classify one received line.
///
/// Returns `None` when the line is empty after trimming whitespace.
pub fn classify(line: &str) -> Option<Message> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(classify_line(line))
}

fn classify_line(line: &str) -> Message {
    if line.starts_with("In") || line.starts_with("IN") {
        return classify_input_confirmation(line);
    }
    if line.starts_with('V') && line.contains("QVER") {
        return Message::StatusDump(parse_status_dump(line));
    }
    if (line.starts_with('C') || line.starts_with('c')) && line.len() >= 2 {
        return match parse_input(&line[1..]) {
            Some(input) => Message::FrontPanelChange { input },
            None => unrecognized(line),
        };
    }
    if line.starts_with("Reconfig") || line.starts_with("RECONFIG") {
        return Message::ReconfigNotice;
    }
    if line.starts_with("E0") || line.starts_with("E1") {
        return Message::ErrorResponse(DeviceError::from_code(line));
    }
    Message::Unrecognized(line.to_string())
}

fn classify_input_confirmation(line: &str) -> Message {
    let all = line.contains("All");
    let video = all || line.contains("Vid");
    let audio = all || line.contains("Aud");
    if !video && !audio {
        // e.g. gain reports like `IN3 AUD=+7`; not tracked.
        return Message::Unrecognized(line.to_string());
    }

    let number = line[2..].split_whitespace().next().unwrap_or("");
    match parse_input(number) {
        Some(input) => Message::InputConfirmation {
            input,
            video,
            audio,
        },
        None => unrecognized(line),
    }
}

fn parse_status_dump(line: &str) -> StatusDump {
    let mut status = StatusDump::default();

    for token in line.split_whitespace() {
        if let Some(version) = token.strip_prefix("QVER") {
            status.firmware = Some(version.to_string());
        } else if let Some(n) = token.strip_prefix('V') {
            status.video = parse_field(line, "video", n);
        } else if let Some(n) = token.strip_prefix('A') {
            status.audio = parse_field(line, "audio", n);
        } else if let Some(mode) = token.strip_prefix('F') {
            status.auto_mode = Some(mode == "2");
        } else if let Some(n) = token.strip_prefix('M') {
            status.input_count = n.parse().ok();
        }
    }

    status
}

fn parse_field(line: &str, field: &str, value: &str) -> Option<Input> {
    let input = parse_input(value);
    if input.is_none() {
        warn!(line, field, value, "skipping unparsable status field");
    }
    input
}

fn parse_input(s: &str) -> Option<Input> {
    s.trim().parse::<u8>().ok().and_then(Input::new)
}

fn unrecognized(line: &str) -> Message {
    warn!(line, "could not parse input number from message");
    Message::Unrecognized(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(n: u8) -> Input {
        Input::new(n).unwrap()
    }

    #[test]
    fn test_input_confirmation_variants() {
        assert_eq!(
            classify("In5 All"),
            Some(Message::InputConfirmation {
                input: input(5),
                video: true,
                audio: true
            })
        );
        assert_eq!(
            classify("In2 Vid"),
            Some(Message::InputConfirmation {
                input: input(2),
                video: true,
                audio: false
            })
        );
        assert_eq!(
            classify("IN4 Aud"),
            Some(Message::InputConfirmation {
                input: input(4),
                video: false,
                audio: true
            })
        );
    }

    #[test]
    fn test_input_confirmation_bad_number() {
        assert_eq!(
            classify("InX All"),
            Some(Message::Unrecognized("InX All".into()))
        );
        assert_eq!(
            classify("In9 All"),
            Some(Message::Unrecognized("In9 All".into()))
        );
    }

    #[test]
    fn test_input_gain_report_is_unrecognized() {
        assert!(matches!(
            classify("IN3 AUD=+7"),
            Some(Message::Unrecognized(_))
        ));
    }

    #[test]
    fn test_status_dump() {
        let Some(Message::StatusDump(status)) = classify("V3 A3 F1 QVER1.23 M6") else {
            panic!("expected status dump");
        };
        assert_eq!(status.video, Some(input(3)));
        assert_eq!(status.audio, Some(input(3)));
        assert_eq!(status.auto_mode, Some(false));
        assert_eq!(status.firmware.as_deref(), Some("1.23"));
        assert_eq!(status.input_count, Some(6));
    }

    #[test]
    fn test_status_dump_auto_mode() {
        let Some(Message::StatusDump(status)) = classify("V1 A2 F2 QVER2.00 M6") else {
            panic!("expected status dump");
        };
        assert_eq!(status.auto_mode, Some(true));
        assert_eq!(status.audio, Some(input(2)));
    }

    #[test]
    fn test_status_dump_skips_bad_fields() {
        let Some(Message::StatusDump(status)) = classify("Vx A4 F0 QVER1.0") else {
            panic!("expected status dump");
        };
        assert_eq!(status.video, None);
        assert_eq!(status.audio, Some(input(4)));
        assert_eq!(status.auto_mode, Some(false));
        assert_eq!(status.firmware.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_v_without_qver_is_unrecognized() {
        assert!(matches!(classify("V3 A3"), Some(Message::Unrecognized(_))));
    }

    #[test]
    fn test_front_panel_change() {
        assert_eq!(
            classify("C4"),
            Some(Message::FrontPanelChange { input: input(4) })
        );
        assert_eq!(
            classify("c6"),
            Some(Message::FrontPanelChange { input: input(6) })
        );
        assert!(matches!(classify("Cz"), Some(Message::Unrecognized(_))));
        assert!(matches!(classify("C"), Some(Message::Unrecognized(_))));
    }

    #[test]
    fn test_reconfig() {
        assert_eq!(classify("Reconfig"), Some(Message::ReconfigNotice));
        assert_eq!(classify("RECONFIG"), Some(Message::ReconfigNotice));
    }

    #[test]
    fn test_error_responses() {
        assert_eq!(
            classify("E06"),
            Some(Message::ErrorResponse(DeviceError::BlockedByAutoMode))
        );
        let Some(Message::ErrorResponse(err)) = classify("E13") else {
            panic!("expected error response");
        };
        assert_eq!(err, DeviceError::Other("E13".into()));
        assert_eq!(err.code(), "E13");
        assert_eq!(DeviceError::BlockedByAutoMode.code(), "E06");
    }

    #[test]
    fn test_blank_lines() {
        assert_eq!(classify(""), None);
        assert_eq!(classify("   \t"), None);
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(
            classify("Qik"),
            Some(Message::Unrecognized("Qik".into()))
        );
    }
}
