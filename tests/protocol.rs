use extron_sw6::{Command, DeviceError, Input, LineFramer, Message, SwitcherState, classify};

fn input(n: u8) -> Input {
    Input::new(n).unwrap()
}

fn state_after(lines: &[&str]) -> SwitcherState {
    let mut state = SwitcherState::default();
    let mut framer = LineFramer::new();
    for line in lines {
        for framed in framer.push_all(format!("{line}\r").as_bytes()) {
            if let Some(message) = classify(&framed) {
                state.apply(&message);
            }
        }
    }
    state
}

#[test]
fn select_commands_for_every_input() {
    for n in Input::all() {
        assert_eq!(
            Command::SelectInput(n).encode(),
            format!("{}!\r", n.get()).into_bytes()
        );
    }
}

#[test]
fn mode_and_query_commands() {
    assert_eq!(Command::Query.encode(), b"I\r");
    assert_eq!(Command::SetAutoMode(false).encode(), b"F1\r");
    assert_eq!(Command::SetAutoMode(true).encode(), b"F2\r");
}

#[test]
fn input_confirmation_routing() {
    let state = state_after(&["In5 All"]);
    assert_eq!(state.current_input, Some(input(5)));
    assert_eq!(state.audio_input, Some(input(5)));

    let state = state_after(&["In2 Vid"]);
    assert_eq!(state.current_input, Some(input(2)));
    assert_eq!(state.audio_input, None);

    let state = state_after(&["In4 Aud"]);
    assert_eq!(state.current_input, None);
    assert_eq!(state.audio_input, Some(input(4)));
}

#[test]
fn full_status_dump() {
    let state = state_after(&["V3 A3 F1 QVER1.23 M6"]);
    assert_eq!(state.current_input, Some(input(3)));
    assert_eq!(state.audio_input, Some(input(3)));
    assert!(!state.auto_mode);
    assert_eq!(state.firmware_version.as_deref(), Some("1.23"));
}

#[test]
fn front_panel_selection() {
    let state = state_after(&["C4"]);
    assert_eq!(state.current_input, Some(input(4)));
    assert_eq!(state.audio_input, Some(input(4)));
}

#[test]
fn auto_mode_error_is_distinguished() {
    assert_eq!(
        classify("E06"),
        Some(Message::ErrorResponse(DeviceError::BlockedByAutoMode))
    );
    assert_eq!(state_after(&["E06"]), SwitcherState::default());
}

#[test]
fn later_messages_override_earlier_ones() {
    let state = state_after(&["V1 A1 F2 QVER1.0 M6", "C6", "In2 Vid"]);
    assert_eq!(state.current_input, Some(input(2)));
    assert_eq!(state.audio_input, Some(input(6)));
    assert!(state.auto_mode);
    assert_eq!(state.firmware_version.as_deref(), Some("1.0"));
}

#[test]
fn replaying_lines_is_idempotent() {
    let lines = ["V3 A3 F1 QVER1.23 M6", "In5 All", "C4", "Reconfig", "E06"];
    for line in lines {
        assert_eq!(state_after(&[line]), state_after(&[line, line]), "{line}");
    }
}

#[test]
fn noise_is_unrecognized() {
    assert_eq!(classify("\r\n"), None);
    assert!(matches!(classify("Vid? "), Some(Message::Unrecognized(_))));
    assert!(matches!(classify("E2"), Some(Message::Unrecognized(_))));
}

#[test]
fn overlong_line_does_not_leak_a_message() {
    let long = format!("{}C2", "x".repeat(300));
    assert_eq!(state_after(&[long.as_str()]), SwitcherState::default());

    let state = state_after(&[long.as_str(), "C2"]);
    assert_eq!(state.current_input, Some(input(2)));
}
