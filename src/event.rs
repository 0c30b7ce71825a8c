/// Notifications emitted by a switcher.
///
/// `StateChanged` carries no payload; subscribers re-read the state through
/// [`Sw6Switcher::state()`](crate::Sw6Switcher::state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitcherEvent {
    /// State was updated (or a message was processed, depending on the
    /// [`NotifyPolicy`](crate::NotifyPolicy)).
    StateChanged,
    /// Connected to the device.
    Connected,
    /// Disconnected from the device, either on request or because the
    /// stream failed.
    Disconnected,
}
