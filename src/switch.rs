use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::event::SwitcherEvent;
use crate::state::SwitcherState;
use crate::types::DeviceIdentity;

/// Backend-agnostic control surface for an input switcher.
///
/// Implemented by [`Sw6Switcher`](crate::Sw6Switcher). This is what an
/// entity layer (input selector, auto-mode toggle) programs against.
#[async_trait]
pub trait VideoSwitcher: Send + Sync {
    /// Static device identity.
    fn identity(&self) -> &DeviceIdentity;

    /// Open the stream and start the reader. Errors are returned to the
    /// caller, who owns the retry policy.
    async fn connect(&self) -> Result<()>;

    /// Stop the reader and close the stream. Never fails.
    async fn disconnect(&self);

    /// Request a full status dump. The result arrives asynchronously.
    async fn query(&self);

    /// Route video and audio to `input` (1-6), leaving auto mode first if
    /// it is active.
    async fn set_input(&self, input: u8) -> Result<()>;

    /// Enable or disable auto-switch mode.
    async fn set_auto_mode(&self, enable: bool);

    /// Snapshot of the current state.
    fn state(&self) -> SwitcherState;

    /// Subscribe to switcher events.
    fn subscribe(&self) -> broadcast::Receiver<SwitcherEvent>;
}
