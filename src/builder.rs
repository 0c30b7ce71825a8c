//! SwitcherBuilder: configure and connect to an SW6 switcher.

use std::time::Duration;

use crate::device::{ControllerOptions, Sw6Switcher};
use crate::error::Result;
use crate::state::NotifyPolicy;
use crate::switch::VideoSwitcher;
use crate::transport::{DeviceAddress, LinkSettings};

pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for an SW6 switcher.
///
/// # Example
///
/// ```no_run
/// # use extron_sw6::{SwitcherBuilder, VideoSwitcher};
/// # async fn example() -> extron_sw6::Result<()> {
/// let switcher = SwitcherBuilder::new("tcp://10.0.0.20:4001")
///     .connect()
///     .await?;
/// switcher.set_input(3).await?;
/// # Ok(())
/// # }
/// ```
pub struct SwitcherBuilder {
    address: String,
    link: LinkSettings,
    join_timeout: Duration,
    command_timeout: Duration,
    query_on_connect: bool,
    notify: NotifyPolicy,
}

impl SwitcherBuilder {
    /// Create a builder for a serial device path or `tcp://host:port`.
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            link: LinkSettings::default(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            query_on_connect: true,
            notify: NotifyPolicy::default(),
        }
    }

    /// Serial baud rate (default: 9600).
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.link.baud_rate = baud_rate;
        self
    }

    /// Per-read timeout; the idle reader re-checks its stop signal at this
    /// interval (default: 1s).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.link.read_timeout = timeout;
        self
    }

    /// TCP connect timeout (default: 5s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.link.connect_timeout = timeout;
        self
    }

    /// How long disconnect waits for the reader before aborting it
    /// (default: 2s).
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// How long an operation waits for the IO task to handle it (default: 5s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Whether to send a status query right after connecting (default: true).
    pub fn query_on_connect(mut self, enabled: bool) -> Self {
        self.query_on_connect = enabled;
        self
    }

    /// When to notify subscribers after a received message
    /// (default: [`NotifyPolicy::EveryMessage`]).
    pub fn notify_policy(mut self, policy: NotifyPolicy) -> Self {
        self.notify = policy;
        self
    }

    /// Validate the address and create a disconnected switcher.
    pub fn build(self) -> Result<Sw6Switcher> {
        let address = DeviceAddress::parse(&self.address)?;
        Ok(Sw6Switcher::new(
            address,
            self.link,
            ControllerOptions {
                join_timeout: self.join_timeout,
                command_timeout: self.command_timeout,
                query_on_connect: self.query_on_connect,
                notify: self.notify,
            },
        ))
    }

    /// Build and connect.
    pub async fn connect(self) -> Result<Sw6Switcher> {
        let switcher = self.build()?;
        switcher.connect().await?;
        Ok(switcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_rejects_bad_address() {
        assert!(SwitcherBuilder::new("").build().is_err());
        assert!(SwitcherBuilder::new("tcp://host:99999").build().is_err());
    }

    #[test]
    fn build_starts_disconnected() {
        let switcher = SwitcherBuilder::new("tcp://10.0.0.20:4001").build().unwrap();
        assert!(!switcher.state().available);
        assert_eq!(switcher.identity().identifier, "socket://10.0.0.20:4001");
        assert_eq!(switcher.identity().manufacturer, "Extron");
    }
}
