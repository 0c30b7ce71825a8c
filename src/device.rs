use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::event::SwitcherEvent;
use crate::io::{CommandSender, Connection, spawn_io_task};
use crate::protocol::Command;
use crate::state::{NotifyPolicy, StateTracker, SwitcherState};
use crate::switch::VideoSwitcher;
use crate::transport::{self, DeviceAddress, LinkSettings};
use crate::types::{DeviceIdentity, Input};

/// Controller-level options, set through [`SwitcherBuilder`](crate::SwitcherBuilder).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ControllerOptions {
    pub join_timeout: Duration,
    pub command_timeout: Duration,
    pub query_on_connect: bool,
    pub notify: NotifyPolicy,
}

/// An Extron SW6 switcher reached over serial or a TCP tunnel.
///
/// Implements [`VideoSwitcher`]. Created via [`SwitcherBuilder`](crate::SwitcherBuilder);
/// the same instance can be connected and disconnected repeatedly, each
/// connect opening a fresh stream.
pub struct Sw6Switcher {
    address: DeviceAddress,
    link: LinkSettings,
    options: ControllerOptions,
    identity: DeviceIdentity,
    connection: Mutex<Option<Connection>>,
    state_tx: Arc<watch::Sender<SwitcherState>>,
    event_tx: broadcast::Sender<SwitcherEvent>,
}

impl Sw6Switcher {
    pub(crate) fn new(
        address: DeviceAddress,
        link: LinkSettings,
        options: ControllerOptions,
    ) -> Self {
        let (state_tx, _) = watch::channel(SwitcherState::default());
        let (event_tx, _) = broadcast::channel(64);
        Self {
            identity: DeviceIdentity::sw6(address.url()),
            address,
            link,
            options,
            connection: Mutex::new(None),
            state_tx: Arc::new(state_tx),
            event_tx,
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Receiver that always holds the latest state snapshot.
    pub fn watch(&self) -> watch::Receiver<SwitcherState> {
        self.state_tx.subscribe()
    }

    /// Connect over a pre-opened stream (for testing with MockPort, or for
    /// callers that open the stream themselves).
    pub async fn connect_with_port<P>(&self, port: P)
    where
        P: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let mut guard = self.connection.lock().await;
        if let Some(stale) = guard.take() {
            stale.close(self.options.join_timeout).await;
        }
        *guard = Some(self.spawn_connection(port));
        drop(guard);
        self.connected().await;
    }

    fn spawn_connection<P>(&self, port: P) -> Connection
    where
        P: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        // No IO task is running here, so the controller is the only writer.
        self.state_tx.send_if_modified(|state| state.set_available(true));
        let tracker = StateTracker::new(
            self.state_tx.clone(),
            self.event_tx.clone(),
            self.options.notify,
        );
        spawn_io_task(
            port,
            tracker,
            self.link.read_timeout,
            self.options.command_timeout,
        )
    }

    async fn connected(&self) {
        info!(address = %self.address, "connected to switcher");
        self.emit(SwitcherEvent::Connected);
        self.emit(SwitcherEvent::StateChanged);
        if self.options.query_on_connect {
            debug!("querying initial status");
            self.query().await;
        }
    }

    /// Sender for the live connection, if any.
    async fn sender(&self) -> Option<CommandSender> {
        self.connection
            .lock()
            .await
            .as_ref()
            .filter(|conn| conn.is_alive())
            .map(Connection::sender)
    }

    /// Mutate the published state directly. Only valid while no IO task
    /// owns the state.
    fn apply_local(&self, update: impl FnOnce(&mut SwitcherState) -> bool) {
        if self.state_tx.send_if_modified(update) {
            self.emit(SwitcherEvent::StateChanged);
        }
    }

    fn emit(&self, event: SwitcherEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[async_trait]
impl VideoSwitcher for Sw6Switcher {
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    async fn connect(&self) -> Result<()> {
        let mut guard = self.connection.lock().await;
        if guard.as_ref().is_some_and(Connection::is_alive) {
            debug!(address = %self.address, "already connected");
            return Ok(());
        }
        if let Some(stale) = guard.take() {
            stale.close(self.options.join_timeout).await;
        }

        let port = transport::open(&self.address, &self.link)
            .await
            .inspect_err(|e| error!(address = %self.address, "failed to connect: {e}"))?;
        *guard = Some(self.spawn_connection(port));
        drop(guard);

        self.connected().await;
        Ok(())
    }

    async fn disconnect(&self) {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.take() {
            info!(address = %self.address, "disconnecting from switcher");
            if conn.close(self.options.join_timeout).await {
                self.emit(SwitcherEvent::Disconnected);
            }
        }
        // Still under the lock, so a concurrent connect is never marked down.
        self.apply_local(|state| state.set_available(false));
    }

    async fn query(&self) {
        let Some(sender) = self.sender().await else {
            warn!("not connected, dropping status query");
            return;
        };
        if let Err(e) = sender.send(Command::Query).await {
            warn!("status query not delivered: {e}");
        }
    }

    async fn set_input(&self, input: u8) -> Result<()> {
        let input = Input::new(input).ok_or_else(|| {
            error!(input, "input number out of range 1-6");
            Error::InvalidInput(input)
        })?;

        let result = match self.sender().await {
            Some(sender) => sender.select_input(input).await,
            None => Err(Error::NotConnected),
        };
        match result {
            Ok(()) => {}
            Err(Error::NotConnected) => {
                warn!(%input, "not connected, dropping input selection");
                self.apply_local(|state| state.set_auto_mode(false));
            }
            Err(e) => warn!(%input, "input selection not acknowledged: {e}"),
        }
        Ok(())
    }

    async fn set_auto_mode(&self, enable: bool) {
        let result = match self.sender().await {
            Some(sender) => sender.set_auto_mode(enable).await,
            None => Err(Error::NotConnected),
        };
        match result {
            Ok(()) => {}
            Err(Error::NotConnected) => {
                warn!(auto = enable, "not connected, dropping mode command");
                self.apply_local(|state| state.set_auto_mode(enable));
            }
            Err(e) => warn!(auto = enable, "mode command not acknowledged: {e}"),
        }
    }

    fn state(&self) -> SwitcherState {
        self.state_tx.borrow().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<SwitcherEvent> {
        self.event_tx.subscribe()
    }
}

impl Sw6Switcher {
    /// Get a reference to the device identity.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SwitcherState {
        self.state_tx.borrow().clone()
    }
}
