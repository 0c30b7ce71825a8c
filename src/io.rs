//! IO task: single tokio task owns the stream and the working switcher state.
//!
//! The loop selects (biased) over the stop token, controller requests, and a
//! one-byte read bounded by the read timeout. Requests are written in arrival
//! order, so commands from concurrent callers never interleave on the wire.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{Command, LineFramer};
use crate::state::StateTracker;
use crate::types::Input;

/// Bound on the graceful stream shutdown once the loop has exited.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// A request sent to the IO task. Each is acknowledged once handled;
/// write failures are logged by the task, not reported back.
#[derive(Debug)]
pub(crate) enum Request {
    /// Write one command.
    Send {
        command: Command,
        reply: oneshot::Sender<()>,
    },
    /// Leave auto mode if needed, then select `input`.
    SelectInput {
        input: Input,
        reply: oneshot::Sender<()>,
    },
    /// Write the mode command and record the mode optimistically.
    SetAutoMode {
        enable: bool,
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable sender side used by controller operations.
#[derive(Clone)]
pub(crate) struct CommandSender {
    tx: mpsc::Sender<Request>,
    timeout: Duration,
}

impl CommandSender {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.request(|reply| Request::Send { command, reply }).await
    }

    pub async fn select_input(&self, input: Input) -> Result<()> {
        self.request(|reply| Request::SelectInput { input, reply })
            .await
    }

    pub async fn set_auto_mode(&self, enable: bool) -> Result<()> {
        self.request(|reply| Request::SetAutoMode { enable, reply })
            .await
    }

    async fn request(&self, build: impl FnOnce(oneshot::Sender<()>) -> Request) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| Error::NotConnected)?;

        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::NotConnected),
            Err(_) => Err(Error::Timeout),
        }
    }
}

/// One open connection: the IO task plus its stop signal. Not reusable
/// once closed.
pub(crate) struct Connection {
    tx: mpsc::Sender<Request>,
    cancel: CancellationToken,
    task: JoinHandle<Exit>,
    command_timeout: Duration,
}

impl Connection {
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            tx: self.tx.clone(),
            timeout: self.command_timeout,
        }
    }

    /// False once the stream failed or a stop was requested.
    pub fn is_alive(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    /// Stop the IO task, waiting up to `join_timeout` before aborting it.
    /// The stream is closed either way.
    ///
    /// Returns false if the task had already reported the link as lost.
    pub async fn close(mut self, join_timeout: Duration) -> bool {
        self.cancel.cancel();
        match tokio::time::timeout(join_timeout, &mut self.task).await {
            Ok(Ok(exit)) => {
                debug!(?exit, "IO task joined");
                exit == Exit::Stopped
            }
            Ok(Err(e)) => {
                warn!("IO task ended abnormally: {e}");
                true
            }
            Err(_) => {
                warn!(?join_timeout, "IO task did not stop in time, aborting");
                self.task.abort();
                true
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn the IO task that owns `port` and `tracker`.
pub(crate) fn spawn_io_task<P>(
    port: P,
    tracker: StateTracker,
    read_timeout: Duration,
    command_timeout: Duration,
) -> Connection
where
    P: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::channel::<Request>(32);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(io_loop(port, rx, cancel.clone(), tracker, read_timeout));

    Connection {
        tx,
        cancel,
        task,
        command_timeout,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// Stop requested by the owner.
    Stopped,
    /// The stream failed or reached EOF.
    Lost,
}

async fn io_loop<P>(
    mut port: P,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
    mut tracker: StateTracker,
    read_timeout: Duration,
) -> Exit
where
    P: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    debug!("IO task started");
    let mut framer = LineFramer::new();
    let mut byte = [0u8; 1];

    let exit = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("IO task cancelled");
                break Exit::Stopped;
            }

            req = rx.recv() => {
                match req {
                    Some(req) => handle_request(req, &mut port, &mut tracker).await,
                    None => {
                        debug!("request channel closed");
                        break Exit::Stopped;
                    }
                }
            }

            read = tokio::time::timeout(read_timeout, port.read(&mut byte)) => {
                match read {
                    // Idle line; loop around and re-check the stop signal.
                    Err(_) => {}
                    Ok(Ok(0)) => {
                        warn!("stream closed by device");
                        break Exit::Lost;
                    }
                    Ok(Ok(_)) => {
                        if let Some(line) = framer.push(byte[0]) {
                            tracker.handle_line(&line);
                        }
                    }
                    Ok(Err(e)) => {
                        error!("read error: {e}");
                        break Exit::Lost;
                    }
                }
            }
        }
    };

    // Publish before cancelling: once the link reads as dead the controller
    // may write the state itself.
    if exit == Exit::Lost {
        tracker.connection_lost();
        cancel.cancel();
    }
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, port.shutdown()).await;
    info!("switcher reader terminating");
    exit
}

async fn handle_request<P>(req: Request, port: &mut P, tracker: &mut StateTracker)
where
    P: AsyncWrite + Unpin,
{
    match req {
        Request::Send { command, reply } => {
            write_command(port, command).await;
            let _ = reply.send(());
        }
        Request::SelectInput { input, reply } => {
            if tracker.state().auto_mode {
                debug!("auto mode active, disabling it before selecting input");
                write_command(port, Command::SetAutoMode(false)).await;
                tracker.set_auto_mode(false);
            }
            write_command(port, Command::SelectInput(input)).await;
            let _ = reply.send(());
        }
        Request::SetAutoMode { enable, reply } => {
            write_command(port, Command::SetAutoMode(enable)).await;
            tracker.set_auto_mode(enable);
            info!(auto = enable, "set auto-switch mode");
            let _ = reply.send(());
        }
    }
}

/// Write one command. Failures are logged and the command is dropped.
async fn write_command<P>(port: &mut P, command: Command)
where
    P: AsyncWrite + Unpin,
{
    let data = command.encode();
    trace!("writing {} bytes: {:02X?}", data.len(), data);
    debug!(%command, "sending to device");

    let result = async {
        port.write_all(&data).await?;
        port.flush().await
    }
    .await;

    if let Err(e) = result {
        error!(%command, "failed to send command: {e}");
    }
}
