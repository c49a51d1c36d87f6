//! Structured shutdown requests.
//!
//! Components never terminate the process themselves. They send a
//! [`ShutdownReason`] through a [`ShutdownHandle`]; the entry point waits
//! on the [`ShutdownSignal`] and picks the exit code.

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// An operator asked for it (admin API).
    Requested,
    /// Ctrl-C or a termination signal.
    Interrupted,
    /// A crash or an unrecoverable runtime-event failure.
    Fatal(String),
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => f.write_str("requested"),
            Self::Interrupted => f.write_str("interrupted"),
            Self::Fatal(message) => write!(f, "fatal: {message}"),
        }
    }
}

impl ShutdownReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Requested | Self::Interrupted => 0,
            Self::Fatal(_) => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: mpsc::UnboundedSender<ShutdownReason>,
}

impl ShutdownHandle {
    /// Returns `false` when nobody is listening anymore.
    pub fn request(&self, reason: ShutdownReason) -> bool {
        tracing::info!(reason = %reason, "shutdown requested");
        self.sender.send(reason).is_ok()
    }
}

#[derive(Debug)]
pub struct ShutdownSignal {
    receiver: mpsc::UnboundedReceiver<ShutdownReason>,
}

impl ShutdownSignal {
    /// First reason delivered. `None` once every handle is gone.
    pub async fn recv(&mut self) -> Option<ShutdownReason> {
        self.receiver.recv().await
    }
}

pub fn channel() -> (ShutdownHandle, ShutdownSignal) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ShutdownHandle { sender }, ShutdownSignal { receiver })
}
