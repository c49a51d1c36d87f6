//! Process-level concerns: runtime-event reporting and shutdown signalling.

pub mod heartbeat;
pub mod shutdown;
pub mod watchdog;

pub use heartbeat::{HeartbeatTask, start_heartbeat};
pub use shutdown::{ShutdownHandle, ShutdownReason, ShutdownSignal};
pub use watchdog::{PanicHookGuard, Watchdog};
