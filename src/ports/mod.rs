//! Contracts the runtime core consumes from external collaborators.

pub mod control_plane;
pub mod runtime_protocol;

pub use control_plane::{ControlPlaneDecision, ControlPlanePort, StepProposal, StepResult};
pub use runtime_protocol::{
    HeartbeatPayload, HeartbeatStatus, PROTOCOL_VERSION, RegisterPayload, RuntimeEvent,
    RuntimeEventKind, WatchdogError, WatchdogPayload, WatchdogStatus,
};
