pub mod gateway;
pub mod runtime_events;

pub use gateway::{AppState, run_gateway, run_gateway_with_listener};
pub use runtime_events::{RUNTIME_TOKEN_ENV, RuntimeEventClient};
