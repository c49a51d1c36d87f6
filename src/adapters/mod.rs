//! Control-plane implementations.

pub mod http_control_plane;
pub mod mock_control_plane;

pub use http_control_plane::HttpControlPlane;
pub use mock_control_plane::{ControlPlaneCall, MockControlPlane, MockControlPlaneState};
