//! Live viewer registry and fan-out.
//!
//! - `broadcast`: [`BroadcastHub`], the synchronized viewer registry.
//! - `session`: the per-viewer inbound/outbound task pair.

pub mod broadcast;
pub mod session;

pub use broadcast::{BroadcastHub, Frame, ViewerHandle, ViewerId};
pub use session::{run_session, DisconnectReason, InboundFrame};
