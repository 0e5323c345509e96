//! Realtime push channel
//!
//! Best-effort live delivery layered over the mutation log. Pull remains the
//! correctness backstop, so nothing here touches the sync ledger.

pub mod broadcaster;
pub mod protocol;
pub mod registry;
pub mod session;

pub use broadcaster::{fan_out, spawn_broadcaster, FanOutStats};
pub use protocol::{AckPayload, ClientFrame, ClientMessage, ServerMessage};
pub use registry::{ConnectionHandle, ConnectionRegistry};
pub use session::{PushSession, SessionReply};
