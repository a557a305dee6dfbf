//! Cross-device session sync: peer channel abstraction, request coalescing
//! and the manager tying them to the session service.

mod channel;
mod coalesce;
mod manager;
mod payload;

pub use channel::{MemoryEndpoint, MemoryLink, MemoryPeer, PeerChannel, PeerEvent};
pub use coalesce::{Coalescer, Join, Waiter};
pub use manager::{REQUEST_TIMEOUT, SyncManager};
pub use payload::{session_from_message, session_message};
