//! Wire types for the doorkey peer sync channel.
//!
//! A primary device and its paired secondary exchange [`SyncMessage`]
//! payloads, framed as [`PeerFrame`]s on the WebSocket link. Nothing here
//! knows about session validity or persistence; that lives in `doorkey`.

pub mod frame;
pub mod sync;

pub use frame::*;
pub use sync::*;
