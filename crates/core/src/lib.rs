// doorkey: session replay and door unlock engine.
//
// Resolves SMS short links into a door id and vendor session cookie, keeps
// that session persisted and valid, performs the unlock request, and keeps
// a paired device in sync. The CLI crate wires these pieces together.

pub mod client;
pub mod connectivity;
pub mod cookies;
pub mod demo;
pub mod error;
pub mod fake_transport;
pub mod locale;
pub mod session;
pub mod store;
pub mod sync;
pub mod transport;
pub mod unlock;
pub mod walker;

pub use client::{BrowserClient, Exchange, FetchOptions, RedirectMode, RedirectStep};
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use cookies::{CookieJar, SESSION_COOKIE_NAME};
pub use error::{Result, SessionError, SyncError, TransportError, UnlockError};
pub use locale::{Language, LocaleState};
pub use session::{LinkRecord, Session, SessionEvent, SessionRepository, SessionService, UpdateOrigin};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use sync::{MemoryLink, PeerChannel, PeerEvent, SyncManager};
pub use transport::{HttpRequest, Method, RawResponse, ReqwestTransport, Transport};
pub use unlock::{CookieAttachment, EngineOptions, EngineStatus, UnlockEngine, UnlockOutcome, UnlockState, classify_unlock_response};
pub use walker::{DoorIdSource, RedirectWalker, Resolution};
