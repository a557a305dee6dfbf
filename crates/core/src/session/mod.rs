//! Session model, persistence and the process-wide session service.

mod model;
mod repository;
mod service;

pub use model::{LinkRecord, Session, expiry_from_epoch, expiry_to_epoch, normalize_host};
pub use repository::{COOKIE_PREFIX, SESSION_PREFIX, SessionRepository};
pub use service::{SessionEvent, SessionService, UpdateOrigin};
