//! Session state and identity management

pub mod identity;
pub mod persist;
pub mod store;

pub use identity::{Identity, Profile, Role};
pub use persist::{FileStorage, MemoryStorage, PersistedSession, ProjectionStorage};
pub use store::{SessionSnapshot, SessionStore};
