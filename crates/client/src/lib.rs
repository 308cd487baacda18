//! Typed client for the muro media organizer API: a thin data layer over
//! the REST surface plus the ordering controller that keeps a page's
//! resource list in sync with the server.

pub mod api;
pub mod error;
pub mod ordering;
pub mod session;
pub mod wire;

pub use api::ApiClient;
pub use error::ApiError;
pub use ordering::{PageList, ResourceList};
pub use session::{SessionContext, SessionState, SessionTokens};
