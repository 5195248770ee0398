mod dto;
mod handlers;
mod payload;
mod response;
mod router;
mod session;
mod validation;

pub use router::{AppState, create_router};
pub use session::{SESSION_COOKIE, SessionContext};
