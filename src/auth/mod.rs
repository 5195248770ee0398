mod credentials;
mod password;
mod session;

pub use credentials::{Credentials, MIN_SECRET_LEN, sanitize_username};
pub use password::{SecretHasher, constant_time_eq};
pub use session::{
    MemorySessions, RATE_LIMIT_MAX, RATE_LIMIT_WINDOW_SECS, SessionGuard, SessionState,
    SessionStore,
};
