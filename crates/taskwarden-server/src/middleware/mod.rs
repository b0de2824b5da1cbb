pub mod auth;

pub use auth::{AuthState, DEV_USER_HEADER, rest_auth_middleware};
