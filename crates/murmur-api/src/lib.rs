pub mod auth;
pub mod comments;
pub mod error;
pub mod extract;
pub mod health;
pub mod middleware;
pub mod posts;
pub mod routes;
pub mod state;
pub mod users;
pub mod validation;

pub use error::ApiError;
pub use routes::{router, with_request_timeout};
pub use state::{AppState, AppStateInner, AuthConfig};
pub use validation::RequestValidator;
