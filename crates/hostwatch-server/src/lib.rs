pub mod api;
pub mod auth;
pub mod error;
pub mod logging;
pub mod services;
pub mod state;

pub use error::ApiError;
pub use services::Services;
pub use state::AppState;
