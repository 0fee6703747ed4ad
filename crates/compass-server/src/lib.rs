pub mod error;
pub mod identity;
pub mod rituals;
pub mod server;
pub mod wants;

pub use error::ApiError;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
