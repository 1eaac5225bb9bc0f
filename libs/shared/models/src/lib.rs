pub mod auth;
pub mod error;

pub use auth::{ActorContext, Role, User};
pub use error::AppError;
