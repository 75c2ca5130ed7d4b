//! Application services that sit beside the repositories

pub mod auth;
pub mod bootstrap;
pub mod password_reset;

pub use auth::{AuthConfig, AuthService};
pub use bootstrap::ensure_first_superuser;
pub use password_reset::{DiscardDelivery, ResetTokenDelivery};
