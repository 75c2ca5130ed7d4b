//! Startup data seeding

use tracing::info;

use crate::config::Config;
use crate::db::{Database, RepositoryError, UserCreate};

/// Create the configured first superuser unless an account with that email
/// already exists. Returns whether a user was created.
pub async fn ensure_first_superuser(db: &Database, config: &Config) -> Result<bool, RepositoryError> {
    let users = db.users();
    if users.get_by_email(&config.first_superuser).await?.is_some() {
        return Ok(false);
    }

    let input = UserCreate {
        email: config.first_superuser.clone(),
        password: config.first_superuser_password.clone(),
        full_name: None,
        is_active: Some(true),
        is_superuser: Some(true),
    };
    let user = users.create(input.into_field_map()).await?;
    info!(service = "bootstrap", user_id = %user.id, email = %user.email, "First superuser created");
    Ok(true)
}
