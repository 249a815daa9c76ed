//! User inspection commands.

use tracing::info;

use shopfloor_api::db::{self, PgStore, UserStore};

/// Log every user, newest first.
///
/// # Errors
///
/// Returns an error if the database URL is missing or the query fails.
pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    let store = PgStore::new(pool);

    let users = store.list_users().await?;
    info!("Users: {}", users.len());
    for user in &users {
        info!(
            "  {} | {} | {} | {} | created {}",
            user.id,
            user.external_id,
            user.email,
            user.name,
            user.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}
