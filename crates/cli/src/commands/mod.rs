//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod users;

use secrecy::SecretString;

/// Database URL from `SHOPFLOOR_DATABASE_URL`, falling back to `DATABASE_URL`.
///
/// Loads `.env` first if present.
fn database_url() -> Result<SecretString, &'static str> {
    dotenvy::dotenv().ok();

    std::env::var("SHOPFLOOR_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "SHOPFLOOR_DATABASE_URL not set")
}
