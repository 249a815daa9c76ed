//! Users, addresses and wishlists.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shopfloor_core::{AddressId, Email, ExternalUserId, ProductId, UserId};

use super::PgStore;
use super::products::ProductRow;
use crate::db::{RepositoryError, UserStore, conflict_on_unique};
use crate::models::{Address, AddressPatch, NewAddress, Product, User, UserProfile};

const USER_COLUMNS: &str = "id, external_id, name, email, image_url, created_at, updated_at";

const ADDRESS_COLUMNS: &str = "id, label, full_name, street_address, city, state, zip_code, \
                               phone_number, is_default";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    external_id: String,
    name: String,
    email: String,
    image_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let external_id = ExternalUserId::parse(&row.external_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid external id in database: {e}"))
        })?;
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            external_id,
            name: row.name,
            email,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    label: String,
    full_name: String,
    street_address: String,
    city: String,
    state: String,
    zip_code: String,
    phone_number: String,
    is_default: bool,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            label: row.label,
            full_name: row.full_name,
            street_address: row.street_address,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
            phone_number: row.phone_number,
            is_default: row.is_default,
        }
    }
}

impl PgStore {
    async fn wishlist_ids(&self, user_id: UserId) -> Result<Vec<ProductId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, ProductId>(
            r"
            SELECT product_id FROM wishlist_items
            WHERE user_id = $1
            ORDER BY created_at, product_id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(ids)
    }
}

/// Lock the user row so default-address swaps for one user run one at a time.
///
/// Returns `NotFound` if the user does not exist.
async fn lock_user(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query_scalar::<_, i32>("SELECT 1 FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .map(|_| ())
        .ok_or(RepositoryError::NotFound)
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_external_id(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE external_id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(external_id.as_str())
            .fetch_optional(self.pool())
            .await?;

        row.map(User::try_from).transpose()
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<User, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO users (external_id, name, email, image_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (external_id) DO UPDATE
            SET name = EXCLUDED.name,
                email = EXCLUDED.email,
                image_url = EXCLUDED.image_url,
                updated_at = now()
            RETURNING {USER_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(profile.external_id.as_str())
            .bind(&profile.name)
            .bind(profile.email.as_str())
            .bind(&profile.image_url)
            .fetch_one(self.pool())
            .await
            .map_err(|e| conflict_on_unique(e, "email already exists"))?;

        User::try_from(row)
    }

    async fn delete_user_by_external_id(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<bool, RepositoryError> {
        // Orders keep their rows; the foreign key clears `orders.user_id`.
        let result = sqlx::query("DELETE FROM users WHERE external_id = $1")
            .bind(external_id.as_str())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn list_addresses(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY id");
        let rows = sqlx::query_as::<_, AddressRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    async fn add_address(
        &self,
        user_id: UserId,
        address: &NewAddress,
    ) -> Result<Vec<Address>, RepositoryError> {
        let mut tx = self.pool().begin().await?;
        lock_user(&mut tx, user_id).await?;

        if address.is_default {
            sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r"
            INSERT INTO addresses
                (user_id, label, full_name, street_address, city, state, zip_code,
                 phone_number, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(user_id)
        .bind(&address.label)
        .bind(&address.full_name)
        .bind(&address.street_address)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip_code)
        .bind(&address.phone_number)
        .bind(address.is_default)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.list_addresses(user_id).await
    }

    async fn update_address(
        &self,
        user_id: UserId,
        address_id: AddressId,
        patch: &AddressPatch,
    ) -> Result<Vec<Address>, RepositoryError> {
        let mut tx = self.pool().begin().await?;
        lock_user(&mut tx, user_id).await?;

        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND user_id = $2 FOR UPDATE"
        );
        let mut address: Address = sqlx::query_as::<_, AddressRow>(&sql)
            .bind(address_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?
            .into();

        patch.apply(&mut address);

        if address.is_default {
            sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND id <> $2")
                .bind(user_id)
                .bind(address_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r"
            UPDATE addresses
            SET label = $2, full_name = $3, street_address = $4, city = $5, state = $6,
                zip_code = $7, phone_number = $8, is_default = $9
            WHERE id = $1
            ",
        )
        .bind(address_id)
        .bind(&address.label)
        .bind(&address.full_name)
        .bind(&address.street_address)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip_code)
        .bind(&address.phone_number)
        .bind(address.is_default)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.list_addresses(user_id).await
    }

    async fn delete_address(
        &self,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<Vec<Address>, RepositoryError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(address_id)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.list_addresses(user_id).await
    }

    async fn wishlist_products(&self, user_id: UserId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT p.*
            FROM wishlist_items w
            JOIN products p ON p.id = w.product_id
            WHERE w.user_id = $1
            ORDER BY w.created_at, p.id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Vec<ProductId>, RepositoryError> {
        sqlx::query("INSERT INTO wishlist_items (user_id, product_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::NotFound;
                }
                conflict_on_unique(e, "product already in wishlist")
            })?;

        self.wishlist_ids(user_id).await
    }

    async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Vec<ProductId>, RepositoryError> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.wishlist_ids(user_id).await
    }
}
