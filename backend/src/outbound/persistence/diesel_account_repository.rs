//! PostgreSQL-backed `AccountRepository` adapter using Diesel.
//!
//! Uniqueness is ultimately enforced by the database's unique indexes on
//! login and email; a duplicate insert racing past the pipeline's pre-checks
//! comes back from commit as `UniqueViolation`, which the domain maps to the
//! same rejection class as a failed pre-check.

use std::collections::BTreeSet;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{AccountPersistenceError, AccountRepository, PageRequest};
use crate::domain::{Account, AccountId, EmailAddress, Login};

use super::account_persistence_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{AccountChangeset, AccountRow, authority_rows};
use super::pool::DbPool;
use super::schema::{account_authorities, accounts, authorities};

/// Diesel-backed implementation of the `AccountRepository` port.
#[derive(Clone)]
pub struct DieselAccountRepository {
    pool: DbPool,
}

impl DieselAccountRepository {
    /// Create a new repository over the given connection pool.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_authorities(
        conn: &mut AsyncPgConnection,
        account_id: Uuid,
    ) -> Result<BTreeSet<String>, AccountPersistenceError> {
        let names: Vec<String> = account_authorities::table
            .filter(account_authorities::account_id.eq(account_id))
            .select(account_authorities::authority)
            .load(conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(names.into_iter().collect())
    }

    async fn hydrate(
        conn: &mut AsyncPgConnection,
        row: Option<AccountRow>,
    ) -> Result<Option<Account>, AccountPersistenceError> {
        match row {
            Some(row) => {
                let granted = Self::load_authorities(conn, row.id).await?;
                row.into_account(granted).map(Some)
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AccountRepository for DieselAccountRepository {
    async fn find_by_login(
        &self,
        login: &Login,
    ) -> Result<Option<Account>, AccountPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<AccountRow> = accounts::table
            .filter(accounts::login.eq(login.as_ref()))
            .select(AccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Self::hydrate(&mut conn, row).await
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<Account>, AccountPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<AccountRow> = accounts::table
            .filter(accounts::email.eq(email.as_ref()))
            .select(AccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Self::hydrate(&mut conn, row).await
    }

    async fn find_by_id(
        &self,
        id: &AccountId,
    ) -> Result<Option<Account>, AccountPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<AccountRow> = accounts::table
            .find(*id.as_uuid())
            .select(AccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Self::hydrate(&mut conn, row).await
    }

    async fn find_by_activation_key(
        &self,
        key: &str,
    ) -> Result<Option<Account>, AccountPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<AccountRow> = accounts::table
            .filter(accounts::activation_key.eq(key))
            .select(AccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Self::hydrate(&mut conn, row).await
    }

    async fn find_by_reset_key(
        &self,
        key: &str,
    ) -> Result<Option<Account>, AccountPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<AccountRow> = accounts::table
            .filter(accounts::reset_key.eq(key))
            .select(AccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Self::hydrate(&mut conn, row).await
    }

    async fn create(&self, account: &Account) -> Result<Account, AccountPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = AccountRow::from_account(account);
        let granted = authority_rows(account);

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                diesel::insert_into(accounts::table)
                    .values(&row)
                    .execute(conn)
                    .await?;
                diesel::insert_into(account_authorities::table)
                    .values(&granted)
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)?;

        debug!(login = %account.login, "account row created");
        Ok(account.clone())
    }

    async fn update(&self, account: &Account) -> Result<Option<Account>, AccountPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let id = *account.id.as_uuid();
        let changeset = AccountChangeset::from_account(account);
        let granted = authority_rows(account);

        let found = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    let affected = diesel::update(accounts::table.find(id))
                        .set(&changeset)
                        .execute(conn)
                        .await?;
                    if affected == 0 {
                        return Ok(false);
                    }
                    diesel::delete(
                        account_authorities::table
                            .filter(account_authorities::account_id.eq(id)),
                    )
                    .execute(conn)
                    .await?;
                    diesel::insert_into(account_authorities::table)
                        .values(&granted)
                        .execute(conn)
                        .await?;
                    Ok(true)
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        Ok(found.then(|| account.clone()))
    }

    async fn delete_by_login(&self, login: &Login) -> Result<(), AccountPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let login_value = login.as_ref().to_owned();

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                let id: Option<Uuid> = accounts::table
                    .filter(accounts::login.eq(login_value.as_str()))
                    .select(accounts::id)
                    .first(conn)
                    .await
                    .optional()?;
                if let Some(id) = id {
                    diesel::delete(
                        account_authorities::table
                            .filter(account_authorities::account_id.eq(id)),
                    )
                    .execute(conn)
                    .await?;
                    diesel::delete(accounts::table.find(id)).execute(conn).await?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn list(&self, page: PageRequest) -> Result<Vec<Account>, AccountPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<AccountRow> = accounts::table
            .order(accounts::login.asc())
            .offset(page.offset())
            .limit(page.limit())
            .select(AccountRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let granted = Self::load_authorities(&mut conn, row.id).await?;
            result.push(row.into_account(granted)?);
        }
        Ok(result)
    }

    async fn authorities(&self) -> Result<Vec<String>, AccountPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        authorities::table
            .order(authorities::name.asc())
            .select(authorities::name)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)
    }
}
