//! Row structs bridging Diesel and the domain account aggregate.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::ports::AccountPersistenceError;
use crate::domain::{Account, AccountId, EmailAddress, Login};

use super::schema::{account_authorities, accounts};

/// Full account row, readable and insertable.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = accounts)]
pub struct AccountRow {
    pub id: Uuid,
    pub login: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub activated: bool,
    pub lang_key: Option<String>,
    pub image_url: Option<String>,
    pub activation_key: Option<String>,
    pub reset_key: Option<String>,
    pub reset_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Changeset for account updates.
///
/// `treat_none_as_null` matters here: clearing a consumed activation or
/// reset key must write SQL NULL, not skip the column.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = accounts)]
#[diesel(treat_none_as_null = true)]
pub struct AccountChangeset {
    pub login: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub activated: bool,
    pub lang_key: Option<String>,
    pub image_url: Option<String>,
    pub activation_key: Option<String>,
    pub reset_key: Option<String>,
    pub reset_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// One granted authority.
#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = account_authorities)]
pub struct AuthorityRow {
    pub account_id: Uuid,
    pub authority: String,
}

impl AccountRow {
    /// Build a row from a domain account.
    #[must_use]
    pub fn from_account(account: &Account) -> Self {
        Self {
            id: *account.id.as_uuid(),
            login: account.login.as_ref().to_owned(),
            email: account.email.as_ref().to_owned(),
            password_hash: account.password_hash.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            activated: account.activated,
            lang_key: account.lang_key.clone(),
            image_url: account.image_url.clone(),
            activation_key: account.activation_key.clone(),
            reset_key: account.reset_key.clone(),
            reset_date: account.reset_date,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }

    /// Reassemble a domain account from this row and its authority set.
    ///
    /// Rows that fail the domain's field invariants indicate a corrupted
    /// record and surface as query errors.
    pub fn into_account(
        self,
        authorities: BTreeSet<String>,
    ) -> Result<Account, AccountPersistenceError> {
        let login = Login::new(&self.login).map_err(|err| {
            AccountPersistenceError::query(format!("stored login is invalid: {err}"))
        })?;
        let email = EmailAddress::new(&self.email).map_err(|err| {
            AccountPersistenceError::query(format!("stored email is invalid: {err}"))
        })?;
        Ok(Account {
            id: AccountId::from_uuid(self.id),
            login,
            email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            activated: self.activated,
            lang_key: self.lang_key,
            image_url: self.image_url,
            activation_key: self.activation_key,
            reset_key: self.reset_key,
            reset_date: self.reset_date,
            authorities,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl AccountChangeset {
    /// Build a changeset from a domain account.
    #[must_use]
    pub fn from_account(account: &Account) -> Self {
        Self {
            login: account.login.as_ref().to_owned(),
            email: account.email.as_ref().to_owned(),
            password_hash: account.password_hash.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            activated: account.activated,
            lang_key: account.lang_key.clone(),
            image_url: account.image_url.clone(),
            activation_key: account.activation_key.clone(),
            reset_key: account.reset_key.clone(),
            reset_date: account.reset_date,
            updated_at: account.updated_at,
        }
    }
}

/// Authority rows for a domain account.
#[must_use]
pub fn authority_rows(account: &Account) -> Vec<AuthorityRow> {
    account
        .authorities
        .iter()
        .map(|authority| AuthorityRow {
            account_id: *account.id.as_uuid(),
            authority: authority.clone(),
        })
        .collect()
}
