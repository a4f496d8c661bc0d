//! Response projection from domain entities to wire DTOs.
//!
//! Absent optional fields serialize as absent, never as sentinel strings.
//! Sensitive fields — the password hash and the reset key — have no wire
//! representation at all, so their exclusion is unconditional rather than
//! request-dependent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Account;

/// Outward-facing account representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    #[schema(value_type = String, example = "3fa85f64-5717-4562-b3fc-2c963f66afa6")]
    pub id: String,
    pub login: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub activated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub authorities: Vec<String>,
    pub created_date: DateTime<Utc>,
    pub last_modified_date: DateTime<Utc>,
}

/// Project a domain account into its wire shape.
///
/// Applied element-by-element over listing pages; the page order is whatever
/// the persistence collaborator returned.
#[must_use]
pub fn project_account(account: &Account) -> AccountResponse {
    AccountResponse {
        id: account.id.to_string(),
        login: account.login.as_ref().to_owned(),
        email: account.email.as_ref().to_owned(),
        first_name: account.first_name.clone(),
        last_name: account.last_name.clone(),
        activated: account.activated,
        lang_key: account.lang_key.clone(),
        image_url: account.image_url.clone(),
        authorities: account.authorities.iter().cloned().collect(),
        created_date: account.created_at,
        last_modified_date: account.updated_at,
    }
}
