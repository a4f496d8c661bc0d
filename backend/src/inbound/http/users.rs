//! Administrative user management handlers.
//!
//! ```text
//! POST   /api/v1/admin/users
//! PUT    /api/v1/admin/users
//! GET    /api/v1/admin/users?page=&size=
//! GET    /api/v1/admin/users/{login}
//! DELETE /api/v1/admin/users/{login}
//! GET    /api/v1/admin/authorities
//! ```
//!
//! The whole scope sits behind the required authentication gate; no handler
//! here runs for an unauthenticated or anonymous caller.

use std::collections::BTreeSet;

use actix_web::{HttpResponse, delete, get, post, put, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::ports::PageRequest;
use crate::domain::{AccountId, CreateUserRequest, Error, Login, UpdateUserRequest};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::CurrentIdentity;
use crate::inbound::http::projection::{AccountResponse, project_account};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, normalize_optional, parse_email, parse_login};

/// Admin user creation / update body.
///
/// `id` must be absent on creation and present on update.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub lang_key: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub activated: bool,
    #[serde(default)]
    pub authorities: Vec<String>,
}

fn parse_id(value: Option<String>) -> Result<Option<AccountId>, Error> {
    normalize_optional(value)
        .map(|raw| {
            Uuid::parse_str(&raw).map(AccountId::from_uuid).map_err(|_| {
                Error::invalid_argument("id must be a valid UUID").with_details(
                    serde_json::json!({ "field": "id", "code": "invalid_value" }),
                )
            })
        })
        .transpose()
}

impl TryFrom<UserPayload> for CreateUserRequest {
    type Error = Error;

    fn try_from(payload: UserPayload) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id(payload.id)?,
            login: parse_login(payload.login, FieldName::new("login"))?,
            email: parse_email(payload.email, FieldName::new("email"))?,
            first_name: normalize_optional(payload.first_name),
            last_name: normalize_optional(payload.last_name),
            lang_key: normalize_optional(payload.lang_key),
            image_url: normalize_optional(payload.image_url),
            authorities: payload.authorities.into_iter().collect::<BTreeSet<_>>(),
        })
    }
}

impl TryFrom<UserPayload> for UpdateUserRequest {
    type Error = Error;

    fn try_from(payload: UserPayload) -> Result<Self, Self::Error> {
        let id = parse_id(payload.id)?
            .ok_or_else(|| Error::invalid_argument("an update must reference an existing id"))?;
        Ok(Self {
            id,
            login: parse_login(payload.login, FieldName::new("login"))?,
            email: parse_email(payload.email, FieldName::new("email"))?,
            first_name: normalize_optional(payload.first_name),
            last_name: normalize_optional(payload.last_name),
            lang_key: normalize_optional(payload.lang_key),
            image_url: normalize_optional(payload.image_url),
            activated: payload.activated,
            authorities: payload.authorities.into_iter().collect::<BTreeSet<_>>(),
        })
    }
}

/// Create a user record.
#[utoipa::path(
    post,
    path = "/api/v1/admin/users",
    request_body = UserPayload,
    responses(
        (status = 201, description = "User created", body = AccountResponse),
        (status = 400, description = "Pre-supplied id or invalid payload", body = Error),
        (status = 409, description = "Login or email already in use", body = Error),
        (status = 401, description = "Missing or invalid credential", body = Error)
    ),
    tags = ["admin"],
    operation_id = "createUser"
)]
#[post("/users")]
pub async fn create_user(
    state: web::Data<HttpState>,
    payload: web::Json<UserPayload>,
) -> ApiResult<HttpResponse> {
    let request = CreateUserRequest::try_from(payload.into_inner())?;
    let account = state.users.create_user(request).await?;
    Ok(HttpResponse::Created().json(project_account(&account)))
}

/// Update a user record.
#[utoipa::path(
    put,
    path = "/api/v1/admin/users",
    request_body = UserPayload,
    responses(
        (status = 200, description = "User updated", body = AccountResponse),
        (status = 404, description = "Unknown id", body = Error),
        (status = 409, description = "Login or email used by a different id", body = Error)
    ),
    tags = ["admin"],
    operation_id = "updateUser"
)]
#[put("/users")]
pub async fn update_user(
    state: web::Data<HttpState>,
    payload: web::Json<UserPayload>,
) -> ApiResult<web::Json<AccountResponse>> {
    let request = UpdateUserRequest::try_from(payload.into_inner())?;
    let account = state.users.update_user(request).await?;
    Ok(web::Json(project_account(&account)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Zero-based page index.
    pub page: Option<u32>,
    /// Page size, clamped server-side.
    pub size: Option<u32>,
}

/// List user records page by page.
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    params(PageQuery),
    responses((status = 200, description = "One page of users", body = [AccountResponse])),
    tags = ["admin"],
    operation_id = "getAllUsers"
)]
#[get("/users")]
pub async fn list_users(
    state: web::Data<HttpState>,
    query: web::Query<PageQuery>,
) -> ApiResult<web::Json<Vec<AccountResponse>>> {
    let page = PageRequest::new(query.page.unwrap_or(0), query.size.unwrap_or(20));
    let accounts = state.users.list_users(page).await?;
    // Lazy element-by-element projection; the page order is the
    // repository's.
    Ok(web::Json(accounts.iter().map(project_account).collect()))
}

/// Fetch one user record by login.
#[utoipa::path(
    get,
    path = "/api/v1/admin/users/{login}",
    params(("login" = String, Path, description = "Login of the user")),
    responses(
        (status = 200, description = "User", body = AccountResponse),
        (status = 404, description = "Unknown login", body = Error)
    ),
    tags = ["admin"],
    operation_id = "getUser"
)]
#[get("/users/{login}")]
pub async fn get_user(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<AccountResponse>> {
    let login = parse_path_login(&path)?;
    let account = state.users.get_user(&login).await?;
    Ok(web::Json(project_account(&account)))
}

/// Delete one user record by login.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{login}",
    params(("login" = String, Path, description = "Login of the user")),
    responses((status = 204, description = "User deleted")),
    tags = ["admin"],
    operation_id = "deleteUser"
)]
#[delete("/users/{login}")]
pub async fn delete_user(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let login = parse_path_login(&path)?;
    state.users.delete_user(&login).await?;
    Ok(HttpResponse::NoContent().finish())
}

fn parse_path_login(raw: &str) -> Result<Login, Error> {
    Login::new(raw).map_err(|err| Error::invalid_argument(err.to_string()))
}

/// List every authority name known to the system. Admin role required.
#[utoipa::path(
    get,
    path = "/api/v1/admin/authorities",
    responses(
        (status = 200, description = "Authority names", body = [String]),
        (status = 403, description = "Caller lacks the admin role", body = Error)
    ),
    tags = ["admin"],
    operation_id = "getAllAuthorities"
)]
#[get("/authorities")]
pub async fn list_authorities(
    state: web::Data<HttpState>,
    identity: CurrentIdentity,
) -> ApiResult<web::Json<Vec<String>>> {
    let names = state.users.list_authorities(&identity.0).await?;
    Ok(web::Json(names))
}
