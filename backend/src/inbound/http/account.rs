//! Account self-service API handlers.
//!
//! ```text
//! POST /api/v1/register
//! GET  /api/v1/activate?key=...
//! GET  /api/v1/authenticate
//! GET  /api/v1/account
//! POST /api/v1/account
//! POST /api/v1/account/change-password
//! POST /api/v1/account/reset-password/init
//! POST /api/v1/account/reset-password/finish
//! ```
//!
//! Registration, activation, and the reset flow stay reachable without a
//! credential; the "current account" operations read the call identity
//! attached by the gate and fail internally without one.

use std::collections::BTreeSet;

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{
    Error, FinishResetRequest, PlainPassword, RegisterRequest, SaveAccountRequest,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::{CurrentIdentity, MaybeIdentity};
use crate::inbound::http::projection::{AccountResponse, project_account};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, normalize_optional, parse_email, parse_login};

/// Registration request body.
///
/// Optional fields may arrive as empty strings; they are treated as absent.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub lang_key: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub authorities: Vec<String>,
}

impl TryFrom<RegisterPayload> for RegisterRequest {
    type Error = Error;

    fn try_from(payload: RegisterPayload) -> Result<Self, Self::Error> {
        Ok(Self {
            login: parse_login(payload.login, FieldName::new("login"))?,
            email: parse_email(payload.email, FieldName::new("email"))?,
            // Length is a pipeline precondition, not a parse failure.
            password: PlainPassword::new(payload.password.unwrap_or_default()),
            first_name: normalize_optional(payload.first_name),
            last_name: normalize_optional(payload.last_name),
            lang_key: normalize_optional(payload.lang_key),
            image_url: normalize_optional(payload.image_url),
            requested_authorities: payload.authorities.into_iter().collect::<BTreeSet<_>>(),
        })
    }
}

/// Register a new account.
#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterPayload,
    responses(
        (status = 201, description = "Account registered", body = AccountResponse),
        (status = 400, description = "Precondition violated", body = Error),
        (status = 409, description = "Login or email already in use", body = Error)
    ),
    tags = ["account"],
    operation_id = "registerAccount",
    security([])
)]
#[post("/register")]
pub async fn register(
    state: web::Data<HttpState>,
    payload: web::Json<RegisterPayload>,
) -> ApiResult<HttpResponse> {
    let request = RegisterRequest::try_from(payload.into_inner())?;
    let account = state.accounts.register(request).await?;
    Ok(HttpResponse::Created().json(project_account(&account)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ActivateQuery {
    /// Single-use activation key from the creation notification.
    pub key: String,
}

/// Activate a pending registration.
#[utoipa::path(
    get,
    path = "/api/v1/activate",
    params(ActivateQuery),
    responses(
        (status = 200, description = "Account activated", body = AccountResponse),
        (status = 500, description = "Unknown or already-consumed key", body = Error)
    ),
    tags = ["account"],
    operation_id = "activateAccount",
    security([])
)]
#[get("/activate")]
pub async fn activate(
    state: web::Data<HttpState>,
    query: web::Query<ActivateQuery>,
) -> ApiResult<web::Json<AccountResponse>> {
    let account = state.accounts.activate(query.into_inner().key).await?;
    Ok(web::Json(project_account(&account)))
}

/// Answer "who am I": the caller's principal, empty when unauthenticated.
#[utoipa::path(
    get,
    path = "/api/v1/authenticate",
    responses((status = 200, description = "Current principal name, possibly empty", body = String)),
    tags = ["account"],
    operation_id = "isAuthenticated",
    security([])
)]
#[get("/authenticate")]
pub async fn authenticate(identity: MaybeIdentity) -> web::Json<String> {
    let principal = identity
        .0
        .map(|identity| identity.principal().to_owned())
        .unwrap_or_default();
    web::Json(principal)
}

/// Fetch the calling account.
#[utoipa::path(
    get,
    path = "/api/v1/account",
    responses(
        (status = 200, description = "Current account", body = AccountResponse),
        (status = 500, description = "No resolvable caller", body = Error)
    ),
    tags = ["account"],
    operation_id = "getAccount"
)]
#[get("/account")]
pub async fn get_account(
    state: web::Data<HttpState>,
    identity: CurrentIdentity,
) -> ApiResult<web::Json<AccountResponse>> {
    let account = state.accounts.current_account(&identity.0).await?;
    Ok(web::Json(project_account(&account)))
}

/// Profile update body for the calling account.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveAccountPayload {
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
}

impl TryFrom<SaveAccountPayload> for SaveAccountRequest {
    type Error = Error;

    fn try_from(payload: SaveAccountPayload) -> Result<Self, Self::Error> {
        Ok(Self {
            email: parse_email(payload.email, FieldName::new("email"))?,
            first_name: normalize_optional(payload.first_name),
            last_name: normalize_optional(payload.last_name),
            lang_key: normalize_optional(payload.lang_key),
            image_url: normalize_optional(payload.image_url),
        })
    }
}

/// Update the calling account's profile.
#[utoipa::path(
    post,
    path = "/api/v1/account",
    request_body = SaveAccountPayload,
    responses(
        (status = 200, description = "Account updated", body = AccountResponse),
        (status = 409, description = "Email used by another identity", body = Error),
        (status = 500, description = "No resolvable caller", body = Error)
    ),
    tags = ["account"],
    operation_id = "saveAccount"
)]
#[post("/account")]
pub async fn save_account(
    state: web::Data<HttpState>,
    identity: CurrentIdentity,
    payload: web::Json<SaveAccountPayload>,
) -> ApiResult<web::Json<AccountResponse>> {
    let request = SaveAccountRequest::try_from(payload.into_inner())?;
    let account = state.accounts.save_account(&identity.0, request).await?;
    Ok(web::Json(project_account(&account)))
}

/// Password change body.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordPayload {
    #[serde(default)]
    pub new_password: Option<String>,
}

/// Change the calling account's password.
#[utoipa::path(
    post,
    path = "/api/v1/account/change-password",
    request_body = ChangePasswordPayload,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Password length out of bounds", body = Error)
    ),
    tags = ["account"],
    operation_id = "changePassword"
)]
#[post("/account/change-password")]
pub async fn change_password(
    state: web::Data<HttpState>,
    identity: CurrentIdentity,
    payload: web::Json<ChangePasswordPayload>,
) -> ApiResult<HttpResponse> {
    let password = PlainPassword::new(payload.into_inner().new_password.unwrap_or_default());
    state.accounts.change_password(&identity.0, password).await?;
    Ok(HttpResponse::Ok().finish())
}

/// Reset initiation body.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordInitPayload {
    #[serde(default)]
    pub email: Option<String>,
}

/// Request a password reset key for a registered address.
#[utoipa::path(
    post,
    path = "/api/v1/account/reset-password/init",
    request_body = ResetPasswordInitPayload,
    responses(
        (status = 200, description = "Reset key issued and dispatched"),
        (status = 400, description = "Address not registered", body = Error)
    ),
    tags = ["account"],
    operation_id = "requestPasswordReset",
    security([])
)]
#[post("/account/reset-password/init")]
pub async fn request_password_reset(
    state: web::Data<HttpState>,
    payload: web::Json<ResetPasswordInitPayload>,
) -> ApiResult<HttpResponse> {
    let email = parse_email(payload.into_inner().email, FieldName::new("email"))?;
    state.accounts.request_password_reset(email).await?;
    Ok(HttpResponse::Ok().finish())
}

/// Reset completion body: the mailed key plus the new password.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordFinishPayload {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

/// Complete a password reset.
#[utoipa::path(
    post,
    path = "/api/v1/account/reset-password/finish",
    request_body = ResetPasswordFinishPayload,
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "Password length out of bounds", body = Error),
        (status = 500, description = "Unknown or expired reset key", body = Error)
    ),
    tags = ["account"],
    operation_id = "finishPasswordReset",
    security([])
)]
#[post("/account/reset-password/finish")]
pub async fn finish_password_reset(
    state: web::Data<HttpState>,
    payload: web::Json<ResetPasswordFinishPayload>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    // An absent key flows into the pipeline and fails key resolution there,
    // matching the contract for unknown keys.
    let request = FinishResetRequest {
        key: payload.key.unwrap_or_default(),
        new_password: PlainPassword::new(payload.new_password.unwrap_or_default()),
    };
    state.accounts.finish_password_reset(request).await?;
    Ok(HttpResponse::Ok().finish())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::ports::{
        AccountRepository, AuthenticatedIdentity, FixtureAccountRepository, FixtureNotifier,
        FixtureTokenValidator, Notifier, TokenValidator,
    };
    use crate::domain::{AccountService, ROLE_USER, UserAdminService, verify_password};
    use crate::inbound::http::auth::BearerAuth;
    use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
    use actix_web::{App, test as actix_test, web};
    use mockable::DefaultClock;
    use serde_json::{Value, json};
    use std::collections::BTreeSet;

    const USER_TOKEN: &str = "fixture-user-token";

    struct Harness {
        repo: Arc<FixtureAccountRepository>,
        state: web::Data<HttpState>,
    }

    fn harness() -> Harness {
        let repo = Arc::new(FixtureAccountRepository::new());
        let notifier = Arc::new(FixtureNotifier::new());
        let tokens: Arc<dyn TokenValidator> = Arc::new(
            FixtureTokenValidator::new().with_token(
                USER_TOKEN,
                AuthenticatedIdentity {
                    principal: "alice".to_owned(),
                    roles: BTreeSet::from([ROLE_USER.to_owned()]),
                },
            ),
        );
        let accounts_port: Arc<dyn AccountRepository> = repo.clone();
        let notifier_port: Arc<dyn Notifier> = notifier;
        let clock = Arc::new(DefaultClock);
        let state = web::Data::new(HttpState::new(
            Arc::new(AccountService::new(
                Arc::clone(&accounts_port),
                Arc::clone(&notifier_port),
                clock.clone(),
            )),
            Arc::new(UserAdminService::new(accounts_port, notifier_port, clock)),
            tokens,
        ));
        Harness { repo, state }
    }

    fn test_app(
        state: web::Data<HttpState>,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let tokens = Arc::clone(&state.tokens);
        App::new().app_data(state).service(
            web::scope("/api/v1").service(
                web::scope("")
                    .wrap(BearerAuth::optional(tokens))
                    .service(register)
                    .service(activate)
                    .service(authenticate)
                    .service(get_account)
                    .service(save_account)
                    .service(change_password)
                    .service(request_password_reset)
                    .service(finish_password_reset),
            ),
        )
    }

    fn register_body(login: &str, email: &str, password: &str) -> Value {
        json!({
            "login": login,
            "email": email,
            "password": password,
            "firstName": "Ada",
            "lastName": "",
            "langKey": "en",
        })
    }

    #[actix_web::test]
    async fn register_returns_created_with_camel_case_payload() {
        let h = harness();
        let app = actix_test::init_service(test_app(h.state.clone())).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/register")
                .set_json(register_body("newuser", "newuser@example.com", "password"))
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), actix_web::http::StatusCode::CREATED);
        let body: Value = actix_test::read_body_json(res).await;
        assert_eq!(body["login"], "newuser");
        assert_eq!(body["activated"], false);
        assert_eq!(body["firstName"], "Ada");
        assert!(body.get("lastName").is_none(), "empty string coerced to absent");
        assert!(body.get("password").is_none());
        assert!(body.get("resetKey").is_none());
    }

    #[actix_web::test]
    async fn register_with_short_password_is_rejected_before_lookup() {
        let h = harness();
        let app = actix_test::init_service(test_app(h.state.clone())).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/register")
                .set_json(register_body("newuser", "newuser@example.com", "foo"))
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), actix_web::http::StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(res).await;
        assert_eq!(body["code"], "invalid_argument");
        assert_eq!(body["message"], "Incorrect password");
        assert_eq!(h.repo.lookup_count(), 0, "rejected before any lookup");
    }

    #[actix_web::test]
    async fn register_without_login_reports_the_field() {
        let h = harness();
        let app = actix_test::init_service(test_app(h.state.clone())).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/register")
                .set_json(json!({ "email": "x@example.com", "password": "password" }))
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), actix_web::http::StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(res).await;
        assert_eq!(body["details"]["field"], "login");
        assert_eq!(body["details"]["code"], "missing_field");
    }

    #[actix_web::test]
    async fn duplicate_registration_conflicts() {
        let h = harness();
        let app = actix_test::init_service(test_app(h.state.clone())).await;

        let first = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/register")
                .set_json(register_body("dup", "dup@example.com", "password"))
                .to_request(),
        )
        .await;
        assert!(first.status().is_success());

        let second = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/register")
                .set_json(register_body("DUP", "fresh@example.com", "password"))
                .to_request(),
        )
        .await;
        assert_eq!(second.status(), actix_web::http::StatusCode::CONFLICT);
        let body: Value = actix_test::read_body_json(second).await;
        assert_eq!(body["code"], "already_exists");
        assert_eq!(body["message"], "Login already in use");
        assert_eq!(h.repo.account_count(), 1);
    }

    #[actix_web::test]
    async fn whoami_reports_principal_or_empty() {
        let h = harness();
        let app = actix_test::init_service(test_app(h.state.clone())).await;

        let anonymous = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/authenticate")
                .to_request(),
        )
        .await;
        let body: String = actix_test::read_body_json(anonymous).await;
        assert_eq!(body, "");

        let authenticated = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/authenticate")
                .insert_header(("Authorization", format!("Bearer {USER_TOKEN}")))
                .to_request(),
        )
        .await;
        let body: String = actix_test::read_body_json(authenticated).await;
        assert_eq!(body, "alice");
    }

    #[actix_web::test]
    async fn get_account_without_identity_fails_internally() {
        let h = harness();
        let app = actix_test::init_service(test_app(h.state.clone())).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/account")
                .to_request(),
        )
        .await;
        assert_eq!(
            res.status(),
            actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn change_password_round_trips_through_the_stored_hash() {
        let h = harness();
        let app = actix_test::init_service(test_app(h.state.clone())).await;

        let registered = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/register")
                .set_json(register_body("alice", "alice@example.com", "password"))
                .to_request(),
        )
        .await;
        assert!(registered.status().is_success());

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/account/change-password")
                .insert_header(("Authorization", format!("Bearer {USER_TOKEN}")))
                .set_json(json!({ "newPassword": "new password" }))
                .to_request(),
        )
        .await;
        assert!(res.status().is_success());

        let stored = h
            .repo
            .stored_by_login(&crate::domain::Login::new("alice").expect("valid login"))
            .expect("account stored");
        assert!(verify_password(&stored.password_hash, "new password"));
    }

    #[actix_web::test]
    async fn activation_consumes_the_key_over_http() {
        let h = harness();
        let app = actix_test::init_service(test_app(h.state.clone())).await;

        let registered = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/register")
                .set_json(register_body("pending", "pending@example.com", "password"))
                .to_request(),
        )
        .await;
        assert!(registered.status().is_success());

        let key = h
            .repo
            .stored_by_login(&crate::domain::Login::new("pending").expect("valid login"))
            .and_then(|account| account.activation_key)
            .expect("activation key issued");

        let activated = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri(&format!("/api/v1/activate?key={key}"))
                .to_request(),
        )
        .await;
        assert!(activated.status().is_success());
        let body: Value = actix_test::read_body_json(activated).await;
        assert_eq!(body["activated"], true);

        let replayed = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri(&format!("/api/v1/activate?key={key}"))
                .to_request(),
        )
        .await;
        assert_eq!(
            replayed.status(),
            actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
