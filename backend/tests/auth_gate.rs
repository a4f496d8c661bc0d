//! Authentication gate behaviour through a real service stack.
//!
//! Mirrors the contract of the per-call interceptor: header casing, scheme
//! strictness, invalid credentials, and the anonymous-identity denial. The
//! protected handler counts its invocations so the tests can prove a
//! rejected call never reaches it.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use accounts_backend::domain::ports::{AuthenticatedIdentity, FixtureTokenValidator, TokenValidator};
use accounts_backend::domain::{ROLE_ANONYMOUS, ROLE_USER};
use accounts_backend::inbound::http::auth::{BearerAuth, CurrentIdentity, MaybeIdentity};
use actix_web::http::StatusCode;
use actix_web::{App, HttpResponse, test, web};
use rstest::rstest;
use serde_json::Value;

const USER_TOKEN: &str = "valid-user-token";
const ANON_TOKEN: &str = "valid-anonymous-token";

fn validator() -> Arc<dyn TokenValidator> {
    Arc::new(
        FixtureTokenValidator::new()
            .with_token(
                USER_TOKEN,
                AuthenticatedIdentity {
                    principal: "alice".to_owned(),
                    roles: BTreeSet::from([ROLE_USER.to_owned()]),
                },
            )
            .with_token(
                ANON_TOKEN,
                AuthenticatedIdentity {
                    principal: "anonymous".to_owned(),
                    roles: BTreeSet::from([ROLE_ANONYMOUS.to_owned()]),
                },
            ),
    )
}

struct GateHarness {
    invocations: Arc<AtomicUsize>,
}

impl GateHarness {
    fn new() -> Self {
        Self {
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn handler_calls(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

macro_rules! gated_app {
    ($harness:expr) => {{
        let invocations = Arc::clone(&$harness.invocations);
        test::init_service(
            App::new().service(
                web::scope("/secure")
                    .wrap(BearerAuth::required(validator()))
                    .route(
                        "/whoami",
                        web::get().to(move |identity: CurrentIdentity| {
                            let invocations = Arc::clone(&invocations);
                            async move {
                                invocations.fetch_add(1, Ordering::SeqCst);
                                HttpResponse::Ok().body(identity.0.principal().to_owned())
                            }
                        }),
                    ),
            ),
        )
        .await
    }};
}

#[actix_web::test]
async fn valid_token_reaches_the_handler_with_identity() {
    let harness = GateHarness::new();
    let app = gated_app!(harness);

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/secure/whoami")
            .insert_header(("authorization", format!("Bearer {USER_TOKEN}")))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body = test::read_body(res).await;
    assert_eq!(&body[..], b"alice");
    assert_eq!(harness.handler_calls(), 1);
}

#[actix_web::test]
async fn capitalized_authorization_header_is_accepted() {
    let harness = GateHarness::new();
    let app = gated_app!(harness);

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/secure/whoami")
            .insert_header(("Authorization", format!("Bearer {USER_TOKEN}")))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(harness.handler_calls(), 1);
}

#[actix_web::test]
async fn missing_authorization_is_unauthenticated_and_handler_never_runs() {
    let harness = GateHarness::new();
    let app = gated_app!(harness);

    let res = test::call_service(
        &app,
        test::TestRequest::get().uri("/secure/whoami").to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "unauthenticated");
    assert_eq!(harness.handler_calls(), 0);
}

#[rstest]
#[case::missing_scheme(USER_TOKEN.to_owned())]
#[case::lowercase_scheme(format!("bearer {USER_TOKEN}"))]
#[case::blank_material("Bearer    ".to_owned())]
#[actix_web::test]
async fn malformed_credentials_are_unauthenticated(#[case] header_value: String) {
    let harness = GateHarness::new();
    let app = gated_app!(harness);

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/secure/whoami")
            .insert_header(("authorization", header_value))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.handler_calls(), 0);
}

#[actix_web::test]
async fn cryptographically_invalid_token_is_unauthenticated() {
    let harness = GateHarness::new();
    let app = gated_app!(harness);

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/secure/whoami")
            .insert_header(("authorization", "Bearer some-unknown-token"))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "unauthenticated");
    assert_eq!(harness.handler_calls(), 0);
}

#[actix_web::test]
async fn anonymous_identity_is_permission_denied_never_unauthenticated() {
    let harness = GateHarness::new();
    let app = gated_app!(harness);

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/secure/whoami")
            .insert_header(("authorization", format!("Bearer {ANON_TOKEN}")))
            .to_request(),
    )
    .await;

    // The token itself validated, so this is an authorization failure, and
    // the call closes without the handler ever running.
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "permission_denied");
    assert_eq!(harness.handler_calls(), 0);
}

#[actix_web::test]
async fn optional_gate_lets_unauthenticated_calls_through() {
    let app = test::init_service(
        App::new().service(
            web::scope("/open")
                .wrap(BearerAuth::optional(validator()))
                .route(
                    "/whoami",
                    web::get().to(|identity: MaybeIdentity| async move {
                        let principal = identity
                            .0
                            .map(|identity| identity.principal().to_owned())
                            .unwrap_or_default();
                        HttpResponse::Ok().body(principal)
                    }),
                ),
        ),
    )
    .await;

    let anonymous = test::call_service(
        &app,
        test::TestRequest::get().uri("/open/whoami").to_request(),
    )
    .await;
    assert_eq!(anonymous.status(), StatusCode::OK);
    assert_eq!(&test::read_body(anonymous).await[..], b"");

    let authenticated = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/open/whoami")
            .insert_header(("authorization", format!("Bearer {USER_TOKEN}")))
            .to_request(),
    )
    .await;
    assert_eq!(authenticated.status(), StatusCode::OK);
    assert_eq!(&test::read_body(authenticated).await[..], b"alice");

    // Anonymous identities are never attached, even in optional mode.
    let anonymous_token = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/open/whoami")
            .insert_header(("authorization", format!("Bearer {ANON_TOKEN}")))
            .to_request(),
    )
    .await;
    assert_eq!(anonymous_token.status(), StatusCode::OK);
    assert_eq!(&test::read_body(anonymous_token).await[..], b"");
}
