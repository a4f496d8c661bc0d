//! OpenAPI surface aggregated with Utoipa.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Registers the bearer authentication scheme used by gated operations.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Public OpenAPI document served by Swagger UI and tooling.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::inbound::http::account::register,
        crate::inbound::http::account::activate,
        crate::inbound::http::account::authenticate,
        crate::inbound::http::account::get_account,
        crate::inbound::http::account::save_account,
        crate::inbound::http::account::change_password,
        crate::inbound::http::account::request_password_reset,
        crate::inbound::http::account::finish_password_reset,
        crate::inbound::http::users::create_user,
        crate::inbound::http::users::update_user,
        crate::inbound::http::users::list_users,
        crate::inbound::http::users::get_user,
        crate::inbound::http::users::delete_user,
        crate::inbound::http::users::list_authorities,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
        crate::inbound::http::profile_info::profile_info,
    ),
    components(schemas(
        crate::domain::Error,
        crate::domain::ErrorCode,
        crate::inbound::http::projection::AccountResponse,
        crate::inbound::http::account::RegisterPayload,
        crate::inbound::http::account::SaveAccountPayload,
        crate::inbound::http::account::ChangePasswordPayload,
        crate::inbound::http::account::ResetPasswordInitPayload,
        crate::inbound::http::account::ResetPasswordFinishPayload,
        crate::inbound::http::users::UserPayload,
        crate::inbound::http::profile_info::ProfileInfo,
    )),
    modifiers(&SecurityAddon),
    security(("bearerAuth" = [])),
    tags(
        (name = "account", description = "Account self-service operations"),
        (name = "admin", description = "Administrative user management"),
        (name = "health", description = "Probes"),
        (name = "profile-info", description = "Deployment profile information"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_builds_and_lists_operations() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/register"));
        assert!(doc.paths.paths.contains_key("/api/v1/admin/authorities"));
        assert!(doc.paths.paths.contains_key("/health/ready"));
    }
}
