//! Deployment profile information.
//!
//! Reachable without authentication: front-ends query it before any login to
//! decide which environment ribbon to display.

use actix_web::{get, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Active deployment profiles and the optional environment ribbon.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInfo {
    pub active_profiles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ribbon_env: Option<String>,
}

impl ProfileInfo {
    /// Describe the running deployment.
    #[must_use]
    pub fn new(active_profiles: Vec<String>, ribbon_env: Option<String>) -> Self {
        Self {
            active_profiles,
            ribbon_env,
        }
    }
}

/// Report the active deployment profiles.
#[utoipa::path(
    get,
    path = "/api/profile-info",
    tags = ["profile-info"],
    security([]),
    responses((status = 200, description = "Deployment profile information", body = ProfileInfo))
)]
#[get("/api/profile-info")]
pub async fn profile_info(info: web::Data<ProfileInfo>) -> web::Json<ProfileInfo> {
    web::Json(info.get_ref().clone())
}
