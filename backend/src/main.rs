//! Server entry point: wires adapters, scopes, and gates.

use std::env;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use mockable::DefaultClock;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use accounts_backend::ApiDoc;
use accounts_backend::Trace;
use accounts_backend::domain::ports::{
    AccountRepository, FixtureAccountRepository, Notifier, TokenValidator,
};
use accounts_backend::domain::{AccountService, UserAdminService};
use accounts_backend::inbound::http::account::{
    activate, authenticate, change_password, finish_password_reset, get_account, register,
    request_password_reset, save_account,
};
use accounts_backend::inbound::http::auth::BearerAuth;
use accounts_backend::inbound::http::health::{HealthState, live, ready};
use accounts_backend::inbound::http::profile_info::{ProfileInfo, profile_info};
use accounts_backend::inbound::http::state::HttpState;
use accounts_backend::inbound::http::users::{
    create_user, delete_user, get_user, list_authorities, list_users, update_user,
};
use accounts_backend::outbound::notify::LoggingNotifier;
use accounts_backend::outbound::persistence::{DbPool, DieselAccountRepository, PoolConfig};
use accounts_backend::outbound::security::JwtTokenValidator;

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %err, "tracing init failed");
    }

    let secret = load_jwt_secret()?;
    let tokens: Arc<dyn TokenValidator> = Arc::new(JwtTokenValidator::new(&secret));

    let accounts_repo: Arc<dyn AccountRepository> = match env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = DbPool::new(PoolConfig::new(url))
                .await
                .map_err(|err| std::io::Error::other(err.to_string()))?;
            Arc::new(DieselAccountRepository::new(pool))
        }
        Err(_) => {
            warn!("DATABASE_URL not set; using the in-memory account store (dev only)");
            Arc::new(FixtureAccountRepository::new())
        }
    };
    let notifier: Arc<dyn Notifier> = Arc::new(LoggingNotifier);
    let clock = Arc::new(DefaultClock);

    let state = web::Data::new(HttpState::new(
        Arc::new(AccountService::new(
            Arc::clone(&accounts_repo),
            Arc::clone(&notifier),
            clock.clone(),
        )),
        Arc::new(UserAdminService::new(accounts_repo, notifier, clock)),
        tokens,
    ));
    let profile = web::Data::new(ProfileInfo::new(active_profiles(), env::var("RIBBON_ENV").ok()));
    let health_state = web::Data::new(HealthState::new());
    let server_health = health_state.clone();

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    info!(%bind_addr, "starting account backend");

    let server = HttpServer::new(move || {
        let tokens = Arc::clone(&state.tokens);
        let api = web::scope("/api/v1")
            // The admin service runs behind the required gate: no handler in
            // it ever observes an unauthenticated or anonymous call.
            .service(
                web::scope("/admin")
                    .wrap(BearerAuth::required(Arc::clone(&tokens)))
                    .service(create_user)
                    .service(update_user)
                    .service(list_users)
                    .service(list_authorities)
                    .service(get_user)
                    .service(delete_user),
            )
            // Self-service operations attach an identity when a valid token
            // is presented but stay reachable without one.
            .service(
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
            );

        #[cfg_attr(not(debug_assertions), expect(unused_mut, reason = "Swagger UI is debug-only"))]
        let mut app = App::new()
            .app_data(state.clone())
            .app_data(server_health.clone())
            .app_data(profile.clone())
            .wrap(Trace)
            .service(api)
            .service(profile_info)
            .service(ready)
            .service(live);

        #[cfg(debug_assertions)]
        {
            app = app
                .service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
        }

        app
    })
    .bind(bind_addr)?;

    health_state.mark_ready();
    server.run().await
}

fn load_jwt_secret() -> std::io::Result<Vec<u8>> {
    let path = env::var("JWT_SECRET_FILE").unwrap_or_else(|_| "/var/run/secrets/jwt_secret".to_owned());
    match std::fs::read(&path) {
        Ok(bytes) if !bytes.is_empty() => Ok(bytes),
        Ok(_) => Err(std::io::Error::other(format!("JWT secret at {path} is empty"))),
        Err(err) => {
            let allow_dev = env::var("JWT_ALLOW_EPHEMERAL").ok().as_deref() == Some("1");
            if cfg!(debug_assertions) || allow_dev {
                warn!(path = %path, error = %err, "using ephemeral JWT secret (dev only)");
                let mut secret = vec![0u8; 64];
                getrandom::getrandom(&mut secret)
                    .map_err(|err| std::io::Error::other(err.to_string()))?;
                Ok(secret)
            } else {
                Err(std::io::Error::other(format!(
                    "failed to read JWT secret at {path}: {err}"
                )))
            }
        }
    }
}

fn active_profiles() -> Vec<String> {
    match env::var("ACTIVE_PROFILES") {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|profile| !profile.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
        Err(_) => {
            let default = if cfg!(debug_assertions) { "dev" } else { "prod" };
            vec![default.to_owned()]
        }
    }
}
