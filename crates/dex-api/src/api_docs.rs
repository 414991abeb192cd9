//! OpenAPI documentation for dex-api
//!
//! The raw JSON document is served at `/api-docs/openapi.json`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "dex API",
        description = "User registration, login and JWT-protected user management."
    ),
    tags(
        (name = "auth", description = "Registration, login and user management"),
        (name = "health", description = "Liveness")
    ),
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::register_handler,
        crate::handlers::auth::login_handler,
        crate::handlers::auth::logout_handler,
        crate::handlers::auth::csrf_token_handler,
        crate::handlers::auth::me_handler,
        crate::handlers::auth::update_user_handler,
        crate::handlers::auth::list_users_handler,
        crate::handlers::auth::get_user_handler,
        crate::handlers::auth::delete_user_handler,
    ),
    components(schemas(
        crate::error::ApiError,
        crate::handlers::health::HealthResponse,
        crate::handlers::auth::LogoutResponse,
        crate::auth::RegisterRequest,
        crate::auth::LoginRequest,
        crate::auth::UpdateUserRequest,
        crate::auth::UserWithToken,
        crate::auth::CsrfTokenResponse,
        dex_core::UserPublic,
        dex_core::UserList,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
