use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span, warn};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
pub mod notify;
// OpenAPI document assembly lives in openapi.rs.
mod openapi;

use handlers::auth::pg_store::PgCredentialStore;
use handlers::auth::store::{CredentialStore, MemoryCredentialStore};
use handlers::auth::{AuthConfig, SessionPolicy, TokenCodec, TokenConfig};
use handlers::{auth, health, root};
use notify::{DeliveryMode, Dispatcher};

/// Start the server.
///
/// # Errors
/// Returns an error if the signing secret policy rejects the configuration,
/// the credential store is unreachable, or the listener cannot bind.
pub async fn new(
    port: u16,
    dsn: Option<String>,
    token_config: &TokenConfig,
    auth_config: AuthConfig,
    delivery: DeliveryMode,
) -> Result<()> {
    // Fails fast in production mode when no secret is configured.
    let codec = TokenCodec::from_config(token_config)?;

    let store: Arc<dyn CredentialStore> = match dsn {
        Some(dsn) => Arc::new(PgCredentialStore::connect(&dsn).await?),
        None => {
            warn!(
                "no DSN configured; credential documents live in process memory and vanish on restart"
            );
            Arc::new(MemoryCredentialStore::new())
        }
    };

    let dispatcher = Dispatcher::spawn(delivery.sender()?);
    let frontend_origin = frontend_origin(auth_config.frontend_base_url())?;
    let policy = Arc::new(SessionPolicy::new(auth_config, store, codec, dispatcher));

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let app = Router::new()
        .route("/register", post(auth::register::register))
        .route("/login", post(auth::login::login))
        .route("/verify-otp", post(auth::verify::verify_otp))
        .route("/resend-otp", post(auth::verify::resend_otp))
        .route("/refresh-token", post(auth::refresh::refresh_token))
        .route("/reverify-otp", post(auth::verify::reverify_otp))
        .route("/forgot-password", post(auth::password::forgot_password))
        .route("/reset-password", post(auth::password::reset_password))
        .route("/verify-password", post(auth::password::verify_password))
        .route("/change-password", post(auth::password::change_password))
        .route("/health", get(health::health))
        .route("/", get(root::root))
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(policy)),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path_and_keeps_port() -> Result<()> {
        let origin = frontend_origin("https://app.halcyon.health/welcome")?;
        assert_eq!(origin, HeaderValue::from_static("https://app.halcyon.health"));

        let origin = frontend_origin("http://localhost:5173/")?;
        assert_eq!(origin, HeaderValue::from_static("http://localhost:5173"));
        Ok(())
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
    }
}
