//! Bearer-token and tenant-identification middleware.
//!
//! Every endpoint outside the public set (`/health`, `/metrics`,
//! `/api/v1/auth/login`, `/api/v1/auth/callback`) requires an
//! `Authorization: Bearer <token>` header and a tenant identifier, taken
//! from the `X-Tenant` header or, failing that, the first label of the
//! request's `Host` header.
//!
//! Verifying the bearer token against an OIDC issuer is an external
//! concern (see [`crate::config::OidcConfig`]); this layer checks it
//! against a configured shared secret when one is set, and otherwise
//! accepts any non-empty bearer token, trusting that a front door
//! (reverse proxy, gateway) has already authenticated the caller.

use axum::extract::{Query, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{Redirect, Response};
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

/// The resolved tenant for one request, inserted as a request extension by
/// [`require_auth`] and read by every resource handler.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: String,
}

pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, AppError> {
    let token = bearer_token(&request)?;

    if let Some(expected) = &state.config.api_token {
        if token != expected {
            return Err(AppError::unauthorized("invalid bearer token"));
        }
    }

    let tenant_id = tenant_id(&request)?;
    request.extensions_mut().insert(TenantContext { tenant_id });

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::unauthorized("Authorization header must use the Bearer scheme"))?;

    if token.is_empty() {
        return Err(AppError::unauthorized("empty bearer token"));
    }
    Ok(token)
}

fn tenant_id(request: &Request) -> Result<String, AppError> {
    if let Some(header) = request.headers().get("X-Tenant").and_then(|v| v.to_str().ok()) {
        if !header.is_empty() {
            return Ok(header.to_owned());
        }
    }

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::bad_request("no X-Tenant header and no Host header to derive a tenant from"))?;

    let first_label = host.split('.').next().unwrap_or_default();
    if first_label.is_empty() {
        return Err(AppError::bad_request("could not derive a tenant from the Host header"));
    }
    Ok(first_label.to_owned())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// Redirects the caller to the configured OIDC issuer's authorize endpoint.
/// Verifying the resulting token is an external collaborator's job; this
/// engine only needs to know where to send the browser.
pub async fn login(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let issuer = state
        .config
        .oidc
        .issuer
        .as_ref()
        .ok_or_else(|| AppError::internal("no OIDC issuer configured"))?;
    let client_id = state.config.oidc.client_id.as_deref().unwrap_or_default();
    let redirect_uri = state.config.oidc.redirect_uri.as_deref().unwrap_or_default();

    Ok(Redirect::temporary(&format!(
        "{issuer}/authorize?response_type=code&client_id={client_id}&redirect_uri={redirect_uri}"
    )))
}

/// The OIDC provider's redirect target after authorization. Exchanging
/// `code` for a token happens in the external identity collaborator; this
/// handler only reports whether the provider signaled success.
pub async fn callback(Query(query): Query<CallbackQuery>) -> Json<serde_json::Value> {
    match query.error {
        Some(error) => Json(serde_json::json!({ "success": false, "error": error })),
        None => Json(serde_json::json!({ "success": query.code.is_some() })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    #[test]
    fn bearer_token_requires_bearer_scheme() {
        let req = HttpRequest::builder()
            .header(header::AUTHORIZATION, "Basic abc123")
            .body(Body::empty())
            .unwrap();
        assert!(bearer_token(&req).is_err());
    }

    #[test]
    fn bearer_token_extracts_token() {
        let req = HttpRequest::builder()
            .header(header::AUTHORIZATION, "Bearer sekrit")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req).unwrap(), "sekrit");
    }

    #[test]
    fn tenant_id_prefers_explicit_header() {
        let req = HttpRequest::builder()
            .header("X-Tenant", "acme")
            .header(header::HOST, "other.dqe.example.com")
            .body(Body::empty())
            .unwrap();
        assert_eq!(tenant_id(&req).unwrap(), "acme");
    }

    #[test]
    fn tenant_id_falls_back_to_host_subdomain() {
        let req = HttpRequest::builder()
            .header(header::HOST, "acme.dqe.example.com")
            .body(Body::empty())
            .unwrap();
        assert_eq!(tenant_id(&req).unwrap(), "acme");
    }
}
