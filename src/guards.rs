//! Identity guards composed in front of protected routes.
//!
//! Each guard resolves the caller to an [`Identity`], stores it in the request
//! extensions and records it on the request span. Handlers read it back with
//! `Extension<Identity>`.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    app::AppState,
    authentication::AuthSession,
    entities::Identity,
    error::AppError,
    tokens::TokenType,
};

/// API guard: requires a valid `Authorization: Bearer <access token>`.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| {
            tracing::debug!("missing or malformed Authorization header");
            AppError::Authentication
        })?;

    let user_id = state
        .tokens
        .verify(token, TokenType::Access)
        .map_err(|e| {
            tracing::debug!(error = %e, "access token rejected");
            AppError::Authentication
        })?;

    // tokens outlive users that have been removed
    if state.auth.find_user(user_id).await?.is_none() {
        tracing::debug!(user_id, "access token for unknown user");
        return Err(AppError::Authentication);
    }

    tracing::Span::current().record("user_id", user_id);
    request.extensions_mut().insert(Identity { user_id });
    Ok(next.run(request).await)
}

/// Web guard: requires a logged-in session, otherwise redirects to the login
/// page with the requested path and query as `next`.
pub async fn require_login(
    auth_session: AuthSession,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_session.user {
        Some(user) => {
            tracing::Span::current().record("user_id", user.id);
            request.extensions_mut().insert(Identity::from(&user));
            next.run(request).await
        }
        None => Redirect::to(&login_url(request.uri())).into_response(),
    }
}

fn login_url(uri: &Uri) -> String {
    let requested = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("next", requested)
        .finish();
    format!("/login?{query}")
}
