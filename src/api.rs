use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_login::AuthnBackend;
use serde::{Deserialize, Serialize};

use crate::{
    app::AppState,
    authentication::Credentials,
    entities::{Identity, NewTodo, RegisterRequest, Todo, TodoPatch, User},
    error::{AppError, FieldErrors, InternalError},
    tokens::TokenType,
};

/// `Json` whose rejections are reported as validation errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Path` whose rejections are reported as not found.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(FieldErrors::single("non_field_errors", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        Self::NotFound
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: User,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state
        .auth
        .register(&request.username, request.email.as_deref(), &request.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Same 401 body for an unknown user and a wrong password.
#[tracing::instrument(skip_all, fields(username = %request.username))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let creds = Credentials {
        username: request.username,
        password: request.password,
        next: None,
    };

    let user = state
        .auth
        .authenticate(creds)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let pair = state
        .tokens
        .issue_pair(user.id)
        .map_err(InternalError::from)?;

    tracing::info!(user_id = user.id, "api login");
    Ok(Json(LoginResponse {
        access: pair.access,
        refresh: pair.refresh,
        user,
    }))
}

#[tracing::instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let user_id = state
        .tokens
        .verify(&request.refresh, TokenType::Refresh)
        .map_err(|e| {
            tracing::debug!(error = %e, "refresh token rejected");
            AppError::Authentication
        })?;

    if state.auth.find_user(user_id).await?.is_none() {
        return Err(AppError::Authentication);
    }

    let access = state
        .tokens
        .issue(user_id, TokenType::Access)
        .map_err(InternalError::from)?;
    Ok(Json(RefreshResponse { access }))
}

pub async fn list_todos(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Todo>>, AppError> {
    Ok(Json(state.todos.list(identity).await?))
}

pub async fn create_todo(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(new_todo): ApiJson<NewTodo>,
) -> Result<(StatusCode, Json<Todo>), AppError> {
    let todo = state.todos.create(identity, new_todo).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn get_todo(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(todo_id): ApiPath<i64>,
) -> Result<Json<Todo>, AppError> {
    Ok(Json(state.todos.get(identity, todo_id).await?))
}

/// Serves both `PUT` and `PATCH`; either way only the supplied fields change.
pub async fn update_todo(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(todo_id): ApiPath<i64>,
    ApiJson(patch): ApiJson<TodoPatch>,
) -> Result<Json<Todo>, AppError> {
    Ok(Json(state.todos.update(identity, todo_id, patch).await?))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(todo_id): ApiPath<i64>,
) -> Result<Response, AppError> {
    state.todos.delete(identity, todo_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn toggle_todo(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(todo_id): ApiPath<i64>,
) -> Result<Json<Todo>, AppError> {
    Ok(Json(state.todos.toggle(identity, todo_id).await?))
}
