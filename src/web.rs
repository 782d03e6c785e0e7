use axum::{
    extract::{rejection::PathRejection, FromRequestParts, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    app::AppState,
    authentication::{AuthSession, Credentials},
    entities::{Identity, NewTodo, TodoPatch},
    error::{AppError, FieldErrors},
    pages,
};

const FLASH_KEY: &str = "flash";

/// HTML rendering of [`AppError`] for browser routes.
#[derive(Debug)]
pub struct WebError(AppError);

impl From<AppError> for WebError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<PathRejection> for WebError {
    fn from(_: PathRejection) -> Self {
        Self(AppError::NotFound)
    }
}

impl From<tower_sessions::session::Error> for WebError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self.0 {
            AppError::NotFound => (StatusCode::NOT_FOUND, pages::not_found()).into_response(),
            AppError::Authentication | AppError::InvalidCredentials => {
                Redirect::to("/login").into_response()
            }
            AppError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, pages::bad_request(&errors)).into_response()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, pages::server_error()).into_response()
            }
        }
    }
}

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(WebError))]
pub struct PagePath<T>(pub T);

#[derive(Debug, Default, Deserialize)]
pub struct TodoForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Serialize)]
struct ToggleResponse {
    completed: bool,
    message: &'static str,
}

async fn push_flash(session: &Session, message: &str) -> Result<(), WebError> {
    let mut flashes: Vec<String> = session.get(FLASH_KEY).await?.unwrap_or_default();
    flashes.push(message.to_owned());
    session.insert(FLASH_KEY, flashes).await?;
    Ok(())
}

async fn take_flashes(session: &Session) -> Result<Vec<String>, WebError> {
    Ok(session.remove(FLASH_KEY).await?.unwrap_or_default())
}

fn signed_in_as(auth_session: &AuthSession) -> &str {
    auth_session
        .user
        .as_ref()
        .map(|user| user.username.as_str())
        .unwrap_or_default()
}

/// Only same-site relative paths are followed after login.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

pub async fn todo_list(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Extension(identity): Extension<Identity>,
) -> Result<Response, WebError> {
    let todos = state.todos.list(identity).await?;
    let flashes = take_flashes(&session).await?;
    Ok(pages::todo_list(signed_in_as(&auth_session), &todos, &flashes).into_response())
}

pub async fn create_form(auth_session: AuthSession) -> Response {
    let username = signed_in_as(&auth_session);
    pages::todo_form(username, "Create Todo", "/todo/create", "", "", &FieldErrors::new())
        .into_response()
}

pub async fn create_todo(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Extension(identity): Extension<Identity>,
    Form(form): Form<TodoForm>,
) -> Result<Response, WebError> {
    let new_todo = NewTodo {
        title: Some(form.title.clone()),
        description: Some(form.description.clone()),
    };

    match state.todos.create(identity, new_todo).await {
        Ok(_) => {
            push_flash(&session, "Todo created successfully!").await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(AppError::Validation(errors)) => {
            let page = pages::todo_form(
                signed_in_as(&auth_session),
                "Create Todo",
                "/todo/create",
                &form.title,
                &form.description,
                &errors,
            );
            Ok((StatusCode::BAD_REQUEST, page).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn update_form(
    State(state): State<AppState>,
    auth_session: AuthSession,
    Extension(identity): Extension<Identity>,
    PagePath(todo_id): PagePath<i64>,
) -> Result<Response, WebError> {
    let todo = state.todos.get(identity, todo_id).await?;
    let action = format!("/todo/{}/update", todo.id);
    let page = pages::todo_form(
        signed_in_as(&auth_session),
        "Update Todo",
        &action,
        &todo.title,
        &todo.description,
        &FieldErrors::new(),
    );
    Ok(page.into_response())
}

pub async fn update_todo(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Extension(identity): Extension<Identity>,
    PagePath(todo_id): PagePath<i64>,
    Form(form): Form<TodoForm>,
) -> Result<Response, WebError> {
    let patch = TodoPatch {
        title: Some(form.title.clone()),
        description: Some(form.description.clone()),
        completed: None,
    };

    match state.todos.update(identity, todo_id, patch).await {
        Ok(_) => {
            push_flash(&session, "Todo updated successfully!").await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(AppError::Validation(errors)) => {
            let action = format!("/todo/{todo_id}/update");
            let page = pages::todo_form(
                signed_in_as(&auth_session),
                "Update Todo",
                &action,
                &form.title,
                &form.description,
                &errors,
            );
            Ok((StatusCode::BAD_REQUEST, page).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_confirm(
    State(state): State<AppState>,
    auth_session: AuthSession,
    Extension(identity): Extension<Identity>,
    PagePath(todo_id): PagePath<i64>,
) -> Result<Response, WebError> {
    let todo = state.todos.get(identity, todo_id).await?;
    Ok(pages::confirm_delete(signed_in_as(&auth_session), &todo).into_response())
}

pub async fn delete_todo(
    State(state): State<AppState>,
    session: Session,
    Extension(identity): Extension<Identity>,
    PagePath(todo_id): PagePath<i64>,
) -> Result<Response, WebError> {
    state.todos.delete(identity, todo_id).await?;
    push_flash(&session, "Todo deleted successfully!").await?;
    Ok(Redirect::to("/").into_response())
}

/// Answers with JSON for `X-Requested-With: XMLHttpRequest`, otherwise
/// redirects to the list with a flash message.
pub async fn toggle_todo(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Extension(identity): Extension<Identity>,
    PagePath(todo_id): PagePath<i64>,
) -> Result<Response, WebError> {
    let todo = state.todos.toggle(identity, todo_id).await?;
    let message = if todo.completed {
        "Marked as completed"
    } else {
        "Marked as incomplete"
    };

    let is_ajax = headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));

    if is_ajax {
        return Ok(Json(ToggleResponse {
            completed: todo.completed,
            message,
        })
        .into_response());
    }

    push_flash(&session, message).await?;
    Ok(Redirect::to("/").into_response())
}

pub async fn signup_form() -> Response {
    pages::signup("", "", &FieldErrors::new()).into_response()
}

pub async fn signup(
    State(state): State<AppState>,
    mut auth_session: AuthSession,
    Form(form): Form<SignupForm>,
) -> Result<Response, WebError> {
    let mut errors = FieldErrors::new();
    if form.email.trim().is_empty() {
        errors.add("email", "This field is required.");
    }
    if form.password1 != form.password2 {
        errors.add("password2", "The two password fields didn't match.");
    }

    let registered = if errors.is_empty() {
        state
            .auth
            .register(&form.username, Some(&form.email), &form.password1)
            .await
    } else {
        Err(AppError::Validation(errors))
    };

    match registered {
        Ok(user) => {
            auth_session.login(&user).await.map_err(AppError::from)?;
            Ok(Redirect::to("/").into_response())
        }
        Err(AppError::Validation(errors)) => Ok((
            StatusCode::BAD_REQUEST,
            pages::signup(&form.username, &form.email, &errors),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

pub async fn login_form(Query(query): Query<NextQuery>) -> Response {
    pages::login("", safe_next(query.next.as_deref()), None).into_response()
}

pub async fn login(
    mut auth_session: AuthSession,
    Form(creds): Form<Credentials>,
) -> Result<Response, WebError> {
    let username = creds.username.clone();
    let next = creds.next.clone();

    let user = match auth_session.authenticate(creds).await.map_err(AppError::from)? {
        Some(user) => user,
        None => {
            return Ok((
                StatusCode::UNAUTHORIZED,
                pages::login(
                    &username,
                    safe_next(next.as_deref()),
                    Some("Please enter a correct username and password."),
                ),
            )
                .into_response())
        }
    };

    auth_session.login(&user).await.map_err(AppError::from)?;
    tracing::info!(user_id = user.id, "web login");

    let target = safe_next(next.as_deref()).unwrap_or("/");
    Ok(Redirect::to(target).into_response())
}

pub async fn logout(mut auth_session: AuthSession) -> Result<Response, WebError> {
    auth_session.logout().await.map_err(AppError::from)?;
    Ok(Redirect::to("/login").into_response())
}
