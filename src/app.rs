use std::str::FromStr;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use axum_login::AuthManagerLayerBuilder;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tower_sessions::{cookie::Key, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::{
    api, authentication::SqliteAuthBackend, config::Config, config::ConfigError,
    crud_ops::TodoStore, guards, telemetry, tokens::TokenIssuer, web,
};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct AppState {
    pub todos: TodoStore,
    pub auth: SqliteAuthBackend,
    pub tokens: TokenIssuer,
}

pub async fn connect(database_url: &str) -> Result<SqlitePool, StartupError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let sqlite_pool = SqlitePoolOptions::new().connect_with(options).await?;
    sqlx::migrate!().run(&sqlite_pool).await?;
    Ok(sqlite_pool)
}

/// Builds the full application: JSON API under `/api`, web UI at the root.
pub async fn build_app(sqlite_pool: SqlitePool, config: &Config) -> Result<Router, StartupError> {
    let backend = SqliteAuthBackend::new(sqlite_pool.clone());
    let state = AppState {
        todos: TodoStore::new(sqlite_pool.clone()),
        auth: backend.clone(),
        tokens: TokenIssuer::new(
            config.jwt_secret.as_bytes(),
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        ),
    };

    let session_store = SqliteStore::new(sqlite_pool);
    session_store.migrate().await?;

    let key = match config.session_secret.as_deref() {
        Some(secret) => Key::from(secret),
        None => {
            tracing::warn!("SESSION_SECRET not set, sessions will not survive a restart");
            Key::generate()
        }
    };
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.session_cookie_secure)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(
            config.session_ttl_secs,
        )))
        .with_signed(key);
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    let api = Router::new()
        .route("/todos", get(api::list_todos).post(api::create_todo))
        .route(
            "/todos/{id}",
            get(api::get_todo)
                .put(api::update_todo)
                .patch(api::update_todo)
                .delete(api::delete_todo),
        )
        .route("/todos/{id}/toggle", post(api::toggle_todo))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guards::require_bearer,
        ))
        .route("/register", post(api::register))
        .route("/login", post(api::login))
        .route("/token/refresh", post(api::refresh));

    let web = Router::new()
        .route("/", get(web::todo_list))
        .route("/todo/create", get(web::create_form).post(web::create_todo))
        .route(
            "/todo/{id}/update",
            get(web::update_form).post(web::update_todo),
        )
        .route(
            "/todo/{id}/delete",
            get(web::delete_confirm).post(web::delete_todo),
        )
        .route("/todo/{id}/toggle", post(web::toggle_todo))
        .route_layer(middleware::from_fn(guards::require_login))
        .route("/signup", get(web::signup_form).post(web::signup))
        .route("/login", get(web::login_form).post(web::login))
        .route("/logout", post(web::logout))
        .layer(auth_layer);

    Ok(Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .merge(web)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(telemetry::make_span)
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)))
}
