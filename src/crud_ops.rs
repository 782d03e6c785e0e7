//! Ownership-scoped todo operations shared by the API and the web UI.
//!
//! Every statement filters on both the todo id and the caller's user id, so a
//! record owned by someone else is indistinguishable from a missing one.

use chrono::Utc;
use sqlx::sqlite::SqlitePool;

use crate::{
    entities::{validate_title, Identity, NewTodo, Todo, TodoPatch},
    error::AppError,
};

const TODO_COLUMNS: &str = "id, user_id, title, description, completed, created_at";

#[derive(Debug, Clone)]
pub struct TodoStore {
    sqlite_pool: SqlitePool,
}

impl TodoStore {
    pub fn new(sqlite_pool: SqlitePool) -> Self {
        Self { sqlite_pool }
    }

    /// All todos owned by `identity`, newest first.
    pub async fn list(&self, identity: Identity) -> Result<Vec<Todo>, AppError> {
        let todos: Vec<Todo> = sqlx::query_as(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(identity.user_id)
        .fetch_all(&self.sqlite_pool)
        .await?;
        Ok(todos)
    }

    #[tracing::instrument(skip(self, identity, new_todo), fields(user_id = identity.user_id))]
    pub async fn create(&self, identity: Identity, new_todo: NewTodo) -> Result<Todo, AppError> {
        let title = validate_title(new_todo.title.as_deref()).map_err(AppError::Validation)?;
        let description = new_todo.description.unwrap_or_default();

        let todo: Todo = sqlx::query_as(&format!(
            "INSERT INTO todos (user_id, title, description, completed, created_at) \
             VALUES (?, ?, ?, 0, ?) RETURNING {TODO_COLUMNS}"
        ))
        .bind(identity.user_id)
        .bind(title)
        .bind(description)
        .bind(Utc::now())
        .fetch_one(&self.sqlite_pool)
        .await?;

        tracing::info!(todo_id = todo.id, "todo created");
        Ok(todo)
    }

    pub async fn get(&self, identity: Identity, todo_id: i64) -> Result<Todo, AppError> {
        let todo: Option<Todo> = sqlx::query_as(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE id = ? AND user_id = ?"
        ))
        .bind(todo_id)
        .bind(identity.user_id)
        .fetch_optional(&self.sqlite_pool)
        .await?;
        todo.ok_or(AppError::NotFound)
    }

    /// Applies the fields present in `patch` in a single statement.
    ///
    /// An empty patch is an ownership-checked read: the todo unchanged, or
    /// `NotFound`. A todo the caller does not own is `NotFound` even when the
    /// patch itself is invalid.
    #[tracing::instrument(skip(self, identity, patch), fields(user_id = identity.user_id))]
    pub async fn update(
        &self,
        identity: Identity,
        todo_id: i64,
        patch: TodoPatch,
    ) -> Result<Todo, AppError> {
        if patch.is_empty() {
            return self.get(identity, todo_id).await;
        }

        let title = match patch.title.as_deref() {
            Some(title) => match validate_title(Some(title)) {
                Ok(title) => Some(title),
                Err(errors) => {
                    // not found wins over a bad patch
                    self.get(identity, todo_id).await?;
                    return Err(AppError::Validation(errors));
                }
            },
            None => None,
        };

        let todo: Option<Todo> = sqlx::query_as(&format!(
            "UPDATE todos SET \
                 title = COALESCE(?, title), \
                 description = COALESCE(?, description), \
                 completed = COALESCE(?, completed) \
             WHERE id = ? AND user_id = ? RETURNING {TODO_COLUMNS}"
        ))
        .bind(title)
        .bind(patch.description)
        .bind(patch.completed)
        .bind(todo_id)
        .bind(identity.user_id)
        .fetch_optional(&self.sqlite_pool)
        .await?;

        let todo = todo.ok_or(AppError::NotFound)?;
        tracing::info!("todo updated");
        Ok(todo)
    }

    /// Flips `completed` with one read-modify-write statement, so concurrent
    /// toggles never collapse into one.
    #[tracing::instrument(skip(self, identity), fields(user_id = identity.user_id))]
    pub async fn toggle(&self, identity: Identity, todo_id: i64) -> Result<Todo, AppError> {
        let todo: Option<Todo> = sqlx::query_as(&format!(
            "UPDATE todos SET completed = NOT completed \
             WHERE id = ? AND user_id = ? RETURNING {TODO_COLUMNS}"
        ))
        .bind(todo_id)
        .bind(identity.user_id)
        .fetch_optional(&self.sqlite_pool)
        .await?;

        let todo = todo.ok_or(AppError::NotFound)?;
        tracing::info!(completed = todo.completed, "todo toggled");
        Ok(todo)
    }

    #[tracing::instrument(skip(self, identity), fields(user_id = identity.user_id))]
    pub async fn delete(&self, identity: Identity, todo_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ? AND user_id = ?")
            .bind(todo_id)
            .bind(identity.user_id)
            .execute(&self.sqlite_pool)
            .await?;

        if result.rows_affected() > 0 {
            tracing::info!("todo deleted");
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }
}
