use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::FieldErrors;

pub const TITLE_MAX_CHARS: usize = 200;
pub const USERNAME_MAX_CHARS: usize = 150;
pub const PASSWORD_MIN_CHARS: usize = 8;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern compiles"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@([\w-]+\.)+[A-Za-z]{2,}$").expect("email pattern compiles")
});

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
}

// keeps the hash out of Debug output, which ends up in traces
impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl axum_login::AuthUser for User {
    type Id = i64;

    fn id(&self) -> Self::Id {
        self.id
    }

    // when user changes password, auth session becomes invalid
    fn session_auth_hash(&self) -> &[u8] {
        self.password_hash.as_bytes()
    }
}

/// The authenticated principal attached to a request by the guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self { user_id: user.id }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTodo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Fields absent from the body are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TodoPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

/// Trims and checks a todo title, returning the value to store.
pub fn validate_title(title: Option<&str>) -> Result<String, FieldErrors> {
    let title = title.map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(FieldErrors::single("title", "Please enter a title for your todo."));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(FieldErrors::single(
            "title",
            format!("Title cannot exceed {TITLE_MAX_CHARS} characters."),
        ));
    }
    Ok(title.to_owned())
}

pub fn validate_username(username: &str, errors: &mut FieldErrors) {
    if username.is_empty() {
        errors.add("username", "This field is required.");
    } else if username.chars().count() > USERNAME_MAX_CHARS {
        errors.add(
            "username",
            format!("Ensure this field has no more than {USERNAME_MAX_CHARS} characters."),
        );
    } else if !USERNAME_RE.is_match(username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, \
             numbers, and @/./+/-/_ characters.",
        );
    }
}

pub fn validate_email(email: &str, errors: &mut FieldErrors) {
    if !email.is_empty() && !EMAIL_RE.is_match(email) {
        errors.add("email", "Enter a valid email address.");
    }
}

pub fn validate_password(username: &str, password: &str, errors: &mut FieldErrors) {
    if password.is_empty() {
        errors.add("password", "This field is required.");
        return;
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        errors.add(
            "password",
            format!(
                "This password is too short. \
                 It must contain at least {PASSWORD_MIN_CHARS} characters."
            ),
        );
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        errors.add("password", "This password is entirely numeric.");
    }
    if !username.is_empty() && password.eq_ignore_ascii_case(username) {
        errors.add("password", "The password is too similar to the username.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_trimmed_and_bounded() {
        assert_eq!(validate_title(Some("  Buy milk ")).unwrap(), "Buy milk");
        assert!(validate_title(None).is_err());
        assert!(validate_title(Some("")).is_err());
        assert!(validate_title(Some("   ")).is_err());

        let max = "é".repeat(TITLE_MAX_CHARS);
        assert_eq!(validate_title(Some(&max)).unwrap(), max);

        let err = validate_title(Some(&"a".repeat(TITLE_MAX_CHARS + 1))).unwrap_err();
        assert_eq!(err.get("title"), ["Title cannot exceed 200 characters."]);
    }

    #[test]
    fn username_rules() {
        let mut errors = FieldErrors::new();
        validate_username("alice.b+c@x-y_z", &mut errors);
        assert!(errors.is_empty());

        validate_username("", &mut errors);
        validate_username("has space", &mut errors);
        validate_username(&"u".repeat(USERNAME_MAX_CHARS + 1), &mut errors);
        assert_eq!(errors.get("username").len(), 3);
    }

    #[test]
    fn email_is_optional_but_checked() {
        let mut errors = FieldErrors::new();
        validate_email("", &mut errors);
        validate_email("alice@x.com", &mut errors);
        assert!(errors.is_empty());

        validate_email("not-an-email", &mut errors);
        assert_eq!(errors.get("email"), ["Enter a valid email address."]);
    }

    #[test]
    fn password_policy() {
        let mut errors = FieldErrors::new();
        validate_password("alice", "Passw0rd!", &mut errors);
        assert!(errors.is_empty());

        let mut errors = FieldErrors::new();
        validate_password("alice", "1234567", &mut errors);
        assert_eq!(errors.get("password").len(), 2);

        let mut errors = FieldErrors::new();
        validate_password("alicealice", "AliceAlice", &mut errors);
        assert_eq!(
            errors.get("password"),
            ["The password is too similar to the username."]
        );
    }

    #[test]
    fn serialized_todo_hides_owner() {
        let todo = Todo {
            id: 7,
            user_id: 42,
            title: "Buy milk".into(),
            description: String::new(),
            completed: false,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&todo).unwrap();
        assert!(value.get("user_id").is_none());
        assert_eq!(value["title"], "Buy milk");
        assert_eq!(value["completed"], false);
        assert!(value["created_at"].is_string());
    }

    #[test]
    fn serialized_user_hides_password_hash() {
        let user = User {
            id: 1,
            username: "alice".into(),
            email: "alice@x.com".into(),
            password_hash: "$argon2id$secret".into(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert!(!format!("{user:?}").contains("argon2"));
    }

    #[test]
    fn patch_ignores_read_only_fields() {
        let patch: TodoPatch =
            serde_json::from_str(r#"{"created_at": "2020-01-01T00:00:00Z", "id": 9}"#).unwrap();
        assert!(patch.is_empty());
    }
}
