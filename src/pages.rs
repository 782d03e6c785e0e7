//! Server-rendered HTML for the web UI.

use std::fmt::Write;

use axum::response::Html;

use crate::{
    entities::{Todo, TITLE_MAX_CHARS},
    error::FieldErrors,
};

/// Escapes text for use in element content and quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, username: Option<&str>, flashes: &[String], body: &str) -> Html<String> {
    let nav = match username {
        Some(name) => format!(
            r#"<span>Signed in as {}</span>
<form method="post" action="/logout" class="inline"><button type="submit">Log out</button></form>"#,
            escape(name)
        ),
        None => r#"<a href="/login">Log in</a> <a href="/signup">Sign up</a>"#.to_owned(),
    };

    let mut messages = String::new();
    for flash in flashes {
        let _ = write!(messages, r#"<div class="alert">{}</div>"#, escape(flash));
    }

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title} | Todos</title></head>
<body>
<nav>{nav}</nav>
{messages}
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
    ))
}

fn field_errors(errors: &FieldErrors, field: &str) -> String {
    errors
        .get(field)
        .iter()
        .map(|msg| format!(r#"<p class="error">{}</p>"#, escape(msg)))
        .collect()
}

pub fn todo_list(username: &str, todos: &[Todo], flashes: &[String]) -> Html<String> {
    let mut body = String::from(r#"<p><a href="/todo/create">New todo</a></p>"#);

    if todos.is_empty() {
        body.push_str("<p>No todos yet.</p>");
    } else {
        body.push_str("<ul>");
        for todo in todos {
            let _ = write!(
                body,
                r#"<li class="{state}">
<form method="post" action="/todo/{id}/toggle" class="inline"><button type="submit">{toggle}</button></form>
<strong>{title}</strong> <small>{created}</small>
<p>{description}</p>
<a href="/todo/{id}/update">Edit</a> <a href="/todo/{id}/delete">Delete</a>
</li>"#,
                id = todo.id,
                state = if todo.completed { "completed" } else { "pending" },
                toggle = if todo.completed { "Undo" } else { "Done" },
                title = escape(&todo.title),
                description = escape(&todo.description),
                created = todo.created_at.format("%Y-%m-%d %H:%M"),
            );
        }
        body.push_str("</ul>");
    }

    layout("My todos", Some(username), flashes, &body)
}

pub fn todo_form(
    username: &str,
    heading: &str,
    action: &str,
    title: &str,
    description: &str,
    errors: &FieldErrors,
) -> Html<String> {
    let body = format!(
        r#"<form method="post" action="{action}">
<label for="title">Todo Title</label>
<input id="title" name="title" maxlength="{max}" placeholder="Enter a descriptive title" value="{title}">
{title_errors}
<label for="description">Description</label>
<textarea id="description" name="description" rows="4" placeholder="Add a detailed description (optional)">{description}</textarea>
<button type="submit">Save</button> <a href="/">Cancel</a>
</form>"#,
        action = escape(action),
        max = TITLE_MAX_CHARS,
        title = escape(title),
        title_errors = field_errors(errors, "title"),
        description = escape(description),
    );
    layout(heading, Some(username), &[], &body)
}

pub fn confirm_delete(username: &str, todo: &Todo) -> Html<String> {
    let body = format!(
        r#"<p>Are you sure you want to delete "{title}"?</p>
<form method="post" action="/todo/{id}/delete">
<button type="submit">Delete</button> <a href="/">Cancel</a>
</form>"#,
        title = escape(&todo.title),
        id = todo.id,
    );
    layout("Delete todo", Some(username), &[], &body)
}

pub fn login(username: &str, next: Option<&str>, error: Option<&str>) -> Html<String> {
    let error = error
        .map(|msg| format!(r#"<p class="error">{}</p>"#, escape(msg)))
        .unwrap_or_default();
    let next = next
        .map(|n| format!(r#"<input type="hidden" name="next" value="{}">"#, escape(n)))
        .unwrap_or_default();

    let body = format!(
        r#"{error}<form method="post" action="/login">
{next}
<label for="username">Username</label>
<input id="username" name="username" value="{username}" autofocus>
<label for="password">Password</label>
<input id="password" name="password" type="password">
<button type="submit">Log in</button>
</form>
<p>No account? <a href="/signup">Sign up</a></p>"#,
        username = escape(username),
    );
    layout("Log in", None, &[], &body)
}

pub fn signup(username: &str, email: &str, errors: &FieldErrors) -> Html<String> {
    let body = format!(
        r#"<form method="post" action="/signup">
<label for="username">Username</label>
<input id="username" name="username" value="{username}" placeholder="Choose a username">
{username_errors}
<label for="email">Email</label>
<input id="email" name="email" type="email" value="{email}" placeholder="Enter your email">
{email_errors}
<label for="password1">Password</label>
<input id="password1" name="password1" type="password" placeholder="Enter your password">
{password_errors}
<label for="password2">Repeat Password</label>
<input id="password2" name="password2" type="password" placeholder="Repeat your password">
{password2_errors}
<button type="submit">Sign up</button>
</form>
<p>Already registered? <a href="/login">Log in</a></p>"#,
        username = escape(username),
        email = escape(email),
        username_errors = field_errors(errors, "username"),
        email_errors = field_errors(errors, "email"),
        password_errors = field_errors(errors, "password"),
        password2_errors = field_errors(errors, "password2"),
    );
    layout("Sign up", None, &[], &body)
}

pub fn not_found() -> Html<String> {
    layout(
        "Not found",
        None,
        &[],
        r#"<p>The page you requested does not exist.</p><p><a href="/">Back to your todos</a></p>"#,
    )
}

pub fn server_error() -> Html<String> {
    layout(
        "Something went wrong",
        None,
        &[],
        "<p>An unexpected error occurred. Please try again.</p>",
    )
}

pub fn bad_request(errors: &FieldErrors) -> Html<String> {
    let mut body = String::from("<p>The submitted data was invalid.</p>");
    for field in ["non_field_errors", "title", "username", "password"] {
        body.push_str(&field_errors(errors, field));
    }
    layout("Bad request", None, &[], &body)
}
