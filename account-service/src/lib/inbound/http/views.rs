use std::collections::BTreeMap;
use std::fmt::Write;

use axum::response::Html;

use super::csrf::CSRF_FIELD;
use super::middleware::login_url;
use super::middleware::CurrentSession;
use crate::domain::session::models::FlashMessage;
use crate::domain::session::models::Identity;
use crate::domain::user::models::User;

/// Per-request data every page needs.
///
/// Loading it consumes the pending flash messages.
pub struct PageContext {
    pub identity: Identity,
    pub csrf_token: String,
    pub flashes: Vec<FlashMessage>,
}

impl PageContext {
    pub async fn load(current: &CurrentSession, identity: &Identity) -> Self {
        Self {
            identity: identity.clone(),
            csrf_token: current.csrf_token().await,
            flashes: current.take_flashes().await,
        }
    }
}

/// Validation messages keyed by form field.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Values echoed back into a redisplayed form. Passwords are never echoed.
#[derive(Debug, Default, Clone)]
pub struct FormValues {
    pub username: String,
    pub email: String,
    pub remember: bool,
}

pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, ctx: &PageContext, content: &str) -> Html<String> {
    let nav = match ctx.identity.user() {
        Some(user) => format!(
            r#"<a href="/dashboard">Dashboard</a> <a href="/profile">Profile ({})</a> <a href="/logout">Logout</a>"#,
            escape(user.username.as_str())
        ),
        None => r#"<a href="/login">Login</a> <a href="/register">Register</a>"#.to_string(),
    };

    let mut flashes = String::new();
    for flash in &ctx.flashes {
        let _ = write!(
            flashes,
            r#"<div class="alert alert-{}">{}</div>"#,
            flash.category.as_str(),
            escape(&flash.message)
        );
    }

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
</head>
<body>
<nav><a href="/">Home</a> {nav}</nav>
<main>
{flashes}
{content}
</main>
</body>
</html>"#,
        title = escape(title),
    ))
}

fn csrf_input(ctx: &PageContext) -> String {
    format!(
        r#"<input type="hidden" name="{}" value="{}">"#,
        CSRF_FIELD,
        escape(&ctx.csrf_token)
    )
}

fn errors_for(errors: &FieldErrors, field: &str) -> String {
    errors
        .get(field)
        .iter()
        .map(|message| format!(r#"<span class="error">{}</span>"#, escape(message)))
        .collect()
}

fn text_field(label: &str, name: &str, kind: &str, value: &str, errors: &FieldErrors) -> String {
    format!(
        r#"<p><label for="{name}">{label}</label>
<input id="{name}" name="{name}" type="{kind}" value="{value}">
{errors}</p>"#,
        label = escape(label),
        value = escape(value),
        errors = errors_for(errors, name),
    )
}

pub fn index(ctx: &PageContext) -> Html<String> {
    let content = match ctx.identity.user() {
        Some(user) => format!(
            r#"<h1>Welcome back, {}</h1><p><a href="/dashboard">Go to your dashboard</a></p>"#,
            escape(user.username.as_str())
        ),
        None => r#"<h1>Welcome</h1><p><a href="/register">Create an account</a> or <a href="/login">log in</a>.</p>"#
            .to_string(),
    };
    layout("Home", ctx, &content)
}

pub fn login(
    ctx: &PageContext,
    values: &FormValues,
    errors: &FieldErrors,
    next: Option<&str>,
) -> Html<String> {
    let action = next.map(login_url).unwrap_or_else(|| "/login".to_string());

    let content = format!(
        r#"<h1>Login</h1>
<form method="post" action="{action}">
{csrf}
{email}
{password}
<p><label><input name="remember" type="checkbox" value="y"{checked}> Remember Me</label></p>
<p><button type="submit">Login</button></p>
</form>
<p>Need an account? <a href="/register">Sign up</a></p>"#,
        action = escape(&action),
        csrf = csrf_input(ctx),
        email = text_field("Email", "email", "email", &values.email, errors),
        password = text_field("Password", "password", "password", "", errors),
        checked = if values.remember { " checked" } else { "" },
    );
    layout("Login", ctx, &content)
}

pub fn register(ctx: &PageContext, values: &FormValues, errors: &FieldErrors) -> Html<String> {
    let content = format!(
        r#"<h1>Register</h1>
<form method="post" action="/register">
{csrf}
{username}
{email}
{password}
{confirm}
<p><button type="submit">Sign Up</button></p>
</form>
<p>Already have an account? <a href="/login">Log in</a></p>"#,
        csrf = csrf_input(ctx),
        username = text_field("Username", "username", "text", &values.username, errors),
        email = text_field("Email", "email", "email", &values.email, errors),
        password = text_field("Password", "password", "password", "", errors),
        confirm = text_field(
            "Confirm Password",
            "confirm_password",
            "password",
            "",
            errors
        ),
    );
    layout("Register", ctx, &content)
}

pub fn dashboard(ctx: &PageContext, user: &User) -> Html<String> {
    let content = format!(
        r#"<h1>Dashboard</h1>
<p>Hello, {username}!</p>
<p>Email: {email}</p>
<p>Member since {since}</p>"#,
        username = escape(user.username.as_str()),
        email = escape(user.email.as_str()),
        since = user.created_at.format("%B %-d, %Y"),
    );
    layout("Dashboard", ctx, &content)
}

pub fn profile(ctx: &PageContext, values: &FormValues, errors: &FieldErrors) -> Html<String> {
    let content = format!(
        r#"<h1>Profile</h1>
<form method="post" action="/profile">
{csrf}
{username}
{email}
{password}
{confirm}
<p><button type="submit">Update Profile</button></p>
</form>"#,
        csrf = csrf_input(ctx),
        username = text_field("Username", "username", "text", &values.username, errors),
        email = text_field("Email", "email", "email", &values.email, errors),
        password = text_field("New Password", "password", "password", "", errors),
        confirm = text_field(
            "Confirm New Password",
            "confirm_password",
            "password",
            "",
            errors
        ),
    );
    layout("Profile", ctx, &content)
}

/// Bare error page; rendered without session context.
pub fn error_page(title: &str, message: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title}</title></head>
<body><h1>{title}</h1><p>{message}</p><p><a href="/">Home</a></p></body>
</html>"#,
        title = escape(title),
        message = escape(message),
    ))
}
