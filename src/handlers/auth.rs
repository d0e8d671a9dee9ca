//! Admin authentication handlers

use crate::models::*;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use super::{get_client_ip, get_user_agent, AppState};

/// Session cookie name
pub const SESSION_COOKIE: &str = "cf_admin_session";

/// Rate limit: max attempts per IP per hour
const MAX_LOGIN_ATTEMPTS: i64 = 10;

// =============================================================================
// Login Endpoint
// =============================================================================

/// Admin login
pub async fn admin_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    input: Result<Json<LoginRequest>, JsonRejection>,
) -> impl IntoResponse {
    let no_cookie = [(header::SET_COOKIE, String::new())];
    let Ok(Json(input)) = input else {
        return (
            StatusCode::BAD_REQUEST,
            no_cookie,
            Json(ApiResponse::error("Username and password are required")),
        );
    };

    let client_ip = get_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());

    if !check_rate_limit(&state.pool, &client_ip, "login").await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            no_cookie,
            Json(ApiResponse::error(
                "Too many login attempts. Please try again later.",
            )),
        );
    }
    record_attempt(&state.pool, &client_ip, "login").await;

    let user = sqlx::query_as::<_, AdminUser>(
        "SELECT * FROM admin_users WHERE username = $1 AND is_active = true",
    )
    .bind(input.username.trim())
    .fetch_optional(&state.pool)
    .await;

    let user = match user {
        Ok(Some(u)) => u,
        Ok(None) => {
            // Don't reveal whether username exists
            return (
                StatusCode::UNAUTHORIZED,
                no_cookie,
                Json(ApiResponse::error("Invalid username or password")),
            );
        }
        Err(e) => {
            tracing::error!("Failed to load admin user: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                no_cookie,
                Json(ApiResponse::error("Authentication error")),
            );
        }
    };

    let parsed_hash = match PasswordHash::new(&user.password_hash) {
        Ok(h) => h,
        Err(_) => {
            tracing::error!("Invalid password hash in database for user {}", user.username);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                no_cookie,
                Json(ApiResponse::error("Authentication error")),
            );
        }
    };

    if Argon2::default()
        .verify_password(input.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        tracing::warn!("Failed admin login for {} from {}", user.username, client_ip);
        return (
            StatusCode::UNAUTHORIZED,
            no_cookie,
            Json(ApiResponse::error("Invalid username or password")),
        );
    }

    let token = generate_session_token();
    let expires_at = Utc::now() + Duration::hours(state.session_expiry_hours);

    let session_result = sqlx::query(
        r#"
        INSERT INTO admin_sessions (admin_user_id, token_hash, expires_at, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user.id)
    .bind(hash_token(&token))
    .bind(expires_at)
    .bind(&client_ip)
    .bind(get_user_agent(&headers))
    .execute(&state.pool)
    .await;

    if let Err(e) = session_result {
        tracing::error!("Failed to create session: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            no_cookie,
            Json(ApiResponse::error("Failed to create session")),
        );
    }

    let _ = sqlx::query("UPDATE admin_users SET last_login_at = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&state.pool)
        .await;

    tracing::info!("Admin {} logged in from {}", user.username, client_ip);

    (
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            session_cookie(&token, state.session_expiry_hours * 3600, state.is_production),
        )],
        Json(ApiResponse::success(AdminUserResponse::from(user))),
    )
}

/// Admin logout
pub async fn admin_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let deleted = sqlx::query("DELETE FROM admin_sessions WHERE token_hash = $1")
            .bind(hash_token(&token))
            .execute(&state.pool)
            .await;
        if let Err(e) = deleted {
            tracing::error!("Failed to delete session: {}", e);
        }
    }

    (
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie("", 0, state.is_production))],
        Json(ApiResponse::success(())),
    )
}

/// Get current admin user
pub async fn get_current_admin(Extension(admin): Extension<AdminUser>) -> impl IntoResponse {
    Json(ApiResponse::success(AdminUserResponse::from(admin)))
}

// =============================================================================
// Session Validation
// =============================================================================

/// Admin behind the session cookie, if the session is live.
pub async fn session_admin(
    pool: &PgPool,
    headers: &HeaderMap,
) -> Result<Option<AdminUser>, sqlx::Error> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };

    let session = sqlx::query_as::<_, AdminSession>(
        r#"
        SELECT * FROM admin_sessions
        WHERE token_hash = $1 AND expires_at > NOW()
        "#,
    )
    .bind(hash_token(&token))
    .fetch_optional(pool)
    .await?;

    let Some(session) = session else {
        return Ok(None);
    };

    sqlx::query_as::<_, AdminUser>(
        "SELECT * FROM admin_users WHERE id = $1 AND is_active = true",
    )
    .bind(session.admin_user_id)
    .fetch_optional(pool)
    .await
}

// =============================================================================
// Password Utilities
// =============================================================================

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Create the configured admin account if no account with that username
/// exists yet.
pub async fn ensure_admin_user(
    pool: &PgPool,
    username: &str,
    email: &str,
    password: &str,
) -> Result<bool, sqlx::Error> {
    let password_hash =
        hash_password(password).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    let created = sqlx::query(
        r#"
        INSERT INTO admin_users (username, email, password_hash)
        VALUES ($1, $2, $3)
        ON CONFLICT (username) DO NOTHING
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .execute(pool)
    .await?;

    Ok(created.rows_affected() > 0)
}

// =============================================================================
// Helper Functions
// =============================================================================

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    let prefix = format!("{}=", SESSION_COOKIE);

    cookie_header
        .split(';')
        .filter_map(|cookie| cookie.trim().strip_prefix(prefix.as_str()))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn session_cookie(token: &str, max_age: i64, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        max_age,
        if secure { "; Secure" } else { "" }
    )
}

fn generate_session_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

/// Sessions are stored by SHA-256 of the token, never the token itself.
pub(crate) fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

async fn check_rate_limit(pool: &PgPool, ip: &str, endpoint: &str) -> bool {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM rate_limit_attempts
        WHERE ip_address = $1 AND endpoint = $2
        AND attempted_at > NOW() - INTERVAL '1 hour'
        "#,
    )
    .bind(ip)
    .bind(endpoint)
    .fetch_one(pool)
    .await
    .unwrap_or(0);

    count < MAX_LOGIN_ATTEMPTS
}

async fn record_attempt(pool: &PgPool, ip: &str, endpoint: &str) {
    let _ = sqlx::query(
        "INSERT INTO rate_limit_attempts (ip_address, endpoint) VALUES ($1, $2)",
    )
    .bind(ip)
    .bind(endpoint)
    .execute(pool)
    .await;
}
