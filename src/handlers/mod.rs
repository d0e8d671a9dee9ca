//! HTTP request handlers

pub mod audit;
pub mod auth;
pub mod forms;
pub mod middleware;
pub mod submissions;

pub use audit::*;
pub use auth::*;
pub use forms::*;
pub use submissions::*;

use crate::error::{AppError, ValidationErrors};
use crate::forms::FormStore;
use crate::models::PageRequest;
use crate::repository::PgFormRepository;
use crate::submissions::SubmissionStore;
use crate::validation::{validate_pagination, PageDefaults};
use axum::http::{header, HeaderMap};
use sqlx::PgPool;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub forms: FormStore<PgFormRepository>,
    pub submissions: SubmissionStore<PgFormRepository>,
    pub paging: PageDefaults,
    pub is_production: bool,
    pub session_expiry_hours: i64,
}

impl AppState {
    pub fn new(pool: PgPool, paging: PageDefaults, is_production: bool, session_expiry_hours: i64) -> Self {
        let repo = PgFormRepository::new(pool.clone());
        Self {
            pool,
            forms: FormStore::new(repo.clone()),
            submissions: SubmissionStore::new(repo),
            paging,
            is_production,
            session_expiry_hours,
        }
    }

    fn page(&self, page: Option<i64>, limit: Option<i64>) -> Result<PageRequest, AppError> {
        Ok(validate_pagination(page, limit, self.paging)?)
    }
}

/// Turn an extractor rejection into a 400 keyed by the request part.
fn rejected(part: &str, rejection: impl std::fmt::Display) -> AppError {
    let mut errors = ValidationErrors::new();
    errors.add(part, rejection.to_string());
    AppError::Validation(errors)
}

/// Client IP as reported by the reverse proxy.
pub fn get_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(first_ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        let ip = first_ip.trim();
        if !ip.is_empty() {
            return Some(ip.to_string());
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

pub fn get_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.chars().take(500).collect::<String>())
}
