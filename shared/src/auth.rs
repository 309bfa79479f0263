use lambda_http::http::header::{HeaderValue, SET_COOKIE};
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Deserialize;

use libris_atoms::http::{error_response, json_response, parse_body};
use libris_atoms::users::{register_profile, RegistrationDetails};
use libris_atoms::AtomError;

use crate::config::AppConfig;
use crate::session::{close_session, open_session, SessionContext, ACCESS_TOKEN_COOKIE};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupPayload {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub details: RegistrationDetails,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetPayload {
    pub email: String,
}

pub fn session_cookie(token: &str, max_age: i32) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; Secure; SameSite=None; Max-Age={}",
        ACCESS_TOKEN_COOKIE, token, max_age
    )
}

pub fn clear_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; Secure; SameSite=None; Max-Age=0", name)
}

/// Origin to echo in `Access-Control-Allow-Origin`.
pub fn get_cors_origin(config: &AppConfig, request_origin: Option<&str>) -> String {
    if config.allowed_origins.is_empty() {
        return "*".to_string();
    }
    match request_origin {
        Some(origin) if config.allowed_origins.iter().any(|o| o == origin) => origin.to_string(),
        _ => config.allowed_origins[0].clone(),
    }
}

fn with_cookie(mut resp: Response<Body>, cookie: &str) -> Response<Body> {
    if let Ok(v) = HeaderValue::from_str(cookie) {
        resp.headers_mut().append(SET_COOKIE, v);
    }
    resp
}

fn validate_email(email: &str) -> Result<String, AtomError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AtomError::validation("Please enter a valid email address")),
    }
}

/// HTTP Handler: POST /login
pub async fn login(state: &AppState, body: &[u8]) -> Result<Response<Body>, Error> {
    let payload: LoginPayload = match parse_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    let email = match validate_email(&payload.email) {
        Ok(e) => e,
        Err(e) => return error_response(&e),
    };
    if payload.password.is_empty() {
        return error_response(&AtomError::validation("Please enter your password"));
    }

    let tokens = match state.identity.sign_in(&email, &payload.password).await {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!("⚠️ login rejected: {}", e);
            return error_response(&e);
        }
    };

    let opened = open_session(
        state.identity.as_ref(),
        state.ledger.as_ref(),
        &state.config.admin_emails,
        &tokens.access_token,
    )
    .await;
    let (session, profile) = match opened {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("❌ login could not resolve profile: {}", e);
            return error_response(&e);
        }
    };

    tracing::info!(user_id = %session.user_id, role = %session.role, "✅ login");
    let resp = json_response(
        StatusCode::OK,
        &serde_json::json!({
            "access_token": tokens.access_token,
            "expires_in": tokens.expires_in,
            "session": session,
            "user": profile,
        }),
    )?;
    Ok(with_cookie(resp, &session_cookie(&tokens.access_token, tokens.expires_in)))
}

/// HTTP Handler: POST /signup
pub async fn signup(state: &AppState, body: &[u8]) -> Result<Response<Body>, Error> {
    let payload: SignupPayload = match parse_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    let email = match validate_email(&payload.email) {
        Ok(e) => e,
        Err(e) => return error_response(&e),
    };
    if payload.password.is_empty() {
        return error_response(&AtomError::validation("Please choose a password"));
    }

    let user_id = match state.identity.sign_up(&email, &payload.password).await {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match register_profile(state.ledger.as_ref(), &user_id, &email, payload.details).await {
        Ok(profile) => json_response(StatusCode::CREATED, &profile),
        Err(e) => {
            tracing::error!(user_id = %user_id, "❌ signup profile write failed: {}", e);
            error_response(&e)
        }
    }
}

/// HTTP Handler: POST /password-reset
pub async fn password_reset(state: &AppState, body: &[u8]) -> Result<Response<Body>, Error> {
    let payload: PasswordResetPayload = match parse_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    let email = match validate_email(&payload.email) {
        Ok(e) => e,
        Err(e) => return error_response(&e),
    };

    match state.identity.send_password_reset(&email).await {
        Ok(()) => json_response(
            StatusCode::ACCEPTED,
            &serde_json::json!({"message": "If the account exists, a reset code has been sent"}),
        ),
        Err(e) => error_response(&e),
    }
}

/// HTTP Handler: POST /logout
pub async fn logout(state: &AppState, session: SessionContext) -> Result<Response<Body>, Error> {
    match close_session(state.identity.as_ref(), session).await {
        Ok(()) => {
            let resp = json_response(StatusCode::OK, &serde_json::json!({"message": "ok"}))?;
            Ok(with_cookie(resp, &clear_cookie(ACCESS_TOKEN_COOKIE)))
        }
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libris_atoms::users::AdminAllowList;

    #[test]
    fn cors_origin_echoes_only_allowed_origins() {
        let mut config = AppConfig::local(AdminAllowList::default());
        assert_eq!(get_cors_origin(&config, Some("https://evil.test")), "*");

        config.allowed_origins = vec!["https://library.college.ac.th".into(), "http://localhost:5173".into()];
        assert_eq!(get_cors_origin(&config, Some("http://localhost:5173")), "http://localhost:5173");
        assert_eq!(get_cors_origin(&config, Some("https://evil.test")), "https://library.college.ac.th");
        assert_eq!(get_cors_origin(&config, None), "https://library.college.ac.th");
    }

    #[test]
    fn email_is_normalised_before_use() {
        assert_eq!(validate_email("  Nok@College.AC.th ").unwrap(), "nok@college.ac.th");
        assert!(validate_email("nok").is_err());
        assert!(validate_email("@college.ac.th").is_err());
    }
}
