//! Per-request session context.
//!
//! A `SessionContext` is built from the request's access token and handed to
//! the handlers that need it. Nothing about the signed-in user is kept
//! between requests.

use lambda_http::http::HeaderMap;
use serde::Serialize;

use libris_atoms::store::ProfileStore;
use libris_atoms::users::{resolve_profile, AdminAllowList, ProfileView, Role};
use libris_atoms::{AtomError, AtomResult};

use crate::identity::IdentityProvider;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    #[serde(skip)]
    pub access_token: String,
}

impl SessionContext {
    pub fn from_profile(view: &ProfileView, access_token: &str) -> Self {
        Self {
            user_id: view.profile.user_id.clone(),
            email: view.profile.user_email.clone(),
            display_name: view.profile.user_name.clone(),
            role: view.effective_role,
            access_token: access_token.to_string(),
        }
    }

    /// Staff or admin.
    pub fn require_staff(&self) -> AtomResult<()> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AtomError::Forbidden("staff access required".to_string()))
        }
    }

    pub fn require_admin(&self) -> AtomResult<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AtomError::Forbidden("admin access required".to_string()))
        }
    }
}

/// Access token from `Authorization: Bearer ...`, falling back to the
/// `access_token` cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all("Cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == ACCESS_TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Resolve `access_token` into a session, creating the profile on first use.
pub async fn open_session<I, S>(
    identity: &I,
    store: &S,
    allow_list: &AdminAllowList,
    access_token: &str,
) -> AtomResult<(SessionContext, ProfileView)>
where
    I: IdentityProvider + ?Sized,
    S: ProfileStore + ?Sized,
{
    let who = identity.identify(access_token).await?;
    let view = resolve_profile(store, &who.user_id, &who.email, allow_list).await?;
    Ok((SessionContext::from_profile(&view, access_token), view))
}

/// Session for a request, or `Unauthorized` when it carries no usable token.
pub async fn authenticate<I, S>(
    identity: &I,
    store: &S,
    allow_list: &AdminAllowList,
    headers: &HeaderMap,
) -> AtomResult<SessionContext>
where
    I: IdentityProvider + ?Sized,
    S: ProfileStore + ?Sized,
{
    let token = token_from_headers(headers)
        .ok_or_else(|| AtomError::Unauthorized("No access token".to_string()))?;
    let (session, _) = open_session(identity, store, allow_list, &token).await?;
    tracing::debug!(user_id = %session.user_id, role = %session.role, "🔑 session opened");
    Ok(session)
}

/// Tear the session down by revoking its tokens at the provider.
pub async fn close_session<I>(identity: &I, session: SessionContext) -> AtomResult<()>
where
    I: IdentityProvider + ?Sized,
{
    identity.sign_out(&session.access_token).await?;
    tracing::info!(user_id = %session.user_id, "👋 session closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentityProvider;
    use lambda_http::http::HeaderValue;
    use libris_atoms::store::MemoryStore;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("Cookie", HeaderValue::from_static("theme=dark; access_token=from-cookie"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-cookie"));

        headers.insert("Authorization", HeaderValue::from_static("Bearer from-header"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-header"));

        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn session_lifecycle_and_guards() {
        let idp = MemoryIdentityProvider::new();
        let store = MemoryStore::new();
        let allow = AdminAllowList::from_csv("boss@college.ac.th");

        idp.sign_up("student@college.ac.th", "pw").await.unwrap();
        idp.sign_up("boss@college.ac.th", "pw").await.unwrap();

        let student_token = idp.sign_in("student@college.ac.th", "pw").await.unwrap().access_token;
        let (student, _) = open_session(&idp, &store, &allow, &student_token).await.unwrap();
        assert_eq!(student.display_name, "student");
        assert!(matches!(student.require_staff(), Err(AtomError::Forbidden(_))));

        let boss_token = idp.sign_in("boss@college.ac.th", "pw").await.unwrap().access_token;
        let (boss, view) = open_session(&idp, &store, &allow, &boss_token).await.unwrap();
        assert_eq!(view.profile.user_role, "admin");
        assert!(boss.require_staff().is_ok());
        assert!(boss.require_admin().is_ok());

        close_session(&idp, boss).await.unwrap();
        assert!(matches!(
            open_session(&idp, &store, &allow, &boss_token).await,
            Err(AtomError::Unauthorized(_))
        ));
    }
}
