//! Identity provider seam. Cognito backs it in production; the in-memory
//! provider serves tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use libris_atoms::{AtomError, AtomResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i32,
}

/// Who an access token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> AtomResult<AuthTokens>;

    /// Register a new account. Returns the provider's user id.
    async fn sign_up(&self, email: &str, password: &str) -> AtomResult<String>;

    async fn send_password_reset(&self, email: &str) -> AtomResult<()>;

    /// Resolve an access token. Unknown or revoked tokens are `Unauthorized`.
    async fn identify(&self, access_token: &str) -> AtomResult<Identity>;

    /// Revoke every token issued for the token's user.
    async fn sign_out(&self, access_token: &str) -> AtomResult<()>;
}

struct Account {
    user_id: String,
    password: String,
}

#[derive(Default)]
struct MemoryIdentityState {
    accounts: HashMap<String, Account>,
    // access token -> email
    sessions: HashMap<String, String>,
    resets: Vec<String>,
}

#[derive(Default)]
pub struct MemoryIdentityProvider {
    state: Mutex<MemoryIdentityState>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emails that asked for a password reset, oldest first.
    pub fn reset_requests(&self) -> Vec<String> {
        self.state.lock().map(|s| s.resets.clone()).unwrap_or_default()
    }

    fn lock(&self) -> AtomResult<std::sync::MutexGuard<'_, MemoryIdentityState>> {
        self.state
            .lock()
            .map_err(|_| AtomError::Store("identity state lock poisoned".to_string()))
    }
}

fn normalise(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> AtomResult<AuthTokens> {
        let email = normalise(email);
        let mut state = self.lock()?;
        match state.accounts.get(&email) {
            Some(account) if account.password == password => {}
            _ => return Err(AtomError::Unauthorized("Incorrect email or password".to_string())),
        }
        let access_token = format!("mem-{}", uuid::Uuid::new_v4().simple());
        state.sessions.insert(access_token.clone(), email);
        Ok(AuthTokens {
            access_token,
            expires_in: 3600,
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> AtomResult<String> {
        let email = normalise(email);
        let mut state = self.lock()?;
        if state.accounts.contains_key(&email) {
            return Err(AtomError::Conflict(format!("An account for {} already exists", email)));
        }
        let user_id = uuid::Uuid::new_v4().to_string();
        state.accounts.insert(
            email,
            Account {
                user_id: user_id.clone(),
                password: password.to_string(),
            },
        );
        Ok(user_id)
    }

    async fn send_password_reset(&self, email: &str) -> AtomResult<()> {
        let email = normalise(email);
        let mut state = self.lock()?;
        // Unknown emails succeed without recording a request.
        if state.accounts.contains_key(&email) {
            state.resets.push(email);
        }
        Ok(())
    }

    async fn identify(&self, access_token: &str) -> AtomResult<Identity> {
        let state = self.lock()?;
        let email = state
            .sessions
            .get(access_token)
            .ok_or_else(|| AtomError::Unauthorized("Invalid or expired token".to_string()))?;
        let account = state
            .accounts
            .get(email)
            .ok_or_else(|| AtomError::Unauthorized("Invalid or expired token".to_string()))?;
        Ok(Identity {
            user_id: account.user_id.clone(),
            email: email.clone(),
        })
    }

    async fn sign_out(&self, access_token: &str) -> AtomResult<()> {
        let mut state = self.lock()?;
        let email = state
            .sessions
            .get(access_token)
            .cloned()
            .ok_or_else(|| AtomError::Unauthorized("Invalid or expired token".to_string()))?;
        state.sessions.retain(|_, owner| *owner != email);
        Ok(())
    }
}
