use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::error::ProvideErrorMetadata;
use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType};
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::identity::{AuthTokens, Identity, IdentityProvider};
use libris_atoms::{AtomError, AtomResult};

type HmacSha256 = Hmac<Sha256>;

/// SECRET_HASH = Base64(HMAC_SHA256(client_secret, username + client_id))
pub fn secret_hash(username: &str, client_id: &str, client_secret: &str) -> AtomResult<String> {
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .map_err(|e| AtomError::store("secret hash", e))?;
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

pub struct CognitoIdentityProvider {
    client: CognitoClient,
    client_id: String,
    client_secret: String,
}

impl CognitoIdentityProvider {
    pub fn new(client: CognitoClient, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn hash(&self, username: &str) -> AtomResult<String> {
        secret_hash(username, &self.client_id, &self.client_secret)
    }
}

fn invalid_token() -> AtomError {
    AtomError::Unauthorized("Invalid or expired token".to_string())
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> AtomResult<AuthTokens> {
        let username = email.trim().to_lowercase();
        let output = self
            .client
            .initiate_auth()
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .client_id(&self.client_id)
            .auth_parameters("USERNAME", &username)
            .auth_parameters("PASSWORD", password)
            .auth_parameters("SECRET_HASH", self.hash(&username)?)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_not_authorized_exception() || service.is_user_not_found_exception() {
                    AtomError::Unauthorized("Incorrect email or password".to_string())
                } else if service.is_user_not_confirmed_exception() {
                    AtomError::Forbidden("Please confirm your email before signing in".to_string())
                } else {
                    AtomError::store("cognito initiate_auth", service)
                }
            })?;

        let result = output
            .authentication_result()
            .ok_or_else(|| AtomError::Store("cognito returned no authentication result".to_string()))?;
        let access_token = result
            .access_token()
            .ok_or_else(|| AtomError::Store("cognito returned no access token".to_string()))?;

        tracing::info!("🔐 Cognito sign-in succeeded");
        Ok(AuthTokens {
            access_token: access_token.to_string(),
            expires_in: result.expires_in(),
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> AtomResult<String> {
        let username = email.trim().to_lowercase();
        let email_attr = AttributeType::builder()
            .name("email")
            .value(&username)
            .build()
            .map_err(|e| AtomError::store("cognito email attribute", e))?;

        let output = self
            .client
            .sign_up()
            .client_id(&self.client_id)
            .secret_hash(self.hash(&username)?)
            .username(&username)
            .password(password)
            .user_attributes(email_attr)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_username_exists_exception() {
                    AtomError::Conflict(format!("An account for {} already exists", username))
                } else if service.is_invalid_password_exception() || service.is_invalid_parameter_exception() {
                    AtomError::Validation(service.meta().message().unwrap_or("Invalid sign-up details").to_string())
                } else {
                    AtomError::store("cognito sign_up", service)
                }
            })?;

        tracing::info!("📝 Cognito sign-up created user {}", output.user_sub());
        Ok(output.user_sub().to_string())
    }

    async fn send_password_reset(&self, email: &str) -> AtomResult<()> {
        let username = email.trim().to_lowercase();
        let sent = self
            .client
            .forgot_password()
            .client_id(&self.client_id)
            .secret_hash(self.hash(&username)?)
            .username(&username)
            .send()
            .await;

        match sent {
            Ok(_) => Ok(()),
            Err(e) => {
                let service = e.into_service_error();
                if service.is_user_not_found_exception() {
                    Ok(())
                } else {
                    Err(AtomError::store("cognito forgot_password", service))
                }
            }
        }
    }

    async fn identify(&self, access_token: &str) -> AtomResult<Identity> {
        let output = self
            .client
            .get_user()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_not_authorized_exception() || service.is_user_not_found_exception() {
                    invalid_token()
                } else {
                    AtomError::store("cognito get_user", service)
                }
            })?;

        let attr = |name: &str| {
            output
                .user_attributes()
                .iter()
                .find(|a| a.name() == name)
                .and_then(|a| a.value())
                .map(str::to_string)
        };

        Ok(Identity {
            user_id: attr("sub").unwrap_or_else(|| output.username().to_string()),
            email: attr("email").unwrap_or_default(),
        })
    }

    async fn sign_out(&self, access_token: &str) -> AtomResult<()> {
        self.client
            .global_sign_out()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_not_authorized_exception() {
                    invalid_token()
                } else {
                    AtomError::store("cognito global_sign_out", service)
                }
            })?;
        tracing::info!("👋 Cognito tokens revoked");
        Ok(())
    }
}
