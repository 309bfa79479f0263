use std::sync::Arc;

use libris_atoms::store::{BlobStore, DynamoStore, LedgerStore, S3BlobStore};

use crate::cognito::CognitoIdentityProvider;
use crate::config::{AppConfig, ConfigError};
use crate::identity::IdentityProvider;

/// Everything a request handler needs, built once per cold start.
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        blobs: Arc<dyn BlobStore>,
        identity: Arc<dyn IdentityProvider>,
        config: AppConfig,
    ) -> Self {
        Self {
            ledger,
            blobs,
            identity,
            config,
        }
    }

    /// DynamoDB, S3 and Cognito clients from the Lambda environment.
    pub async fn from_env() -> Result<Self, ConfigError> {
        let config = AppConfig::from_env()?;
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let ledger = DynamoStore::new(aws_sdk_dynamodb::Client::new(&aws), config.table_name.clone());
        let blobs = S3BlobStore::new(aws_sdk_s3::Client::new(&aws), config.bucket_name.clone());
        let identity = CognitoIdentityProvider::new(
            aws_sdk_cognitoidentityprovider::Client::new(&aws),
            config.cognito_client_id.clone(),
            config.cognito_client_secret.clone(),
        );

        tracing::info!(
            table = %config.table_name,
            bucket = %config.bucket_name,
            admins = config.admin_emails.len(),
            "⚙️ state initialised"
        );
        Ok(Self::new(Arc::new(ledger), Arc::new(blobs), Arc::new(identity), config))
    }
}
