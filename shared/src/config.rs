use libris_atoms::users::AdminAllowList;
use thiserror::Error;

pub const DEFAULT_TABLE_NAME: &str = "libris";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Settings read once per cold start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub table_name: String,
    pub bucket_name: String,
    pub cognito_client_id: String,
    pub cognito_client_secret: String,
    pub admin_emails: AdminAllowList,
    /// Prefix for department gallery images. Empty means same-origin paths.
    pub asset_base_url: String,
    /// Origins echoed back in CORS responses. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        Ok(Self {
            table_name: get("TABLE_NAME").unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            bucket_name: require("S3_BUCKET_NAME")?,
            cognito_client_id: require("COGNITO_CLIENT_ID")?,
            cognito_client_secret: require("COGNITO_CLIENT_SECRET")?,
            admin_emails: AdminAllowList::from_csv(&get("ADMIN_EMAILS").unwrap_or_default()),
            asset_base_url: get("ASSET_BASE_URL").unwrap_or_default(),
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|o| o.trim().trim_end_matches('/').to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    /// Configuration for in-process runs with no AWS resources behind it.
    pub fn local(admin_emails: AdminAllowList) -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            bucket_name: "local".to_string(),
            cognito_client_id: "local".to_string(),
            cognito_client_secret: "local".to_string(),
            admin_emails,
            asset_base_url: String::new(),
            allowed_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_required_and_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("S3_BUCKET_NAME", "libris-photos"),
            ("COGNITO_CLIENT_ID", "cid"),
            ("COGNITO_CLIENT_SECRET", "secret"),
            ("ADMIN_EMAILS", " Admin@Gmail.com , librarian@college.ac.th "),
            ("ALLOWED_ORIGINS", "https://library.college.ac.th/, http://localhost:5173"),
        ]))
        .unwrap();

        assert_eq!(cfg.table_name, "libris");
        assert_eq!(cfg.bucket_name, "libris-photos");
        assert!(cfg.admin_emails.contains("admin@gmail.com"));
        assert_eq!(cfg.admin_emails.len(), 2);
        assert_eq!(
            cfg.allowed_origins,
            vec!["https://library.college.ac.th", "http://localhost:5173"]
        );
    }

    #[test]
    fn missing_secret_is_a_typed_error() {
        let err = AppConfig::from_lookup(lookup(&[
            ("S3_BUCKET_NAME", "b"),
            ("COGNITO_CLIENT_ID", "cid"),
            ("COGNITO_CLIENT_SECRET", "  "),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("COGNITO_CLIENT_SECRET"));
        assert_eq!(err.to_string(), "COGNITO_CLIENT_SECRET must be set");
    }
}
