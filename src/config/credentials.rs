//! Object-store credentials.
//!
//! Read once from the environment at process start. The secret parts are
//! wrapped in [`Secret`] so they never reach a log line through `Debug` or
//! `Display`.

use std::fmt;
use thiserror::Error;

pub const ENDPOINT_VAR: &str = "MINIO_PUBLIC_HOST";
pub const ACCESS_KEY_VAR: &str = "MINIO_ROOT_USER";
pub const SECRET_KEY_VAR: &str = "MINIO_ROOT_PASSWORD";
pub const BUCKET_VAR: &str = "MINIO_BUCKET";
pub const USE_TLS_VAR: &str = "MINIO_USE_SSL";

const DEFAULT_BUCKET: &str = "garment";

/// A value that must not be printed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// A required configuration value is absent or empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required configuration `{key}`")]
pub struct MissingConfiguration {
    pub key: &'static str,
}

/// Credentials for the remote object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub access_key: Secret,
    pub secret_key: Secret,
    pub use_tls: bool,
    pub bucket: String,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Nothing is validated here;
    /// call [`Credentials::validate`] before use.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };

        let bucket = lookup(BUCKET_VAR)
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|| DEFAULT_BUCKET.to_string());

        let use_tls = lookup(USE_TLS_VAR)
            .map(|value| parse_flag(&value))
            .unwrap_or(true);

        Self {
            endpoint: read(ENDPOINT_VAR),
            access_key: Secret::new(read(ACCESS_KEY_VAR)),
            secret_key: Secret::new(read(SECRET_KEY_VAR)),
            use_tls,
            bucket,
        }
    }

    /// All four required fields must be non-empty.
    pub fn validate(&self) -> Result<(), MissingConfiguration> {
        if self.endpoint.is_empty() {
            return Err(MissingConfiguration { key: ENDPOINT_VAR });
        }
        if self.access_key.is_empty() {
            return Err(MissingConfiguration { key: ACCESS_KEY_VAR });
        }
        if self.secret_key.is_empty() {
            return Err(MissingConfiguration { key: SECRET_KEY_VAR });
        }
        if self.bucket.is_empty() {
            return Err(MissingConfiguration { key: BUCKET_VAR });
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
