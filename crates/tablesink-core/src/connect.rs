//! Opening a session from an endpoint and credentials.
//!
//! Every failure while connecting is reported as the single
//! [`ConnectError::Connect`] variant, which keeps the underlying cause as its
//! source.

use std::{error::Error, fmt};

use snafu::{IntoError, prelude::*};

use crate::{local::LocalSession, storage::StorageLocation};

/// Connection failure; `source` carries the cause.
#[derive(Debug, Snafu)]
pub enum ConnectError {
    /// Could not open a session to `endpoint`.
    #[snafu(display("Failed to connect to {endpoint}: {source}"))]
    Connect {
        /// Endpoint as given by the caller.
        endpoint: String,
        /// What went wrong.
        source: Box<dyn Error + Send + Sync>,
    },
}

#[derive(Debug, Snafu)]
enum CredentialError {
    #[snafu(display("access key is empty"))]
    EmptyAccessKey,
    #[snafu(display("secret key is empty"))]
    EmptySecretKey,
}

/// Endpoint and credentials for a store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Store endpoint: a directory path or a `file://` URL.
    pub endpoint: String,
    /// Access key identifying the caller.
    pub access_key: String,
    /// Secret paired with the access key.
    pub secret_key: String,
}

impl StoreConfig {
    /// Bundle an endpoint with its credentials.
    pub fn new(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Open a session with this configuration.
    pub async fn connect(&self) -> Result<LocalSession, ConnectError> {
        connect(&self.endpoint, &self.access_key, &self.secret_key).await
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Open a session to the store at `endpoint`.
///
/// The endpoint must name an existing store root. Both credentials must be
/// non-empty; the local store performs no further authentication.
pub async fn connect(
    endpoint: &str,
    access_key: &str,
    secret_key: &str,
) -> Result<LocalSession, ConnectError> {
    let wrap = |source: Box<dyn Error + Send + Sync>| ConnectSnafu { endpoint }.into_error(source);

    if access_key.trim().is_empty() {
        return Err(wrap(Box::new(EmptyAccessKeySnafu.build())));
    }
    if secret_key.trim().is_empty() {
        return Err(wrap(Box::new(EmptySecretKeySnafu.build())));
    }

    let location = StorageLocation::parse(endpoint).map_err(|e| wrap(Box::new(e)))?;
    let session = LocalSession::open(location)
        .await
        .map_err(|e| wrap(Box::new(e)))?;

    log::debug!("connected to {endpoint} as {access_key}");
    Ok(session)
}
