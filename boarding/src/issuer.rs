//! QR credential issuance.

use crate::error::Result;
use crate::providers::CredentialStore;
use shuttle_auth::{Caller, QrCodec};
use std::sync::Arc;

/// Issues and serves each rider's QR credential.
#[derive(Clone)]
pub struct QrIssuer {
    codec: QrCodec,
    credentials: Arc<dyn CredentialStore>,
}

impl QrIssuer {
    /// Create an issuer.
    #[must_use]
    pub fn new(codec: QrCodec, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { codec, credentials }
    }

    /// Encode a fresh credential for the caller and store it, replacing any
    /// previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the credential store fails.
    pub async fn issue(&self, caller: &Caller) -> Result<String> {
        let token = self.codec.encode(caller.user_id, &caller.email)?;
        self.credentials.put(caller.user_id, token.clone()).await?;
        tracing::info!(user_id = %caller.user_id, "QR credential issued");
        Ok(token)
    }

    /// The caller's stored credential, issuing one if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the credential store fails.
    pub async fn current(&self, caller: &Caller) -> Result<String> {
        match self.credentials.get(caller.user_id).await? {
            Some(token) => Ok(token),
            None => self.issue(caller).await,
        }
    }
}

impl std::fmt::Debug for QrIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrIssuer").finish_non_exhaustive()
    }
}
