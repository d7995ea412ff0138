//! QR boarding credential codec.
//!
//! A credential is the JSON payload `{"user_id":..,"email":..}` sealed with
//! AES-256-GCM under a process-wide key and rendered as unpadded base64url:
//!
//! ```text
//! base64url( nonce (12 bytes) || ciphertext || tag (16 bytes) )
//! ```
//!
//! The GCM tag authenticates the whole payload, so a token produced under a
//! different key, truncated, or altered in any byte fails to decode. Every
//! decode failure collapses into [`AuthError::InvalidCredential`]; the reason
//! is logged at debug level without the token or the plaintext.
//!
//! Tokens carry no validity window. Regenerating a credential replaces the
//! stored copy but a previously issued token still decodes.

use crate::error::{AuthError, Result};
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use shuttle_core::UserId;
use std::fmt;
use std::sync::Arc;

/// AES-256 key length.
pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Identity sealed inside a QR credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    /// Rider account ID.
    pub user_id: UserId,
    /// Rider email at issue time.
    pub email: String,
}

/// Encrypts and decrypts QR credentials.
///
/// Cloning shares the cipher; each `encode` draws a fresh random nonce.
#[derive(Clone)]
pub struct QrCodec {
    cipher: Arc<Aes256Gcm>,
}

impl QrCodec {
    /// Build a codec from a raw 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the key is not 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(AuthError::Configuration(format!(
                "QR key must be exactly {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| AuthError::Configuration(format!("Failed to initialize cipher: {e}")))?;
        Ok(Self {
            cipher: Arc::new(cipher),
        })
    }

    /// Build a codec from a standard-base64 key, as stored in configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the key is not valid base64 or
    /// does not decode to 32 bytes.
    pub fn from_base64_key(encoded: &str) -> Result<Self> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AuthError::Configuration(format!("QR key is not valid base64: {e}")))?;
        Self::new(&key)
    }

    /// Fresh random key, base64 encoded. For development setups.
    #[must_use]
    pub fn generate_base64_key() -> String {
        STANDARD.encode(Aes256Gcm::generate_key(&mut OsRng))
    }

    /// Seal `{user_id, email}` into a credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if serialization or encryption fails.
    pub fn encode(&self, user_id: UserId, email: &str) -> Result<String> {
        let payload = QrPayload {
            user_id,
            email: email.to_string(),
        };
        let plaintext = serde_json::to_vec(&payload)
            .map_err(|e| AuthError::Internal(format!("Failed to serialize QR payload: {e}")))?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|e| AuthError::Internal(format!("Encryption failed: {e}")))?;

        // Format: [nonce (12 bytes)][ciphertext + tag]
        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Open a credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredential`] for anything `encode` under
    /// this key did not produce.
    pub fn decode(&self, token: &str) -> Result<QrPayload> {
        let sealed = URL_SAFE_NO_PAD.decode(token.trim()).map_err(|_| {
            tracing::debug!("QR credential rejected: not base64url");
            AuthError::InvalidCredential
        })?;

        if sealed.len() < NONCE_LEN + TAG_LEN {
            tracing::debug!(len = sealed.len(), "QR credential rejected: too short");
            return Err(AuthError::InvalidCredential);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                tracing::debug!("QR credential rejected: authentication failed");
                AuthError::InvalidCredential
            })?;

        serde_json::from_slice(&plaintext).map_err(|_| {
            tracing::debug!("QR credential rejected: payload shape");
            AuthError::InvalidCredential
        })
    }
}

impl fmt::Debug for QrCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QrCodec").finish_non_exhaustive()
    }
}
