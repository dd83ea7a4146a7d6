use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Envelope is not `iv:ciphertext:tag` with lowercase hex segments of the right size
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Tag verification failed: tampered data or wrong key
    #[error("authentication tag mismatch")]
    Authentication,

    #[error("encryption failed")]
    Encryption,

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("decrypted content is not valid UTF-8")]
    InvalidUtf8,
}

impl CryptoError {
    /// True for every failure that can come out of opening an envelope.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            CryptoError::MalformedEnvelope(_) | CryptoError::Authentication | CryptoError::InvalidUtf8
        )
    }
}
