use crate::envelope::{Envelope, IV_LEN, TAG_LEN};
use crate::error::CryptoError;
use crate::key::ConversationKey;
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};

/// Domain-separation string bound into every tag.
pub const ASSOCIATED_DATA: &[u8] = b"chat";

/// AES-256-GCM sealing of message bodies into [`Envelope`]s.
#[derive(Debug, Clone)]
pub struct MessageCipher {
    associated_data: Vec<u8>,
}

impl MessageCipher {
    pub fn new() -> Self {
        Self::with_associated_data(ASSOCIATED_DATA)
    }

    pub fn with_associated_data(associated_data: impl Into<Vec<u8>>) -> Self {
        Self {
            associated_data: associated_data.into(),
        }
    }

    /// Encrypt UTF-8 text and return the envelope in its text form.
    pub fn encrypt(&self, plaintext: &str, key: &ConversationKey) -> Result<String, CryptoError> {
        Ok(self.seal(plaintext.as_bytes(), key)?.to_string())
    }

    /// Parse and open a text envelope.
    pub fn decrypt(&self, envelope: &str, key: &ConversationKey) -> Result<String, CryptoError> {
        let envelope = Envelope::parse(envelope)?;
        let plaintext = self.open(&envelope, key)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }

    pub fn seal(&self, plaintext: &[u8], key: &ConversationKey) -> Result<Envelope, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        // Fresh IV per call; never reuse one under the same key.
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut sealed = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: plaintext,
                    aad: &self.associated_data,
                },
            )
            .map_err(|_| CryptoError::Encryption)?;

        // aes-gcm appends the tag to the ciphertext
        let tag_bytes = sealed.split_off(sealed.len() - TAG_LEN);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&tag_bytes);

        Ok(Envelope::new(iv, sealed, tag))
    }

    pub fn open(&self, envelope: &Envelope, key: &ConversationKey) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        let mut sealed = Vec::with_capacity(envelope.ciphertext().len() + TAG_LEN);
        sealed.extend_from_slice(envelope.ciphertext());
        sealed.extend_from_slice(envelope.tag());

        cipher
            .decrypt(
                Nonce::from_slice(envelope.iv()),
                Payload {
                    msg: &sealed,
                    aad: &self.associated_data,
                },
            )
            .map_err(|_| CryptoError::Authentication)
    }
}

impl Default for MessageCipher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ConversationKeyDeriver;

    fn key_for(a: &str, b: &str) -> ConversationKey {
        ConversationKeyDeriver::unkeyed().derive(a, b)
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = MessageCipher::new();
        let key = key_for("alice", "bob");

        for text in ["Hello", "a", "emoji 🎉 and ümlauts", &"x".repeat(2000)] {
            let envelope = cipher.encrypt(text, &key).unwrap();
            assert_eq!(cipher.decrypt(&envelope, &key).unwrap(), text);
        }
    }

    #[test]
    fn test_encrypt_uses_fresh_iv() {
        let cipher = MessageCipher::new();
        let key = key_for("alice", "bob");

        let first = cipher.seal(b"same text", &key).unwrap();
        let second = cipher.seal(b"same text", &key).unwrap();

        assert_ne!(first.iv(), second.iv());
        assert_ne!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let cipher = MessageCipher::new();
        let envelope = cipher.encrypt("secret", &key_for("alice", "bob")).unwrap();

        let result = cipher.decrypt(&envelope, &key_for("alice", "carol"));
        assert_eq!(result, Err(CryptoError::Authentication));
    }

    #[test]
    fn test_associated_data_is_bound() {
        let key = key_for("alice", "bob");
        let envelope = MessageCipher::new().encrypt("secret", &key).unwrap();

        let other_context = MessageCipher::with_associated_data(b"group".to_vec());
        assert_eq!(
            other_context.decrypt(&envelope, &key),
            Err(CryptoError::Authentication)
        );
    }

    #[test]
    fn test_sealed_lengths() {
        let envelope = MessageCipher::new()
            .seal(b"12345", &key_for("alice", "bob"))
            .unwrap();
        assert_eq!(envelope.ciphertext().len(), 5);
        assert_eq!(envelope.tag().len(), TAG_LEN);
    }
}
