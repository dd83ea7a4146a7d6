use crate::error::CryptoError;
use crate::hash::sha256;
use hkdf::Hkdf;
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// AES-256 key length.
pub const KEY_LEN: usize = 32;

/// Joins the sorted pair before hashing. Identifiers must not contain it.
pub const PAIR_SEPARATOR: char = ':';

const HKDF_INFO: &[u8] = b"chat-conversation-key";

/// Symmetric key for one conversation. Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ConversationKey([u8; KEY_LEN]);

impl ConversationKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConversationKey(<redacted>)")
    }
}

/// Derives the per-pair conversation key.
///
/// Without a secret the key is `SHA-256(min(a,b) ":" max(a,b))`, which any
/// client can compute locally. Anyone who knows both identifiers can do the
/// same, so deployments that decrypt server-side only should configure a
/// secret; derivation then becomes HKDF-SHA256 salted with it.
#[derive(Clone)]
pub struct ConversationKeyDeriver {
    secret: Option<Zeroizing<Vec<u8>>>,
}

impl ConversationKeyDeriver {
    pub fn unkeyed() -> Self {
        Self { secret: None }
    }

    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Result<Self, CryptoError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(CryptoError::InvalidKey("conversation key secret is empty".into()));
        }
        Ok(Self {
            secret: Some(Zeroizing::new(secret)),
        })
    }

    pub fn is_keyed(&self) -> bool {
        self.secret.is_some()
    }

    pub fn derive(&self, user_a: &str, user_b: &str) -> ConversationKey {
        let material = pair_material(user_a, user_b);
        match &self.secret {
            None => ConversationKey(sha256(material.as_bytes())),
            Some(secret) => {
                let hk = Hkdf::<Sha256>::new(Some(secret.as_slice()), material.as_bytes());
                let mut key = [0u8; KEY_LEN];
                hk.expand(HKDF_INFO, &mut key)
                    .expect("HKDF expand must succeed for 32 byte output");
                ConversationKey(key)
            }
        }
    }
}

impl Default for ConversationKeyDeriver {
    fn default() -> Self {
        Self::unkeyed()
    }
}

impl fmt::Debug for ConversationKeyDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationKeyDeriver")
            .field("keyed", &self.is_keyed())
            .finish()
    }
}

fn pair_material(user_a: &str, user_b: &str) -> String {
    let (low, high) = if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };
    format!("{low}{PAIR_SEPARATOR}{high}")
}
