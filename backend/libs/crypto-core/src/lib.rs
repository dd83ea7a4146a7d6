//! Message encryption primitives for direct conversations.
//!
//! Every 1:1 conversation has a symmetric key that both participants can
//! re-derive from the pair of user identifiers, so no key material is stored.
//! Message bodies are sealed with AES-256-GCM and serialized as a text
//! envelope:
//!
//! ```text
//! <iv hex>:<ciphertext hex>:<tag hex>
//! ```
//!
//! ```
//! use crypto_core::{ConversationKeyDeriver, MessageCipher};
//!
//! let deriver = ConversationKeyDeriver::unkeyed();
//! let cipher = MessageCipher::new();
//!
//! let key = deriver.derive("alice", "bob");
//! let envelope = cipher.encrypt("Hello", &key).unwrap();
//!
//! // Bob derives the same key with the arguments swapped.
//! let plaintext = cipher.decrypt(&envelope, &deriver.derive("bob", "alice")).unwrap();
//! assert_eq!(plaintext, "Hello");
//! ```

mod cipher;
mod envelope;
mod error;
mod hash;
mod key;

pub use cipher::{MessageCipher, ASSOCIATED_DATA};
pub use envelope::{Envelope, IV_LEN, TAG_LEN};
pub use error::CryptoError;
pub use hash::sha256;
pub use key::{ConversationKey, ConversationKeyDeriver, KEY_LEN, PAIR_SEPARATOR};
