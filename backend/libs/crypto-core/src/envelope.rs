use crate::error::CryptoError;
use std::fmt;
use std::str::FromStr;

/// GCM nonce length.
pub const IV_LEN: usize = 12;
/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;

const DELIMITER: char = ':';

/// One sealed message body: random IV, ciphertext and authentication tag.
///
/// Text form is `iv:ciphertext:tag`, lowercase hex. Parsing is strict so that
/// two different strings never decode to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    iv: [u8; IV_LEN],
    ciphertext: Vec<u8>,
    tag: [u8; TAG_LEN],
}

impl Envelope {
    pub fn new(iv: [u8; IV_LEN], ciphertext: Vec<u8>, tag: [u8; TAG_LEN]) -> Self {
        Self { iv, ciphertext, tag }
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn tag(&self) -> &[u8; TAG_LEN] {
        &self.tag
    }

    pub fn parse(input: &str) -> Result<Self, CryptoError> {
        let mut parts = input.split(DELIMITER);
        let (Some(iv), Some(ciphertext), Some(tag), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CryptoError::MalformedEnvelope(
                "expected iv:ciphertext:tag".to_string(),
            ));
        };

        let iv: [u8; IV_LEN] = decode_segment("iv", iv)?.try_into().map_err(|v: Vec<u8>| {
            CryptoError::MalformedEnvelope(format!("iv must be {IV_LEN} bytes, got {}", v.len()))
        })?;
        let ciphertext = decode_segment("ciphertext", ciphertext)?;
        let tag: [u8; TAG_LEN] = decode_segment("tag", tag)?.try_into().map_err(|v: Vec<u8>| {
            CryptoError::MalformedEnvelope(format!("tag must be {TAG_LEN} bytes, got {}", v.len()))
        })?;

        Ok(Self { iv, ciphertext, tag })
    }
}

fn decode_segment(name: &str, segment: &str) -> Result<Vec<u8>, CryptoError> {
    if !segment
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    {
        return Err(CryptoError::MalformedEnvelope(format!(
            "{name} segment is not lowercase hex"
        )));
    }
    hex::decode(segment).map_err(|e| CryptoError::MalformedEnvelope(format!("{name}: {e}")))
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{}{DELIMITER}{}",
            hex::encode(self.iv),
            hex::encode(&self.ciphertext),
            hex::encode(self.tag)
        )
    }
}

impl FromStr for Envelope {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope::new([0xab; IV_LEN], vec![0x01, 0x02, 0xff], [0x10; TAG_LEN])
    }

    #[test]
    fn test_display_format() {
        let text = sample().to_string();
        let parts: Vec<&str> = text.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ab".repeat(IV_LEN));
        assert_eq!(parts[1], "0102ff");
        assert_eq!(parts[2], "10".repeat(TAG_LEN));
    }

    #[test]
    fn test_parse_accepts_display_output() {
        let envelope = sample();
        assert_eq!(envelope.to_string().parse::<Envelope>().unwrap(), envelope);
    }

    #[test]
    fn test_parse_rejects_wrong_segment_count() {
        for input in ["", "abc", "aa:bb", "aa:bb:cc:dd"] {
            assert!(
                matches!(Envelope::parse(input), Err(CryptoError::MalformedEnvelope(_))),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_uppercase_hex() {
        let text = sample().to_string().replace("ff", "FF");
        assert!(matches!(
            Envelope::parse(&text),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_iv_and_tag_lengths() {
        let tag = "10".repeat(TAG_LEN);
        let iv = "ab".repeat(IV_LEN);
        assert!(Envelope::parse(&format!("abab:00:{tag}")).is_err());
        assert!(Envelope::parse(&format!("{iv}:00:1010")).is_err());
    }

    #[test]
    fn test_parse_rejects_odd_length_segment() {
        let tag = "10".repeat(TAG_LEN);
        let iv = "ab".repeat(IV_LEN);
        assert!(Envelope::parse(&format!("{iv}:abc:{tag}")).is_err());
    }
}
