//! First-party macaroons
//!
//! Tokens are compatible with libmacaroons' version 1 format so that stores
//! can verify them with any stock macaroon library.
//!
//! Signature chain:
//! - `k   = HMAC(key = "macaroons-key-generator", msg = root secret)`
//! - `s_0 = HMAC(k, identifier)`
//! - `s_i = HMAC(s_{i-1}, caveat_i)`
//!
//! Serialization is a sequence of `LLLL<key> <value>\n` packets (`LLLL` being
//! the packet length in four lowercase hex digits) for `location`,
//! `identifier`, each `cid`, then `signature`, encoded as unpadded URL-safe
//! base64.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CoreError, Result};
use crate::secret::RootSecret;

type HmacSha256 = Hmac<Sha256>;

const KEY_GENERATOR: &[u8] = b"macaroons-key-generator";
const PACKET_PREFIX_LENGTH: usize = 4;
const MAX_PACKET_LENGTH: usize = 0xffff;
const SIGNATURE_LENGTH: usize = 32;

const LOCATION: &str = "location";
const IDENTIFIER: &str = "identifier";
const CID: &str = "cid";
const SIGNATURE: &str = "signature";

fn hmac(key: &[u8], data: &[u8]) -> [u8; SIGNATURE_LENGTH] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);

    let mut out = [0u8; SIGNATURE_LENGTH];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

fn derive_key(secret: &RootSecret) -> [u8; SIGNATURE_LENGTH] {
    hmac(KEY_GENERATOR, secret.as_bytes())
}

/// A macaroon with first-party caveats only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macaroon {
    location: String,
    identifier: String,
    caveats: Vec<String>,
    signature: [u8; SIGNATURE_LENGTH],
}

impl Macaroon {
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// First-party caveat predicates, in chain order
    pub fn caveats(&self) -> &[String] {
        &self.caveats
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Encode to the transportable string form
    pub fn serialize(&self) -> Result<String> {
        let mut raw = Vec::new();
        write_packet(&mut raw, LOCATION, self.location.as_bytes())?;
        write_packet(&mut raw, IDENTIFIER, self.identifier.as_bytes())?;
        for caveat in &self.caveats {
            write_packet(&mut raw, CID, caveat.as_bytes())?;
        }
        write_packet(&mut raw, SIGNATURE, &self.signature)?;

        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Decode a serialized macaroon
    ///
    /// Accepts URL-safe or standard base64, with or without padding.
    /// This does NOT check the signature. Use [`Macaroon::verify_signature`].
    pub fn deserialize(token: &str) -> Result<Self> {
        let normalized: String = token
            .trim()
            .trim_end_matches('=')
            .chars()
            .map(|c| match c {
                '+' => '-',
                '/' => '_',
                c => c,
            })
            .collect();
        let raw = URL_SAFE_NO_PAD
            .decode(normalized.as_bytes())
            .map_err(|e| CoreError::MalformedToken(format!("invalid base64: {}", e)))?;

        let mut packets = Packets { raw: &raw };

        let location = packets.expect_text(LOCATION)?;
        let identifier = packets.expect_text(IDENTIFIER)?;

        let mut caveats = Vec::new();
        let signature = loop {
            let (key, value) = packets
                .next_packet()?
                .ok_or_else(|| CoreError::MalformedToken("missing signature".into()))?;
            match key {
                CID => caveats.push(utf8(value)?),
                SIGNATURE => break value,
                "vid" | "cl" => {
                    return Err(CoreError::MalformedToken(
                        "third-party caveats are not supported".into(),
                    ))
                }
                other => {
                    return Err(CoreError::MalformedToken(format!(
                        "unexpected packet '{}'",
                        other
                    )))
                }
            }
        };

        if !packets.raw.is_empty() {
            return Err(CoreError::MalformedToken(
                "trailing data after signature".into(),
            ));
        }

        let signature: [u8; SIGNATURE_LENGTH] = signature.try_into().map_err(|_| {
            CoreError::MalformedToken(format!("signature must be {} bytes", SIGNATURE_LENGTH))
        })?;

        Ok(Self {
            location,
            identifier,
            caveats,
            signature,
        })
    }

    /// Check the signature chain against `secret` in constant time
    ///
    /// Caveat predicates are not evaluated; that is the verifier's business.
    pub fn verify_signature(&self, secret: &RootSecret) -> bool {
        let mut messages: Vec<&[u8]> = vec![self.identifier.as_bytes()];
        messages.extend(self.caveats.iter().map(|c| c.as_bytes()));

        let Some((last, chain)) = messages.split_last() else {
            return false;
        };

        let mut key = derive_key(secret);
        for message in chain {
            key = hmac(&key, message);
        }

        let mut mac = HmacSha256::new_from_slice(&key).expect("HMAC can take key of any size");
        mac.update(last);
        mac.verify_slice(&self.signature).is_ok()
    }
}

/// Builds a macaroon, extending the signature with each caveat
#[derive(Debug)]
pub struct MacaroonBuilder {
    location: String,
    identifier: String,
    caveats: Vec<String>,
    signature: [u8; SIGNATURE_LENGTH],
}

impl MacaroonBuilder {
    /// Start a macaroon keyed by `secret`
    pub fn new(
        location: impl Into<String>,
        secret: &RootSecret,
        identifier: impl Into<String>,
    ) -> Self {
        let identifier = identifier.into();
        let signature = hmac(&derive_key(secret), identifier.as_bytes());

        Self {
            location: location.into(),
            identifier,
            caveats: Vec::new(),
            signature,
        }
    }

    /// Append a first-party caveat; order matters and cannot be undone
    pub fn add_first_party_caveat(mut self, predicate: impl Into<String>) -> Self {
        let predicate = predicate.into();
        self.signature = hmac(&self.signature, predicate.as_bytes());
        self.caveats.push(predicate);
        self
    }

    pub fn build(self) -> Macaroon {
        Macaroon {
            location: self.location,
            identifier: self.identifier,
            caveats: self.caveats,
            signature: self.signature,
        }
    }
}

fn write_packet(out: &mut Vec<u8>, key: &str, value: &[u8]) -> Result<()> {
    let length = PACKET_PREFIX_LENGTH + key.len() + 1 + value.len() + 1;
    if length > MAX_PACKET_LENGTH {
        return Err(CoreError::MalformedToken(format!(
            "'{}' packet of {} bytes exceeds the {} byte limit",
            key, length, MAX_PACKET_LENGTH
        )));
    }

    out.extend_from_slice(format!("{:04x}", length).as_bytes());
    out.extend_from_slice(key.as_bytes());
    out.push(b' ');
    out.extend_from_slice(value);
    out.push(b'\n');
    Ok(())
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CoreError::MalformedToken("packet value is not UTF-8".into()))
}

struct Packets<'a> {
    raw: &'a [u8],
}

impl<'a> Packets<'a> {
    fn next_packet(&mut self) -> Result<Option<(&'a str, &'a [u8])>> {
        if self.raw.is_empty() {
            return Ok(None);
        }
        if self.raw.len() < PACKET_PREFIX_LENGTH {
            return Err(CoreError::MalformedToken("truncated packet header".into()));
        }

        let header = std::str::from_utf8(&self.raw[..PACKET_PREFIX_LENGTH])
            .map_err(|_| CoreError::MalformedToken("packet header is not hex".into()))?;
        let length = usize::from_str_radix(header, 16)
            .map_err(|_| CoreError::MalformedToken("packet header is not hex".into()))?;

        if length <= PACKET_PREFIX_LENGTH + 1 || length > self.raw.len() {
            return Err(CoreError::MalformedToken(format!(
                "invalid packet length {}",
                length
            )));
        }

        let body = &self.raw[PACKET_PREFIX_LENGTH..length];
        self.raw = &self.raw[length..];

        let body = body
            .strip_suffix(b"\n")
            .ok_or_else(|| CoreError::MalformedToken("packet not newline terminated".into()))?;
        let split = body
            .iter()
            .position(|b| *b == b' ')
            .ok_or_else(|| CoreError::MalformedToken("packet has no key separator".into()))?;

        let key = std::str::from_utf8(&body[..split])
            .map_err(|_| CoreError::MalformedToken("packet key is not UTF-8".into()))?;

        Ok(Some((key, &body[split + 1..])))
    }

    fn expect_text(&mut self, expected: &str) -> Result<String> {
        match self.next_packet()? {
            Some((key, value)) if key == expected => utf8(value),
            Some((key, _)) => Err(CoreError::MalformedToken(format!(
                "expected '{}' packet, found '{}'",
                expected, key
            ))),
            None => Err(CoreError::MalformedToken(format!(
                "missing '{}' packet",
                expected
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"this is our super secret key; only we should know it";

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn secret() -> RootSecret {
        RootSecret::from_bytes(SECRET.to_vec())
    }

    // Reference values from the libmacaroons tutorial
    #[test]
    fn test_reference_signature_without_caveats() {
        let m = MacaroonBuilder::new("http://mybank/", &secret(), "we used our secret key").build();

        assert_eq!(
            hex(m.signature()),
            "e3d9e02908526c4c0039ae15114115d97fdd68bf2ba379b342aaf0f617d0552f"
        );
        assert_eq!(
            m.serialize().unwrap(),
            "MDAxY2xvY2F0aW9uIGh0dHA6Ly9teWJhbmsvCjAwMjZpZGVudGlmaWVyIHdlIHVzZWQgb3VyIHNlY3JldCBrZXkKMDAyZnNpZ25hdHVyZSDj2eApCFJsTAA5rhURQRXZf91ovyujebNCqvD2F9BVLwo"
        );
    }

    #[test]
    fn test_reference_signature_with_caveat() {
        let m = MacaroonBuilder::new("http://mybank/", &secret(), "we used our secret key")
            .add_first_party_caveat("account = 3735928559")
            .build();

        assert_eq!(
            hex(m.signature()),
            "1efe4763f290dbce0c1d08477367e11f4eee456a64933cf662d79772dbb82128"
        );
        assert_eq!(
            m.serialize().unwrap(),
            "MDAxY2xvY2F0aW9uIGh0dHA6Ly9teWJhbmsvCjAwMjZpZGVudGlmaWVyIHdlIHVzZWQgb3VyIHNlY3JldCBrZXkKMDAxZGNpZCBhY2NvdW50ID0gMzczNTkyODU1OQowMDJmc2lnbmF0dXJlIB7-R2PykNvODB0IR3Nn4R9O7kVqZJM89mLXl3LbuCEoCg"
        );
    }

    #[test]
    fn test_deserialize_and_verify() {
        let token = MacaroonBuilder::new("https://arbiter:8080", &secret(), "nonce")
            .add_first_party_caveat("target = store-x")
            .add_first_party_caveat("path = /data")
            .build()
            .serialize()
            .unwrap();

        let m = Macaroon::deserialize(&token).unwrap();
        assert_eq!(m.location(), "https://arbiter:8080");
        assert_eq!(m.identifier(), "nonce");
        assert_eq!(m.caveats(), ["target = store-x", "path = /data"]);
        assert!(m.verify_signature(&secret()));
        assert!(!m.verify_signature(&RootSecret::from_bytes(b"wrong".to_vec())));
    }

    #[test]
    fn test_deserialize_accepts_padded_standard_alphabet() {
        let token = MacaroonBuilder::new("http://mybank/", &secret(), "we used our secret key")
            .add_first_party_caveat("account = 3735928559")
            .build()
            .serialize()
            .unwrap();
        let standard = format!("{}==", token.replace('-', "+").replace('_', "/"));

        let m = Macaroon::deserialize(&standard).unwrap();
        assert!(m.verify_signature(&secret()));
    }

    #[test]
    fn test_reordered_caveats_fail_verification() {
        let forward = MacaroonBuilder::new("loc", &secret(), "id")
            .add_first_party_caveat("a")
            .add_first_party_caveat("b")
            .build();
        let swapped = Macaroon {
            caveats: vec!["b".into(), "a".into()],
            ..forward.clone()
        };

        assert!(forward.verify_signature(&secret()));
        assert!(!swapped.verify_signature(&secret()));
    }

    #[test]
    fn test_dropped_caveat_fails_verification() {
        let full = MacaroonBuilder::new("loc", &secret(), "id")
            .add_first_party_caveat("time < 2099")
            .build();
        let stripped = Macaroon {
            caveats: vec![],
            ..full.clone()
        };

        assert!(!stripped.verify_signature(&secret()));
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(
            Macaroon::deserialize("!!!"),
            Err(CoreError::MalformedToken(_))
        ));

        // Valid base64, truncated body
        let truncated = URL_SAFE_NO_PAD.encode(b"001clocation http");
        assert!(Macaroon::deserialize(&truncated).is_err());

        // Identifier before location
        let mut raw = Vec::new();
        write_packet(&mut raw, IDENTIFIER, b"id").unwrap();
        write_packet(&mut raw, LOCATION, b"loc").unwrap();
        assert!(Macaroon::deserialize(&URL_SAFE_NO_PAD.encode(&raw)).is_err());

        // Third-party caveat
        let mut raw = Vec::new();
        write_packet(&mut raw, LOCATION, b"loc").unwrap();
        write_packet(&mut raw, IDENTIFIER, b"id").unwrap();
        write_packet(&mut raw, CID, b"third").unwrap();
        write_packet(&mut raw, "vid", b"xyz").unwrap();
        let err = Macaroon::deserialize(&URL_SAFE_NO_PAD.encode(&raw)).unwrap_err();
        assert!(err.to_string().contains("third-party"));
    }

    #[test]
    fn test_oversized_caveat_is_rejected_on_serialize() {
        let m = MacaroonBuilder::new("loc", &secret(), "id")
            .add_first_party_caveat("x".repeat(MAX_PACKET_LENGTH))
            .build();
        assert!(m.serialize().is_err());
    }
}
