//! Signature backends.
//!
//! Keys and signatures cross this boundary as armored text blocks so that the
//! rest of the crate can embed them in transactions without knowing the
//! scheme. A backend reports unreadable input as [`SignerError`]; the verifier
//! turns that into a failed result for the transaction concerned.

use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use tracing::debug;

use crate::constants::{KEY_SIZE, SIGNATURE_SIZE};
use crate::error::SignerError;

const PRIVATE_KEY_LABEL: &str = "LEDGER ED25519 PRIVATE KEY";
const PUBLIC_KEY_LABEL: &str = "LEDGER ED25519 PUBLIC KEY";

const MESSAGE_HEADER: &str = "-----BEGIN LEDGER SIGNED MESSAGE-----\n";
const SIGNATURE_SEPARATOR: &str = "\n-----BEGIN LEDGER SIGNATURE-----\n";
const SIGNATURE_FOOTER: &str = "\n-----END LEDGER SIGNATURE-----";

/// Outcome of checking a cleartext signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    /// The message the signature block carries, whether or not it verified.
    pub message: String,
}

/// A public-key signature scheme over text messages.
pub trait SignatureScheme: Send + Sync {
    /// Produce an armored cleartext signature binding `message` to the holder
    /// of `private_key`.
    fn sign(&self, message: &str, private_key: &str) -> Result<String, SignerError>;

    /// Check `signature` against `public_key` and recover the signed message.
    fn verify(&self, signature: &str, public_key: &str) -> Result<Verification, SignerError>;
}

/// The two armored key blocks of one identity.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub private_key: String,
    pub public_key: String,
}

impl KeyPair {
    pub fn new(private_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            public_key: public_key.into(),
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Ed25519 with hex-armored keys and cleartext signature blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Scheme;

impl Ed25519Scheme {
    pub fn generate_keypair() -> KeyPair {
        let signing = SigningKey::generate(&mut OsRng);
        KeyPair {
            private_key: armor(PRIVATE_KEY_LABEL, &hex::encode(signing.to_bytes())),
            public_key: armor(
                PUBLIC_KEY_LABEL,
                &hex::encode(signing.verifying_key().to_bytes()),
            ),
        }
    }

    /// Derive the armored public key for an armored private key.
    pub fn public_key_for(private_key: &str) -> Result<String, SignerError> {
        let signing = parse_signing_key(private_key)?;
        Ok(armor(
            PUBLIC_KEY_LABEL,
            &hex::encode(signing.verifying_key().to_bytes()),
        ))
    }

    /// Check that both keys parse and that the public key is the one derived
    /// from the private key.
    pub fn check_keypair(keys: &KeyPair) -> Result<(), SignerError> {
        let signing = parse_signing_key(&keys.private_key)?;
        let verifying = parse_verifying_key(&keys.public_key)?;
        if signing.verifying_key() != verifying {
            return Err(SignerError::MismatchedKeyPair);
        }
        Ok(())
    }
}

impl SignatureScheme for Ed25519Scheme {
    fn sign(&self, message: &str, private_key: &str) -> Result<String, SignerError> {
        let signing = parse_signing_key(private_key)?;
        let signature = signing.sign(message.as_bytes());
        Ok(format!(
            "{MESSAGE_HEADER}{message}{SIGNATURE_SEPARATOR}{}{SIGNATURE_FOOTER}",
            hex::encode(signature.to_bytes())
        ))
    }

    fn verify(&self, signature: &str, public_key: &str) -> Result<Verification, SignerError> {
        let verifying = parse_verifying_key(public_key)?;
        let (message, sig_hex) = split_cleartext(signature)?;
        let raw = decode_fixed::<SIGNATURE_SIZE>(sig_hex)
            .map_err(SignerError::MalformedSignature)?;
        if hex::encode(raw) != sig_hex {
            return Err(SignerError::MalformedSignature(
                "signature must be lowercase hex".into(),
            ));
        }
        let sig = ed25519_dalek::Signature::from_bytes(&raw);
        let valid = verifying.verify_strict(message.as_bytes(), &sig).is_ok();
        if !valid {
            debug!("ed25519 signature rejected");
        }
        Ok(Verification {
            valid,
            message: message.to_string(),
        })
    }
}

fn armor(label: &str, body: &str) -> String {
    format!("-----BEGIN {label}-----\n{body}\n-----END {label}-----\n")
}

fn dearmor<'a>(label: &str, text: &'a str) -> Result<&'a str, SignerError> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");
    text.trim()
        .strip_prefix(begin.as_str())
        .and_then(|rest| rest.strip_suffix(end.as_str()))
        .map(str::trim)
        .ok_or_else(|| SignerError::MalformedKey(format!("expected a {label} block")))
}

fn parse_signing_key(text: &str) -> Result<SigningKey, SignerError> {
    let body = dearmor(PRIVATE_KEY_LABEL, text)?;
    let bytes = decode_fixed::<KEY_SIZE>(body).map_err(SignerError::MalformedKey)?;
    Ok(SigningKey::from_bytes(&bytes))
}

fn parse_verifying_key(text: &str) -> Result<VerifyingKey, SignerError> {
    let body = dearmor(PUBLIC_KEY_LABEL, text)?;
    let bytes = decode_fixed::<KEY_SIZE>(body).map_err(SignerError::MalformedKey)?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|_| SignerError::MalformedKey("not a valid ed25519 point".into()))
}

/// Split a cleartext block into `(message, signature hex)`. Strict: nothing is
/// trimmed. The signature hex must also be in canonical lowercase form, which
/// `verify` checks after decoding.
fn split_cleartext(block: &str) -> Result<(&str, &str), SignerError> {
    block
        .strip_prefix(MESSAGE_HEADER)
        .and_then(|rest| rest.strip_suffix(SIGNATURE_FOOTER))
        .and_then(|inner| inner.rsplit_once(SIGNATURE_SEPARATOR))
        .ok_or_else(|| SignerError::MalformedSignature("bad cleartext framing".into()))
}

fn decode_fixed<const N: usize>(hex_text: &str) -> Result<[u8; N], String> {
    let mut out = [0u8; N];
    hex::decode_to_slice(hex_text, &mut out).map_err(|e| e.to_string())?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_recovers_message() {
        let keys = Ed25519Scheme::generate_keypair();
        let scheme = Ed25519Scheme;
        let sig = scheme.sign("hello world", &keys.private_key).unwrap();
        let v = scheme.verify(&sig, &keys.public_key).unwrap();
        assert!(v.valid);
        assert_eq!(v.message, "hello world");
    }

    #[test]
    fn multiline_and_empty_messages_round_trip() {
        let keys = Ed25519Scheme::generate_keypair();
        let scheme = Ed25519Scheme;
        for msg in ["", "line one\nline two\n", "-----BEGIN LEDGER SIGNATURE-----"] {
            let sig = scheme.sign(msg, &keys.private_key).unwrap();
            let v = scheme.verify(&sig, &keys.public_key).unwrap();
            assert!(v.valid, "message {msg:?} should verify");
            assert_eq!(v.message, msg);
        }
    }

    #[test]
    fn unrelated_key_is_rejected() {
        let alice = Ed25519Scheme::generate_keypair();
        let mallory = Ed25519Scheme::generate_keypair();
        let scheme = Ed25519Scheme;
        let sig = scheme.sign("message", &alice.private_key).unwrap();
        let v = scheme.verify(&sig, &mallory.public_key).unwrap();
        assert!(!v.valid);
        assert_eq!(v.message, "message");
    }

    #[test]
    fn every_single_bit_flip_is_rejected() {
        let keys = Ed25519Scheme::generate_keypair();
        let scheme = Ed25519Scheme;
        let sig = scheme.sign("Someone is in the kitchen", &keys.private_key).unwrap();
        let bytes = sig.as_bytes();
        for i in 0..bytes.len() {
            for bit in 0..8 {
                let mut flipped = bytes.to_vec();
                flipped[i] ^= 1 << bit;
                // Flips that leave valid UTF-8 are the only ones a text block can carry.
                let Ok(flipped) = String::from_utf8(flipped) else {
                    continue;
                };
                let accepted = matches!(
                    scheme.verify(&flipped, &keys.public_key),
                    Ok(Verification { valid: true, .. })
                );
                assert!(!accepted, "flip of bit {bit} at byte {i} was accepted");
            }
        }
    }

    #[test]
    fn uppercase_signature_hex_is_rejected() {
        let keys = Ed25519Scheme::generate_keypair();
        let scheme = Ed25519Scheme;
        let sig = scheme.sign("hello", &keys.private_key).unwrap();
        let (message, sig_hex) = split_cleartext(&sig).unwrap();
        assert!(sig_hex.chars().any(|c| ('a'..='f').contains(&c)));
        let upper = format!(
            "{MESSAGE_HEADER}{message}{SIGNATURE_SEPARATOR}{}{SIGNATURE_FOOTER}",
            sig_hex.to_ascii_uppercase()
        );
        assert!(matches!(
            scheme.verify(&upper, &keys.public_key),
            Err(SignerError::MalformedSignature(_))
        ));
    }

    #[test]
    fn malformed_inputs_are_backend_errors() {
        let keys = Ed25519Scheme::generate_keypair();
        let scheme = Ed25519Scheme;
        let sig = scheme.sign("m", &keys.private_key).unwrap();

        assert!(matches!(
            scheme.verify("not a signature", &keys.public_key),
            Err(SignerError::MalformedSignature(_))
        ));
        assert!(matches!(
            scheme.verify(&sig, "not a key"),
            Err(SignerError::MalformedKey(_))
        ));
        // A public key handed in where a private one is expected.
        assert!(matches!(
            scheme.sign("m", &keys.public_key),
            Err(SignerError::MalformedKey(_))
        ));
    }

    #[test]
    fn armored_keys_tolerate_surrounding_whitespace() {
        let keys = Ed25519Scheme::generate_keypair();
        let scheme = Ed25519Scheme;
        let padded_private = format!("\n\n{}  \n", keys.private_key);
        let padded_public = format!("  {}\r\n", keys.public_key);
        let sig = scheme.sign("m", &padded_private).unwrap();
        assert!(scheme.verify(&sig, &padded_public).unwrap().valid);
    }

    #[test]
    fn public_key_is_derivable_from_private() {
        let keys = Ed25519Scheme::generate_keypair();
        assert_eq!(
            Ed25519Scheme::public_key_for(&keys.private_key).unwrap(),
            keys.public_key
        );
    }

    #[test]
    fn keypair_check_catches_mismatched_halves() {
        let alice = Ed25519Scheme::generate_keypair();
        let bob = Ed25519Scheme::generate_keypair();
        assert!(Ed25519Scheme::check_keypair(&alice).is_ok());

        let mixed = KeyPair::new(alice.private_key.clone(), bob.public_key.clone());
        assert_eq!(
            Ed25519Scheme::check_keypair(&mixed),
            Err(SignerError::MismatchedKeyPair)
        );

        let garbled = KeyPair::new(alice.private_key, "nope");
        assert!(matches!(
            Ed25519Scheme::check_keypair(&garbled),
            Err(SignerError::MalformedKey(_))
        ));
    }

    #[test]
    fn debug_redacts_private_key() {
        let keys = Ed25519Scheme::generate_keypair();
        let debug = format!("{keys:?}");
        assert!(debug.contains("redacted"));
        assert!(!debug.contains(&keys.private_key));
    }
}
