//! Labelled hash, MAC and KDF, plus signature and key agreement wrappers
//!
//! All labelled functions share one encoding: `len(label) ‖ label`, then
//! `len(input) ‖ input` for each input, with lengths as 32-bit big-endian
//! integers. Labels are namespaced strings owned by the calling module.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hedgerow_core::Environment;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::{
    error::CryptoError,
    secret::{SECRET_KEY_LENGTH, SecretKey},
};

type HmacSha256 = Hmac<Sha256>;

/// Output length of [`hash`] and [`mac`].
pub const HASH_LENGTH: usize = 32;

/// Feed `label` and `inputs` to `update` using the length-prefixed encoding.
fn absorb(mut update: impl FnMut(&[u8]), label: &str, inputs: &[&[u8]]) {
    update(&(label.len() as u32).to_be_bytes());
    update(label.as_bytes());
    for input in inputs {
        update(&(input.len() as u32).to_be_bytes());
        update(input);
    }
}

fn keyed(key: &SecretKey) -> HmacSha256 {
    let Ok(mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac
}

fn finish(mac: HmacSha256) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Domain-separated SHA-256.
pub fn hash(label: &str, inputs: &[&[u8]]) -> [u8; HASH_LENGTH] {
    let mut hasher = Sha256::new();
    absorb(|data| Digest::update(&mut hasher, data), label, inputs);

    let mut out = [0u8; HASH_LENGTH];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Domain-separated HMAC-SHA-256.
pub fn mac(label: &str, key: &SecretKey, inputs: &[&[u8]]) -> [u8; HASH_LENGTH] {
    let mut mac = keyed(key);
    absorb(|data| Mac::update(&mut mac, data), label, inputs);
    finish(mac)
}

/// Check `expected` against [`mac`] in constant time.
pub fn verify_mac(expected: &[u8], label: &str, key: &SecretKey, inputs: &[&[u8]]) -> bool {
    let actual = mac(label, key, inputs);
    actual.as_slice().ct_eq(expected).into()
}

/// Derive a new key from `key`, bound to `label` and `inputs`.
///
/// One-way: the output reveals nothing usable about `key`.
pub fn derive_key(label: &str, key: &SecretKey, inputs: &[&[u8]]) -> SecretKey {
    SecretKey::from_bytes(mac(label, key, inputs))
}

/// Unlabelled keyed PRF over a single input.
///
/// For wire formats that fix the exact PRF input, such as stream tags.
pub fn prf(key: &SecretKey, input: &[u8]) -> [u8; HASH_LENGTH] {
    let mut mac = keyed(key);
    Mac::update(&mut mac, input);
    finish(mac)
}

fn signed_bytes(label: &str, message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + label.len() + message.len());
    absorb(|data| out.extend_from_slice(data), label, &[message]);
    out
}

/// Sign `message` under `label` with Ed25519.
pub fn sign(label: &str, signing_key: &SigningKey, message: &[u8]) -> Signature {
    signing_key.sign(&signed_bytes(label, message))
}

/// Verify a signature produced by [`sign`] with the same label.
///
/// # Errors
///
/// - `InvalidSignature`: wrong key, label, message or signature
pub fn verify(
    label: &str,
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), CryptoError> {
    verifying_key
        .verify(&signed_bytes(label, message), signature)
        .map_err(|_| CryptoError::InvalidSignature)
}

/// X25519 agreement, hashed together with `inputs` under `label`.
///
/// # Errors
///
/// - `InvalidPublicKey`: the peer's key is a low-order point, so the shared
///   secret would be all zeroes
pub fn agree(
    label: &str,
    our_secret: &StaticSecret,
    their_public: &PublicKey,
    inputs: &[&[u8]],
) -> Result<SecretKey, CryptoError> {
    let shared = our_secret.diffie_hellman(their_public);
    if !shared.was_contributory() {
        return Err(CryptoError::InvalidPublicKey);
    }

    let mut parts: Vec<&[u8]> = Vec::with_capacity(inputs.len() + 1);
    parts.push(shared.as_bytes());
    parts.extend_from_slice(inputs);

    Ok(SecretKey::from_bytes(hash(label, &parts)))
}

/// Generate an Ed25519 signing key.
pub fn generate_signature_key_pair<E: Environment>(env: &E) -> SigningKey {
    let mut seed = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
    env.random_bytes(&mut *seed);
    SigningKey::from_bytes(&seed)
}

/// Generate an X25519 key pair.
pub fn generate_agreement_key_pair<E: Environment>(env: &E) -> (StaticSecret, PublicKey) {
    let mut seed = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
    env.random_bytes(&mut *seed);

    let secret = StaticSecret::from(*seed);
    let public = PublicKey::from(&secret);
    (secret, public)
}

#[cfg(test)]
mod tests {
    use hedgerow_core::SimEnv;

    use super::*;

    fn key(byte: u8) -> SecretKey {
        SecretKey::from_bytes([byte; SECRET_KEY_LENGTH])
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash("test", &[b"a", b"b"]), hash("test", &[b"a", b"b"]));
    }

    #[test]
    fn length_prefix_prevents_boundary_shifts() {
        // Same concatenated bytes, different field boundaries
        assert_ne!(hash("test", &[b"ab", b"c"]), hash("test", &[b"a", b"bc"]));
        assert_ne!(hash("test", &[b"abc"]), hash("test", &[b"ab", b"c"]));
        assert_ne!(hash("testa", &[b"b"]), hash("test", &[b"ab"]));
    }

    #[test]
    fn label_separates_domains() {
        let k = key(1);

        assert_ne!(mac("one", &k, &[b"x"]), mac("two", &k, &[b"x"]));
        assert_ne!(derive_key("one", &k, &[]), derive_key("two", &k, &[]));
    }

    #[test]
    fn mac_depends_on_key() {
        assert_ne!(mac("label", &key(1), &[b"x"]), mac("label", &key(2), &[b"x"]));
    }

    #[test]
    fn verify_mac_accepts_correct_and_rejects_wrong() {
        let k = key(3);
        let tag = mac("label", &k, &[b"msg"]);

        assert!(verify_mac(&tag, "label", &k, &[b"msg"]));
        assert!(!verify_mac(&tag, "label", &k, &[b"msh"]));
        assert!(!verify_mac(&tag[..31], "label", &k, &[b"msg"]));
    }

    #[test]
    fn prf_is_unlabelled() {
        let k = key(0x0b);
        let a = prf(&k, b"Hi There");
        let b = prf(&k, b"Hi There");

        assert_eq!(a, b);
        assert_ne!(a, prf(&k, b"Hi there"));
        assert_ne!(a, mac("", &k, &[b"Hi There"]));
    }

    #[test]
    fn sign_and_verify() {
        let env = SimEnv::with_seed(1);
        let signing_key = generate_signature_key_pair(&env);
        let verifying_key = signing_key.verifying_key();

        let signature = sign("label", &signing_key, b"message");

        assert!(verify("label", &verifying_key, b"message", &signature).is_ok());
        assert_eq!(
            verify("other", &verifying_key, b"message", &signature),
            Err(CryptoError::InvalidSignature)
        );
        assert_eq!(
            verify("label", &verifying_key, b"massage", &signature),
            Err(CryptoError::InvalidSignature)
        );
    }

    #[test]
    fn agreement_is_symmetric() {
        let env = SimEnv::with_seed(2);
        let (alice_secret, alice_public) = generate_agreement_key_pair(&env);
        let (bob_secret, bob_public) = generate_agreement_key_pair(&env);

        let a = agree("label", &alice_secret, &bob_public, &[b"ctx"]).unwrap();
        let b = agree("label", &bob_secret, &alice_public, &[b"ctx"]).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn agreement_rejects_low_order_point() {
        let env = SimEnv::with_seed(3);
        let (secret, _) = generate_agreement_key_pair(&env);
        let identity = PublicKey::from([0u8; 32]);

        assert_eq!(agree("label", &secret, &identity, &[]), Err(CryptoError::InvalidPublicKey));
    }
}
