//! XSalsa20-Poly1305 authenticated encryption
//!
//! NaCl secretbox construction: the first 32 bytes of keystream become a
//! one-time Poly1305 key, the message is XORed with the keystream that
//! follows, and the tag is computed over the ciphertext alone.
//!
//! ```text
//! keystream:  [ subkey (32) | message keystream ... ]
//! output:     ciphertext ‖ tag (16)
//! ```
//!
//! Every key/nonce pair must be used at most once. Callers derive nonces
//! from counters (frames) or draw them at random (password envelopes).

use poly1305::{Poly1305, universal_hash::KeyInit};
use salsa20::{
    XSalsa20,
    cipher::{KeyIvInit, StreamCipher},
};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use crate::{error::CryptoError, secret::SecretKey};

/// XSalsa20 nonce length.
pub const NONCE_LENGTH: usize = 24;

/// Poly1305 tag length.
pub const MAC_LENGTH: usize = 16;

/// Keystream bytes consumed for the one-time MAC key.
const SUBKEY_LENGTH: usize = 32;

/// Arrange the one-time subkey from the keystream into a Poly1305 key.
///
/// On the wire, `r` is the first half of the subkey and `s` the second.
/// Poly1305 libraries disagree about key layout: `poly1305::Poly1305` takes
/// `r ‖ s`, which matches the keystream order, while libraries that take
/// `s ‖ r` must swap the halves here. Getting this wrong still produces a
/// working MAC, just one no other implementation accepts.
fn poly1305_key(subkey: &[u8; SUBKEY_LENGTH]) -> poly1305::Key {
    let (r, s) = subkey.split_at(SUBKEY_LENGTH / 2);

    let mut key = poly1305::Key::default();
    key[..16].copy_from_slice(r);
    key[16..].copy_from_slice(s);
    key
}

/// Key the stream cipher and draw the one-time MAC from its first block.
fn init(key: &SecretKey, nonce: &[u8; NONCE_LENGTH]) -> (XSalsa20, Poly1305) {
    let mut cipher = XSalsa20::new(key.as_bytes().into(), nonce.into());

    let mut subkey = Zeroizing::new([0u8; SUBKEY_LENGTH]);
    cipher.apply_keystream(&mut *subkey);

    let mut mac_key = poly1305_key(&subkey);
    let mac = Poly1305::new(&mac_key);
    mac_key.as_mut_slice().zeroize();

    (cipher, mac)
}

/// Encrypt `buffer` in place and return the detached tag.
pub fn encrypt_in_place_detached(
    key: &SecretKey,
    nonce: &[u8; NONCE_LENGTH],
    buffer: &mut [u8],
) -> [u8; MAC_LENGTH] {
    let (mut cipher, mac) = init(key, nonce);
    cipher.apply_keystream(buffer);

    let mut tag = [0u8; MAC_LENGTH];
    tag.copy_from_slice(&mac.compute_unpadded(buffer));
    tag
}

/// Verify `tag` over `buffer` and, only if it matches, decrypt in place.
///
/// # Errors
///
/// - `AuthenticationFailed`: tag mismatch; `buffer` is left as ciphertext
pub fn decrypt_in_place_detached(
    key: &SecretKey,
    nonce: &[u8; NONCE_LENGTH],
    buffer: &mut [u8],
    tag: &[u8],
) -> Result<(), CryptoError> {
    let (mut cipher, mac) = init(key, nonce);

    let expected = mac.compute_unpadded(buffer);
    if !bool::from(expected.as_slice().ct_eq(tag)) {
        return Err(CryptoError::AuthenticationFailed);
    }

    cipher.apply_keystream(buffer);
    Ok(())
}

/// Encrypt `plaintext`, returning `ciphertext ‖ tag`.
pub fn encrypt(key: &SecretKey, nonce: &[u8; NONCE_LENGTH], plaintext: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(plaintext.len() + MAC_LENGTH);
    out.extend_from_slice(plaintext);

    let tag = encrypt_in_place_detached(key, nonce, &mut out);
    out.extend_from_slice(&tag);
    out
}

/// Decrypt `ciphertext ‖ tag`.
///
/// # Errors
///
/// - `CiphertextTooShort`: input is shorter than a tag
/// - `AuthenticationFailed`: wrong key or nonce, or tampered input
pub fn decrypt(
    key: &SecretKey,
    nonce: &[u8; NONCE_LENGTH],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let Some(body_len) = ciphertext.len().checked_sub(MAC_LENGTH) else {
        return Err(CryptoError::CiphertextTooShort { len: ciphertext.len() });
    };
    let (body, tag) = ciphertext.split_at(body_len);

    let mut out = body.to_vec();
    decrypt_in_place_detached(key, nonce, &mut out, tag)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use crypto_secretbox::{
        XSalsa20Poly1305,
        aead::{AeadInPlace, KeyInit as _, generic_array::GenericArray},
    };

    use super::*;

    fn test_key() -> SecretKey {
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = i as u8;
        }
        SecretKey::from_bytes(bytes)
    }

    const NONCE: [u8; NONCE_LENGTH] = [0x24; NONCE_LENGTH];

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let ciphertext = encrypt(&test_key(), &NONCE, b"Hello, World!");
        let plaintext = decrypt(&test_key(), &NONCE, &ciphertext).unwrap();

        assert_eq!(plaintext, b"Hello, World!");
    }

    #[test]
    fn empty_plaintext_is_just_a_tag() {
        let ciphertext = encrypt(&test_key(), &NONCE, b"");

        assert_eq!(ciphertext.len(), MAC_LENGTH);
        assert_eq!(decrypt(&test_key(), &NONCE, &ciphertext).unwrap(), b"");
    }

    #[test]
    fn input_shorter_than_tag_is_rejected() {
        let result = decrypt(&test_key(), &NONCE, &[0u8; MAC_LENGTH - 1]);

        assert_eq!(result, Err(CryptoError::CiphertextTooShort { len: MAC_LENGTH - 1 }));
    }

    #[test]
    fn every_flipped_byte_is_rejected() {
        let ciphertext = encrypt(&test_key(), &NONCE, b"sixteen byte msg and then some");

        for i in 0..ciphertext.len() {
            let mut tampered = ciphertext.clone();
            tampered[i] ^= 0x01;

            assert_eq!(
                decrypt(&test_key(), &NONCE, &tampered),
                Err(CryptoError::AuthenticationFailed),
                "flip at byte {i} was accepted"
            );
        }
    }

    #[test]
    fn wrong_key_or_nonce_is_rejected() {
        let ciphertext = encrypt(&test_key(), &NONCE, b"payload");

        let other_key = SecretKey::from_bytes([9; 32]);
        assert!(decrypt(&other_key, &NONCE, &ciphertext).is_err());

        let mut other_nonce = NONCE;
        other_nonce[23] ^= 0x80;
        assert!(decrypt(&test_key(), &other_nonce, &ciphertext).is_err());
    }

    #[test]
    fn failed_decryption_leaves_ciphertext_untouched() {
        let mut buffer = b"secret".to_vec();
        let tag = encrypt_in_place_detached(&test_key(), &NONCE, &mut buffer);
        let ciphertext = buffer.clone();

        let mut bad_tag = tag;
        bad_tag[0] ^= 0xFF;

        assert!(decrypt_in_place_detached(&test_key(), &NONCE, &mut buffer, &bad_tag).is_err());
        assert_eq!(buffer, ciphertext);
    }

    #[test]
    fn matches_nacl_secretbox() {
        let key = test_key();
        let plaintext = b"interop with the reference secretbox layout".to_vec();

        let reference = XSalsa20Poly1305::new_from_slice(key.as_bytes()).unwrap();
        let mut expected = plaintext.clone();
        let expected_tag = reference
            .encrypt_in_place_detached(GenericArray::from_slice(&NONCE), b"", &mut expected)
            .unwrap();

        let mut actual = plaintext;
        let actual_tag = encrypt_in_place_detached(&key, &NONCE, &mut actual);

        assert_eq!(actual, expected);
        assert_eq!(actual_tag.as_slice(), expected_tag.as_slice());
    }

    #[test]
    fn subkey_halves_are_not_interchangeable() {
        let mut subkey = [0u8; SUBKEY_LENGTH];
        subkey[..16].fill(0x11);
        subkey[16..].fill(0x22);

        let mut swapped = [0u8; SUBKEY_LENGTH];
        swapped[..16].fill(0x22);
        swapped[16..].fill(0x11);

        let tag = Poly1305::new(&poly1305_key(&subkey)).compute_unpadded(b"frame");
        let swapped_tag = Poly1305::new(&poly1305_key(&swapped)).compute_unpadded(b"frame");

        assert_ne!(tag, swapped_tag);
        assert_eq!(&poly1305_key(&subkey)[..16], &subkey[..16]);
    }
}
