//! Root keys for the rotation engine
//!
//! Two contacts that have exchanged long-term X25519 keys share a static
//! master key. Handshake and rotation root keys are both derived from it
//! under distinct labels.

use hedgerow_crypto::{
    CryptoError, SecretKey,
    primitives::{agree, derive_key},
};
use x25519_dalek::{PublicKey, StaticSecret};

const STATIC_MASTER_KEY_LABEL: &str = "org.hedgerow.transport/STATIC_MASTER_KEY";
const CONTACT_ROOT_KEY_LABEL: &str = "org.hedgerow.transport/CONTACT_ROOT_KEY";
const PENDING_CONTACT_ROOT_KEY_LABEL: &str = "org.hedgerow.transport/PENDING_CONTACT_ROOT_KEY";
const ROTATION_ROOT_KEY_LABEL: &str = "org.hedgerow.transport/ROTATION_ROOT_KEY";

/// Whether we take the initiator role with this peer.
///
/// The side with the lexicographically smaller public key initiates, so
/// both sides agree on roles without exchanging a message.
pub fn is_initiator(ours: &PublicKey, theirs: &PublicKey) -> bool {
    ours.as_bytes() < theirs.as_bytes()
}

/// Shared static master key for a pair of long-term key pairs.
///
/// Both public keys are bound into the result in initiator-first order, so
/// both sides compute the same value.
///
/// # Errors
///
/// - `InvalidPublicKey`: `their_public` is a low-order point
pub fn derive_static_master_key(
    our_secret: &StaticSecret,
    their_public: &PublicKey,
) -> Result<SecretKey, CryptoError> {
    let our_public = PublicKey::from(our_secret);
    let (first, second) = if is_initiator(&our_public, their_public) {
        (our_public.as_bytes(), their_public.as_bytes())
    } else {
        (their_public.as_bytes(), our_public.as_bytes())
    };

    agree(STATIC_MASTER_KEY_LABEL, our_secret, their_public, &[first, second])
}

/// Root key for handshake-mode transport keys.
///
/// Pending contacts (not yet confirmed by the user) get a distinct root, so
/// their keys are discarded rather than promoted when the contact is added.
pub fn derive_handshake_root_key(static_master_key: &SecretKey, pending_contact: bool) -> SecretKey {
    let label =
        if pending_contact { PENDING_CONTACT_ROOT_KEY_LABEL } else { CONTACT_ROOT_KEY_LABEL };
    derive_key(label, static_master_key, &[])
}

/// Root key for rotation-mode transport keys.
pub fn derive_rotation_root_key(static_master_key: &SecretKey) -> SecretKey {
    derive_key(ROTATION_ROOT_KEY_LABEL, static_master_key, &[])
}
