//! Key rotation engine
//!
//! Two flavours share one state machine:
//!
//! - Rotation keys start from per-direction keys derived once from the root,
//!   then walk forward one period at a time with a one-way [`rotate_key`].
//!   Holding period `P`'s keys reveals nothing about period `P - 1`'s.
//! - Handshake keys derive every window directly from the root and the
//!   period, so both sides can compute them without any shared history.
//!
//! ```text
//! root ──derive(direction label, transport)──► raw (P-1)
//!                                              │ rotate(P)
//!                                              ▼
//!                                           current (P) ──rotate(P+1)──► next (P+1)
//! ```
//!
//! Directions use distinct labels, so our outgoing keys are exactly the
//! peer's incoming keys and never our own incoming keys.
//!
//! All functions here are pure. Periods must be at least 1 (the previous
//! window of period 0 does not exist) and below `u64::MAX`; anything else is
//! a caller bug and panics.

use hedgerow_crypto::{SecretKey, primitives::derive_key};

use crate::keys::{
    IncomingKeys, KeyMode, OutgoingKeys, RotationPeriod, TransportId, TransportKeys,
};

const ROTATE_LABEL: &str = "org.hedgerow.transport/ROTATE";

/// Tag and header key labels for one direction.
struct Labels {
    tag: &'static str,
    header: &'static str,
}

const INITIATOR_ROTATION: Labels = Labels {
    tag: "org.hedgerow.transport/INITIATOR_TAG_KEY",
    header: "org.hedgerow.transport/INITIATOR_HEADER_KEY",
};

const RESPONDER_ROTATION: Labels = Labels {
    tag: "org.hedgerow.transport/RESPONDER_TAG_KEY",
    header: "org.hedgerow.transport/RESPONDER_HEADER_KEY",
};

const INITIATOR_HANDSHAKE: Labels = Labels {
    tag: "org.hedgerow.transport/INITIATOR_HANDSHAKE_TAG_KEY",
    header: "org.hedgerow.transport/INITIATOR_HANDSHAKE_HEADER_KEY",
};

const RESPONDER_HANDSHAKE: Labels = Labels {
    tag: "org.hedgerow.transport/RESPONDER_HANDSHAKE_TAG_KEY",
    header: "org.hedgerow.transport/RESPONDER_HANDSHAKE_HEADER_KEY",
};

/// Labels for (incoming, outgoing). The initiator sends under initiator
/// labels, so it receives under responder labels.
fn direction_labels(initiator: bool, handshake: bool) -> (&'static Labels, &'static Labels) {
    let (initiator_labels, responder_labels) = if handshake {
        (&INITIATOR_HANDSHAKE, &RESPONDER_HANDSHAKE)
    } else {
        (&INITIATOR_ROTATION, &RESPONDER_ROTATION)
    };

    if initiator {
        (responder_labels, initiator_labels)
    } else {
        (initiator_labels, responder_labels)
    }
}

fn check_period(period: RotationPeriod) {
    assert!(
        (1..RotationPeriod::MAX).contains(&period),
        "rotation period {period} out of range"
    );
}

/// One-way step of a key into `period`.
pub fn rotate_key(key: &SecretKey, period: RotationPeriod) -> SecretKey {
    derive_key(ROTATE_LABEL, key, &[&period.to_be_bytes()])
}

fn rotate_incoming(keys: &IncomingKeys, period: RotationPeriod) -> IncomingKeys {
    IncomingKeys::new(
        rotate_key(keys.tag_key(), period),
        rotate_key(keys.header_key(), period),
        period,
    )
}

fn rotate_outgoing(keys: &OutgoingKeys, period: RotationPeriod) -> OutgoingKeys {
    OutgoingKeys::new(
        rotate_key(keys.tag_key(), period),
        rotate_key(keys.header_key(), period),
        period,
        keys.is_active(),
    )
}

/// Derive rotation keys for `period` from a root key.
///
/// `initiator` must differ between the two contacts; `active` says whether
/// outgoing streams may be sent before the peer has used the keys.
///
/// # Panics
///
/// If `period` is 0 or `u64::MAX`.
pub fn derive_rotation_keys(
    transport_id: &TransportId,
    root_key: &SecretKey,
    period: RotationPeriod,
    initiator: bool,
    active: bool,
) -> TransportKeys {
    check_period(period);

    let (incoming, outgoing) = direction_labels(initiator, false);
    let id = transport_id.as_str().as_bytes();

    let previous = IncomingKeys::new(
        derive_key(incoming.tag, root_key, &[id]),
        derive_key(incoming.header, root_key, &[id]),
        period - 1,
    );
    let current = rotate_incoming(&previous, period);
    let next = rotate_incoming(&current, period + 1);

    let raw_outgoing = OutgoingKeys::new(
        derive_key(outgoing.tag, root_key, &[id]),
        derive_key(outgoing.header, root_key, &[id]),
        period - 1,
        active,
    );
    let current_outgoing = rotate_outgoing(&raw_outgoing, period);

    TransportKeys::new(
        transport_id.clone(),
        previous,
        current,
        next,
        current_outgoing,
        KeyMode::Rotation,
    )
}

fn handshake_incoming(
    labels: &Labels,
    root_key: &SecretKey,
    transport_id: &TransportId,
    period: RotationPeriod,
) -> IncomingKeys {
    let id = transport_id.as_str().as_bytes();
    let encoded_period = period.to_be_bytes();

    IncomingKeys::new(
        derive_key(labels.tag, root_key, &[id, &encoded_period]),
        derive_key(labels.header, root_key, &[id, &encoded_period]),
        period,
    )
}

fn handshake_outgoing(
    labels: &Labels,
    root_key: &SecretKey,
    transport_id: &TransportId,
    period: RotationPeriod,
) -> OutgoingKeys {
    let id = transport_id.as_str().as_bytes();
    let encoded_period = period.to_be_bytes();

    OutgoingKeys::new(
        derive_key(labels.tag, root_key, &[id, &encoded_period]),
        derive_key(labels.header, root_key, &[id, &encoded_period]),
        period,
        true,
    )
}

/// Derive handshake keys for `period` directly from a root key.
///
/// Outgoing keys are always active. The root key is kept inside the result
/// so later windows can be derived.
///
/// # Panics
///
/// If `period` is 0 or `u64::MAX`.
pub fn derive_handshake_keys(
    transport_id: &TransportId,
    root_key: &SecretKey,
    period: RotationPeriod,
    initiator: bool,
) -> TransportKeys {
    check_period(period);

    let (incoming, outgoing) = direction_labels(initiator, true);

    TransportKeys::new(
        transport_id.clone(),
        handshake_incoming(incoming, root_key, transport_id, period - 1),
        handshake_incoming(incoming, root_key, transport_id, period),
        handshake_incoming(incoming, root_key, transport_id, period + 1),
        handshake_outgoing(outgoing, root_key, transport_id, period),
        KeyMode::Handshake { root_key: root_key.clone(), initiator },
    )
}

/// Shift the windows forward by one period.
///
/// previous ← current, current ← next, next ← `next_window(old next)`,
/// outgoing ← `outgoing(old outgoing)`.
fn advance(
    keys: TransportKeys,
    next_window: impl FnOnce(&IncomingKeys) -> IncomingKeys,
    outgoing: impl FnOnce(&OutgoingKeys) -> OutgoingKeys,
) -> TransportKeys {
    let (transport_id, [_, current, next], current_outgoing, mode) = keys.into_parts();

    let new_next = next_window(&next);
    let new_outgoing = outgoing(&current_outgoing);

    TransportKeys::new(transport_id, current, next, new_next, new_outgoing, mode)
}

/// Bring `keys` forward to `period`.
///
/// Returns `keys` unchanged if `period` is not ahead of its current period;
/// keys never move backwards. Otherwise rotation keys advance one period at
/// a time, so `update_keys(update_keys(k, p1), p2) == update_keys(k, p2)`
/// for `p1 <= p2`.
///
/// # Panics
///
/// If `period` is `u64::MAX`.
pub fn update_keys(keys: TransportKeys, period: RotationPeriod) -> TransportKeys {
    let start = keys.period();
    if period <= start {
        return keys;
    }
    check_period(period);

    match keys.mode().clone() {
        KeyMode::Rotation => (start + 1..=period).fold(keys, |keys, p| {
            advance(keys, |next| rotate_incoming(next, p + 1), |out| rotate_outgoing(out, p))
        }),
        KeyMode::Handshake { root_key, initiator } => {
            // Windows depend only on the period, so a long jump is a fresh
            // derivation
            if period - start > 2 {
                return derive_handshake_keys(keys.transport_id(), &root_key, period, initiator);
            }

            let transport_id = keys.transport_id().clone();
            let (incoming, outgoing) = direction_labels(initiator, true);
            (start + 1..=period).fold(keys, |keys, p| {
                advance(
                    keys,
                    |_| handshake_incoming(incoming, &root_key, &transport_id, p + 1),
                    |_| handshake_outgoing(outgoing, &root_key, &transport_id, p),
                )
            })
        },
    }
}
