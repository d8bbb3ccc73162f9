//! Transport key types
//!
//! A [`TransportKeys`] value is everything two contacts need to talk over
//! one transport in one rotation period: three incoming windows (previous,
//! current, next) so that a peer whose clock is a period off is still
//! understood, and one outgoing window. Values are immutable; rotation
//! returns a new value.

use std::fmt;

use hedgerow_crypto::SecretKey;

/// A coarse, synchronised time window used to schedule key rotation.
pub type RotationPeriod = u64;

/// Names a transport channel type, e.g. `"org.hedgerow.bluetooth"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(String);

impl TransportId {
    /// Wrap a transport name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Transport name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keys for recognising and decrypting streams from one period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingKeys {
    tag_key: SecretKey,
    header_key: SecretKey,
    period: RotationPeriod,
}

impl IncomingKeys {
    pub(crate) fn new(tag_key: SecretKey, header_key: SecretKey, period: RotationPeriod) -> Self {
        Self { tag_key, header_key, period }
    }

    /// Key for computing expected stream tags.
    pub fn tag_key(&self) -> &SecretKey {
        &self.tag_key
    }

    /// Key protecting stream headers.
    pub fn header_key(&self) -> &SecretKey {
        &self.header_key
    }

    /// Period these keys belong to.
    pub fn period(&self) -> RotationPeriod {
        self.period
    }
}

/// Keys for tagging and encrypting our own streams in the current period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingKeys {
    tag_key: SecretKey,
    header_key: SecretKey,
    period: RotationPeriod,
    active: bool,
}

impl OutgoingKeys {
    pub(crate) fn new(
        tag_key: SecretKey,
        header_key: SecretKey,
        period: RotationPeriod,
        active: bool,
    ) -> Self {
        Self { tag_key, header_key, period, active }
    }

    /// Key for tagging streams.
    pub fn tag_key(&self) -> &SecretKey {
        &self.tag_key
    }

    /// Key protecting stream headers.
    pub fn header_key(&self) -> &SecretKey {
        &self.header_key
    }

    /// Period these keys belong to.
    pub fn period(&self) -> RotationPeriod {
        self.period
    }

    /// Whether streams may be sent with these keys yet.
    ///
    /// Keys from a fresh key agreement stay inactive until the peer proves it
    /// holds them by sending us a stream.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// How a key set's windows were derived, and so how they advance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyMode {
    /// Each window is a one-way rotation of the previous one.
    Rotation,
    /// Each window is derived directly from a long-lived root key.
    Handshake {
        /// Root the windows are derived from
        root_key: SecretKey,
        /// Our role when the key set was created
        initiator: bool,
    },
}

/// The complete key set for one contact over one transport.
///
/// # Invariants
///
/// - Incoming periods are `P - 1`, `P` and `P + 1`, outgoing is `P`
/// - Values never change; [`update_keys`](crate::update_keys) returns a new
///   value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportKeys {
    transport_id: TransportId,
    previous_incoming: IncomingKeys,
    current_incoming: IncomingKeys,
    next_incoming: IncomingKeys,
    current_outgoing: OutgoingKeys,
    mode: KeyMode,
}

impl TransportKeys {
    pub(crate) fn new(
        transport_id: TransportId,
        previous_incoming: IncomingKeys,
        current_incoming: IncomingKeys,
        next_incoming: IncomingKeys,
        current_outgoing: OutgoingKeys,
        mode: KeyMode,
    ) -> Self {
        debug_assert_eq!(previous_incoming.period + 1, current_incoming.period);
        debug_assert_eq!(current_incoming.period + 1, next_incoming.period);
        debug_assert_eq!(current_incoming.period, current_outgoing.period);

        Self {
            transport_id,
            previous_incoming,
            current_incoming,
            next_incoming,
            current_outgoing,
            mode,
        }
    }

    /// Transport these keys belong to.
    pub fn transport_id(&self) -> &TransportId {
        &self.transport_id
    }

    /// Incoming keys for the period before the current one.
    pub fn previous_incoming(&self) -> &IncomingKeys {
        &self.previous_incoming
    }

    /// Incoming keys for the current period.
    pub fn current_incoming(&self) -> &IncomingKeys {
        &self.current_incoming
    }

    /// Incoming keys for the period after the current one.
    pub fn next_incoming(&self) -> &IncomingKeys {
        &self.next_incoming
    }

    /// All three incoming windows, oldest first.
    pub fn incoming(&self) -> [&IncomingKeys; 3] {
        [&self.previous_incoming, &self.current_incoming, &self.next_incoming]
    }

    /// Outgoing keys for the current period.
    pub fn current_outgoing(&self) -> &OutgoingKeys {
        &self.current_outgoing
    }

    /// Current period.
    pub fn period(&self) -> RotationPeriod {
        self.current_outgoing.period
    }

    /// How the windows advance.
    pub fn mode(&self) -> &KeyMode {
        &self.mode
    }

    /// Whether these keys were derived from a handshake root.
    pub fn is_handshake_mode(&self) -> bool {
        matches!(self.mode, KeyMode::Handshake { .. })
    }

    /// The same keys with outgoing streams allowed.
    pub fn activated(mut self) -> Self {
        self.current_outgoing.active = true;
        self
    }

    pub(crate) fn into_parts(
        self,
    ) -> (TransportId, [IncomingKeys; 3], OutgoingKeys, KeyMode) {
        (
            self.transport_id,
            [self.previous_incoming, self.current_incoming, self.next_incoming],
            self.current_outgoing,
            self.mode,
        )
    }
}
