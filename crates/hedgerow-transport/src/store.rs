//! Transport key store.
//!
//! Holds every contact's key sets for one transport and an index from the
//! tags we currently expect to the keys that open them. The store is sans-IO:
//! callers pass wall-clock time in and persist or schedule as they see fit.
//!
//! # Invariants
//!
//! - The tag index holds exactly the unseen stream numbers of every incoming
//!   window of every key set
//! - A key set's outgoing stream counter never exceeds
//!   `MAX_STREAM_NUMBER + 1`, and is reset when the outgoing period changes

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    time::Duration,
};

use hedgerow_crypto::SecretKey;

use crate::{
    constants::{MAX_CLOCK_DIFFERENCE, MAX_STREAM_NUMBER, PROTOCOL_VERSION},
    error::KeyStoreError,
    keys::{RotationPeriod, TransportId, TransportKeys},
    rotation::{derive_handshake_keys, derive_rotation_keys, update_keys},
    stream::StreamContext,
    tag::{Tag, encode_tag},
    window::ReorderingWindow,
};

/// Default upper bound on how long a stream takes to arrive.
pub const DEFAULT_MAX_LATENCY: Duration = Duration::from_secs(30);

/// Per-transport timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Longest a stream may take from sender to receiver
    pub max_latency: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { max_latency: DEFAULT_MAX_LATENCY }
    }
}

impl TransportConfig {
    /// Length of one rotation period.
    ///
    /// Long enough that a stream sent at the end of a period by a peer whose
    /// clock is off by [`MAX_CLOCK_DIFFERENCE`] still lands in a window the
    /// receiver holds.
    pub fn period_length(&self) -> Duration {
        self.max_latency + MAX_CLOCK_DIFFERENCE
    }

    fn period_length_millis(&self) -> u64 {
        (self.period_length().as_millis() as u64).max(1)
    }
}

/// Local identifier of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactId(pub u32);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contact-{}", self.0)
    }
}

/// Identifier of one key set, unique within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeySetId(pub u32);

impl fmt::Display for KeySetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "keyset-{}", self.0)
    }
}

struct KeySet {
    contact: ContactId,
    keys: TransportKeys,
    windows: [ReorderingWindow; 3],
    next_outgoing_stream: u64,
}

impl KeySet {
    fn new(contact: ContactId, keys: TransportKeys) -> Self {
        Self { contact, keys, windows: [ReorderingWindow::new(); 3], next_outgoing_stream: 0 }
    }

    fn can_send(&self) -> bool {
        self.keys.current_outgoing().is_active() && self.next_outgoing_stream <= MAX_STREAM_NUMBER
    }

    fn incoming_context(&self, window: usize, stream_number: u64) -> StreamContext {
        let incoming = self.keys.incoming()[window];
        StreamContext {
            transport_id: self.keys.transport_id().clone(),
            tag_key: incoming.tag_key().clone(),
            header_key: incoming.header_key().clone(),
            stream_number,
            handshake_mode: self.keys.is_handshake_mode(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TagEntry {
    key_set: KeySetId,
    window: usize,
    stream_number: u64,
}

/// All transport keys for one transport.
pub struct TransportKeyStore {
    transport_id: TransportId,
    config: TransportConfig,
    next_key_set_id: u32,
    key_sets: BTreeMap<KeySetId, KeySet>,
    tags: HashMap<Tag, TagEntry>,
}

impl TransportKeyStore {
    /// Empty store for `transport_id`.
    pub fn new(transport_id: TransportId, config: TransportConfig) -> Self {
        Self { transport_id, config, next_key_set_id: 0, key_sets: BTreeMap::new(), tags: HashMap::new() }
    }

    /// Transport this store serves.
    pub fn transport_id(&self) -> &TransportId {
        &self.transport_id
    }

    /// Timing configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Rotation period containing wall-clock time `now_ms`.
    ///
    /// Never zero, so the previous window always exists.
    pub fn period_at(&self, now_ms: u64) -> RotationPeriod {
        (now_ms / self.config.period_length_millis()).max(1)
    }

    /// Add keys from a key agreement completed at `timestamp_ms`.
    ///
    /// `active` is false when the peer has yet to prove it holds the keys;
    /// the keys activate when its first stream is recognised.
    pub fn add_rotation_keys(
        &mut self,
        contact: ContactId,
        root_key: &SecretKey,
        timestamp_ms: u64,
        now_ms: u64,
        initiator: bool,
        active: bool,
    ) -> KeySetId {
        let keys = derive_rotation_keys(
            &self.transport_id,
            root_key,
            self.period_at(timestamp_ms),
            initiator,
            active,
        );
        let keys = update_keys(keys, self.period_at(now_ms));
        self.insert(contact, keys)
    }

    /// Add keys derived from a handshake root key.
    pub fn add_handshake_keys(
        &mut self,
        contact: ContactId,
        root_key: &SecretKey,
        now_ms: u64,
        initiator: bool,
    ) -> KeySetId {
        let keys =
            derive_handshake_keys(&self.transport_id, root_key, self.period_at(now_ms), initiator);
        self.insert(contact, keys)
    }

    /// Allow outgoing streams with key set `id`.
    pub fn activate_keys(&mut self, id: KeySetId) -> Result<(), KeyStoreError> {
        let key_set = self.key_sets.get_mut(&id).ok_or(KeyStoreError::UnknownKeySet(id.0))?;
        activate(id, key_set);
        Ok(())
    }

    /// Forget every key set belonging to `contact`.
    pub fn remove_contact(&mut self, contact: ContactId) {
        self.key_sets.retain(|_, key_set| key_set.contact != contact);
        let key_sets = &self.key_sets;
        self.tags.retain(|_, entry| key_sets.contains_key(&entry.key_set));

        tracing::debug!(transport = %self.transport_id, %contact, "contact removed");
    }

    /// Key set ids held for `contact`, oldest first.
    pub fn key_sets_for(&self, contact: ContactId) -> Vec<KeySetId> {
        self.key_sets.iter().filter(|(_, k)| k.contact == contact).map(|(id, _)| *id).collect()
    }

    /// Current keys of key set `id`.
    pub fn keys(&self, id: KeySetId) -> Option<&TransportKeys> {
        self.key_sets.get(&id).map(|key_set| &key_set.keys)
    }

    /// Whether [`next_outgoing_stream`](Self::next_outgoing_stream) would
    /// return a context.
    pub fn can_send_outgoing_streams(&self, contact: ContactId) -> bool {
        self.key_sets.values().any(|key_set| key_set.contact == contact && key_set.can_send())
    }

    /// Allocate the next outgoing stream to `contact`.
    ///
    /// Rotation keys are preferred over handshake keys, then the newest key
    /// set. Returns `None` if no active key set has stream numbers left.
    pub fn next_outgoing_stream(&mut self, contact: ContactId) -> Option<StreamContext> {
        let (_, key_set) = self
            .key_sets
            .iter_mut()
            .filter(|(_, key_set)| key_set.contact == contact && key_set.can_send())
            .max_by_key(|(id, key_set)| (!key_set.keys.is_handshake_mode(), **id))?;

        let outgoing = key_set.keys.current_outgoing();
        let ctx = StreamContext {
            transport_id: key_set.keys.transport_id().clone(),
            tag_key: outgoing.tag_key().clone(),
            header_key: outgoing.header_key().clone(),
            stream_number: key_set.next_outgoing_stream,
            handshake_mode: key_set.keys.is_handshake_mode(),
        };
        key_set.next_outgoing_stream += 1;
        Some(ctx)
    }

    /// Look up the keys for an incoming tag without consuming it.
    pub fn stream_context_for_tag(&self, tag: &Tag) -> Option<(ContactId, StreamContext)> {
        let entry = self.tags.get(tag)?;
        let key_set = self.key_sets.get(&entry.key_set)?;
        Some((key_set.contact, key_set.incoming_context(entry.window, entry.stream_number)))
    }

    /// Look up the keys for an incoming tag and mark its stream seen.
    ///
    /// A tag is recognised at most once. The window slides, newly expected
    /// tags are indexed, and inactive outgoing keys are activated since the
    /// peer has now proved it holds them.
    pub fn recognise_tag(&mut self, tag: &Tag) -> Option<(ContactId, StreamContext)> {
        let Some(entry) = self.tags.remove(tag) else {
            tracing::trace!(transport = %self.transport_id, "unknown tag");
            return None;
        };
        let Some(key_set) = self.key_sets.get_mut(&entry.key_set) else {
            unreachable!("tag index only holds live key sets");
        };

        let Ok(change) = key_set.windows[entry.window].set_seen(entry.stream_number) else {
            unreachable!("indexed stream numbers are unseen and inside their window");
        };
        let tag_key = key_set.keys.incoming()[entry.window].tag_key().clone();
        for stream_number in change.removed {
            self.tags.remove(&encode_tag(&tag_key, PROTOCOL_VERSION, stream_number));
        }
        for stream_number in change.added {
            let entry = TagEntry { stream_number, ..entry };
            self.tags.insert(encode_tag(&tag_key, PROTOCOL_VERSION, stream_number), entry);
        }

        if !key_set.keys.current_outgoing().is_active() {
            activate(entry.key_set, key_set);
        }

        let ctx = key_set.incoming_context(entry.window, entry.stream_number);
        Some((key_set.contact, ctx))
    }

    /// Bring every key set up to the period containing `now_ms`.
    ///
    /// Seen stream numbers carry over for windows whose period survives the
    /// update. Returns the key sets that changed.
    pub fn update_keys(&mut self, now_ms: u64) -> Vec<KeySetId> {
        let period = self.period_at(now_ms);
        let mut updated = Vec::new();

        for (id, key_set) in &mut self.key_sets {
            let old_period = key_set.keys.period();
            if period <= old_period {
                continue;
            }

            let old_windows: Vec<(RotationPeriod, ReorderingWindow)> = key_set
                .keys
                .incoming()
                .iter()
                .map(|incoming| incoming.period())
                .zip(key_set.windows)
                .collect();

            key_set.keys = update_keys(key_set.keys.clone(), period);
            for (window, incoming) in key_set.windows.iter_mut().zip(key_set.keys.incoming()) {
                *window = old_windows
                    .iter()
                    .find(|(p, _)| *p == incoming.period())
                    .map_or_else(ReorderingWindow::new, |(_, w)| *w);
            }
            key_set.next_outgoing_stream = 0;

            tracing::debug!(
                transport = %self.transport_id,
                key_set = %id,
                from = old_period,
                to = period,
                "keys rotated"
            );
            updated.push(*id);
        }

        if !updated.is_empty() {
            self.rebuild_tag_index();
        }
        updated
    }

    /// Time from `now_ms` until the next period boundary.
    pub fn time_until_next_update(&self, now_ms: u64) -> Duration {
        let length = self.config.period_length_millis();
        Duration::from_millis(length - now_ms % length)
    }

    /// Number of tags currently expected.
    pub fn expected_tag_count(&self) -> usize {
        self.tags.len()
    }

    fn insert(&mut self, contact: ContactId, keys: TransportKeys) -> KeySetId {
        let id = KeySetId(self.next_key_set_id);
        self.next_key_set_id += 1;

        let key_set = KeySet::new(contact, keys);
        index_key_set(&mut self.tags, id, &key_set);

        tracing::debug!(
            transport = %self.transport_id,
            %contact,
            key_set = %id,
            period = key_set.keys.period(),
            handshake = key_set.keys.is_handshake_mode(),
            "key set added"
        );
        self.key_sets.insert(id, key_set);
        id
    }

    fn rebuild_tag_index(&mut self) {
        self.tags.clear();
        for (id, key_set) in &self.key_sets {
            index_key_set(&mut self.tags, *id, key_set);
        }
    }
}

impl fmt::Debug for TransportKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportKeyStore")
            .field("transport_id", &self.transport_id)
            .field("key_sets", &self.key_sets.len())
            .field("tags", &self.tags.len())
            .finish_non_exhaustive()
    }
}

fn activate(id: KeySetId, key_set: &mut KeySet) {
    if key_set.keys.current_outgoing().is_active() {
        return;
    }
    key_set.keys = key_set.keys.clone().activated();
    tracing::info!(contact = %key_set.contact, key_set = %id, "outgoing keys activated");
}

fn index_key_set(tags: &mut HashMap<Tag, TagEntry>, id: KeySetId, key_set: &KeySet) {
    for (window, (incoming, reordering)) in
        key_set.keys.incoming().into_iter().zip(&key_set.windows).enumerate()
    {
        for stream_number in reordering.unseen() {
            let tag = encode_tag(incoming.tag_key(), PROTOCOL_VERSION, stream_number);
            tags.insert(tag, TagEntry { key_set: id, window, stream_number });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::REORDERING_WINDOW_SIZE;

    const DAY_MS: u64 = 24 * 60 * 60 * 1000;

    fn store() -> TransportKeyStore {
        TransportKeyStore::new(TransportId::new("org.hedgerow.test"), TransportConfig::default())
    }

    fn root() -> SecretKey {
        SecretKey::from_bytes([0x11; 32])
    }

    #[test]
    fn period_length_covers_latency_and_clock_skew() {
        let config = TransportConfig::default();

        assert_eq!(config.period_length(), Duration::from_secs(24 * 60 * 60 + 30));
    }

    #[test]
    fn period_is_never_zero() {
        let store = store();

        assert_eq!(store.period_at(0), 1);
        assert_eq!(store.period_at(10 * DAY_MS), 9);
    }

    #[test]
    fn new_key_set_indexes_three_windows() {
        let mut store = store();
        store.add_rotation_keys(ContactId(1), &root(), 0, 0, true, true);

        assert_eq!(store.expected_tag_count(), 3 * REORDERING_WINDOW_SIZE);
    }

    #[test]
    fn outgoing_stream_numbers_increase() {
        let mut store = store();
        store.add_rotation_keys(ContactId(1), &root(), 0, 0, true, true);

        let first = store.next_outgoing_stream(ContactId(1)).unwrap();
        let second = store.next_outgoing_stream(ContactId(1)).unwrap();
        assert_eq!(first.stream_number, 0);
        assert_eq!(second.stream_number, 1);
        assert_eq!(first.tag_key, second.tag_key);
    }

    #[test]
    fn inactive_keys_cannot_send_until_activated() {
        let mut store = store();
        let id = store.add_rotation_keys(ContactId(1), &root(), 0, 0, true, false);

        assert!(!store.can_send_outgoing_streams(ContactId(1)));
        assert!(store.next_outgoing_stream(ContactId(1)).is_none());

        store.activate_keys(id).unwrap();
        assert!(store.can_send_outgoing_streams(ContactId(1)));
    }

    #[test]
    fn activating_unknown_key_set_fails() {
        let mut store = store();

        assert_eq!(store.activate_keys(KeySetId(42)), Err(KeyStoreError::UnknownKeySet(42)));
    }

    #[test]
    fn rotation_keys_preferred_over_handshake_keys() {
        let mut store = store();
        let rotation = store.add_rotation_keys(ContactId(1), &root(), 0, 0, true, true);
        store.add_handshake_keys(ContactId(1), &root(), 0, true);

        let ctx = store.next_outgoing_stream(ContactId(1)).unwrap();
        assert!(!ctx.handshake_mode);
        let keys = store.keys(rotation).unwrap();
        assert_eq!(&ctx.tag_key, keys.current_outgoing().tag_key());
    }

    #[test]
    fn peers_recognise_each_others_tags() {
        let mut alice = store();
        let mut bob = store();
        alice.add_rotation_keys(ContactId(1), &root(), 0, 0, true, true);
        bob.add_rotation_keys(ContactId(2), &root(), 0, 0, false, true);

        let ctx = alice.next_outgoing_stream(ContactId(1)).unwrap();
        let (contact, incoming) = bob.recognise_tag(&ctx.tag()).unwrap();

        assert_eq!(contact, ContactId(2));
        assert_eq!(incoming.header_key, ctx.header_key);
        assert_eq!(incoming.stream_number, ctx.stream_number);
    }

    #[test]
    fn tags_are_recognised_once() {
        let mut alice = store();
        let mut bob = store();
        alice.add_rotation_keys(ContactId(1), &root(), 0, 0, true, true);
        bob.add_rotation_keys(ContactId(2), &root(), 0, 0, false, true);
        let tag = alice.next_outgoing_stream(ContactId(1)).unwrap().tag();

        assert!(bob.stream_context_for_tag(&tag).is_some());
        assert!(bob.stream_context_for_tag(&tag).is_some());
        assert!(bob.recognise_tag(&tag).is_some());
        assert!(bob.recognise_tag(&tag).is_none());
        assert!(bob.stream_context_for_tag(&tag).is_none());
    }

    #[test]
    fn recognising_the_base_extends_the_window() {
        let mut alice = store();
        let mut bob = store();
        alice.add_rotation_keys(ContactId(1), &root(), 0, 0, true, true);
        bob.add_rotation_keys(ContactId(2), &root(), 0, 0, false, true);

        let contexts: Vec<_> =
            (0..=REORDERING_WINDOW_SIZE).map(|_| alice.next_outgoing_stream(ContactId(1)).unwrap()).collect();
        let beyond = contexts[REORDERING_WINDOW_SIZE].tag();
        assert!(bob.stream_context_for_tag(&beyond).is_none());

        bob.recognise_tag(&contexts[0].tag()).unwrap();
        assert!(bob.stream_context_for_tag(&beyond).is_some());
        assert_eq!(bob.expected_tag_count(), 3 * REORDERING_WINDOW_SIZE);
    }

    #[test]
    fn recognising_a_tag_activates_outgoing_keys() {
        let mut alice = store();
        let mut bob = store();
        alice.add_rotation_keys(ContactId(1), &root(), 0, 0, true, true);
        bob.add_rotation_keys(ContactId(2), &root(), 0, 0, false, false);
        assert!(!bob.can_send_outgoing_streams(ContactId(2)));

        let tag = alice.next_outgoing_stream(ContactId(1)).unwrap().tag();
        bob.recognise_tag(&tag).unwrap();

        assert!(bob.can_send_outgoing_streams(ContactId(2)));
    }

    #[test]
    fn update_rotates_and_resets_stream_counter() {
        let mut store = store();
        let id = store.add_rotation_keys(ContactId(1), &root(), DAY_MS, DAY_MS, true, true);
        store.next_outgoing_stream(ContactId(1)).unwrap();
        let before = store.keys(id).unwrap().period();

        assert!(store.update_keys(DAY_MS).is_empty());
        assert_eq!(store.update_keys(3 * DAY_MS), vec![id]);

        assert_eq!(store.keys(id).unwrap().period(), before + 1);
        assert_eq!(store.next_outgoing_stream(ContactId(1)).unwrap().stream_number, 0);
    }

    #[test]
    fn seen_streams_stay_seen_across_rotation() {
        let mut alice = store();
        let mut bob = store();
        alice.add_rotation_keys(ContactId(1), &root(), DAY_MS, DAY_MS, true, true);
        bob.add_rotation_keys(ContactId(2), &root(), DAY_MS, DAY_MS, false, true);

        let tag = alice.next_outgoing_stream(ContactId(1)).unwrap().tag();
        bob.recognise_tag(&tag).unwrap();

        // The seen window becomes "previous"; its tag must not come back
        bob.update_keys(3 * DAY_MS);
        assert!(bob.stream_context_for_tag(&tag).is_none());
        assert_eq!(bob.expected_tag_count(), 3 * REORDERING_WINDOW_SIZE);
    }

    #[test]
    fn keys_added_late_are_brought_up_to_date() {
        let mut store = store();
        let id = store.add_rotation_keys(ContactId(1), &root(), DAY_MS, 10 * DAY_MS, true, true);

        assert_eq!(store.keys(id).unwrap().period(), store.period_at(10 * DAY_MS));
    }

    #[test]
    fn remove_contact_drops_keys_and_tags() {
        let mut store = store();
        store.add_rotation_keys(ContactId(1), &root(), 0, 0, true, true);
        let other = store.add_handshake_keys(ContactId(2), &root(), 0, true);

        store.remove_contact(ContactId(1));

        assert!(store.key_sets_for(ContactId(1)).is_empty());
        assert_eq!(store.key_sets_for(ContactId(2)), vec![other]);
        assert_eq!(store.expected_tag_count(), 3 * REORDERING_WINDOW_SIZE);
        assert!(!store.can_send_outgoing_streams(ContactId(1)));
    }

    #[test]
    fn time_until_next_update_reaches_the_boundary() {
        let store = store();
        let length = TransportConfig::default().period_length();

        assert_eq!(store.time_until_next_update(0), length);
        assert_eq!(
            store.time_until_next_update(length.as_millis() as u64 - 1),
            Duration::from_millis(1)
        );
    }
}
