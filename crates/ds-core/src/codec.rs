//! Blacklist Storage Codec
//!
//! Packs the blacklist into a quota-constrained key-value representation.
//! A blacklist that serializes under the per-item quota is stored as one
//! unfragmented object; anything larger is split into numbered fragment keys,
//! each holding a bounded slice of values. Merging all fragments in ascending
//! index order must reproduce the original sets exactly, case preserved.

use serde_json::{Map, Value};

use crate::blacklist::{Blacklist, EntryKind};

// =============================================================================
// Storage Constants
// =============================================================================

/// Maximum serialized size of a single stored item, per the backend contract.
pub const ITEM_QUOTA_BYTES: usize = 8192;

/// Safety margin under the item quota; the backend measures key + value plus
/// its own overhead, so the payload threshold sits below the raw quota.
pub const QUOTA_SAFETY_MARGIN: usize = 192;

/// Maximum number of keys the backend can hold.
pub const MAX_KEYS: usize = 500;

/// Keys reserved for non-fragment state (the unfragmented key and the
/// enabled flag).
const RESERVED_KEYS: usize = 2;

/// Hard ceiling on fragment count.
pub const MAX_FRAGMENTS: usize = MAX_KEYS - RESERVED_KEYS;

/// Values packed into one fragment. The budget is count-based and assumes
/// typical short names; a fragment full of long names (roughly 30+ bytes
/// each) can exceed the item quota, which the backend rejects at save time
/// as a quota error before anything is written.
pub const FRAGMENT_CHUNK: usize = 200;

/// Key holding the blacklist when it fits in one item.
pub const UNFRAGMENTED_KEY: &str = "blacklistedItems";

/// Prefix of the numbered fragment keys.
pub const FRAGMENT_KEY_PREFIX: &str = "blItemsFragment";

/// Synthetic key for fragment `index`.
pub fn fragment_key(index: usize) -> String {
    format!("{FRAGMENT_KEY_PREFIX}{index}")
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The blacklist needs more fragments than the key ceiling allows. The
    /// save must be refused; excess entries are never dropped silently.
    #[error("blacklist exceeds storage capacity: {needed} fragments needed, limit is {limit}")]
    Overflow { needed: usize, limit: usize },

    #[error("blacklist serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// =============================================================================
// Encoding
// =============================================================================

/// An encoded blacklist, ready to hand to the key-value backend.
#[derive(Debug, Clone)]
pub struct EncodedBlacklist {
    /// Storage record: key to stored value.
    pub items: Map<String, Value>,
    /// Number of fragment keys used; 0 means unfragmented.
    pub fragments: usize,
}

/// Encode a blacklist into its storage record.
pub fn encode(blacklist: &Blacklist) -> Result<EncodedBlacklist, CodecError> {
    let mut items = Map::new();
    items.insert(
        UNFRAGMENTED_KEY.to_string(),
        serde_json::to_value(blacklist)?,
    );

    // Measured the way the backend measures it: the full stored pair.
    let size = serde_json::to_string(&items)?.len();
    if size <= ITEM_QUOTA_BYTES - QUOTA_SAFETY_MARGIN {
        return Ok(EncodedBlacklist { items, fragments: 0 });
    }

    fragment(blacklist)
}

/// Split the blacklist into numbered fragments of at most [`FRAGMENT_CHUNK`]
/// values each. Remaining capacity carries over across kind boundaries within
/// the same fragment.
fn fragment(blacklist: &Blacklist) -> Result<EncodedBlacklist, CodecError> {
    let total = blacklist.len();
    let needed = total.div_ceil(FRAGMENT_CHUNK).max(1);
    if needed > MAX_FRAGMENTS {
        return Err(CodecError::Overflow {
            needed,
            limit: MAX_FRAGMENTS,
        });
    }

    let mut items = Map::new();
    let mut current = Map::new();
    let mut capacity = FRAGMENT_CHUNK;
    let mut index = 0usize;

    for &kind in &EntryKind::ALL {
        for name in blacklist.kind(kind).iter() {
            if capacity == 0 {
                items.insert(fragment_key(index), Value::Object(current));
                current = Map::new();
                capacity = FRAGMENT_CHUNK;
                index += 1;
            }
            let slot = current
                .entry(kind.as_str())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(values) = slot {
                values.push(Value::String(name.to_string()));
            }
            capacity -= 1;
        }
    }

    if !current.is_empty() || index == 0 {
        items.insert(fragment_key(index), Value::Object(current));
        index += 1;
    }

    Ok(EncodedBlacklist {
        items,
        fragments: index,
    })
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a storage record back into a blacklist.
///
/// The unfragmented key wins when present. Otherwise fragments are merged in
/// ascending index order until the first missing index; a gap marks the end
/// of the sequence, not an error. An empty record decodes to an empty
/// blacklist.
pub fn decode(record: &Map<String, Value>) -> Blacklist {
    if let Some(entries) = record.get(UNFRAGMENTED_KEY) {
        return Blacklist::from_wire(entries);
    }

    let mut result = Blacklist::new();
    for index in 0..MAX_FRAGMENTS {
        let Some(entries) = record.get(&fragment_key(index)) else {
            break;
        };
        result.merge(&Blacklist::from_wire(entries));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blacklist_with_channels(count: usize) -> Blacklist {
        let mut bl = Blacklist::new();
        for i in 0..count {
            bl.channels.insert(&format!("channel{i:04}"));
        }
        bl
    }

    #[test]
    fn test_small_blacklist_is_unfragmented() {
        let mut bl = Blacklist::new();
        bl.categories.insert("StarCraft II");
        bl.tags.insert("esports");

        let encoded = encode(&bl).unwrap();
        assert_eq!(encoded.fragments, 0);
        assert!(encoded.items.contains_key(UNFRAGMENTED_KEY));
        assert_eq!(encoded.items.len(), 1);

        assert_eq!(decode(&encoded.items), bl);
    }

    #[test]
    fn test_unfragmented_record_stores_entries_directly() {
        let mut bl = Blacklist::new();
        bl.channels.insert("somechannel");

        let encoded = encode(&bl).unwrap();
        let stored = encoded.items.get(UNFRAGMENTED_KEY).unwrap();
        assert_eq!(stored["channels"]["somechannel"], serde_json::json!(1));
        assert!(stored.get(UNFRAGMENTED_KEY).is_none());
    }

    #[test]
    fn test_round_trip_preserves_case() {
        let mut bl = Blacklist::new();
        bl.categories.insert("StarCraft II");
        bl.categories.insert("starcraft ii");
        bl.channels.insert("MixedCase");

        let encoded = encode(&bl).unwrap();
        let decoded = decode(&encoded.items);
        assert_eq!(decoded, bl);
        assert_eq!(decoded.categories.len(), 2);
    }

    #[test]
    fn test_fragmentation_boundary() {
        // 201 entries at chunk size 200 must split into two fragments.
        let bl = blacklist_with_channels(FRAGMENT_CHUNK + 1);
        let encoded = encode(&bl).unwrap();
        assert!(encoded.fragments >= 2);
        assert!(encoded.items.contains_key(&fragment_key(0)));
        assert!(encoded.items.contains_key(&fragment_key(1)));
        assert!(!encoded.items.contains_key(UNFRAGMENTED_KEY));

        let decoded = decode(&encoded.items);
        assert_eq!(decoded.channels.len(), FRAGMENT_CHUNK + 1);
        assert_eq!(decoded, bl);
    }

    #[test]
    fn test_fragments_respect_item_quota() {
        let bl = blacklist_with_channels(1000);
        let encoded = encode(&bl).unwrap();
        for (key, value) in &encoded.items {
            let size = key.len() + serde_json::to_string(value).unwrap().len();
            assert!(size <= ITEM_QUOTA_BYTES, "{key} is {size} bytes");
        }
    }

    #[test]
    fn test_capacity_carries_across_kind_boundaries() {
        let mut bl = blacklist_with_channels(FRAGMENT_CHUNK - 1);
        bl.categories.insert("OnlyCategory");
        bl.tags.insert("onlytag");

        // 201 values total: the first fragment mixes kinds, the second holds
        // the remainder.
        let encoded = encode(&bl).unwrap();
        assert_eq!(encoded.fragments, 2);
        let first = encoded.items.get(&fragment_key(0)).unwrap();
        assert!(first.get("categories").is_some());
        assert!(first.get("channels").is_some());

        assert_eq!(decode(&encoded.items), bl);
    }

    #[test]
    fn test_overflow_is_refused_not_truncated() {
        let bl = blacklist_with_channels((MAX_FRAGMENTS + 1) * FRAGMENT_CHUNK);
        match encode(&bl) {
            Err(CodecError::Overflow { needed, limit }) => {
                assert_eq!(limit, MAX_FRAGMENTS);
                assert!(needed > limit);
            }
            other => panic!("expected overflow, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_stops_at_first_gap() {
        let bl = blacklist_with_channels(FRAGMENT_CHUNK * 3);
        let encoded = encode(&bl).unwrap();
        assert_eq!(encoded.fragments, 3);

        let mut record = encoded.items.clone();
        record.remove(&fragment_key(1));
        let decoded = decode(&record);
        // Only fragment 0 survives the gap.
        assert_eq!(decoded.channels.len(), FRAGMENT_CHUNK);
    }

    #[test]
    fn test_decode_missing_record_is_empty() {
        let decoded = decode(&Map::new());
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_decode_prefers_unfragmented_key() {
        let mut record = Map::new();
        record.insert(
            UNFRAGMENTED_KEY.to_string(),
            serde_json::json!({"channels": {"kept": 1}}),
        );
        record.insert(
            fragment_key(0),
            serde_json::json!({"channels": ["ignored"]}),
        );
        let decoded = decode(&record);
        assert!(decoded.contains(EntryKind::Channel, "kept"));
        assert!(!decoded.contains(EntryKind::Channel, "ignored"));
    }

    #[test]
    fn test_round_trip_order_independent() {
        let mut a = Blacklist::new();
        a.channels.insert("zeta");
        a.channels.insert("alpha");
        let mut b = Blacklist::new();
        b.channels.insert("alpha");
        b.channels.insert("zeta");

        let ea = encode(&a).unwrap();
        let eb = encode(&b).unwrap();
        assert_eq!(decode(&ea.items), decode(&eb.items));
    }
}
