//! Blacklist data model
//!
//! Three independent name sets (categories, channels, tags). Stored keys keep
//! their original case so imported mixed-case data survives round-trips; a
//! lowercased index answers membership, so lookups are case-insensitive
//! regardless of stored case.

use std::collections::{BTreeSet, HashSet};

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

// =============================================================================
// Entry Kinds
// =============================================================================

/// The three blacklistable entry types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Category,
    Channel,
    Tag,
}

impl EntryKind {
    /// Stable iteration order, also the fragment packing order.
    pub const ALL: [EntryKind; 3] = [EntryKind::Category, EntryKind::Channel, EntryKind::Tag];

    /// Wire key for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Category => "categories",
            EntryKind::Channel => "channels",
            EntryKind::Tag => "tags",
        }
    }

    /// Parse a wire key. `games` is the legacy spelling of `categories`.
    pub fn from_wire_key(key: &str) -> Option<Self> {
        match key {
            "categories" | "games" => Some(EntryKind::Category),
            "channels" => Some(EntryKind::Channel),
            "tags" => Some(EntryKind::Tag),
            _ => None,
        }
    }
}

// =============================================================================
// Entry Set
// =============================================================================

/// A set of blacklisted names for one entry kind.
///
/// `names` holds the stored spelling in a stable order; `folded` is the
/// lowercased lookup index. Two names differing only by case coexist (each
/// occupies storage) but fold to the same index entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntrySet {
    names: BTreeSet<String>,
    folded: HashSet<String>,
}

impl EntrySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate stored names in stable (byte) order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Insert a name, preserving its case. Returns false if already present
    /// with exactly these bytes.
    pub fn insert(&mut self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let added = self.names.insert(name.to_string());
        if added {
            self.folded.insert(name.to_lowercase());
        }
        added
    }

    /// Remove a name by exact bytes. The folded index entry is kept while any
    /// other stored name still folds to it.
    pub fn remove(&mut self, name: &str) -> bool {
        if !self.names.remove(name) {
            return false;
        }
        let fold = name.to_lowercase();
        if !self.names.iter().any(|n| n.to_lowercase() == fold) {
            self.folded.remove(&fold);
        }
        true
    }

    /// Case-insensitive membership test. Pure index lookup, safe to call at
    /// DOM-scrape frequency.
    pub fn contains(&self, name: &str) -> bool {
        self.folded.contains(&name.to_lowercase())
    }

    /// Union another set into this one, case preserved.
    pub fn merge(&mut self, other: &EntrySet) {
        for name in other.iter() {
            self.insert(name);
        }
    }
}

// =============================================================================
// Blacklist
// =============================================================================

/// The full blacklist: one [`EntrySet`] per entry kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    pub categories: EntrySet,
    pub channels: EntrySet,
    pub tags: EntrySet,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self, kind: EntryKind) -> &EntrySet {
        match kind {
            EntryKind::Category => &self.categories,
            EntryKind::Channel => &self.channels,
            EntryKind::Tag => &self.tags,
        }
    }

    pub fn kind_mut(&mut self, kind: EntryKind) -> &mut EntrySet {
        match kind {
            EntryKind::Category => &mut self.categories,
            EntryKind::Channel => &mut self.channels,
            EntryKind::Tag => &mut self.tags,
        }
    }

    /// Case-insensitive membership test for one kind.
    pub fn contains(&self, kind: EntryKind, name: &str) -> bool {
        self.kind(kind).contains(name)
    }

    /// Total entry count across all kinds.
    pub fn len(&self) -> usize {
        EntryKind::ALL.iter().map(|&k| self.kind(k).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Union another blacklist into this one.
    pub fn merge(&mut self, other: &Blacklist) {
        for &kind in &EntryKind::ALL {
            self.kind_mut(kind).merge(other.kind(kind));
        }
    }

    /// Build a blacklist from a wire value, tolerantly.
    ///
    /// Accepts each kind's value set as either an object-with-sentinel-values
    /// (`{"name": 1}`) or a plain string array, the shapes produced by current
    /// saves, fragments and imported legacy data. The legacy `games` key is
    /// merged into `categories`; `communities`, `creative` and unknown keys
    /// are dropped. Malformed values are skipped per-kind, never all-or-nothing.
    pub fn from_wire(value: &Value) -> Blacklist {
        let mut result = Blacklist::new();
        let Some(map) = value.as_object() else {
            return result;
        };

        for (key, names) in map {
            let Some(kind) = EntryKind::from_wire_key(key) else {
                continue;
            };
            let set = result.kind_mut(kind);
            match names {
                Value::Object(entries) => {
                    for name in entries.keys() {
                        set.insert(name);
                    }
                }
                Value::Array(entries) => {
                    for name in entries {
                        if let Some(name) = name.as_str() {
                            set.insert(name);
                        }
                    }
                }
                _ => {}
            }
        }

        result
    }
}

/// Serializes as three sentinel-value maps. Legacy keys are never emitted, so
/// every save scrubs `games`/`communities`/`creative` structurally.
impl Serialize for Blacklist {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Sentinels<'a>(&'a EntrySet);

        impl Serialize for Sentinels<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for name in self.0.iter() {
                    map.serialize_entry(name, &1)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(EntryKind::ALL.len()))?;
        for &kind in &EntryKind::ALL {
            map.serialize_entry(kind.as_str(), &Sentinels(self.kind(kind)))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Blacklist {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Blacklist::from_wire(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut set = EntrySet::new();
        set.insert("Foo");
        assert!(set.contains("foo"));
        assert!(set.contains("FOO"));
        assert!(set.contains("Foo"));
        assert!(!set.contains("bar"));
    }

    #[test]
    fn test_case_variants_coexist() {
        let mut set = EntrySet::new();
        set.insert("Foo");
        set.insert("foo");
        assert_eq!(set.len(), 2);

        // Removing one spelling keeps the folded index alive for the other.
        set.remove("Foo");
        assert_eq!(set.len(), 1);
        assert!(set.contains("FOO"));
        set.remove("foo");
        assert!(!set.contains("foo"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut set = EntrySet::new();
        assert!(!set.insert(""));
        assert!(set.is_empty());
    }

    #[test]
    fn test_from_wire_sentinel_maps() {
        let bl = Blacklist::from_wire(&json!({
            "categories": {"starcraft ii": 1},
            "channels": {"somechannel": 1},
            "tags": {"esports": 1},
        }));
        assert!(bl.contains(EntryKind::Category, "StarCraft II"));
        assert!(bl.contains(EntryKind::Channel, "somechannel"));
        assert!(bl.contains(EntryKind::Tag, "Esports"));
    }

    #[test]
    fn test_from_wire_string_arrays() {
        let bl = Blacklist::from_wire(&json!({
            "categories": ["Chess"],
            "tags": ["drops"],
        }));
        assert!(bl.contains(EntryKind::Category, "chess"));
        assert!(bl.contains(EntryKind::Tag, "Drops"));
        assert!(bl.channels.is_empty());
    }

    #[test]
    fn test_legacy_games_key_is_migrated() {
        let bl = Blacklist::from_wire(&json!({
            "games": {"Minecraft": 1},
        }));
        assert!(bl.contains(EntryKind::Category, "minecraft"));

        // A migrated save no longer mentions games.
        let wire = serde_json::to_value(&bl).unwrap();
        assert!(wire.get("games").is_none());
        assert!(wire["categories"].get("Minecraft").is_some());
    }

    #[test]
    fn test_legacy_type_keys_are_dropped() {
        let bl = Blacklist::from_wire(&json!({
            "communities": {"old": 1},
            "creative": {"older": 1},
            "channels": {"keepme": 1},
        }));
        assert_eq!(bl.len(), 1);
        assert!(bl.contains(EntryKind::Channel, "keepme"));

        let wire = serde_json::to_value(&bl).unwrap();
        assert!(wire.get("communities").is_none());
        assert!(wire.get("creative").is_none());
    }

    #[test]
    fn test_malformed_kinds_are_skipped_per_kind() {
        let bl = Blacklist::from_wire(&json!({
            "categories": 42,
            "channels": {"fine": 1},
        }));
        assert!(bl.categories.is_empty());
        assert!(bl.contains(EntryKind::Channel, "fine"));
    }

    #[test]
    fn test_serialize_emits_sentinel_values() {
        let mut bl = Blacklist::new();
        bl.channels.insert("somechannel");
        let wire = serde_json::to_value(&bl).unwrap();
        assert_eq!(wire["channels"]["somechannel"], json!(1));
        assert_eq!(wire["categories"], json!({}));
    }
}
