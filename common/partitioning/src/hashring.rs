use std::collections::{BTreeMap, BTreeSet};
use std::hash::Hasher;

use siphasher::sip::SipHasher13;

/// Virtual nodes per member. More replicas smooth the key distribution at the
/// cost of a larger ring; 100 keeps the per-member spread within a few
/// percent for small groups.
pub const DEFAULT_REPLICAS: usize = 100;

// Fixed keys so ring positions agree across processes and restarts.
const RING_KEY0: u64 = 0x6d65_7465_7264_5f68;
const RING_KEY1: u64 = 0x6173_6872_696e_6700;

fn position(data: &str) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(RING_KEY0, RING_KEY1);
    hasher.write(data.as_bytes());
    hasher.finish()
}

/// Consistent-hash ring mapping arbitrary string keys to group members.
///
/// Immutable once built: membership changes produce a whole new ring that the
/// coordinator swaps in atomically, so readers never observe a partial
/// rebuild. Each member occupies [`DEFAULT_REPLICAS`] positions on a `u64`
/// ring; a key is owned by the member at the first position at or after the
/// key's own hash, wrapping at the top.
#[derive(Debug, Clone, Default)]
pub struct HashRing {
    ring: BTreeMap<u64, String>,
    members: BTreeSet<String>,
}

impl HashRing {
    pub fn new<I, S>(members: I) -> HashRing
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HashRing::with_replicas(members, DEFAULT_REPLICAS)
    }

    pub fn with_replicas<I, S>(members: I, replicas: usize) -> HashRing
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: BTreeSet<String> = members.into_iter().map(Into::into).collect();
        let mut ring = BTreeMap::new();
        for member in &members {
            for replica in 0..replicas {
                ring.insert(position(&format!("{member}-{replica}")), member.clone());
            }
        }
        HashRing { ring, members }
    }

    /// The member owning `key`, or `None` on an empty ring.
    pub fn owner(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }
        let pos = position(key);
        self.ring
            .range(pos..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, member)| member.as_str())
    }

    pub fn belongs_to(&self, key: &str, member: &str) -> bool {
        self.owner(key) == Some(member)
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
