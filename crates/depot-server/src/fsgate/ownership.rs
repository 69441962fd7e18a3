//! uid/gid -> name resolution
//!
//! Listings hit the system user database once per distinct id per process
//! lifetime (bounded LRU); everything else is served from cache.

use lru::LruCache;
use nix::unistd::{Gid, Group, Uid, User};
use std::num::NonZeroUsize;
use std::sync::Mutex;

const CACHE_CAPACITY: usize = 1024;

pub struct OwnerCache {
    users: Mutex<LruCache<u32, String>>,
    groups: Mutex<LruCache<u32, String>>,
}

impl Default for OwnerCache {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnerCache {
    pub fn new() -> Self {
        let cap = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            users: Mutex::new(LruCache::new(cap)),
            groups: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Owner name for a uid; falls back to the numeric id when the system
    /// database has no entry.
    pub fn user_name(&self, uid: u32) -> String {
        if let Ok(mut cache) = self.users.lock() {
            if let Some(name) = cache.get(&uid) {
                return name.clone();
            }
        }

        let name = User::from_uid(Uid::from_raw(uid))
            .ok()
            .flatten()
            .map(|u| u.name)
            .unwrap_or_else(|| uid.to_string());

        if let Ok(mut cache) = self.users.lock() {
            cache.put(uid, name.clone());
        }
        name
    }

    /// Group name for a gid; numeric fallback as above.
    pub fn group_name(&self, gid: u32) -> String {
        if let Ok(mut cache) = self.groups.lock() {
            if let Some(name) = cache.get(&gid) {
                return name.clone();
            }
        }

        let name = Group::from_gid(Gid::from_raw(gid))
            .ok()
            .flatten()
            .map(|g| g.name)
            .unwrap_or_else(|| gid.to_string());

        if let Ok(mut cache) = self.groups.lock() {
            cache.put(gid, name.clone());
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ids_fall_back_to_numbers() {
        let cache = OwnerCache::new();
        // uid space this high is unassigned on any sane test host
        assert_eq!(cache.user_name(4_000_000_000), "4000000000");
        assert_eq!(cache.group_name(4_000_000_000), "4000000000");
    }

    #[test]
    fn root_resolves() {
        let cache = OwnerCache::new();
        assert_eq!(cache.user_name(0), "root");
        // second call comes from cache
        assert_eq!(cache.user_name(0), "root");
    }
}
