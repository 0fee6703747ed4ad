use dashmap::DashMap;

use compass_core::ids::UserId;

use crate::gamification::ProfilePayload;

/// Read-through memoization seam for profile reads. The engine calls
/// `invalidate` fire-and-forget after profile-affecting mutations;
/// correctness never depends on cache contents.
pub trait ProfileCache: Send + Sync {
    fn get(&self, user_id: &UserId) -> Option<ProfilePayload>;
    fn put(&self, user_id: &UserId, payload: ProfilePayload);
    fn invalidate(&self, user_id: &UserId);
}

/// In-process cache backed by a concurrent map.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, ProfilePayload>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProfileCache for MemoryCache {
    fn get(&self, user_id: &UserId) -> Option<ProfilePayload> {
        self.entries.get(user_id.as_str()).map(|e| e.clone())
    }

    fn put(&self, user_id: &UserId, payload: ProfilePayload) {
        self.entries.insert(user_id.as_str().to_string(), payload);
    }

    fn invalidate(&self, user_id: &UserId) {
        self.entries.remove(user_id.as_str());
    }
}

/// Cache absence as an implementation: every read misses.
pub struct NoopCache;

impl ProfileCache for NoopCache {
    fn get(&self, _user_id: &UserId) -> Option<ProfilePayload> {
        None
    }

    fn put(&self, _user_id: &UserId, _payload: ProfilePayload) {}

    fn invalidate(&self, _user_id: &UserId) {}
}
