use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

pub type FastHashSet<K> = rustc_hash::FxHashSet<K>;

/// Sharded concurrent map with Fx hashing.
pub type FastDashMap<K, V> = DashMap<K, V, FxBuildHasher>;

#[inline]
pub fn fast_hash_set_with_capacity<K>(capacity: usize) -> FastHashSet<K> {
    rustc_hash::FxHashSet::with_capacity_and_hasher(capacity, Default::default())
}

#[inline]
pub fn fast_dash_map_new<K: Eq + std::hash::Hash, V>() -> FastDashMap<K, V> {
    DashMap::with_hasher(FxBuildHasher)
}
