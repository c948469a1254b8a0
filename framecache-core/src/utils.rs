//! Helpers that keep an entry map and its recency queue in step.
//!
//! The queue holds keys from least recently used (front) to most recently used
//! (back). Every key in the map appears exactly once in the queue.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use crate::CacheEntry;

/// Moves `key` to the back of the queue, marking it most recently used.
///
/// Does nothing if the key is not queued. O(n) in the queue length.
///
/// # Examples
///
/// ```
/// use std::collections::VecDeque;
/// use framecache_core::utils::move_key_to_end;
///
/// let mut order = VecDeque::from(vec!["a", "b", "c"]);
/// move_key_to_end(&mut order, &"a");
/// assert_eq!(order, VecDeque::from(vec!["b", "c", "a"]));
/// ```
pub fn move_key_to_end<K: PartialEq>(order: &mut VecDeque<K>, key: &K) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        if pos + 1 == order.len() {
            return;
        }
        if let Some(k) = order.remove(pos) {
            order.push_back(k);
        }
    }
}

/// Removes and returns the least recently used entry.
///
/// Keys queued without a map entry are skipped and dropped.
///
/// # Examples
///
/// ```
/// use std::collections::{HashMap, VecDeque};
/// use std::time::UNIX_EPOCH;
/// use framecache_core::{CacheEntry, utils::pop_least_recent};
///
/// let mut map = HashMap::new();
/// map.insert("old", CacheEntry::new(1, UNIX_EPOCH));
/// map.insert("new", CacheEntry::new(2, UNIX_EPOCH));
/// let mut order = VecDeque::from(vec!["old", "new"]);
///
/// let (key, entry) = pop_least_recent(&mut map, &mut order).unwrap();
/// assert_eq!((key, entry.value), ("old", 1));
/// assert_eq!(order.len(), 1);
/// ```
pub fn pop_least_recent<K, R>(
    map: &mut HashMap<K, CacheEntry<R>>,
    order: &mut VecDeque<K>,
) -> Option<(K, CacheEntry<R>)>
where
    K: Eq + Hash,
{
    while let Some(key) = order.pop_front() {
        if let Some(entry) = map.remove(&key) {
            return Some((key, entry));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn filled(keys: &[&'static str]) -> (HashMap<&'static str, CacheEntry<usize>>, VecDeque<&'static str>) {
        let map = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (*k, CacheEntry::new(i, UNIX_EPOCH)))
            .collect();
        (map, keys.iter().copied().collect())
    }

    #[test]
    fn test_move_missing_key_is_noop() {
        let mut order = VecDeque::from(vec![1, 2]);
        move_key_to_end(&mut order, &3);
        assert_eq!(order, VecDeque::from(vec![1, 2]));
    }

    #[test]
    fn test_move_last_key_keeps_order() {
        let mut order = VecDeque::from(vec![1, 2, 3]);
        move_key_to_end(&mut order, &3);
        assert_eq!(order, VecDeque::from(vec![1, 2, 3]));
    }

    #[test]
    fn test_pop_least_recent_skips_orphans() {
        let (mut map, mut order) = filled(&["a", "b"]);
        order.push_front("ghost");
        let (key, _) = pop_least_recent(&mut map, &mut order).unwrap();
        assert_eq!(key, "a");
        assert_eq!(order, VecDeque::from(vec!["b"]));
    }

    #[test]
    fn test_pop_least_recent_empty() {
        let (mut map, mut order) = filled(&[]);
        assert!(pop_least_recent(&mut map, &mut order).is_none());
    }
}
