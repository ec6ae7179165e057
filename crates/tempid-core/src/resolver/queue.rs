//! Insertion-ordered map used to group queued requests.

use std::collections::HashMap;
use std::hash::Hash;

/// Map that iterates in first-insertion order.
#[derive(Debug)]
pub(crate) struct OrderedMap<K, V> {
    entries: Vec<(K, V)>,
    index: HashMap<K, usize>,
}

impl<K: Hash + Eq + Clone, V: Default> OrderedMap<K, V> {
    /// Value for `key`, inserting a default at the end when absent.
    pub(crate) fn entry_or_default(&mut self, key: K) -> &mut V {
        let pos = match self.index.get(&key) {
            Some(&pos) => pos,
            None => {
                let pos = self.entries.len();
                self.index.insert(key.clone(), pos);
                self.entries.push((key, V::default()));
                pos
            },
        };
        &mut self.entries[pos].1
    }
}

impl<K, V> OrderedMap<K, V> {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(K, V)> {
        self.entries
    }
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self { entries: Vec::new(), index: HashMap::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_first_insertion_order() {
        let mut map: OrderedMap<&str, Vec<u32>> = OrderedMap::default();
        map.entry_or_default("b").push(1);
        map.entry_or_default("a").push(2);
        map.entry_or_default("b").push(3);

        assert_eq!(map.len(), 2);
        assert_eq!(map.into_entries(), vec![("b", vec![1, 3]), ("a", vec![2])]);
    }
}
