//! Unordered set of byte strings with intset and hash-table encodings.
//!
//! A set whose members are all decimal integers lives in an [`IntSet`];
//! adding a non-integer member, or growing past the entry threshold,
//! converts it to a hash table for good.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use super::intset::IntSet;

/// Entry count above which the intset converts to a hash table.
pub const SET_MAX_INTSET_ENTRIES: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetEncoding {
    IntSet,
    HashTable,
}

#[derive(Debug, Clone)]
pub struct Set {
    intset: IntSet,
    table: HashSet<Vec<u8>>,
    is_intset: bool,
}

impl Default for Set {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_int(member: &[u8]) -> Option<i64> {
    std::str::from_utf8(member).ok()?.parse::<i64>().ok()
}

impl Set {
    pub fn new() -> Self {
        Set {
            intset: IntSet::new(),
            table: HashSet::new(),
            is_intset: true,
        }
    }

    pub fn encoding(&self) -> SetEncoding {
        if self.is_intset {
            SetEncoding::IntSet
        } else {
            SetEncoding::HashTable
        }
    }

    /// Add `member`; returns the number of members added (0 or 1).
    pub fn add(&mut self, member: &[u8]) -> usize {
        if self.is_intset {
            match parse_int(member) {
                Some(value) => {
                    if self.intset.add(value) {
                        if self.intset.len() > SET_MAX_INTSET_ENTRIES {
                            self.convert_to_table();
                        }
                        return 1;
                    }
                    return 0;
                }
                None => self.convert_to_table(),
            }
        }
        if self.table.insert(member.to_vec()) {
            1
        } else {
            0
        }
    }

    pub fn contains(&self, member: &[u8]) -> bool {
        if self.is_intset {
            return parse_int(member).is_some_and(|value| self.intset.contains(value));
        }
        self.table.contains(member)
    }

    /// Remove `member`; returns the number of members removed (0 or 1).
    pub fn remove(&mut self, member: &[u8]) -> usize {
        if self.is_intset {
            return match parse_int(member) {
                Some(value) if self.intset.remove(value) => 1,
                _ => 0,
            };
        }
        if self.table.remove(member) {
            1
        } else {
            0
        }
    }

    pub fn len(&self) -> usize {
        if self.is_intset {
            self.intset.len()
        } else {
            self.table.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn members(&self) -> Vec<Vec<u8>> {
        if self.is_intset {
            self.intset
                .to_vec()
                .into_iter()
                .map(|value| value.to_string().into_bytes())
                .collect()
        } else {
            self.table.iter().cloned().collect()
        }
    }

    pub fn for_each(&self, mut consumer: impl FnMut(&[u8]) -> bool) {
        for member in self.members() {
            if !consumer(&member) {
                break;
            }
        }
    }

    /// Up to `count` distinct members, uniformly chosen.
    pub fn random_distinct_members(&self, count: usize) -> Vec<Vec<u8>> {
        if count == 0 || self.is_empty() {
            return Vec::new();
        }
        let mut members = self.members();
        if count >= members.len() {
            return members;
        }
        members.shuffle(&mut rand::rng());
        members.truncate(count);
        members
    }

    /// `count` members sampled with replacement.
    pub fn random_members(&self, count: usize) -> Vec<Vec<u8>> {
        if count == 0 || self.is_empty() {
            return Vec::new();
        }
        let members = self.members();
        let mut rng = rand::rng();
        (0..count)
            .map(|_| members[rng.random_range(0..members.len())].clone())
            .collect()
    }

    fn convert_to_table(&mut self) {
        if !self.is_intset {
            return;
        }
        for value in self.intset.to_vec() {
            self.table.insert(value.to_string().into_bytes());
        }
        self.intset = IntSet::new();
        self.is_intset = false;
    }
}

#[cfg(test)]
mod tests {
    use super::{Set, SetEncoding, SET_MAX_INTSET_ENTRIES};

    #[test]
    fn test_add_remove_contains() {
        let mut set = Set::new();
        assert_eq!(set.add(b"1"), 1);
        assert_eq!(set.add(b"2"), 1);
        assert_eq!(set.add(b"2"), 0);
        assert!(set.contains(b"1"));
        assert!(!set.contains(b"3"));
        assert_eq!(set.remove(b"1"), 1);
        assert_eq!(set.remove(b"1"), 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_integer_members_use_intset() {
        let mut set = Set::new();
        set.add(b"10");
        set.add(b"-5");
        assert_eq!(set.encoding(), SetEncoding::IntSet);
        // intset members come back in ascending numeric order
        assert_eq!(set.members(), vec![b"-5".to_vec(), b"10".to_vec()]);
    }

    #[test]
    fn test_non_integer_member_converts() {
        let mut set = Set::new();
        set.add(b"1");
        set.add(b"2");
        set.add(b"3");
        assert_eq!(set.encoding(), SetEncoding::IntSet);
        set.add(b"hello");
        assert_eq!(set.encoding(), SetEncoding::HashTable);
        assert_eq!(set.len(), 4);
        assert!(set.contains(b"1"));
        assert!(set.contains(b"hello"));
    }

    #[test]
    fn test_entry_threshold_converts() {
        let mut set = Set::new();
        for i in 0..SET_MAX_INTSET_ENTRIES {
            set.add(i.to_string().as_bytes());
        }
        assert_eq!(set.encoding(), SetEncoding::IntSet);
        set.add(b"99999");
        assert_eq!(set.encoding(), SetEncoding::HashTable);
        assert_eq!(set.len(), SET_MAX_INTSET_ENTRIES + 1);
    }

    #[test]
    fn test_random_members() {
        let mut set = Set::new();
        for i in 0..10 {
            set.add(i.to_string().as_bytes());
        }

        let distinct = set.random_distinct_members(4);
        assert_eq!(distinct.len(), 4);
        let mut sorted = distinct.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 4);

        assert_eq!(set.random_distinct_members(100).len(), 10);

        let with_replacement = set.random_members(30);
        assert_eq!(with_replacement.len(), 30);
        for member in &with_replacement {
            assert!(set.contains(member));
        }
    }
}
