//! Sorted set with listpack and skiplist encodings.
//!
//! Small sorted sets keep an unsorted (member, score) sequence and sort a
//! copy on demand; past the entry threshold they convert to a skiplist
//! paired with a member-to-score map.

use std::collections::HashMap;

use super::skiplist::SkipList;

/// Entry count above which the listpack converts to a skiplist.
pub const ZSET_MAX_LISTPACK_ENTRIES: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZSetEncoding {
    Listpack,
    Skiplist,
}

impl ZSetEncoding {
    pub fn code(self) -> i64 {
        match self {
            ZSetEncoding::Listpack => 0,
            ZSetEncoding::Skiplist => 1,
        }
    }
}

#[derive(Debug, Clone)]
enum Repr {
    Listpack(Vec<(Vec<u8>, f64)>),
    Skiplist {
        scores: HashMap<Vec<u8>, f64>,
        list: SkipList,
    },
}

#[derive(Debug, Clone)]
pub struct ZSet {
    repr: Repr,
}

impl Default for ZSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ZSet {
    pub fn new() -> Self {
        ZSet {
            repr: Repr::Listpack(Vec::new()),
        }
    }

    pub fn encoding(&self) -> ZSetEncoding {
        match self.repr {
            Repr::Listpack(_) => ZSetEncoding::Listpack,
            Repr::Skiplist { .. } => ZSetEncoding::Skiplist,
        }
    }

    /// Add or update a member; returns true only when the member is new.
    pub fn add(&mut self, member: &[u8], score: f64) -> bool {
        let added = match &mut self.repr {
            Repr::Listpack(pack) => {
                match pack.iter_mut().find(|(m, _)| m == member) {
                    Some((_, s)) => {
                        *s = score;
                        false
                    }
                    None => {
                        pack.push((member.to_vec(), score));
                        true
                    }
                }
            }
            Repr::Skiplist { scores, list } => match scores.get(member).copied() {
                Some(existing) => {
                    if existing.total_cmp(&score).is_ne() {
                        list.delete(member, existing);
                        list.insert(member, score);
                        scores.insert(member.to_vec(), score);
                    }
                    false
                }
                None => {
                    scores.insert(member.to_vec(), score);
                    list.insert(member, score);
                    true
                }
            },
        };
        let over_threshold = matches!(&self.repr,
            Repr::Listpack(pack) if pack.len() > ZSET_MAX_LISTPACK_ENTRIES);
        if over_threshold {
            self.convert_to_skiplist();
        }
        added
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        match &self.repr {
            Repr::Listpack(pack) => pack.iter().find(|(m, _)| m == member).map(|(_, s)| *s),
            Repr::Skiplist { scores, .. } => scores.get(member).copied(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Listpack(pack) => pack.len(),
            Repr::Skiplist { scores, .. } => scores.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a member; returns whether it was present.
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match &mut self.repr {
            Repr::Listpack(pack) => match pack.iter().position(|(m, _)| m == member) {
                Some(idx) => {
                    pack.remove(idx);
                    true
                }
                None => false,
            },
            Repr::Skiplist { scores, list } => match scores.remove(member) {
                Some(score) => {
                    list.delete(member, score);
                    true
                }
                None => false,
            },
        }
    }

    /// Members with rank in `[start, stop]` inclusive, negative indices
    /// counting from the end, ordered by (score asc, member asc).
    pub fn range_by_rank(&self, start: i64, stop: i64) -> Vec<Vec<u8>> {
        match &self.repr {
            Repr::Listpack(pack) => {
                let sorted = sorted_copy(pack);
                let len = sorted.len() as i64;
                let mut start = if start < 0 { len + start } else { start };
                let mut stop = if stop < 0 { len + stop } else { stop };
                if start < 0 {
                    start = 0;
                }
                if stop >= len {
                    stop = len - 1;
                }
                if start > stop || start >= len {
                    return Vec::new();
                }
                sorted[start as usize..=stop as usize]
                    .iter()
                    .map(|(m, _)| m.clone())
                    .collect()
            }
            Repr::Skiplist { list, .. } => list.range_by_rank(start, stop),
        }
    }

    /// Zero-based rank of `member` in (score, member) order.
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        match &self.repr {
            Repr::Listpack(pack) => {
                let score = self.score(member)?;
                let sorted = sorted_copy(pack);
                sorted
                    .iter()
                    .position(|(m, s)| m.as_slice() == member && s.total_cmp(&score).is_eq())
            }
            Repr::Skiplist { scores, list } => {
                let score = scores.get(member).copied()?;
                list.rank(member, score)
            }
        }
    }

    /// Number of members with score in `[min, max]`.
    pub fn count(&self, min: f64, max: f64) -> usize {
        match &self.repr {
            Repr::Listpack(pack) => pack
                .iter()
                .filter(|(_, s)| *s >= min && *s <= max)
                .count(),
            Repr::Skiplist { list, .. } => list.count_in_range(min, max),
        }
    }

    /// Members with score in `[min, max]`, skipping `offset`, returning at
    /// most `count` (non-positive count means unlimited).
    pub fn range_by_score(&self, min: f64, max: f64, offset: i64, count: i64) -> Vec<Vec<u8>> {
        match &self.repr {
            Repr::Listpack(pack) => {
                let sorted = sorted_copy(pack);
                let mut result = Vec::new();
                let mut skipped = 0;
                for (member, score) in sorted {
                    if score < min || score > max {
                        continue;
                    }
                    if offset >= 0 && skipped < offset {
                        skipped += 1;
                        continue;
                    }
                    result.push(member);
                    if count > 0 && result.len() as i64 >= count {
                        break;
                    }
                }
                result
            }
            Repr::Skiplist { list, .. } => list.range_by_score(min, max, offset, count),
        }
    }

    fn convert_to_skiplist(&mut self) {
        let Repr::Listpack(pack) = &mut self.repr else {
            return;
        };
        let pack = std::mem::take(pack);
        let mut scores = HashMap::with_capacity(pack.len());
        let mut list = SkipList::new();
        for (member, score) in pack {
            list.insert(&member, score);
            scores.insert(member, score);
        }
        self.repr = Repr::Skiplist { scores, list };
    }
}

fn sorted_copy(pack: &[(Vec<u8>, f64)]) -> Vec<(Vec<u8>, f64)> {
    let mut sorted = pack.to_vec();
    sorted.sort_by(|(ma, sa), (mb, sb)| sa.total_cmp(sb).then_with(|| ma.cmp(mb)));
    sorted
}
