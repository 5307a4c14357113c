//! Probabilistic skiplist ordered by (score, member).
//!
//! Nodes live in an arena indexed by `usize`, with a free list for reuse
//! after deletion. Each node's level is drawn with P=0.25 up to 16 levels.

use rand::Rng;

const MAX_LEVEL: usize = 16;
const NIL: usize = usize::MAX;

#[derive(Debug, Clone)]
struct Node {
    member: Vec<u8>,
    score: f64,
    forward: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct SkipList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    level: usize,
    length: usize,
}

/// Strict (score, member) ordering; scores compare as IEEE-754 doubles.
fn key_less(score_a: f64, member_a: &[u8], score_b: f64, member_b: &[u8]) -> bool {
    match score_a.total_cmp(&score_b) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => member_a < member_b,
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl SkipList {
    pub fn new() -> Self {
        let header = Node {
            member: Vec::new(),
            score: 0.0,
            forward: vec![NIL; MAX_LEVEL],
        };
        SkipList {
            nodes: vec![header],
            free: Vec::new(),
            level: 1,
            length: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn random_level(&self) -> usize {
        let mut level = 1;
        let mut rng = rand::rng();
        while rng.random::<f64>() < 0.25 && level < MAX_LEVEL {
            level += 1;
        }
        level
    }

    /// Predecessors of the (score, member) position at every active level.
    fn predecessors(&self, member: &[u8], score: f64) -> [usize; MAX_LEVEL] {
        let mut update = [0usize; MAX_LEVEL];
        let mut x = 0;
        for i in (0..self.level).rev() {
            loop {
                let next = self.nodes[x].forward[i];
                if next != NIL
                    && key_less(self.nodes[next].score, &self.nodes[next].member, score, member)
                {
                    x = next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }
        update
    }

    pub fn insert(&mut self, member: &[u8], score: f64) {
        let mut update = self.predecessors(member, score);

        let level = self.random_level();
        if level > self.level {
            for slot in update.iter_mut().take(level).skip(self.level) {
                *slot = 0;
            }
            self.level = level;
        }

        let node = Node {
            member: member.to_vec(),
            score,
            forward: vec![NIL; level],
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        for i in 0..level {
            self.nodes[idx].forward[i] = self.nodes[update[i]].forward[i];
            self.nodes[update[i]].forward[i] = idx;
        }
        self.length += 1;
    }

    /// Remove the node with exactly this (member, score); returns whether
    /// a node was removed.
    pub fn delete(&mut self, member: &[u8], score: f64) -> bool {
        let update = self.predecessors(member, score);
        let target = self.nodes[update[0]].forward[0];
        if target == NIL {
            return false;
        }
        let found = self.nodes[target].score.total_cmp(&score).is_eq()
            && self.nodes[target].member == member;
        if !found {
            return false;
        }

        for i in 0..self.level {
            if self.nodes[update[i]].forward[i] != target {
                break;
            }
            self.nodes[update[i]].forward[i] = self.nodes[target].forward[i];
        }
        self.nodes[target].member = Vec::new();
        self.nodes[target].forward = Vec::new();
        self.free.push(target);

        while self.level > 1 && self.nodes[0].forward[self.level - 1] == NIL {
            self.level -= 1;
        }
        self.length -= 1;
        true
    }

    /// Zero-based rank of `member` (whose score must match), or None.
    pub fn rank(&self, member: &[u8], score: f64) -> Option<usize> {
        let mut x = self.nodes[0].forward[0];
        let mut rank = 0;
        while x != NIL {
            let node = &self.nodes[x];
            if node.score.total_cmp(&score).is_eq() && node.member == member {
                return Some(rank);
            }
            if key_less(score, member, node.score, &node.member) {
                return None;
            }
            rank += 1;
            x = node.forward[0];
        }
        None
    }

    /// Members with rank in `[start, stop]` inclusive; negative indices
    /// count from the end and out-of-range ends clamp.
    pub fn range_by_rank(&self, start: i64, stop: i64) -> Vec<Vec<u8>> {
        let len = self.length as i64;
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

        let mut result = Vec::with_capacity((stop - start + 1) as usize);
        let mut x = self.nodes[0].forward[0];
        let mut rank = 0;
        while x != NIL && rank <= stop {
            if rank >= start {
                result.push(self.nodes[x].member.clone());
            }
            rank += 1;
            x = self.nodes[x].forward[0];
        }
        result
    }

    /// Members with score in `[min, max]`, skipping `offset` and returning
    /// at most `count` (non-positive count means unlimited).
    pub fn range_by_score(&self, min: f64, max: f64, offset: i64, count: i64) -> Vec<Vec<u8>> {
        let mut result = Vec::new();
        let mut skipped = 0;
        let mut x = self.first_at_least(min);
        while x != NIL && self.nodes[x].score <= max {
            if offset < 0 || skipped >= offset {
                result.push(self.nodes[x].member.clone());
                if count > 0 && result.len() as i64 >= count {
                    break;
                }
            } else {
                skipped += 1;
            }
            x = self.nodes[x].forward[0];
        }
        result
    }

    pub fn count_in_range(&self, min: f64, max: f64) -> usize {
        let mut count = 0;
        let mut x = self.first_at_least(min);
        while x != NIL && self.nodes[x].score <= max {
            count += 1;
            x = self.nodes[x].forward[0];
        }
        count
    }

    /// Index of the first node with score >= min.
    fn first_at_least(&self, min: f64) -> usize {
        let mut x = 0;
        for i in (0..self.level).rev() {
            loop {
                let next = self.nodes[x].forward[i];
                if next != NIL && self.nodes[next].score < min {
                    x = next;
                } else {
                    break;
                }
            }
        }
        self.nodes[x].forward[0]
    }
}
