//! Consistent hash ring mapping keys to node addresses.
//!
//! Nodes are placed on the ring at the CRC32 of their address; a key is
//! owned by the first node at or clockwise of the key's hash.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct HashRing {
    hashes: Vec<u32>,
    nodes: HashMap<u32, String>,
}

impl HashRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_nodes<S: AsRef<str>>(&mut self, nodes: &[S]) {
        for node in nodes {
            let hash = crc32fast::hash(node.as_ref().as_bytes());
            self.hashes.push(hash);
            self.nodes.insert(hash, node.as_ref().to_string());
        }
        self.hashes.sort_unstable();
        self.hashes.dedup();
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node owning `key`, or None for an empty ring.
    pub fn node_for(&self, key: &str) -> Option<&str> {
        if self.hashes.is_empty() {
            return None;
        }
        let hash = crc32fast::hash(key.as_bytes());
        let idx = self.hashes.partition_point(|&h| h < hash);
        let idx = if idx == self.hashes.len() { 0 } else { idx };
        self.nodes.get(&self.hashes[idx]).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::HashRing;

    #[test]
    fn test_empty_ring() {
        let ring = HashRing::new();
        assert!(ring.is_empty());
        assert_eq!(ring.node_for("anything"), None);
    }

    #[test]
    fn test_single_node_owns_everything() {
        let mut ring = HashRing::new();
        ring.add_nodes(&["10.0.0.1:6379"]);
        for key in ["a", "b", "c", "somekey"] {
            assert_eq!(ring.node_for(key), Some("10.0.0.1:6379"));
        }
    }

    #[test]
    fn test_mapping_is_stable() {
        let mut ring = HashRing::new();
        ring.add_nodes(&["n1:7000", "n2:7000", "n3:7000"]);
        for i in 0..64 {
            let key = format!("key-{i}");
            let owner = ring.node_for(&key).unwrap().to_string();
            assert_eq!(ring.node_for(&key), Some(owner.as_str()));
        }
    }

    #[test]
    fn test_all_nodes_used() {
        let mut ring = HashRing::new();
        let nodes = ["n1:7000", "n2:7000", "n3:7000"];
        ring.add_nodes(&nodes);
        let mut seen = std::collections::HashSet::new();
        for i in 0..512 {
            seen.insert(ring.node_for(&format!("key-{i}")).unwrap().to_string());
        }
        assert_eq!(seen.len(), nodes.len());
    }

    #[test]
    fn test_adding_node_only_moves_some_keys() {
        let mut before = HashRing::new();
        before.add_nodes(&["n1:7000", "n2:7000"]);
        let mut after = HashRing::new();
        after.add_nodes(&["n1:7000", "n2:7000", "n3:7000"]);

        let mut moved = 0;
        let total = 512;
        for i in 0..total {
            let key = format!("key-{i}");
            if before.node_for(&key) != after.node_for(&key) {
                moved += 1;
            }
        }
        assert!(moved > 0, "the new node should own something");
        assert!(moved < total / 2, "most keys must keep their owner");
    }
}
