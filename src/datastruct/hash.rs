//! Field-to-value hash with listpack and hash-table encodings.

use std::collections::HashMap;

/// Entry count above which the listpack converts to a hash table.
pub const HASH_MAX_LISTPACK_ENTRIES: usize = 512;
/// Field or value length above which the listpack converts to a hash table.
pub const HASH_MAX_LISTPACK_VALUE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashEncoding {
    Listpack,
    HashTable,
}

impl HashEncoding {
    pub fn code(self) -> i64 {
        match self {
            HashEncoding::Listpack => 0,
            HashEncoding::HashTable => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Hash {
    encoding: HashEncoding,
    listpack: Vec<(Vec<u8>, Vec<u8>)>,
    table: HashMap<Vec<u8>, Vec<u8>>,
}

impl Default for Hash {
    fn default() -> Self {
        Self::new()
    }
}

impl Hash {
    pub fn new() -> Self {
        Hash {
            encoding: HashEncoding::Listpack,
            listpack: Vec::new(),
            table: HashMap::new(),
        }
    }

    pub fn encoding(&self) -> HashEncoding {
        self.encoding
    }

    pub fn get(&self, field: &[u8]) -> Option<&[u8]> {
        match self.encoding {
            HashEncoding::Listpack => self
                .listpack
                .iter()
                .find(|(f, _)| f == field)
                .map(|(_, v)| v.as_slice()),
            HashEncoding::HashTable => self.table.get(field).map(|v| v.as_slice()),
        }
    }

    pub fn exists(&self, field: &[u8]) -> bool {
        self.get(field).is_some()
    }

    /// Set `field` to `value`; returns 1 for a new field, 0 for an update.
    pub fn set(&mut self, field: &[u8], value: &[u8]) -> usize {
        if self.encoding == HashEncoding::Listpack
            && (self.listpack.len() >= HASH_MAX_LISTPACK_ENTRIES
                || field.len() > HASH_MAX_LISTPACK_VALUE
                || value.len() > HASH_MAX_LISTPACK_VALUE)
        {
            self.convert_to_table();
        }
        match self.encoding {
            HashEncoding::Listpack => {
                for (f, v) in self.listpack.iter_mut() {
                    if f == field {
                        *v = value.to_vec();
                        return 0;
                    }
                }
                self.listpack.push((field.to_vec(), value.to_vec()));
                1
            }
            HashEncoding::HashTable => {
                match self.table.insert(field.to_vec(), value.to_vec()) {
                    Some(_) => 0,
                    None => 1,
                }
            }
        }
    }

    /// Remove `field`; returns the number of fields removed (0 or 1).
    pub fn delete(&mut self, field: &[u8]) -> usize {
        match self.encoding {
            HashEncoding::Listpack => {
                match self.listpack.iter().position(|(f, _)| f == field) {
                    Some(idx) => {
                        // order is not part of the contract, so swap-remove
                        self.listpack.swap_remove(idx);
                        1
                    }
                    None => 0,
                }
            }
            HashEncoding::HashTable => match self.table.remove(field) {
                Some(_) => 1,
                None => 0,
            },
        }
    }

    pub fn len(&self) -> usize {
        match self.encoding {
            HashEncoding::Listpack => self.listpack.len(),
            HashEncoding::HashTable => self.table.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pairs(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        match self.encoding {
            HashEncoding::Listpack => self.listpack.clone(),
            HashEncoding::HashTable => self
                .table
                .iter()
                .map(|(f, v)| (f.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn fields(&self) -> Vec<Vec<u8>> {
        self.pairs().into_iter().map(|(f, _)| f).collect()
    }

    pub fn values(&self) -> Vec<Vec<u8>> {
        self.pairs().into_iter().map(|(_, v)| v).collect()
    }

    fn convert_to_table(&mut self) {
        if self.encoding == HashEncoding::HashTable {
            return;
        }
        self.table = self.listpack.drain(..).collect();
        self.encoding = HashEncoding::HashTable;
    }
}

#[cfg(test)]
mod tests {
    use super::{Hash, HashEncoding, HASH_MAX_LISTPACK_ENTRIES};

    #[test]
    fn test_set_get_delete() {
        let mut hash = Hash::new();
        assert_eq!(hash.set(b"f1", b"v1"), 1);
        assert_eq!(hash.set(b"f1", b"v2"), 0);
        assert_eq!(hash.get(b"f1"), Some(&b"v2"[..]));
        assert_eq!(hash.get(b"missing"), None);
        assert_eq!(hash.delete(b"f1"), 1);
        assert_eq!(hash.delete(b"f1"), 0);
        assert!(hash.is_empty());
    }

    #[test]
    fn test_entry_count_transition_happens_exactly_once() {
        let mut hash = Hash::new();
        for i in 0..HASH_MAX_LISTPACK_ENTRIES {
            assert_eq!(hash.set(format!("f{i}").as_bytes(), b"v"), 1);
        }
        assert_eq!(hash.encoding(), HashEncoding::Listpack);

        // the 513th insert crosses the threshold
        hash.set(b"straw", b"v");
        assert_eq!(hash.encoding(), HashEncoding::HashTable);
        assert_eq!(hash.len(), HASH_MAX_LISTPACK_ENTRIES + 1);

        hash.set(b"one-more", b"v");
        assert_eq!(hash.encoding(), HashEncoding::HashTable);
    }

    #[test]
    fn test_long_value_transition() {
        let mut hash = Hash::new();
        hash.set(b"short", b"v");
        assert_eq!(hash.encoding(), HashEncoding::Listpack);
        hash.set(b"long", &[b'x'; 65]);
        assert_eq!(hash.encoding(), HashEncoding::HashTable);
        assert_eq!(hash.get(b"short"), Some(&b"v"[..]));
        assert_eq!(hash.get(b"long"), Some(&[b'x'; 65][..]));
    }

    #[test]
    fn test_long_field_transition() {
        let mut hash = Hash::new();
        hash.set(&[b'f'; 65], b"v");
        assert_eq!(hash.encoding(), HashEncoding::HashTable);
    }

    #[test]
    fn test_membership_preserved_across_transition() {
        let mut hash = Hash::new();
        for i in 0..600 {
            hash.set(format!("f{i}").as_bytes(), format!("v{i}").as_bytes());
        }
        assert_eq!(hash.encoding(), HashEncoding::HashTable);
        assert_eq!(hash.len(), 600);
        for i in 0..600 {
            assert_eq!(
                hash.get(format!("f{i}").as_bytes()),
                Some(format!("v{i}").as_bytes())
            );
        }
    }
}
