//! Table cache façade (C6). The teacher's generators never persist tables —
//! `alap_gen`/`lap_gen` regenerate Rust source on every invocation — so this
//! is grounded instead in the wider ecosystem's equivalent: `cfgrammar`'s
//! `CTParserBuilder` / `lrtable` cache built LR tables with `serde` for the
//! same reason spec §4.6 describes. `Tables` (see `crate::table`) derives
//! `Serialize`/`Deserialize`; `bincode` gives an opaque on-disk/in-memory
//! encoding, and [`TableCache`] abstracts the key/value store so a fresh
//! build, a filesystem cache and an in-memory cache are all exercised by the
//! same round-trip tests.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::error::CacheMismatchError;
use crate::table::Tables;

/// The cache key of spec §4.6: the grammar's canonical fingerprint plus the
/// requested table flavour (already folded into `Tables::fingerprint`, so a
/// `Fingerprint` here is just a thin newtype over that string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub enum CacheError {
    Io(String),
    Encode(String),
    Mismatch(CacheMismatchError),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CacheError::Io(message) => write!(f, "cache i/o error: {message}"),
            CacheError::Encode(message) => write!(f, "cache encode/decode error: {message}"),
            CacheError::Mismatch(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<CacheMismatchError> for CacheError {
    fn from(error: CacheMismatchError) -> Self {
        CacheError::Mismatch(error)
    }
}

/// A key/value artifact store keyed by grammar fingerprint, per spec §1's
/// "opaque key/value artifact store" framing. `store`/`load` are the only
/// required operations; spec §5 notes that external callers sharing a single
/// cache across threads/processes must supply their own mutual exclusion —
/// this trait does not attempt to provide any.
pub trait TableCache {
    fn store(&mut self, key: &Fingerprint, tables: &Tables) -> Result<(), CacheError>;
    fn load(&self, key: &Fingerprint) -> Result<Option<Tables>, CacheError>;
}

/// The cheap half of the spec §4.6 cache-hit check, available with nothing
/// but the key and the decoded blob: the fingerprint the blob was stored
/// under must match the key, and the blob's own indices must be internally
/// consistent (catches a corrupt or foreign blob that happened to decode).
/// The full check additionally compares terminal/nonterminal name sets
/// against the grammar under construction — see [`Tables::validate_against`],
/// which callers should run once a `Grammar` is in hand.
pub fn validate(key: &Fingerprint, tables: &Tables) -> Result<(), CacheMismatchError> {
    if tables.fingerprint != key.0 {
        return Err(CacheMismatchError::FingerprintMismatch);
    }
    if !tables.is_self_consistent() {
        return Err(CacheMismatchError::Corrupt("action/goto indices out of range".to_string()));
    }
    Ok(())
}

/// An in-memory cache, useful for a process that builds the same grammar
/// more than once (e.g. repeated calls to `build` in one long-running
/// service) without ever touching disk.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableCache for MemoryCache {
    fn store(&mut self, key: &Fingerprint, tables: &Tables) -> Result<(), CacheError> {
        let bytes = bincode::serialize(tables).map_err(|e| CacheError::Encode(e.to_string()))?;
        self.entries.insert(key.0.clone(), bytes);
        Ok(())
    }

    fn load(&self, key: &Fingerprint) -> Result<Option<Tables>, CacheError> {
        let Some(bytes) = self.entries.get(&key.0) else { return Ok(None) };
        let tables: Tables = bincode::deserialize(bytes).map_err(|e| CacheError::Encode(e.to_string()))?;
        validate(key, &tables)?;
        Ok(Some(tables))
    }
}

/// A filesystem-directory-backed cache: one file per fingerprint, named by a
/// hash of the key so fingerprints containing arbitrary grammar text never
/// need to survive as a literal path component.
#[derive(Debug, Clone)]
pub struct FileCache {
    directory: PathBuf,
}

impl FileCache {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    fn path_for(&self, key: &Fingerprint) -> PathBuf {
        let digest = simple_hash(&key.0);
        self.directory.join(format!("{digest:016x}.lalr1tables"))
    }
}

impl TableCache for FileCache {
    fn store(&mut self, key: &Fingerprint, tables: &Tables) -> Result<(), CacheError> {
        fs::create_dir_all(&self.directory).map_err(|e| CacheError::Io(e.to_string()))?;
        let bytes = bincode::serialize(tables).map_err(|e| CacheError::Encode(e.to_string()))?;
        fs::write(self.path_for(key), bytes).map_err(|e| CacheError::Io(e.to_string()))
    }

    fn load(&self, key: &Fingerprint) -> Result<Option<Tables>, CacheError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| CacheError::Io(e.to_string()))?;
        let tables: Tables = bincode::deserialize(&bytes).map_err(|e| CacheError::Encode(e.to_string()))?;
        validate(key, &tables)?;
        Ok(Some(tables))
    }
}

/// A small FNV-1a hash, good enough to turn a fingerprint string into a
/// filesystem-safe name; not used for anything security sensitive.
fn simple_hash(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in text.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::Flavour;
    use crate::grammar::{read_grammar_text, Grammar};
    use crate::symbol::PrecedenceTable;
    use crate::table::{build, BuildOptions};

    fn sample_tables() -> (Fingerprint, Tables) {
        let terminals = ["n", "+"];
        let text = "E -> E + E | n ;";
        let (symbols, raw, start) = read_grammar_text(text, &terminals).unwrap();
        let grammar = Grammar::build(symbols, PrecedenceTable::new(), raw, start).unwrap();
        let options = BuildOptions { flavour: Flavour::Lalr1, ..Default::default() };
        let (tables, _log) = build(&grammar, &options).unwrap();
        (Fingerprint(tables.fingerprint.clone()), tables)
    }

    #[test]
    fn memory_cache_round_trips() {
        let (key, tables) = sample_tables();
        let mut cache = MemoryCache::new();
        assert!(cache.load(&key).unwrap().is_none());
        cache.store(&key, &tables).unwrap();
        let loaded = cache.load(&key).unwrap().expect("just stored");
        assert_eq!(loaded.fingerprint, tables.fingerprint);
        assert_eq!(loaded.state_count, tables.state_count);
    }

    #[test]
    fn file_cache_round_trips_through_a_temp_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (key, tables) = sample_tables();
        let mut cache = FileCache::new(dir.path());
        cache.store(&key, &tables).unwrap();
        let loaded = cache.load(&key).unwrap().expect("just stored");
        assert_eq!(loaded.fingerprint, tables.fingerprint);
    }

    #[test]
    fn mismatched_fingerprint_is_rejected() {
        let (_, tables) = sample_tables();
        let wrong_key = Fingerprint("not-the-real-fingerprint".to_string());
        assert_eq!(validate(&wrong_key, &tables), Err(CacheMismatchError::FingerprintMismatch));
    }
}
