//! Immutable block catalog.
//!
//! Block definitions are loaded once at startup from an embedded JSON file
//! and frozen into a [`BlockRegistry`]. The registry is an explicit value
//! passed by reference to every consumer — there is no global singleton.
//! Lookup by string key is O(1); lookup by [`BlockId`] is an array index.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Stable handle into a [`BlockRegistry`]. Cheap to copy and store per tile.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(pub u16);

/// One catalog entry. Read-only after registry construction; shared by
/// every tile that references it.
#[derive(Clone, Debug)]
pub struct Block {
    pub key: String,
    pub name: String,
    pub solid: bool,
}

/// Lookup of a key that is not in the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownBlockKey(pub String);

impl fmt::Display for UnknownBlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown block key {:?}", self.0)
    }
}

impl std::error::Error for UnknownBlockKey {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BlocksFile {
    fallback: String,
    blocks: Vec<BlockEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BlockEntry {
    key: String,
    name: String,
    solid: bool,
}

/// Immutable block catalog, keyed by string id.
pub struct BlockRegistry {
    blocks: Vec<Block>,
    by_key: HashMap<String, BlockId>,
    air: BlockId,
    fallback: BlockId,
}

impl BlockRegistry {
    /// Build the registry from the embedded default catalog.
    ///
    /// Panics on a malformed catalog: the embedded JSON is build-time
    /// content and a parse failure is a packaging error, not a runtime
    /// condition.
    pub fn from_embedded() -> Self {
        Self::from_json(include_str!("../assets/blocks.json"))
            .unwrap_or_else(|error| panic!("invalid embedded block catalog: {error}"))
    }

    /// Build a registry from a JSON catalog string.
    ///
    /// The catalog must define an `air` block and its declared fallback key.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let file: BlocksFile =
            serde_json::from_str(json).map_err(|error| format!("parse error: {error}"))?;

        let mut blocks = Vec::with_capacity(file.blocks.len());
        let mut by_key = HashMap::with_capacity(file.blocks.len());
        for entry in file.blocks {
            if entry.key.trim().is_empty() {
                return Err("block catalog contains an empty key".to_string());
            }
            let id = BlockId(blocks.len() as u16);
            if by_key.insert(entry.key.clone(), id).is_some() {
                return Err(format!("duplicate block key {:?}", entry.key));
            }
            blocks.push(Block {
                key: entry.key,
                name: entry.name,
                solid: entry.solid,
            });
        }

        let air = *by_key
            .get("air")
            .ok_or_else(|| "block catalog has no \"air\" block".to_string())?;
        let fallback = *by_key
            .get(&file.fallback)
            .ok_or_else(|| format!("fallback key {:?} is not in the catalog", file.fallback))?;

        Ok(Self {
            blocks,
            by_key,
            air,
            fallback,
        })
    }

    pub fn get_by_key(&self, key: &str) -> Result<BlockId, UnknownBlockKey> {
        self.by_key
            .get(key)
            .copied()
            .ok_or_else(|| UnknownBlockKey(key.to_string()))
    }

    /// Key lookup that never fails: an unknown key substitutes the catalog
    /// fallback block and logs the miss. Generation keeps going.
    pub fn get_or_fallback(&self, key: &str) -> BlockId {
        match self.get_by_key(key) {
            Ok(id) => id,
            Err(error) => {
                log::warn!("{error}; substituting {:?}", self.block(self.fallback).key);
                self.fallback
            }
        }
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn is_solid(&self, id: BlockId) -> bool {
        self.blocks[id.0 as usize].solid
    }

    pub fn air(&self) -> BlockId {
        self.air
    }

    pub fn fallback(&self) -> BlockId {
        self.fallback
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
