use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use crate::address::AddressKey;
use crate::error::IdentifierCollision;

/// How many bits of the SHA-256 digest end up in an address id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdWidth {
    Bits64,
    #[default]
    Bits128,
    Bits256,
}

impl IdWidth {
    pub fn bytes(self) -> usize {
        match self {
            IdWidth::Bits64 => 8,
            IdWidth::Bits128 => 16,
            IdWidth::Bits256 => 32,
        }
    }
}

impl fmt::Display for IdWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bytes() * 8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AddressId(String);

impl AddressId {
    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase hex of the leading `width` bits of SHA-256 over the key's UTF-8
/// bytes. No seed, so the same key gets the same id on every run and host.
pub fn address_id(key: &AddressKey, width: IdWidth) -> AddressId {
    let digest = Sha256::digest(key.as_str().as_bytes());
    AddressId(hex::encode(&digest[..width.bytes()]))
}

/// Hands out ids and refuses to give one id to two different keys.
#[derive(Debug)]
pub struct IdentifierAssigner {
    width: IdWidth,
    derive: fn(&AddressKey, IdWidth) -> AddressId,
    assigned: HashMap<AddressId, AddressKey>,
}

impl IdentifierAssigner {
    pub fn new(width: IdWidth) -> Self {
        Self {
            width,
            derive: address_id,
            assigned: HashMap::new(),
        }
    }

    /// Gives every key the all-zero id.
    #[cfg(test)]
    pub fn colliding(width: IdWidth) -> Self {
        Self {
            width,
            derive: |_, width| AddressId("0".repeat(width.bytes() * 2)),
            assigned: HashMap::new(),
        }
    }

    pub fn assign(&mut self, key: &AddressKey) -> Result<AddressId, IdentifierCollision> {
        let id = (self.derive)(key, self.width);
        self.register(id, key)
    }

    fn register(&mut self, id: AddressId, key: &AddressKey) -> Result<AddressId, IdentifierCollision> {
        match self.assigned.entry(id) {
            Entry::Occupied(entry) if entry.get() != key => Err(IdentifierCollision {
                id: entry.key().clone(),
                width: self.width,
                existing: entry.get().clone(),
                incoming: key.clone(),
            }),
            Entry::Occupied(entry) => Ok(entry.key().clone()),
            Entry::Vacant(entry) => {
                let id = entry.key().clone();
                entry.insert(key.clone());
                Ok(id)
            }
        }
    }

    pub fn assigned_count(&self) -> usize {
        self.assigned.len()
    }
}
