//! # Handle table for proof builders
//!
//! Callers on the far side of a narrow boundary can not hold a [`ProofBuilder`] by reference, so
//! builders live in a [`ConcurrentHandleMap`] and are addressed by an opaque `u64` handle.
//!
//! * Handles are versioned by the map, a retired handle is not handed out again.
//! * Every builder sits behind its own mutex, so calls on different handles do not wait on each
//!   other.
//! * Finishing closes the entry under its lock before it leaves the map, so a caller racing on
//!   the same handle sees an invalid handle error instead of a half used builder.
//! * Builders are zeroized when they are finished, discarded or torn down.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use ffi_support::{ConcurrentHandleMap, HandleError};
use lazy_static::lazy_static;
use log::{debug, trace, warn};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::bls_tokens::{BlindingFactor, Proof, ProofBuilder, Token};
use crate::error::{Error, Result};

/// Entries a handle map can index, inserting beyond this panics inside the map
const MAP_CAPACITY: usize = (1 << 15) - 1;

// {{{ configuration

/// Limits of a handle table
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HandleTableConfig {
    /// How many builders may be live at the same time, capped at what the map can index
    pub max_live_builders: usize,
}

impl Default for HandleTableConfig {
    fn default() -> Self {
        Self {
            max_live_builders: MAP_CAPACITY,
        }
    }
}

impl HandleTableConfig {
    /// Read a configuration from json, missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Fatal(format!("invalid handle table configuration: {}", e)))
    }
}

// }}}

// {{{ table

/// Where a live builder is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// Nothing was set yet
    Created,
    /// At least one field was set
    Populated,
}

struct Entry {
    builder: ProofBuilder,
    // set once a proof came out, the entry is about to leave the map
    closed: bool,
}

/// Failure inside a map callback, either from the map or from the builder
enum Access {
    Handle(HandleError),
    Engine(Error),
}

impl From<HandleError> for Access {
    fn from(e: HandleError) -> Self {
        Access::Handle(e)
    }
}

/// Owns the in-flight proof builders
pub struct HandleTable {
    config: HandleTableConfig,
    // swapped out whole on teardown, which also invalidates every handle of the old map
    builders: RwLock<ConcurrentHandleMap<Entry>>,
}

fn poisoned<T>(_: T) -> Error {
    Error::Fatal("proof builder table lock poisoned".into())
}

impl HandleTable {
    /// A table with the default limits
    pub fn new() -> Self {
        Self::with_config(HandleTableConfig::default())
    }

    pub fn with_config(mut config: HandleTableConfig) -> Self {
        if config.max_live_builders > MAP_CAPACITY {
            warn!(
                "at most {} live proof builders are supported, {} requested",
                MAP_CAPACITY, config.max_live_builders
            );
            config.max_live_builders = MAP_CAPACITY;
        }
        debug!(
            "proof builder table created, at most {} live builders",
            config.max_live_builders
        );
        Self {
            config,
            builders: RwLock::new(ConcurrentHandleMap::new()),
        }
    }

    pub fn config(&self) -> &HandleTableConfig {
        &self.config
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ConcurrentHandleMap<Entry>>> {
        self.builders.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ConcurrentHandleMap<Entry>>> {
        self.builders.write().map_err(poisoned)
    }

    /// Run `f` on the open entry behind `handle`
    fn with_entry<T>(&self, handle: u64, f: impl FnOnce(&mut Entry) -> Result<T>) -> Result<T> {
        let map = self.read()?;
        map.get_mut_u64(handle, |entry: &mut Entry| {
            if entry.closed {
                return Err(Access::Engine(Error::InvalidHandle(handle)));
            }
            f(entry).map_err(Access::Engine)
        })
        .map_err(|e| match e {
            Access::Handle(e) => {
                trace!("proof builder {} rejected: {:?}", handle, e);
                Error::InvalidHandle(handle)
            }
            Access::Engine(e) => e,
        })
    }

    fn with_live<T>(
        &self,
        handle: u64,
        f: impl FnOnce(&mut ProofBuilder) -> Result<T>,
    ) -> Result<T> {
        self.with_entry(handle, |entry| f(&mut entry.builder))
    }

    /// Register a new, empty builder
    pub fn init(&self) -> Result<u64> {
        // the write lock keeps the capacity check and the insert together
        let map = self.write()?;
        if map.len() >= self.config.max_live_builders {
            warn!(
                "refusing a new proof builder, {} are live",
                self.config.max_live_builders
            );
            return Err(Error::Fatal("too many live proof builders".into()));
        }

        let handle = map
            .insert(Entry {
                builder: ProofBuilder::new(),
                closed: false,
            })
            .into_u64();
        trace!("proof builder {} created", handle);
        Ok(handle)
    }

    pub fn set_token(&self, handle: u64, token: Token) -> Result<()> {
        self.with_live(handle, |builder| {
            builder.set_token(token);
            Ok(())
        })
    }

    pub fn set_id(&self, handle: u64, id: impl AsRef<[u8]>) -> Result<()> {
        self.with_live(handle, |builder| {
            builder.set_id(id);
            Ok(())
        })
    }

    pub fn set_nonce(&self, handle: u64, nonce: impl AsRef<[u8]>) -> Result<()> {
        self.with_live(handle, |builder| {
            builder.set_nonce(nonce);
            Ok(())
        })
    }

    pub fn add_blinding(&self, handle: u64, blinding: BlindingFactor) -> Result<()> {
        self.with_live(handle, |builder| {
            builder.add_blinding(blinding);
            Ok(())
        })
    }

    /// The lifecycle state of a live builder
    pub fn state(&self, handle: u64) -> Result<BuilderState> {
        self.with_live(handle, |builder| {
            Ok(if builder.is_populated() {
                BuilderState::Populated
            } else {
                BuilderState::Created
            })
        })
    }

    /// Produce the proof and retire the handle
    ///
    /// A builder missing a required field stays live.
    pub fn finish(&self, handle: u64) -> Result<Proof> {
        self.finish_with_rng(handle, &mut rand::thread_rng())
    }

    pub fn finish_with_rng<R: CryptoRng + RngCore>(
        &self,
        handle: u64,
        rng: &mut R,
    ) -> Result<Proof> {
        let proof = self.with_entry(handle, |entry| {
            let proof = entry.builder.finish(rng)?;
            entry.builder.zeroize();
            entry.closed = true;
            Ok(proof)
        })?;

        // a racing discard may already have taken the closed entry out
        if let Err(e) = self.read()?.remove_u64(handle) {
            trace!("finished proof builder {} already gone: {:?}", handle, e);
        }
        trace!("proof builder {} finished", handle);
        Ok(proof)
    }

    /// Release the builder without producing a proof
    pub fn discard(&self, handle: u64) -> Result<()> {
        match self.read()?.remove_u64(handle) {
            Ok(Some(entry)) if !entry.closed => {
                trace!("proof builder {} discarded", handle);
                Ok(())
            }
            Ok(Some(_)) => Err(Error::InvalidHandle(handle)),
            Ok(None) => Err(Error::Fatal(format!(
                "proof builder {} lock poisoned",
                handle
            ))),
            Err(e) => {
                trace!("proof builder {} rejected: {:?}", handle, e);
                Err(Error::InvalidHandle(handle))
            }
        }
    }

    /// Number of live builders
    pub fn live(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Discard every live builder, returns how many there were
    ///
    /// The map is replaced, so handles of the old one are rejected from now on.
    pub fn teardown(&self) -> Result<usize> {
        let old = std::mem::replace(&mut *self.write()?, ConcurrentHandleMap::new());
        let discarded = old.len();
        // dropping the map drops and zeroizes every builder in it
        drop(old);

        debug!("proof builder table torn down, {} builders discarded", discarded);
        Ok(discarded)
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

// }}}

// {{{ process wide table

lazy_static! {
    static ref PROOF_BUILDERS: HandleTable = HandleTable::new();
}

/// The process wide table, created on first use
pub fn proof_builders() -> &'static HandleTable {
    &PROOF_BUILDERS
}

/// Discard and zeroize every builder in the process wide table
///
/// Handles issued before stay invalid, new builders can still be created afterwards.
pub fn teardown() -> Result<usize> {
    PROOF_BUILDERS.teardown()
}

// }}}
