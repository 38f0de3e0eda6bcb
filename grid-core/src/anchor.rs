//! Grid anchor persistence: a narrow load/save interface (§6) so a strategy
//! engine can be rebuilt from the same grid across a restart instead of
//! re-centering on whatever price happens to be current at boot.
//!
//! This is the one place in the crate that touches the filesystem, so it is
//! also the one place `anyhow::Result` appears — everywhere else uses the
//! precise local error enums in [`crate::errors`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Persisted anchor state for one strategy instance, matching §6's JSON
/// shape exactly: `{anchor_price, grid_step, grid_count}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub anchor_price: Decimal,
    pub grid_step: Decimal,
    pub grid_count: u32,
}

/// Executor-supplied (or, here, crate-supplied default) persistence
/// interface. The engine itself never holds one of these — it only exposes
/// the anchor it wants persisted; a caller wires that value through an
/// `AnchorStore` implementation between runs.
pub trait AnchorStore {
    fn load(&self, strategy_id: &str) -> anyhow::Result<Option<AnchorRecord>>;
    fn save(&self, strategy_id: &str, record: AnchorRecord) -> anyhow::Result<()>;
}

/// JSON-file-backed store matching §6's persisted format:
/// `{ "<strategy_id>": { "anchor_price": ..., "grid_step": ..., "grid_count": ... } }`.
/// Reads and rewrites the whole file on every call, which is fine at the
/// scale this crate persists at (one record per running strategy).
#[derive(Debug, Clone)]
pub struct JsonFileAnchorStore {
    path: PathBuf,
}

type AnchorMap = HashMap<String, AnchorRecord>;

impl JsonFileAnchorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_map(&self) -> anyhow::Result<AnchorMap> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                serde_json::from_str(&contents).with_context(|| format!("parsing anchor store at {:?}", self.path))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AnchorMap::new()),
            Err(e) => Err(e).with_context(|| format!("reading anchor store at {:?}", self.path)),
        }
    }

    fn write_map(&self, map: &AnchorMap) -> anyhow::Result<()> {
        let contents = serde_json::to_string_pretty(map).context("serializing anchor store")?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating anchor store directory {:?}", parent))?;
        }
        fs::write(&self.path, contents).with_context(|| format!("writing anchor store at {:?}", self.path))
    }
}

impl AnchorStore for JsonFileAnchorStore {
    fn load(&self, strategy_id: &str) -> anyhow::Result<Option<AnchorRecord>> {
        let map = self.read_map()?;
        Ok(map.get(strategy_id).copied())
    }

    fn save(&self, strategy_id: &str, record: AnchorRecord) -> anyhow::Result<()> {
        let mut map = self.read_map()?;
        map.insert(strategy_id.to_string(), record);
        self.write_map(&map)
    }
}

/// In-memory store for tests and for executors that persist anchors
/// elsewhere (e.g. a database row) and only need the trait surface to line
/// up during unit tests.
#[derive(Debug, Default)]
pub struct InMemoryAnchorStore {
    data: RefCell<AnchorMap>,
}

impl InMemoryAnchorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnchorStore for InMemoryAnchorStore {
    fn load(&self, strategy_id: &str) -> anyhow::Result<Option<AnchorRecord>> {
        Ok(self.data.borrow().get(strategy_id).copied())
    }

    fn save(&self, strategy_id: &str, record: AnchorRecord) -> anyhow::Result<()> {
        self.data.borrow_mut().insert(strategy_id.to_string(), record);
        Ok(())
    }
}

/// Convenience used by tests that want a throwaway file path under a
/// [`tempfile::TempDir`] without constructing the whole path by hand.
#[cfg(test)]
fn store_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}
