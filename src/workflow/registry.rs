//! Hot-reload block-type catalog using ArcSwap
//!
//! Maps block type names to their stable integer ids. Reads are lock-free; a
//! reload swaps the entire map so concurrent restores never see a partial view.

use crate::workflow::storage::WorkflowStorage;
use anyhow::Result;
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockType {
    pub id: i64,
    pub name: String,
}

/// Lock-free name -> id catalog of known block types
#[derive(Debug)]
pub struct BlockTypeCatalog {
    /// Key: lowercased type name
    types: ArcSwap<HashMap<String, BlockType>>,

    /// Reference to persistent storage for reload operations
    storage: WorkflowStorage,
}

impl BlockTypeCatalog {
    /// Create an empty catalog; call `reload` before use
    pub fn new(storage: WorkflowStorage) -> Self {
        Self {
            types: ArcSwap::new(Arc::new(HashMap::new())),
            storage,
        }
    }

    /// Create a catalog and load it from storage
    pub async fn load(storage: WorkflowStorage) -> Result<Self> {
        let catalog = Self::new(storage);
        catalog.reload().await?;
        Ok(catalog)
    }

    /// Re-read the catalog from storage and swap it in atomically
    pub async fn reload(&self) -> Result<()> {
        let rows = self.storage.list_block_types().await?;
        let types: HashMap<String, BlockType> = rows
            .into_iter()
            .map(|(id, name)| (name.to_lowercase(), BlockType { id, name }))
            .collect();

        self.types.store(Arc::new(types));

        tracing::info!("📚 Loaded block type catalog with {} types", self.types.load().len());
        Ok(())
    }

    /// Resolve a type name (case-insensitive) to its catalog entry
    pub fn resolve(&self, name: &str) -> Option<BlockType> {
        self.types.load().get(&name.to_lowercase()).cloned()
    }

    pub fn id_of(&self, name: &str) -> Option<i64> {
        self.resolve(name).map(|t| t.id)
    }

    pub fn len(&self) -> usize {
        self.types.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.load().is_empty()
    }
}
