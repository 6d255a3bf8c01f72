//! Local implementations of the collaborator traits, used by the CLI and
//! for running the pipeline without the shipment database.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::contract::{FilePersistence, OrderQuery};
use crate::error::BoxError;
use crate::model::{BulkContent, Order};

/// Orders held in memory, typically loaded from a JSON export.
#[derive(Debug, Clone, Default)]
pub struct JsonOrderStore {
    orders: Vec<Order>,
}

impl JsonOrderStore {
    pub fn new(orders: Vec<Order>) -> Self {
        Self { orders }
    }

    /// Load a JSON array of orders.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, BoxError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            error!(path = %path.display(), error = ?e, "Failed to read orders file");
            e
        })?;
        let orders: Vec<Order> = serde_json::from_str(&raw)?;
        info!(path = %path.display(), count = orders.len(), "Loaded orders from file");
        Ok(Self { orders })
    }
}

#[async_trait]
impl OrderQuery for JsonOrderStore {
    async fn get_all_orders_in_bulk(
        &self,
        content: &BulkContent,
    ) -> Result<Vec<Order>, BoxError> {
        let wanted: HashSet<&str> = content.orders.iter().map(String::as_str).collect();
        let orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|order| wanted.contains(order.id.as_str()))
            .cloned()
            .collect();
        debug!(requested = wanted.len(), found = orders.len(), "Resolved orders in bulk");
        Ok(orders)
    }
}

/// Stores files under `<root>/<ref_collection>/<bulk_id>/<filename>`.
#[derive(Debug, Clone)]
pub struct LocalFilePersistence {
    root: PathBuf,
}

impl LocalFilePersistence {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, filename: &str, ref_collection: &str, bulk_id: &str) -> PathBuf {
        self.root.join(ref_collection).join(bulk_id).join(filename)
    }
}

#[async_trait]
impl FilePersistence for LocalFilePersistence {
    async fn persist_file(
        &self,
        filename: &str,
        data: Vec<u8>,
        ref_collection: &str,
        bulk_id: &str,
    ) -> Result<String, BoxError> {
        let target = self.path_for(filename, ref_collection, bulk_id);
        let dir = target
            .parent()
            .ok_or("persistence target has no parent directory")?
            .to_path_buf();

        // Write into a temp file in the target directory and rename it into
        // place, so readers never see a partial file.
        let write_target = target.clone();
        tokio::task::spawn_blocking(move || -> Result<(), BoxError> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            std::io::Write::write_all(&mut tmp, &data)?;
            tmp.persist(&write_target).map_err(|e| e.error)?;
            Ok(())
        })
        .await??;

        let file_id = Uuid::new_v4().to_string();
        info!(path = %target.display(), file_id = %file_id, "Persisted file");
        Ok(file_id)
    }
}
