pub mod etcd;
pub mod memory;
pub mod traits;

pub use etcd::EtcdStore;
pub use memory::MemoryStore;
pub use traits::{MonitorStore, StoreError};

use crate::config::types::{StoreConfig, StoreType};
use std::sync::Arc;

/// Build the configured store.
pub fn from_config(config: &StoreConfig) -> Result<Arc<dyn MonitorStore>, StoreError> {
    match config.store_type {
        StoreType::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreType::Etcd => {
            let endpoint = config
                .endpoint
                .as_deref()
                .ok_or_else(|| StoreError::Config("etcd store needs an endpoint".to_string()))?;
            Ok(Arc::new(EtcdStore::new(endpoint, config.timeout)?))
        }
    }
}
