//! Shared, reloadable asset slots.
//!
//! A load builds a brand-new value without holding any lock, then swaps the
//! `Arc` into the slot under a short critical section. Readers clone the `Arc`
//! and keep using whichever snapshot they got.

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::assets::library::{AssetLibrary, LoadableAsset, Loaded};
use crate::error::Result;

#[derive(Debug)]
struct Snapshot<T> {
    data: Option<Arc<T>>,
    last_loaded: Option<SystemTime>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            last_loaded: None,
        }
    }
}

/// One asset id's latest successfully loaded value.
#[derive(Debug)]
pub struct CustomAsset<T> {
    asset_id: String,
    slot: Mutex<Snapshot<T>>,
}

impl<T> CustomAsset<T> {
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            slot: Mutex::new(Snapshot::default()),
        }
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// Latest snapshot, `None` until a load succeeds.
    pub fn data(&self) -> Option<Arc<T>> {
        self.slot.lock().ok()?.data.clone()
    }

    /// Modification time of the current snapshot's source.
    pub fn last_loaded_time(&self) -> Option<SystemTime> {
        self.slot.lock().ok()?.last_loaded
    }

    /// Publish a freshly built value. Zero bytes loaded means nothing changed
    /// and the current snapshot is kept. Returns the byte count.
    pub fn publish(&self, loaded: Loaded<T>) -> usize {
        let Loaded { info, data } = loaded;
        if info.bytes_loaded == 0 {
            return 0;
        }
        let data = Arc::new(data);
        let Ok(mut slot) = self.slot.lock() else {
            return 0;
        };
        slot.data = Some(data);
        slot.last_loaded = Some(info.last_modified);
        info.bytes_loaded
    }
}

impl<T: LoadableAsset> CustomAsset<T> {
    /// Load from `library` and publish the result. On failure the previous
    /// snapshot stays in place.
    pub fn load(&self, library: &dyn AssetLibrary) -> Result<usize> {
        let loaded = T::load(library, &self.asset_id)?;
        let bytes = self.publish(loaded);
        if bytes > 0 {
            log::debug!("loaded {} '{}' ({bytes} bytes)", T::KIND, self.asset_id);
        }
        Ok(bytes)
    }
}
