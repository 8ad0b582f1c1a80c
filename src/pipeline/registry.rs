//! Device id → frame buffer map shared by all request handlers

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::info;

use super::buffer::FrameBuffer;
use super::clock::{Clock, SystemClock};
use crate::error::{Result, VigilError};
use crate::BufferConfig;

/// Lazily creates one [`FrameBuffer`] per device.
///
/// Insert-if-absent goes through the map's entry API, which holds the shard
/// lock for the whole check-then-insert, so concurrent first access for the
/// same device always yields the same buffer.
pub struct BufferRegistry {
    buffers: DashMap<String, Arc<FrameBuffer>>,
    capacity: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl BufferRegistry {
    pub fn new(config: &BufferConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &BufferConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            buffers: DashMap::new(),
            capacity: config.capacity,
            window: config.window(),
            clock,
        }
    }

    /// Buffer for `device_id`, created on first use.
    pub fn get_or_create(&self, device_id: &str) -> Arc<FrameBuffer> {
        if let Some(existing) = self.buffers.get(device_id) {
            return Arc::clone(existing.value());
        }
        let entry = self.buffers.entry(device_id.to_owned()).or_insert_with(|| {
            info!(device_id, capacity = self.capacity, window = ?self.window, "created frame buffer");
            Arc::new(FrameBuffer::new(
                device_id,
                self.capacity,
                self.window,
                Arc::clone(&self.clock),
            ))
        });
        Arc::clone(entry.value())
    }

    /// Lookup without creating; devices that never produced frames are `NotFound`.
    pub fn get(&self, device_id: &str) -> Result<Arc<FrameBuffer>> {
        self.buffers
            .get(device_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| VigilError::NotFound {
                device_id: device_id.to_owned(),
            })
    }

    /// Forget a device. Handles already given out stay usable.
    pub fn remove(&self, device_id: &str) -> Option<Arc<FrameBuffer>> {
        self.buffers.remove(device_id).map(|(_, buffer)| buffer)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.buffers.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BufferRegistry {
        BufferRegistry::new(&BufferConfig::default())
    }

    #[test]
    fn get_does_not_create() {
        let reg = registry();
        let err = reg.get("ghost").unwrap_err();
        assert!(matches!(err, VigilError::NotFound { .. }));
        assert!(reg.is_empty());
    }

    #[test]
    fn get_or_create_reuses_buffer() {
        let reg = registry();
        let a = reg.get_or_create("pi-1");
        let b = reg.get_or_create("pi-1");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &reg.get("pi-1").unwrap()));
        assert_eq!(a.capacity(), 48);
        assert_eq!(reg.device_ids(), vec!["pi-1".to_string()]);
    }

    #[test]
    fn remove_forgets_device() {
        let reg = registry();
        let held = reg.get_or_create("pi-2");
        assert!(reg.remove("pi-2").is_some());
        assert!(reg.get("pi-2").is_err());
        assert_eq!(held.device_id(), "pi-2");
        assert!(!Arc::ptr_eq(&held, &reg.get_or_create("pi-2")));
    }
}
