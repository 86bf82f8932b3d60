//! Typed handler registry
//!
//! Maps a (device type, model) key to the handler serving it. A static
//! lookup table: unknown keys miss, nothing falls through to a default
//! handler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::device::DeviceHandler;

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, String), Arc<dyn DeviceHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its (type, model) key
    pub fn register(&mut self, handler: Arc<dyn DeviceHandler>) {
        let key = (
            handler.device_type().to_string(),
            handler.model().to_string(),
        );
        self.handlers.insert(key, handler);
    }

    /// Look up the handler for a device type and model
    pub fn lookup(&self, device_type: &str, model: &str) -> Option<Arc<dyn DeviceHandler>> {
        self.handlers
            .get(&(device_type.to_string(), model.to_string()))
            .cloned()
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, HandlerError, Reading, WriteRequest};
    use async_trait::async_trait;

    struct NullHandler;

    #[async_trait]
    impl DeviceHandler for NullHandler {
        fn device_type(&self) -> &'static str {
            "led"
        }

        fn model(&self) -> &'static str {
            "bmc-chassis-led"
        }

        async fn read(&self, _device: &Device) -> Result<Vec<Reading>, HandlerError> {
            Ok(vec![])
        }

        async fn write(
            &self,
            _device: &Device,
            _request: &WriteRequest,
        ) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn test_lookup_hit() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(NullHandler));

        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("led", "bmc-chassis-led").is_some());
    }

    #[test]
    fn test_lookup_miss() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(NullHandler));

        assert!(registry.lookup("led", "other-model").is_none());
        assert!(registry.lookup("power", "bmc-chassis-led").is_none());
    }
}
