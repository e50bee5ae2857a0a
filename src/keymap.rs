//! Key binding capabilities
//!
//! The controller core knows nothing about how keys reach the operating
//! system. `KeySink` is the seam: dispatch drives a `KeyBinding`, which
//! forwards the bound key name to whatever sink the binary wired in.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::surface::PadHandler;

/// Receives key-down/key-up commands for named keys ("a", "ctrl+c", "f1")
pub trait KeySink: Send + Sync {
    fn key_down(&self, key: &str) -> Result<()>;
    fn key_up(&self, key: &str) -> Result<()>;
}

/// One pad bound to one key through a sink
pub struct KeyBinding {
    key: String,
    sink: Arc<dyn KeySink>,
}

impl KeyBinding {
    pub fn new(key: impl Into<String>, sink: Arc<dyn KeySink>) -> Self {
        Self {
            key: key.into(),
            sink,
        }
    }

    /// The bound key name
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PadHandler for KeyBinding {
    // Sink failures are logged, never unwound into the dispatch loop.
    fn press(&self) {
        if let Err(e) = self.sink.key_down(&self.key) {
            warn!("Key down '{}' failed: {:#}", self.key, e);
        }
    }

    fn release(&self) {
        if let Err(e) = self.sink.key_up(&self.key) {
            warn!("Key up '{}' failed: {:#}", self.key, e);
        }
    }
}

/// Sink that only logs, for exercising bindings without touching the OS
#[derive(Debug, Default)]
pub struct ConsoleKeys;

impl KeySink for ConsoleKeys {
    fn key_down(&self, key: &str) -> Result<()> {
        info!("⌨️  key down: {}", key);
        Ok(())
    }

    fn key_up(&self, key: &str) -> Result<()> {
        info!("⌨️  key up:   {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        log: Mutex<Vec<String>>,
    }

    impl KeySink for RecordingSink {
        fn key_down(&self, key: &str) -> Result<()> {
            self.log.lock().unwrap().push(format!("down {}", key));
            Ok(())
        }

        fn key_up(&self, key: &str) -> Result<()> {
            self.log.lock().unwrap().push(format!("up {}", key));
            Ok(())
        }
    }

    struct FailingSink;

    impl KeySink for FailingSink {
        fn key_down(&self, _key: &str) -> Result<()> {
            anyhow::bail!("injection unavailable")
        }

        fn key_up(&self, _key: &str) -> Result<()> {
            anyhow::bail!("injection unavailable")
        }
    }

    #[test]
    fn test_binding_forwards_key_to_sink() {
        let sink = Arc::new(RecordingSink::default());
        let binding = KeyBinding::new("ctrl+c", sink.clone() as Arc<dyn KeySink>);

        binding.press();
        binding.release();
        binding.press();

        assert_eq!(
            *sink.log.lock().unwrap(),
            vec!["down ctrl+c", "up ctrl+c", "down ctrl+c"]
        );
    }

    #[test]
    fn test_sink_failure_does_not_panic() {
        let binding = KeyBinding::new("a", Arc::new(FailingSink));

        binding.press();
        binding.release();
    }

    #[test]
    fn test_console_sink_accepts_everything() {
        let sink = ConsoleKeys;
        assert!(sink.key_down("f1").is_ok());
        assert!(sink.key_up("f1").is_ok());
    }
}
