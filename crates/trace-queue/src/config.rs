use thiserror::Error;

/// Default number of trace batches held before overwriting starts.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Error types for queue construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// A queue must be able to hold at least one item.
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,
}

/// Configuration for a [`TraceQueue`](crate::TraceQueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of items held at once.
    pub capacity: usize,
}

impl QueueConfig {
    /// Creates a new configuration with the given capacity.
    pub const fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Sets the capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Checks that the configuration describes a usable queue.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(QueueConfig::default().capacity, 1000);
        assert!(QueueConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            QueueConfig::default().with_capacity(0).validate(),
            Err(QueueError::ZeroCapacity)
        );
    }
}
