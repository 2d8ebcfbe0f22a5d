//! Configuration for the sync engine.

/// Configuration for a sync engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Store key holding the serialized operation queue.
    pub queue_key: String,
    /// Store key holding the persisted manual-offline flag.
    pub offline_flag_key: String,
    /// Collection holding ledger entries.
    pub entries_collection: String,
    /// Collection holding per-owner settings documents.
    pub settings_collection: String,
    /// Failed attempts before an operation is dropped from the queue.
    pub retry_limit: u32,
}

impl EngineConfig {
    /// Creates a configuration with the default keys and retry ceiling.
    pub fn new() -> Self {
        Self {
            queue_key: "sync_queue".to_string(),
            offline_flag_key: "manual_offline_mode".to_string(),
            entries_collection: "entries".to_string(),
            settings_collection: "users".to_string(),
            retry_limit: 3,
        }
    }

    /// Sets the store key for the persisted queue.
    pub fn with_queue_key(mut self, key: impl Into<String>) -> Self {
        self.queue_key = key.into();
        self
    }

    /// Sets the store key for the manual-offline flag.
    pub fn with_offline_flag_key(mut self, key: impl Into<String>) -> Self {
        self.offline_flag_key = key.into();
        self
    }

    /// Sets the entries collection name.
    pub fn with_entries_collection(mut self, collection: impl Into<String>) -> Self {
        self.entries_collection = collection.into();
        self
    }

    /// Sets the settings collection name.
    pub fn with_settings_collection(mut self, collection: impl Into<String>) -> Self {
        self.settings_collection = collection.into();
        self
    }

    /// Sets the retry ceiling.
    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keys() {
        let config = EngineConfig::new();
        assert_eq!(config.queue_key, "sync_queue");
        assert_eq!(config.offline_flag_key, "manual_offline_mode");
        assert_eq!(config.entries_collection, "entries");
        assert_eq!(config.settings_collection, "users");
        assert_eq!(config.retry_limit, 3);
    }

    #[test]
    fn builder() {
        let config = EngineConfig::new()
            .with_queue_key("queue_v2")
            .with_entries_collection("ledger")
            .with_retry_limit(5);

        assert_eq!(config.queue_key, "queue_v2");
        assert_eq!(config.entries_collection, "ledger");
        assert_eq!(config.retry_limit, 5);
    }
}
