//! Store configuration.

/// Configuration for opening a topic store space.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether every journal append is flushed before the call returns.
    pub sync_on_write: bool,

    /// Minimum number of dead journal records before compaction is considered.
    pub compaction_min_dead: usize,

    /// Fraction of dead records (0.0..=1.0) that triggers compaction.
    pub compaction_ratio: f64,

    /// Whether opening a topic store reconciles pending counts with the
    /// references that survived in subscriber cursors.
    pub reconcile_on_open: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
            compaction_min_dead: 1024,
            compaction_ratio: 0.5,
            reconcile_on_open: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to flush after every journal append.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the dead-record floor for compaction.
    #[must_use]
    pub const fn compaction_min_dead(mut self, records: usize) -> Self {
        self.compaction_min_dead = records;
        self
    }

    /// Sets the dead-record ratio for compaction, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn compaction_ratio(mut self, ratio: f64) -> Self {
        self.compaction_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Sets whether opening a topic store runs reconciliation.
    #[must_use]
    pub const fn reconcile_on_open(mut self, value: bool) -> Self {
        self.reconcile_on_open = value;
        self
    }

    /// Returns whether a journal with `total` records of which `dead` are
    /// superseded should be compacted.
    #[must_use]
    pub fn should_compact(&self, dead: usize, total: usize) -> bool {
        if dead < self.compaction_min_dead || total == 0 {
            return false;
        }
        (dead as f64) / (total as f64) >= self.compaction_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_write);
        assert!(config.reconcile_on_open);
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .create_if_missing(false)
            .sync_on_write(false)
            .compaction_min_dead(8)
            .compaction_ratio(3.0);

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_write);
        assert_eq!(config.compaction_min_dead, 8);
        assert!((config.compaction_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn compaction_threshold() {
        let config = StoreConfig::new()
            .compaction_min_dead(10)
            .compaction_ratio(0.5);

        assert!(!config.should_compact(9, 10));
        assert!(!config.should_compact(10, 30));
        assert!(config.should_compact(10, 20));
        assert!(!config.should_compact(0, 0));
    }
}
