//! Runtime configuration.

/// Sizing policy of a monitor map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapConfig {
    /// Smallest table capacity; the table never shrinks below it.
    pub min_capacity: usize,
    /// Load factor at which the table doubles.
    pub grow_load: f64,
    /// Load factor at which the table halves.
    pub shrink_load: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            min_capacity: 16,
            grow_load: 0.75,
            shrink_load: 0.10,
        }
    }
}

impl MapConfig {
    /// Normalizes the policy: power-of-two capacity of at least 4, a grow
    /// load in `[0.25, 0.9]` and a shrink load below half the grow load.
    #[must_use]
    pub fn validated(self) -> Self {
        let min_capacity = self.min_capacity.max(4).next_power_of_two();
        let grow_load = if self.grow_load.is_finite() {
            self.grow_load.clamp(0.25, 0.9)
        } else {
            0.75
        };
        let shrink_load = if self.shrink_load.is_finite() {
            self.shrink_load.clamp(0.0, grow_load / 2.0 - 0.01)
        } else {
            0.10
        };
        Self {
            min_capacity,
            grow_load,
            shrink_load,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub(crate) fn grow_threshold(&self, capacity: usize) -> usize {
        ((capacity as f64 * self.grow_load) as usize).clamp(1, capacity - 1)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub(crate) fn shrink_threshold(&self, capacity: usize) -> usize {
        (capacity as f64 * self.shrink_load) as usize
    }
}

/// Configuration shared by the local wrappers of a synchronous set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfig {
    /// Sizing of every monitor map.
    pub map: MapConfig,
}

/// Configuration of a [`SyncSetWorker`](crate::wrapper::SyncSetWorker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Maximum queued messages before `try_import` reports backpressure.
    pub queue_capacity: usize,
    /// Name of the worker thread.
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            thread_name: "rvmon-syncset".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_config_defaults() {
        let config = MapConfig::default();
        assert_eq!(config.min_capacity, 16);
        assert_eq!(config.validated(), config);
        assert_eq!(config.grow_threshold(16), 12);
        assert_eq!(config.shrink_threshold(32), 3);
    }

    #[test]
    fn test_map_config_validated_normalizes() {
        let config = MapConfig {
            min_capacity: 10,
            grow_load: 2.0,
            shrink_load: f64::NAN,
        }
        .validated();
        assert_eq!(config.min_capacity, 16);
        assert!((config.grow_load - 0.9).abs() < f64::EPSILON);
        assert!((config.shrink_load - 0.10).abs() < f64::EPSILON);

        let tiny = MapConfig {
            min_capacity: 0,
            ..MapConfig::default()
        }
        .validated();
        assert_eq!(tiny.min_capacity, 4);
    }

    #[test]
    fn test_grow_threshold_leaves_a_free_slot() {
        let config = MapConfig {
            min_capacity: 4,
            grow_load: 0.9,
            shrink_load: 0.0,
        };
        assert!(config.grow_threshold(4) < 4);
    }

    #[test]
    fn test_worker_config_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.queue_capacity, 1024);
        assert!(!config.thread_name.is_empty());
    }
}
