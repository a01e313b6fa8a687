//! Tuning knobs for def-map construction and the project updater.

/// Configuration for [`ProjectResolutionState`](crate::ProjectResolutionState)
/// and the collector.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DefMapConfig {
    /// Hard cap on collector passes. Reaching it stops collection with a
    /// diagnostic instead of looping on malformed input.
    pub max_fixed_point_iterations: usize,
    /// Maximum nesting of macro calls produced by macro expansion.
    pub max_macro_depth: usize,
    /// Rebuild independent crates on a thread pool.
    pub parallel: bool,
    /// Pool size; `None` lets rayon decide.
    pub num_threads: Option<usize>,
    /// Verify holder freshness right after every build.
    pub debug_checks: bool,
}

impl Default for DefMapConfig {
    fn default() -> Self {
        Self {
            max_fixed_point_iterations: 128,
            max_macro_depth: 64,
            parallel: true,
            num_threads: None,
            debug_checks: cfg!(debug_assertions),
        }
    }
}

impl DefMapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_fixed_point_iterations(mut self, passes: usize) -> Self {
        self.max_fixed_point_iterations = passes;
        self
    }

    pub fn with_max_macro_depth(mut self, depth: usize) -> Self {
        self.max_macro_depth = depth;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_num_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    pub fn with_debug_checks(mut self, enabled: bool) -> Self {
        self.debug_checks = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = DefMapConfig::new().with_parallel(false).with_max_fixed_point_iterations(4);
        assert!(!config.parallel);
        assert_eq!(config.max_fixed_point_iterations, 4);
        assert_eq!(config.max_macro_depth, 64);
        assert_eq!(config.num_threads, None);
    }
}
