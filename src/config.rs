//! Runtime configuration assembled from command-line flags.

/// Settings that shape the acquisition engine and debug logging.
///
/// Built once in `main` from clap matches and passed down; never read from
/// globals.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of records fetched synchronously when following starts.
    pub tail: usize,
    /// Disable backward back-fill entirely.
    pub noload: bool,
    /// Back-fill window size in seconds.
    pub time_shift: i64,
    /// Write debug output to the temp-dir log file.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tail: 1_000,
            noload: false,
            time_shift: 24 * 60 * 60,
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_flags() {
        let config = Config::default();
        assert_eq!(config.tail, 1_000);
        assert_eq!(config.time_shift, 86_400);
        assert!(!config.noload);
        assert!(!config.debug);
    }
}
