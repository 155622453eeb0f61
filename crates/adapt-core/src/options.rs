//! Behavior flags for a pipeline run.

/// Options tweaking [`crate::migrate`].
///
/// Logging is not an option here: everything the engine emits goes through
/// the `log` facade, so the embedder's logger configuration decides routing,
/// verbosity, and silence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub(crate) disable_hash_integrity_checks: bool,
    pub(crate) disable_driver_locks: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip comparing stored script hashes against the local ones.
    ///
    /// The check protects against edits to already-applied scripts; disable
    /// it with caution.
    pub fn disable_hash_integrity_checks(mut self) -> Self {
        self.disable_hash_integrity_checks = true;
        self
    }

    /// Never acquire a driver lock, even when the driver supports locking.
    pub fn disable_driver_locks(mut self) -> Self {
        self.disable_driver_locks = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_all_protections_on() {
        let opts = Options::new();
        assert!(!opts.disable_hash_integrity_checks);
        assert!(!opts.disable_driver_locks);
    }

    #[test]
    fn builders_set_their_flag_only() {
        let opts = Options::new().disable_driver_locks();
        assert!(opts.disable_driver_locks);
        assert!(!opts.disable_hash_integrity_checks);

        let opts = Options::new().disable_hash_integrity_checks();
        assert!(opts.disable_hash_integrity_checks);
        assert!(!opts.disable_driver_locks);
    }
}
