use parking_lot::Mutex;

/// Serializes tests that change the process-wide default configuration
pub(crate) static CONFIG_LOCK: Mutex<()> = Mutex::new(());
