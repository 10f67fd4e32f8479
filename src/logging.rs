use tracing::Level;

/// Install the global fmt subscriber. Later calls are ignored.
pub fn init(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok()
}
