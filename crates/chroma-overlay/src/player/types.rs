/// Playback lifecycle states. `Released` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    NotPrepared,
    Prepared,
    Started,
    Paused,
    Stopped,
    Released,
}

/// Video metadata supplied by the external decoder/metadata provider
/// once a data source is attached. Read-only to this crate.
#[derive(Debug, Clone, Copy)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_equality() {
        assert_eq!(PlayerState::NotPrepared, PlayerState::NotPrepared);
        assert_ne!(PlayerState::Started, PlayerState::Paused);
    }

    #[test]
    fn metadata_is_copy() {
        let meta = VideoMetadata {
            width: 1280,
            height: 720,
            duration_ms: 10_000,
        };
        let copy = meta;
        assert_eq!(copy.duration_ms, meta.duration_ms);
    }
}
