use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// 4x4 column-major texture-coordinate transform supplied with each frame
/// (crop/flip from the decoder). Identity when the decoder has none.
pub type TexTransform = [[f32; 4]; 4];

pub const IDENTITY_TRANSFORM: TexTransform = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// A decoded frame ready for GPU upload.
pub struct DecodedFrame {
    pub data: Vec<u8>, // RGBA8
    pub width: u32,
    pub height: u32,
}

/// Single-slot mailbox between the decoder thread(s) and the draw thread.
///
/// A publish overwrites any pending frame (no queue); the draw thread
/// drains the slot exactly once per draw. The payload sits behind a mutex
/// so a write and the drain never tear, and the dirty flag is atomic so
/// the draw thread can skip the lock on quiet frames.
pub struct FrameSlot {
    dirty: AtomicBool,
    pending: Mutex<Option<(DecodedFrame, TexTransform)>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            dirty: AtomicBool::new(false),
            pending: Mutex::new(None),
        }
    }

    /// Store a frame, replacing any pending one. Never blocks on GPU work.
    pub fn publish(&self, frame: DecodedFrame, transform: TexTransform) {
        let mut slot = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some((frame, transform));
        self.dirty.store(true, Ordering::Release);
    }

    /// Take the pending frame, clearing the dirty flag. Returns `None`
    /// when nothing new arrived since the last drain.
    pub fn drain(&self) -> Option<(DecodedFrame, TexTransform)> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return None;
        }
        let mut slot = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        slot.take()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque handle handed to the external decoder. Publishing a frame here
/// is the "frame available" signal; it is safe from any thread and never
/// touches the GPU context.
#[derive(Clone)]
pub struct FrameSurface {
    slot: std::sync::Arc<FrameSlot>,
}

impl FrameSurface {
    pub(crate) fn new(slot: std::sync::Arc<FrameSlot>) -> Self {
        Self { slot }
    }

    pub fn publish(&self, frame: DecodedFrame, transform: TexTransform) {
        self.slot.publish(frame, transform);
    }

    pub fn publish_frame(&self, frame: DecodedFrame) {
        self.slot.publish(frame, IDENTITY_TRANSFORM);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(px: u8) -> DecodedFrame {
        DecodedFrame {
            data: vec![px; 4],
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn empty_slot_drains_nothing() {
        let slot = FrameSlot::new();
        assert!(!slot.is_dirty());
        assert!(slot.drain().is_none());
    }

    #[test]
    fn publish_then_drain_once() {
        let slot = FrameSlot::new();
        slot.publish(frame(7), IDENTITY_TRANSFORM);
        assert!(slot.is_dirty());
        let (f, t) = slot.drain().unwrap();
        assert_eq!(f.data, vec![7; 4]);
        assert_eq!(t, IDENTITY_TRANSFORM);
        // Drained exactly once.
        assert!(!slot.is_dirty());
        assert!(slot.drain().is_none());
    }

    #[test]
    fn late_publish_overwrites_pending() {
        let slot = FrameSlot::new();
        slot.publish(frame(1), IDENTITY_TRANSFORM);
        slot.publish(frame(2), IDENTITY_TRANSFORM);
        let (f, _) = slot.drain().unwrap();
        assert_eq!(f.data, vec![2; 4]);
        assert!(slot.drain().is_none());
    }

    #[test]
    fn surface_publishes_into_shared_slot() {
        let slot = std::sync::Arc::new(FrameSlot::new());
        let surface = FrameSurface::new(slot.clone());
        surface.publish_frame(frame(9));
        assert!(slot.is_dirty());
    }

    #[test]
    fn publish_from_other_thread() {
        let slot = std::sync::Arc::new(FrameSlot::new());
        let surface = FrameSurface::new(slot.clone());
        let handle = std::thread::spawn(move || {
            surface.publish_frame(frame(3));
        });
        handle.join().unwrap();
        assert!(slot.drain().is_some());
    }
}
