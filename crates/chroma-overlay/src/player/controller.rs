use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::OverlayOptions;
use crate::error::DataSourceError;
use crate::frame::FrameSurface;
use crate::timing::{FadeScheduler, PausableTimer};

use super::backend::MediaBackend;
use super::types::{PlayerState, VideoMetadata};

type Notify = Arc<dyn Fn() + Send + Sync>;

/// Orchestrates decoder readiness, surface readiness, transport
/// transitions, and fade scheduling.
///
/// Events delivered in states where the transition is undefined are
/// silently ignored; that permissiveness is deliberate, not an error
/// path. `Released` is terminal — afterwards every event is a no-op and
/// no timer task touches compositor state again.
///
/// The state lives behind a mutex because decoder callbacks
/// ([`on_prepared`](Self::on_prepared), [`on_completed`](Self::on_completed))
/// and the deferred fade-out task arrive on threads the controller does
/// not own; every transition is applied atomically.
pub struct PlaybackController<B: MediaBackend> {
    inner: Arc<Mutex<Inner<B>>>,
}

struct Inner<B> {
    backend: B,
    state: PlayerState,
    options: OverlayOptions,
    fades: Arc<FadeScheduler>,
    fade_out_timer: PausableTimer,
    surface_ready: bool,
    source_set: bool,
    metadata: Option<VideoMetadata>,
    /// Playback position at which the fade-out ramp starts
    /// (duration − fade_out_lead).
    fade_out_trigger_ms: u64,
    /// Prepare was issued with the intent to start once ready.
    pending_start: bool,
    on_started: Option<Notify>,
    on_ended: Option<Notify>,
}

impl<B: MediaBackend + 'static> PlaybackController<B> {
    pub fn new(backend: B, options: OverlayOptions, fades: Arc<FadeScheduler>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                backend,
                state: PlayerState::NotPrepared,
                options,
                fades,
                fade_out_timer: PausableTimer::new(),
                surface_ready: false,
                source_set: false,
                metadata: None,
                fade_out_trigger_ms: 0,
                pending_start: false,
                on_started: None,
                on_ended: None,
            })),
        }
    }

    pub fn set_on_video_started(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.lock().on_started = Some(Arc::new(callback));
    }

    pub fn set_on_video_ended(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.lock().on_ended = Some(Arc::new(callback));
    }

    /// The compositor has produced a drawable surface. Second of the two
    /// readiness prerequisites to arrive triggers `prepare`.
    pub fn surface_ready(&self, surface: FrameSurface) -> Result<(), DataSourceError> {
        let mut inner = self.lock();
        if inner.state == PlayerState::Released {
            return Ok(());
        }
        inner.backend.attach_surface(surface);
        inner.surface_ready = true;
        if inner.source_set {
            inner.issue_prepare()?;
        }
        Ok(())
    }

    /// A data source with known duration/dimensions has been attached to
    /// the backend. Resets the fade timeline and computes the fade-out
    /// trigger time.
    pub fn set_data_source(&self, metadata: VideoMetadata) -> Result<(), DataSourceError> {
        let mut inner = self.lock();
        if inner.state == PlayerState::Released {
            return Ok(());
        }
        inner.fade_out_trigger_ms = metadata
            .duration_ms
            .saturating_sub(inner.options.fade_out_lead_ms);
        inner.metadata = Some(metadata);
        inner.source_set = true;
        let looping = inner.options.looping;
        inner.backend.set_looping(looping);
        inner.fades.reset();
        log::debug!(
            "data source set: {}x{} {}ms, fade-out at {}ms",
            metadata.width,
            metadata.height,
            metadata.duration_ms,
            inner.fade_out_trigger_ms
        );
        if inner.surface_ready {
            inner.issue_prepare()?;
        }
        Ok(())
    }

    /// Decoder reports asynchronous preparation finished.
    pub fn on_prepared(&self) {
        let notify = {
            let mut inner = self.lock();
            if !matches!(
                inner.state,
                PlayerState::NotPrepared | PlayerState::Stopped
            ) {
                return;
            }
            inner.state = PlayerState::Prepared;
            if inner.pending_start {
                inner.pending_start = false;
                inner.begin_playback()
            } else {
                None
            }
        };
        if let Some(f) = notify {
            f();
        }
    }

    /// Decoder reports end-of-stream. Modeled as pause rather than stop
    /// so a subsequent `start` resumes instead of re-preparing.
    pub fn on_completed(&self) {
        let notify = {
            let mut inner = self.lock();
            if inner.state != PlayerState::Started {
                return;
            }
            inner.state = PlayerState::Paused;
            inner.on_ended.clone()
        };
        if let Some(f) = notify {
            f();
        }
    }

    pub fn start(&self) -> Result<(), DataSourceError> {
        let notify = {
            let mut inner = self.lock();
            match inner.state {
                PlayerState::Prepared => inner.begin_playback(),
                PlayerState::Paused => {
                    inner.backend.start();
                    inner.state = PlayerState::Started;
                    inner.fade_out_timer.resume();
                    None
                }
                PlayerState::Stopped => {
                    inner.issue_prepare()?;
                    None
                }
                _ => None,
            }
        };
        if let Some(f) = notify {
            f();
        }
        Ok(())
    }

    pub fn pause(&self) {
        let mut inner = self.lock();
        if inner.state == PlayerState::Started {
            inner.backend.pause();
            inner.state = PlayerState::Paused;
            inner.fade_out_timer.pause();
        }
    }

    pub fn stop(&self) {
        let mut inner = self.lock();
        if matches!(inner.state, PlayerState::Started | PlayerState::Paused) {
            inner.backend.stop();
            inner.state = PlayerState::Stopped;
            inner.fade_out_timer.cancel();
            inner.fades.cancel_all();
        }
    }

    pub fn reset(&self) {
        let mut inner = self.lock();
        if matches!(
            inner.state,
            PlayerState::Started | PlayerState::Paused | PlayerState::Stopped
        ) {
            inner.backend.reset();
            inner.state = PlayerState::NotPrepared;
            inner.fade_out_timer.cancel();
        }
    }

    /// Release decoder resources and cancel every in-flight timer task.
    /// Terminal: the blend alpha freezes at its current value.
    pub fn release(&self) {
        let mut inner = self.lock();
        if inner.state == PlayerState::Released {
            return;
        }
        inner.fade_out_timer.cancel();
        inner.fades.cancel_all();
        inner.backend.release();
        inner.state = PlayerState::Released;
        log::debug!("playback released");
    }

    /// Seek and reschedule the deferred fade-out relative to the new
    /// position. Valid while started or paused; otherwise a no-op.
    pub fn seek(&self, position_ms: u64) {
        let mut inner = self.lock();
        if !matches!(inner.state, PlayerState::Started | PlayerState::Paused) {
            return;
        }
        inner.backend.seek(position_ms);
        inner.arm_fade_out_timer(position_ms);
        if inner.state == PlayerState::Paused {
            inner.fade_out_timer.pause();
        }
    }

    pub fn state(&self) -> PlayerState {
        self.lock().state
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlayerState::Started
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PlayerState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == PlayerState::Stopped
    }

    pub fn is_released(&self) -> bool {
        self.state() == PlayerState::Released
    }

    pub fn position_ms(&self) -> u64 {
        let inner = self.lock();
        if inner.state == PlayerState::Released {
            0
        } else {
            inner.backend.position_ms()
        }
    }

    pub fn set_looping(&self, looping: bool) {
        let mut inner = self.lock();
        if inner.state == PlayerState::Released {
            return;
        }
        inner.options.looping = looping;
        inner.backend.set_looping(looping);
    }

    fn lock(&self) -> MutexGuard<'_, Inner<B>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<B: MediaBackend> Inner<B> {
    /// Kick off async preparation with auto-start intent. On failure the
    /// session stays where it is (`NotPrepared`/`Stopped`); retrying is
    /// the caller's responsibility.
    fn issue_prepare(&mut self) -> Result<(), DataSourceError> {
        self.pending_start = true;
        self.backend.prepare().inspect_err(|e| {
            self.pending_start = false;
            log::error!("prepare failed: {e}");
        })
    }

    /// Prepared → Started: start the decoder, begin the fade-in, and arm
    /// the deferred fade-out. Returns the started notification to fire
    /// once the state lock is dropped.
    fn begin_playback(&mut self) -> Option<Notify> {
        self.backend.start();
        self.state = PlayerState::Started;
        self.fades.begin_fade_in(
            self.options.fade_in_delay_ms,
            self.options.fade_in_duration_ms,
        );
        let position = self.backend.position_ms();
        self.arm_fade_out_timer(position);
        self.on_started.clone()
    }

    fn arm_fade_out_timer(&mut self, position_ms: u64) {
        let delay = self.fade_out_trigger_ms.saturating_sub(position_ms);
        let fades = self.fades.clone();
        let duration = self.options.fade_out_duration_ms;
        self.fade_out_timer
            .schedule(Duration::from_millis(delay), move || {
                fades.begin_fade_out(duration);
            });
    }
}
