use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::timer::{PausableTimer, Tick};

/// Fade ramp tick rate. The tick granularity of the ramps, not a
/// frame-sync requirement: alpha advances linearly in wall-clock time, so
/// draw cadence does not affect fade speed.
pub const TICKS_PER_SEC: u64 = 60;

const TICK_PERIOD: Duration = Duration::from_micros(1_000_000 / TICKS_PER_SEC);

/// The global blend alpha in [0, 1], shared between the fade scheduler
/// (writer, timer threads) and the compositor (reader, draw thread).
/// f32 bits in an atomic word; no lock on either side.
pub struct BlendAlpha(AtomicU32);

impl BlendAlpha {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.clamp(0.0, 1.0).to_bits()))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, value: f32) {
        self.0
            .store(value.clamp(0.0, 1.0).to_bits(), Ordering::Release);
    }
}

/// Which ramp, if any, is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FadePhase {
    Idle = 0,
    FadingIn = 1,
    FadingOut = 2,
}

struct PhaseCell(AtomicU8);

impl PhaseCell {
    fn set(&self, phase: FadePhase) {
        self.0.store(phase as u8, Ordering::Release);
    }

    fn get(&self) -> FadePhase {
        match self.0.load(Ordering::Acquire) {
            1 => FadePhase::FadingIn,
            2 => FadePhase::FadingOut,
            _ => FadePhase::Idle,
        }
    }

    /// Drop back to Idle only if the given ramp is still the active one.
    fn finish(&self, phase: FadePhase) {
        let _ = self.0.compare_exchange(
            phase as u8,
            FadePhase::Idle as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Drives the blend alpha over wall-clock time, independent of frame
/// rate. Each direction owns its own [`PausableTimer`]; re-invoking a
/// direction cancels its in-flight ramp, and opposite ramps may overlap
/// (a fade-out simply starts decreasing from whatever alpha the fade-in
/// has reached).
pub struct FadeScheduler {
    alpha: Arc<BlendAlpha>,
    phase: Arc<PhaseCell>,
    fade_in: Mutex<PausableTimer>,
    fade_out: Mutex<PausableTimer>,
}

impl FadeScheduler {
    pub fn new(alpha: Arc<BlendAlpha>) -> Self {
        Self {
            alpha,
            phase: Arc::new(PhaseCell(AtomicU8::new(FadePhase::Idle as u8))),
            fade_in: Mutex::new(PausableTimer::new()),
            fade_out: Mutex::new(PausableTimer::new()),
        }
    }

    pub fn alpha(&self) -> &Arc<BlendAlpha> {
        &self.alpha
    }

    pub fn phase(&self) -> FadePhase {
        self.phase.get()
    }

    /// After `delay_ms`, ramp alpha from 0 toward 1 over `duration_ms`,
    /// clamping at 1.
    pub fn begin_fade_in(&self, delay_ms: u64, duration_ms: u64) {
        let step = per_tick_step(duration_ms);
        self.alpha.set(0.0);
        self.phase.set(FadePhase::FadingIn);

        let alpha = self.alpha.clone();
        let phase = self.phase.clone();
        let mut timer = self.fade_in.lock().unwrap_or_else(|e| e.into_inner());
        timer.schedule_repeating(Duration::from_millis(delay_ms), TICK_PERIOD, move || {
            let next = (alpha.get() + step).min(1.0);
            alpha.set(next);
            if next >= 1.0 {
                phase.finish(FadePhase::FadingIn);
                Tick::Stop
            } else {
                Tick::Continue
            }
        });
    }

    /// Ramp alpha from its current value toward 0 over `duration_ms`,
    /// clamping at 0.
    pub fn begin_fade_out(&self, duration_ms: u64) {
        let step = per_tick_step(duration_ms);
        self.phase.set(FadePhase::FadingOut);

        let alpha = self.alpha.clone();
        let phase = self.phase.clone();
        let mut timer = self.fade_out.lock().unwrap_or_else(|e| e.into_inner());
        timer.schedule_repeating(Duration::ZERO, TICK_PERIOD, move || {
            let next = (alpha.get() - step).max(0.0);
            alpha.set(next);
            if next <= 0.0 {
                phase.finish(FadePhase::FadingOut);
                Tick::Stop
            } else {
                Tick::Continue
            }
        });
    }

    /// Stop both ramps. Alpha stays at whatever value it reached.
    pub fn cancel_all(&self) {
        self.fade_in
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
        self.fade_out
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
        self.phase.set(FadePhase::Idle);
    }

    /// Reset the timeline for a new data source: ramps canceled, alpha
    /// restored to fully opaque.
    pub fn reset(&self) {
        self.cancel_all();
        self.alpha.set(1.0);
    }
}

/// Alpha increment per tick for a linear ramp completing in
/// `duration_ms`: 1000 / (duration × ticks-per-second).
fn per_tick_step(duration_ms: u64) -> f32 {
    1000.0 / (duration_ms.max(1) as f32 * TICKS_PER_SEC as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn scheduler() -> FadeScheduler {
        FadeScheduler::new(Arc::new(BlendAlpha::new(1.0)))
    }

    #[test]
    fn blend_alpha_clamps() {
        let a = BlendAlpha::new(0.5);
        a.set(1.7);
        assert_eq!(a.get(), 1.0);
        a.set(-0.3);
        assert_eq!(a.get(), 0.0);
    }

    #[test]
    fn per_tick_step_matches_linear_ramp() {
        // 60 ticks/sec × step must cover 1.0 in duration_ms.
        let step = per_tick_step(500);
        let ticks_in_duration = 500.0 / 1000.0 * TICKS_PER_SEC as f32;
        assert!((step * ticks_in_duration - 1.0).abs() < 1e-4);
    }

    #[test]
    fn fade_in_is_monotonic_and_reaches_one() {
        let fades = scheduler();
        fades.begin_fade_in(0, 150);
        assert_eq!(fades.phase(), FadePhase::FadingIn);

        let mut last = 0.0f32;
        for _ in 0..20 {
            thread::sleep(Duration::from_millis(20));
            let a = fades.alpha().get();
            assert!(a >= last, "alpha regressed: {a} < {last}");
            last = a;
        }
        assert_eq!(fades.alpha().get(), 1.0);
        assert_eq!(fades.phase(), FadePhase::Idle);
    }

    #[test]
    fn fade_out_reaches_zero() {
        let fades = scheduler();
        fades.alpha().set(1.0);
        fades.begin_fade_out(150);
        thread::sleep(Duration::from_millis(400));
        assert_eq!(fades.alpha().get(), 0.0);
        assert_eq!(fades.phase(), FadePhase::Idle);
    }

    #[test]
    fn fade_in_honors_delay() {
        let fades = scheduler();
        fades.begin_fade_in(150, 100);
        thread::sleep(Duration::from_millis(50));
        // Still inside the delay: alpha pinned at 0.
        assert_eq!(fades.alpha().get(), 0.0);
        thread::sleep(Duration::from_millis(400));
        assert_eq!(fades.alpha().get(), 1.0);
    }

    #[test]
    fn fade_out_starts_from_current_alpha() {
        let fades = scheduler();
        fades.begin_fade_in(0, 400);
        thread::sleep(Duration::from_millis(120));
        let mid = fades.alpha().get();
        assert!(mid > 0.0 && mid < 1.0, "expected mid-ramp, got {mid}");

        fades.begin_fade_out(100);
        thread::sleep(Duration::from_millis(30));
        // No forced synchronization point: the fade-out begins from
        // wherever the fade-in had gotten, so alpha never exceeds a value
        // much above the handoff point.
        assert!(fades.alpha().get() <= mid + 0.15);
        thread::sleep(Duration::from_millis(400));
        assert_eq!(fades.alpha().get(), 0.0);
    }

    #[test]
    fn restarting_fade_in_cancels_prior_ramp() {
        let fades = scheduler();
        fades.begin_fade_in(0, 100);
        thread::sleep(Duration::from_millis(40));
        fades.begin_fade_in(0, 400);
        // Restart resets to 0 and ramps on the new schedule.
        thread::sleep(Duration::from_millis(60));
        let a = fades.alpha().get();
        assert!(a < 0.5, "expected restarted slow ramp, got {a}");
    }

    #[test]
    fn cancel_all_freezes_alpha() {
        let fades = scheduler();
        fades.begin_fade_in(0, 300);
        thread::sleep(Duration::from_millis(80));
        fades.cancel_all();
        let frozen = fades.alpha().get();
        thread::sleep(Duration::from_millis(150));
        assert_eq!(fades.alpha().get(), frozen);
        assert_eq!(fades.phase(), FadePhase::Idle);
    }

    #[test]
    fn zero_duration_snaps_to_bound() {
        let fades = scheduler();
        fades.begin_fade_in(0, 0);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(fades.alpha().get(), 1.0);
    }

    #[test]
    fn reset_restores_opaque() {
        let fades = scheduler();
        fades.begin_fade_out(50);
        thread::sleep(Duration::from_millis(150));
        fades.reset();
        assert_eq!(fades.alpha().get(), 1.0);
        assert_eq!(fades.phase(), FadePhase::Idle);
    }
}
