use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

/// Whether a repeating task wants another tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

enum Ctrl {
    Pause,
    Resume,
    Cancel,
}

struct Armed {
    ctrl_tx: Sender<Ctrl>,
    _thread: JoinHandle<()>,
}

/// A cancelable deferred-execution primitive that can be paused and
/// resumed without losing its remaining deadline.
///
/// Each `schedule*` call owns one worker thread; scheduling again cancels
/// the previous task (last-writer-wins), so no two tasks from the same
/// timer are ever in flight together. Delays are measured on a monotonic
/// clock: across any pause/resume sequence the cumulative running time
/// before the task fires equals the originally requested delay.
pub struct PausableTimer {
    armed: Option<Armed>,
}

impl PausableTimer {
    pub fn new() -> Self {
        Self { armed: None }
    }

    /// Arm a one-shot task. Fires at most once.
    pub fn schedule<F>(&mut self, delay: Duration, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut task = Some(task);
        self.arm(delay, None, move || {
            if let Some(f) = task.take() {
                f();
            }
            Tick::Stop
        });
    }

    /// Arm a repeating task: first fire after `delay`, then every `period`
    /// until the task returns [`Tick::Stop`] or the timer is canceled.
    pub fn schedule_repeating<F>(&mut self, delay: Duration, period: Duration, task: F)
    where
        F: FnMut() -> Tick + Send + 'static,
    {
        self.arm(delay, Some(period), task);
    }

    fn arm<F>(&mut self, delay: Duration, period: Option<Duration>, task: F)
    where
        F: FnMut() -> Tick + Send + 'static,
    {
        self.cancel();
        let (ctrl_tx, ctrl_rx) = unbounded();
        let thread = thread::Builder::new()
            .name("overlay-timer".into())
            .spawn(move || run_timer(&ctrl_rx, delay, period, task))
            .expect("failed to spawn timer thread");
        self.armed = Some(Armed {
            ctrl_tx,
            _thread: thread,
        });
    }

    /// Freeze the remaining delay. No-op when nothing is armed.
    pub fn pause(&self) {
        if let Some(armed) = &self.armed {
            let _ = armed.ctrl_tx.send(Ctrl::Pause);
        }
    }

    /// Re-arm for exactly the remaining delay recorded by `pause`.
    pub fn resume(&self) {
        if let Some(armed) = &self.armed {
            let _ = armed.ctrl_tx.send(Ctrl::Resume);
        }
    }

    /// Discard the pending task. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(armed) = self.armed.take() {
            let _ = armed.ctrl_tx.send(Ctrl::Cancel);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

impl Default for PausableTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PausableTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run_timer<F>(ctrl_rx: &Receiver<Ctrl>, delay: Duration, period: Option<Duration>, mut task: F)
where
    F: FnMut() -> Tick,
{
    let mut remaining = delay;
    loop {
        if !wait_out(ctrl_rx, &mut remaining) {
            return;
        }
        if task() == Tick::Stop {
            return;
        }
        match period {
            Some(p) => remaining = p,
            None => return,
        }
    }
}

/// Sleep out `remaining`, honoring pause/resume/cancel. Returns false when
/// the timer was canceled (or every handle dropped) before the deadline.
fn wait_out(ctrl_rx: &Receiver<Ctrl>, remaining: &mut Duration) -> bool {
    let mut armed_at = Instant::now();
    loop {
        let elapsed = armed_at.elapsed();
        if elapsed >= *remaining {
            return true;
        }
        match ctrl_rx.recv_timeout(*remaining - elapsed) {
            Err(RecvTimeoutError::Timeout) => return true,
            Ok(Ctrl::Pause) => {
                *remaining = remaining.saturating_sub(armed_at.elapsed());
                // Park until resumed or canceled.
                loop {
                    match ctrl_rx.recv() {
                        Ok(Ctrl::Resume) => break,
                        Ok(Ctrl::Pause) => {}
                        Ok(Ctrl::Cancel) | Err(_) => return false,
                    }
                }
                armed_at = Instant::now();
            }
            // Resume while running changes nothing.
            Ok(Ctrl::Resume) => {}
            Ok(Ctrl::Cancel) | Err(RecvTimeoutError::Disconnected) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter_task(counter: &Arc<AtomicU32>) -> impl FnOnce() + Send + 'static {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn one_shot_fires_once() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timer = PausableTimer::new();
        timer.schedule(Duration::from_millis(20), counter_task(&fired));
        thread::sleep(Duration::from_millis(120));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_before_deadline_suppresses_fire() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timer = PausableTimer::new();
        timer.schedule(Duration::from_millis(60), counter_task(&fired));
        timer.cancel();
        timer.cancel(); // idempotent
        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn pause_preserves_remaining_delay() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timer = PausableTimer::new();
        timer.schedule(Duration::from_millis(120), counter_task(&fired));

        thread::sleep(Duration::from_millis(40));
        timer.pause();
        // Paused: well past the original deadline, nothing fires.
        thread::sleep(Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        timer.resume();
        // ~80ms remain after the pause; not fired immediately...
        thread::sleep(Duration::from_millis(20));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        // ...but fired once the remainder has elapsed.
        thread::sleep(Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reschedule_is_last_writer_wins() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let mut timer = PausableTimer::new();
        timer.schedule(Duration::from_millis(40), counter_task(&first));
        timer.schedule(Duration::from_millis(40), counter_task(&second));
        thread::sleep(Duration::from_millis(150));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeating_stops_on_tick_stop() {
        let ticks = Arc::new(AtomicU32::new(0));
        let mut timer = PausableTimer::new();
        let ticks_in_task = ticks.clone();
        timer.schedule_repeating(
            Duration::from_millis(5),
            Duration::from_millis(5),
            move || {
                let n = ticks_in_task.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= 3 { Tick::Stop } else { Tick::Continue }
            },
        );
        thread::sleep(Duration::from_millis(200));
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn drop_cancels_pending_task() {
        let fired = Arc::new(AtomicU32::new(0));
        {
            let mut timer = PausableTimer::new();
            timer.schedule(Duration::from_millis(40), counter_task(&fired));
        }
        thread::sleep(Duration::from_millis(120));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
