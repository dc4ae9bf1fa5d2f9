use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock the session runs on. Timestamps are nanoseconds since the
/// timer was created.
pub trait Timer: Clone + Send + Sync {
    fn now(&self) -> u64;
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn sleep(&self, d: Duration);
    fn record_frame(&mut self, d: Duration);
    fn frame_stats(&self) -> FrameStats;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub frames: usize,
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

/// Bounded ring of recent frame durations
#[derive(Debug, Clone)]
pub struct FrameLog {
    frame_times: Vec<Duration>,
    max_samples: usize,
}

impl FrameLog {
    pub fn new(max_samples: usize) -> Self {
        Self {
            frame_times: Vec::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn record(&mut self, d: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.remove(0);
        }
        self.frame_times.push(d);
    }

    pub fn len(&self) -> usize {
        self.frame_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_times.is_empty()
    }

    pub fn stats(&self) -> FrameStats {
        let times: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        if times.is_empty() {
            return FrameStats::default();
        }
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        FrameStats {
            frames: times.len(),
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

impl Default for FrameLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Wall-clock timer with platform-specific sleeps
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
    pub frames: FrameLog,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
    fn record_frame(&mut self, d: Duration) {
        self.frames.record(d);
    }
    fn frame_stats(&self) -> FrameStats {
        self.frames.stats()
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frames: FrameLog::default(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(target_os = "macos")]
        self.macos_sleep(duration);
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }

    #[cfg(target_os = "macos")]
    fn macos_sleep(&self, duration: Duration) {
        use mach2::mach_time::{mach_absolute_time, mach_timebase_info, mach_timebase_info_data_t};

        // Spin for very short waits, the scheduler overshoots them
        if duration.as_nanos() < 100_000 {
            unsafe {
                let start = mach_absolute_time();
                let mut timebase = mach_timebase_info_data_t { numer: 0, denom: 0 };
                mach_timebase_info(&mut timebase);

                let target_ticks =
                    duration.as_nanos() as u64 * timebase.denom as u64 / timebase.numer as u64;

                while mach_absolute_time() - start < target_ticks {
                    std::hint::spin_loop();
                }
            }
        } else {
            std::thread::sleep(duration);
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Clock that only moves when told to. Clones share the same reading, so a
/// test can keep one handle while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
    frames: FrameLog,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ns: u64) {
        self.now_ns.store(ns, Ordering::SeqCst);
    }

    pub fn set_secs(&self, secs: f64) {
        self.set((secs * 1e9).round() as u64);
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
    fn record_frame(&mut self, d: Duration) {
        self.frames.record(d);
    }
    fn frame_stats(&self) -> FrameStats {
        self.frames.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_clones_share_time() {
        let timer = ManualTimer::new();
        let handle = timer.clone();
        handle.advance(Duration::from_millis(250));
        assert_eq!(timer.now(), 250_000_000);
        timer.sleep(Duration::from_millis(750));
        assert_eq!(handle.now(), 1_000_000_000);
        assert_eq!(timer.elapsed(400_000_000), Duration::from_millis(600));
        assert_eq!(timer.elapsed(2_000_000_000), Duration::ZERO);
    }

    #[test]
    fn frame_stats_summarise_recorded_frames() {
        let mut timer = ManualTimer::new();
        assert_eq!(timer.frame_stats(), FrameStats::default());
        timer.record_frame(Duration::from_millis(10));
        timer.record_frame(Duration::from_millis(20));
        let stats = timer.frame_stats();
        assert_eq!(stats.frames, 2);
        assert!((stats.average_frame_time_ns - 15e6).abs() < 1.0);
        assert!((stats.jitter_ns - 5e6).abs() < 1.0);
        assert_eq!(stats.min_frame_time_ns, 10e6);
        assert_eq!(stats.max_frame_time_ns, 20e6);
        assert!((stats.effective_fps - 1e9 / 15e6).abs() < 1e-6);
    }

    #[test]
    fn frame_log_drops_oldest_samples() {
        let mut log = FrameLog::new(2);
        log.record(Duration::from_millis(1));
        log.record(Duration::from_millis(2));
        log.record(Duration::from_millis(3));
        assert_eq!(log.len(), 2);
        assert_eq!(log.stats().min_frame_time_ns, 2e6);
    }

    #[test]
    fn high_precision_timer_moves_forward() {
        let timer = HighPrecisionTimer::new();
        let before = timer.now();
        timer.sleep(Duration::from_millis(2));
        assert!(timer.elapsed(before) >= Duration::from_millis(2));
    }
}
