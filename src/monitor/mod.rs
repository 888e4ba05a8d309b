//! Runtime performance monitor
//!
//! Fed one [`FrameTick`] per rendered frame. Frames and memory samples go
//! into bounded rings. On a fixed evaluation cadence the trailing window is
//! reduced to a [`PerformanceSnapshot`] and checked against the current
//! tier's [`DegradeThresholds`]:
//!
//! - every breached indicator produces a [`PerformanceWarning`]
//! - two or more breaches at once produce a [`DegradationSignal`]
//!
//! A single noisy indicator therefore never asks for a downgrade.

pub mod window;

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::MonitorConfig;
use crate::registry::DegradeThresholds;
use window::RingBuffer;

const FRAME_CAPACITY: usize = 512;
const FPS_HISTORY: usize = 60;
const MEMORY_HISTORY: usize = 32;

/// One rendered frame as reported by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub at: Instant,
    /// Time spent rendering this frame
    pub render_time: Duration,
    /// Process memory estimate, when the host can provide one
    pub memory_mb: Option<f64>,
}

impl FrameTick {
    pub fn new(at: Instant, render_time: Duration) -> Self {
        Self {
            at,
            render_time,
            memory_mb: None,
        }
    }

    pub fn with_memory(mut self, memory_mb: f64) -> Self {
        self.memory_mb = Some(memory_mb);
        self
    }
}

/// Signals checked against the tier thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Indicator {
    LowFps,
    HighRenderTime,
    HighMemory,
}

/// Derived view of the trailing window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceSnapshot {
    pub avg_fps: f32,
    pub min_fps: f32,
    pub max_fps: f32,
    pub avg_render_ms: f32,
    pub memory_mb: Option<f64>,
    pub frames_in_window: usize,
}

/// A single indicator outside its threshold
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceWarning {
    pub indicator: Indicator,
    pub observed: f64,
    pub threshold: f64,
    pub at: Instant,
}

/// Two or more indicators breached in the same evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct DegradationSignal {
    pub indicators: Vec<Indicator>,
    pub snapshot: PerformanceSnapshot,
    pub at: Instant,
}

/// Outcome of one tick; empty unless an evaluation ran and found breaches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorReport {
    pub warnings: Vec<PerformanceWarning>,
    pub degradation: Option<DegradationSignal>,
}

impl MonitorReport {
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.degradation.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
struct FrameSample {
    at: Instant,
    render_ms: f32,
}

#[derive(Debug, Clone, Copy)]
struct MemorySample {
    at: Instant,
    mb: f64,
}

/// Identifies a registered monitor listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type WarningListener = Arc<dyn Fn(&PerformanceWarning) + Send + Sync>;
type DegradationListener = Arc<dyn Fn(&DegradationSignal) + Send + Sync>;

#[derive(Default)]
struct ListenerSet {
    warning: Vec<(ListenerId, WarningListener)>,
    degradation: Vec<(ListenerId, DegradationListener)>,
}

/// Warning and degradation subscribers.
///
/// Cloning shares the same set, so a report produced under one lock can be
/// dispatched after that lock is released.
#[derive(Clone, Default)]
pub struct MonitorListeners {
    set: Arc<Mutex<ListenerSet>>,
    next_id: Arc<AtomicU64>,
}

impl MonitorListeners {
    fn next(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn on_warning(&self, listener: impl Fn(&PerformanceWarning) + Send + Sync + 'static) -> ListenerId {
        let id = self.next();
        self.set.lock().warning.push((id, Arc::new(listener)));
        id
    }

    pub fn on_degradation(
        &self,
        listener: impl Fn(&DegradationSignal) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next();
        self.set.lock().degradation.push((id, Arc::new(listener)));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut set = self.set.lock();
        let before = set.warning.len() + set.degradation.len();
        set.warning.retain(|(existing, _)| *existing != id);
        set.degradation.retain(|(existing, _)| *existing != id);
        set.warning.len() + set.degradation.len() != before
    }

    pub fn clear(&self) {
        let mut set = self.set.lock();
        set.warning.clear();
        set.degradation.clear();
    }

    /// Invoke listeners for everything in `report`
    pub fn dispatch(&self, report: &MonitorReport) {
        if report.is_empty() {
            return;
        }
        let (warning, degradation): (Vec<WarningListener>, Vec<DegradationListener>) = {
            let set = self.set.lock();
            (
                set.warning.iter().map(|(_, l)| l.clone()).collect(),
                set.degradation.iter().map(|(_, l)| l.clone()).collect(),
            )
        };

        for w in &report.warnings {
            for listener in &warning {
                listener(w);
            }
        }
        if let Some(signal) = &report.degradation {
            for listener in &degradation {
                listener(signal);
            }
        }
    }
}

impl std::fmt::Debug for MonitorListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = self.set.lock();
        f.debug_struct("MonitorListeners")
            .field("warning", &set.warning.len())
            .field("degradation", &set.degradation.len())
            .finish()
    }
}

/// Samples frames and memory and raises threshold breaches
#[derive(Debug)]
pub struct PerformanceMonitor {
    config: MonitorConfig,
    thresholds: DegradeThresholds,
    frames: RingBuffer<FrameSample, FRAME_CAPACITY>,
    fps_history: RingBuffer<f32, FPS_HISTORY>,
    memory: RingBuffer<MemorySample, MEMORY_HISTORY>,
    last_evaluation: Option<Instant>,
    listeners: MonitorListeners,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig, thresholds: DegradeThresholds) -> Self {
        Self {
            config,
            thresholds,
            frames: RingBuffer::new(),
            fps_history: RingBuffer::new(),
            memory: RingBuffer::new(),
            last_evaluation: None,
            listeners: MonitorListeners::default(),
        }
    }

    pub fn thresholds(&self) -> DegradeThresholds {
        self.thresholds
    }

    /// Swap thresholds for a new tier and start the windows over
    pub fn set_thresholds(&mut self, thresholds: DegradeThresholds) {
        self.thresholds = thresholds;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.frames.clear();
        self.fps_history.clear();
        self.memory.clear();
        self.last_evaluation = None;
    }

    pub fn listeners(&self) -> &MonitorListeners {
        &self.listeners
    }

    pub fn on_warning(&self, listener: impl Fn(&PerformanceWarning) + Send + Sync + 'static) -> ListenerId {
        self.listeners.on_warning(listener)
    }

    pub fn on_degradation(
        &self,
        listener: impl Fn(&DegradationSignal) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.on_degradation(listener)
    }

    /// Record a frame, evaluate if due, and notify listeners
    pub fn on_tick(&mut self, tick: FrameTick) -> MonitorReport {
        let report = self.record(tick);
        self.listeners.dispatch(&report);
        report
    }

    /// Record a frame and evaluate if due, without notifying listeners
    pub fn record(&mut self, tick: FrameTick) -> MonitorReport {
        self.frames.push(FrameSample {
            at: tick.at,
            render_ms: tick.render_time.as_secs_f32() * 1000.0,
        });

        if let Some(mb) = tick.memory_mb {
            let due = match self.memory.latest() {
                Some(last) => tick.at.saturating_duration_since(last.at)
                    >= self.config.memory_sample_interval(),
                None => true,
            };
            if due {
                self.memory.push(MemorySample { at: tick.at, mb });
            }
        }

        let Some(last) = self.last_evaluation else {
            self.last_evaluation = Some(tick.at);
            return MonitorReport::default();
        };
        if tick.at.saturating_duration_since(last) < self.config.evaluation_interval() {
            return MonitorReport::default();
        }
        self.last_evaluation = Some(tick.at);
        self.evaluate(tick.at)
    }

    fn evaluate(&mut self, at: Instant) -> MonitorReport {
        let snapshot = self.snapshot();
        if snapshot.frames_in_window < self.config.min_frames.max(2) {
            log::debug!(
                "Skipping evaluation: {} frames in window",
                snapshot.frames_in_window
            );
            return MonitorReport::default();
        }
        self.fps_history.push(snapshot.avg_fps);

        let t = self.thresholds;
        let mut warnings = Vec::new();
        let mut breach = |indicator, observed: f64, threshold: f64| {
            log::warn!(
                "{:?} breached: observed {:.2}, threshold {:.2}",
                indicator,
                observed,
                threshold
            );
            warnings.push(PerformanceWarning {
                indicator,
                observed,
                threshold,
                at,
            });
        };

        if snapshot.avg_fps < t.min_fps {
            breach(Indicator::LowFps, snapshot.avg_fps as f64, t.min_fps as f64);
        }
        if snapshot.avg_render_ms > t.max_render_time_ms {
            breach(
                Indicator::HighRenderTime,
                snapshot.avg_render_ms as f64,
                t.max_render_time_ms as f64,
            );
        }
        if let Some(mb) = snapshot.memory_mb {
            if mb > t.max_memory_mb {
                breach(Indicator::HighMemory, mb, t.max_memory_mb);
            }
        }

        let degradation = (warnings.len() >= 2).then(|| {
            let indicators: Vec<Indicator> = warnings.iter().map(|w| w.indicator).collect();
            log::warn!("Sustained degradation: {:?}", indicators);
            DegradationSignal {
                indicators,
                snapshot,
                at,
            }
        });

        MonitorReport {
            warnings,
            degradation,
        }
    }

    /// Current view of the trailing window
    pub fn snapshot(&self) -> PerformanceSnapshot {
        let memory_mb = self.memory.latest().map(|s| s.mb);
        let Some(newest) = self.frames.latest() else {
            return PerformanceSnapshot {
                memory_mb,
                ..Default::default()
            };
        };

        let window_start = newest.at.checked_sub(self.config.fps_window());
        let window: Vec<FrameSample> = self
            .frames
            .iter()
            .filter(|f| window_start.map_or(true, |start| f.at >= start))
            .collect();

        let n = window.len();
        let avg_render_ms = window.iter().map(|f| f.render_ms).sum::<f32>() / n as f32;

        let mut min_fps = f32::MAX;
        let mut max_fps = 0.0f32;
        for pair in window.windows(2) {
            let dt = pair[1].at.saturating_duration_since(pair[0].at).as_secs_f32();
            if dt > 0.0 {
                min_fps = min_fps.min(1.0 / dt);
                max_fps = max_fps.max(1.0 / dt);
            }
        }
        if min_fps == f32::MAX {
            min_fps = 0.0;
        }

        let span = newest.at.saturating_duration_since(window[0].at).as_secs_f32();
        let avg_fps = if n >= 2 && span > 0.0 {
            (n - 1) as f32 / span
        } else {
            0.0
        };

        PerformanceSnapshot {
            avg_fps,
            min_fps,
            max_fps,
            avg_render_ms,
            memory_mb,
            frames_in_window: n,
        }
    }

    /// FPS recorded at each evaluation, oldest first
    pub fn fps_history(&self) -> Vec<f32> {
        self.fps_history.iter().collect()
    }

    /// Change in FPS across the evaluation history; negative when falling
    pub fn fps_trend(&self) -> f32 {
        self.fps_history.trend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn thresholds() -> DegradeThresholds {
        DegradeThresholds {
            max_render_time_ms: 25.0,
            min_fps: 45.0,
            max_memory_mb: 600.0,
        }
    }

    /// Feed `count` frames spaced `interval` apart, each taking `render`
    fn feed(
        monitor: &mut PerformanceMonitor,
        start: Instant,
        count: u32,
        interval: Duration,
        render: Duration,
    ) -> Vec<MonitorReport> {
        (0..count)
            .map(|i| monitor.on_tick(FrameTick::new(start + interval * i, render)))
            .collect()
    }

    #[test]
    fn test_snapshot_of_steady_frames() {
        let mut monitor = PerformanceMonitor::new(MonitorConfig::default(), thresholds());
        let start = Instant::now();
        feed(&mut monitor, start, 61, Duration::from_millis(16), Duration::from_millis(8));

        let snapshot = monitor.snapshot();
        assert!((snapshot.avg_fps - 62.5).abs() < 0.5);
        assert!((snapshot.avg_render_ms - 8.0).abs() < 0.01);
        assert_eq!(snapshot.memory_mb, None);
    }

    #[test]
    fn test_single_breach_warns_without_degrading() {
        let mut monitor = PerformanceMonitor::new(MonitorConfig::default(), thresholds());
        let warnings = Arc::new(AtomicUsize::new(0));
        let degradations = Arc::new(AtomicUsize::new(0));
        {
            let warnings = warnings.clone();
            monitor.on_warning(move |_| {
                warnings.fetch_add(1, Ordering::SeqCst);
            });
            let degradations = degradations.clone();
            monitor.on_degradation(move |_| {
                degradations.fetch_add(1, Ordering::SeqCst);
            });
        }

        // 60 fps but every frame takes 30 ms of render time
        let start = Instant::now();
        feed(&mut monitor, start, 130, Duration::from_millis(16), Duration::from_millis(30));

        assert!(warnings.load(Ordering::SeqCst) >= 1);
        assert_eq!(degradations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_memory_sampling_is_rate_limited() {
        let mut monitor = PerformanceMonitor::new(MonitorConfig::default(), thresholds());
        let start = Instant::now();
        monitor.on_tick(FrameTick::new(start, Duration::from_millis(5)).with_memory(100.0));
        monitor.on_tick(
            FrameTick::new(start + Duration::from_millis(500), Duration::from_millis(5))
                .with_memory(900.0),
        );
        assert_eq!(monitor.snapshot().memory_mb, Some(100.0));

        monitor.on_tick(
            FrameTick::new(start + Duration::from_secs(2), Duration::from_millis(5))
                .with_memory(300.0),
        );
        assert_eq!(monitor.snapshot().memory_mb, Some(300.0));
    }

    #[test]
    fn test_set_thresholds_resets_windows() {
        let mut monitor = PerformanceMonitor::new(MonitorConfig::default(), thresholds());
        let start = Instant::now();
        feed(&mut monitor, start, 10, Duration::from_millis(16), Duration::from_millis(5));
        assert_eq!(monitor.snapshot().frames_in_window, 10);

        let mut relaxed = thresholds();
        relaxed.min_fps = 18.0;
        monitor.set_thresholds(relaxed);
        assert_eq!(monitor.snapshot().frames_in_window, 0);
        assert_eq!(monitor.thresholds().min_fps, 18.0);
    }

    #[test]
    fn test_removed_listener_is_silent() {
        let mut monitor = PerformanceMonitor::new(MonitorConfig::default(), thresholds());
        let calls = Arc::new(AtomicUsize::new(0));
        let id = {
            let calls = calls.clone();
            monitor.on_warning(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert!(monitor.listeners().remove(id));

        let start = Instant::now();
        feed(&mut monitor, start, 130, Duration::from_millis(50), Duration::from_millis(40));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
