//! Tier controller
//!
//! Owns the session: assesses the device once, loads the recommended tier's
//! asset (stepping down on failures), then watches the performance monitor
//! and steps down again when degradation is sustained. Downgrades are
//! monotonic, sequential and rate limited by a cool-down.
//!
//! ```text
//! Uninitialized -> Assessing -> Loading -> Ready -> (Degrading -> Loading)* -> Ready | Failed
//!                            \-> NoRendering                      any -> Disposed
//! ```

pub mod state;

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use crate::cache::{AssetCache, AssetHandle, CacheStats, LoadRequest, Priority};
use crate::capability::{
    CapabilityAssessment, CapabilityAssessor, CapabilityProbe, HostHints, NetworkClass,
};
use crate::config::ControllerConfig;
use crate::error::{Result, TierError};
use crate::gpu::GpuDevice;
use crate::loader::AssetLoader;
use crate::monitor::{
    DegradationSignal, FrameTick, ListenerId, MonitorListeners, MonitorReport,
    PerformanceMonitor, PerformanceSnapshot, PerformanceWarning,
};
use crate::registry::TierRegistry;
use crate::runtime::HostRuntime;
use crate::tier::QualityTier;

pub use state::{ControllerState, DegradeEvent, DegradeReason, TierUpdate};

/// Debug overlay data
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControllerStats {
    pub cache: CacheStats,
    pub performance: PerformanceSnapshot,
}

type TierChangeFn = Arc<dyn Fn(&TierUpdate) + Send + Sync>;
type FatalErrorFn = Arc<dyn Fn(&TierError) + Send + Sync>;

#[derive(Default)]
struct SubscriberSet {
    next_id: u64,
    entries: Vec<(u64, TierChangeFn, FatalErrorFn)>,
}

/// Registration returned by [`TierController::subscribe`].
///
/// Dropping it keeps the callbacks registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove them.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    set: Weak<Mutex<SubscriberSet>>,
}

impl Subscription {
    /// Remove the callbacks. Returns false if they were already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(set) = self.set.upgrade() else {
            return false;
        };
        let mut set = set.lock();
        let before = set.entries.len();
        set.entries.retain(|(id, _, _)| *id != self.id);
        set.entries.len() != before
    }
}

/// A degradation signal that arrived while a transition was running
#[derive(Debug, Clone, Copy)]
struct QueuedSignal {
    reason: DegradeReason,
    at: Instant,
    /// Tier that was rendering when the frames behind the signal were measured
    measured_at: QualityTier,
}

struct Session {
    state: ControllerState,
    current: Option<QualityTier>,
    current_asset: Option<AssetHandle>,
    assessment: Option<CapabilityAssessment>,
    queued: Option<QueuedSignal>,
    last_downgrade_at: Option<Instant>,
    transition_in_flight: bool,
    fatal_reported: bool,
}

struct ControllerInner<G: GpuDevice, L: AssetLoader, R: HostRuntime> {
    cache: AssetCache<G, L, R>,
    registry: TierRegistry,
    config: ControllerConfig,
    runtime: R,
    monitor: Mutex<PerformanceMonitor>,
    listeners: MonitorListeners,
    session: Mutex<Session>,
    subscribers: Arc<Mutex<SubscriberSet>>,
    alive: AtomicBool,
}

impl<G: GpuDevice, L: AssetLoader, R: HostRuntime> ControllerInner<G, L, R> {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Load `target`, stepping down on transient failures, then keep going
    /// while queued degradation signals are accepted.
    async fn run_transition(
        &self,
        target: QualityTier,
        cause: Option<DegradeEvent>,
    ) -> Result<QualityTier> {
        let mut tier = target;
        let mut cause = cause;
        let mut failures = 0u32;

        loop {
            if !self.is_alive() {
                return Err(TierError::Disposed);
            }

            let request = match self.request_for(tier) {
                Ok(request) => request,
                Err(err) => return Err(self.fail(err)),
            };
            self.set_state(ControllerState::Loading);
            log::info!("Loading {} tier asset {}", tier, request.path);

            let result = self.cache.load(request).await;
            if !self.is_alive() {
                log::debug!("Controller disposed; ignoring load completion for {}", tier);
                return Err(TierError::Disposed);
            }

            match result {
                Ok(handle) => {
                    self.settle(tier, handle, cause);
                    match self.accept_queued() {
                        Some(event) => {
                            tier = event.proposed_tier;
                            cause = Some(event);
                            failures = 0;
                        }
                        None => return Ok(tier),
                    }
                }
                Err(err) if err.is_transient() => {
                    failures += 1;
                    match tier.lower() {
                        Some(lower) if failures < self.config.max_retries => {
                            log::warn!(
                                "{} (attempt {}/{}); retrying at {}",
                                err,
                                failures,
                                self.config.max_retries,
                                lower
                            );
                            cause = Some(DegradeEvent {
                                previous_tier: tier,
                                proposed_tier: lower,
                                reason: DegradeReason::from_load_error(&err),
                                timestamp: Instant::now(),
                            });
                            tier = lower;
                        }
                        _ => return Err(self.fail(err)),
                    }
                }
                Err(TierError::Disposed) => return Err(TierError::Disposed),
                Err(err) => return Err(self.fail(err)),
            }
        }
    }

    fn request_for(&self, tier: QualityTier) -> Result<LoadRequest> {
        let profile = self.registry.profile_for(tier)?;
        let path = self.registry.asset_path_for(tier, &self.config.asset_group)?;
        let network = self
            .session
            .lock()
            .assessment
            .as_ref()
            .map(|a| a.network)
            .unwrap_or(NetworkClass::Unknown);

        Ok(LoadRequest::new(path)
            .with_priority(Priority::High)
            .with_texture_scale(profile.render.texture_scale)
            .with_deadline(self.config.load_timeouts.deadline(tier, network)?))
    }

    fn set_state(&self, state: ControllerState) {
        let mut session = self.session.lock();
        if session.state != ControllerState::Disposed {
            session.state = state;
        }
    }

    /// Make `tier` current and tell subscribers
    fn settle(&self, tier: QualityTier, handle: AssetHandle, cause: Option<DegradeEvent>) {
        // Reset the windows before the tier becomes current so no signal is
        // attributed to `tier` on frames rendered at the previous one
        if let Ok(profile) = self.registry.profile_for(tier) {
            self.monitor.lock().set_thresholds(profile.thresholds);
        }

        let previous = {
            let mut session = self.session.lock();
            if session.state == ControllerState::Disposed {
                return;
            }
            session.state = ControllerState::Ready;
            session.current = Some(tier);
            session.current_asset.replace(handle.clone())
        };

        // Keep the old asset around but let it go first under pressure
        if let Some(previous) = previous.filter(|p| p.path() != handle.path()) {
            self.cache.set_priority(previous.path(), Priority::Low);
        }

        match &cause {
            Some(event) => log::info!(
                "Tier {} -> {} ready ({:?})",
                event.previous_tier,
                tier,
                event.reason
            ),
            None => log::info!("Tier {} ready", tier),
        }
        self.notify_tier_change(&TierUpdate::Ready { tier, handle, cause });
    }

    /// Re-evaluate a signal queued during the transition that just settled.
    ///
    /// Only signals measured at the tier now current count; anything older
    /// judged frames of a tier that is no longer rendering.
    fn accept_queued(&self) -> Option<DegradeEvent> {
        let mut session = self.session.lock();
        let queued = session.queued.take().filter(|q| {
            let fresh = Some(q.measured_at) == session.current;
            if !fresh {
                log::debug!(
                    "Dropping {:?} queued at {}; {:?} is now current",
                    q.reason,
                    q.measured_at,
                    session.current
                );
            }
            fresh
        });
        let event = queued.and_then(|q| self.begin_downgrade(&mut session, q.reason, q.at));
        if event.is_none() {
            session.transition_in_flight = false;
        }
        event
    }

    /// Accept a downgrade if the session is ready, outside the cool-down and
    /// not already at the lowest tier
    fn begin_downgrade(
        &self,
        session: &mut Session,
        reason: DegradeReason,
        at: Instant,
    ) -> Option<DegradeEvent> {
        if session.state != ControllerState::Ready {
            return None;
        }
        let current = session.current?;

        if let Some(last) = session.last_downgrade_at {
            let since = at.saturating_duration_since(last);
            if since < self.config.downgrade_cooldown() {
                log::debug!("Ignoring {:?}: {:?} into the cool-down", reason, since);
                return None;
            }
        }
        let Some(lower) = current.lower() else {
            log::debug!("Ignoring {:?}: already at {}", reason, current);
            return None;
        };

        session.last_downgrade_at = Some(at);
        session.state = ControllerState::Degrading;
        session.transition_in_flight = true;
        log::info!("Degrading {} -> {} ({:?})", current, lower, reason);

        Some(DegradeEvent {
            previous_tier: current,
            proposed_tier: lower,
            reason,
            timestamp: at,
        })
    }

    /// Enter `Failed`; reports the first fatal error to subscribers
    fn fail(&self, err: TierError) -> TierError {
        let first = {
            let mut session = self.session.lock();
            if session.state == ControllerState::Disposed {
                return err;
            }
            session.state = ControllerState::Failed;
            session.current = None;
            session.current_asset = None;
            session.transition_in_flight = false;
            session.queued = None;
            !std::mem::replace(&mut session.fatal_reported, true)
        };

        log::error!("Giving up on 3D content: {}", err);
        if first {
            let subscribers: Vec<FatalErrorFn> = self
                .subscribers
                .lock()
                .entries
                .iter()
                .map(|(_, _, on_fatal)| on_fatal.clone())
                .collect();
            for on_fatal in subscribers {
                if self.is_alive() {
                    on_fatal(&err);
                }
            }
        }
        err
    }

    fn notify_tier_change(&self, update: &TierUpdate) {
        let subscribers: Vec<TierChangeFn> = self
            .subscribers
            .lock()
            .entries
            .iter()
            .map(|(_, on_change, _)| on_change.clone())
            .collect();
        for on_change in subscribers {
            if self.is_alive() {
                on_change(update);
            }
        }
    }
}

/// Session owner tying together assessment, caching and monitoring
///
/// Cheap to clone; clones drive the same session.
pub struct TierController<G: GpuDevice, L: AssetLoader, R: HostRuntime> {
    inner: Arc<ControllerInner<G, L, R>>,
}

impl<G: GpuDevice, L: AssetLoader, R: HostRuntime> Clone for TierController<G, L, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: GpuDevice, L: AssetLoader, R: HostRuntime> TierController<G, L, R> {
    pub fn new(
        gpu: G,
        loader: L,
        runtime: R,
        registry: TierRegistry,
        config: ControllerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let initial = registry.profile_for(QualityTier::High)?.thresholds;
        let monitor = PerformanceMonitor::new(config.monitor.clone(), initial);
        let listeners = monitor.listeners().clone();
        let cache = AssetCache::new(gpu, loader, runtime.clone(), config.cache.clone());

        Ok(Self {
            inner: Arc::new(ControllerInner {
                cache,
                registry,
                config,
                runtime,
                monitor: Mutex::new(monitor),
                listeners,
                session: Mutex::new(Session {
                    state: ControllerState::Uninitialized,
                    current: None,
                    current_asset: None,
                    assessment: None,
                    queued: None,
                    last_downgrade_at: None,
                    transition_in_flight: false,
                    fatal_reported: false,
                }),
                subscribers: Arc::new(Mutex::new(SubscriberSet::default())),
                alive: AtomicBool::new(true),
            }),
        })
    }

    /// Controller with the built-in tier table and default configuration
    pub fn with_defaults(gpu: G, loader: L, runtime: R) -> Result<Self> {
        Self::new(
            gpu,
            loader,
            runtime,
            TierRegistry::default(),
            ControllerConfig::default(),
        )
    }

    /// Assess the device and load the recommended tier.
    ///
    /// Resolves to the tier that became ready, or `None` when the device
    /// cannot render 3D content. Exhausted retries resolve to the error that
    /// was also passed to `on_fatal_error`.
    pub async fn start<P: CapabilityProbe>(
        &self,
        probe: &P,
        hints: &HostHints,
    ) -> Result<Option<QualityTier>> {
        self.enter(ControllerState::Assessing)?;
        let assessment = CapabilityAssessor::new().assess(probe, hints);
        self.start_with(assessment).await
    }

    /// Load the tier recommended by an existing assessment
    pub async fn start_with(&self, assessment: CapabilityAssessment) -> Result<Option<QualityTier>> {
        self.enter(ControllerState::Assessing)?;
        let recommendation = assessment.recommended_tier();
        log::info!(
            "Assessed {:?} GPU on {:?} ({} MB, {:?} network): {}",
            assessment.gpu_tier,
            assessment.device_class,
            assessment.memory_mb,
            assessment.network,
            recommendation
        );

        let target = {
            let mut session = self.inner.session.lock();
            session.assessment = Some(assessment);
            match recommendation.require_tier() {
                Err(err) => {
                    log::info!("Skipping 3D content: {}", err);
                    session.state = ControllerState::NoRendering;
                    None
                }
                Ok(tier) => {
                    session.state = ControllerState::Loading;
                    session.transition_in_flight = true;
                    Some(tier)
                }
            }
        };

        match target {
            None => {
                self.inner.notify_tier_change(&TierUpdate::NoRendering);
                Ok(None)
            }
            Some(tier) => self.inner.run_transition(tier, None).await.map(Some),
        }
    }

    /// Move from `Uninitialized` (or stay in `Assessing`) to `state`
    fn enter(&self, state: ControllerState) -> Result<()> {
        let mut session = self.inner.session.lock();
        match session.state {
            ControllerState::Uninitialized | ControllerState::Assessing => {
                session.state = state;
                Ok(())
            }
            ControllerState::Disposed => Err(TierError::Disposed),
            other => Err(TierError::Config(format!(
                "controller already started (state {})",
                other
            ))),
        }
    }

    /// Feed one frame to the monitor and react to sustained degradation.
    ///
    /// Must be called from outside any executor when the host runtime runs
    /// spawned tasks inline.
    pub fn on_tick(&self, tick: FrameTick) -> MonitorReport {
        if !self.inner.is_alive() {
            return MonitorReport::default();
        }
        let report = self.inner.monitor.lock().record(tick);
        self.inner.listeners.dispatch(&report);

        if let Some(signal) = &report.degradation {
            self.on_degradation_signal(signal);
        }
        report
    }

    fn on_degradation_signal(&self, signal: &DegradationSignal) {
        let reason = signal
            .indicators
            .first()
            .map(|&i| DegradeReason::from(i))
            .unwrap_or(DegradeReason::LowFps);

        let event = {
            let mut session = self.inner.session.lock();
            if session.transition_in_flight {
                // Only a tier that was already rendering can be too slow
                if let Some(measured_at) = session.current {
                    log::debug!("Queueing {:?} until the current transition settles", reason);
                    session.queued = Some(QueuedSignal {
                        reason,
                        at: signal.at,
                        measured_at,
                    });
                }
                return;
            }
            match self.inner.begin_downgrade(&mut session, reason, signal.at) {
                Some(event) => event,
                None => return,
            }
        };

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            if let Err(err) = inner.run_transition(event.proposed_tier, Some(event)).await {
                log::debug!("Downgrade to {} ended: {}", event.proposed_tier, err);
            }
        });
    }

    /// Tear down: callbacks are dropped, the cache is closed and later
    /// completions are ignored
    pub fn dispose(&self) {
        if !self.inner.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        {
            let mut session = self.inner.session.lock();
            session.state = ControllerState::Disposed;
            session.current = None;
            session.current_asset = None;
            session.queued = None;
        }
        self.inner.subscribers.lock().entries.clear();
        self.inner.listeners.clear();
        self.inner.cache.close();
        log::info!("Controller disposed");
    }

    /// The rendered tier, or `None` before the first load, after failure and
    /// when rendering is off
    pub fn current_tier(&self) -> Option<QualityTier> {
        self.inner.session.lock().current
    }

    pub fn current_asset(&self) -> Option<AssetHandle> {
        self.inner.session.lock().current_asset.clone()
    }

    pub fn state(&self) -> ControllerState {
        self.inner.session.lock().state
    }

    pub fn assessment(&self) -> Option<CapabilityAssessment> {
        self.inner.session.lock().assessment.clone()
    }

    pub fn subscribe(
        &self,
        on_tier_change: impl Fn(&TierUpdate) + Send + Sync + 'static,
        on_fatal_error: impl Fn(&TierError) + Send + Sync + 'static,
    ) -> Subscription {
        let mut set = self.inner.subscribers.lock();
        let id = set.next_id;
        set.next_id += 1;
        set.entries
            .push((id, Arc::new(on_tier_change), Arc::new(on_fatal_error)));
        Subscription {
            id,
            set: Arc::downgrade(&self.inner.subscribers),
        }
    }

    pub fn on_warning(
        &self,
        listener: impl Fn(&PerformanceWarning) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.listeners.on_warning(listener)
    }

    pub fn on_degradation(
        &self,
        listener: impl Fn(&DegradationSignal) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.listeners.on_degradation(listener)
    }

    pub fn stats(&self) -> ControllerStats {
        ControllerStats {
            cache: self.inner.cache.stats(),
            performance: self.inner.monitor.lock().snapshot(),
        }
    }

    pub fn cache(&self) -> &AssetCache<G, L, R> {
        &self.inner.cache
    }

    pub fn registry(&self) -> &TierRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }
}
