//! Adaptive worker-count controller.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::concurrency::metrics::{PoolKind, SystemMetricsSource, SystemSample};

/// Tuning for the adaptive controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub min_workers: usize,
    pub max_workers: usize,
    /// Minimum time between step changes
    pub adjustment_interval: Duration,
    /// CPU% below which the system is considered idle enough to grow
    pub cpu_low_threshold: f32,
    /// CPU% above which the controller backs off
    pub cpu_high_threshold: f32,
    /// Memory% above which the controller backs off
    pub memory_high_threshold: f32,
    /// Relative throughput change treated as significant
    pub throughput_delta: f64,
    /// Number of samples kept in the rolling window
    pub history_window: usize,
}

impl ControllerConfig {
    pub fn new(min_workers: usize, max_workers: usize) -> Self {
        Self {
            min_workers: min_workers.max(1),
            max_workers: max_workers.max(min_workers.max(1)),
            adjustment_interval: Duration::from_secs(30),
            cpu_low_threshold: 50.0,
            cpu_high_threshold: 90.0,
            memory_high_threshold: 80.0,
            throughput_delta: 0.10,
            history_window: 10,
        }
    }
}

/// One recorded step change, kept for observability.
#[derive(Debug, Clone)]
pub struct Adjustment {
    pub at: Instant,
    pub from: usize,
    pub to: usize,
    pub cause: String,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    workers: usize,
    throughput: f64,
}

struct ControllerState {
    current_workers: usize,
    last_decision: Option<Instant>,
    history: VecDeque<Sample>,
    adjustments: Vec<Adjustment>,
}

/// Heuristic controller that recomputes a target worker count from system
/// load and observed throughput.
///
/// Changes are bounded single steps within `[min_workers, max_workers]`,
/// each recorded with its cause. This is not a closed-loop optimal
/// controller: it never guarantees convergence, only bounded, auditable
/// adjustments.
pub struct AdaptiveConcurrencyController {
    kind: PoolKind,
    config: ControllerConfig,
    metrics: Arc<dyn SystemMetricsSource>,
    state: Mutex<ControllerState>,
}

impl AdaptiveConcurrencyController {
    pub fn new(kind: PoolKind, config: ControllerConfig, metrics: Arc<dyn SystemMetricsSource>) -> Self {
        let initial = config.min_workers;
        Self {
            kind,
            config,
            metrics,
            state: Mutex::new(ControllerState {
                current_workers: initial,
                last_decision: None,
                history: VecDeque::new(),
                adjustments: Vec::new(),
            }),
        }
    }

    /// Creates a controller starting at `initial` workers.
    pub fn with_initial(kind: PoolKind, config: ControllerConfig, metrics: Arc<dyn SystemMetricsSource>, initial: usize) -> Self {
        let controller = Self::new(kind, config, metrics);
        controller.state.lock().current_workers =
            initial.clamp(controller.config.min_workers, controller.config.max_workers);
        controller
    }

    pub fn current_workers(&self) -> usize {
        self.state.lock().current_workers
    }

    pub fn adjustment_history(&self) -> Vec<Adjustment> {
        self.state.lock().adjustments.clone()
    }

    /// Recomputes the target worker count.
    ///
    /// Called opportunistically before a run starts; the decision rule only
    /// fires once per adjustment interval, otherwise the current target is
    /// returned unchanged. `throughput` is the pool's observed tasks per
    /// busy-second from the stats registry.
    pub fn target_workers(&self, throughput: f64) -> usize {
        let mut state = self.state.lock();

        if let Some(last) = state.last_decision {
            if last.elapsed() < self.config.adjustment_interval {
                return state.current_workers;
            }
        }
        state.last_decision = Some(Instant::now());

        let sample = self.metrics.sample().unwrap_or_else(|| {
            debug!("System metrics unavailable for {} pool, using neutral defaults", self.kind);
            SystemSample::neutral()
        });

        let current = state.current_workers;
        let decision = self.decide(&state, current, &sample, throughput);

        state.history.push_back(Sample {
            workers: current,
            throughput,
        });
        while state.history.len() > self.config.history_window {
            state.history.pop_front();
        }

        if let Some((target, cause)) = decision {
            info!(
                "Adjusting {} pool workers {} -> {} ({})",
                self.kind, current, target, cause
            );
            state.adjustments.push(Adjustment {
                at: Instant::now(),
                from: current,
                to: target,
                cause,
            });
            state.current_workers = target;
        }

        state.current_workers
    }

    fn decide(
        &self,
        state: &ControllerState,
        current: usize,
        sample: &SystemSample,
        throughput: f64,
    ) -> Option<(usize, String)> {
        let cfg = &self.config;

        // Backoff conditions take precedence
        if sample.cpu_percent > cfg.cpu_high_threshold {
            return self.step_down(current, format!("cpu {:.0}% above {:.0}%", sample.cpu_percent, cfg.cpu_high_threshold));
        }
        if sample.memory_percent > cfg.memory_high_threshold {
            return self.step_down(current, format!("memory {:.0}% above {:.0}%", sample.memory_percent, cfg.memory_high_threshold));
        }
        if let Some(previous) = Self::last_at_same_count(&state.history, current) {
            if previous.throughput > 0.0 && throughput <= previous.throughput * (1.0 - cfg.throughput_delta) {
                return self.step_down(
                    current,
                    format!(
                        "throughput declined {:.0}% at {} workers",
                        (1.0 - throughput / previous.throughput) * 100.0,
                        current
                    ),
                );
            }
        }

        // Growth requires idle CPU and memory headroom
        if sample.cpu_percent < cfg.cpu_low_threshold && sample.memory_percent < cfg.memory_high_threshold {
            return match Self::increase_paid_off(&state.history, cfg.throughput_delta) {
                // Too little history to tell: default to optimistic growth
                None => self.step_up(current, "low load, no scaling history".to_string()),
                Some(true) => self.step_up(current, "low load, past increase paid off".to_string()),
                Some(false) => None,
            };
        }

        None
    }

    fn step_up(&self, current: usize, cause: String) -> Option<(usize, String)> {
        let target = (current + 1).min(self.config.max_workers);
        (target != current).then_some((target, cause))
    }

    fn step_down(&self, current: usize, cause: String) -> Option<(usize, String)> {
        let target = current.saturating_sub(1).max(self.config.min_workers);
        (target != current).then_some((target, cause))
    }

    /// Most recent historical sample taken at the given worker count.
    fn last_at_same_count(history: &VecDeque<Sample>, workers: usize) -> Option<Sample> {
        history.iter().rev().find(|s| s.workers == workers).copied()
    }

    /// Whether any past worker-count increase in the window correlated with
    /// a significant throughput gain. `None` means the history holds no
    /// increase to judge.
    fn increase_paid_off(history: &VecDeque<Sample>, delta: f64) -> Option<bool> {
        let mut saw_increase = false;
        let mut pairs = history.iter().zip(history.iter().skip(1));
        if pairs.any(|(a, b)| {
            if b.workers > a.workers && a.throughput > 0.0 {
                saw_increase = true;
                b.throughput >= a.throughput * (1.0 + delta)
            } else {
                false
            }
        }) {
            return Some(true);
        }
        if saw_increase { Some(false) } else { None }
    }
}
