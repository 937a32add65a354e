use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::{CancellationToken, Cancelled, ExecutionContext};

/// Lifecycle notifications delivered to algorithm observers.
#[derive(Debug, Clone, PartialEq)]
pub enum AlgorithmEvent {
    Started {
        algorithm: String,
    },
    /// `fraction` is the overall completion of the top-level algorithm.
    Progress {
        algorithm: String,
        fraction: f64,
        message: Option<String>,
    },
    Finished {
        algorithm: String,
        success: bool,
    },
    Error {
        algorithm: String,
        message: String,
    },
}

/// Fan-out of [`AlgorithmEvent`]s. A child algorithm shares its parent's
/// notifier, so observers of the top-level instance see nested progress.
#[derive(Debug, Clone, Default)]
pub struct EventNotifier {
    subscribers: Arc<Mutex<Vec<Sender<AlgorithmEvent>>>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<AlgorithmEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.lock().is_empty()
    }

    pub fn emit(&self, event: AlgorithmEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Sub-interval of the top-level `[0, 1]` progress range owned by one
/// algorithm instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressRange {
    start: f64,
    end: f64,
}

impl ProgressRange {
    pub const FULL: Self = Self {
        start: 0.0,
        end: 1.0,
    };

    pub fn new(start: f64, end: f64) -> Self {
        let start = start.clamp(0.0, 1.0);
        let end = end.clamp(start, 1.0);
        Self { start, end }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    /// Maps a local fraction into this range.
    pub fn map(&self, fraction: f64) -> f64 {
        self.start + fraction.clamp(0.0, 1.0) * (self.end - self.start)
    }

    /// The part of this range that `[start, end]` of the local scale covers.
    pub fn sub(&self, start: f64, end: f64) -> Self {
        Self::new(self.map(start), self.map(end))
    }
}

impl Default for ProgressRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// Reporting target of one running algorithm.
#[derive(Debug, Clone)]
pub(crate) struct ProgressScope {
    pub(crate) notifier: EventNotifier,
    pub(crate) range: ProgressRange,
    pub(crate) token: CancellationToken,
    pub(crate) source: Arc<str>,
    pub(crate) notify_step: f64,
}

impl ProgressScope {
    /// Emits a progress event for a local fraction of this algorithm.
    pub(crate) fn report(&self, fraction: f64, message: Option<&str>) {
        self.notifier.emit(AlgorithmEvent::Progress {
            algorithm: self.source.to_string(),
            fraction: self.range.map(fraction),
            message: message.map(str::to_string),
        });
    }
}

/// Step counter that turns loop iterations into progress notifications.
///
/// Each report advances the counter, emits a notification when the overall
/// fraction moved by at least the configured step (or on completion), and
/// then acts as an interruption point. Reports may come from several worker
/// threads at once.
#[derive(Debug)]
pub struct Progress {
    scope: ProgressScope,
    start: f64,
    end: f64,
    steps: usize,
    done: AtomicUsize,
    last_notified: Mutex<Option<f64>>,
}

impl Progress {
    /// Covers `[start, end]` of the algorithm's own range in `steps` reports.
    pub fn new(ctx: &ExecutionContext<'_>, start: f64, end: f64, steps: usize) -> Self {
        Self::with_scope(ctx.progress_scope().clone(), start, end, steps)
    }

    pub(crate) fn with_scope(scope: ProgressScope, start: f64, end: f64, steps: usize) -> Self {
        let start = start.clamp(0.0, 1.0);
        Self {
            scope,
            start,
            end: end.clamp(start, 1.0),
            steps,
            done: AtomicUsize::new(0),
            last_notified: Mutex::new(None),
        }
    }

    pub fn report(&self) -> Result<(), Cancelled> {
        self.advance(1, None)
    }

    pub fn report_msg(&self, message: &str) -> Result<(), Cancelled> {
        self.advance(1, Some(message))
    }

    pub fn report_n(&self, steps: usize) -> Result<(), Cancelled> {
        self.advance(steps, None)
    }

    /// Steps reported so far, capped at the declared total.
    pub fn completed(&self) -> usize {
        self.done.load(Ordering::Relaxed).min(self.steps)
    }

    /// Current position within the algorithm's own range.
    pub fn fraction(&self) -> f64 {
        self.local_fraction(self.completed())
    }

    fn local_fraction(&self, done: usize) -> f64 {
        if self.steps == 0 {
            return self.end;
        }
        let done = done.min(self.steps) as f64;
        self.start + (self.end - self.start) * done / self.steps as f64
    }

    fn advance(&self, steps: usize, message: Option<&str>) -> Result<(), Cancelled> {
        let done = self.done.fetch_add(steps, Ordering::AcqRel) + steps;
        let finished = done >= self.steps;
        {
            // Workers reach the lock out of order; emitting under it keeps the
            // reported fractions from ever stepping backwards.
            let mut last = self.last_notified.lock();
            let mut local = self.local_fraction(done);
            let due = match *last {
                None => true,
                Some(previous) => {
                    local = local.max(previous);
                    self.scope.range.map(local) - self.scope.range.map(previous)
                        >= self.scope.notify_step
                }
            };
            if due || finished || message.is_some() {
                *last = Some(local);
                self.scope.report(local, message);
            }
        }
        self.scope.token.interruption_point()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(range: ProgressRange, notify_step: f64) -> (ProgressScope, Receiver<AlgorithmEvent>) {
        let notifier = EventNotifier::new();
        let rx = notifier.subscribe();
        let scope = ProgressScope {
            notifier,
            range,
            token: CancellationToken::new(),
            source: Arc::from("Test"),
            notify_step,
        };
        (scope, rx)
    }

    fn fractions(rx: &Receiver<AlgorithmEvent>) -> Vec<f64> {
        rx.try_iter()
            .filter_map(|event| match event {
                AlgorithmEvent::Progress { fraction, .. } => Some(fraction),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn nested_ranges_compose() {
        let parent = ProgressRange::FULL.sub(0.5, 1.0);
        let child = parent.sub(0.2, 0.6);
        assert!((child.start() - 0.6).abs() < 1e-12);
        assert!((child.end() - 0.8).abs() < 1e-12);
        assert!((child.map(0.5) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn half_of_a_child_range_lands_in_the_middle() {
        let (scope, rx) = scope(ProgressRange::new(0.2, 0.6), 0.0);
        let progress = Progress::with_scope(scope, 0.0, 1.0, 2);
        progress.report().unwrap();
        let seen = fractions(&rx);
        assert_eq!(seen.len(), 1);
        assert!((seen[0] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn notifications_are_throttled_but_completion_always_arrives() {
        let (scope, rx) = scope(ProgressRange::FULL, 0.25);
        let progress = Progress::with_scope(scope, 0.0, 1.0, 100);
        for _ in 0..100 {
            progress.report().unwrap();
        }
        let seen = fractions(&rx);
        assert!(seen.len() <= 6, "too many notifications: {seen:?}");
        assert_eq!(seen.last().copied(), Some(1.0));
        assert_eq!(progress.completed(), 100);
    }

    #[test]
    fn concurrent_reports_never_step_backwards() {
        let (scope, rx) = scope(ProgressRange::new(0.5, 1.0), 0.0);
        let progress = Progress::with_scope(scope, 0.0, 1.0, 4000);
        std::thread::scope(|threads| {
            for _ in 0..4 {
                threads.spawn(|| {
                    for _ in 0..1000 {
                        progress.report().unwrap();
                    }
                });
            }
        });
        let seen = fractions(&rx);
        assert!(!seen.is_empty());
        assert!(
            seen.windows(2).all(|pair| pair[0] <= pair[1]),
            "fractions went backwards"
        );
        assert_eq!(seen.last().copied(), Some(1.0));
    }

    #[test]
    fn messages_always_notify() {
        let (scope, rx) = scope(ProgressRange::FULL, 1.0);
        let progress = Progress::with_scope(scope, 0.0, 0.5, 10);
        progress.report().unwrap();
        progress.report_msg("loading").unwrap();
        let messages: Vec<_> = rx
            .try_iter()
            .filter_map(|event| match event {
                AlgorithmEvent::Progress { message, .. } => message,
                _ => None,
            })
            .collect();
        assert_eq!(messages, ["loading"]);
    }

    #[test]
    fn reporting_is_an_interruption_point() {
        let (scope, _rx) = scope(ProgressRange::FULL, 0.01);
        let token = scope.token.clone();
        let progress = Progress::with_scope(scope, 0.0, 1.0, 4);
        progress.report().unwrap();
        token.cancel();
        assert_eq!(progress.report(), Err(Cancelled));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let notifier = EventNotifier::new();
        let rx = notifier.subscribe();
        drop(notifier.subscribe());
        notifier.emit(AlgorithmEvent::Started {
            algorithm: "Scale".into(),
        });
        assert_eq!(rx.try_iter().count(), 1);
        assert!(notifier.has_subscribers());
        drop(rx);
        notifier.emit(AlgorithmEvent::Started {
            algorithm: "Scale".into(),
        });
        assert!(!notifier.has_subscribers());
    }
}
