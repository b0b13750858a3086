use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use super::{AcquisitionEngine, Outcome};
use crate::input::VideoReference;
use crate::output::BatchReport;

/// Pause taken after each success so the providers see a polite request rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub base: Duration,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl Pacing {
    pub fn new(base: Duration, jitter_min: Duration, jitter_max: Duration) -> Self {
        Self {
            base,
            jitter_min,
            jitter_max,
        }
    }

    /// No pause at all
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        let span = self.jitter_max.saturating_sub(self.jitter_min).as_secs_f64();
        self.base + self.jitter_min + Duration::from_secs_f64(fastrand::f64() * span)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(Duration::from_millis(400), Duration::from_millis(50), Duration::from_millis(200))
    }
}

/// Progress hooks for a running batch
pub trait BatchObserver {
    fn on_start(&mut self, _index: usize, _reference: &VideoReference) {}

    fn on_outcome(&mut self, _index: usize, _outcome: &Outcome) {}
}

impl BatchObserver for () {}

/// Sequential driver feeding a list of references through one engine
pub struct Batch {
    engine: AcquisitionEngine,
    pacing: Pacing,
}

impl Batch {
    pub fn new(engine: AcquisitionEngine, pacing: Pacing) -> Self {
        Self { engine, pacing }
    }

    pub fn engine(&self) -> &AcquisitionEngine {
        &self.engine
    }

    /// Process `references` one at a time and report on the run.
    ///
    /// `cancel` is only looked at between references; the reference in
    /// flight always reaches its outcome. References never started are left
    /// out of the report entirely.
    pub async fn run(
        &self,
        references: &[VideoReference],
        total_in_list: usize,
        cancel: &CancellationToken,
        observer: &mut dyn BatchObserver,
    ) -> BatchReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("batch", %run_id);

        let outcomes = self.run_inner(references, cancel, observer).instrument(span).await;

        BatchReport::from_outcomes(&outcomes, total_in_list, self.engine.output_dir())
    }

    async fn run_inner(
        &self,
        references: &[VideoReference],
        cancel: &CancellationToken,
        observer: &mut dyn BatchObserver,
    ) -> Vec<Outcome> {
        info!(
            references = references.len(),
            output_dir = %self.engine.output_dir().display(),
            audio = self.engine.has_audio(),
            "Starting batch"
        );

        let mut outcomes = Vec::with_capacity(references.len());

        for (index, reference) in references.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(remaining = references.len() - index, "Batch cancelled");
                break;
            }

            observer.on_start(index, reference);
            let outcome = self.engine.process(reference).await;
            observer.on_outcome(index, &outcome);

            let succeeded = outcome.is_success();
            outcomes.push(outcome);

            let has_more = index + 1 < references.len();
            if succeeded && has_more {
                tokio::select! {
                    _ = tokio::time::sleep(self.pacing.delay()) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        outcomes
    }
}

/// Turn interrupt signals into batch cancellation.
///
/// The first signal cancels `cancel` so the batch stops after the current
/// reference. Returns `true` when a second signal arrives, meaning the caller
/// should abort immediately.
pub async fn watch_interrupts<F, Fut>(cancel: CancellationToken, mut next_signal: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }

    tracing::warn!("Interrupted, finishing the current video before stopping (Ctrl-C again to abort)");
    cancel.cancel();

    next_signal().await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacing_bounds() {
        let pacing = Pacing::default();
        for _ in 0..100 {
            let delay = pacing.delay();
            assert!(delay >= Duration::from_millis(450));
            assert!(delay <= Duration::from_millis(600));
        }
        assert_eq!(Pacing::none().delay(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_second_interrupt_requests_abort() {
        let cancel = CancellationToken::new();
        let abort = watch_interrupts(cancel.clone(), || std::future::ready(Ok(()))).await;
        assert!(abort);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_first_interrupt_only_cancels() {
        let cancel = CancellationToken::new();
        let mut signals = vec![Err(std::io::Error::other("listener closed")), Ok(())];
        let abort = watch_interrupts(cancel.clone(), || std::future::ready(signals.pop().unwrap())).await;
        assert!(!abort);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_no_signal_listener_leaves_batch_running() {
        let cancel = CancellationToken::new();
        let abort = watch_interrupts(cancel.clone(), || {
            std::future::ready(Err(std::io::Error::other("no signal support")))
        })
        .await;
        assert!(!abort);
        assert!(!cancel.is_cancelled());
    }
}
