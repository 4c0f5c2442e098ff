//! Background voice-leading optimization with generation tagging

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use comper_core::{ChordEvent, VoiceLeadingOptimizer, Voicing};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Optimizer worker is not running")]
    NotRunning,
    #[error("Optimizer worker disconnected")]
    Disconnected,
    #[error("Timed out waiting for generation {0}")]
    Timeout(u64),
}

/// Finished optimization for one submitted generation
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizationOutcome {
    Complete { generation: u64, voicings: Vec<Voicing> },
    Failed { generation: u64, reason: String },
}

impl OptimizationOutcome {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Complete { generation, .. } | Self::Failed { generation, .. } => *generation,
        }
    }
}

struct Request {
    generation: u64,
    events: Vec<ChordEvent>,
}

type Job = dyn Fn(&[ChordEvent]) -> Vec<Voicing> + Send;

/// Runs voice-leading optimization off the calling thread
///
/// Only the newest submitted generation is trusted: queued requests that
/// have been superseded are skipped, and stale results are dropped on read.
/// A result is published only once the whole progression is optimized.
pub struct OptimizerWorker {
    request_tx: Option<Sender<Request>>,
    result_rx: Receiver<OptimizationOutcome>,
    generation: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl OptimizerWorker {
    pub fn new(optimizer: VoiceLeadingOptimizer) -> Self {
        Self::with_job(move |events| optimizer.optimize_progression(events))
    }

    /// Worker running an arbitrary optimization job
    pub fn with_job<F>(job: F) -> Self
    where
        F: Fn(&[ChordEvent]) -> Vec<Voicing> + Send + 'static,
    {
        let (request_tx, request_rx) = unbounded::<Request>();
        let (result_tx, result_rx) = unbounded::<OptimizationOutcome>();
        let generation = Arc::new(AtomicU64::new(0));

        let latest = generation.clone();
        let job: Box<Job> = Box::new(job);
        let handle = thread::spawn(move || {
            Self::run_loop(request_rx, result_tx, latest, job);
        });

        info!("Optimizer worker started");
        Self {
            request_tx: Some(request_tx),
            result_rx,
            generation,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.request_tx.is_some()
    }

    /// Most recently submitted generation (0 before any submission)
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Queue a progression, superseding every earlier submission
    pub fn submit(&self, events: Vec<ChordEvent>) -> Result<u64, WorkerError> {
        let tx = self.request_tx.as_ref().ok_or(WorkerError::NotRunning)?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tx.send(Request { generation, events })
            .map_err(|_| WorkerError::Disconnected)?;
        debug!(generation, "Optimization submitted");
        Ok(generation)
    }

    /// Result for the current generation, if it has finished
    pub fn latest(&self) -> Option<OptimizationOutcome> {
        let current = self.current_generation();
        let mut found = None;
        while let Ok(outcome) = self.result_rx.try_recv() {
            if outcome.generation() == current {
                found = Some(outcome);
            } else {
                debug!(generation = outcome.generation(), current, "Discarding stale result");
            }
        }
        found
    }

    /// Block until `generation` finishes, discarding other results
    pub fn wait_for(
        &self,
        generation: u64,
        timeout: Duration,
    ) -> Result<OptimizationOutcome, WorkerError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.result_rx.recv_timeout(remaining) {
                Ok(outcome) if outcome.generation() == generation => return Ok(outcome),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => return Err(WorkerError::Timeout(generation)),
                Err(RecvTimeoutError::Disconnected) => return Err(WorkerError::Disconnected),
            }
        }
    }

    /// Stop accepting requests and join the worker thread
    pub fn shutdown(&mut self) {
        let Some(tx) = self.request_tx.take() else { return };
        drop(tx);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        info!("Optimizer worker stopped");
    }

    fn run_loop(
        rx: Receiver<Request>,
        tx: Sender<OptimizationOutcome>,
        latest: Arc<AtomicU64>,
        job: Box<Job>,
    ) {
        while let Ok(request) = rx.recv() {
            let generation = request.generation;
            if generation < latest.load(Ordering::SeqCst) {
                debug!(generation, "Skipping superseded request");
                continue;
            }

            let started = Instant::now();
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| job(&request.events))) {
                Ok(voicings) => {
                    debug!(
                        generation,
                        chords = voicings.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Optimization complete"
                    );
                    OptimizationOutcome::Complete { generation, voicings }
                }
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    warn!(generation, reason = %reason, "Optimization failed");
                    OptimizationOutcome::Failed { generation, reason }
                }
            };
            if tx.send(outcome).is_err() {
                break;
            }
        }
    }
}

impl Drop for OptimizerWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "optimizer panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comper_core::{Chord, ChordQuality, Progression, VoicingFamily};
    use std::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(10);

    fn events() -> Vec<ChordEvent> {
        Progression::sequential(
            vec![
                (Chord::new(2, ChordQuality::Minor7), 4.0),
                (Chord::new(7, ChordQuality::Dominant7), 4.0),
                (Chord::new(0, ChordQuality::Major7), 8.0),
            ],
            4.0,
        )
        .unwrap()
        .events
    }

    #[test]
    fn test_completes_with_one_voicing_per_chord() {
        let worker = OptimizerWorker::new(VoiceLeadingOptimizer::default());
        let generation = worker.submit(events()).unwrap();
        match worker.wait_for(generation, WAIT).unwrap() {
            OptimizationOutcome::Complete { voicings, .. } => {
                let direct = VoiceLeadingOptimizer::default().optimize_progression(&events());
                assert_eq!(voicings, direct);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_panic_becomes_failed() {
        let worker = OptimizerWorker::with_job(|_| panic!("candidate set exhausted"));
        let generation = worker.submit(events()).unwrap();
        match worker.wait_for(generation, WAIT).unwrap() {
            OptimizationOutcome::Failed { reason, .. } => assert!(reason.contains("exhausted")),
            other => panic!("unexpected outcome {other:?}"),
        }

        // The worker survives a failed job
        let next = worker.submit(Vec::new()).unwrap();
        assert!(matches!(
            worker.wait_for(next, WAIT),
            Ok(OptimizationOutcome::Failed { generation, .. }) if generation == next
        ));
    }

    #[test]
    fn test_superseded_results_are_dropped() {
        // Hold the first job until a newer generation has been submitted
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let worker = OptimizerWorker::with_job(move |events| {
            let _ = release_rx.recv_timeout(WAIT);
            vec![Voicing::new(vec![48], vec![60], VoicingFamily::Fallback); events.len()]
        });

        let first = worker.submit(events()).unwrap();
        let second = worker.submit(events()).unwrap();
        assert!(second > first);
        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();

        let outcome = worker.wait_for(second, WAIT).unwrap();
        assert_eq!(outcome.generation(), second);
        assert!(worker.latest().is_none());
    }

    #[test]
    fn test_submit_after_shutdown() {
        let mut worker = OptimizerWorker::new(VoiceLeadingOptimizer::default());
        worker.shutdown();
        assert!(!worker.is_running());
        assert!(matches!(worker.submit(events()), Err(WorkerError::NotRunning)));
    }
}
