// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::engine::core::{Engine, EngineError};
use crate::engine::pipeline::panic_message;
use crate::engine::result::{DeobfuscationRequest, DeobfuscationResult};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub type RunOutcome = Result<DeobfuscationResult, EngineError>;

/// Runs the engine off the caller's thread with a timeout per unit of work.
pub struct EngineRunner {
    engine: Arc<Engine>,
    timeout: Duration,
    worker_threads: usize,
}

impl EngineRunner {
    pub fn new(config: Config) -> Self {
        Self::with_engine(Arc::new(Engine::new(config)))
    }

    pub fn with_engine(engine: Arc<Engine>) -> Self {
        let timeout = engine.config().timeout();
        let worker_threads = engine.config().worker_threads.max(1);
        Self {
            engine,
            timeout,
            worker_threads,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn submit(&self, request: DeobfuscationRequest) -> Result<EngineHandle, EngineError> {
        let engine = Arc::clone(&self.engine);
        let (tx, rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("deobfuscate-worker".to_string())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.deobfuscate(&request)))
                    .map_err(|payload| EngineError::WorkerCrashed(panic_message(payload.as_ref())));
                let _ = tx.send(outcome);
            })?;

        Ok(EngineHandle {
            thread_handle: Some(handle),
            result_receiver: rx,
            submitted: Instant::now(),
        })
    }

    /// Submits one request and blocks until it finishes or the timeout expires.
    pub fn run(&self, request: DeobfuscationRequest) -> RunOutcome {
        self.submit(request)?.wait_timeout(self.timeout)
    }

    /// Runs independent requests in parallel. Output order matches input order.
    pub fn run_batch(&self, requests: Vec<DeobfuscationRequest>) -> Vec<RunOutcome> {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_threads)
            .thread_name(|i| format!("deobfuscate-batch-{}", i))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                let message = e.to_string();
                return requests
                    .into_iter()
                    .map(|_| Err(EngineError::Pool(message.clone())))
                    .collect();
            }
        };

        log::debug!("Running batch of {} on {} threads", requests.len(), self.worker_threads);
        pool.install(|| requests.into_par_iter().map(|r| self.run(r)).collect())
    }
}

/// Pending result of one submitted request. Dropping it discards the result.
pub struct EngineHandle {
    thread_handle: Option<thread::JoinHandle<()>>,
    result_receiver: Receiver<RunOutcome>,
    submitted: Instant,
}

impl EngineHandle {
    pub fn wait(mut self) -> RunOutcome {
        let outcome = self.result_receiver.recv().unwrap_or(Err(EngineError::Disconnected));
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        outcome
    }

    pub fn wait_timeout(mut self, timeout: Duration) -> RunOutcome {
        match self.result_receiver.recv_timeout(timeout) {
            Ok(outcome) => {
                if let Some(handle) = self.thread_handle.take() {
                    let _ = handle.join();
                }
                outcome
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Worker still running after {:?}, abandoning result", self.elapsed());
                Err(EngineError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Disconnected),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.submitted.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::WorkingBuffer;
    use crate::engine::phase::{Phase, PhaseContext, PhaseError, PhaseKind, PhaseOutcome};
    use crate::engine::pipeline::PipelineBuilder;

    struct Sleepy(Duration);

    impl Phase for Sleepy {
        fn kind(&self) -> PhaseKind {
            PhaseKind::Cleanup
        }

        fn apply(&self, buffer: WorkingBuffer, _ctx: &PhaseContext<'_>) -> Result<PhaseOutcome, PhaseError> {
            thread::sleep(self.0);
            Ok(PhaseOutcome::new(self.kind(), buffer))
        }
    }

    #[test]
    fn test_run_returns_result() {
        let runner = EngineRunner::new(Config::default());
        let result = runner.run(DeobfuscationRequest::new("print(string.char(72,105))")).unwrap();
        assert_eq!(result.deobfuscated_code(), "print(\"Hi\")");
    }

    #[test]
    fn test_timeout_is_reported() {
        let pipeline = PipelineBuilder::new().phase(Sleepy(Duration::from_millis(500))).build();
        let engine = Arc::new(Engine::with_pipeline(Config::default(), pipeline));
        let runner = EngineRunner::with_engine(engine).with_timeout(Duration::from_millis(20));

        match runner.run(DeobfuscationRequest::new("print(1)")) {
            Err(EngineError::Timeout(d)) => assert_eq!(d, Duration::from_millis(20)),
            other => panic!("expected timeout, got {:?}", other.map(|r| r.changes_made())),
        }
    }

    #[test]
    fn test_handle_wait() {
        let runner = EngineRunner::new(Config::default());
        let handle = runner.submit(DeobfuscationRequest::new("print(1)")).unwrap();
        assert!(handle.elapsed() < Duration::from_secs(5));
        let result = handle.wait().unwrap();
        assert_eq!(result.detected_type(), "Unknown");
    }

    #[test]
    fn test_batch_keeps_order() {
        let runner = EngineRunner::new(Config::default()).with_worker_threads(2);
        let outcomes = runner.run_batch(vec![
            DeobfuscationRequest::new("print(string.char(65))"),
            DeobfuscationRequest::new("--[[MOONSEC]]\nprint(1)"),
            DeobfuscationRequest::new("print(2)"),
        ]);
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].as_ref().unwrap().deobfuscated_code(), "print(\"A\")");
        assert_eq!(outcomes[1].as_ref().unwrap().detected_type(), "MoonSec");
        assert_eq!(outcomes[2].as_ref().unwrap().deobfuscated_code(), "print(2)");
    }
}
