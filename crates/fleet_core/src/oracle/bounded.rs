use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use super::{Decision, DecisionOracle, OracleRequest};
use crate::error::OracleError;

/// Runs each call on a worker thread and gives up after `timeout`.
///
/// A call that times out keeps running in the background; its answer is
/// discarded when it finally arrives.
pub struct BoundedOracle {
    inner: Arc<dyn DecisionOracle>,
    timeout: Duration,
}

impl BoundedOracle {
    pub fn new(inner: Arc<dyn DecisionOracle>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl DecisionOracle for BoundedOracle {
    fn propose(&self, request: &OracleRequest) -> Result<Decision, OracleError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let request = request.clone();
        thread::Builder::new()
            .name("oracle-call".to_string())
            .spawn(move || {
                // Receiver is gone after a timeout; nothing to do with the answer.
                let _ = tx.send(inner.propose(&request));
            })
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "oracle call timed out");
                Err(OracleError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(OracleError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MatchConstraints;

    struct Sleepy(Duration);

    impl DecisionOracle for Sleepy {
        fn propose(&self, _request: &OracleRequest) -> Result<Decision, OracleError> {
            thread::sleep(self.0);
            Ok(Decision::Continue {
                rationale: "woke up".to_string(),
            })
        }
    }

    struct Panicky;

    impl DecisionOracle for Panicky {
        fn propose(&self, _request: &OracleRequest) -> Result<Decision, OracleError> {
            panic!("backend blew up");
        }
    }

    fn request() -> OracleRequest {
        OracleRequest::Matching {
            candidates: Vec::new(),
            constraints: MatchConstraints {
                total_vehicles: 0,
                available_vehicles: 0,
                available_loads: 0,
                target_utilization: 0.85,
                min_profit_margin: 0.12,
            },
        }
    }

    #[test]
    fn fast_answer_passes_through() {
        let oracle = BoundedOracle::new(Arc::new(Sleepy(Duration::ZERO)), Duration::from_secs(5));
        let decision = oracle.propose(&request()).expect("answer");
        assert_eq!(decision.rationale(), "woke up");
    }

    #[test]
    fn slow_answer_times_out() {
        let oracle = BoundedOracle::new(
            Arc::new(Sleepy(Duration::from_millis(500))),
            Duration::from_millis(20),
        );
        assert!(matches!(
            oracle.propose(&request()),
            Err(OracleError::Timeout(_))
        ));
    }

    #[test]
    fn panicking_worker_is_reported_as_disconnected() {
        let oracle = BoundedOracle::new(Arc::new(Panicky), Duration::from_secs(5));
        assert_eq!(oracle.propose(&request()), Err(OracleError::Disconnected));
    }
}
