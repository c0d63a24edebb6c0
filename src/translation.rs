//! Message boundary between the reconciler and the machine-translation engine.
//!
//! The reconciler only produces [`TranslationRequest`]s and hands them to a
//! [`TranslationSink`]. Resolving a request happens elsewhere: a
//! [`TranslationWorker`] pulls requests, asks a [`Translator`] for the text, and
//! writes the result back through [`Service::resolve_translation`].

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{error::Error, service::Service};

/// Request to translate one source value into one target language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct TranslationRequest {
    pub bundle_id: String,
    pub source_language: String,
    pub target_language: String,
    pub key: String,
    /// Source value at the time of the request. A result is only applied
    /// while the target entry is still derived from this exact value.
    pub source_value: String,
}

impl TranslationRequest {
    pub fn new(
        bundle_id: &str,
        source_language: &str,
        target_language: &str,
        key: &str,
        source_value: &str,
    ) -> Self {
        Self {
            bundle_id: bundle_id.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            key: key.to_string(),
            source_value: source_value.to_string(),
        }
    }

    /// Encodes the request as a JSON message.
    pub fn to_message(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a request from a JSON message.
    pub fn from_message(message: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(message)?)
    }
}

/// Destination for translation requests.
///
/// `enqueue` may fail with [`Error::Transient`]; such failures are retried by
/// the producer.
pub trait TranslationSink: Send + Sync {
    fn enqueue(&self, request: TranslationRequest) -> Result<(), Error>;
}

/// In-memory FIFO of pending translation requests.
#[derive(Debug, Default)]
pub struct TranslationQueue {
    pending: Mutex<VecDeque<TranslationRequest>>,
}

impl TranslationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Removes and returns every pending request in FIFO order.
    pub fn drain(&self) -> Vec<TranslationRequest> {
        self.pending.lock().drain(..).collect()
    }

    /// Copies the pending requests without removing them.
    pub fn snapshot(&self) -> Vec<TranslationRequest> {
        self.pending.lock().iter().cloned().collect()
    }
}

impl TranslationSink for TranslationQueue {
    fn enqueue(&self, request: TranslationRequest) -> Result<(), Error> {
        self.pending.lock().push_back(request);
        Ok(())
    }
}

/// Enqueues one request, retrying transient failures up to `max_attempts`.
pub(crate) fn enqueue_with_retry(
    sink: &dyn TranslationSink,
    request: &TranslationRequest,
    max_attempts: u32,
) -> Result<(), Error> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match sink.enqueue(request.clone()) {
            Ok(()) => return Ok(()),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                warn!(
                    bundle = %request.bundle_id,
                    language = %request.target_language,
                    key = %request.key,
                    attempt,
                    error = %err,
                    "retrying translation enqueue"
                );
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Machine-translation engine.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        source_language: &str,
        target_language: &str,
        text: &str,
    ) -> Result<String, Error>;
}

/// Counters from one worker pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Results written back to their entries.
    pub applied: usize,
    /// Results dropped because the entry moved on in the meantime.
    pub superseded: usize,
    /// Requests the translator could not handle.
    pub failed: usize,
}

/// Resolves queued requests with a [`Translator`].
pub struct TranslationWorker<T> {
    translator: T,
}

impl<T: Translator> TranslationWorker<T> {
    pub fn new(translator: T) -> Self {
        Self { translator }
    }

    /// Translates every request currently in `queue` and writes the results
    /// back to `service`.
    pub async fn run_once(&self, service: &Service, queue: &TranslationQueue) -> WorkerReport {
        let mut report = WorkerReport::default();
        for request in queue.drain() {
            let result = self
                .translator
                .translate(
                    &request.source_language,
                    &request.target_language,
                    &request.source_value,
                )
                .await;
            let failed = result.is_err();
            if let Err(err) = &result {
                warn!(
                    bundle = %request.bundle_id,
                    language = %request.target_language,
                    key = %request.key,
                    error = %err,
                    "translation failed"
                );
            }
            if service.resolve_translation(&request, result) {
                if failed {
                    report.failed += 1;
                } else {
                    report.applied += 1;
                }
            } else {
                debug!(key = %request.key, "dropped superseded translation");
                report.superseded += 1;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn request() -> TranslationRequest {
        TranslationRequest::new("app", "en", "fr", "greeting", "Hello")
    }

    /// Fails transiently a fixed number of times, then accepts.
    struct FlakySink {
        failures_left: AtomicU32,
        calls: AtomicU32,
        queue: TranslationQueue,
    }

    impl FlakySink {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
                queue: TranslationQueue::new(),
            }
        }
    }

    impl TranslationSink for FlakySink {
        fn enqueue(&self, request: TranslationRequest) -> Result<(), Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(Error::Transient("queue busy".to_string()));
            }
            self.queue.enqueue(request)
        }
    }

    #[test]
    fn test_queue_is_fifo() {
        let queue = TranslationQueue::new();
        let mut second = request();
        second.key = "farewell".to_string();
        queue.enqueue(request()).unwrap();
        queue.enqueue(second.clone()).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.snapshot().len(), 2);
        let drained = queue.drain();
        assert_eq!(drained, vec![request(), second]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_message_roundtrip() {
        let message = request().to_message().unwrap();
        assert!(message.contains("\"target_language\":\"fr\""));
        assert_eq!(TranslationRequest::from_message(&message).unwrap(), request());
    }

    #[test]
    fn test_malformed_message() {
        let result = TranslationRequest::from_message("{\"key\": 1}");
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_retry_recovers_from_transient_failures() {
        let sink = FlakySink::new(2);
        enqueue_with_retry(&sink, &request(), 3).unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.queue.len(), 1);
    }

    #[test]
    fn test_retry_gives_up_after_max_attempts() {
        let sink = FlakySink::new(5);
        let result = enqueue_with_retry(&sink, &request(), 3);
        assert!(matches!(result, Err(Error::Transient(_))));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
        assert!(sink.queue.is_empty());
    }

    #[test]
    fn test_retry_zero_attempts_still_tries_once() {
        let sink = FlakySink::new(0);
        enqueue_with_retry(&sink, &request(), 0).unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }
}
