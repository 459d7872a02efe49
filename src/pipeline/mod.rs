//! Ingestion pipeline
//!
//! # Architecture
//!
//! - **Producers**: one Tokio task per source reads lines and pushes them into
//!   a bounded queue, awaiting when it is full.
//! - **Workers**: a fixed pool on Tokio's blocking thread pool decodes lines and
//!   merges them into the shared `SchemaTree`.
//!
//! Completion is a closed-queue drain: the queue closes when the last producer
//! drops its sender, every worker returns once it sees the closed, empty
//! queue, and the pipeline awaits every worker before taking the tree back.

mod source;
mod worker;

pub use source::Source;
pub use worker::{decode_line, LineCounts, SamplingGate};

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::IngestConfig;
use crate::error::{ConfigError, LineError, SourceError};
use crate::schema::{Schema, SchemaTree, Traverser};
use crate::types::Line;

use worker::{LineCounters, Worker};

/// Outcome of one ingestion run
#[derive(Debug)]
pub struct IngestReport {
    /// The merged schema, final once the run has drained
    pub schema: Schema,
    pub counts: LineCounts,
    /// Lines handed to workers by all producers
    pub lines_enqueued: u64,
    /// Every line that failed to decode or had field errors
    pub errors: Vec<LineError>,
    /// Sources that could not be opened or read to the end
    pub source_errors: Vec<SourceError>,
    pub workers: usize,
    pub elapsed: Duration,
    /// True if the run was cancelled before every source was read
    pub cancelled: bool,
}

impl IngestReport {
    /// True if no source could be read at all
    pub fn all_sources_failed(&self, sources: usize) -> bool {
        sources > 0 && self.source_errors.len() == sources
    }
}

/// Runs the producer/worker fan-out over a set of sources
pub struct Pipeline {
    config: IngestConfig,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: IngestConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Pipeline {
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned token to cancel the run
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest every source and return the merged schema.
    ///
    /// Per-line failures and unreadable sources are reported in the result;
    /// only an empty source list is an error.
    pub async fn run(&self, sources: Vec<Source>) -> Result<IngestReport, ConfigError> {
        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let start = Instant::now();
        let worker_count = self.config.worker_count(sources.len());
        info!(
            sources = sources.len(),
            workers = worker_count,
            queue_capacity = self.config.queue_capacity,
            sampling_percentage = self.config.sampling_percentage,
            "starting ingestion"
        );

        let tree = Arc::new(SchemaTree::new());
        let counters = Arc::new(LineCounters::default());
        let traverser = Traverser::new(self.config.infer, self.config.max_depth);
        let gate = SamplingGate::new(self.config.sampling_percentage);

        let (line_tx, line_rx) = mpsc::channel::<Line>(self.config.queue_capacity);
        let queue = Arc::new(Mutex::new(line_rx));
        let (error_tx, mut error_rx) = mpsc::unbounded_channel::<LineError>();

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let worker = Worker::new(
                id,
                Arc::clone(&tree),
                Arc::clone(&counters),
                traverser.clone(),
                gate,
                self.config.sampling_seed,
                error_tx.clone(),
            );
            let queue = Arc::clone(&queue);
            workers.push(tokio::task::spawn_blocking(move || worker.run(&queue)));
        }
        drop(error_tx);

        let mut producers = JoinSet::new();
        for input in sources {
            producers.spawn(source::produce(input, line_tx.clone(), self.cancel.clone()));
        }
        // Producers hold the only senders from here on
        drop(line_tx);

        let mut lines_enqueued = 0;
        let mut source_errors = Vec::new();
        while let Some(joined) = producers.join_next().await {
            match joined {
                Ok(Ok(lines)) => lines_enqueued += lines,
                Ok(Err(e)) => {
                    error!(source = e.source_id(), error = %e, "source failed");
                    source_errors.push(e);
                }
                Err(e) => error!(error = %e, "producer task failed"),
            }
        }

        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task failed");
            }
        }

        let mut errors = Vec::new();
        while let Some(e) = error_rx.recv().await {
            errors.push(e);
        }

        let schema = match Arc::try_unwrap(tree) {
            Ok(tree) => tree.into_schema(),
            Err(shared) => shared.snapshot(),
        };
        let counts = counters.snapshot();
        let elapsed = start.elapsed();
        let cancelled = self.cancel.is_cancelled();

        info!(
            fields = schema.len(),
            total_lines = counts.total,
            processed_lines = counts.processed,
            failed_lines = counts.failed,
            elapsed_ms = elapsed.as_millis() as u64,
            cancelled,
            "ingestion finished"
        );

        Ok(IngestReport {
            schema,
            counts,
            lines_enqueued,
            errors,
            source_errors,
            workers: worker_count,
            elapsed,
            cancelled,
        })
    }
}
