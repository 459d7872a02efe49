//! Inference workers
//!
//! Workers run on the blocking thread pool and share one receiver. A worker
//! keeps dequeuing until the queue is closed and empty.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::error::{DecodeError, LineError, LineErrorKind};
use crate::schema::{SchemaTree, Traverser};
use crate::types::{Line, Provenance};

/// Decode one NDJSON line.
///
/// Lines nesting containers deeper than `nesting_limit` are rejected before
/// the decoder sees them. Invalid UTF-8 is a decode error like any other.
pub fn decode_line(mut bytes: Vec<u8>, nesting_limit: usize) -> Result<Value, DecodeError> {
    if nesting_exceeds(&bytes, nesting_limit) {
        return Err(DecodeError::TooDeep { limit: nesting_limit });
    }
    simd_json::serde::from_slice::<Value>(&mut bytes).map_err(|e| DecodeError::Json(e.to_string()))
}

/// Scan for `{`/`[` nesting beyond `limit`, ignoring string contents
fn nesting_exceeds(bytes: &[u8], limit: usize) -> bool {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for &byte in bytes {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                if depth > limit {
                    return true;
                }
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    false
}

/// Admits a line to full processing with a fixed probability
#[derive(Debug, Clone, Copy)]
pub struct SamplingGate {
    percentage: u8,
}

impl SamplingGate {
    pub fn new(percentage: u8) -> Self {
        SamplingGate {
            percentage: percentage.min(100),
        }
    }

    pub fn admit<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        match self.percentage {
            100 => true,
            0 => false,
            p => rng.random_range(0..100u8) < p,
        }
    }
}

/// Line counters shared by all workers
#[derive(Debug, Default)]
pub struct LineCounters {
    total: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl LineCounters {
    pub fn snapshot(&self) -> LineCounts {
        LineCounts {
            total: self.total.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineCounts {
    /// Every line dequeued, sampled or not
    pub total: u64,
    /// Lines sampled in and merged without error
    pub processed: u64,
    /// Lines sampled in that failed to decode or had field errors
    pub failed: u64,
}

pub(crate) struct Worker {
    id: usize,
    tree: Arc<SchemaTree>,
    counters: Arc<LineCounters>,
    traverser: Traverser,
    gate: SamplingGate,
    rng: StdRng,
    errors: mpsc::UnboundedSender<LineError>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        tree: Arc<SchemaTree>,
        counters: Arc<LineCounters>,
        traverser: Traverser,
        gate: SamplingGate,
        seed: Option<u64>,
        errors: mpsc::UnboundedSender<LineError>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64)),
            None => StdRng::from_os_rng(),
        };

        Worker {
            id,
            tree,
            counters,
            traverser,
            gate,
            rng,
            errors,
        }
    }

    /// Process lines until the queue is closed and drained. Returns the
    /// number of lines this worker dequeued.
    pub(crate) fn run(mut self, queue: &Mutex<mpsc::Receiver<Line>>) -> u64 {
        let mut handled = 0;
        loop {
            let next = queue.lock().blocking_recv();
            let Some(line) = next else {
                break;
            };
            self.process(line);
            handled += 1;
        }
        trace!(worker = self.id, lines = handled, "worker drained");
        handled
    }

    pub(crate) fn process(&mut self, line: Line) {
        self.counters.total.fetch_add(1, Ordering::Relaxed);

        if !self.gate.admit(&mut self.rng) {
            return;
        }

        if line.is_blank() {
            return;
        }

        let Line { bytes, provenance } = line;
        let value = match decode_line(bytes, self.traverser.nesting_limit()) {
            Ok(value) => value,
            Err(e) => {
                self.fail(provenance, LineErrorKind::Decode(e));
                return;
            }
        };

        match self.traverser.traverse_value(&self.tree, &value, &provenance) {
            Ok(()) => {
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
            }
            Err(errors) => self.fail(provenance, LineErrorKind::Traversal(errors)),
        }
    }

    fn fail(&self, provenance: Provenance, kind: LineErrorKind) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        warn!(
            source = %provenance.source,
            line = provenance.line,
            error = %kind,
            "skipping line"
        );
        // The collector only goes away once every worker has finished
        let _ = self.errors.send(LineError { provenance, kind });
    }
}
