//! Line sources and the producer task that feeds them into the queue

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SourceError;
use crate::types::{Line, Provenance};

const STDIN_ID: &str = "<stdin>";

/// A named sequence of NDJSON lines
#[derive(Debug, Clone)]
pub enum Source {
    File(PathBuf),
    Stdin,
    Memory { name: String, bytes: Vec<u8> },
}

impl Source {
    /// Interpret a command-line argument; `-` means stdin
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Source::Stdin
        } else {
            Source::File(PathBuf::from(arg))
        }
    }

    pub fn memory(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Source::Memory {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Identifier recorded in provenance
    pub fn id(&self) -> String {
        match self {
            Source::File(path) => path.display().to_string(),
            Source::Stdin => STDIN_ID.to_string(),
            Source::Memory { name, .. } => name.clone(),
        }
    }

    async fn open(self) -> std::io::Result<Box<dyn AsyncBufRead + Send + Unpin>> {
        match self {
            Source::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Box::new(BufReader::new(file)))
            }
            Source::Stdin => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
            Source::Memory { bytes, .. } => Ok(Box::new(Cursor::new(bytes))),
        }
    }
}

/// Read `source` line by line and enqueue every line with its provenance.
///
/// Lines are split on `\n` with a trailing `\r` removed and passed on as raw
/// bytes; a line that is not valid UTF-8 fails on its own once decoded.
/// Returns the number of lines enqueued. Stops early, without error, when
/// `cancel` fires or the queue is closed.
pub(crate) async fn produce(
    source: Source,
    queue: mpsc::Sender<Line>,
    cancel: CancellationToken,
) -> Result<u64, SourceError> {
    let source_id: Arc<str> = Arc::from(source.id());
    let mut reader = source.open().await.map_err(|error| SourceError::Open {
        source_id: source_id.to_string(),
        error,
    })?;

    let mut line_number = 0u64;
    let mut enqueued = 0u64;

    loop {
        let mut bytes = Vec::new();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            read = reader.read_until(b'\n', &mut bytes) => read,
        };

        match read {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => {
                return Err(SourceError::Read {
                    source_id: source_id.to_string(),
                    line: line_number,
                    error,
                })
            }
        }

        strip_line_ending(&mut bytes);
        line_number += 1;
        let line = Line::new(bytes, Provenance::new(Arc::clone(&source_id), line_number));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = queue.send(line) => {
                if sent.is_err() {
                    break;
                }
                enqueued += 1;
            }
        }
    }

    debug!(source = %source_id, lines = enqueued, "source finished");
    Ok(enqueued)
}

fn strip_line_ending(bytes: &mut Vec<u8>) {
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_arg() {
        assert!(matches!(Source::from_arg("-"), Source::Stdin));
        assert!(matches!(Source::from_arg("a.ndjson"), Source::File(_)));
        assert_eq!(Source::from_arg("a.ndjson").id(), "a.ndjson");
        assert_eq!(Source::Stdin.id(), "<stdin>");
    }

    #[tokio::test]
    async fn test_produce_numbers_lines_from_one() {
        let (tx, mut rx) = mpsc::channel(16);
        let source = Source::memory("mem", "{\"a\":1}\r\n\n{\"b\":2}");

        let enqueued = produce(source, tx, CancellationToken::new()).await.unwrap();
        assert_eq!(enqueued, 3);

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].bytes, b"{\"a\":1}");
        assert_eq!(lines[0].provenance, Provenance::new("mem", 1));
        assert!(lines[1].bytes.is_empty());
        assert_eq!(lines[2].bytes, b"{\"b\":2}");
        assert_eq!(lines[2].provenance.line, 3);
    }

    #[tokio::test]
    async fn test_produce_keeps_going_past_invalid_utf8() {
        let (tx, mut rx) = mpsc::channel(16);
        let source = Source::memory("mem", b"{\"a\":1}\n{\"b\":\"\xff\xfe\"}\r\n{\"c\":3}\n".to_vec());

        let enqueued = produce(source, tx, CancellationToken::new()).await.unwrap();
        assert_eq!(enqueued, 3);

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(lines[1].bytes, b"{\"b\":\"\xff\xfe\"}");
        assert_eq!(lines[1].provenance.line, 2);
        assert_eq!(lines[2].bytes, b"{\"c\":3}");
    }

    #[tokio::test]
    async fn test_produce_missing_file() {
        let (tx, _rx) = mpsc::channel(1);
        let source = Source::File(PathBuf::from("/definitely/not/here.ndjson"));

        let err = produce(source, tx, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SourceError::Open { .. }));
        assert_eq!(err.source_id(), "/definitely/not/here.ndjson");
    }

    #[tokio::test]
    async fn test_produce_stops_when_cancelled() {
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let enqueued = produce(Source::memory("mem", "{}\n{}\n"), tx, cancel).await.unwrap();
        assert_eq!(enqueued, 0);
        assert!(rx.recv().await.is_none());
    }
}
