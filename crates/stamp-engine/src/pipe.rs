//! Bounded in-process byte pipe and the package round trip built on it.
//!
//! The writer half sends fixed-size chunks over a `sync_channel`; a full
//! channel blocks the writer until the reader catches up, so both halves must
//! run concurrently. A writer that fails calls [`PipeWriter::abort`] and the
//! reader sees a `BrokenPipe` error instead of a truncated stream.

use std::io::{self, BufReader, Read, Write};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;

use stamp_dom::Package;

use crate::error::{StampError, StampErrorKind};

/// Bytes buffered before a chunk is sent.
const CHUNK_SIZE: usize = 16 * 1024;
/// Chunks in flight before the writer blocks.
const PIPE_CAPACITY: usize = 4;

enum Chunk {
    Data(Vec<u8>),
    Abort(String),
}

/// Create a connected writer/reader pair holding at most `capacity` chunks.
#[must_use]
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (sender, receiver) = sync_channel(capacity);
    (
        PipeWriter {
            sender,
            buffer: Vec::with_capacity(CHUNK_SIZE),
        },
        PipeReader {
            receiver,
            current: Vec::new(),
            position: 0,
        },
    )
}

/// Sending half of a [`pipe`].
pub struct PipeWriter {
    sender: SyncSender<Chunk>,
    buffer: Vec<u8>,
}

impl PipeWriter {
    /// Flush buffered bytes and close the pipe.
    pub fn finish(mut self) -> io::Result<()> {
        self.flush()
    }

    /// Close the pipe so the reader fails with `message`.
    pub fn abort(self, message: impl Into<String>) {
        // The reader may already be gone; nothing is left to tell.
        let _ = self.sender.send(Chunk::Abort(message.into()));
    }

    fn send_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buffer, Vec::with_capacity(CHUNK_SIZE));
        self.sender
            .send(Chunk::Data(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = CHUNK_SIZE - self.buffer.len();
        let taken = buf.len().min(room);
        self.buffer.extend_from_slice(&buf[..taken]);
        if self.buffer.len() >= CHUNK_SIZE {
            self.send_buffer()?;
        }
        Ok(taken)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffer()
    }
}

/// Receiving half of a [`pipe`]. Reads end when the writer is dropped.
pub struct PipeReader {
    receiver: Receiver<Chunk>,
    current: Vec<u8>,
    position: usize,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.position >= self.current.len() {
            match self.receiver.recv() {
                Ok(Chunk::Data(data)) => {
                    self.current = data;
                    self.position = 0;
                }
                Ok(Chunk::Abort(message)) => {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, message));
                }
                Err(_) => return Ok(0),
            }
        }
        let available = &self.current[self.position..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }
}

/// Parse `bytes` into an independent package, apply `stamp` to it and hand
/// the serialized result back through a pipe.
///
/// A producer thread parses, stamps and writes while this thread parses the
/// reading end. When the producer fails the pipe is aborted; its error is
/// returned with the reader's failure attached as suppressed. The producer is
/// always joined before returning.
pub fn round_trip<F>(bytes: &[u8], stamp: F) -> Result<Package, StampError>
where
    F: FnOnce(&mut Package) -> Result<(), StampError> + Send,
{
    let (writer, reader) = pipe(PIPE_CAPACITY);
    thread::scope(|scope| {
        let producer = scope.spawn(move || produce(bytes, stamp, writer));
        let consumed = Package::read_from(BufReader::new(reader)).map_err(|e| {
            StampError::new(StampErrorKind::Io, "cannot read stamped sub-document").with_source(e)
        });
        let produced = producer.join().unwrap_or_else(|_| {
            Err(StampError::io(io::Error::other(
                "sub-document producer panicked",
            )))
        });

        match (produced, consumed) {
            (Ok(()), Ok(package)) => Ok(package),
            (Ok(()), Err(consumer)) => Err(consumer),
            (Err(producer), Ok(_)) => Err(producer),
            (Err(producer), Err(consumer)) => Err(producer.with_suppressed(consumer)),
        }
    })
}

fn produce<F>(bytes: &[u8], stamp: F, mut writer: PipeWriter) -> Result<(), StampError>
where
    F: FnOnce(&mut Package) -> Result<(), StampError>,
{
    let result = Package::parse(bytes)
        .map_err(|e| {
            StampError::new(StampErrorKind::Io, "cannot parse sub-document").with_source(e)
        })
        .and_then(|mut package| {
            stamp(&mut package)?;
            package.write_to(&mut writer).map_err(StampError::io)
        });
    match result {
        Ok(()) => writer.finish().map_err(StampError::io),
        Err(err) => {
            tracing::debug!(error = %err, "Aborting sub-document pipe");
            writer.abort(err.to_string());
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const DOCUMENT: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>hello</w:t></w:r></w:p></w:body></w:document>"#;

    #[test]
    fn test_pipe_transfers_large_payload() {
        let (mut writer, mut reader) = pipe(1);
        let payload: Vec<u8> = (0..100_000u32)
            .map(|i| u8::try_from(i % 251).unwrap())
            .collect();
        let expected = payload.clone();

        let received = thread::scope(|scope| {
            scope.spawn(move || {
                writer.write_all(&payload).unwrap();
                writer.finish().unwrap();
            });
            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap();
            out
        });
        assert_eq!(received, expected);
    }

    #[test]
    fn test_abort_breaks_reader() {
        let (mut writer, mut reader) = pipe(4);
        writer.write_all(b"partial").unwrap();
        writer.flush().unwrap();
        writer.abort("producer failed");

        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(out, b"partial");
    }

    #[test]
    fn test_round_trip_is_independent() {
        let source = Package::from_document_xml(DOCUMENT).unwrap();
        let bytes = source.to_bytes();

        let result = round_trip(&bytes, |package| {
            let tree = package.document_mut();
            let body = tree.body().unwrap();
            let p = tree.children(body)[0];
            crate::paragraph::set_text(tree, p, "stamped");
            Ok(())
        })
        .unwrap();

        let tree = result.document();
        assert_eq!(tree.text_content(tree.root()), "stamped");
        let original = source.document();
        assert_eq!(original.text_content(original.root()), "hello");
    }

    #[test]
    fn test_producer_error_wins_with_suppressed_reader_error() {
        let bytes = Package::from_document_xml(DOCUMENT).unwrap().to_bytes();
        let err = round_trip(&bytes, |_| Err(StampError::structural("bad template"))).unwrap_err();

        assert_eq!(err.kind, StampErrorKind::Structural);
        assert_eq!(err.suppressed().len(), 1);
        assert_eq!(err.suppressed()[0].kind, StampErrorKind::Io);
    }

    #[test]
    fn test_unparseable_input_is_io() {
        let err = round_trip(b"not xml", |_| Ok(())).unwrap_err();
        assert_eq!(err.kind, StampErrorKind::Io);
        assert!(err.downcast_source::<stamp_dom::DomError>().is_some());
    }
}
