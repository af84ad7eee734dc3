//! Pipe I/O engine.
//!
//! Reads and writes are single native transfers: a read returns whatever the
//! pipe currently holds (blocking only while it is empty and the child still
//! has the write end open), a write returns how much the pipe accepted.
//! Callers loop for exact counts.
//!
//! EOF handling: the first read that finds the peer closed returns `Ok(0)`
//! and marks the endpoint closed; later reads fail with
//! [`PipeError::Closed`]. A broken pipe on stdin fails with
//! [`PipeError::Closed`] directly.

use crate::record::{lock, Endpoint, ProcessRecord};
use childpipe_common::{PipeError, PipeResult, StreamKind};
use std::io::{ErrorKind, Read, Write};
use std::ops::Range;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Validate a caller supplied `(offset, length)` window into a buffer of
/// `capacity` bytes.
///
/// Negative values, windows past the end, and sums that would overflow are
/// all rejected with [`PipeError::OutOfBounds`].
pub fn checked_range(capacity: usize, offset: i64, length: i64) -> PipeResult<Range<usize>> {
    let out_of_bounds = || PipeError::out_of_bounds(offset, length, capacity);

    let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
    let len = usize::try_from(length).map_err(|_| out_of_bounds())?;
    let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
    if end > capacity {
        return Err(out_of_bounds());
    }
    Ok(start..end)
}

impl ProcessRecord {
    /// Read from the child's stdout. `Ok(0)` on a non-empty buffer is EOF.
    pub fn read_stdout(&self, buf: &mut [u8]) -> PipeResult<usize> {
        self.read_endpoint(StreamKind::Stdout, &self.stdout, buf)
    }

    /// Read from the child's stderr. `Ok(0)` on a non-empty buffer is EOF.
    pub fn read_stderr(&self, buf: &mut [u8]) -> PipeResult<usize> {
        self.read_endpoint(StreamKind::Stderr, &self.stderr, buf)
    }

    /// Write to the child's stdin, returning how many bytes were accepted.
    pub fn write_stdin(&self, buf: &[u8]) -> PipeResult<usize> {
        if self.is_disposed() {
            return Err(PipeError::Disposed);
        }

        let stream = StreamKind::Stdin;
        let mut endpoint = lock(&self.stdin);
        let pipe = endpoint.pipe_mut(stream)?;
        if buf.is_empty() {
            return Ok(0);
        }

        let result = loop {
            match pipe.write(buf) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        match result {
            Ok(n) => {
                debug!("Handle {}: wrote {} of {} bytes to {}", self.id(), n, buf.len(), stream);
                Ok(n)
            }
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("Handle {}: {} peer closed", self.id(), stream);
                *endpoint = Endpoint::Closed;
                Err(PipeError::Closed { stream })
            }
            Err(e) => {
                warn!("Handle {}: write to {} failed: {}", self.id(), stream, e);
                Err(PipeError::io(stream, e))
            }
        }
    }

    /// Close the parent's end of stdin so the child observes EOF.
    pub fn close_stdin(&self) -> PipeResult<()> {
        if self.is_disposed() {
            return Err(PipeError::Disposed);
        }
        let mut endpoint = lock(&self.stdin);
        endpoint.pipe_mut(StreamKind::Stdin)?;
        *endpoint = Endpoint::Closed;
        debug!("Handle {}: stdin closed by caller", self.id());
        Ok(())
    }

    fn read_endpoint<R: Read>(
        &self,
        stream: StreamKind,
        slot: &Mutex<Endpoint<R>>,
        buf: &mut [u8],
    ) -> PipeResult<usize> {
        if self.is_disposed() {
            return Err(PipeError::Disposed);
        }

        let mut endpoint = lock(slot);
        let pipe = endpoint.pipe_mut(stream)?;
        if buf.is_empty() {
            return Ok(0);
        }

        let result = loop {
            match pipe.read(buf) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        match result {
            Ok(0) => {
                debug!("Handle {}: {} reached EOF", self.id(), stream);
                *endpoint = Endpoint::Closed;
                Ok(0)
            }
            Ok(n) => {
                debug!("Handle {}: read {} of {} bytes from {}", self.id(), n, buf.len(), stream);
                Ok(n)
            }
            Err(e) => {
                warn!("Handle {}: read from {} failed: {}", self.id(), stream, e);
                Err(PipeError::io(stream, e))
            }
        }
    }
}
