use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use bytes::{Buf, BytesMut};

use crate::error::{CloseReason, DuplexError, Result};

/// Inbound byte queue of one endpoint.
///
/// The demultiplex loop is the only producer. Any number of readers may
/// consume; each read takes a contiguous run from the front of the queue.
pub(crate) struct Inbound {
    state: Mutex<InboundState>,
    readable: Condvar,
}

struct InboundState {
    buf: BytesMut,
    closed: Option<CloseReason>,
}

impl Inbound {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(InboundState {
                buf: BytesMut::with_capacity(capacity),
                closed: None,
            }),
            readable: Condvar::new(),
        }
    }

    /// Append forwarded payload bytes and wake waiting readers.
    pub(crate) fn push(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut state = lock(&self.state);
        state.buf.extend_from_slice(data);
        drop(state);
        self.readable.notify_all();
    }

    /// Copy up to `out.len()` queued bytes into `out` (blocking).
    ///
    /// Queued bytes are handed out even after closure. Once the queue is
    /// empty a closed queue reports end-of-stream (`Ok(0)`) for an orderly
    /// close and `Closed` for a failure.
    pub(crate) fn read(&self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        let mut state = lock(&self.state);
        loop {
            if !state.buf.is_empty() {
                let n = out.len().min(state.buf.len());
                out[..n].copy_from_slice(&state.buf[..n]);
                state.buf.advance(n);
                return Ok(n);
            }
            match &state.closed {
                Some(reason) if reason.is_clean() => return Ok(0),
                Some(reason) => return Err(DuplexError::Closed(reason.clone())),
                None => {
                    state = self
                        .readable
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Mark the queue closed and wake every waiting reader.
    pub(crate) fn close(&self, reason: CloseReason) {
        let mut state = lock(&self.state);
        if state.closed.is_none() {
            state.closed = Some(reason);
        }
        drop(state);
        self.readable.notify_all();
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.state).buf.len()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
