//! Linux `io_uring` backed block I/O.
//!
//! Submission and completion follow the raw `io_uring` model the
//! `io-uring` crate exposes directly: `submit_read`/`submit_write` push a
//! submission queue entry tagged with a `user_data` request id and return
//! immediately; `poll` drains the completion queue non-blockingly
//! (`submit()` with no wait, then draining `completion()`) and matches
//! entries back to their pending buffer by id. The in-flight map keeps
//! each request's `AlignedBuf` alive until its completion is observed,
//! mirroring the ownership discipline of the mock backend and of the
//! teacher's `DmaBuf`.

use std::collections::HashMap;
use std::os::unix::io::RawFd;

use io_uring::{opcode, types, IoUring};
use tracing::instrument;

use crate::error::{Error, Result};

use super::aligned_buf::AlignedBuf;
use super::{BlockIoConfig, IoCompletion, IoOp, IoRequestId};

struct Pending {
    op: IoOp,
    buf: AlignedBuf,
}

pub struct BlockIo {
    ring: IoUring,
    config: BlockIoConfig,
    next_id: u64,
    pending: HashMap<u64, Pending>,
}

impl BlockIo {
    pub fn new(config: BlockIoConfig) -> Result<Self> {
        config.validate()?;
        let ring = IoUring::new(config.queue_depth as u32).map_err(|e| Error::AllocationFailed {
            size: config.queue_depth,
            reason: e.to_string(),
        })?;
        Ok(Self {
            ring,
            config,
            next_id: 0,
            pending: HashMap::new(),
        })
    }

    fn next_request_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    #[instrument(skip(self))]
    pub fn submit_read(&mut self, fd: RawFd, start_page: u64, num_pages: usize) -> Result<IoRequestId> {
        if self.pending.len() >= self.config.queue_depth {
            return Err(Error::IoSubmit {
                op: "read",
                fd,
                start_page,
                reason: "queue depth exceeded".into(),
            });
        }
        let mut buf = AlignedBuf::new(num_pages * super::ALIGNMENT)?;
        let offset = start_page * super::ALIGNMENT as u64;
        let id = self.next_request_id();

        let entry = opcode::Read::new(types::Fd(fd), buf.as_mut_ptr(), buf.len() as u32)
            .offset(offset)
            .build()
            .user_data(id);

        unsafe {
            self.ring.submission().push(&entry).map_err(|e| Error::IoSubmit {
                op: "read",
                fd,
                start_page,
                reason: e.to_string(),
            })?;
        }
        self.ring.submit().map_err(|e| Error::IoSubmit {
            op: "read",
            fd,
            start_page,
            reason: e.to_string(),
        })?;

        self.pending.insert(id, Pending { op: IoOp::Read, buf });
        Ok(IoRequestId(id))
    }

    #[instrument(skip(self, buf))]
    pub fn submit_write(&mut self, fd: RawFd, start_page: u64, buf: AlignedBuf) -> Result<IoRequestId> {
        if self.pending.len() >= self.config.queue_depth {
            return Err(Error::IoSubmit {
                op: "write",
                fd,
                start_page,
                reason: "queue depth exceeded".into(),
            });
        }
        let offset = start_page * super::ALIGNMENT as u64;
        let id = self.next_request_id();
        let mut owned = buf;

        let entry = opcode::Write::new(types::Fd(fd), owned.as_mut_ptr(), owned.len() as u32)
            .offset(offset)
            .build()
            .user_data(id);

        unsafe {
            self.ring.submission().push(&entry).map_err(|e| Error::IoSubmit {
                op: "write",
                fd,
                start_page,
                reason: e.to_string(),
            })?;
        }
        self.ring.submit().map_err(|e| Error::IoSubmit {
            op: "write",
            fd,
            start_page,
            reason: e.to_string(),
        })?;

        self.pending.insert(id, Pending { op: IoOp::Write, buf: owned });
        Ok(IoRequestId(id))
    }

    /// Drains whatever the kernel has completed so far. Never blocks:
    /// `submit()` is called with the default (no-wait) behavior and the
    /// completion queue is drained of whatever is already there.
    pub fn poll(&mut self) -> Vec<IoCompletion> {
        let _ = self.ring.submit();
        let mut out = Vec::new();
        let completions: Vec<_> = self.ring.completion().collect();
        for cqe in completions {
            let id = cqe.user_data();
            let Some(pending) = self.pending.remove(&id) else {
                continue;
            };
            let result = if cqe.result() < 0 {
                Err(Error::IoComplete {
                    reason: std::io::Error::from_raw_os_error(-cqe.result()).to_string(),
                })
            } else if cqe.result() as usize != pending.buf.len() {
                Err(Error::IoComplete {
                    reason: format!("short io: {} of {} bytes", cqe.result(), pending.buf.len()),
                })
            } else {
                Ok(())
            };
            out.push(IoCompletion {
                id: IoRequestId(id),
                op: pending.op,
                result,
                buf: Some(pending.buf),
            });
        }
        out
    }
}
