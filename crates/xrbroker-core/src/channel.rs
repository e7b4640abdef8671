//! Component A: the per-client message channel (spec §4.A).
//!
//! An ordered, reliable duplex: a fixed-layout `bincode`-encoded body plus
//! zero or more OS handles carried as ancillary data (`SCM_RIGHTS`) on the
//! same `sendmsg`/`recvmsg` call, so identity is preserved across the
//! boundary exactly as it would be with `dup`. A truncated read, a handle
//! count mismatch, or a closed peer is fatal to the channel (spec §4.A);
//! the owning worker thread tears the client down when it sees
//! `ChannelError`.

use std::io::{IoSlice, IoSliceMut};
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::net::UnixStream;

use nix::sys::socket::{self, ControlMessage, ControlMessageOwned, MsgFlags};
use serde::{de::DeserializeOwned, Serialize};
use xrbroker_proto::ChannelError;

/// Large enough for every fixed-per-tag request/reply body this protocol
/// defines, plus the framing header. Messages never spill past one read.
const MAX_MESSAGE_BYTES: usize = 16 * 1024;
const HEADER_BYTES: usize = 4;

pub struct Channel {
    stream: UnixStream,
}

impl Channel {
    pub fn new(stream: UnixStream) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> UnixStream {
        self.stream
    }

    /// Encodes `body` and writes it, plus `handles`, as one message.
    pub fn send<T: Serialize>(&mut self, body: &T, handles: &[OwnedFd]) -> Result<(), ChannelError> {
        let payload =
            bincode::serialize(body).map_err(|e| ChannelError::Encoding(e.to_string()))?;
        if payload.len() > MAX_MESSAGE_BYTES - HEADER_BYTES {
            return Err(ChannelError::Encoding(format!(
                "encoded message ({} bytes) exceeds channel limit",
                payload.len()
            )));
        }
        let header = (payload.len() as u32).to_le_bytes();

        let raw_fds: Vec<_> = handles.iter().map(|h| h.as_raw_fd()).collect();
        let iov = [IoSlice::new(&header), IoSlice::new(&payload)];
        let cmsgs: &[ControlMessage] = if raw_fds.is_empty() {
            &[]
        } else {
            &[ControlMessage::ScmRights(&raw_fds)]
        };

        socket::sendmsg::<()>(self.stream.as_raw_fd(), &iov, cmsgs, MsgFlags::empty(), None)
            .map_err(|e| ChannelError::Io(std::io::Error::from(e)))?;
        Ok(())
    }

    /// Reads one message and decodes its body as `T`. `max_handles` bounds
    /// how many ancillary handles this call accepts; anything beyond it is
    /// a protocol violation (`ChannelError::HandleCountMismatch`) and the
    /// extra handles are dropped (closed) rather than leaked.
    pub fn recv<T: DeserializeOwned>(
        &mut self,
        max_handles: usize,
    ) -> Result<(T, Vec<OwnedFd>), ChannelError> {
        let mut buf = vec![0u8; MAX_MESSAGE_BYTES];
        let mut iov = [IoSliceMut::new(&mut buf)];
        let mut cmsg_space = nix::cmsg_space!([std::os::fd::RawFd; 16]);

        let msg = socket::recvmsg::<()>(
            self.stream.as_raw_fd(),
            &mut iov,
            Some(&mut cmsg_space),
            MsgFlags::empty(),
        )
        .map_err(|e| ChannelError::Io(std::io::Error::from(e)))?;

        if msg.bytes == 0 {
            return Err(ChannelError::Closed);
        }
        if msg.bytes < HEADER_BYTES {
            return Err(ChannelError::Truncated {
                expected: HEADER_BYTES,
                got: msg.bytes,
            });
        }

        let body_len = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        if msg.bytes < HEADER_BYTES + body_len {
            return Err(ChannelError::Truncated {
                expected: HEADER_BYTES + body_len,
                got: msg.bytes,
            });
        }

        let body: T = bincode::deserialize(&buf[HEADER_BYTES..HEADER_BYTES + body_len])
            .map_err(|e| ChannelError::Encoding(e.to_string()))?;

        let mut handles = Vec::new();
        for cmsg in msg.cmsgs().map_err(|e| ChannelError::Io(std::io::Error::from(e)))? {
            if let ControlMessageOwned::ScmRights(fds) = cmsg {
                for fd in fds {
                    use std::os::fd::FromRawFd;
                    handles.push(unsafe { OwnedFd::from_raw_fd(fd) });
                }
            }
        }

        if handles.len() > max_handles {
            return Err(ChannelError::HandleCountMismatch {
                expected: max_handles,
                got: handles.len(),
            });
        }

        Ok((body, handles))
    }
}
