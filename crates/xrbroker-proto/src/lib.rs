//! Wire protocol: the tag enumeration, fixed-shape request/reply bodies,
//! and result codes (spec §6.1, §6.3). Bodies are plain structs encoded
//! with `bincode` over the message channel (`xrbroker-core::channel`); OS
//! handles never pass through this encoding; they travel as a separate
//! ancillary-data parameter alongside the encoded body.

pub mod error;
pub mod limits;
pub mod messages;
pub mod result;
pub mod types;

pub use error::ChannelError;
pub use messages::{HandleCount, Reply, Request, RequestTag, TagMeta, WireReply};
pub use result::ResultCode;
