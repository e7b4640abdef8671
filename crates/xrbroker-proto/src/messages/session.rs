use serde::{Deserialize, Serialize};

use crate::types::SessionInfo;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionCreateArgs {
    pub info: SessionInfo,
    pub wants_compositor: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionCreateReply;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionBeginArgs {
    pub capability_flags: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionBeginReply;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionEndArgs;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionEndReply;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionDestroyArgs;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionDestroyReply;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionPollEventsArgs;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionPollEventsReply {
    pub has_event: bool,
    pub event_type: u32,
}
