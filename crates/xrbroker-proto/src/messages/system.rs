use serde::{Deserialize, Serialize};

use crate::limits::MAX_CLIENTS;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SystemGetClientsArgs;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SystemGetClientsReply {
    pub client_count: u32,
    pub client_ids: [u32; MAX_CLIENTS],
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SystemGetClientInfoArgs {
    pub client_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemGetClientInfoReply {
    pub pid: u32,
    pub name: String,
    pub primary: bool,
    pub focused: bool,
    pub visible: bool,
    pub io_active: bool,
    pub z_order: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SystemSetPrimaryClientArgs {
    pub client_id: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SystemSetPrimaryClientReply;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SystemToggleIoClientArgs {
    pub client_id: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SystemToggleIoClientReply {
    pub io_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SystemSetFocusedClientArgs {
    pub client_id: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SystemSetFocusedClientReply;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InstanceGetShmFdArgs;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InstanceGetShmFdReply {
    pub size: u64,
}
