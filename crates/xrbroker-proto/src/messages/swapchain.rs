use serde::{Deserialize, Serialize};

use crate::types::SwapchainInfo;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwapchainCreateArgs {
    pub info: SwapchainInfo,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwapchainCreateReply {
    pub swapchain_id: u32,
    pub image_count: u32,
    pub allocation_size: u64,
    pub use_dedicated_allocation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapchainImportArgs {
    pub info: SwapchainInfo,
    pub image_sizes: Vec<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwapchainImportReply {
    pub swapchain_id: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwapchainAcquireImageArgs {
    pub swapchain_id: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwapchainAcquireImageReply {
    pub image_index: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwapchainWaitImageArgs {
    pub swapchain_id: u32,
    pub timeout_ns: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SwapchainWaitImageReply;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwapchainReleaseImageArgs {
    pub swapchain_id: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SwapchainReleaseImageReply;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwapchainDestroyArgs {
    pub swapchain_id: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SwapchainDestroyReply;
