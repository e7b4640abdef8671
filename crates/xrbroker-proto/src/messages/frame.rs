use serde::{Deserialize, Serialize};

use crate::limits::MAX_LAYERS;
use crate::types::{LayerType, Pose};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PredictFrameArgs;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PredictFrameReply {
    pub frame_id: i64,
    pub predicted_display_time_ns: i64,
    pub predicted_display_period_ns: i64,
    pub wake_up_time_ns: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WaitWokeArgs {
    pub frame_id: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WaitWokeReply;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BeginFrameArgs {
    pub frame_id: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BeginFrameReply;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DiscardFrameArgs {
    pub frame_id: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DiscardFrameReply;

/// One entry of a layer slot, as written into shared memory by the client
/// before `layer_sync`. `swapchain_ids` holds one ID per view (mono: 1,
/// stereo: 2); unused entries are `u32::MAX`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayerEntry {
    pub layer_type: LayerType,
    pub device_id: u32,
    pub pose: Pose,
    pub swapchain_ids: [u32; 2],
    /// Per-type extra payload: quad/cylinder/equirect extents, cube face
    /// index, passthrough alpha, etc. Kept as an opaque f32 bag rather than
    /// eight separate struct variants, matching the dispatch-by-tag shape
    /// the rest of the protocol already uses.
    pub extra: [f32; 8],
}

impl Default for LayerEntry {
    fn default() -> Self {
        Self {
            layer_type: LayerType::Quad,
            device_id: u32::MAX,
            pose: Pose::default(),
            swapchain_ids: [u32::MAX; 2],
            extra: [0.0; 8],
        }
    }
}

/// The shared-memory contents the client wrote for one layer slot, copied
/// out by `layer_sync` per spec §4.E.3 step 1. `layer_count` may be less
/// than `MAX_LAYERS`; trailing entries are ignored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayerSlotSnapshot {
    pub layer_count: u32,
    pub layers: [LayerEntry; MAX_LAYERS],
}

impl Default for LayerSlotSnapshot {
    fn default() -> Self {
        Self {
            layer_count: 0,
            layers: [LayerEntry::default(); MAX_LAYERS],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayerSyncArgs {
    pub slot_id: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayerSyncReply {
    pub free_slot_id: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayerSyncWithSemaphoreArgs {
    pub slot_id: u32,
    pub semaphore_id: u32,
    pub semaphore_value: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayerSyncWithSemaphoreReply {
    pub free_slot_id: u32,
}
