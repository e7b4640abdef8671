//! Per-client capacity and shared-memory sizing constants (spec §3, §6.2).

pub const MAX_CLIENTS: usize = 16;
pub const MAX_SWAPCHAINS: usize = 32;
pub const MAX_SEMAPHORES: usize = 8;
pub const MAX_SPACES: usize = 128;
/// Slots `0..SEMANTIC_SPACE_COUNT` of the space table are reserved for the
/// semantic spaces mirrored from the overseer (spec §3, §4.B).
pub const SEMANTIC_SPACE_COUNT: usize = 6;
pub const REFERENCE_SPACE_TYPE_COUNT: usize = 6;

pub const MAX_DEVICES: usize = 8;
pub const MAX_SLOTS: usize = 3;
pub const MAX_LAYERS: usize = 16;
pub const IPC_MAX_RAW_VIEWS: usize = 2;

/// Sentinel for a semantic space the overseer does not expose (spec §4.B).
pub const SPACE_ID_INVALID: u32 = u32::MAX;
