use serde::{Deserialize, Serialize};

use crate::limits::IPC_MAX_RAW_VIEWS;
use crate::types::{Fov, Pose, SpaceRelation};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceUpdateInputArgs {
    pub device_id: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeviceUpdateInputReply;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceGetTrackedPoseArgs {
    pub device_id: u32,
    pub input_name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceGetTrackedPoseReply {
    pub relation: SpaceRelation,
}

/// Fixed-capacity form of `device_get_view_poses` (spec §4.E.5): everything
/// fits in one reply when `view_count <= IPC_MAX_RAW_VIEWS`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceGetViewPosesArgs {
    pub device_id: u32,
    pub view_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceGetViewPosesReply {
    pub view_count: u32,
    pub fovs: [Fov; IPC_MAX_RAW_VIEWS],
    pub poses: [Pose; IPC_MAX_RAW_VIEWS],
}

/// Streaming form: the header is sent as the normal reply, then the
/// fov-array and pose-array are written as two additional variable-length
/// writes on the same channel (spec §4.E.5). Used when the caller does not
/// statically know a capacity, e.g. bridging to a renderer that queries an
/// arbitrary `view_count`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceGetViewPosesStreamArgs {
    pub device_id: u32,
    pub view_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceGetViewPosesStreamReply {
    pub view_count: u32,
}

/// The two variable-length trailing writes `device_get_view_poses`'s
/// streaming form sends after its reply header (spec §4.E.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewPosesPayload {
    pub fovs: Vec<Fov>,
    pub poses: Vec<Pose>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceGetVisibilityMaskArgs {
    pub device_id: u32,
    pub view_index: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceGetVisibilityMaskReply {
    pub mask_size: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceGetHandTrackingArgs {
    pub device_id: u32,
    pub is_right_hand: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceGetHandTrackingReply {
    pub active: bool,
    pub joint_poses: Vec<Pose>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceGetFaceTrackingArgs {
    pub device_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceGetFaceTrackingReply {
    pub active: bool,
    pub blend_shapes: Vec<f32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceGetBodySkeletonArgs {
    pub device_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceGetBodySkeletonReply {
    pub active: bool,
    pub joint_poses: Vec<Pose>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceGetBodyJointsArgs {
    pub device_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceGetBodyJointsReply {
    pub active: bool,
    pub joint_poses: Vec<Pose>,
    pub joint_confidences: Vec<f32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceComputeDistortionArgs {
    pub device_id: u32,
    pub view_index: u32,
    pub u: f32,
    pub v: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceComputeDistortionReply {
    pub red: [f32; 2],
    pub green: [f32; 2],
    pub blue: [f32; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSetOutputArgs {
    pub device_id: u32,
    pub name: String,
    pub value: f32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeviceSetOutputReply;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceIsFormFactorAvailableArgs {
    pub form_factor: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceIsFormFactorAvailableReply {
    pub available: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceToggleIoDeviceArgs {
    pub device_id: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceToggleIoDeviceReply {
    pub io_active: bool,
}
