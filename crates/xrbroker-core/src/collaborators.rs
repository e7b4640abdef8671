//! Component 6.4: the collaborator interfaces the core consumes but does
//! not implement — the compositor, the space overseer, the system
//! compositor, and devices. Rendering, distortion correction, tracking
//! math and hardware probing live behind these traits and are out of
//! scope here (spec §1); a `mock` implementation of each is provided for
//! the handler tests in §8.
//!
//! `layer_submit` is one method rather than the eight per-layer-type
//! entry points Monado's C ABI exposes (`layer_begin`/`layer_<type>`/...):
//! reproducing that whole ABI is explicitly out of scope (spec §6.4 says
//! these are "consumed, not implemented by the core"), and the dispatcher
//! already resolves each layer to its type tag before calling down, so one
//! method carrying the resolved `ResolvedLayer` is sufficient to observe
//! "dispatch per layer type" (spec §4.E.3 step 4) without the core owning
//! eight near-duplicate trait methods.

use std::os::fd::OwnedFd;

use xrbroker_proto::types::{Fov, Pose, ReferenceSpaceType, SpaceRelation, SwapchainInfo, ViewType};
use xrbroker_proto::ResultCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpaceHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapchainHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaphoreHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

pub struct FramePrediction {
    pub frame_id: i64,
    pub predicted_display_time_ns: i64,
    pub predicted_display_period_ns: i64,
    pub wake_up_time_ns: i64,
}

pub struct SwapchainCreateResult {
    pub handle: SwapchainHandle,
    pub image_handles: Vec<OwnedFd>,
    pub image_count: u32,
    pub allocation_size: u64,
    pub use_dedicated_allocation: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedLayer {
    pub layer_type: xrbroker_proto::types::LayerType,
    pub device: Option<DeviceHandle>,
    pub pose: Pose,
    pub swapchains: [Option<SwapchainHandle>; 2],
    pub extra: [f32; 8],
}

/// One compositor session, created when a client's session is created and
/// torn down when the session is destroyed (spec §3 "session pointers",
/// §4.E.1).
pub trait Compositor: Send {
    fn begin_session(&mut self, view_type: ViewType, capability_flags: u32) -> Result<(), ResultCode>;
    fn end_session(&mut self) -> Result<(), ResultCode>;

    fn predict_frame(&mut self) -> FramePrediction;
    fn wait_woke(&mut self, frame_id: i64);
    fn begin_frame(&mut self, frame_id: i64) -> Result<(), ResultCode>;
    fn discard_frame(&mut self, frame_id: i64);

    fn create_swapchain(&mut self, info: &SwapchainInfo) -> Result<SwapchainCreateResult, ResultCode>;
    fn import_swapchain(
        &mut self,
        info: &SwapchainInfo,
        handles: Vec<OwnedFd>,
        sizes: &[u64],
    ) -> Result<SwapchainHandle, ResultCode>;
    fn destroy_swapchain(&mut self, handle: SwapchainHandle);
    fn acquire_image(&mut self, handle: SwapchainHandle) -> Result<u32, ResultCode>;
    fn wait_image(&mut self, handle: SwapchainHandle, timeout_ns: i64) -> Result<(), ResultCode>;
    fn release_image(&mut self, handle: SwapchainHandle) -> Result<(), ResultCode>;

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle, ResultCode>;
    fn destroy_semaphore(&mut self, handle: SemaphoreHandle);

    /// Begins a fresh layer submission for one `layer_sync` call.
    fn layer_begin(&mut self);
    fn layer_submit(&mut self, layer: &ResolvedLayer);
    fn layer_commit(&mut self, sync_handle: OwnedFd);
    fn layer_commit_with_semaphore(&mut self, semaphore: SemaphoreHandle, value: u64);

    fn set_performance_level(&mut self, level: i32);
    fn set_thread_hint(&mut self, hint: u32);
}

/// Creates one `Compositor` per client session (spec §4.E.1: "always
/// creates the native compositor").
pub trait CompositorFactory: Send + Sync {
    fn create_session(&self, client_id: u32) -> Box<dyn Compositor>;
}

pub trait SpaceOverseer: Send + Sync {
    /// The overseer's own handle for a semantic space, or `None` if it
    /// does not expose that reference space type (spec §4.B: sentinel
    /// `UINT32_MAX` at the wire layer when this is `None`).
    fn semantic_space(&self, ty: ReferenceSpaceType) -> Option<SpaceHandle>;

    fn create_offset_space(&self, parent: SpaceHandle, pose: Pose) -> Result<SpaceHandle, ResultCode>;
    fn create_pose_space(
        &self,
        device: DeviceHandle,
        input_name: &str,
    ) -> Result<SpaceHandle, ResultCode>;
    fn locate_space(&self, base: SpaceHandle, other: SpaceHandle) -> Result<SpaceRelation, ResultCode>;
    fn locate_device(&self, base: SpaceHandle, device: DeviceHandle) -> Result<SpaceRelation, ResultCode>;
    fn destroy_space(&self, handle: SpaceHandle);

    fn ref_space_inc(&self, ty: ReferenceSpaceType);
    fn ref_space_dec(&self, ty: ReferenceSpaceType);
    fn ref_space_count(&self, ty: ReferenceSpaceType) -> u32;

    fn recenter_local_spaces(&self);
}

pub trait SystemCompositor: Send + Sync {
    fn set_state(&self, client_id: u32, visible: bool, focused: bool);
    fn set_z_order(&self, client_id: u32, z_order: i64);
}

pub trait Device: Send + Sync {
    fn handle(&self) -> DeviceHandle;
    fn name(&self) -> &str;

    /// Named inputs this device exposes, in the fixed order that indexes
    /// its shared-memory input window (spec §4.E.5, §6.2). `HEAD_POSE` is
    /// the one name every handler treats specially.
    fn input_names(&self) -> Vec<String>;

    fn update_inputs(&self) -> Result<(), ResultCode>;
    fn get_tracked_pose(&self, input_name: &str) -> Result<(SpaceRelation, bool), ResultCode>;
    fn get_view_poses(&self, view_count: u32) -> Result<(Vec<Fov>, Vec<Pose>), ResultCode>;
    /// `None` means the device does not implement the hook; the handler
    /// synthesizes a default mask from the view's FOV (spec §4.E.5).
    fn get_visibility_mask(&self, view_index: u32) -> Option<Vec<u8>>;

    fn get_hand_tracking(&self, is_right_hand: bool) -> (bool, Vec<Pose>);
    fn get_face_tracking(&self) -> (bool, Vec<f32>);
    fn get_body_skeleton(&self) -> (bool, Vec<Pose>);
    fn get_body_joints(&self) -> (bool, Vec<Pose>, Vec<f32>);
    fn compute_distortion(&self, view_index: u32, u: f32, v: f32) -> ([f32; 2], [f32; 2], [f32; 2]);
    fn set_output(&self, name: &str, value: f32);
    fn is_form_factor_available(&self, form_factor: u32) -> bool;
}

pub mod mock;
