//! In-memory stand-ins for the collaborator traits, used by handler tests
//! (spec §8). None of these talk to real hardware or a real compositor;
//! they track just enough state to make the broker's own bookkeeping
//! (handle lifetimes, result codes, ordering) observable.

use std::collections::HashMap;
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use xrbroker_proto::types::{Fov, Pose, ReferenceSpaceType, SpaceRelation, SwapchainInfo, ViewType};
use xrbroker_proto::ResultCode;

use super::{
    Compositor, CompositorFactory, Device, DeviceHandle, FramePrediction, ResolvedLayer,
    SemaphoreHandle, SpaceHandle, SpaceOverseer, SwapchainCreateResult, SwapchainHandle,
    SystemCompositor,
};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn next_handle() -> u64 {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

pub struct MockCompositor {
    pub client_id: u32,
    pub session_active: bool,
    pub next_frame_id: i64,
    pub swapchains: HashMap<u64, SwapchainInfo>,
    pub semaphores: Vec<u64>,
    pub committed_layers: Vec<ResolvedLayer>,
    pub commit_count: u32,
}

impl MockCompositor {
    pub fn new(client_id: u32) -> Self {
        Self {
            client_id,
            session_active: false,
            next_frame_id: 1,
            swapchains: HashMap::new(),
            semaphores: Vec::new(),
            committed_layers: Vec::new(),
            commit_count: 0,
        }
    }
}

impl Compositor for MockCompositor {
    fn begin_session(&mut self, _view_type: ViewType, _capability_flags: u32) -> Result<(), ResultCode> {
        self.session_active = true;
        Ok(())
    }

    fn end_session(&mut self) -> Result<(), ResultCode> {
        self.session_active = false;
        Ok(())
    }

    fn predict_frame(&mut self) -> FramePrediction {
        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;
        FramePrediction {
            frame_id,
            predicted_display_time_ns: frame_id * 11_111_111,
            predicted_display_period_ns: 11_111_111,
            wake_up_time_ns: frame_id * 11_111_111 - 2_000_000,
        }
    }

    fn wait_woke(&mut self, _frame_id: i64) {}
    fn begin_frame(&mut self, _frame_id: i64) -> Result<(), ResultCode> {
        Ok(())
    }
    fn discard_frame(&mut self, _frame_id: i64) {}

    fn create_swapchain(&mut self, info: &SwapchainInfo) -> Result<SwapchainCreateResult, ResultCode> {
        let handle = SwapchainHandle(next_handle());
        self.swapchains.insert(handle.0, *info);
        Ok(SwapchainCreateResult {
            handle,
            image_handles: Vec::new(),
            image_count: 3,
            allocation_size: (info.width as u64) * (info.height as u64) * 4,
            use_dedicated_allocation: false,
        })
    }

    fn import_swapchain(
        &mut self,
        info: &SwapchainInfo,
        _handles: Vec<OwnedFd>,
        _sizes: &[u64],
    ) -> Result<SwapchainHandle, ResultCode> {
        let handle = SwapchainHandle(next_handle());
        self.swapchains.insert(handle.0, *info);
        Ok(handle)
    }

    fn destroy_swapchain(&mut self, handle: SwapchainHandle) {
        self.swapchains.remove(&handle.0);
    }

    fn acquire_image(&mut self, handle: SwapchainHandle) -> Result<u32, ResultCode> {
        if self.swapchains.contains_key(&handle.0) {
            Ok(0)
        } else {
            Err(ResultCode::IpcFailure)
        }
    }

    fn wait_image(&mut self, _handle: SwapchainHandle, _timeout_ns: i64) -> Result<(), ResultCode> {
        Ok(())
    }

    fn release_image(&mut self, _handle: SwapchainHandle) -> Result<(), ResultCode> {
        Ok(())
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle, ResultCode> {
        let handle = next_handle();
        self.semaphores.push(handle);
        Ok(SemaphoreHandle(handle))
    }

    fn destroy_semaphore(&mut self, handle: SemaphoreHandle) {
        self.semaphores.retain(|h| *h != handle.0);
    }

    fn layer_begin(&mut self) {
        self.committed_layers.clear();
    }

    fn layer_submit(&mut self, layer: &ResolvedLayer) {
        self.committed_layers.push(*layer);
    }

    fn layer_commit(&mut self, _sync_handle: OwnedFd) {
        self.commit_count += 1;
    }

    fn layer_commit_with_semaphore(&mut self, _semaphore: SemaphoreHandle, _value: u64) {
        self.commit_count += 1;
    }

    fn set_performance_level(&mut self, _level: i32) {}
    fn set_thread_hint(&mut self, _hint: u32) {}
}

pub struct MockCompositorFactory;

impl CompositorFactory for MockCompositorFactory {
    fn create_session(&self, client_id: u32) -> Box<dyn Compositor> {
        Box::new(MockCompositor::new(client_id))
    }
}

struct SpaceOverseerState {
    semantic: HashMap<u32, SpaceHandle>,
    spaces: HashMap<u64, Pose>,
    ref_space_counts: [u32; xrbroker_proto::limits::REFERENCE_SPACE_TYPE_COUNT],
    recenter_count: u32,
}

pub struct MockSpaceOverseer {
    state: Mutex<SpaceOverseerState>,
}

impl MockSpaceOverseer {
    pub fn new() -> Self {
        let mut semantic = HashMap::new();
        for ty in ReferenceSpaceType::ALL {
            semantic.insert(ty.index() as u32, SpaceHandle(next_handle()));
        }
        Self {
            state: Mutex::new(SpaceOverseerState {
                semantic,
                spaces: HashMap::new(),
                ref_space_counts: [0; xrbroker_proto::limits::REFERENCE_SPACE_TYPE_COUNT],
                recenter_count: 0,
            }),
        }
    }

    pub fn recenter_count(&self) -> u32 {
        self.state.lock().unwrap().recenter_count
    }

    pub fn ref_space_count(&self, ty: ReferenceSpaceType) -> u32 {
        self.state.lock().unwrap().ref_space_counts[ty.index()]
    }
}

impl Default for MockSpaceOverseer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpaceOverseer for MockSpaceOverseer {
    fn semantic_space(&self, ty: ReferenceSpaceType) -> Option<SpaceHandle> {
        self.state.lock().unwrap().semantic.get(&(ty.index() as u32)).copied()
    }

    fn create_offset_space(&self, _parent: SpaceHandle, pose: Pose) -> Result<SpaceHandle, ResultCode> {
        let handle = SpaceHandle(next_handle());
        self.state.lock().unwrap().spaces.insert(handle.0, pose);
        Ok(handle)
    }

    fn create_pose_space(&self, _device: DeviceHandle, _input_name: &str) -> Result<SpaceHandle, ResultCode> {
        let handle = SpaceHandle(next_handle());
        self.state.lock().unwrap().spaces.insert(handle.0, Pose::default());
        Ok(handle)
    }

    fn locate_space(&self, base: SpaceHandle, other: SpaceHandle) -> Result<SpaceRelation, ResultCode> {
        let state = self.state.lock().unwrap();
        if !state.spaces.contains_key(&base.0)
            && !state.semantic.values().any(|h| *h == base)
        {
            return Err(ResultCode::IpcFailure);
        }
        if !state.spaces.contains_key(&other.0)
            && !state.semantic.values().any(|h| *h == other)
        {
            return Err(ResultCode::IpcFailure);
        }
        Ok(SpaceRelation::zeroed_but_valid())
    }

    fn locate_device(&self, _base: SpaceHandle, _device: DeviceHandle) -> Result<SpaceRelation, ResultCode> {
        Ok(SpaceRelation::zeroed_but_valid())
    }

    fn destroy_space(&self, handle: SpaceHandle) {
        self.state.lock().unwrap().spaces.remove(&handle.0);
    }

    fn ref_space_inc(&self, ty: ReferenceSpaceType) {
        self.state.lock().unwrap().ref_space_counts[ty.index()] += 1;
    }

    fn ref_space_dec(&self, ty: ReferenceSpaceType) {
        let mut state = self.state.lock().unwrap();
        state.ref_space_counts[ty.index()] = state.ref_space_counts[ty.index()].saturating_sub(1);
    }

    fn ref_space_count(&self, ty: ReferenceSpaceType) -> u32 {
        self.state.lock().unwrap().ref_space_counts[ty.index()]
    }

    fn recenter_local_spaces(&self) {
        self.state.lock().unwrap().recenter_count += 1;
    }
}

#[derive(Default)]
struct SystemCompositorState {
    visible: HashMap<u32, bool>,
    focused: HashMap<u32, bool>,
    z_order: HashMap<u32, i64>,
}

#[derive(Default)]
pub struct MockSystemCompositor {
    state: Mutex<SystemCompositorState>,
}

impl MockSystemCompositor {
    pub fn is_visible(&self, client_id: u32) -> bool {
        *self.state.lock().unwrap().visible.get(&client_id).unwrap_or(&false)
    }

    pub fn is_focused(&self, client_id: u32) -> bool {
        *self.state.lock().unwrap().focused.get(&client_id).unwrap_or(&false)
    }
}

impl SystemCompositor for MockSystemCompositor {
    fn set_state(&self, client_id: u32, visible: bool, focused: bool) {
        let mut state = self.state.lock().unwrap();
        state.visible.insert(client_id, visible);
        state.focused.insert(client_id, focused);
    }

    fn set_z_order(&self, client_id: u32, z_order: i64) {
        self.state.lock().unwrap().z_order.insert(client_id, z_order);
    }
}

pub struct MockDevice {
    pub handle: DeviceHandle,
    pub name: String,
    pub form_factors: Vec<u32>,
    pub inputs: Vec<String>,
}

impl MockDevice {
    pub fn new(name: &str) -> Self {
        Self {
            handle: DeviceHandle(next_handle()),
            name: name.to_string(),
            form_factors: vec![0],
            inputs: vec!["HEAD_POSE".to_string()],
        }
    }
}

impl Device for MockDevice {
    fn handle(&self) -> DeviceHandle {
        self.handle
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn input_names(&self) -> Vec<String> {
        self.inputs.clone()
    }

    fn update_inputs(&self) -> Result<(), ResultCode> {
        Ok(())
    }

    fn get_tracked_pose(&self, _input_name: &str) -> Result<(SpaceRelation, bool), ResultCode> {
        Ok((SpaceRelation::zeroed_but_valid(), true))
    }

    fn get_view_poses(&self, view_count: u32) -> Result<(Vec<Fov>, Vec<Pose>), ResultCode> {
        let n = view_count as usize;
        Ok((vec![Fov::default(); n], vec![Pose::default(); n]))
    }

    fn get_visibility_mask(&self, _view_index: u32) -> Option<Vec<u8>> {
        None
    }

    fn get_hand_tracking(&self, _is_right_hand: bool) -> (bool, Vec<Pose>) {
        (false, Vec::new())
    }

    fn get_face_tracking(&self) -> (bool, Vec<f32>) {
        (false, Vec::new())
    }

    fn get_body_skeleton(&self) -> (bool, Vec<Pose>) {
        (false, Vec::new())
    }

    fn get_body_joints(&self) -> (bool, Vec<Pose>, Vec<f32>) {
        (false, Vec::new(), Vec::new())
    }

    fn compute_distortion(&self, _view_index: u32, u: f32, v: f32) -> ([f32; 2], [f32; 2], [f32; 2]) {
        ([u, v], [u, v], [u, v])
    }

    fn set_output(&self, _name: &str, _value: f32) {}

    fn is_form_factor_available(&self, form_factor: u32) -> bool {
        self.form_factors.contains(&form_factor)
    }
}
