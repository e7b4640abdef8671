//! spec §4.E.5 — device queries: tracking, view poses, haptics inputs,
//! distortion, and per-device I/O gating.

use xrbroker_proto::limits::IPC_MAX_RAW_VIEWS;
use xrbroker_proto::messages::device::*;
use xrbroker_proto::types::{Fov, Pose, SpaceRelation};
use xrbroker_proto::ResultCode;

use crate::dispatch::HandlerCtx;
use crate::shm::{pack_name, InputRaw};

const HEAD_POSE: &str = "HEAD_POSE";

/// Whether input for this client/device combination should reach shared
/// memory at all (spec §4.E.5, §4.E.6): the client-wide gate
/// (`system_toggle_io_client`) and the per-device gate
/// (`device_toggle_io_device`) both have to be on.
fn io_active(ctx: &HandlerCtx<'_>, device_id: u32) -> Result<bool, ResultCode> {
    let client_active = ctx.directory.get(ctx.client.client_id).map(|e| e.io_active).unwrap_or(true);
    Ok(client_active && ctx.devices.is_io_active(device_id)?)
}

/// Copies one device's tracked inputs into its shared-memory window (spec
/// §4.E.5, §6.2). When I/O is gated off, every input but `HEAD_POSE` is
/// zeroed and marked inactive; `HEAD_POSE.active` stays truthful so a
/// client can still tell head tracking apart from a gated controller.
pub fn update_input(ctx: &mut HandlerCtx<'_>, args: DeviceUpdateInputArgs) -> Result<DeviceUpdateInputReply, ResultCode> {
    let device = ctx.devices.get(args.device_id)?;
    device.update_inputs()?;
    let gate_open = io_active(ctx, args.device_id)?;
    let descriptor = ctx.shm.lock().unwrap().read_device_descriptor(args.device_id);

    for (i, name) in device.input_names().iter().enumerate().take(descriptor.input_count as usize) {
        let is_head_pose = name == HEAD_POSE;
        let (relation, tracked_active) = device.get_tracked_pose(name)?;
        let (pose, active) = if gate_open {
            (relation.pose, tracked_active)
        } else if is_head_pose {
            (Pose::default(), tracked_active)
        } else {
            (Pose::default(), false)
        };
        let raw = InputRaw {
            name: pack_name(name),
            pose: [
                pose.orientation[0],
                pose.orientation[1],
                pose.orientation[2],
                pose.orientation[3],
                pose.position[0],
                pose.position[1],
                pose.position[2],
            ],
            active: active as u32,
        };
        ctx.shm
            .lock()
            .unwrap()
            .write_input(descriptor.first_input_index + i as u32, &raw);
    }
    Ok(DeviceUpdateInputReply)
}

/// Reads a tracked pose back out of the shared-memory snapshot rather than
/// querying the device directly (spec §4.E.5: the server never trusts a
/// second read off the same live state). When I/O is globally disabled and
/// this isn't `HEAD_POSE`, the call still succeeds but reports a zeroed,
/// inactive-but-valid relation instead of failing (spec §4.E.6).
pub fn get_tracked_pose(
    ctx: &mut HandlerCtx<'_>,
    args: DeviceGetTrackedPoseArgs,
) -> Result<DeviceGetTrackedPoseReply, ResultCode> {
    let device = ctx.devices.get(args.device_id)?;
    let names = device.input_names();
    let index = names.iter().position(|n| n == &args.input_name).ok_or(ResultCode::PoseNotActive)?;

    if !io_active(ctx, args.device_id)? && args.input_name != HEAD_POSE {
        return Ok(DeviceGetTrackedPoseReply { relation: SpaceRelation::default() });
    }

    let descriptor = ctx.shm.lock().unwrap().read_device_descriptor(args.device_id);
    let raw = ctx.shm.lock().unwrap().read_input(descriptor.first_input_index + index as u32);
    if raw.active == 0 {
        return Err(ResultCode::PoseNotActive);
    }
    let relation = SpaceRelation {
        pose: Pose {
            orientation: [raw.pose[0], raw.pose[1], raw.pose[2], raw.pose[3]],
            position: [raw.pose[4], raw.pose[5], raw.pose[6]],
        },
        ..SpaceRelation::zeroed_but_valid()
    };
    Ok(DeviceGetTrackedPoseReply { relation })
}

/// The fixed-capacity form (spec §4.E.5): `view_count` beyond
/// `IPC_MAX_RAW_VIEWS` doesn't fit in one reply and must go through the
/// streaming form instead.
pub fn get_view_poses(
    ctx: &mut HandlerCtx<'_>,
    args: DeviceGetViewPosesArgs,
) -> Result<DeviceGetViewPosesReply, ResultCode> {
    if args.view_count as usize > IPC_MAX_RAW_VIEWS {
        return Err(ResultCode::IpcFailure);
    }
    let device = ctx.devices.get(args.device_id)?;
    let (fovs, poses) = device.get_view_poses(args.view_count)?;

    let mut fov_array = [Fov::default(); IPC_MAX_RAW_VIEWS];
    let mut pose_array = [Pose::default(); IPC_MAX_RAW_VIEWS];
    for i in 0..fovs.len().min(IPC_MAX_RAW_VIEWS) {
        fov_array[i] = fovs[i];
        pose_array[i] = poses[i];
    }

    Ok(DeviceGetViewPosesReply {
        view_count: args.view_count,
        fovs: fov_array,
        poses: pose_array,
    })
}

/// Returns the header reply plus the trailing payload the dispatcher
/// writes as a second message (spec §4.E.5).
pub fn get_view_poses_stream(
    ctx: &mut HandlerCtx<'_>,
    args: DeviceGetViewPosesStreamArgs,
) -> Result<(u32, ViewPosesPayload), ResultCode> {
    let device = ctx.devices.get(args.device_id)?;
    let (fovs, poses) = device.get_view_poses(args.view_count)?;
    let view_count = fovs.len() as u32;
    Ok((view_count, ViewPosesPayload { fovs, poses }))
}

/// Bits per degree used to size a synthesized mask — arbitrary but fixed,
/// so the same FOV always synthesizes the same mask dimensions.
const SYNTHESIZED_MASK_RESOLUTION: f32 = 8.0;

/// A fully-visible bitmask covering a rectangle sized from the view's
/// angular extent, used when the device has no real occlusion mesh to
/// report (spec §4.E.5: "synthesize a default mask from the view's FOV").
fn synthesize_mask(fov: Fov) -> Vec<u8> {
    let width = (((fov.angle_right - fov.angle_left).to_degrees() * SYNTHESIZED_MASK_RESOLUTION).round() as usize).max(1);
    let height = (((fov.angle_down - fov.angle_up).to_degrees() * SYNTHESIZED_MASK_RESOLUTION).round() as usize).max(1);
    vec![0xFF; (width * height).div_ceil(8)]
}

/// Asks the device for a real occlusion mask first; synthesizes one from
/// the view's FOV when it doesn't provide one (spec §4.E.5). The reply
/// header carries only the byte count — the dispatcher sends the mask
/// itself as a trailing payload right after.
pub fn get_visibility_mask(
    ctx: &mut HandlerCtx<'_>,
    args: DeviceGetVisibilityMaskArgs,
) -> Result<(DeviceGetVisibilityMaskReply, Vec<u8>), ResultCode> {
    let device = ctx.devices.get(args.device_id)?;
    let mask = match device.get_visibility_mask(args.view_index) {
        Some(mask) => mask,
        None => {
            let (fovs, _) = device.get_view_poses(args.view_index + 1)?;
            let fov = *fovs.last().ok_or(ResultCode::IpcFailure)?;
            synthesize_mask(fov)
        }
    };
    let mask_size = mask.len() as u32;
    Ok((DeviceGetVisibilityMaskReply { mask_size }, mask))
}

pub fn get_hand_tracking(
    ctx: &mut HandlerCtx<'_>,
    args: DeviceGetHandTrackingArgs,
) -> Result<DeviceGetHandTrackingReply, ResultCode> {
    let device = ctx.devices.get(args.device_id)?;
    let (active, joint_poses) = device.get_hand_tracking(args.is_right_hand);
    Ok(DeviceGetHandTrackingReply { active, joint_poses })
}

pub fn get_face_tracking(
    ctx: &mut HandlerCtx<'_>,
    args: DeviceGetFaceTrackingArgs,
) -> Result<DeviceGetFaceTrackingReply, ResultCode> {
    let device = ctx.devices.get(args.device_id)?;
    let (active, blend_shapes) = device.get_face_tracking();
    Ok(DeviceGetFaceTrackingReply { active, blend_shapes })
}

pub fn get_body_skeleton(
    ctx: &mut HandlerCtx<'_>,
    args: DeviceGetBodySkeletonArgs,
) -> Result<DeviceGetBodySkeletonReply, ResultCode> {
    let device = ctx.devices.get(args.device_id)?;
    let (active, joint_poses) = device.get_body_skeleton();
    Ok(DeviceGetBodySkeletonReply { active, joint_poses })
}

pub fn get_body_joints(
    ctx: &mut HandlerCtx<'_>,
    args: DeviceGetBodyJointsArgs,
) -> Result<DeviceGetBodyJointsReply, ResultCode> {
    let device = ctx.devices.get(args.device_id)?;
    let (active, joint_poses, joint_confidences) = device.get_body_joints();
    Ok(DeviceGetBodyJointsReply { active, joint_poses, joint_confidences })
}

pub fn compute_distortion(
    ctx: &mut HandlerCtx<'_>,
    args: DeviceComputeDistortionArgs,
) -> Result<DeviceComputeDistortionReply, ResultCode> {
    let device = ctx.devices.get(args.device_id)?;
    let (red, green, blue) = device.compute_distortion(args.view_index, args.u, args.v);
    Ok(DeviceComputeDistortionReply { red, green, blue })
}

pub fn set_output(ctx: &mut HandlerCtx<'_>, args: DeviceSetOutputArgs) -> Result<DeviceSetOutputReply, ResultCode> {
    ctx.devices.get(args.device_id)?.set_output(&args.name, args.value);
    Ok(DeviceSetOutputReply)
}

/// Not tied to a specific `device_id`: answers whether any device in the
/// broker's fixed list supports the requested form factor.
pub fn is_form_factor_available(
    ctx: &mut HandlerCtx<'_>,
    args: DeviceIsFormFactorAvailableArgs,
) -> Result<DeviceIsFormFactorAvailableReply, ResultCode> {
    let available = (0..ctx.devices.len() as u32)
        .filter_map(|id| ctx.devices.get(id).ok())
        .any(|d| d.is_form_factor_available(args.form_factor));
    Ok(DeviceIsFormFactorAvailableReply { available })
}

pub fn toggle_io_device(
    ctx: &mut HandlerCtx<'_>,
    args: DeviceToggleIoDeviceArgs,
) -> Result<DeviceToggleIoDeviceReply, ResultCode> {
    let io_active = ctx.devices.toggle_io_active(args.device_id)?;
    Ok(DeviceToggleIoDeviceReply { io_active })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, ClientDirectory};
    use crate::collaborators::mock::{MockCompositorFactory, MockDevice, MockSpaceOverseer, MockSystemCompositor};
    use crate::devices::DeviceRegistry;
    use crate::shm::ShmRegion;
    use std::sync::{Arc, Mutex};

    fn make_ctx(devices: DeviceRegistry) -> (
        Client,
        crate::arbiter::Arbiter,
        ClientDirectory,
        MockSpaceOverseer,
        DeviceRegistry,
        MockCompositorFactory,
        Mutex<ShmRegion>,
    ) {
        let client = Client::new(0, 100, "test".to_string());
        let arbiter = crate::arbiter::Arbiter::new(Arc::new(MockSystemCompositor::default()));
        let directory = ClientDirectory::new();
        directory.insert(0, 100, "test".to_string());
        let overseer = MockSpaceOverseer::new();
        let factory = MockCompositorFactory;
        let mut shm = ShmRegion::create().unwrap();
        devices.populate_shm(&mut shm);
        let shm = Mutex::new(shm);
        (client, arbiter, directory, overseer, devices, factory, shm)
    }

    #[test]
    fn get_view_poses_rejects_view_count_over_the_fixed_capacity() {
        let (mut client, arbiter, directory, overseer, devices, factory, shm) =
            make_ctx(DeviceRegistry::new(vec![Box::new(MockDevice::new("hmd"))]));
        let mut ctx = HandlerCtx {
            client: &mut client,
            arbiter: &arbiter,
            directory: &directory,
            overseer: &overseer,
            devices: &devices,
            compositor_factory: &factory,
            shm: &shm,
        };
        let result = get_view_poses(&mut ctx, DeviceGetViewPosesArgs { device_id: 0, view_count: 9 });
        assert!(matches!(result, Err(ResultCode::IpcFailure)));
    }

    #[test]
    fn toggle_io_device_flips_only_the_target_device() {
        let (mut client, arbiter, directory, overseer, devices, factory, shm) = make_ctx(DeviceRegistry::new(vec![
            Box::new(MockDevice::new("hmd")),
            Box::new(MockDevice::new("controller")),
        ]));
        let mut ctx = HandlerCtx {
            client: &mut client,
            arbiter: &arbiter,
            directory: &directory,
            overseer: &overseer,
            devices: &devices,
            compositor_factory: &factory,
            shm: &shm,
        };
        let reply = toggle_io_device(&mut ctx, DeviceToggleIoDeviceArgs { device_id: 0 }).unwrap();
        assert!(!reply.io_active);
        assert!(ctx.devices.is_io_active(1).unwrap());
    }

    #[test]
    fn get_tracked_pose_surfaces_inactive_as_pose_not_active() {
        struct InactiveDevice(crate::collaborators::DeviceHandle);
        impl crate::collaborators::Device for InactiveDevice {
            fn handle(&self) -> crate::collaborators::DeviceHandle { self.0 }
            fn name(&self) -> &str { "inactive" }
            fn input_names(&self) -> Vec<String> { vec!["grip".to_string()] }
            fn update_inputs(&self) -> Result<(), ResultCode> { Ok(()) }
            fn get_tracked_pose(&self, _input_name: &str) -> Result<(xrbroker_proto::types::SpaceRelation, bool), ResultCode> {
                Ok((xrbroker_proto::types::SpaceRelation::default(), false))
            }
            fn get_view_poses(&self, n: u32) -> Result<(Vec<Fov>, Vec<Pose>), ResultCode> {
                Ok((vec![Fov::default(); n as usize], vec![Pose::default(); n as usize]))
            }
            fn get_visibility_mask(&self, _view_index: u32) -> Option<Vec<u8>> { None }
            fn get_hand_tracking(&self, _is_right_hand: bool) -> (bool, Vec<Pose>) { (false, Vec::new()) }
            fn get_face_tracking(&self) -> (bool, Vec<f32>) { (false, Vec::new()) }
            fn get_body_skeleton(&self) -> (bool, Vec<Pose>) { (false, Vec::new()) }
            fn get_body_joints(&self) -> (bool, Vec<Pose>, Vec<f32>) { (false, Vec::new(), Vec::new()) }
            fn compute_distortion(&self, _view_index: u32, u: f32, v: f32) -> ([f32; 2], [f32; 2], [f32; 2]) { ([u, v], [u, v], [u, v]) }
            fn set_output(&self, _name: &str, _value: f32) {}
            fn is_form_factor_available(&self, _form_factor: u32) -> bool { false }
        }

        let (mut client, arbiter, directory, overseer, devices, factory, shm) =
            make_ctx(DeviceRegistry::new(vec![Box::new(InactiveDevice(crate::collaborators::DeviceHandle(1)))]));
        let mut ctx = HandlerCtx {
            client: &mut client,
            arbiter: &arbiter,
            directory: &directory,
            overseer: &overseer,
            devices: &devices,
            compositor_factory: &factory,
            shm: &shm,
        };
        let result = get_tracked_pose(&mut ctx, DeviceGetTrackedPoseArgs { device_id: 0, input_name: "grip".to_string() });
        assert!(matches!(result, Err(ResultCode::PoseNotActive)));
    }

    #[test]
    fn update_input_zeroes_non_head_pose_inputs_but_keeps_head_pose_active_when_client_io_disabled() {
        let mut hmd = MockDevice::new("hmd");
        hmd.inputs = vec!["HEAD_POSE".to_string(), "grip".to_string()];
        let (mut client, arbiter, directory, overseer, devices, factory, shm) =
            make_ctx(DeviceRegistry::new(vec![Box::new(hmd)]));
        directory.toggle_io_active(0);
        {
            let mut ctx = HandlerCtx {
                client: &mut client,
                arbiter: &arbiter,
                directory: &directory,
                overseer: &overseer,
                devices: &devices,
                compositor_factory: &factory,
                shm: &shm,
            };
            update_input(&mut ctx, DeviceUpdateInputArgs { device_id: 0 }).unwrap();
        }

        let descriptor = shm.lock().unwrap().read_device_descriptor(0);
        let head_pose = shm.lock().unwrap().read_input(descriptor.first_input_index);
        let grip = shm.lock().unwrap().read_input(descriptor.first_input_index + 1);
        assert_eq!(head_pose.active, 1);
        assert_eq!(grip.active, 0);
    }

    #[test]
    fn get_visibility_mask_synthesizes_full_coverage_when_device_has_none() {
        let (mut client, arbiter, directory, overseer, devices, factory, shm) =
            make_ctx(DeviceRegistry::new(vec![Box::new(MockDevice::new("hmd"))]));
        let mut ctx = HandlerCtx {
            client: &mut client,
            arbiter: &arbiter,
            directory: &directory,
            overseer: &overseer,
            devices: &devices,
            compositor_factory: &factory,
            shm: &shm,
        };
        let (reply, mask) =
            get_visibility_mask(&mut ctx, DeviceGetVisibilityMaskArgs { device_id: 0, view_index: 0 }).unwrap();
        assert_eq!(reply.mask_size, mask.len() as u32);
        assert!(!mask.is_empty());
        assert!(mask.iter().all(|&b| b == 0xFF));
    }
}
