//! spec §4.E.2 — spaces and reference-space bookkeeping.

use xrbroker_proto::limits::SEMANTIC_SPACE_COUNT;
use xrbroker_proto::messages::space::*;
use xrbroker_proto::types::ReferenceSpaceType;
use xrbroker_proto::ResultCode;

use crate::collaborators::DeviceHandle;
use crate::dispatch::HandlerCtx;

/// Returns the wire IDs of the pre-populated semantic-space prefix (spec
/// §4.B): slot index doubles as the space ID. A reference space type the
/// overseer doesn't expose left its slot empty at client setup, so it
/// reports as `SPACE_ID_INVALID`.
pub fn create_semantic_ids(
    ctx: &mut HandlerCtx<'_>,
    _args: SpaceCreateSemanticIdsArgs,
) -> Result<SpaceCreateSemanticIdsReply, ResultCode> {
    let mut ids = [xrbroker_proto::limits::SPACE_ID_INVALID; SEMANTIC_SPACE_COUNT];
    for i in 0..SEMANTIC_SPACE_COUNT {
        if ctx.client.spaces.is_valid(i as u32) {
            ids[i] = i as u32;
        }
    }
    Ok(SpaceCreateSemanticIdsReply { ids })
}

pub fn create_offset(
    ctx: &mut HandlerCtx<'_>,
    args: SpaceCreateOffsetArgs,
) -> Result<SpaceCreateOffsetReply, ResultCode> {
    let parent = *ctx.client.spaces.get(args.parent_id)?;
    let handle = ctx.overseer.create_offset_space(parent, args.pose)?;
    let space_id = ctx.client.spaces.allocate(handle)?;
    Ok(SpaceCreateOffsetReply { space_id })
}

pub fn create_pose(
    ctx: &mut HandlerCtx<'_>,
    args: SpaceCreatePoseArgs,
) -> Result<SpaceCreatePoseReply, ResultCode> {
    let device = ctx.devices.get(args.device_id)?;
    let handle = ctx
        .overseer
        .create_pose_space(device.handle(), &args.input_name)?;
    let space_id = ctx.client.spaces.allocate(handle)?;
    Ok(SpaceCreatePoseReply { space_id })
}

pub fn locate_space(
    ctx: &mut HandlerCtx<'_>,
    args: SpaceLocateSpaceArgs,
) -> Result<SpaceLocateSpaceReply, ResultCode> {
    let base = *ctx.client.spaces.get(args.base_id)?;
    let other = *ctx.client.spaces.get(args.other_id)?;
    let relation = ctx.overseer.locate_space(base, other)?;
    Ok(SpaceLocateSpaceReply { relation })
}

pub fn locate_device(
    ctx: &mut HandlerCtx<'_>,
    args: SpaceLocateDeviceArgs,
) -> Result<SpaceLocateDeviceReply, ResultCode> {
    let base = *ctx.client.spaces.get(args.base_id)?;
    let device: DeviceHandle = ctx.devices.get(args.device_id)?.handle();
    let relation = ctx.overseer.locate_device(base, device)?;
    Ok(SpaceLocateDeviceReply { relation })
}

/// The semantic-space prefix belongs to the overseer for the client's
/// whole lifetime and can't be individually destroyed (spec §4.B).
pub fn destroy(ctx: &mut HandlerCtx<'_>, args: SpaceDestroyArgs) -> Result<SpaceDestroyReply, ResultCode> {
    if args.space_id < SEMANTIC_SPACE_COUNT as u32 {
        return Err(ResultCode::IpcFailure);
    }
    let handle = ctx.client.spaces.release(args.space_id)?;
    ctx.overseer.destroy_space(handle);
    Ok(SpaceDestroyReply)
}

pub fn mark_ref_space_in_use(
    ctx: &mut HandlerCtx<'_>,
    args: SpaceMarkRefSpaceInUseArgs,
) -> Result<SpaceMarkRefSpaceInUseReply, ResultCode> {
    if ctx.client.mark_ref_space_in_use(args.ty) {
        ctx.overseer.ref_space_inc(args.ty);
        Ok(SpaceMarkRefSpaceInUseReply)
    } else {
        Err(ResultCode::IpcFailure)
    }
}

pub fn unmark_ref_space_in_use(
    ctx: &mut HandlerCtx<'_>,
    args: SpaceUnmarkRefSpaceInUseArgs,
) -> Result<SpaceUnmarkRefSpaceInUseReply, ResultCode> {
    if ctx.client.unmark_ref_space_in_use(args.ty) {
        ctx.overseer.ref_space_dec(args.ty);
        Ok(SpaceUnmarkRefSpaceInUseReply)
    } else {
        Err(ResultCode::IpcFailure)
    }
}

pub fn recenter_local_spaces(
    ctx: &mut HandlerCtx<'_>,
    _args: SpaceRecenterLocalSpacesArgs,
) -> Result<SpaceRecenterLocalSpacesReply, ResultCode> {
    ctx.overseer.recenter_local_spaces();
    Ok(SpaceRecenterLocalSpacesReply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, ClientDirectory};
    use crate::collaborators::mock::{MockCompositorFactory, MockDevice, MockSpaceOverseer, MockSystemCompositor};
    use crate::devices::DeviceRegistry;
    use crate::shm::ShmRegion;
    use std::sync::{Arc, Mutex};
    use xrbroker_proto::types::Pose;

    fn make_ctx() -> (
        Client,
        crate::arbiter::Arbiter,
        ClientDirectory,
        MockSpaceOverseer,
        DeviceRegistry,
        MockCompositorFactory,
        Mutex<ShmRegion>,
    ) {
        let mut client = Client::new(0, 100, "test".to_string());
        let overseer = MockSpaceOverseer::new();
        let mut ids = [None; SEMANTIC_SPACE_COUNT];
        for ty in ReferenceSpaceType::ALL {
            ids[ty.index()] = overseer.semantic_space(ty);
        }
        client.install_semantic_spaces(ids);

        let arbiter = crate::arbiter::Arbiter::new(Arc::new(MockSystemCompositor::default()));
        let directory = ClientDirectory::new();
        let devices = DeviceRegistry::new(vec![Box::new(MockDevice::new("hmd"))]);
        let factory = MockCompositorFactory;
        let shm = Mutex::new(ShmRegion::create().unwrap());
        (client, arbiter, directory, overseer, devices, factory, shm)
    }

    #[test]
    fn semantic_ids_are_all_populated_by_the_mock_overseer() {
        let (mut client, arbiter, directory, overseer, devices, factory, shm) = make_ctx();
        let mut ctx = HandlerCtx {
            client: &mut client,
            arbiter: &arbiter,
            directory: &directory,
            overseer: &overseer,
            devices: &devices,
            compositor_factory: &factory,
            shm: &shm,
        };
        let reply = create_semantic_ids(&mut ctx, SpaceCreateSemanticIdsArgs).unwrap();
        for id in reply.ids {
            assert_ne!(id, xrbroker_proto::limits::SPACE_ID_INVALID);
        }
    }

    #[test]
    fn destroying_a_semantic_space_is_rejected() {
        let (mut client, arbiter, directory, overseer, devices, factory, shm) = make_ctx();
        let mut ctx = HandlerCtx {
            client: &mut client,
            arbiter: &arbiter,
            directory: &directory,
            overseer: &overseer,
            devices: &devices,
            compositor_factory: &factory,
            shm: &shm,
        };
        let result = destroy(&mut ctx, SpaceDestroyArgs { space_id: 0 });
        assert!(matches!(result, Err(ResultCode::IpcFailure)));
    }

    #[test]
    fn offset_space_creation_and_destruction_round_trips() {
        let (mut client, arbiter, directory, overseer, devices, factory, shm) = make_ctx();
        let mut ctx = HandlerCtx {
            client: &mut client,
            arbiter: &arbiter,
            directory: &directory,
            overseer: &overseer,
            devices: &devices,
            compositor_factory: &factory,
            shm: &shm,
        };
        let reply = create_offset(
            &mut ctx,
            SpaceCreateOffsetArgs { parent_id: 0, pose: Pose::default() },
        )
        .unwrap();
        assert!(reply.space_id >= SEMANTIC_SPACE_COUNT as u32);
        destroy(&mut ctx, SpaceDestroyArgs { space_id: reply.space_id }).unwrap();
    }

    #[test]
    fn mark_ref_space_twice_without_unmark_fails() {
        let (mut client, arbiter, directory, overseer, devices, factory, shm) = make_ctx();
        let mut ctx = HandlerCtx {
            client: &mut client,
            arbiter: &arbiter,
            directory: &directory,
            overseer: &overseer,
            devices: &devices,
            compositor_factory: &factory,
            shm: &shm,
        };
        mark_ref_space_in_use(&mut ctx, SpaceMarkRefSpaceInUseArgs { ty: ReferenceSpaceType::Stage }).unwrap();
        let result = mark_ref_space_in_use(&mut ctx, SpaceMarkRefSpaceInUseArgs { ty: ReferenceSpaceType::Stage });
        assert!(matches!(result, Err(ResultCode::IpcFailure)));
    }
}
