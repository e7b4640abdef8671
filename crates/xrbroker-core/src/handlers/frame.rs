//! spec §4.E.3 — frame timing and layer submission.

use std::os::fd::OwnedFd;

use xrbroker_proto::limits::MAX_SLOTS;
use xrbroker_proto::messages::frame::*;
use xrbroker_proto::types::LayerType;
use xrbroker_proto::ResultCode;

use crate::collaborators::ResolvedLayer;
use crate::dispatch::HandlerCtx;
use crate::shm::{LayerEntryRaw, SlotRaw};

fn layer_type_from_raw(value: u32) -> LayerType {
    match value {
        0 => LayerType::Projection,
        1 => LayerType::ProjectionDepth,
        2 => LayerType::Quad,
        3 => LayerType::Cube,
        4 => LayerType::Cylinder,
        5 => LayerType::Equirect1,
        6 => LayerType::Equirect2,
        _ => LayerType::Passthrough,
    }
}

fn require_active_compositor<'a>(
    ctx: &'a mut HandlerCtx<'_>,
) -> Result<&'a mut dyn crate::collaborators::Compositor, ResultCode> {
    let session = ctx
        .client
        .session
        .as_mut()
        .ok_or(ResultCode::SessionNotCreated)?;
    if !session.active {
        return Err(ResultCode::SessionNotCreated);
    }
    session
        .compositor
        .as_deref_mut()
        .ok_or(ResultCode::CompositorNotCreated)
}

pub fn predict_frame(ctx: &mut HandlerCtx<'_>, _args: PredictFrameArgs) -> Result<PredictFrameReply, ResultCode> {
    let client_id = ctx.client.client_id;
    let compositor = require_active_compositor(ctx)?;
    let prediction = compositor.predict_frame();
    ctx.arbiter.note_frame_activity(client_id);

    Ok(PredictFrameReply {
        frame_id: prediction.frame_id,
        predicted_display_time_ns: prediction.predicted_display_time_ns,
        predicted_display_period_ns: prediction.predicted_display_period_ns,
        wake_up_time_ns: prediction.wake_up_time_ns,
    })
}

pub fn wait_woke(ctx: &mut HandlerCtx<'_>, args: WaitWokeArgs) -> Result<WaitWokeReply, ResultCode> {
    require_active_compositor(ctx)?.wait_woke(args.frame_id);
    Ok(WaitWokeReply)
}

pub fn begin_frame(ctx: &mut HandlerCtx<'_>, args: BeginFrameArgs) -> Result<BeginFrameReply, ResultCode> {
    require_active_compositor(ctx)?.begin_frame(args.frame_id)?;
    Ok(BeginFrameReply)
}

pub fn discard_frame(ctx: &mut HandlerCtx<'_>, args: DiscardFrameArgs) -> Result<DiscardFrameReply, ResultCode> {
    require_active_compositor(ctx)?.discard_frame(args.frame_id);
    Ok(DiscardFrameReply)
}

fn raw_entry_to_layer_entry(raw: &LayerEntryRaw) -> LayerEntry {
    LayerEntry {
        layer_type: layer_type_from_raw(raw.layer_type),
        device_id: raw.device_id,
        pose: xrbroker_proto::types::Pose {
            orientation: [raw.pose[0], raw.pose[1], raw.pose[2], raw.pose[3]],
            position: [raw.pose[4], raw.pose[5], raw.pose[6]],
        },
        swapchain_ids: raw.swapchain_ids,
        extra: raw.extra,
    }
}

fn snapshot_to_layer_slot(raw: &SlotRaw) -> LayerSlotSnapshot {
    let mut snapshot = LayerSlotSnapshot {
        layer_count: raw.layer_count,
        layers: [LayerEntry::default(); xrbroker_proto::limits::MAX_LAYERS],
    };
    for (dst, src) in snapshot.layers.iter_mut().zip(raw.layers.iter()) {
        *dst = raw_entry_to_layer_entry(src);
    }
    snapshot
}

/// Resolves one client-side layer entry into compositor-facing handles,
/// skipping it (returning `None`) if it references a device or swapchain
/// ID the client doesn't actually own (spec §4.E.3 step 3: an invalid
/// reference drops that one layer rather than failing the whole sync).
fn resolve_layer(ctx: &HandlerCtx<'_>, entry: &LayerEntry) -> Option<ResolvedLayer> {
    let device = if entry.device_id == u32::MAX {
        None
    } else {
        Some(ctx.devices.get(entry.device_id).ok()?.handle())
    };

    let mut swapchains = [None; 2];
    for (slot, id) in swapchains.iter_mut().zip(entry.swapchain_ids.iter()) {
        if *id != u32::MAX {
            *slot = Some(ctx.client.swapchains.get(*id).ok()?.handle);
        }
    }

    Some(ResolvedLayer {
        layer_type: entry.layer_type,
        device,
        pose: entry.pose,
        swapchains,
        extra: entry.extra,
    })
}

fn commit_layers(ctx: &mut HandlerCtx<'_>, slot_id: u32) -> Result<u32, ResultCode> {
    let snapshot = {
        let shm = ctx.shm.lock().unwrap();
        snapshot_to_layer_slot(&shm.read_slot(slot_id))
    };

    let mut resolved = Vec::new();
    for i in 0..snapshot.layer_count as usize {
        if let Some(layer) = resolve_layer(ctx, &snapshot.layers[i]) {
            resolved.push(layer);
        }
    }

    let compositor = require_active_compositor(ctx)?;
    compositor.layer_begin();
    for layer in &resolved {
        compositor.layer_submit(layer);
    }

    Ok(resolved.len() as u32)
}

pub fn layer_sync(
    ctx: &mut HandlerCtx<'_>,
    args: LayerSyncArgs,
    sync_handle: Option<OwnedFd>,
) -> Result<LayerSyncReply, ResultCode> {
    commit_layers(ctx, args.slot_id)?;
    let sync_handle = sync_handle.ok_or(ResultCode::IpcFailure)?;
    require_active_compositor(ctx)?.layer_commit(sync_handle);

    let free_slot_id = ctx.shm.lock().unwrap().advance_slot_index(MAX_SLOTS as u32);
    Ok(LayerSyncReply { free_slot_id })
}

pub fn layer_sync_with_semaphore(
    ctx: &mut HandlerCtx<'_>,
    args: LayerSyncWithSemaphoreArgs,
) -> Result<LayerSyncWithSemaphoreReply, ResultCode> {
    commit_layers(ctx, args.slot_id)?;
    let semaphore = *ctx.client.semaphores.get(args.semaphore_id)?;
    require_active_compositor(ctx)?.layer_commit_with_semaphore(semaphore, args.semaphore_value);

    let free_slot_id = ctx.shm.lock().unwrap().advance_slot_index(MAX_SLOTS as u32);
    Ok(LayerSyncWithSemaphoreReply { free_slot_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, ClientDirectory, Session};
    use crate::collaborators::mock::{MockCompositorFactory, MockDevice, MockSpaceOverseer, MockSystemCompositor};
    use crate::devices::DeviceRegistry;
    use crate::shm::ShmRegion;
    use std::sync::{Arc, Mutex};
    use xrbroker_proto::types::SessionInfo;

    fn make_active_ctx() -> (
        Client,
        crate::arbiter::Arbiter,
        ClientDirectory,
        MockSpaceOverseer,
        DeviceRegistry,
        MockCompositorFactory,
        Mutex<ShmRegion>,
    ) {
        let mut client = Client::new(0, 100, "test".to_string());
        let factory = MockCompositorFactory;
        client.session = Some(Session {
            info: SessionInfo { is_overlay: false, z_order: 0 },
            compositor: Some(
                (&factory as &dyn crate::collaborators::CompositorFactory).create_session(0),
            ),
            active: true,
        });

        let arbiter = crate::arbiter::Arbiter::new(Arc::new(MockSystemCompositor::default()));
        let directory = ClientDirectory::new();
        let overseer = MockSpaceOverseer::new();
        let devices = DeviceRegistry::new(vec![Box::new(MockDevice::new("hmd"))]);
        let shm = Mutex::new(ShmRegion::create().unwrap());
        (client, arbiter, directory, overseer, devices, factory, shm)
    }

    #[test]
    fn predict_frame_requires_active_session_and_compositor() {
        let mut client = Client::new(0, 100, "test".to_string());
        let arbiter = crate::arbiter::Arbiter::new(Arc::new(MockSystemCompositor::default()));
        let directory = ClientDirectory::new();
        let overseer = MockSpaceOverseer::new();
        let devices = DeviceRegistry::new(Vec::new());
        let factory = MockCompositorFactory;
        let shm = Mutex::new(ShmRegion::create().unwrap());
        let mut ctx = HandlerCtx {
            client: &mut client,
            arbiter: &arbiter,
            directory: &directory,
            overseer: &overseer,
            devices: &devices,
            compositor_factory: &factory,
            shm: &shm,
        };
        let result = predict_frame(&mut ctx, PredictFrameArgs);
        assert!(matches!(result, Err(ResultCode::SessionNotCreated)));
    }

    #[test]
    fn predict_frame_marks_client_active_in_the_arbiter() {
        let (mut client, arbiter, directory, overseer, devices, factory, shm) = make_active_ctx();
        let mut ctx = HandlerCtx {
            client: &mut client,
            arbiter: &arbiter,
            directory: &directory,
            overseer: &overseer,
            devices: &devices,
            compositor_factory: &factory,
            shm: &shm,
        };
        predict_frame(&mut ctx, PredictFrameArgs).unwrap();
        assert_eq!(arbiter.active_client_index(), Some(0));
    }

    #[test]
    fn layer_sync_skips_entries_with_unowned_swapchain_ids() {
        let (mut client, arbiter, directory, overseer, devices, factory, shm) = make_active_ctx();
        {
            let mut region = shm.lock().unwrap();
            let mut slot = SlotRaw::default();
            slot.layer_count = 1;
            slot.layers[0].device_id = u32::MAX;
            slot.layers[0].swapchain_ids = [42, u32::MAX];
            region.write_slot(0, &slot);
        }
        let mut ctx = HandlerCtx {
            client: &mut client,
            arbiter: &arbiter,
            directory: &directory,
            overseer: &overseer,
            devices: &devices,
            compositor_factory: &factory,
            shm: &shm,
        };
        let tmp = tempfile::tempfile().unwrap();
        let fd: OwnedFd = tmp.into();
        let reply = layer_sync(&mut ctx, LayerSyncArgs { slot_id: 0 }, Some(fd)).unwrap();
        assert_eq!(reply.free_slot_id, 1);
    }
}
