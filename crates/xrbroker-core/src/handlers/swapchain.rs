//! spec §4.E.4 — swapchain lifecycle.

use std::os::fd::OwnedFd;

use xrbroker_proto::messages::swapchain::*;
use xrbroker_proto::ResultCode;

use crate::client::SwapchainSlot;
use crate::dispatch::HandlerCtx;
use crate::shm::SwapchainDescriptorRaw;

fn compositor<'a>(
    ctx: &'a mut HandlerCtx<'_>,
) -> Result<&'a mut dyn crate::collaborators::Compositor, ResultCode> {
    ctx.client
        .session
        .as_mut()
        .ok_or(ResultCode::SessionNotCreated)?
        .compositor
        .as_deref_mut()
        .ok_or(ResultCode::CompositorNotCreated)
}

pub fn create(
    ctx: &mut HandlerCtx<'_>,
    args: SwapchainCreateArgs,
) -> Result<(SwapchainCreateReply, Vec<OwnedFd>), ResultCode> {
    let result = compositor(ctx)?.create_swapchain(&args.info)?;

    let swapchain_id = ctx.client.swapchains.allocate(SwapchainSlot {
        handle: result.handle,
        width: args.info.width,
        height: args.info.height,
        format: args.info.format,
        image_count: result.image_count,
    })?;

    ctx.shm.lock().unwrap().write_swapchain_descriptor(
        ctx.client.client_id,
        swapchain_id,
        &SwapchainDescriptorRaw {
            width: args.info.width,
            height: args.info.height,
            format: args.info.format,
            image_count: result.image_count,
            active: 1,
        },
    );

    Ok((
        SwapchainCreateReply {
            swapchain_id,
            image_count: result.image_count,
            allocation_size: result.allocation_size,
            use_dedicated_allocation: result.use_dedicated_allocation,
        },
        result.image_handles,
    ))
}

pub fn import(
    ctx: &mut HandlerCtx<'_>,
    args: SwapchainImportArgs,
    handles: Vec<OwnedFd>,
) -> Result<SwapchainImportReply, ResultCode> {
    if handles.len() != args.image_sizes.len() {
        return Err(ResultCode::IpcFailure);
    }
    let image_count = handles.len() as u32;
    let info = args.info;
    let handle = compositor(ctx)?.import_swapchain(&info, handles, &args.image_sizes)?;

    let swapchain_id = ctx.client.swapchains.allocate(SwapchainSlot {
        handle,
        width: info.width,
        height: info.height,
        format: info.format,
        image_count,
    })?;

    ctx.shm.lock().unwrap().write_swapchain_descriptor(
        ctx.client.client_id,
        swapchain_id,
        &SwapchainDescriptorRaw {
            width: info.width,
            height: info.height,
            format: info.format,
            image_count,
            active: 1,
        },
    );

    Ok(SwapchainImportReply { swapchain_id })
}

pub fn acquire_image(
    ctx: &mut HandlerCtx<'_>,
    args: SwapchainAcquireImageArgs,
) -> Result<SwapchainAcquireImageReply, ResultCode> {
    let handle = ctx.client.swapchains.get(args.swapchain_id)?.handle;
    let image_index = compositor(ctx)?.acquire_image(handle)?;
    Ok(SwapchainAcquireImageReply { image_index })
}

pub fn wait_image(
    ctx: &mut HandlerCtx<'_>,
    args: SwapchainWaitImageArgs,
) -> Result<SwapchainWaitImageReply, ResultCode> {
    let handle = ctx.client.swapchains.get(args.swapchain_id)?.handle;
    compositor(ctx)?.wait_image(handle, args.timeout_ns)?;
    Ok(SwapchainWaitImageReply)
}

pub fn release_image(
    ctx: &mut HandlerCtx<'_>,
    args: SwapchainReleaseImageArgs,
) -> Result<SwapchainReleaseImageReply, ResultCode> {
    let handle = ctx.client.swapchains.get(args.swapchain_id)?.handle;
    compositor(ctx)?.release_image(handle)?;
    Ok(SwapchainReleaseImageReply)
}

pub fn destroy(
    ctx: &mut HandlerCtx<'_>,
    args: SwapchainDestroyArgs,
) -> Result<SwapchainDestroyReply, ResultCode> {
    let slot = ctx.client.swapchains.release(args.swapchain_id)?;
    compositor(ctx)?.destroy_swapchain(slot.handle);
    ctx.shm
        .lock()
        .unwrap()
        .clear_swapchain_descriptor(ctx.client.client_id, args.swapchain_id);
    Ok(SwapchainDestroyReply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, ClientDirectory, Session};
    use crate::collaborators::mock::{MockCompositorFactory, MockSpaceOverseer, MockSystemCompositor};
    use crate::collaborators::CompositorFactory;
    use crate::devices::DeviceRegistry;
    use crate::shm::ShmRegion;
    use std::sync::{Arc, Mutex};
    use xrbroker_proto::types::{SessionInfo, SwapchainInfo};

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
            compositor: Some((&factory as &dyn CompositorFactory).create_session(0)),
            active: true,
        });
        let arbiter = crate::arbiter::Arbiter::new(Arc::new(MockSystemCompositor::default()));
        let directory = ClientDirectory::new();
        let overseer = MockSpaceOverseer::new();
        let devices = DeviceRegistry::new(Vec::new());
        let shm = Mutex::new(ShmRegion::create().unwrap());
        (client, arbiter, directory, overseer, devices, factory, shm)
    }

    fn sample_info() -> SwapchainInfo {
        SwapchainInfo {
            width: 1024,
            height: 1024,
            format: 37,
            sample_count: 1,
            array_size: 1,
            mip_count: 1,
            usage_color: true,
            usage_depth_stencil: false,
        }
    }

    #[test]
    fn create_then_destroy_round_trips() {
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
        let (reply, handles) = create(&mut ctx, SwapchainCreateArgs { info: sample_info() }).unwrap();
        assert!(handles.is_empty());
        assert_eq!(reply.image_count, 3);

        destroy(&mut ctx, SwapchainDestroyArgs { swapchain_id: reply.swapchain_id }).unwrap();
        let result = acquire_image(&mut ctx, SwapchainAcquireImageArgs { swapchain_id: reply.swapchain_id });
        assert!(matches!(result, Err(ResultCode::IpcFailure)));
    }

    #[test]
    fn create_mirrors_descriptor_into_shm_and_destroy_clears_it() {
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
        let (reply, _) = create(&mut ctx, SwapchainCreateArgs { info: sample_info() }).unwrap();

        let desc = ctx.shm.lock().unwrap().read_swapchain_descriptor(0, reply.swapchain_id);
        assert_eq!(desc.width, 1024);
        assert_eq!(desc.height, 1024);
        assert_eq!(desc.format, 37);
        assert_eq!(desc.image_count, 3);
        assert_eq!(desc.active, 1);

        destroy(&mut ctx, SwapchainDestroyArgs { swapchain_id: reply.swapchain_id }).unwrap();
        let cleared = ctx.shm.lock().unwrap().read_swapchain_descriptor(0, reply.swapchain_id);
        assert_eq!(cleared.active, 0);
    }

    #[test]
    fn import_rejects_mismatched_handle_and_size_counts() {
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
        let result = import(
            &mut ctx,
            SwapchainImportArgs { info: sample_info(), image_sizes: vec![1, 2] },
            Vec::new(),
        );
        assert!(matches!(result, Err(ResultCode::IpcFailure)));
    }
}
