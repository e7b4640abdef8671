//! spec §4.E.6 — system-wide introspection and control: client listing,
//! primary/focus overrides, per-client I/O gating, and the shm fd handout.

use std::os::fd::OwnedFd;

use xrbroker_proto::limits::MAX_CLIENTS;
use xrbroker_proto::messages::system::*;
use xrbroker_proto::ResultCode;

use crate::dispatch::HandlerCtx;

pub fn get_clients(ctx: &mut HandlerCtx<'_>, _args: SystemGetClientsArgs) -> Result<SystemGetClientsReply, ResultCode> {
    let ids = ctx.directory.client_ids();
    let client_count = ids.len().min(MAX_CLIENTS) as u32;
    let mut client_ids = [0u32; MAX_CLIENTS];
    for (slot, id) in client_ids.iter_mut().zip(ids.into_iter()) {
        *slot = id;
    }
    Ok(SystemGetClientsReply { client_count, client_ids })
}

pub fn get_client_info(
    ctx: &mut HandlerCtx<'_>,
    args: SystemGetClientInfoArgs,
) -> Result<SystemGetClientInfoReply, ResultCode> {
    let entry = ctx.directory.get(args.client_id).ok_or(ResultCode::IpcFailure)?;
    let view = ctx.arbiter.view_of(args.client_id);

    Ok(SystemGetClientInfoReply {
        pid: entry.pid,
        name: entry.process_name,
        primary: view.primary,
        focused: view.focused,
        visible: view.visible,
        io_active: entry.io_active,
        z_order: view.z_order,
    })
}

pub fn set_primary_client(
    ctx: &mut HandlerCtx<'_>,
    args: SystemSetPrimaryClientArgs,
) -> Result<SystemSetPrimaryClientReply, ResultCode> {
    ctx.arbiter.set_primary_client(args.client_id)?;
    Ok(SystemSetPrimaryClientReply)
}

pub fn set_focused_client(
    ctx: &mut HandlerCtx<'_>,
    args: SystemSetFocusedClientArgs,
) -> Result<SystemSetFocusedClientReply, ResultCode> {
    ctx.arbiter.set_focused_client(args.client_id)?;
    Ok(SystemSetFocusedClientReply)
}

pub fn toggle_io_client(
    ctx: &mut HandlerCtx<'_>,
    args: SystemToggleIoClientArgs,
) -> Result<SystemToggleIoClientReply, ResultCode> {
    let io_active = ctx
        .directory
        .toggle_io_active(args.client_id)
        .ok_or(ResultCode::IpcFailure)?;
    Ok(SystemToggleIoClientReply { io_active })
}

pub fn instance_get_shm_fd(
    ctx: &mut HandlerCtx<'_>,
    _args: InstanceGetShmFdArgs,
) -> Result<(InstanceGetShmFdReply, OwnedFd), ResultCode> {
    let shm = ctx.shm.lock().unwrap();
    let fd = shm.dup_fd().map_err(|_| ResultCode::IpcFailure)?;
    let size = shm.layout().total_size as u64;
    Ok((InstanceGetShmFdReply { size }, fd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, ClientDirectory};
    use crate::collaborators::mock::{MockCompositorFactory, MockSpaceOverseer, MockSystemCompositor};
    use crate::devices::DeviceRegistry;
    use crate::shm::ShmRegion;
    use std::sync::{Arc, Mutex};

    fn make_ctx() -> (
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
        directory.insert(1, 200, "other".to_string());
        arbiter.register_client(0, false, 0);
        arbiter.register_client(1, false, 1);
        let overseer = MockSpaceOverseer::new();
        let devices = DeviceRegistry::new(Vec::new());
        let factory = MockCompositorFactory;
        let shm = Mutex::new(ShmRegion::create().unwrap());
        (client, arbiter, directory, overseer, devices, factory, shm)
    }

    #[test]
    fn get_clients_lists_everyone_in_the_directory() {
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
        let reply = get_clients(&mut ctx, SystemGetClientsArgs).unwrap();
        assert_eq!(reply.client_count, 2);
    }

    #[test]
    fn toggle_io_client_is_visible_through_get_client_info() {
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
        let reply = toggle_io_client(&mut ctx, SystemToggleIoClientArgs { client_id: 1 }).unwrap();
        assert!(!reply.io_active);

        let info = get_client_info(&mut ctx, SystemGetClientInfoArgs { client_id: 1 }).unwrap();
        assert!(!info.io_active);
    }

    #[test]
    fn set_primary_client_rejects_unknown_id() {
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
        let result = set_primary_client(&mut ctx, SystemSetPrimaryClientArgs { client_id: 99 });
        assert!(result.is_err());
    }

    #[test]
    fn instance_get_shm_fd_reports_the_region_size() {
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
        let (reply, _fd) = instance_get_shm_fd(&mut ctx, InstanceGetShmFdArgs).unwrap();
        assert!(reply.size > 0);
    }
}
