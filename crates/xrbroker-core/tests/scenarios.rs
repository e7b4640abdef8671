//! End-to-end scenarios and cross-handler invariants that don't belong to
//! any single handler module: full session lifecycles, multi-client
//! arbiter handover, and the slot-rotation/handle-survival bookkeeping that
//! only shows up once several handlers run in sequence.

use std::os::fd::OwnedFd;
use std::sync::{Arc, Mutex};

use xrbroker_core::collaborators::mock::{
    MockCompositorFactory, MockDevice, MockSpaceOverseer, MockSystemCompositor,
};
use xrbroker_core::collaborators::SemaphoreHandle;
use xrbroker_core::devices::DeviceRegistry;
use xrbroker_core::handlers::{frame, session, space, swapchain, system};
use xrbroker_core::{Arbiter, Client, ClientDirectory, HandlerCtx, ShmRegion};
use xrbroker_proto::limits::SEMANTIC_SPACE_COUNT;
use xrbroker_proto::messages::frame::*;
use xrbroker_proto::messages::session::*;
use xrbroker_proto::messages::space::*;
use xrbroker_proto::messages::swapchain::*;
use xrbroker_proto::messages::system::*;
use xrbroker_proto::types::{Pose, ReferenceSpaceType, SessionInfo, SwapchainInfo};
use xrbroker_proto::ResultCode;

/// Shared test harness: one overseer/arbiter/device registry/shm region
/// wide enough to host several clients, each with its own `Client`.
struct World {
    arbiter: Arbiter,
    directory: ClientDirectory,
    overseer: MockSpaceOverseer,
    devices: DeviceRegistry,
    factory: MockCompositorFactory,
    shm: Mutex<ShmRegion>,
}

impl World {
    fn new() -> Self {
        Self {
            arbiter: Arbiter::new(Arc::new(MockSystemCompositor::default())),
            directory: ClientDirectory::new(),
            overseer: MockSpaceOverseer::new(),
            devices: DeviceRegistry::new(vec![Box::new(MockDevice::new("hmd"))]),
            factory: MockCompositorFactory,
            shm: Mutex::new(ShmRegion::create().unwrap()),
        }
    }

    fn new_client(&self, client_id: u32, pid: u32) -> Client {
        let mut client = Client::new(client_id, pid, format!("client-{client_id}"));
        let mut semantic = [None; SEMANTIC_SPACE_COUNT];
        for ty in ReferenceSpaceType::ALL {
            semantic[ty.index()] = self.overseer.semantic_space(ty);
        }
        client.install_semantic_spaces(semantic);
        self.directory.insert(client_id, pid, client.process_name.clone());
        client
    }

    fn ctx<'a>(&'a self, client: &'a mut Client) -> HandlerCtx<'a> {
        HandlerCtx {
            client,
            arbiter: &self.arbiter,
            directory: &self.directory,
            overseer: &self.overseer,
            devices: &self.devices,
            compositor_factory: &self.factory,
            shm: &self.shm,
        }
    }

    fn sample_swapchain_info(&self) -> SwapchainInfo {
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

    fn dummy_fd(&self) -> OwnedFd {
        tempfile::tempfile().unwrap().into()
    }
}

fn open_session(world: &World, ctx: &mut HandlerCtx<'_>) {
    session::create(
        ctx,
        SessionCreateArgs {
            info: SessionInfo { is_overlay: false, z_order: 0 },
            wants_compositor: true,
        },
    )
    .unwrap();
    session::begin(ctx, SessionBeginArgs { capability_flags: 0 }).unwrap();
    let _ = world;
}

/// S1 — happy frame: connect, fetch the shm fd, create a session, predict
/// and begin a frame, create a swapchain, then sync one layer slot with a
/// sync handle. Exactly one handle should survive and the slot cursor
/// should advance by one.
#[test]
fn s1_happy_frame_round_trip() {
    let world = World::new();
    let mut client = world.new_client(0, 100);
    let mut ctx = world.ctx(&mut client);

    let (_shm_reply, _fd) = system::instance_get_shm_fd(&mut ctx, InstanceGetShmFdArgs).unwrap();

    open_session(&world, &mut ctx);

    let prediction = frame::predict_frame(&mut ctx, PredictFrameArgs).unwrap();
    assert_eq!(prediction.frame_id, 1);

    frame::begin_frame(&mut ctx, BeginFrameArgs { frame_id: prediction.frame_id }).unwrap();

    let swapchain_reply = swapchain::create(
        &mut ctx,
        SwapchainCreateArgs { info: world.sample_swapchain_info() },
    )
    .unwrap();
    let (swapchain_create_reply, _image_handles) = swapchain_reply;
    assert_eq!(swapchain_create_reply.swapchain_id, 0);
    assert_eq!(swapchain_create_reply.image_count, 3);

    let sync_fd = world.dummy_fd();
    let reply = frame::layer_sync(&mut ctx, LayerSyncArgs { slot_id: 0 }, Some(sync_fd)).unwrap();

    assert_eq!(reply.free_slot_id, 1);
    assert_eq!(world.shm.lock().unwrap().current_slot_index(), 1);
}

/// S2 — arbiter handover: two non-overlay clients at different z-orders
/// both predict a frame; the higher z-order client becomes primary,
/// focused, and visible, while the lower one is only visible. An explicit
/// `system_set_primary_client` then overrides the computed primary.
#[test]
fn s2_arbiter_handover_and_explicit_override() {
    let world = World::new();

    let mut client0 = world.new_client(0, 100);
    {
        let mut ctx = world.ctx(&mut client0);
        open_session(&world, &mut ctx);
        frame::predict_frame(&mut ctx, PredictFrameArgs).unwrap();
    }

    let mut client1 = world.new_client(1, 200);
    {
        let mut ctx = world.ctx(&mut client1);
        session::create(
            &mut ctx,
            SessionCreateArgs {
                info: SessionInfo { is_overlay: false, z_order: 1 },
                wants_compositor: true,
            },
        )
        .unwrap();
        session::begin(&mut ctx, SessionBeginArgs { capability_flags: 0 }).unwrap();
        frame::predict_frame(&mut ctx, PredictFrameArgs).unwrap();
    }

    let view0 = world.arbiter.view_of(0);
    let view1 = world.arbiter.view_of(1);
    assert!(!view0.primary);
    assert!(view0.visible);
    assert!(view1.primary);
    assert!(view1.focused);
    assert!(view1.visible);

    world.arbiter.set_primary_client(0).unwrap();
    let view0 = world.arbiter.view_of(0);
    let view1 = world.arbiter.view_of(1);
    assert!(view0.primary);
    assert!(view0.focused);
    assert!(view0.visible);
    assert!(view1.visible);
    assert!(!view1.primary);
}

/// S3 — locating against a handle that was never allocated is rejected
/// without disturbing the caller's other state.
#[test]
fn s3_locate_space_with_invalid_other_id_fails() {
    let world = World::new();
    let mut client = world.new_client(0, 100);
    let mut ctx = world.ctx(&mut client);

    let result = space::locate_space(
        &mut ctx,
        SpaceLocateSpaceArgs { base_id: 5, other_id: u32::MAX },
    );
    assert!(matches!(result, Err(ResultCode::IpcFailure)));
}

/// S4 — mark/unmark of a reference space must strictly alternate, and the
/// overseer's own ref-count returns to zero once balanced.
#[test]
fn s4_ref_space_mark_unmark_is_strictly_alternating() {
    let world = World::new();
    let mut client = world.new_client(0, 100);
    let mut ctx = world.ctx(&mut client);

    space::mark_ref_space_in_use(&mut ctx, SpaceMarkRefSpaceInUseArgs { ty: ReferenceSpaceType::Local }).unwrap();
    let result = space::mark_ref_space_in_use(&mut ctx, SpaceMarkRefSpaceInUseArgs { ty: ReferenceSpaceType::Local });
    assert!(matches!(result, Err(ResultCode::IpcFailure)));

    space::unmark_ref_space_in_use(&mut ctx, SpaceUnmarkRefSpaceInUseArgs { ty: ReferenceSpaceType::Local }).unwrap();
    let result = space::unmark_ref_space_in_use(&mut ctx, SpaceUnmarkRefSpaceInUseArgs { ty: ReferenceSpaceType::Local });
    assert!(matches!(result, Err(ResultCode::IpcFailure)));

    assert_eq!(world.overseer.ref_space_count(ReferenceSpaceType::Local), 0);
}

/// S5 — destroying a session with several outstanding swapchains,
/// semaphores, and offset spaces releases all of them (but leaves the
/// semantic-space prefix untouched) and allows a fresh session to be
/// created afterward with that prefix re-derived and still valid.
#[test]
fn s5_session_destroy_cascades_every_owned_resource() {
    let world = World::new();
    let mut client = world.new_client(0, 100);
    let mut ctx = world.ctx(&mut client);

    open_session(&world, &mut ctx);

    for _ in 0..4 {
        swapchain::create(&mut ctx, SwapchainCreateArgs { info: world.sample_swapchain_info() }).unwrap();
    }
    for _ in 0..2 {
        let handle = SemaphoreHandle(9999);
        ctx.client.semaphores.allocate(handle).unwrap();
    }
    let mut offset_ids = Vec::new();
    for _ in 0..3 {
        let reply = space::create_offset(&mut ctx, SpaceCreateOffsetArgs { parent_id: 0, pose: Pose::default() }).unwrap();
        offset_ids.push(reply.space_id);
    }

    assert_eq!(ctx.client.swapchains.len(), 4);
    assert_eq!(ctx.client.semaphores.len(), 2);

    session::destroy(&mut ctx, SessionDestroyArgs).unwrap();

    assert!(ctx.client.swapchains.is_empty());
    assert!(ctx.client.semaphores.is_empty());
    for id in offset_ids {
        assert!(!ctx.client.spaces.is_valid(id));
    }
    assert!(ctx.client.session.is_none());
    // the semantic-space prefix is never this client's to destroy, so it
    // survives session_destroy untouched.
    let surviving_ids = space::create_semantic_ids(&mut ctx, SpaceCreateSemanticIdsArgs).unwrap();
    for ty in ReferenceSpaceType::ALL {
        assert_ne!(surviving_ids.ids[ty.index()], xrbroker_proto::limits::SPACE_ID_INVALID);
    }

    open_session(&world, &mut ctx);
    assert!(ctx.client.session.is_some());

    // session_create re-derives the semantic prefix from the overseer on
    // every call; it should still report every semantic space as valid.
    let reply = space::create_semantic_ids(&mut ctx, SpaceCreateSemanticIdsArgs).unwrap();
    for ty in ReferenceSpaceType::ALL {
        assert_ne!(reply.ids[ty.index()], xrbroker_proto::limits::SPACE_ID_INVALID);
    }
}

/// S6 — a channel failing mid-frame is modeled here as the mainloop would
/// drive it: `begin_frame` is accepted, then the worker thread's teardown
/// path runs the same cascade a clean `session_destroy` would, discarding
/// the in-flight frame along the way.
#[test]
fn s6_disconnect_mid_frame_discards_the_pending_frame_and_cascades() {
    let world = World::new();
    let mut client = world.new_client(0, 100);
    let mut ctx = world.ctx(&mut client);

    open_session(&world, &mut ctx);
    let prediction = frame::predict_frame(&mut ctx, PredictFrameArgs).unwrap();
    frame::begin_frame(&mut ctx, BeginFrameArgs { frame_id: prediction.frame_id }).unwrap();

    // the real mainloop calls `discard_frame` before running the cascade
    // once it notices a dead channel mid-frame (spec scenario S6).
    frame::discard_frame(&mut ctx, DiscardFrameArgs { frame_id: prediction.frame_id }).unwrap();
    session::destroy(&mut ctx, SessionDestroyArgs).unwrap();

    assert!(ctx.client.session.is_none());
    assert!(world.arbiter.client_ids().is_empty());
}

/// Invariant 4 — across several interleaved `layer_sync` calls from
/// different clients sharing the same shm region, `current_slot_index`
/// advances by exactly one per call and visits every value in
/// `0..max_slots` before repeating.
#[test]
fn invariant4_slot_index_rotates_across_interleaved_clients() {
    let world = World::new();

    let mut client_a = world.new_client(0, 100);
    let mut client_b = world.new_client(1, 200);

    {
        let mut ctx = world.ctx(&mut client_a);
        open_session(&world, &mut ctx);
    }
    {
        let mut ctx = world.ctx(&mut client_b);
        session::create(
            &mut ctx,
            SessionCreateArgs {
                info: SessionInfo { is_overlay: false, z_order: 0 },
                wants_compositor: true,
            },
        )
        .unwrap();
        session::begin(&mut ctx, SessionBeginArgs { capability_flags: 0 }).unwrap();
    }

    let max_slots = xrbroker_proto::limits::MAX_SLOTS as u32;
    let mut seen = Vec::new();
    for i in 0..(max_slots * 2) {
        let fd = world.dummy_fd();
        let reply = if i % 2 == 0 {
            let mut ctx = world.ctx(&mut client_a);
            frame::layer_sync(&mut ctx, LayerSyncArgs { slot_id: 0 }, Some(fd)).unwrap()
        } else {
            let mut ctx = world.ctx(&mut client_b);
            frame::layer_sync(&mut ctx, LayerSyncArgs { slot_id: 0 }, Some(fd)).unwrap()
        };
        seen.push(reply.free_slot_id);
    }

    for (i, value) in seen.iter().enumerate() {
        assert_eq!(*value, (i as u32 + 1) % max_slots);
    }
    // every value in 0..max_slots appears, none skipped or repeated within
    // one full rotation.
    let mut first_round: Vec<u32> = seen[..max_slots as usize].to_vec();
    first_round.sort_unstable();
    assert_eq!(first_round, (0..max_slots).collect::<Vec<_>>());
}

/// Invariant 5 — `layer_sync` consumes exactly one handle on success; the
/// dispatcher only ever hands the handler the single trailing sync fd
/// (`Vec<OwnedFd>::pop`), so any handles beyond the first are dropped
/// before the handler even runs. On an early-failure path (no session),
/// the handle passed in is simply dropped — no leak, no use.
#[test]
fn invariant5_layer_sync_handle_survival_on_success_and_early_failure() {
    let world = World::new();
    let mut client = world.new_client(0, 100);
    {
        let mut ctx = world.ctx(&mut client);
        open_session(&world, &mut ctx);
        let fd = world.dummy_fd();
        let reply = frame::layer_sync(&mut ctx, LayerSyncArgs { slot_id: 0 }, Some(fd));
        assert!(reply.is_ok());
    }

    // early-failure path: no session at all.
    let mut bare_client = world.new_client(2, 300);
    let mut ctx = world.ctx(&mut bare_client);
    let fd = world.dummy_fd();
    let result = frame::layer_sync(&mut ctx, LayerSyncArgs { slot_id: 0 }, Some(fd));
    assert!(matches!(result, Err(ResultCode::SessionNotCreated)));

    // a `layer_sync` with no sync handle at all fails distinctly, even
    // with an active session and compositor.
    let mut client2 = world.new_client(3, 400);
    let mut ctx2 = world.ctx(&mut client2);
    open_session(&world, &mut ctx2);
    let result = frame::layer_sync(&mut ctx2, LayerSyncArgs { slot_id: 0 }, None);
    assert!(matches!(result, Err(ResultCode::IpcFailure)));
}
