//! Component D: the per-client request dispatcher (spec §4.D, §5).
//!
//! One `Dispatcher` is built per client and driven sequentially from that
//! client's worker thread: each call validates the incoming handle count
//! against the tag's `TagMeta`, routes to the matching handler module, and
//! logs the result according to `ResultCode::should_log()` (spec §7 — most
//! precondition failures are routine and must not spam the log).

use std::os::fd::OwnedFd;
use std::sync::Mutex;

use xrbroker_proto::messages::device::{DeviceGetViewPosesStreamReply, ViewPosesPayload};
use xrbroker_proto::{HandleCount, Reply, Request, RequestTag, ResultCode};

use crate::arbiter::Arbiter;
use crate::client::{Client, ClientDirectory};
use crate::collaborators::{CompositorFactory, SpaceOverseer};
use crate::devices::DeviceRegistry;
use crate::handlers::{device, frame, session, space, swapchain, system};
use crate::shm::ShmRegion;

/// Everything a handler needs beyond its own arguments. Borrowed for the
/// duration of one dispatch call; nothing here is held past it.
pub struct HandlerCtx<'a> {
    pub client: &'a mut Client,
    pub arbiter: &'a Arbiter,
    pub directory: &'a ClientDirectory,
    pub overseer: &'a dyn SpaceOverseer,
    pub devices: &'a DeviceRegistry,
    pub compositor_factory: &'a dyn CompositorFactory,
    pub shm: &'a Mutex<ShmRegion>,
}

/// A trailing unframed payload sent as a second write on the same channel,
/// after the regular reply. Two tags need one: `device_get_view_poses_stream`
/// streams its view poses this way, and `device_get_visibility_mask` streams
/// its mask bytes the same way rather than inlining them in the reply.
pub enum TrailingPayload {
    ViewPoses(ViewPosesPayload),
    VisibilityMask(Vec<u8>),
}

/// The result of one dispatch call: the reply to send back, any OS
/// handles riding alongside it, and — for the tags that need it — a
/// trailing payload sent as a second write on the same channel.
pub struct DispatchOutcome {
    pub reply: Result<Reply, ResultCode>,
    pub out_handles: Vec<OwnedFd>,
    pub trailing: Option<TrailingPayload>,
}

impl DispatchOutcome {
    fn ok(reply: Reply) -> Self {
        Self {
            reply: Ok(reply),
            out_handles: Vec::new(),
            trailing: None,
        }
    }

    fn err(code: ResultCode) -> Self {
        Self {
            reply: Err(code),
            out_handles: Vec::new(),
            trailing: None,
        }
    }

    fn with_handles(reply: Reply, out_handles: Vec<OwnedFd>) -> Self {
        Self {
            reply: Ok(reply),
            out_handles,
            trailing: None,
        }
    }
}

/// Validates `in_handles.len()` against a tag's declared `in_handles`
/// shape. `Variable` always passes here; the handler is responsible for
/// its own bookkeeping in that case (spec §4.D).
fn check_in_handles(tag: RequestTag, in_handles: &[OwnedFd]) -> Result<(), ResultCode> {
    match tag.meta().in_handles {
        HandleCount::Fixed(n) if in_handles.len() != n => Err(ResultCode::IpcFailure),
        _ => Ok(()),
    }
}

pub fn dispatch(ctx: &mut HandlerCtx<'_>, request: Request, in_handles: Vec<OwnedFd>) -> DispatchOutcome {
    let tag = request.tag();
    if let Err(code) = check_in_handles(tag, &in_handles) {
        log::warn!("client {}: tag {:?} handle count mismatch", ctx.client.client_id, tag);
        return DispatchOutcome::err(code);
    }

    let outcome = route(ctx, request, in_handles);

    if let Err(code) = outcome.reply {
        if code.should_log() {
            log::warn!("client {}: tag {:?} failed: {code}", ctx.client.client_id, tag);
        }
    }

    outcome
}

fn route(ctx: &mut HandlerCtx<'_>, request: Request, mut in_handles: Vec<OwnedFd>) -> DispatchOutcome {
    match request {
        Request::SessionCreate(args) => match session::create(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SessionCreate(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SessionBegin(args) => match session::begin(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SessionBegin(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SessionEnd(args) => match session::end(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SessionEnd(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SessionDestroy(args) => match session::destroy(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SessionDestroy(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SessionPollEvents(args) => match session::poll_events(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SessionPollEvents(reply)),
            Err(code) => DispatchOutcome::err(code),
        },

        Request::SpaceCreateSemanticIds(args) => match space::create_semantic_ids(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SpaceCreateSemanticIds(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SpaceCreateOffset(args) => match space::create_offset(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SpaceCreateOffset(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SpaceCreatePose(args) => match space::create_pose(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SpaceCreatePose(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SpaceLocateSpace(args) => match space::locate_space(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SpaceLocateSpace(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SpaceLocateDevice(args) => match space::locate_device(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SpaceLocateDevice(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SpaceDestroy(args) => match space::destroy(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SpaceDestroy(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SpaceMarkRefSpaceInUse(args) => match space::mark_ref_space_in_use(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SpaceMarkRefSpaceInUse(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SpaceUnmarkRefSpaceInUse(args) => match space::unmark_ref_space_in_use(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SpaceUnmarkRefSpaceInUse(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SpaceRecenterLocalSpaces(args) => match space::recenter_local_spaces(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SpaceRecenterLocalSpaces(reply)),
            Err(code) => DispatchOutcome::err(code),
        },

        Request::PredictFrame(args) => match frame::predict_frame(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::PredictFrame(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::WaitWoke(args) => match frame::wait_woke(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::WaitWoke(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::BeginFrame(args) => match frame::begin_frame(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::BeginFrame(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::DiscardFrame(args) => match frame::discard_frame(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::DiscardFrame(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::LayerSync(args) => {
            // Retain the first sync handle; any extras are dropped (closed)
            // along with the rest of `in_handles` here.
            let sync_handle = if in_handles.is_empty() {
                None
            } else {
                Some(in_handles.remove(0))
            };
            match frame::layer_sync(ctx, args, sync_handle) {
                Ok(reply) => DispatchOutcome::ok(Reply::LayerSync(reply)),
                Err(code) => DispatchOutcome::err(code),
            }
        }
        Request::LayerSyncWithSemaphore(args) => match frame::layer_sync_with_semaphore(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::LayerSyncWithSemaphore(reply)),
            Err(code) => DispatchOutcome::err(code),
        },

        Request::SwapchainCreate(args) => match swapchain::create(ctx, args) {
            Ok((reply, handles)) => DispatchOutcome::with_handles(Reply::SwapchainCreate(reply), handles),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SwapchainImport(args) => match swapchain::import(ctx, args, in_handles) {
            Ok(reply) => DispatchOutcome::ok(Reply::SwapchainImport(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SwapchainAcquireImage(args) => match swapchain::acquire_image(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SwapchainAcquireImage(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SwapchainWaitImage(args) => match swapchain::wait_image(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SwapchainWaitImage(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SwapchainReleaseImage(args) => match swapchain::release_image(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SwapchainReleaseImage(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SwapchainDestroy(args) => match swapchain::destroy(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SwapchainDestroy(reply)),
            Err(code) => DispatchOutcome::err(code),
        },

        Request::DeviceUpdateInput(args) => match device::update_input(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::DeviceUpdateInput(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::DeviceGetTrackedPose(args) => match device::get_tracked_pose(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::DeviceGetTrackedPose(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::DeviceGetViewPoses(args) => match device::get_view_poses(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::DeviceGetViewPoses(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::DeviceGetViewPosesStream(args) => match device::get_view_poses_stream(ctx, args) {
            Ok((view_count, payload)) => DispatchOutcome {
                reply: Ok(Reply::DeviceGetViewPosesStream(DeviceGetViewPosesStreamReply {
                    view_count,
                })),
                out_handles: Vec::new(),
                trailing: Some(TrailingPayload::ViewPoses(payload)),
            },
            Err(code) => DispatchOutcome::err(code),
        },
        Request::DeviceGetVisibilityMask(args) => match device::get_visibility_mask(ctx, args) {
            Ok((reply, mask)) => DispatchOutcome {
                reply: Ok(Reply::DeviceGetVisibilityMask(reply)),
                out_handles: Vec::new(),
                trailing: Some(TrailingPayload::VisibilityMask(mask)),
            },
            Err(code) => DispatchOutcome::err(code),
        },
        Request::DeviceGetHandTracking(args) => match device::get_hand_tracking(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::DeviceGetHandTracking(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::DeviceGetFaceTracking(args) => match device::get_face_tracking(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::DeviceGetFaceTracking(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::DeviceGetBodySkeleton(args) => match device::get_body_skeleton(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::DeviceGetBodySkeleton(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::DeviceGetBodyJoints(args) => match device::get_body_joints(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::DeviceGetBodyJoints(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::DeviceComputeDistortion(args) => match device::compute_distortion(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::DeviceComputeDistortion(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::DeviceSetOutput(args) => match device::set_output(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::DeviceSetOutput(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::DeviceIsFormFactorAvailable(args) => match device::is_form_factor_available(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::DeviceIsFormFactorAvailable(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::DeviceToggleIoDevice(args) => match device::toggle_io_device(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::DeviceToggleIoDevice(reply)),
            Err(code) => DispatchOutcome::err(code),
        },

        Request::SystemGetClients(args) => match system::get_clients(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SystemGetClients(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SystemGetClientInfo(args) => match system::get_client_info(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SystemGetClientInfo(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SystemSetPrimaryClient(args) => match system::set_primary_client(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SystemSetPrimaryClient(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SystemToggleIoClient(args) => match system::toggle_io_client(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SystemToggleIoClient(reply)),
            Err(code) => DispatchOutcome::err(code),
        },
        Request::SystemSetFocusedClient(args) => match system::set_focused_client(ctx, args) {
            Ok(reply) => DispatchOutcome::ok(Reply::SystemSetFocusedClient(reply)),
            Err(code) => DispatchOutcome::err(code),
        },

        Request::InstanceGetShmFd(args) => match system::instance_get_shm_fd(ctx, args) {
            Ok((reply, fd)) => DispatchOutcome::with_handles(Reply::InstanceGetShmFd(reply), vec![fd]),
            Err(code) => DispatchOutcome::err(code),
        },
    }
}
