pub mod device;
pub mod frame;
pub mod session;
pub mod space;
pub mod swapchain;
pub mod system;

use serde::{Deserialize, Serialize};

use crate::result::ResultCode;

use device::*;
use frame::*;
use session::*;
use space::*;
use swapchain::*;
use system::*;

/// How many OS handles a tag's request/reply carries, per spec §4.D. Most
/// tags carry none or a small fixed number; a few (swapchain creation,
/// layer submission) carry a data-dependent count and are marked
/// `Variable` — the dispatcher skips the exact-count check for those and
/// relies on the handler's own bookkeeping instead (spec §4.D, §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleCount {
    Fixed(usize),
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagMeta {
    pub in_handles: HandleCount,
    pub out_handles: HandleCount,
}

const fn fixed(n: usize, m: usize) -> TagMeta {
    TagMeta {
        in_handles: HandleCount::Fixed(n),
        out_handles: HandleCount::Fixed(m),
    }
}

const fn variable_out() -> TagMeta {
    TagMeta {
        in_handles: HandleCount::Fixed(0),
        out_handles: HandleCount::Variable,
    }
}

const fn variable_in() -> TagMeta {
    TagMeta {
        in_handles: HandleCount::Variable,
        out_handles: HandleCount::Fixed(0),
    }
}

macro_rules! define_protocol {
    ($( $tag:ident ( $args:ty => $reply:ty, $meta:expr ) ),* $(,)?) => {
        #[repr(u32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum RequestTag {
            $( $tag ),*
        }

        impl RequestTag {
            pub const ALL: &'static [RequestTag] = &[ $( RequestTag::$tag ),* ];

            pub fn meta(self) -> TagMeta {
                match self {
                    $( RequestTag::$tag => $meta ),*
                }
            }
        }

        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub enum Request {
            $( $tag($args) ),*
        }

        impl Request {
            pub fn tag(&self) -> RequestTag {
                match self {
                    $( Request::$tag(_) => RequestTag::$tag ),*
                }
            }
        }

        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub enum Reply {
            $( $tag($reply) ),*
        }
    };
}

/// What actually crosses the wire for every request: a handler either
/// produces the tag's reply body or fails with a `ResultCode` before it
/// has one to give (spec §6.3, §7). Kept as one outer enum instead of
/// threading a result field through every `*Reply` struct, since most
/// tags' success path carries no other payload worth duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireReply {
    Ok(Reply),
    Err(ResultCode),
}

impl From<Result<Reply, ResultCode>> for WireReply {
    fn from(r: Result<Reply, ResultCode>) -> Self {
        match r {
            Ok(reply) => WireReply::Ok(reply),
            Err(code) => WireReply::Err(code),
        }
    }
}

define_protocol! {
    SessionCreate(SessionCreateArgs => SessionCreateReply, fixed(0, 0)),
    SessionBegin(SessionBeginArgs => SessionBeginReply, fixed(0, 0)),
    SessionEnd(SessionEndArgs => SessionEndReply, fixed(0, 0)),
    SessionDestroy(SessionDestroyArgs => SessionDestroyReply, fixed(0, 0)),
    SessionPollEvents(SessionPollEventsArgs => SessionPollEventsReply, fixed(0, 0)),

    SpaceCreateSemanticIds(SpaceCreateSemanticIdsArgs => SpaceCreateSemanticIdsReply, fixed(0, 0)),
    SpaceCreateOffset(SpaceCreateOffsetArgs => SpaceCreateOffsetReply, fixed(0, 0)),
    SpaceCreatePose(SpaceCreatePoseArgs => SpaceCreatePoseReply, fixed(0, 0)),
    SpaceLocateSpace(SpaceLocateSpaceArgs => SpaceLocateSpaceReply, fixed(0, 0)),
    SpaceLocateDevice(SpaceLocateDeviceArgs => SpaceLocateDeviceReply, fixed(0, 0)),
    SpaceDestroy(SpaceDestroyArgs => SpaceDestroyReply, fixed(0, 0)),
    SpaceMarkRefSpaceInUse(SpaceMarkRefSpaceInUseArgs => SpaceMarkRefSpaceInUseReply, fixed(0, 0)),
    SpaceUnmarkRefSpaceInUse(SpaceUnmarkRefSpaceInUseArgs => SpaceUnmarkRefSpaceInUseReply, fixed(0, 0)),
    SpaceRecenterLocalSpaces(SpaceRecenterLocalSpacesArgs => SpaceRecenterLocalSpacesReply, fixed(0, 0)),

    PredictFrame(PredictFrameArgs => PredictFrameReply, fixed(0, 0)),
    WaitWoke(WaitWokeArgs => WaitWokeReply, fixed(0, 0)),
    BeginFrame(BeginFrameArgs => BeginFrameReply, fixed(0, 0)),
    DiscardFrame(DiscardFrameArgs => DiscardFrameReply, fixed(0, 0)),
    LayerSync(LayerSyncArgs => LayerSyncReply, variable_in()),
    LayerSyncWithSemaphore(LayerSyncWithSemaphoreArgs => LayerSyncWithSemaphoreReply, fixed(0, 0)),

    SwapchainCreate(SwapchainCreateArgs => SwapchainCreateReply, variable_out()),
    SwapchainImport(SwapchainImportArgs => SwapchainImportReply, variable_in()),
    SwapchainAcquireImage(SwapchainAcquireImageArgs => SwapchainAcquireImageReply, fixed(0, 0)),
    SwapchainWaitImage(SwapchainWaitImageArgs => SwapchainWaitImageReply, fixed(0, 0)),
    SwapchainReleaseImage(SwapchainReleaseImageArgs => SwapchainReleaseImageReply, fixed(0, 0)),
    SwapchainDestroy(SwapchainDestroyArgs => SwapchainDestroyReply, fixed(0, 0)),

    DeviceUpdateInput(DeviceUpdateInputArgs => DeviceUpdateInputReply, fixed(0, 0)),
    DeviceGetTrackedPose(DeviceGetTrackedPoseArgs => DeviceGetTrackedPoseReply, fixed(0, 0)),
    DeviceGetViewPoses(DeviceGetViewPosesArgs => DeviceGetViewPosesReply, fixed(0, 0)),
    DeviceGetViewPosesStream(DeviceGetViewPosesStreamArgs => DeviceGetViewPosesStreamReply, fixed(0, 0)),
    DeviceGetVisibilityMask(DeviceGetVisibilityMaskArgs => DeviceGetVisibilityMaskReply, fixed(0, 0)),
    DeviceGetHandTracking(DeviceGetHandTrackingArgs => DeviceGetHandTrackingReply, fixed(0, 0)),
    DeviceGetFaceTracking(DeviceGetFaceTrackingArgs => DeviceGetFaceTrackingReply, fixed(0, 0)),
    DeviceGetBodySkeleton(DeviceGetBodySkeletonArgs => DeviceGetBodySkeletonReply, fixed(0, 0)),
    DeviceGetBodyJoints(DeviceGetBodyJointsArgs => DeviceGetBodyJointsReply, fixed(0, 0)),
    DeviceComputeDistortion(DeviceComputeDistortionArgs => DeviceComputeDistortionReply, fixed(0, 0)),
    DeviceSetOutput(DeviceSetOutputArgs => DeviceSetOutputReply, fixed(0, 0)),
    DeviceIsFormFactorAvailable(DeviceIsFormFactorAvailableArgs => DeviceIsFormFactorAvailableReply, fixed(0, 0)),
    DeviceToggleIoDevice(DeviceToggleIoDeviceArgs => DeviceToggleIoDeviceReply, fixed(0, 0)),

    SystemGetClients(SystemGetClientsArgs => SystemGetClientsReply, fixed(0, 0)),
    SystemGetClientInfo(SystemGetClientInfoArgs => SystemGetClientInfoReply, fixed(0, 0)),
    SystemSetPrimaryClient(SystemSetPrimaryClientArgs => SystemSetPrimaryClientReply, fixed(0, 0)),
    SystemToggleIoClient(SystemToggleIoClientArgs => SystemToggleIoClientReply, fixed(0, 0)),
    SystemSetFocusedClient(SystemSetFocusedClientArgs => SystemSetFocusedClientReply, fixed(0, 0)),

    InstanceGetShmFd(InstanceGetShmFdArgs => InstanceGetShmFdReply, fixed(0, 1)),
}
