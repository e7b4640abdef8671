use serde::{Deserialize, Serialize};

use crate::limits::SEMANTIC_SPACE_COUNT;
use crate::types::{Pose, ReferenceSpaceType, SpaceRelation};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpaceCreateSemanticIdsArgs;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpaceCreateSemanticIdsReply {
    pub ids: [u32; SEMANTIC_SPACE_COUNT],
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpaceCreateOffsetArgs {
    pub parent_id: u32,
    pub pose: Pose,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpaceCreateOffsetReply {
    pub space_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceCreatePoseArgs {
    pub device_id: u32,
    pub input_name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpaceCreatePoseReply {
    pub space_id: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpaceLocateSpaceArgs {
    pub base_id: u32,
    pub other_id: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpaceLocateSpaceReply {
    pub relation: SpaceRelation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpaceLocateDeviceArgs {
    pub base_id: u32,
    pub device_id: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpaceLocateDeviceReply {
    pub relation: SpaceRelation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpaceDestroyArgs {
    pub space_id: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpaceDestroyReply;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpaceMarkRefSpaceInUseArgs {
    pub ty: ReferenceSpaceType,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpaceMarkRefSpaceInUseReply;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpaceUnmarkRefSpaceInUseArgs {
    pub ty: ReferenceSpaceType,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpaceUnmarkRefSpaceInUseReply;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpaceRecenterLocalSpacesArgs;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpaceRecenterLocalSpacesReply;
