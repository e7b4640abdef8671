use serde::{Deserialize, Serialize};

use crate::limits::REFERENCE_SPACE_TYPE_COUNT;

/// The six well-known reference spaces the overseer exposes (spec §3, §4.B).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceSpaceType {
    Root = 0,
    View = 1,
    Local = 2,
    LocalFloor = 3,
    Stage = 4,
    Unbounded = 5,
}

impl ReferenceSpaceType {
    pub const ALL: [ReferenceSpaceType; REFERENCE_SPACE_TYPE_COUNT] = [
        ReferenceSpaceType::Root,
        ReferenceSpaceType::View,
        ReferenceSpaceType::Local,
        ReferenceSpaceType::LocalFloor,
        ReferenceSpaceType::Stage,
        ReferenceSpaceType::Unbounded,
    ];

    pub fn index(self) -> usize {
        self as u32 as usize
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewType {
    Mono = 0,
    Stereo = 1,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerType {
    Projection = 0,
    ProjectionDepth = 1,
    Quad = 2,
    Cube = 3,
    Cylinder = 4,
    Equirect1 = 5,
    Equirect2 = 6,
    Passthrough = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pose {
    pub orientation: [f32; 4],
    pub position: [f32; 3],
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            orientation: [0.0, 0.0, 0.0, 1.0],
            position: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fov {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

/// Relation returned by `space_locate_space` / `space_locate_device`: a pose
/// plus validity flags, matching OpenXR's `XrSpaceLocation` shape.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpaceRelation {
    pub pose: Pose,
    pub orientation_valid: bool,
    pub position_valid: bool,
    pub orientation_tracked: bool,
    pub position_tracked: bool,
}

impl SpaceRelation {
    pub fn zeroed_but_valid() -> Self {
        Self {
            pose: Pose::default(),
            orientation_valid: true,
            position_valid: true,
            orientation_tracked: false,
            position_tracked: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub is_overlay: bool,
    pub z_order: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapchainInfo {
    pub width: u32,
    pub height: u32,
    pub format: i64,
    pub sample_count: u32,
    pub array_size: u32,
    pub mip_count: u32,
    pub usage_color: bool,
    pub usage_depth_stencil: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapchainDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: i64,
    pub image_count: u32,
}
