use serde::{Deserialize, Serialize};
use std::fmt;

/// Result codes carried in every reply. `Success` is the only non-negative
/// value; everything else is a specific failure kind. See spec §6.3/§7.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    Success = 0,
    IpcFailure = -1,
    SessionNotCreated = -2,
    SessionAlreadyCreated = -3,
    CompositorNotCreated = -4,
    PoseNotActive = -5,
    SwapchainFlagValidButUnsupported = -6,
    DeviceCreationFailed = -7,
}

impl ResultCode {
    pub fn is_success(self) -> bool {
        matches!(self, ResultCode::Success)
    }

    /// Whether §7's logging policy wants this result logged when returned
    /// from a handler. Precondition errors are common during normal client
    /// lifecycle and must not be logged.
    pub fn should_log(self) -> bool {
        !matches!(
            self,
            ResultCode::Success
                | ResultCode::SessionNotCreated
                | ResultCode::SessionAlreadyCreated
                | ResultCode::CompositorNotCreated
        )
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for ResultCode {}
