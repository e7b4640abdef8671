//! Component E: the per-tag handler bodies (spec §4.E). Each submodule
//! matches one of spec §4.E's subsections; every function takes the
//! shared [`crate::dispatch::HandlerCtx`] plus that tag's argument struct
//! and returns the tag's reply or a [`xrbroker_proto::ResultCode`].

pub mod device;
pub mod frame;
pub mod session;
pub mod space;
pub mod swapchain;
pub mod system;
