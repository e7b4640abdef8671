//! The broker core: everything a mainloop needs to accept a client
//! connection and answer its requests, minus the OS transport itself
//! (spec §1, §3). `xrbroker-server` supplies the transport and the real
//! `Compositor`/`SpaceOverseer`/`SystemCompositor`/`Device` collaborators;
//! this crate owns the protocol-facing state machine.

pub mod arbiter;
pub mod channel;
pub mod client;
pub mod collaborators;
pub mod devices;
pub mod dispatch;
pub mod handle_table;
pub mod handlers;
pub mod shm;

pub use arbiter::{Arbiter, ClientView};
pub use channel::Channel;
pub use client::{Client, ClientDirectory, Session, SwapchainSlot};
pub use devices::DeviceRegistry;
pub use dispatch::{dispatch, DispatchOutcome, HandlerCtx, TrailingPayload};
pub use handle_table::HandleTable;
pub use shm::ShmRegion;
