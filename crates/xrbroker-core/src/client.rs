//! Per-client state (spec §3 "Client").
//!
//! One `Client` exists for the lifetime of one connected peer: it owns
//! that peer's three handle tables, the optional session/compositor
//! pair, and the policy fields the arbiter reads to compute
//! primary/focused/visible/z-order. Nothing here is synchronized — a
//! `Client` is only ever touched from its own worker thread or from the
//! mainloop while that worker thread is not running (spec §5).

use xrbroker_proto::limits::{
    MAX_SEMAPHORES, MAX_SPACES, MAX_SWAPCHAINS, REFERENCE_SPACE_TYPE_COUNT, SEMANTIC_SPACE_COUNT,
};
use xrbroker_proto::types::{ReferenceSpaceType, SessionInfo};

use crate::collaborators::{Compositor, SemaphoreHandle, SpaceHandle, SwapchainHandle};
use crate::handle_table::HandleTable;

/// One swapchain as tracked at the broker layer: the overseer/compositor
/// handle plus the descriptor the client negotiated at creation time.
pub struct SwapchainSlot {
    pub handle: SwapchainHandle,
    pub width: u32,
    pub height: u32,
    pub format: i64,
    pub image_count: u32,
}

pub struct Session {
    pub info: SessionInfo,
    pub compositor: Option<Box<dyn Compositor>>,
    pub active: bool,
}

pub struct Client {
    pub client_id: u32,
    pub pid: u32,
    pub process_name: String,

    pub session: Option<Session>,

    pub swapchains: HandleTable<SwapchainSlot>,
    pub semaphores: HandleTable<SemaphoreHandle>,
    /// Slots `0..SEMANTIC_SPACE_COUNT` are pre-populated with the
    /// overseer's semantic spaces at client creation (spec §4.B); slots
    /// beyond that are ordinary client-created spaces.
    pub spaces: HandleTable<SpaceHandle>,

    /// Strict-alternation tracking for `space_mark_ref_space_in_use` /
    /// `space_unmark_ref_space_in_use` (spec §4.E.2): `true` once marked,
    /// cleared on unmark; marking twice or unmarking while clear is a
    /// caller error.
    pub ref_space_in_use: [bool; REFERENCE_SPACE_TYPE_COUNT],

    pub is_overlay: bool,
    pub z_order: i64,

    /// Mirrors of what the arbiter last computed for this client, kept
    /// here so handlers (`system_get_client_info`) can read them without
    /// taking the arbiter lock on every call.
    pub primary: bool,
    pub focused: bool,
    pub visible: bool,
}

impl Client {
    pub fn new(client_id: u32, pid: u32, process_name: String) -> Self {
        Self {
            client_id,
            pid,
            process_name,
            session: None,
            swapchains: HandleTable::new(MAX_SWAPCHAINS),
            semaphores: HandleTable::new(MAX_SEMAPHORES),
            spaces: HandleTable::new(MAX_SPACES),
            ref_space_in_use: [false; REFERENCE_SPACE_TYPE_COUNT],
            is_overlay: false,
            z_order: 0,
            primary: false,
            focused: false,
            visible: false,
        }
    }

    /// Pre-populates the semantic-space prefix of the space table from the
    /// overseer (spec §4.B). Called once, right after `new`, before the
    /// client can observe any space IDs.
    pub fn install_semantic_spaces(&mut self, ids: [Option<SpaceHandle>; SEMANTIC_SPACE_COUNT]) {
        for (i, id) in ids.into_iter().enumerate() {
            if let Some(handle) = id {
                let _ = self.spaces.insert_at(i as u32, handle);
            }
        }
    }

    pub fn session_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.active)
    }

    pub fn has_compositor(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.compositor.is_some())
    }

    pub fn mark_ref_space_in_use(&mut self, ty: ReferenceSpaceType) -> bool {
        let slot = &mut self.ref_space_in_use[ty.index()];
        if *slot {
            false
        } else {
            *slot = true;
            true
        }
    }

    pub fn unmark_ref_space_in_use(&mut self, ty: ReferenceSpaceType) -> bool {
        let slot = &mut self.ref_space_in_use[ty.index()];
        if *slot {
            *slot = false;
            true
        } else {
            false
        }
    }
}

/// Cross-client bookkeeping `system_get_clients`/`system_get_client_info`/
/// `system_toggle_io_client` need, shared across every worker thread (spec
/// §4.E.6). Each `Client` otherwise lives only on its own thread; this is
/// the one piece of per-client state other clients' handlers may read or
/// write, so it is a plain `Mutex`-guarded map rather than living inside
/// `Client` itself.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub pid: u32,
    pub process_name: String,
    pub io_active: bool,
}

#[derive(Default)]
pub struct ClientDirectory {
    entries: std::sync::Mutex<std::collections::BTreeMap<u32, DirectoryEntry>>,
}

impl ClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, client_id: u32, pid: u32, process_name: String) {
        self.entries.lock().unwrap().insert(
            client_id,
            DirectoryEntry {
                pid,
                process_name,
                io_active: true,
            },
        );
    }

    pub fn remove(&self, client_id: u32) {
        self.entries.lock().unwrap().remove(&client_id);
    }

    pub fn client_ids(&self) -> Vec<u32> {
        self.entries.lock().unwrap().keys().copied().collect()
    }

    pub fn get(&self, client_id: u32) -> Option<DirectoryEntry> {
        self.entries.lock().unwrap().get(&client_id).cloned()
    }

    /// Flips `io_active` for `client_id`, returning the new value.
    pub fn toggle_io_active(&self, client_id: u32) -> Option<bool> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(&client_id)?;
        entry.io_active = !entry.io_active;
        Some(entry.io_active)
    }
}
