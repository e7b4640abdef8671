//! Component F: the client arbiter (spec §4.F, §5).
//!
//! Computes which client is primary, which is focused, and which are
//! visible, from each client's overlay flag, z-order, and session-active
//! state. State lives behind a `std::sync::Mutex` (the OS-thread
//! concurrency model, spec §5); the lock is always released before any
//! call into `SystemCompositor` — recompute gathers the deltas while
//! holding the lock, then applies them after dropping it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use xrbroker_proto::ResultCode;

use crate::collaborators::SystemCompositor;

#[derive(Debug, Clone, Copy)]
struct ClientPolicy {
    is_overlay: bool,
    z_order: i64,
    session_active: bool,
    /// Stamped from a monotonic counter the moment `session_active` last
    /// flipped false→true; breaks z-order ties toward the most recently
    /// activated client (spec §4.F) instead of the lowest client ID.
    activation_seq: u64,
}

struct ArbiterState {
    clients: BTreeMap<u32, ClientPolicy>,
    forced_primary: Option<u32>,
    forced_focused: Option<u32>,
    active_client_index: Option<u32>,
    last_active_client_index: Option<u32>,
    next_activation_seq: u64,
}

impl ArbiterState {
    /// Highest-z-order, non-overlay, session-active client; ties broken
    /// toward the most recently activated client (spec §4.F).
    fn natural_primary(&self) -> Option<u32> {
        self.clients
            .iter()
            .filter(|(_, p)| p.session_active && !p.is_overlay)
            .max_by_key(|(_, p)| (p.z_order, p.activation_seq))
            .map(|(id, _)| *id)
    }

    fn primary(&self) -> Option<u32> {
        match self.forced_primary {
            Some(id) if self.clients.get(&id).is_some_and(|p| p.session_active) => Some(id),
            _ => self.natural_primary(),
        }
    }

    /// `primary`, unless an active overlay outranks it in z-order, in
    /// which case that overlay takes focus instead (spec §4.F: "focused =
    /// primary unless an overlay with higher z-order is active, in which
    /// case the overlay is focused and the primary remains visible").
    fn natural_focused(&self) -> Option<u32> {
        let primary = self.primary();
        let primary_z = primary.and_then(|id| self.clients.get(&id)).map(|p| p.z_order);

        let overlay = self
            .clients
            .iter()
            .filter(|(_, p)| p.session_active && p.is_overlay)
            .filter(|(_, p)| match primary_z {
                Some(z) => p.z_order > z,
                None => true,
            })
            .max_by_key(|(id, p)| (p.z_order, std::cmp::Reverse(**id)))
            .map(|(id, _)| *id);

        overlay.or(primary)
    }

    fn focused(&self) -> Option<u32> {
        match self.forced_focused {
            Some(id) if self.clients.get(&id).is_some_and(|p| p.session_active) => Some(id),
            _ => self.natural_focused(),
        }
    }

    /// A client is visible if its session is active: the primary client,
    /// every overlay, and any backgrounded-but-active client all render
    /// (spec §4.F: z-order only decides stacking, not whether a client is
    /// drawn at all).
    fn visible_ids(&self) -> Vec<u32> {
        self.clients
            .iter()
            .filter(|(_, p)| p.session_active)
            .map(|(id, _)| *id)
            .collect()
    }
}

pub struct Arbiter {
    state: Mutex<ArbiterState>,
    system_compositor: Arc<dyn SystemCompositor>,
}

/// What a client should be told about itself after a recompute (spec
/// §4.E.6 `system_get_client_info`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientView {
    pub primary: bool,
    pub focused: bool,
    pub visible: bool,
    pub z_order: i64,
}

impl Arbiter {
    pub fn new(system_compositor: Arc<dyn SystemCompositor>) -> Self {
        Self {
            state: Mutex::new(ArbiterState {
                clients: BTreeMap::new(),
                forced_primary: None,
                forced_focused: None,
                active_client_index: None,
                last_active_client_index: None,
                next_activation_seq: 0,
            }),
            system_compositor,
        }
    }

    pub fn register_client(&self, client_id: u32, is_overlay: bool, z_order: i64) {
        {
            let mut state = self.state.lock().unwrap();
            state.clients.insert(
                client_id,
                ClientPolicy {
                    is_overlay,
                    z_order,
                    session_active: false,
                    activation_seq: 0,
                },
            );
        }
        self.recompute_and_apply();
    }

    pub fn remove_client(&self, client_id: u32) {
        {
            let mut state = self.state.lock().unwrap();
            state.clients.remove(&client_id);
            if state.forced_primary == Some(client_id) {
                state.forced_primary = None;
            }
            if state.forced_focused == Some(client_id) {
                state.forced_focused = None;
            }
        }
        self.recompute_and_apply();
    }

    pub fn set_session_active(&self, client_id: u32, active: bool) {
        {
            let mut state = self.state.lock().unwrap();
            let becoming_active =
                active && state.clients.get(&client_id).is_some_and(|p| !p.session_active);
            let seq = becoming_active.then(|| {
                let seq = state.next_activation_seq;
                state.next_activation_seq += 1;
                seq
            });
            if let Some(policy) = state.clients.get_mut(&client_id) {
                policy.session_active = active;
                if let Some(seq) = seq {
                    policy.activation_seq = seq;
                }
            }
        }
        self.recompute_and_apply();
    }

    pub fn set_z_order(&self, client_id: u32, z_order: i64) {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(policy) = state.clients.get_mut(&client_id) {
                policy.z_order = z_order;
            }
        }
        self.recompute_and_apply();
    }

    /// `system_set_primary_client` (spec §4.E.6): an explicit override
    /// that wins over the natural z-order computation as long as the
    /// target client's session stays active.
    pub fn set_primary_client(&self, client_id: u32) -> Result<(), ResultCode> {
        {
            let mut state = self.state.lock().unwrap();
            if !state.clients.contains_key(&client_id) {
                return Err(ResultCode::IpcFailure);
            }
            state.forced_primary = Some(client_id);
        }
        self.recompute_and_apply();
        Ok(())
    }

    pub fn set_focused_client(&self, client_id: u32) -> Result<(), ResultCode> {
        {
            let mut state = self.state.lock().unwrap();
            if !state.clients.contains_key(&client_id) {
                return Err(ResultCode::IpcFailure);
            }
            state.forced_focused = Some(client_id);
        }
        self.recompute_and_apply();
        Ok(())
    }

    /// Records that `client_id` just had a frame predicted for it (spec
    /// §4.E.3: `predict_frame` marks its caller as the active client). The
    /// first call after `session_begin` is also what promotes the client
    /// to session-active in the arbiter (spec §4.F) — a client that never
    /// predicts a frame stays invisible to it.
    pub fn note_frame_activity(&self, client_id: u32) {
        let should_activate = {
            let mut state = self.state.lock().unwrap();
            if state.active_client_index != Some(client_id) {
                state.last_active_client_index = state.active_client_index;
                state.active_client_index = Some(client_id);
            }
            state.clients.get(&client_id).is_some_and(|p| !p.session_active)
        };
        if should_activate {
            self.set_session_active(client_id, true);
        }
    }

    pub fn active_client_index(&self) -> Option<u32> {
        self.state.lock().unwrap().active_client_index
    }

    pub fn last_active_client_index(&self) -> Option<u32> {
        self.state.lock().unwrap().last_active_client_index
    }

    pub fn view_of(&self, client_id: u32) -> ClientView {
        let state = self.state.lock().unwrap();
        let primary = state.primary() == Some(client_id);
        let focused = state.focused() == Some(client_id);
        let visible = state
            .clients
            .get(&client_id)
            .is_some_and(|p| p.session_active);
        let z_order = state.clients.get(&client_id).map(|p| p.z_order).unwrap_or(0);
        ClientView {
            primary,
            focused,
            visible,
            z_order,
        }
    }

    pub fn client_ids(&self) -> Vec<u32> {
        self.state.lock().unwrap().clients.keys().copied().collect()
    }

    /// Computes the new visibility/focus deltas while holding the lock,
    /// then releases it before telling the system compositor — keeping
    /// the mutex off the call stack of a downstream collaborator (spec
    /// §5).
    fn recompute_and_apply(&self) {
        let deltas: Vec<(u32, bool, bool, i64)> = {
            let state = self.state.lock().unwrap();
            let focused = state.focused();
            let visible: std::collections::HashSet<u32> = state.visible_ids().into_iter().collect();
            state
                .clients
                .iter()
                .map(|(id, policy)| {
                    (*id, visible.contains(id), focused == Some(*id), policy.z_order)
                })
                .collect()
        };

        for (client_id, visible, focused, z_order) in deltas {
            self.system_compositor.set_state(client_id, visible, focused);
            self.system_compositor.set_z_order(client_id, z_order);
        }
    }
}
