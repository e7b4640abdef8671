//! spec §4.E.1 — session lifecycle.

use xrbroker_proto::limits::SEMANTIC_SPACE_COUNT;
use xrbroker_proto::messages::session::*;
use xrbroker_proto::types::{ReferenceSpaceType, ViewType};
use xrbroker_proto::ResultCode;

use crate::client::Session;
use crate::dispatch::HandlerCtx;

/// `capability_flags` bit 0 requests a mono view configuration; anything
/// else is treated as stereo (spec §4.E.1).
fn view_type_from_capability_flags(flags: u32) -> ViewType {
    if flags & 0x1 != 0 {
        ViewType::Mono
    } else {
        ViewType::Stereo
    }
}

pub fn create(ctx: &mut HandlerCtx<'_>, args: SessionCreateArgs) -> Result<SessionCreateReply, ResultCode> {
    if ctx.client.session.is_some() {
        return Err(ResultCode::SessionAlreadyCreated);
    }

    let compositor = if args.wants_compositor {
        Some(ctx.compositor_factory.create_session(ctx.client.client_id))
    } else {
        None
    };

    ctx.client.session = Some(Session {
        info: args.info,
        compositor,
        active: false,
    });
    ctx.client.is_overlay = args.info.is_overlay;
    ctx.client.z_order = args.info.z_order;

    // Invariant 4: every session_create restores a clean reference-space
    // alternation state and a fresh set of semantic space IDs, regardless
    // of whether this is the client's first session or a recreate after
    // session_destroy.
    ctx.client.ref_space_in_use = [false; xrbroker_proto::limits::REFERENCE_SPACE_TYPE_COUNT];
    let mut semantic = [None; SEMANTIC_SPACE_COUNT];
    for ty in ReferenceSpaceType::ALL {
        semantic[ty.index()] = ctx.overseer.semantic_space(ty);
    }
    ctx.client.install_semantic_spaces(semantic);

    ctx.arbiter
        .register_client(ctx.client.client_id, args.info.is_overlay, args.info.z_order);

    Ok(SessionCreateReply)
}

pub fn begin(ctx: &mut HandlerCtx<'_>, args: SessionBeginArgs) -> Result<SessionBeginReply, ResultCode> {
    let session = ctx
        .client
        .session
        .as_mut()
        .ok_or(ResultCode::SessionNotCreated)?;
    if session.active {
        return Err(ResultCode::SessionAlreadyCreated);
    }

    if let Some(compositor) = session.compositor.as_mut() {
        compositor.begin_session(view_type_from_capability_flags(args.capability_flags), args.capability_flags)?;
    }
    session.active = true;

    // The arbiter only promotes this client to session-active on its first
    // `predict_frame` (spec §4.F), not here — a client that begins a
    // session but never predicts a frame stays invisible to the arbiter.
    Ok(SessionBeginReply)
}

pub fn end(ctx: &mut HandlerCtx<'_>, _args: SessionEndArgs) -> Result<SessionEndReply, ResultCode> {
    let session = ctx
        .client
        .session
        .as_mut()
        .ok_or(ResultCode::SessionNotCreated)?;
    if !session.active {
        return Err(ResultCode::SessionNotCreated);
    }

    if let Some(compositor) = session.compositor.as_mut() {
        compositor.end_session()?;
    }
    session.active = false;
    ctx.arbiter.set_session_active(ctx.client.client_id, false);

    Ok(SessionEndReply)
}

/// Tears down everything owned by the session, in the fixed cascade order
/// (spec §4.E.1): semaphores, then swapchains, then client-owned spaces.
/// The semantic-space prefix is never touched here — those slots are not
/// this client's to destroy, and `session_create` re-derives them anyway
/// on the next create, but leaving them untouched means a client that
/// calls `space_create_semantic_ids` between `session_destroy` and a
/// recreate still sees valid IDs. Then the compositor, then the session
/// record itself.
pub fn destroy(ctx: &mut HandlerCtx<'_>, _args: SessionDestroyArgs) -> Result<SessionDestroyReply, ResultCode> {
    if ctx.client.session.is_none() {
        return Err(ResultCode::SessionNotCreated);
    }

    let mut compositor = ctx.client.session.as_mut().and_then(|s| s.compositor.take());
    let client_id = ctx.client.client_id;

    ctx.client.semaphores.drain_all(|_, handle| {
        if let Some(compositor) = compositor.as_mut() {
            compositor.destroy_semaphore(handle);
        }
    });
    let shm = ctx.shm;
    ctx.client.swapchains.drain_all(|id, slot| {
        if let Some(compositor) = compositor.as_mut() {
            compositor.destroy_swapchain(slot.handle);
        }
        shm.lock().unwrap().clear_swapchain_descriptor(client_id, id);
    });

    let semantic_count = SEMANTIC_SPACE_COUNT as u32;
    let overseer = ctx.overseer;
    let space_capacity = ctx.client.spaces.capacity() as u32;
    for id in semantic_count..space_capacity {
        if let Ok(handle) = ctx.client.spaces.release(id) {
            overseer.destroy_space(handle);
        }
    }

    if let Some(mut compositor) = compositor {
        let _ = compositor.end_session();
    }
    ctx.client.session = None;

    ctx.arbiter.remove_client(ctx.client.client_id);

    Ok(SessionDestroyReply)
}

/// No event queue is implemented: the broker never has anything to report
/// here yet, so this always answers "no event pending". A real event
/// source (state-change notifications, reference-space-change warnings)
/// would plug in at this one call site.
pub fn poll_events(
    ctx: &mut HandlerCtx<'_>,
    _args: SessionPollEventsArgs,
) -> Result<SessionPollEventsReply, ResultCode> {
    if ctx.client.session.is_none() {
        return Err(ResultCode::SessionNotCreated);
    }
    Ok(SessionPollEventsReply {
        has_event: false,
        event_type: 0,
    })
}
