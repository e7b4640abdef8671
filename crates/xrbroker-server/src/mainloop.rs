//! Component G: the platform mainloop (spec §4.G, §5).
//!
//! Accepts client connections on a [`MainloopTransport`] and spawns one OS
//! thread per client — never an async task (spec §5: the per-client
//! dispatch loop is synchronous and blocking by design, so a misbehaving
//! client can only ever starve itself). Each thread owns its `Channel` and
//! `Client` for the life of the connection and tears the client down on
//! any channel failure.

use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use log::{info, warn};
use nix::sys::socket::{getsockopt, sockopt::PeerCredentials};

use xrbroker_core::collaborators::{CompositorFactory, SpaceOverseer, SystemCompositor};
use xrbroker_core::devices::DeviceRegistry;
use xrbroker_core::handlers::session;
use xrbroker_core::{Arbiter, Channel, Client, ClientDirectory, HandlerCtx, ShmRegion};
use xrbroker_proto::messages::session::SessionDestroyArgs;
use xrbroker_proto::types::ReferenceSpaceType;
use xrbroker_proto::{ChannelError, Request, WireReply};

/// Accepts incoming client connections. Implemented once for desktop Linux
/// (`UnixMainloopTransport`, below); an Android build would swap in a
/// bound local socket and a Windows build an ALPC port, each behind this
/// same trait — neither is implemented here since this workspace carries
/// no Android/Windows-specific crates (an explicit Open Question decision,
/// see `DESIGN.md`).
pub trait MainloopTransport: Send {
    fn accept(&mut self) -> std::io::Result<UnixStream>;
}

/// Desktop Linux transport over a `UnixListener`. Honors systemd-style
/// socket activation (`LISTEN_PID`/`LISTEN_FDS`, spec §9 "Process
/// lifecycle"): when the environment names exactly one inherited
/// descriptor for our own pid, that descriptor is used directly instead of
/// binding `socket_path` ourselves.
pub struct UnixMainloopTransport {
    listener: UnixListener,
}

const SD_LISTEN_FDS_START: RawFd = 3;

impl UnixMainloopTransport {
    pub fn bind(socket_path: &str) -> anyhow::Result<Self> {
        if let Some(listener) = Self::from_socket_activation() {
            info!("using socket-activated listener (LISTEN_FDS=1)");
            return Ok(Self { listener });
        }

        let _ = std::fs::remove_file(socket_path);
        if let Some(parent) = std::path::Path::new(socket_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(socket_path)?;
        info!("listening on {socket_path}");
        Ok(Self { listener })
    }

    fn from_socket_activation() -> Option<UnixListener> {
        let pid = std::env::var("LISTEN_PID").ok()?;
        let fds = std::env::var("LISTEN_FDS").ok()?;
        if pid.parse::<u32>().ok()? != std::process::id() {
            return None;
        }
        if fds.parse::<u32>().ok()? != 1 {
            return None;
        }
        let fd = unsafe { OwnedFd::from_raw_fd(SD_LISTEN_FDS_START) };
        Some(UnixListener::from(fd))
    }
}

impl MainloopTransport for UnixMainloopTransport {
    fn accept(&mut self) -> std::io::Result<UnixStream> {
        let (stream, _addr) = self.listener.accept()?;
        Ok(stream)
    }
}

/// Everything a client worker thread needs, shared across every client
/// (spec §5). Cheap to clone: every field is itself an `Arc`.
#[derive(Clone)]
pub struct Broker {
    pub arbiter: Arc<Arbiter>,
    pub directory: Arc<ClientDirectory>,
    pub overseer: Arc<dyn SpaceOverseer>,
    pub devices: Arc<DeviceRegistry>,
    pub compositor_factory: Arc<dyn CompositorFactory>,
    pub shm: Arc<Mutex<ShmRegion>>,
    next_client_id: Arc<AtomicU32>,
}

impl Broker {
    pub fn new(
        system_compositor: Arc<dyn SystemCompositor>,
        overseer: Arc<dyn SpaceOverseer>,
        devices: DeviceRegistry,
        compositor_factory: Arc<dyn CompositorFactory>,
        mut shm: ShmRegion,
    ) -> Self {
        devices.populate_shm(&mut shm);
        Self {
            arbiter: Arc::new(Arbiter::new(system_compositor)),
            directory: Arc::new(ClientDirectory::new()),
            overseer,
            devices: Arc::new(devices),
            compositor_factory,
            shm: Arc::new(Mutex::new(shm)),
            next_client_id: Arc::new(AtomicU32::new(0)),
        }
    }

    fn next_client_id(&self) -> u32 {
        self.next_client_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Runs the accept loop until the transport's `accept` call fails, which
/// only happens when the listening socket itself is torn down.
pub fn run(mut transport: impl MainloopTransport, broker: Broker) -> std::io::Result<()> {
    loop {
        let stream = transport.accept()?;
        let broker = broker.clone();
        std::thread::spawn(move || serve_client(stream, broker));
    }
}

fn peer_credentials(stream: &UnixStream) -> (u32, String) {
    let cred = getsockopt(stream, PeerCredentials);
    let pid = cred.map(|c| c.pid() as u32).unwrap_or(0);
    let name = std::fs::read_to_string(format!("/proc/{pid}/comm"))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    (pid, name)
}

fn serve_client(stream: UnixStream, broker: Broker) {
    let (pid, process_name) = peer_credentials(&stream);
    let client_id = broker.next_client_id();
    info!("client {client_id} connected (pid {pid}, {process_name})");

    let mut client = Client::new(client_id, pid, process_name.clone());
    let mut semantic = [None; xrbroker_proto::limits::SEMANTIC_SPACE_COUNT];
    for ty in ReferenceSpaceType::ALL {
        semantic[ty.index()] = broker.overseer.semantic_space(ty);
    }
    client.install_semantic_spaces(semantic);
    broker.directory.insert(client_id, pid, process_name);

    let mut channel = Channel::new(stream);

    loop {
        let (request, in_handles) = match channel.recv::<Request>(16) {
            Ok(v) => v,
            Err(ChannelError::Closed) => {
                info!("client {client_id} disconnected");
                break;
            }
            Err(err) => {
                warn!("client {client_id} channel error: {err}");
                break;
            }
        };

        let mut ctx = HandlerCtx {
            client: &mut client,
            arbiter: &broker.arbiter,
            directory: &broker.directory,
            overseer: broker.overseer.as_ref(),
            devices: &broker.devices,
            compositor_factory: broker.compositor_factory.as_ref(),
            shm: &broker.shm,
        };
        let outcome = xrbroker_core::dispatch(&mut ctx, request, in_handles);

        let wire_reply: WireReply = outcome.reply.into();
        if let Err(err) = channel.send(&wire_reply, &outcome.out_handles) {
            warn!("client {client_id} failed to send reply: {err}");
            break;
        }
        if let Some(payload) = outcome.trailing {
            let sent = match &payload {
                xrbroker_core::TrailingPayload::ViewPoses(p) => channel.send(p, &[]),
                xrbroker_core::TrailingPayload::VisibilityMask(bytes) => channel.send(bytes, &[]),
            };
            if let Err(err) = sent {
                warn!("client {client_id} failed to send trailing payload: {err}");
                break;
            }
        }
    }

    teardown_client(&mut client, &broker);
}

/// Runs the same session-destroy cascade a well-behaved client triggers
/// itself (spec §4.E.1), for the case where the channel died instead.
fn teardown_client(client: &mut Client, broker: &Broker) {
    if client.session.is_some() {
        let mut ctx = HandlerCtx {
            client,
            arbiter: &broker.arbiter,
            directory: &broker.directory,
            overseer: broker.overseer.as_ref(),
            devices: &broker.devices,
            compositor_factory: broker.compositor_factory.as_ref(),
            shm: &broker.shm,
        };
        let _ = session::destroy(&mut ctx, SessionDestroyArgs);
    } else {
        broker.arbiter.remove_client(client.client_id);
    }
    broker.directory.remove(client.client_id);
}
