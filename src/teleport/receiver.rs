/*!
 * Socket Receiver
 *
 * TCP server side of a teleport link. Binds an ephemeral port, serves one
 * client at a time and hands each complete token to the scheduler through
 * a single-slot [`TokenMonitor`].
 *
 * Network thread states: `Listening -> Connected -> (Connected | Listening)`.
 * A read error or disconnect drops the partial token and goes back to
 * accept; only an accept failure stops the receiver for good.
 */

use super::io::{join_or_detach, read_token};
use super::link::{EndpointStats, LinkCell, LinkCounters, LinkState};
use super::types::{Direction, EndpointClass, EndpointContext, Firing};
use crate::core::config::TeleportConfig;
use crate::core::errors::{SetupStage, TeleportError, TeleportResult};
use crate::core::limits::{ACCEPT_POKE_TIMEOUT, EPHEMERAL_PORT, LISTEN_BACKLOG};
use crate::core::sync::TokenMonitor;
use crate::monitoring::endpoint_span;
use crate::runtime::{NetworkWaker, OutputPort};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// State shared between the endpoint and its network thread
struct ReceiverShared {
    monitor: TokenMonitor,
    link: LinkCell,
    counters: LinkCounters,
    /// Clone of the connected client, kept so teardown can interrupt a read
    client: Mutex<Option<TcpStream>>,
    stopping: AtomicBool,
}

/// Receiver endpoint instance
pub struct SocketReceiver {
    class: Arc<EndpointClass>,
    instance_name: String,
    port: Option<u16>,
    /// Duplicate of the listening socket; shutting it down wakes accept
    listener: Option<Socket>,
    /// Where teardown connects to wake a thread parked in accept
    contact: Option<SocketAddrV4>,
    shared: Arc<ReceiverShared>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SocketReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketReceiver")
            .field("instance", &self.instance_name)
            .field("class", &self.class.name())
            .field("port", &self.port)
            .field("state", &self.shared.link.get())
            .finish()
    }
}

impl SocketReceiver {
    pub(crate) fn new(class: Arc<EndpointClass>, instance_name: String, ctx: EndpointContext) -> Self {
        let token_size = class.token_size();
        let shared = Arc::new(ReceiverShared {
            monitor: TokenMonitor::new(token_size),
            link: LinkCell::new(LinkState::Starting),
            counters: LinkCounters::default(),
            client: Mutex::new(None),
            stopping: AtomicBool::new(false),
        });
        let mut receiver = Self {
            class,
            instance_name,
            port: None,
            listener: None,
            contact: None,
            shared,
            thread: None,
        };

        let (listener, teardown_handle, port) = match open_listener(&ctx.config) {
            Ok(bound) => bound,
            Err(e) => {
                warn!(instance = %receiver.instance_name, error = %e, "Receiver setup failed");
                receiver.shared.link.set(LinkState::Broken);
                return receiver;
            }
        };
        receiver.port = Some(port);
        receiver.listener = Some(teardown_handle);
        receiver.contact = Some(SocketAddrV4::new(ctx.config.local_contact_host(), port));
        receiver.shared.link.set(LinkState::Listening);

        let worker = ReceiverWorker {
            shared: Arc::clone(&receiver.shared),
            listener,
            waker: ctx.waker,
            instance: receiver.instance_name.clone(),
            tcp_nodelay: ctx.config.tcp_nodelay,
            token: vec![0u8; token_size],
            bytes_read: 0,
        };
        let spawned = thread::Builder::new()
            .name(format!("teleport-rx-{}", receiver.instance_name))
            .spawn(move || worker.run());
        match spawned {
            Ok(handle) => {
                info!(
                    instance = %receiver.instance_name,
                    class = %receiver.class.name(),
                    port,
                    "Receiver listening"
                );
                receiver.thread = Some(handle);
            }
            Err(e) => {
                let err = TeleportError::setup(SetupStage::Spawn, e);
                warn!(instance = %receiver.instance_name, error = %err, "Receiver setup failed");
                receiver.shared.link.set(LinkState::Broken);
            }
        }
        receiver
    }

    pub fn class(&self) -> &Arc<EndpointClass> {
        &self.class
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// OS-assigned port, or `None` if setup failed
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn link_state(&self) -> LinkState {
        self.shared.link.get()
    }

    /// Whether a token is waiting to be picked up by the scheduler
    pub fn has_pending_token(&self) -> bool {
        self.shared.monitor.is_full()
    }

    /// One scheduler firing: move a buffered token to `output` if there is room
    pub fn fire(&self, output: &mut dyn OutputPort) -> Firing {
        if output.space_available() == 0 {
            return Firing::Idle;
        }
        if self
            .shared
            .monitor
            .try_drain_with(|token| output.write_token(token))
        {
            Firing::Transferred
        } else {
            Firing::Idle
        }
    }

    pub fn stats(&self) -> EndpointStats {
        let mut stats = EndpointStats {
            instance: self.instance_name.clone(),
            class: self.class.name().to_string(),
            direction: self.class.direction(),
            token_size: self.class.token_size(),
            state: self.link_state(),
            tokens: 0,
            connections: 0,
            port: self.port,
            remote: None,
        };
        stats.counters(&self.shared.counters);
        stats
    }
}

impl Drop for SocketReceiver {
    fn drop(&mut self) {
        self.shared.stopping.store(true, Ordering::Release);
        self.shared.monitor.close();
        if let Some(client) = self.shared.client.lock().take() {
            let _ = client.shutdown(Shutdown::Both);
        }

        // Linux fails a pending accept once the listener is shut down
        if let Some(listener) = self.listener.take() {
            let _ = listener.shutdown(Shutdown::Read);
        }

        if let Some(handle) = self.thread.take() {
            // Elsewhere a thread parked in accept only notices `stopping`
            // once a connection arrives.
            if !handle.is_finished() {
                if let Some(contact) = self.contact {
                    let addr = SocketAddr::V4(contact);
                    if let Err(e) = TcpStream::connect_timeout(&addr, ACCEPT_POKE_TIMEOUT) {
                        debug!(instance = %self.instance_name, error = %e, "Accept poke failed");
                    }
                }
            }
            join_or_detach(handle, &self.instance_name);
        }

        self.shared.link.set(LinkState::Stopped);
        debug!(instance = %self.instance_name, "Receiver destroyed");
    }
}

/// Bind and listen on an OS-assigned port
///
/// Returns the listener, a duplicate handle for teardown and the port.
fn open_listener(config: &TeleportConfig) -> TeleportResult<(TcpListener, Socket, u16)> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| TeleportError::setup(SetupStage::Socket, e))?;

    if let Err(e) = socket.set_reuse_address(true) {
        warn!(error = %e, "Could not enable SO_REUSEADDR");
    }

    let addr = SocketAddr::V4(SocketAddrV4::new(config.bind_host, EPHEMERAL_PORT));
    socket
        .bind(&addr.into())
        .map_err(|e| TeleportError::setup(SetupStage::Bind, e))?;
    socket
        .listen(LISTEN_BACKLOG)
        .map_err(|e| TeleportError::setup(SetupStage::Listen, e))?;

    let local = socket
        .local_addr()
        .map_err(|e| TeleportError::setup(SetupStage::LocalAddr, e))?;
    let port = match local.as_socket() {
        Some(SocketAddr::V4(v4)) => v4.port(),
        _ => {
            return Err(TeleportError::Setup {
                stage: SetupStage::LocalAddr,
                reason: "listener is not bound to an IPv4 address".to_string(),
            })
        }
    };

    let handle = socket
        .try_clone()
        .map_err(|e| TeleportError::setup(SetupStage::Socket, e))?;
    Ok((socket.into(), handle, port))
}

enum Adopt {
    Serve,
    Reject,
    Stop,
}

/// Network thread body
struct ReceiverWorker {
    shared: Arc<ReceiverShared>,
    listener: TcpListener,
    waker: Arc<dyn NetworkWaker>,
    instance: String,
    tcp_nodelay: bool,
    token: Vec<u8>,
    /// Bytes of the current token read so far, across partial reads
    bytes_read: usize,
}

impl ReceiverWorker {
    fn run(mut self) {
        let _span = endpoint_span(Direction::Receiver, &self.instance).entered();
        loop {
            // one iteration per client
            if self.stopping() {
                break;
            }
            let (mut stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) => {
                    if !self.stopping() {
                        warn!(error = %e, "accept() failed; receiver stops serving");
                        self.shared.link.set(LinkState::Broken);
                    }
                    return;
                }
            };

            match self.adopt(&stream) {
                Adopt::Serve => {}
                Adopt::Reject => continue,
                Adopt::Stop => break,
            }
            if self.tcp_nodelay {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(error = %e, "Could not set TCP_NODELAY");
                }
            }
            self.shared.counters.connection();
            self.shared.link.set(LinkState::Connected);
            info!(peer = %peer, "Client connected");

            let err = self.serve(&mut stream);
            drop(self.shared.client.lock().take());
            match err {
                TeleportError::MonitorClosed => break,
                err => {
                    if self.stopping() {
                        break;
                    }
                    warn!(peer = %peer, error = %err, "Client dropped; waiting for a new one");
                    self.shared.link.set(LinkState::Listening);
                }
            }
        }
        self.shared.link.set_unless_broken(LinkState::Stopped);
        debug!("Receiver thread exiting");
    }

    /// Register `stream` as the current client unless teardown has begun
    fn adopt(&self, stream: &TcpStream) -> Adopt {
        let mut client = self.shared.client.lock();
        if self.stopping() {
            return Adopt::Stop;
        }
        match stream.try_clone() {
            Ok(clone) => {
                *client = Some(clone);
                Adopt::Serve
            }
            Err(e) => {
                warn!(error = %e, "Could not register client; dropping it");
                Adopt::Reject
            }
        }
    }

    /// Read tokens from `stream` until something goes wrong
    fn serve(&mut self, stream: &mut TcpStream) -> TeleportError {
        loop {
            // one iteration per token
            if let Err(e) = self.shared.monitor.wait_until_empty() {
                return e;
            }
            if let Err(e) = read_token(stream, &mut self.token, &mut self.bytes_read) {
                return e;
            }
            self.bytes_read = 0;

            if let Err(e) = self.shared.monitor.wait_until_empty_then_fill(&self.token) {
                return e;
            }
            self.shared.counters.token();
            debug!("Token received");

            self.waker.wake_up_network();
        }
    }

    #[inline]
    fn stopping(&self) -> bool {
        self.shared.stopping.load(Ordering::Acquire)
    }
}
