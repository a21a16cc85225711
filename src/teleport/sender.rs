/*!
 * Socket Sender
 *
 * TCP client side of a teleport link. Waits for its remote address,
 * connects once and writes every token the scheduler deposits in its
 * single-slot [`TokenMonitor`].
 *
 * Network thread states:
 * `AwaitingAddress -> Connecting -> Connected` (no reconnect path).
 * Any address, connect or write failure stops the sender permanently; the
 * slot then stays full and scheduler firings simply stop making progress.
 */

use super::io::{join_or_detach, write_token};
use super::link::{EndpointStats, LinkCell, LinkCounters, LinkState};
use super::types::{Direction, EndpointClass, EndpointContext, Firing};
use crate::core::errors::{SetupStage, TeleportError, TeleportResult};
use crate::core::sync::TokenMonitor;
use crate::monitoring::endpoint_span;
use crate::runtime::{InputPort, NetworkWaker};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a sender connects to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAddress {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl RemoteAddress {
    /// Resolve to a socket address; only dotted IPv4 hosts are accepted
    pub fn to_socket_addr(&self) -> TeleportResult<SocketAddrV4> {
        let ip: Ipv4Addr = self
            .host
            .parse()
            .map_err(|_| TeleportError::InvalidHost(self.host.clone()))?;
        Ok(SocketAddrV4::new(ip, self.port))
    }
}

#[derive(Default)]
struct RemoteSlot {
    address: Option<RemoteAddress>,
    /// Set once the network thread took `address`; it is fixed from then on
    taken: bool,
    closed: bool,
}

/// State shared between the endpoint and its network thread
struct SenderShared {
    monitor: TokenMonitor,
    link: LinkCell,
    counters: LinkCounters,
    remote: Mutex<RemoteSlot>,
    remote_ready: Condvar,
    stopping: AtomicBool,
}

/// Sender endpoint instance
pub struct SocketSender {
    class: Arc<EndpointClass>,
    instance_name: String,
    shared: Arc<SenderShared>,
    /// Duplicate of the worker's socket so teardown can shut it down
    socket: Option<Socket>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SocketSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketSender")
            .field("instance", &self.instance_name)
            .field("class", &self.class.name())
            .field("remote", &self.remote_address())
            .field("state", &self.shared.link.get())
            .finish()
    }
}

impl SocketSender {
    pub(crate) fn new(class: Arc<EndpointClass>, instance_name: String, ctx: EndpointContext) -> Self {
        let token_size = class.token_size();
        let shared = Arc::new(SenderShared {
            monitor: TokenMonitor::new(token_size),
            link: LinkCell::new(LinkState::Starting),
            counters: LinkCounters::default(),
            remote: Mutex::new(RemoteSlot::default()),
            remote_ready: Condvar::new(),
            stopping: AtomicBool::new(false),
        });
        let mut sender = Self {
            class,
            instance_name,
            shared,
            socket: None,
            thread: None,
        };

        let (socket, teardown_handle) = match open_socket() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(instance = %sender.instance_name, error = %e, "Sender setup failed");
                sender.shared.link.set(LinkState::Broken);
                return sender;
            }
        };
        sender.socket = Some(teardown_handle);
        sender.shared.link.set(LinkState::AwaitingAddress);

        let worker = SenderWorker {
            shared: Arc::clone(&sender.shared),
            socket,
            waker: ctx.waker,
            instance: sender.instance_name.clone(),
            tcp_nodelay: ctx.config.tcp_nodelay,
            connect_timeout: ctx.config.connect_timeout,
            token_size,
        };
        let spawned = thread::Builder::new()
            .name(format!("teleport-tx-{}", sender.instance_name))
            .spawn(move || worker.run());
        match spawned {
            Ok(handle) => {
                debug!(
                    instance = %sender.instance_name,
                    class = %sender.class.name(),
                    "Sender waiting for remote address"
                );
                sender.thread = Some(handle);
            }
            Err(e) => {
                let err = TeleportError::setup(SetupStage::Spawn, e);
                warn!(instance = %sender.instance_name, error = %err, "Sender setup failed");
                sender.shared.link.set(LinkState::Broken);
            }
        }
        sender
    }

    pub fn class(&self) -> &Arc<EndpointClass> {
        &self.class
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn link_state(&self) -> LinkState {
        self.shared.link.get()
    }

    /// Supply the receiver's address; releases the network thread to connect
    ///
    /// Ignored once the network thread has picked up an address.
    pub fn set_remote_address(&self, host: &str, port: u16) {
        let mut remote = self.shared.remote.lock();
        if remote.taken {
            debug!(
                instance = %self.instance_name,
                current = ?remote.address,
                ignored_host = %host,
                ignored_port = port,
                "Remote address already in use"
            );
            return;
        }
        if let Some(previous) = remote.address.as_ref() {
            debug!(instance = %self.instance_name, previous = %previous, "Replacing remote address");
        }
        remote.address = Some(RemoteAddress {
            host: host.to_owned(),
            port,
        });
        self.shared.remote_ready.notify_all();
    }

    pub fn remote_address(&self) -> Option<RemoteAddress> {
        self.shared.remote.lock().address.clone()
    }

    /// Whether the previous token is still waiting to go out
    pub fn has_pending_token(&self) -> bool {
        self.shared.monitor.is_full()
    }

    /// One scheduler firing: hand a token from `input` to the network thread if the slot is free
    pub fn fire(&self, input: &mut dyn InputPort) -> Firing {
        if input.tokens_available() == 0 {
            return Firing::Idle;
        }
        if self
            .shared
            .monitor
            .try_fill_with(|slot| input.read_token(slot))
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
            port: None,
            remote: self.remote_address().map(|r| r.to_string()),
        };
        stats.counters(&self.shared.counters);
        stats
    }
}

impl Drop for SocketSender {
    fn drop(&mut self) {
        self.shared.stopping.store(true, Ordering::Release);
        {
            let mut remote = self.shared.remote.lock();
            remote.closed = true;
            self.shared.remote_ready.notify_all();
        }
        self.shared.monitor.close();
        if let Some(socket) = self.socket.take() {
            let _ = socket.shutdown(Shutdown::Both);
        }

        if let Some(handle) = self.thread.take() {
            join_or_detach(handle, &self.instance_name);
        }

        self.shared.link.set(LinkState::Stopped);
        debug!(instance = %self.instance_name, "Sender destroyed");
    }
}

/// Open the client socket plus a duplicate handle for teardown
fn open_socket() -> TeleportResult<(Socket, Socket)> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| TeleportError::setup(SetupStage::Socket, e))?;
    let handle = socket
        .try_clone()
        .map_err(|e| TeleportError::setup(SetupStage::Socket, e))?;
    Ok((socket, handle))
}

/// Network thread body
struct SenderWorker {
    shared: Arc<SenderShared>,
    socket: Socket,
    waker: Arc<dyn NetworkWaker>,
    instance: String,
    tcp_nodelay: bool,
    connect_timeout: Option<Duration>,
    token_size: usize,
}

impl SenderWorker {
    fn run(self) {
        let _span = endpoint_span(Direction::Sender, &self.instance).entered();
        let Some(remote) = self.await_remote() else {
            debug!("Sender torn down before it got an address");
            return;
        };

        let mut stream = match self.connect(&remote) {
            Ok(stream) => stream,
            Err(e) => {
                if !self.stopping() {
                    warn!(remote = %remote, error = %e, "Sender giving up");
                    self.shared.link.set(LinkState::Broken);
                }
                return;
            }
        };
        self.shared.counters.connection();
        self.shared.link.set(LinkState::Connected);
        info!(remote = %remote, "Sender connected");

        let mut token = vec![0u8; self.token_size];
        loop {
            // one iteration per token
            if self.shared.monitor.wait_until_full_then_peek(&mut token).is_err() {
                break;
            }
            if let Err(e) = write_token(&mut stream, &token) {
                if !self.stopping() {
                    warn!(error = %e, "write() failed; sender stops for good");
                    self.shared.link.set(LinkState::Broken);
                }
                return;
            }
            self.shared.monitor.release();
            self.shared.counters.token();
            debug!("Token sent");

            self.waker.wake_up_network();
        }
        self.shared.link.set_unless_broken(LinkState::Stopped);
    }

    /// Block until an address is supplied; `None` on teardown
    fn await_remote(&self) -> Option<RemoteAddress> {
        let mut remote = self.shared.remote.lock();
        loop {
            if remote.closed {
                return None;
            }
            if let Some(address) = remote.address.clone() {
                remote.taken = true;
                return Some(address);
            }
            self.shared.remote_ready.wait(&mut remote);
        }
    }

    fn connect(&self, remote: &RemoteAddress) -> TeleportResult<TcpStream> {
        let addr = remote.to_socket_addr()?;
        self.shared.link.set(LinkState::Connecting);

        let target = SockAddr::from(SocketAddr::V4(addr));
        let connected = match self.connect_timeout {
            Some(timeout) => self.socket.connect_timeout(&target, timeout),
            None => self.socket.connect(&target),
        };
        connected.map_err(|e| TeleportError::ConnectFailed {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        let stream: TcpStream = self
            .socket
            .try_clone()
            .map_err(|e| TeleportError::ConnectFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?
            .into();
        if self.tcp_nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                debug!(error = %e, "Could not set TCP_NODELAY");
            }
        }
        Ok(stream)
    }

    #[inline]
    fn stopping(&self) -> bool {
        self.shared.stopping.load(Ordering::Acquire)
    }
}
