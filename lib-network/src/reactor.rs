//! Synchronous UDP reactor: one dedicated OS thread polling a single socket
//! with a 1s read timeout, forwarding every datagram to the orchestrator
//! through a channel. Binding with port 0 lets the OS pick a free port,
//! discoverable afterward via [`Reactor::local_addr`].
//!
//! This module only ever sees raw bytes and a [`SocketAddrV4`] — dispatch
//! on the first byte (DHT vs. UDX) and host/network byte-order conversion
//! both happen above this layer, at the protocol boundary, not here.

use std::net::{SocketAddrV4, UdpSocket};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{NodeError, Result};

const SOCKET_READ_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_DATAGRAM_LEN: usize = 2048;

pub struct Inbound {
    pub from: SocketAddrV4,
    pub data: Vec<u8>,
}

pub struct Reactor {
    socket: UdpSocket,
    local_addr: SocketAddrV4,
    inbound_rx: Receiver<Inbound>,
    shutdown_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl Reactor {
    /// Bind to `bind_addr` (port 0 for an OS-assigned port) and start the
    /// polling thread.
    pub fn bind(bind_addr: SocketAddrV4) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_read_timeout(Some(SOCKET_READ_TIMEOUT))?;
        let local_addr = match socket.local_addr()? {
            std::net::SocketAddr::V4(addr) => addr,
            std::net::SocketAddr::V6(_) => return Err(NodeError::SocketError(std::io::Error::other("bound an IPv6 address to an IPv4 reactor"))),
        };

        let worker_socket = socket.try_clone()?;
        let (inbound_tx, inbound_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel();

        let worker = thread::spawn(move || Self::poll_loop(worker_socket, inbound_tx, shutdown_rx));

        Ok(Self { socket, local_addr, inbound_rx, shutdown_tx, worker: Some(worker) })
    }

    fn poll_loop(socket: UdpSocket, inbound_tx: Sender<Inbound>, shutdown_rx: Receiver<()>) {
        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        loop {
            if shutdown_rx.try_recv().is_ok() {
                return;
            }
            match socket.recv_from(&mut buf) {
                Ok((len, std::net::SocketAddr::V4(from))) => {
                    if inbound_tx.send(Inbound { from, data: buf[..len].to_vec() }).is_err() {
                        return;
                    }
                }
                Ok((_, std::net::SocketAddr::V6(_))) => {
                    tracing::warn!("dropping datagram from an IPv6 peer on an IPv4 reactor");
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "reactor socket read failed");
                    continue;
                }
            }
        }
    }

    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local_addr
    }

    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    pub fn send_to(&self, dest: SocketAddrV4, buf: &[u8]) -> Result<()> {
        self.socket.send_to(buf, dest)?;
        Ok(())
    }

    /// Drain every datagram currently queued, without blocking.
    pub fn drain(&self) -> Vec<Inbound> {
        let mut out = Vec::new();
        while let Ok(inbound) = self.inbound_rx.try_recv() {
            out.push(inbound);
        }
        out
    }

    /// Block for up to `timeout` for the next datagram.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Inbound> {
        match self.inbound_rx.recv_timeout(timeout) {
            Ok(inbound) => Some(inbound),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
