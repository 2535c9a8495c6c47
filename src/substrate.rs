use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{trace, warn};

use crate::constants::MAX_SEGMENT_SIZE;
use crate::error::Result;

// how often the inbound thread rechecks the stop flag when idle
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct SubstrateHandle {
    socket: Arc<UdpSocket>,
}

impl SubstrateHandle {
    pub fn send(&self, bytes: &[u8]) {
        if let Err(err) = self.socket.send(bytes) {
            warn!("substrate send failed: {err}");
        }
    }
}

pub struct UdpSubstrate {
    handle: SubstrateHandle,
    running: Arc<AtomicBool>,
    inbound: Option<JoinHandle<()>>,
}

impl UdpSubstrate {
    // on_segment runs on the substrate thread itself; it must not block
    // beyond O(1) queueing work.
    pub fn bind<F>(local: SocketAddr, peer: SocketAddr, on_segment: F) -> Result<UdpSubstrate>
    where
        F: Fn(&SubstrateHandle, Vec<u8>) + Send + 'static,
    {
        let socket = UdpSocket::bind(local)?;
        socket.connect(peer)?;
        socket.set_read_timeout(Some(POLL_TIMEOUT))?;
        let read_socket = socket.try_clone()?;

        let handle = SubstrateHandle { socket: Arc::new(socket) };
        let running = Arc::new(AtomicBool::new(true));

        let inbound = {
            let handle = handle.clone();
            let running = running.clone();

            thread::spawn(move || inbound_loop(read_socket, running, handle, on_segment))
        };

        Ok(UdpSubstrate {
            handle,
            running,
            inbound: Some(inbound),
        })
    }

    pub fn send(&self, bytes: &[u8]) {
        self.handle.send(bytes);
    }

    pub fn handle(&self) -> SubstrateHandle {
        self.handle.clone()
    }

    // idempotent
    pub fn close(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.inbound.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for UdpSubstrate {
    fn drop(&mut self) {
        self.close();
    }
}

fn inbound_loop<F>(socket: UdpSocket, running: Arc<AtomicBool>, handle: SubstrateHandle, on_segment: F)
where
    F: Fn(&SubstrateHandle, Vec<u8>),
{
    let mut buf = [0u8; MAX_SEGMENT_SIZE];

    while running.load(Ordering::Acquire) {
        match socket.recv(&mut buf) {
            Ok(n) => on_segment(&handle, buf[..n].to_vec()),
            Err(err) if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                trace!("substrate poll timeout, rechecking stop flag");
            }
            Err(err) => {
                warn!("substrate recv error: {err}");
            }
        }
    }
}
