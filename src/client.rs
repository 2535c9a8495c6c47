use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;

use crate::codec::Segment;
use crate::constants::{CLIENT_IP, CLIENT_PORT, SERVER_IP, SERVER_PORT, SYN_TRIES};
use crate::error::Error;
use crate::handshake::{self, ClientState};
use crate::send_engine::SendWindow;
use crate::substrate::{SubstrateHandle, UdpSubstrate};

struct Shared {
    state: Mutex<ClientState>,
    cvar: Condvar,
    data_isn: Mutex<u16>, // ISN + 1, set once the handshake completes
    window: Mutex<u8>,    // most recently advertised receiver window
    active_send: Mutex<Option<Arc<SendWindow>>>,
}

// data flows client -> server only
pub struct BtcpClientSocket {
    timeout: Duration,
    substrate: Option<UdpSubstrate>,
    shared: Arc<Shared>,
}

impl BtcpClientSocket {
    // timeout_ms scales down to seconds (ms / 100_000), so the 100ms CLI
    // default yields roughly a 1ms effective per-segment timeout.
    pub fn new(timeout_ms: u64) -> BtcpClientSocket {
        let timeout_seconds = timeout_ms as f64 / 100_000.0;
        BtcpClientSocket {
            timeout: Duration::from_secs_f64(timeout_seconds.max(0.0)),
            substrate: None,
            shared: Arc::new(Shared {
                state: Mutex::new(ClientState::Closed),
                cvar: Condvar::new(),
                data_isn: Mutex::new(0),
                window: Mutex::new(0),
                active_send: Mutex::new(None),
            }),
        }
    }

    pub fn connect(&mut self) -> bool {
        let isn: u16 = rand::thread_rng().gen();
        *self.shared.state.lock().unwrap() = ClientState::SynSent;

        let local = socket_addr(CLIENT_IP, CLIENT_PORT);
        let peer = socket_addr(SERVER_IP, SERVER_PORT);

        let shared = self.shared.clone();
        let substrate = match UdpSubstrate::bind(local, peer, move |handle, bytes| on_inbound(handle, &shared, isn, bytes)) {
            Ok(substrate) => substrate,
            Err(err) => {
                warn!("client could not bind substrate: {err}");
                return false;
            }
        };

        let syn = handshake::syn(isn).encode().expect("SYN segments always encode");
        substrate.send(&syn);
        debug!("connect: sent SYN (isn={isn})");

        let mut tries_left = SYN_TRIES;
        let mut state = self.shared.state.lock().unwrap();
        loop {
            if *state == ClientState::Established {
                self.substrate = Some(substrate);
                info!("connect: established");
                return true;
            }

            let (guard, timeout_result) = self.shared.cvar.wait_timeout(state, self.timeout).unwrap();
            state = guard;

            if *state == ClientState::Established {
                self.substrate = Some(substrate);
                info!("connect: established");
                return true;
            }

            if timeout_result.timed_out() {
                if tries_left == 0 {
                    warn!("connect: SYN retries exhausted");
                    *state = ClientState::Closed;
                    return false;
                }
                tries_left -= 1;
                substrate.send(&syn);
                debug!("connect: SYN retry ({tries_left} left)");
            }
        }
    }

    pub fn send(&mut self, data: &[u8]) -> bool {
        let substrate = match &self.substrate {
            Some(s) => s,
            None => return false,
        };

        if *self.shared.state.lock().unwrap() != ClientState::Established {
            return false;
        }

        let data_isn = *self.shared.data_isn.lock().unwrap();
        let segments = match crate::codec::segment_payload(data, data_isn) {
            Ok(segments) => segments,
            Err(err) => {
                warn!("send: cannot segment payload: {err}");
                return false;
            }
        };

        let payloads: Vec<Vec<u8>> = segments.into_iter().map(|s| s.payload).collect();
        let initial_window = *self.shared.window.lock().unwrap();

        let window = Arc::new(SendWindow::new(data_isn, payloads, self.timeout));
        window.set_window(initial_window);
        *self.shared.active_send.lock().unwrap() = Some(window.clone());

        let result = window.run(substrate);
        *self.shared.active_send.lock().unwrap() = None;

        match result {
            Ok(_) => {
                info!("send: transfer complete");
                true
            }
            Err(Error::TransferExhausted) => {
                warn!("send: a segment's retries were exhausted");
                false
            }
            Err(err) => {
                warn!("send: unexpected error: {err}");
                false
            }
        }
    }

    pub fn disconnect(&mut self) -> bool {
        let substrate = match &self.substrate {
            Some(s) => s,
            None => return false,
        };

        *self.shared.state.lock().unwrap() = ClientState::FinWait;

        let fin = handshake::fin().encode().expect("FIN segments always encode");
        substrate.send(&fin);
        debug!("disconnect: sent FIN");

        let mut tries_left = crate::constants::FIN_TRIES;
        let mut state = self.shared.state.lock().unwrap();
        loop {
            if *state == ClientState::ClosedFinal {
                info!("disconnect: terminated");
                return true;
            }

            let (guard, timeout_result) = self.shared.cvar.wait_timeout(state, self.timeout).unwrap();
            state = guard;

            if *state == ClientState::ClosedFinal {
                info!("disconnect: terminated");
                return true;
            }

            if timeout_result.timed_out() {
                if tries_left == 0 {
                    warn!("disconnect: FIN retries exhausted, abnormal termination");
                    return false;
                }
                tries_left -= 1;
                substrate.send(&fin);
                debug!("disconnect: FIN retry ({tries_left} left)");
            }
        }
    }

    // safe to call even after a failed connect/send/disconnect
    pub fn close(&mut self) {
        if let Some(mut substrate) = self.substrate.take() {
            substrate.close();
        }
    }
}

impl Drop for BtcpClientSocket {
    fn drop(&mut self) {
        self.close();
    }
}

fn on_inbound(handle: &SubstrateHandle, shared: &Arc<Shared>, isn: u16, bytes: Vec<u8>) {
    let segment = match Segment::decode(&bytes) {
        Ok(segment) => segment,
        Err(_) => return, // malformed or corrupted: drop silently (spec.md §4.2)
    };

    if segment.flags.ack && segment.flags.syn {
        handle_syn_ack(handle, shared, isn, &segment);
    } else if segment.flags.ack && segment.flags.fin {
        handle_fin_ack(shared, &segment);
    } else if segment.flags.ack {
        handle_data_ack(shared, &segment);
    }
}

fn handle_syn_ack(handle: &SubstrateHandle, shared: &Arc<Shared>, isn: u16, segment: &Segment) {
    let mut state = shared.state.lock().unwrap();
    if *state != ClientState::SynSent || segment.ack_num != isn.wrapping_add(1) {
        return; // not matching our handshake, or a replayed completion (spec.md §9 open question)
    }

    *shared.window.lock().unwrap() = segment.window_size;
    let data_isn = isn.wrapping_add(1);
    *shared.data_isn.lock().unwrap() = data_isn;
    *state = ClientState::Established;

    drop(state);
    shared.cvar.notify_all();

    let final_ack = handshake::ack(data_isn, segment.seq_num.wrapping_add(1), 0);
    if let Ok(bytes) = final_ack.encode() {
        handle.send(&bytes);
    }
}

fn handle_fin_ack(shared: &Arc<Shared>, _segment: &Segment) {
    let mut state = shared.state.lock().unwrap();
    if *state != ClientState::FinWait {
        return;
    }
    *state = ClientState::ClosedFinal;
    drop(state);
    shared.cvar.notify_all();
}

fn handle_data_ack(shared: &Arc<Shared>, segment: &Segment) {
    if *shared.state.lock().unwrap() != ClientState::Established {
        return;
    }
    if let Some(window) = shared.active_send.lock().unwrap().as_ref() {
        window.on_ack(segment.ack_num, segment.window_size);
    }
}

fn socket_addr(ip: &str, port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from_str(ip).expect("constant IP is valid"), port))
}
