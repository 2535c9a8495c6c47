use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use rand::Rng;

use crate::codec::Segment;
use crate::constants::{CLIENT_IP, CLIENT_PORT, SERVER_IP, SERVER_PORT};
use crate::handshake::{self, ServerState};
use crate::recv_engine::RecvEngine;
use crate::substrate::{SubstrateHandle, UdpSubstrate};

struct Shared {
    state: Mutex<ServerState>,
    cvar: Condvar,
    client_isn: Mutex<u16>,
    server_isn: Mutex<u16>,
    recv_engine: Arc<RecvEngine>,
}

// only one peer is served at a time
pub struct BtcpServerSocket {
    substrate: Option<UdpSubstrate>,
    shared: Arc<Shared>,
    dispatch_thread: Option<JoinHandle<()>>,
}

impl BtcpServerSocket {
    pub fn new(window_size: u8) -> BtcpServerSocket {
        BtcpServerSocket {
            substrate: None,
            shared: Arc::new(Shared {
                state: Mutex::new(ServerState::Listen),
                cvar: Condvar::new(),
                client_isn: Mutex::new(0),
                server_isn: Mutex::new(0),
                recv_engine: Arc::new(RecvEngine::new(window_size)),
            }),
            dispatch_thread: None,
        }
    }

    // no handshake timer on the server; blocks indefinitely until a SYN
    // arrives and the client confirms with the final ACK
    pub fn accept(&mut self) {
        let local = socket_addr(SERVER_IP, SERVER_PORT);
        let peer = socket_addr(CLIENT_IP, CLIENT_PORT);
        let window_size = self.shared.recv_engine.window_size();

        let shared = self.shared.clone();
        let substrate = UdpSubstrate::bind(local, peer, move |handle, bytes| on_inbound(handle, &shared, window_size, bytes))
            .expect("server substrate bind should not fail on the fixed loopback endpoints");

        let mut state = self.shared.state.lock().unwrap();
        while *state != ServerState::Established {
            state = self.shared.cvar.wait(state).unwrap();
        }
        drop(state);

        info!("accept: established");

        let recv_engine = self.shared.recv_engine.clone();
        let dispatch_handle = substrate.handle();
        self.dispatch_thread = Some(thread::spawn(move || {
            if let Err(err) = recv_engine.dispatch_loop(&dispatch_handle) {
                warn!("ack dispatch loop ended with error: {err}");
            }
        }));

        self.substrate = Some(substrate);
    }

    pub fn recv(&mut self) -> Vec<u8> {
        let mut state = self.shared.state.lock().unwrap();
        while *state != ServerState::Closing {
            state = self.shared.cvar.wait(state).unwrap();
        }
        drop(state);

        let isn = *self.shared.client_isn.lock().unwrap();
        // data segments carry isn + 1 + i, mirroring client.rs's data_isn
        let data_isn = isn.wrapping_add(1);
        self.shared.recv_engine.reassemble(data_isn)
    }

    // safe to call even if accept/recv never completed
    pub fn close(&mut self) {
        self.shared.recv_engine.stop();
        if let Some(mut substrate) = self.substrate.take() {
            substrate.close();
        }
        if let Some(handle) = self.dispatch_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BtcpServerSocket {
    fn drop(&mut self) {
        self.close();
    }
}

fn on_inbound(handle: &SubstrateHandle, shared: &Arc<Shared>, window_size: u8, bytes: Vec<u8>) {
    let segment = match Segment::decode(&bytes) {
        Ok(segment) => segment,
        Err(_) => return,
    };

    if segment.flags.syn && !segment.flags.ack {
        handle_syn(handle, shared, window_size, &segment);
    } else if segment.flags.ack && !segment.flags.syn && !segment.flags.fin {
        handle_ack(shared, &segment);
    } else if segment.flags.fin {
        handle_fin(handle, shared, &segment);
    } else if segment.flags.is_data() {
        handle_data(shared, &segment);
    }
}

fn handle_syn(handle: &SubstrateHandle, shared: &Arc<Shared>, window_size: u8, segment: &Segment) {
    let mut state = shared.state.lock().unwrap();

    match *state {
        ServerState::Listen => {
            let server_isn: u16 = rand::thread_rng().gen();
            *shared.client_isn.lock().unwrap() = segment.seq_num;
            *shared.server_isn.lock().unwrap() = server_isn;
            *state = ServerState::SynReceived;
            debug!("handle_syn: client isn={}, server isn={server_isn}", segment.seq_num);
        }
        ServerState::SynReceived => {
            // Duplicate SYN: re-send the same SYN+ACK (spec.md §4.3) using
            // the already-stored ISNs.
            if *shared.client_isn.lock().unwrap() != segment.seq_num {
                return; // a SYN from a different peer while one is pending
            }
        }
        _ => return,
    }

    let client_isn = *shared.client_isn.lock().unwrap();
    let server_isn = *shared.server_isn.lock().unwrap();
    drop(state);

    let syn_ack = handshake::syn_ack(server_isn, client_isn, window_size);
    if let Ok(bytes) = syn_ack.encode() {
        handle.send(&bytes);
    }
}

fn handle_ack(shared: &Arc<Shared>, segment: &Segment) {
    let mut state = shared.state.lock().unwrap();
    if *state != ServerState::SynReceived {
        return;
    }
    let client_isn = *shared.client_isn.lock().unwrap();
    let server_isn = *shared.server_isn.lock().unwrap();
    if segment.seq_num != client_isn.wrapping_add(1) || segment.ack_num != server_isn.wrapping_add(1) {
        return;
    }
    *state = ServerState::Established;
    drop(state);
    shared.cvar.notify_all();
}

fn handle_data(shared: &Arc<Shared>, segment: &Segment) {
    if *shared.state.lock().unwrap() != ServerState::Established {
        return; // strict policy: DATA before Established is dropped (spec.md §9)
    }
    shared.recv_engine.on_data(segment.seq_num, segment.payload.clone());
}

fn handle_fin(handle: &SubstrateHandle, shared: &Arc<Shared>, _segment: &Segment) {
    let mut state = shared.state.lock().unwrap();
    if *state != ServerState::Established {
        return;
    }
    *state = ServerState::Closing;
    shared.recv_engine.stop();
    drop(state);
    shared.cvar.notify_all();

    let fin_ack = handshake::fin_ack();
    if let Ok(bytes) = fin_ack.encode() {
        handle.send(&bytes);
    }
}

fn socket_addr(ip: &str, port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from_str(ip).expect("constant IP is valid"), port))
}
