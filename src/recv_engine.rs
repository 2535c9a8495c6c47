use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::codec::{self, Flags, Segment};
use crate::error::Result;
use crate::substrate::SubstrateHandle;

pub(crate) struct RecvEngine {
    received: Mutex<HashMap<u16, Vec<u8>>>,
    ack_queue: Mutex<VecDeque<u16>>,
    window_size: u8,
    stop: AtomicBool,
}

impl RecvEngine {
    pub fn new(window_size: u8) -> RecvEngine {
        RecvEngine {
            received: Mutex::new(HashMap::new()),
            ack_queue: Mutex::new(VecDeque::new()),
            window_size,
            stop: AtomicBool::new(false),
        }
    }

    pub fn on_data(&self, seq_num: u16, payload: Vec<u8>) {
        let mut received = self.received.lock().unwrap();
        if received.contains_key(&seq_num) {
            // duplicate delivery: still ACKed so the sender's pending entry
            // clears, but not re-stored
            drop(received);
            self.ack_queue.lock().unwrap().push_back(seq_num);
            return;
        }
        received.insert(seq_num, payload);
        drop(received);

        self.ack_queue.lock().unwrap().push_back(seq_num);
    }

    pub fn dispatch_loop(&self, substrate: &SubstrateHandle) -> Result<()> {
        while !self.stop.load(Ordering::Acquire) {
            let next = self.ack_queue.lock().unwrap().pop_front();

            match next {
                Some(seq_num) => {
                    let backlog = self.ack_queue.lock().unwrap().len() as i32;
                    let window = (self.window_size as i32 - backlog).max(0) as u8;

                    let ack = Segment::new(0, seq_num, Flags::ACK, window, vec![]);
                    substrate.send(&ack.encode()?);
                }
                None => thread::sleep(Duration::from_millis(1)),
            }
        }
        Ok(())
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn window_size(&self) -> u8 {
        self.window_size
    }

    pub fn reassemble(&self, isn: u16) -> Vec<u8> {
        let received = self.received.lock().unwrap();
        let items: Vec<(u16, Vec<u8>)> = received.iter().map(|(seq, payload)| (*seq, payload.clone())).collect();
        codec::reassemble(&items, isn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_data_deduplicates_by_seq_num_but_still_acks_duplicates() {
        let engine = RecvEngine::new(5);
        engine.on_data(10, vec![1, 2, 3]);
        engine.on_data(10, vec![9, 9, 9]); // a retransmission of the same segment

        assert_eq!(engine.received.lock().unwrap().get(&10), Some(&vec![1, 2, 3]));
        assert_eq!(engine.ack_queue.lock().unwrap().len(), 2);
    }

    #[test]
    fn reassemble_orders_by_offset_from_isn_across_wraparound() {
        let engine = RecvEngine::new(5);
        // isn = 65534: segments land at seq 65534, 65535, 0, 1 (wrapping).
        engine.on_data(0, b"c".to_vec());
        engine.on_data(65535, b"b".to_vec());
        engine.on_data(1, b"d".to_vec());
        engine.on_data(65534, b"a".to_vec());

        assert_eq!(engine.reassemble(65534), b"abcd".to_vec());
    }

    #[test]
    fn window_size_getter_reflects_construction_argument() {
        let engine = RecvEngine::new(42);
        assert_eq!(engine.window_size(), 42);
    }
}
