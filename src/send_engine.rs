// send_base, status (bundled here with tries_left) and pending each get
// their own Mutex, locked in that order everywhere to avoid deadlock.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::codec::{Flags, Segment};
use crate::constants::SEG_TRIES;
use crate::error::{Error, Result};
use crate::substrate::UdpSubstrate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegStatus {
    NotSent,
    InFlight,
    TimedOut,
    Acked,
}

struct SegmentSlot {
    status: SegStatus,
    tries_left: u32,
}

// one SendWindow per send() call, discarded afterwards
pub(crate) struct SendWindow {
    isn: u16,
    payloads: Vec<Vec<u8>>,
    slots: Mutex<Vec<SegmentSlot>>,
    pending: Mutex<Vec<(u16, Instant)>>,
    send_base: Mutex<usize>,
    advertised_window: AtomicU8,
    timeout: Duration,
    stop_timer: AtomicBool,
}

impl SendWindow {
    pub fn new(isn: u16, payloads: Vec<Vec<u8>>, timeout: Duration) -> SendWindow {
        let slots = payloads
            .iter()
            .map(|_| SegmentSlot { status: SegStatus::NotSent, tries_left: SEG_TRIES })
            .collect();

        SendWindow {
            isn,
            payloads,
            slots: Mutex::new(slots),
            pending: Mutex::new(Vec::new()),
            send_base: Mutex::new(0),
            advertised_window: AtomicU8::new(0),
            timeout,
            stop_timer: AtomicBool::new(false),
        }
    }

    pub fn set_window(&self, window: u8) {
        self.advertised_window.store(window, Ordering::Release);
    }

    // ack_num names the acked segment's own seq_num, not a cumulative
    // next-expected value.
    pub fn on_ack(&self, ack_num: u16, window: u8) {
        self.set_window(window);

        let idx = ack_num.wrapping_sub(self.isn) as usize;
        if idx >= self.payloads.len() {
            return; // stale, duplicate-beyond-range, or bogus ack
        }

        {
            let mut send_base = self.send_base.lock().unwrap();
            let mut slots = self.slots.lock().unwrap();

            slots[idx].status = SegStatus::Acked;

            // cascade past every already-acked slot instead of advancing by
            // one, so out-of-order acks can't strand send_base short of a
            // run of acked slots
            if idx == *send_base {
                while *send_base < slots.len() && slots[*send_base].status == SegStatus::Acked {
                    *send_base += 1;
                }
            }
        }

        self.pending.lock().unwrap().retain(|(seq, _)| *seq != ack_num);
    }

    pub fn run(&self, substrate: &UdpSubstrate) -> Result<bool> {
        if self.payloads.is_empty() {
            return Ok(true);
        }

        let result = thread::scope(|scope| {
            let timer = scope.spawn(|| self.timer_loop());
            let result = self.sender_loop(substrate);
            self.stop_timer.store(true, Ordering::Release);
            let _ = timer.join();
            result
        });

        result
    }

    fn timer_loop(&self) {
        while !self.stop_timer.load(Ordering::Acquire) {
            thread::sleep(crate::constants::TIMER_TICK);

            let mut slots = self.slots.lock().unwrap();
            let mut pending = self.pending.lock().unwrap();

            pending.retain(|(seq, sent_at)| {
                if sent_at.elapsed() <= self.timeout {
                    return true;
                }

                let idx = seq.wrapping_sub(self.isn) as usize;
                if idx < slots.len() && slots[idx].status != SegStatus::Acked {
                    debug!("segment {seq} timed out, marking for retransmission");
                    slots[idx].status = SegStatus::TimedOut;
                }
                false
            });
        }
    }

    fn sender_loop(&self, substrate: &UdpSubstrate) -> Result<bool> {
        let mut last_probe = Instant::now();

        loop {
            let send_base = *self.send_base.lock().unwrap();
            if send_base >= self.payloads.len() {
                return Ok(true);
            }

            let window = self.advertised_window.load(Ordering::Acquire) as usize;
            let pending_len = self.pending.lock().unwrap().len();

            if window == 0 && pending_len == 0 {
                // nothing in flight to time out, so force a probe of the
                // base segment instead of stalling forever
                if last_probe.elapsed() >= self.timeout {
                    self.try_transmit(send_base, substrate)?;
                    last_probe = Instant::now();
                }
                thread::sleep(Duration::from_millis(1));
                continue;
            }

            let mut sent = false;
            if pending_len < window {
                let upper = (send_base + window).min(self.payloads.len());
                for idx in send_base..upper {
                    let resendable = {
                        let slots = self.slots.lock().unwrap();
                        matches!(slots[idx].status, SegStatus::NotSent | SegStatus::TimedOut)
                    };
                    if resendable {
                        self.try_transmit(idx, substrate)?;
                        sent = true;
                        break; // at most one segment transmitted per scan
                    }
                }
            }

            if sent {
                last_probe = Instant::now();
            } else {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    fn try_transmit(&self, idx: usize, substrate: &UdpSubstrate) -> Result<()> {
        {
            let mut slots = self.slots.lock().unwrap();
            if slots[idx].status == SegStatus::Acked {
                return Ok(());
            }
            if slots[idx].tries_left == 0 {
                return Err(Error::TransferExhausted);
            }
            slots[idx].tries_left -= 1;
            slots[idx].status = SegStatus::InFlight;
        }

        let seq = self.isn.wrapping_add(idx as u16);
        let segment = Segment::new(seq, 0, Flags::default(), 0, self.payloads[idx].clone());
        let bytes = segment.encode()?;
        substrate.send(&bytes); // no I/O performed while holding a lock

        self.pending.lock().unwrap().push((seq, Instant::now()));
        Ok(())
    }
}
