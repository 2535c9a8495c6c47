use std::time::Duration;

pub const PAYLOAD_SIZE: usize = 1008;
pub const HEADER_SIZE: usize = 10;
pub const MAX_SEGMENT_SIZE: usize = HEADER_SIZE + PAYLOAD_SIZE;

pub const SEG_TRIES: u32 = 30;
pub const SYN_TRIES: u32 = 30;
pub const FIN_TRIES: u32 = 15;

pub const DEFAULT_WINDOW_SIZE: u8 = 5;
pub const TIMER_TICK: Duration = Duration::from_millis(5);

pub const CLIENT_IP: &str = "127.0.0.1";
pub const CLIENT_PORT: u16 = 12345;
pub const SERVER_IP: &str = "127.0.0.1";
pub const SERVER_PORT: u16 = 12346;
