pub mod client;
pub mod codec;
pub mod error;
pub mod logging;
pub mod server;

mod constants;
mod handshake;
mod recv_engine;
mod send_engine;
mod substrate;

pub use client::BtcpClientSocket;
pub use error::{Error, Result};
pub use server::BtcpServerSocket;
