//! Runtime abstractions for sending commands.
//!
//! Command sends are async and go through [`AsyncUdpSocket`] so the socket
//! type is chosen by the enabled runtime feature. The broadcast listener does
//! not use this module; it runs on its own OS thread.
//!
//! # Feature Flags
//!
//! - `runtime-tokio` (default) - Use the tokio runtime

use std::future::Future;
use std::io;
use std::net::SocketAddr;

#[cfg(feature = "runtime-tokio")]
mod tokio_impl;

#[cfg(feature = "runtime-tokio")]
pub use tokio_impl::*;

/// Trait for async UDP socket operations.
pub trait AsyncUdpSocket: Send + Sync + Sized {
    /// Bind to the specified address.
    fn bind(addr: SocketAddr) -> impl Future<Output = io::Result<Self>> + Send;

    /// Send a single datagram to `addr`.
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> impl Future<Output = io::Result<usize>> + Send;

    /// Enable or disable broadcast mode.
    fn set_broadcast(&self, broadcast: bool) -> io::Result<()>;
}

// Async mutex re-export
#[cfg(feature = "runtime-tokio")]
pub use tokio::sync::Mutex;

#[cfg(not(feature = "runtime-tokio"))]
compile_error!("The \"runtime-tokio\" feature must be enabled");
