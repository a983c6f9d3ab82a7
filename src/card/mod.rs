//! Card Access
//!
//! The proxy talks to its applet through a [`Transport`]. The PC/SC reader
//! implementation is compiled in with the `pcsc` feature; builds without it
//! get a transport that always fails to connect.

use crate::apdu::{Command, Response};
use crate::error::Result;

#[cfg(feature = "pcsc")]
mod reader;
#[cfg(test)]
pub mod mock;

#[cfg(feature = "pcsc")]
pub use reader::PcscTransport;

/// Exclusive command/response channel to one applet.
pub trait Transport {
    /// Open the channel and select the applet. `false` means no usable card.
    fn connect(&mut self, applet_id: &[u8]) -> bool;
    fn transmit(&mut self, command: &Command) -> Result<Response>;
    fn disconnect(&mut self);
}

/// Stand-in transport for builds without reader support.
#[derive(Debug, Default)]
pub struct NoReader;

impl Transport for NoReader {
    fn connect(&mut self, _applet_id: &[u8]) -> bool {
        tracing::warn!("smart card reader support is not compiled in, rebuild with --features pcsc");
        false
    }

    fn transmit(&mut self, _command: &Command) -> Result<Response> {
        Err(crate::error::ProxyError::Connect(
            "No card channel is open.".to_string(),
        ))
    }

    fn disconnect(&mut self) {}
}
