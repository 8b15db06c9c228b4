//! Vehicle links.
//!
//! The motion core only needs two things from a link: send one command line
//! and wait for the reply, and report whether the link has been torn down.

pub mod min;
pub mod recording;
pub mod serial;
pub mod udp;

use std::future::Future;

use crate::error::{Error, Result};

pub use recording::RecordingLink;
pub use serial::SerialLink;
pub use udp::UdpLink;

pub trait VehicleLink: Send + Sync + 'static {
    /// Send one command line and wait for the vehicle's reply.
    fn send(&self, line: &str) -> impl Future<Output = Result<String>> + Send;

    fn is_closed(&self) -> bool;

    /// Tear the link down; later sends fail with [`Error::LinkClosed`].
    fn close(&self);
}

/// Turn an `error ...` reply into [`Error::Rejected`].
pub(crate) fn check_reply(line: &str, reply: String) -> Result<String> {
    if reply.trim_start().to_lowercase().starts_with("error") {
        Err(Error::Rejected {
            command: line.to_string(),
            reply,
        })
    } else {
        Ok(reply)
    }
}

/// Link chosen at runtime from configuration.
pub enum AnyLink {
    Udp(UdpLink),
    Serial(SerialLink),
    DryRun(RecordingLink),
}

impl VehicleLink for AnyLink {
    async fn send(&self, line: &str) -> Result<String> {
        match self {
            AnyLink::Udp(link) => link.send(line).await,
            AnyLink::Serial(link) => link.send(line).await,
            AnyLink::DryRun(link) => link.send(line).await,
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            AnyLink::Udp(link) => link.is_closed(),
            AnyLink::Serial(link) => link.is_closed(),
            AnyLink::DryRun(link) => link.is_closed(),
        }
    }

    fn close(&self) {
        match self {
            AnyLink::Udp(link) => link.close(),
            AnyLink::Serial(link) => link.close(),
            AnyLink::DryRun(link) => link.close(),
        }
    }
}
