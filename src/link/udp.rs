use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{check_reply, VehicleLink};
use crate::error::{Error, Result};

/// Tello-style text commands over UDP. One request/reply exchange is in
/// progress at a time; `rc` lines are not acknowledged by the vehicle.
pub struct UdpLink {
    socket: UdpSocket,
    vehicle: SocketAddr,
    timeout: Duration,
    exchange: Mutex<()>,
    closed: AtomicBool,
}

impl UdpLink {
    /// Bind, point the socket at the vehicle and switch it to SDK mode.
    pub async fn connect(local_addr: &str, vehicle_addr: &str, timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(local_addr).await?;
        let vehicle = tokio::net::lookup_host(vehicle_addr)
            .await?
            .next()
            .ok_or_else(|| Error::config(format!("cannot resolve {}", vehicle_addr)))?;
        socket.connect(vehicle).await?;

        let link = Self {
            socket,
            vehicle,
            timeout,
            exchange: Mutex::new(()),
            closed: AtomicBool::new(false),
        };
        let reply = link.send("command").await?;
        info!(vehicle = %vehicle, reply = %reply, "vehicle link ready");
        Ok(link)
    }

    pub fn vehicle_addr(&self) -> SocketAddr {
        self.vehicle
    }
}

impl VehicleLink for UdpLink {
    async fn send(&self, line: &str) -> Result<String> {
        if self.is_closed() {
            return Err(Error::LinkClosed);
        }
        let _exchange = self.exchange.lock().await;

        // replies that arrived after an earlier timeout
        let mut buf = [0u8; 1024];
        while let Ok(n) = self.socket.try_recv(&mut buf) {
            debug!(reply = %String::from_utf8_lossy(&buf[..n]), "discarding stale reply");
        }

        self.socket.send(line.as_bytes()).await?;
        if line.starts_with("rc ") {
            return Ok(String::new());
        }

        let n = tokio::time::timeout(self.timeout, self.socket.recv(&mut buf))
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;
        let reply = String::from_utf8_lossy(&buf[..n]).trim().to_string();
        debug!(command = %line, reply = %reply, "udp exchange");
        check_reply(line, reply)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
