use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serial2::{CharSize, FlowControl, Parity, SerialPort, Settings, StopBits};
use tracing::{debug, info, warn};

use super::min::{encode_min, min_listen, COMMAND_ID, REPLY_ID};
use super::{check_reply, VehicleLink};
use crate::error::{Error, Result};

/// Port read timeout; `min_listen` keeps retrying until the link timeout.
const READ_SLICE: Duration = Duration::from_millis(50);

/// Commands carried in MIN frames over a serial radio bridge.
pub struct SerialLink {
    port: Arc<Mutex<SerialPort>>,
    timeout: Duration,
    closed: AtomicBool,
}

fn open_port(port_name: &str, baud_rate: u32) -> io::Result<SerialPort> {
    SerialPort::open(port_name, |mut settings: Settings| {
        settings.set_raw();
        settings.set_baud_rate(baud_rate)?;
        settings.set_char_size(CharSize::Bits8);
        settings.set_stop_bits(StopBits::One);
        settings.set_parity(Parity::None);
        settings.set_flow_control(FlowControl::None);
        Ok(settings)
    })
}

impl SerialLink {
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let mut port = open_port(port_name, baud_rate)?;
        port.set_read_timeout(READ_SLICE)?;
        info!(port = %port_name, baud_rate, "serial link open");
        Ok(Self {
            port: Arc::new(Mutex::new(port)),
            timeout,
            closed: AtomicBool::new(false),
        })
    }
}

impl VehicleLink for SerialLink {
    async fn send(&self, line: &str) -> Result<String> {
        if self.is_closed() {
            return Err(Error::LinkClosed);
        }
        let frame = encode_min(COMMAND_ID, line.as_bytes())?;
        let port = Arc::clone(&self.port);
        let timeout = self.timeout;

        // serial2 is blocking; keep it off the async workers
        let (id, reply) = tokio::task::spawn_blocking(move || -> Result<(u8, String)> {
            let mut port = port.lock().unwrap_or_else(PoisonError::into_inner);
            port.write_all(&frame)?;
            min_listen(&mut *port, timeout)
        })
        .await
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))??;

        if id != REPLY_ID {
            warn!(id, content = %reply, "unexpected frame id from bridge");
        }
        debug!(command = %line, reply = %reply, "serial exchange");
        check_reply(line, reply)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
