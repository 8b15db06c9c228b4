//! MIN framing used by the serial radio bridge.
//!
//! Frame layout: three `START_BYTE`s, id, payload length, payload, a
//! big-endian CRC-32 (ISO-HDLC) over everything before it, `STOP_BYTE`.

use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use crc::{Crc, CRC_32_ISO_HDLC};

use crate::error::{Error, Result};

pub const START_BYTE: u8 = 0x01;
pub const STOP_BYTE: u8 = 0x7F;

/// Frame id carrying a command line to the vehicle.
pub const COMMAND_ID: u8 = 0x10;
/// Frame id the bridge uses for the vehicle's reply.
pub const REPLY_ID: u8 = 0x11;

const ISO_HDLC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// header (3 start bytes, id, len) + checksum + stop byte
const OVERHEAD: usize = 10;

pub fn encode_min(id: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let len = u8::try_from(payload.len())
        .map_err(|_| Error::Frame(format!("payload of {} bytes is too long", payload.len())))?;

    let mut frame = Vec::with_capacity(payload.len() + OVERHEAD);
    frame.extend_from_slice(&[START_BYTE, START_BYTE, START_BYTE, id, len]);
    frame.extend_from_slice(payload);
    let cksum = ISO_HDLC.checksum(&frame);
    frame.extend_from_slice(&cksum.to_be_bytes());
    frame.push(STOP_BYTE);
    Ok(frame)
}

/// Decode a complete frame into (id, content).
pub fn decode_min(msg: &[u8]) -> Result<(u8, String)> {
    if msg.len() < OVERHEAD {
        return Err(Error::Frame(format!("{} bytes is shorter than a frame", msg.len())));
    }
    if msg[..3].iter().any(|b| *b != START_BYTE) {
        return Err(Error::Frame("wrong start bytes".to_string()));
    }
    let id = msg[3];
    let msg_len = msg[4] as usize;

    if msg.len() != msg_len + OVERHEAD {
        return Err(Error::Frame(format!(
            "length: expected {}, actual {}",
            msg_len + OVERHEAD,
            msg.len()
        )));
    }
    if msg[msg_len + 9] != STOP_BYTE {
        return Err(Error::Frame("missing stop byte".to_string()));
    }

    let content = &msg[5..msg_len + 5];
    let reported = u32::from_be_bytes([
        msg[msg_len + 5],
        msg[msg_len + 6],
        msg[msg_len + 7],
        msg[msg_len + 8],
    ]);
    let calculated = ISO_HDLC.checksum(&msg[..msg_len + 5]);
    if reported != calculated {
        return Err(Error::Frame(format!(
            "checksum: expected {:X}, calculated {:X}",
            reported, calculated
        )));
    }

    Ok((id, String::from_utf8_lossy(content).into_owned()))
}

/// Read until one frame arrives or `timeout` passes. Bytes before the start
/// sequence are skipped. Read timeouts on the underlying port are retried
/// until the deadline.
pub fn min_listen<R: Read>(port: &mut R, timeout: Duration) -> Result<(u8, String)> {
    let start_time = Instant::now();
    let mut byte = [0u8; 1];
    let mut count = 0;

    while start_time.elapsed() < timeout {
        match port.read(&mut byte) {
            Ok(0) => return Err(Error::Frame("stream ended before a frame".to_string())),
            Ok(_) => {
                count = if byte[0] == START_BYTE { count + 1 } else { 0 };
                if count == 3 {
                    let mut header = [0u8; 2];
                    port.read_exact(&mut header)?;
                    let mut rest = vec![0u8; header[1] as usize + 5];
                    port.read_exact(&mut rest)?;

                    let mut frame = vec![START_BYTE; 3];
                    frame.extend_from_slice(&header);
                    frame.extend_from_slice(&rest);
                    return decode_min(&frame);
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::Timeout(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_carries_command_line() {
        let frame = encode_min(COMMAND_ID, b"forward 50").unwrap();
        assert_eq!(frame.len(), "forward 50".len() + 10);
        assert_eq!(&frame[..5], &[1, 1, 1, COMMAND_ID, 10]);
        assert_eq!(*frame.last().unwrap(), STOP_BYTE);
        assert_eq!(
            decode_min(&frame).unwrap(),
            (COMMAND_ID, "forward 50".to_string())
        );
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut frame = encode_min(REPLY_ID, b"ok").unwrap();
        frame[5] = b'x';
        assert!(matches!(decode_min(&frame), Err(Error::Frame(_))));
    }

    #[test]
    fn listen_skips_noise_before_frame() {
        let mut bytes = vec![0x55, 0x01, 0x02, 0x7F];
        bytes.extend(encode_min(REPLY_ID, b"ok").unwrap());
        let mut port = Cursor::new(bytes);
        let (id, content) = min_listen(&mut port, Duration::from_secs(1)).unwrap();
        assert_eq!(id, REPLY_ID);
        assert_eq!(content, "ok");
    }

    #[test]
    fn listen_reports_truncated_stream() {
        let mut port = Cursor::new(vec![0x00, 0x00]);
        assert!(min_listen(&mut port, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        assert!(encode_min(COMMAND_ID, &[b'a'; 300]).is_err());
    }
}
