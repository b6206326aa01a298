use super::{History, LfCodec, Result};
use crate::lf::de;
use crate::lf::model::{hex_string, PacketFields, ParseResult, Reconstructed};
use crate::lf::plaintext::COMMAND_NAME;
use crate::Error;
use log::*;
use socket2::{Domain, Socket, Type};
use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use time::OffsetDateTime;

/// One send attempt
#[derive(Debug, Clone)]
pub struct SendRecord {
    /// When it was attempted
    pub timestamp: OffsetDateTime,
    /// The bytes that were sent, as hex. Empty if the packet could not be built
    pub hex: String,
    /// Why it failed, if it did
    pub error: Option<Error>,
}

impl SendRecord {
    /// True if the packet was written
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Counters kept by a sender
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Packets written
    pub sent: u64,
    /// Packets that could not be built or written
    pub failed: u64,
}

/// Something that can be sent in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Bytes sent as they are
    Raw(Vec<u8>),
    /// Hex text sent as the bytes it spells
    Hex(String),
    /// A `发送封包（…）` line, rebuilt with the next sequence number
    Command(String),
    /// Fields rebuilt with the next sequence number
    Fields(PacketFields),
}

impl Outgoing {
    /// Tell a command line from hex text
    pub fn from_text(text: &str) -> Outgoing {
        let text = text.trim();
        if text.starts_with(COMMAND_NAME) {
            Outgoing::Command(text.to_string())
        } else {
            Outgoing::Hex(text.to_string())
        }
    }
}

/// Writes packets to one server connection
///
/// Writes are serialized through a mutex so one sender can be shared between threads. The
/// sender owns its codec handle and so its own sequence counter.
pub struct PacketSender<W = TcpStream> {
    codec: LfCodec,
    writer: Mutex<Option<W>>,
    history: Mutex<History<SendRecord>>,
    sent: AtomicU64,
    failed: AtomicU64,
}

impl PacketSender<TcpStream> {
    /// Connect to the server, trying each address `host` resolves to
    pub fn connect<T: ToSocketAddrs>(
        codec: LfCodec,
        host: T,
        timeout: Duration,
        history_size: usize,
    ) -> Result<Self> {
        let mut last_err = None;
        for addr in host.to_socket_addrs()? {
            debug!("Trying {}", addr);
            match connect_to(addr, timeout) {
                Ok(stream) => {
                    info!("Connected to {}", addr);
                    return Ok(Self::with_writer(codec, stream, history_size));
                }
                Err(e) => {
                    debug!("Could not connect to {}: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(Error::NotConnected))
    }
}

impl<W: Write> PacketSender<W> {
    /// A sender writing to an already open writer
    pub fn with_writer(codec: LfCodec, writer: W, history_size: usize) -> Self {
        Self {
            codec,
            writer: Mutex::new(Some(writer)),
            history: Mutex::new(History::new(history_size)),
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// The codec used to rebuild packets
    pub fn codec(&self) -> &LfCodec {
        &self.codec
    }

    fn writer(&self) -> MutexGuard<'_, Option<W>> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True until [`PacketSender::disconnect`] is called
    pub fn is_connected(&self) -> bool {
        self.writer().is_some()
    }

    /// Close the connection and give back the writer
    pub fn disconnect(&self) -> Option<W> {
        let writer = self.writer().take();
        if writer.is_some() {
            info!("Disconnected");
        }
        writer
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.writer();
        let writer = guard.as_mut().ok_or(Error::NotConnected)?;
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(())
    }

    fn record(&self, hex: String, outcome: &Result<()>) -> SendRecord {
        let record = SendRecord {
            timestamp: OffsetDateTime::now_utc(),
            hex,
            error: outcome.as_ref().err().cloned(),
        };
        match &record.error {
            None => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                debug!("Sent {}", record.hex);
            }
            Some(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!("Send failed: {}", e);
            }
        }
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        record
    }

    fn transmit(&self, prepared: Result<Vec<u8>>) -> SendRecord {
        match prepared {
            Ok(bytes) => {
                let outcome = self.write(&bytes);
                self.record(hex_string(&bytes), &outcome)
            }
            Err(e) => self.record(String::new(), &Err(e)),
        }
    }

    /// Send bytes as they are
    pub fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        into_result(self.transmit(Ok(bytes.to_vec())))
    }

    /// Send the bytes spelled by hex text
    pub fn send_hex(&self, hex: &str) -> Result<()> {
        into_result(self.transmit(de::parse_hex(hex)))
    }

    /// Rebuild and send a parsed packet
    pub fn send_packet(&self, result: &ParseResult, sequence: Option<u8>) -> Result<()> {
        let prepared = self
            .codec
            .reconstruct_result(result, sequence)
            .map(|r| r.bytes);
        into_result(self.transmit(prepared))
    }

    /// Rebuild and send fields
    pub fn send_fields(&self, fields: &PacketFields, sequence: Option<u8>) -> Result<()> {
        let prepared = self.codec.reconstruct(fields, sequence).map(|r| r.bytes);
        into_result(self.transmit(prepared))
    }

    /// Rebuild and send a `发送封包（…）` line
    pub fn send_command(&self, line: &str) -> Result<Reconstructed> {
        let rebuilt = self.codec.encode_command(line, None);
        let record = self.transmit(rebuilt.clone().map(|r| r.bytes));
        into_result(record)?;
        rebuilt
    }

    /// Send one batch item, recording the attempt whatever the outcome
    pub fn send_item(&self, item: &Outgoing) -> SendRecord {
        match item {
            Outgoing::Raw(bytes) => self.transmit(Ok(bytes.clone())),
            Outgoing::Hex(hex) => self.transmit(de::parse_hex(hex)),
            Outgoing::Command(line) => {
                self.transmit(self.codec.encode_command(line, None).map(|r| r.bytes))
            }
            Outgoing::Fields(fields) => {
                self.transmit(self.codec.reconstruct(fields, None).map(|r| r.bytes))
            }
        }
    }

    /// Send each item `count` times, waiting `interval` between sends
    ///
    /// A failed send is recorded and the batch carries on. There is no wait after the last
    /// send.
    pub fn send_batch(
        &self,
        items: &[Outgoing],
        count: usize,
        interval: Duration,
    ) -> Vec<SendRecord> {
        let total = items.len() * count;
        let mut records = Vec::with_capacity(total);
        for item in items {
            for _ in 0..count {
                records.push(self.send_item(item));
                if !interval.is_zero() && records.len() < total {
                    std::thread::sleep(interval);
                }
            }
        }
        records
    }

    /// The most recent send attempts, oldest first
    pub fn history(&self) -> Vec<SendRecord> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// The counters so far
    pub fn stats(&self) -> SenderStats {
        SenderStats {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

fn into_result(record: SendRecord) -> Result<()> {
    match record.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn connect_to(addr: SocketAddr, timeout: Duration) -> Result<TcpStream> {
    let socket = match addr {
        SocketAddr::V4(_) => Socket::new(Domain::IPV4, Type::STREAM, None)?,
        SocketAddr::V6(_) => {
            let s = Socket::new(Domain::IPV6, Type::STREAM, None)?;
            s.set_only_v6(false)?;
            s
        }
    };

    socket.set_keepalive(true)?;
    socket.set_nodelay(true)?;
    socket.set_write_timeout(Some(timeout))?;
    socket.connect_timeout(&addr.into(), timeout)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Read;
    use std::net::TcpListener;

    const MOVE_LINE: &str = "发送封包（0，0，3013，103，3，86，）";

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn sender() -> PacketSender<Vec<u8>> {
        PacketSender::with_writer(LfCodec::default(), vec![], 100)
    }

    #[test]
    fn test_send_command() {
        init();
        let sender = sender();
        let rebuilt = sender.send_command(MOVE_LINE).unwrap();
        assert_eq!(rebuilt.bytes[1], b'1');
        let written = sender.disconnect().unwrap();
        assert_eq!(written, rebuilt.bytes);
    }

    #[test]
    fn test_send_records_failures() {
        init();
        let sender = sender();
        assert_matches!(sender.send_hex("zz"), Err(Error::Format { .. }));
        sender.send_hex("23 31 21").unwrap();
        assert_eq!(sender.stats(), SenderStats { sent: 1, failed: 1 });

        let history = sender.history();
        assert_eq!(history.len(), 2);
        assert!(!history[0].success());
        assert_eq!(history[0].hex, "");
        assert_eq!(history[1].hex, "23 31 21");
    }

    #[test]
    fn test_send_after_disconnect() {
        let sender = sender();
        sender.disconnect();
        assert!(!sender.is_connected());
        assert_matches!(sender.send_raw(&[0x23]), Err(Error::NotConnected));
    }

    #[test]
    fn test_batch() {
        init();
        let sender = sender();
        let items = vec![
            Outgoing::from_text(MOVE_LINE),
            Outgoing::from_text("23 31 21"),
            Outgoing::Command("发送封包（0，0，4242，）".to_string()),
        ];
        let records = sender.send_batch(&items, 2, Duration::from_millis(1));
        assert_eq!(records.len(), 6);
        assert_eq!(
            records.iter().map(SendRecord::success).collect::<Vec<_>>(),
            vec![true, true, true, true, false, false]
        );
        // Each rebuilt command takes the next sequence number
        assert_eq!(&records[0].hex[..5], "23 31");
        assert_eq!(&records[1].hex[..5], "23 32");
        assert_eq!(sender.stats(), SenderStats { sent: 4, failed: 2 });
    }

    #[test]
    fn test_history_bounded() {
        let sender = PacketSender::with_writer(LfCodec::default(), vec![], 2);
        for _ in 0..5 {
            sender.send_raw(&[0x01]).unwrap();
        }
        assert_eq!(sender.history().len(), 2);
        assert_eq!(sender.stats().sent, 5);
    }

    #[test]
    fn test_send_packet_roundtrip() {
        init();
        let codec = LfCodec::default();
        let hex = "23 38 3C 44 46 7A 3F 4C 3C 3C 3C 3C 3F 6E 3C 6C 3C 3C 3C 3C 3C 3C 3C 3C 21";
        let result = codec.parse_hex(hex);
        let sender = PacketSender::with_writer(codec, vec![], 10);
        sender.send_packet(&result, Some(8)).unwrap();
        assert_eq!(sender.history()[0].hex, hex);
    }

    #[test]
    fn test_connect_tcp() {
        init();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![];
            stream.read_to_end(&mut buf).unwrap();
            buf
        });

        let sender =
            PacketSender::connect(LfCodec::default(), addr, Duration::from_secs(5), 10).unwrap();
        sender.send_raw(&[0x23, 0x31, 0x21]).unwrap();
        drop(sender.disconnect());

        assert_eq!(server.join().unwrap(), vec![0x23, 0x31, 0x21]);
    }
}
