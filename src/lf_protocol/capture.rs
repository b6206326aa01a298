use super::{History, LfCodec, Result, StopHandle};
use crate::lf::model::ParseResult;
use crate::Error;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::*;
use std::time::Duration;
use time::OffsetDateTime;

/// How long a capture loop waits on an idle source before checking its stop flag
pub const IDLE_POLL: Duration = Duration::from_millis(100);

/// One packet handed over by the interception layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPacket {
    /// The TCP payload as it was on the wire
    pub payload: Vec<u8>,
    /// The process that owns the connection, when the interception layer knows it
    pub pid: Option<u32>,
    /// True for client to server traffic
    pub outbound: bool,
}

/// What a source produced on one poll
#[derive(Debug)]
pub enum SourceEvent {
    /// A packet arrived
    Packet(CapturedPacket),
    /// Nothing arrived within the timeout
    Idle,
    /// The source will never produce anything again
    Closed,
}

/// Where intercepted packets come from
pub trait PacketSource {
    /// Wait up to `timeout` for the next packet
    fn poll(&mut self, timeout: Duration) -> SourceEvent;
}

/// Where intercepted packets go once they have been looked at
pub trait PacketSink {
    /// Put the packet back on its way, unmodified
    fn forward(&mut self, packet: &CapturedPacket) -> Result<()>;
}

/// A source fed by a crossbeam channel
pub struct ChannelSource {
    rx: Receiver<CapturedPacket>,
}

impl ChannelSource {
    /// Read packets from `rx`
    pub fn new(rx: Receiver<CapturedPacket>) -> Self {
        Self { rx }
    }
}

impl PacketSource for ChannelSource {
    fn poll(&mut self, timeout: Duration) -> SourceEvent {
        match self.rx.recv_timeout(timeout) {
            Ok(packet) => SourceEvent::Packet(packet),
            Err(RecvTimeoutError::Timeout) => SourceEvent::Idle,
            Err(RecvTimeoutError::Disconnected) => SourceEvent::Closed,
        }
    }
}

/// A sink that passes packets on through a crossbeam channel
pub struct ChannelSink {
    tx: Sender<CapturedPacket>,
}

impl ChannelSink {
    /// Write packets to `tx`
    pub fn new(tx: Sender<CapturedPacket>) -> Self {
        Self { tx }
    }
}

impl PacketSink for ChannelSink {
    fn forward(&mut self, packet: &CapturedPacket) -> Result<()> {
        self.tx.send(packet.clone()).map_err(|_| Error::NotConnected)
    }
}

impl<F> PacketSink for F
where
    F: FnMut(&CapturedPacket) -> Result<()>,
{
    fn forward(&mut self, packet: &CapturedPacket) -> Result<()> {
        self(packet)
    }
}

/// A packet the capture loop looked at
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    /// When it was seen
    pub timestamp: OffsetDateTime,
    /// The owning process, if known
    pub pid: Option<u32>,
    /// True for client to server traffic
    pub outbound: bool,
    /// What the codec made of it
    pub result: ParseResult,
}

/// Counters kept by a capture loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Packets received from the source
    pub total: u64,
    /// Packets that parsed
    pub parsed: u64,
    /// Packets that were looked at but did not parse
    pub failed: u64,
    /// Packets passed on to the sink
    pub forwarded: u64,
    /// Packets forwarded without parsing because of the process filter or an empty payload
    pub skipped: u64,
}

type PacketCallback = Box<dyn FnMut(&CaptureRecord) + Send>;

/// The blocking loop that sits between the interception layer and the network
///
/// Every packet is forwarded unmodified whatever the parser makes of it. When a target
/// process is set, packets from other processes are forwarded without being parsed.
pub struct CaptureLoop<S, K> {
    codec: LfCodec,
    source: S,
    sink: K,
    target_pid: Option<u32>,
    history: History<CaptureRecord>,
    stats: CaptureStats,
    stop: StopHandle,
    on_packet: Option<PacketCallback>,
}

impl<S: PacketSource, K: PacketSink> CaptureLoop<S, K> {
    /// Create a loop keeping at most `history_size` inspected packets
    ///
    /// Packets that failed to parse are kept too, with their error.
    pub fn new(codec: LfCodec, source: S, sink: K, history_size: usize) -> Self {
        Self {
            codec,
            source,
            sink,
            target_pid: None,
            history: History::new(history_size),
            stats: Default::default(),
            stop: StopHandle::new(),
            on_packet: None,
        }
    }

    /// Only parse packets from this process, or from every process with `None`
    pub fn set_target_pid(&mut self, pid: Option<u32>) {
        self.target_pid = pid;
    }

    /// Call `callback` with every packet that parsed successfully
    pub fn on_packet<F>(&mut self, callback: F)
    where
        F: FnMut(&CaptureRecord) + Send + 'static,
    {
        self.on_packet = Some(Box::new(callback));
    }

    /// A handle that stops the loop at its next check
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The counters so far
    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// The most recent inspected packets, parsed or not
    pub fn history(&self) -> &History<CaptureRecord> {
        &self.history
    }

    /// Give back the sink, for example to inspect what was forwarded
    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Run until stopped or until the source closes
    pub fn run(&mut self) -> Result<CaptureStats> {
        info!(
            "Capture started{}",
            match self.target_pid {
                Some(pid) => format!(" for process {}", pid),
                None => String::new(),
            }
        );

        while !self.stop.is_stopped() {
            match self.source.poll(IDLE_POLL) {
                SourceEvent::Packet(packet) => self.handle(packet)?,
                SourceEvent::Idle => continue,
                SourceEvent::Closed => {
                    debug!("Packet source closed");
                    break;
                }
            }
        }

        info!(
            "Capture stopped: {} packets, {} parsed, {} failed",
            self.stats.total, self.stats.parsed, self.stats.failed
        );
        Ok(self.stats)
    }

    /// Look at one packet and forward it
    pub fn handle(&mut self, packet: CapturedPacket) -> Result<()> {
        self.stats.total += 1;

        let wanted = match self.target_pid {
            Some(target) => packet.pid == Some(target),
            None => true,
        };

        if wanted && !packet.payload.is_empty() {
            self.inspect(&packet);
        } else {
            trace!("Forwarding without parsing (pid {:?})", packet.pid);
            self.stats.skipped += 1;
        }

        self.sink.forward(&packet)?;
        self.stats.forwarded += 1;
        Ok(())
    }

    fn inspect(&mut self, packet: &CapturedPacket) {
        let result = self.codec.parse_bytes(&packet.payload);
        match result.plaintext() {
            Some(plaintext) => {
                self.stats.parsed += 1;
                debug!("Captured {}", plaintext);
            }
            None => {
                self.stats.failed += 1;
                if let Some(e) = result.error() {
                    warn!("Could not parse {}: {}", result.raw_hex, e);
                }
            }
        }

        let record = CaptureRecord {
            timestamp: OffsetDateTime::now_utc(),
            pid: packet.pid,
            outbound: packet.outbound,
            result,
        };
        if record.result.packet().is_some() {
            if let Some(callback) = self.on_packet.as_mut() {
                callback(&record);
            }
        }
        self.history.push(record);
    }
}
