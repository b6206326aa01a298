use crate::lf::classify::{classify, ScoreRules};
use crate::lf::model::*;
use crate::lf::plaintext::{self, Command};
use crate::lf::registry::{SharedRegistry, TableRegistry};
use crate::lf::{de, ser, xor_crypto};
use log::*;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

mod capture;
mod control;
mod errors;
mod script;
mod sender;

pub use capture::*;
pub use control::*;
pub use errors::Error;
pub use script::*;
pub use sender::*;

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// The packet codec
///
/// Parses obfuscated packets into fields and rebuilds packets from fields. The table registry
/// is shared by every handle made with [`LfCodec::fork`]; the sequence counter belongs to one
/// handle, so give each sender its own.
#[derive(Debug)]
pub struct LfCodec {
    registry: SharedRegistry,
    rules: Arc<ScoreRules>,
    sequence: SequenceCounter,
}

impl Default for LfCodec {
    fn default() -> Self {
        LfCodec::new(TableRegistry::builtin(), ScoreRules::default())
    }
}

impl LfCodec {
    /// A codec over the given tables and scoring rules
    pub fn new(registry: TableRegistry, rules: ScoreRules) -> LfCodec {
        LfCodec {
            registry: Arc::new(RwLock::new(registry)),
            rules: Arc::new(rules),
            sequence: SequenceCounter::new(),
        }
    }

    /// A new handle on the same tables with its own sequence counter
    pub fn fork(&self) -> LfCodec {
        LfCodec {
            registry: self.registry.clone(),
            rules: self.rules.clone(),
            sequence: SequenceCounter::new(),
        }
    }

    /// The shared table registry
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// The scoring rules used by the classifier
    pub fn rules(&self) -> &ScoreRules {
        &self.rules
    }

    /// The sequence counter used when no sequence is given to a rebuild
    pub fn sequence(&self) -> &SequenceCounter {
        &self.sequence
    }

    fn tables(&self) -> RwLockReadGuard<'_, TableRegistry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn tables_mut(&self) -> RwLockWriteGuard<'_, TableRegistry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Parse a packet given as hex text
    ///
    /// Never fails: bad hex is reported in the result like any other format problem.
    pub fn parse_hex(&self, hex: &str) -> ParseResult {
        match de::parse_hex(hex) {
            Ok(buf) => self.parse_bytes(&buf),
            Err(e) => {
                debug!("Rejected hex input: {}", e);
                ParseResult {
                    raw_hex: hex.trim().to_string(),
                    outcome: Err(e),
                }
            }
        }
    }

    /// Parse a raw packet
    ///
    /// Never fails: problems are reported in the result.
    pub fn parse_bytes(&self, buf: &[u8]) -> ParseResult {
        let outcome = self.decode(buf);
        if let Err(e) = &outcome {
            debug!("Failed to parse packet: {}", e);
        }
        ParseResult {
            raw_hex: hex_string(buf),
            outcome,
        }
    }

    fn decode(&self, buf: &[u8]) -> Result<LfPacket> {
        let frame = Frame::deserialize(buf)?;
        let found = classify(&self.tables(), &self.rules, frame.payload)?;

        let key_len = found.entry.key.len();
        let extended = if found.decrypted.len() > RECORD_LEN {
            let covered = key_len.saturating_sub(RECORD_LEN);
            Some(ExtendedData::deserialize(
                &found.decrypted[RECORD_LEN..],
                covered,
            ))
        } else {
            None
        };

        let text = extended.as_ref().and_then(|ext| ext.text.as_deref());
        let plaintext = plaintext::render(&found.record, found.entry.class, text);

        Ok(LfPacket {
            sequence: frame.sequence,
            function_code: found.entry.function_code,
            function_name: found.entry.name,
            class: found.entry.class,
            record: found.record,
            extended,
            decrypted: found.decrypted,
            key_len,
            score: found.score,
            plaintext,
        })
    }

    /// Rebuild a packet from fields
    ///
    /// Uses `sequence` if given, otherwise takes the next number from this handle's counter.
    /// Bytes past the end of the key table are keyed with the fallback byte, so only the
    /// covered part is guaranteed to match a packet the fields came from.
    pub fn reconstruct(
        &self,
        fields: &PacketFields,
        sequence: Option<u8>,
    ) -> Result<Reconstructed> {
        let body = fields.serialize_body()?;
        let key = self
            .tables()
            .lookup(fields.record.function_code)?
            .key
            .clone();
        let sequence = match sequence {
            Some(sequence) => sequence,
            None => self.sequence.next(),
        };

        let bytes = ser::serialize_packet(sequence, &key, &body)?;
        let hex = hex_string(&bytes);
        debug!(
            "Rebuilt {} as sequence {}: {}",
            fields.record.function_code, sequence, hex
        );
        Ok(Reconstructed { bytes, hex })
    }

    /// Rebuild the packet a parse result came from
    ///
    /// A failed parse result gives back its own error.
    pub fn reconstruct_result(
        &self,
        result: &ParseResult,
        sequence: Option<u8>,
    ) -> Result<Reconstructed> {
        match &result.outcome {
            Ok(packet) => self.reconstruct(&packet.to_fields(), sequence),
            Err(e) => Err(e.clone()),
        }
    }

    /// Parse a `发送封包（…）` line into fields
    pub fn parse_command(&self, line: &str) -> Result<PacketFields> {
        let command: Command = line.parse()?;
        let tables = self.tables();
        command.into_fields(|code| tables.get(code).map(|e| e.class).unwrap_or_default())
    }

    /// Parse a `发送封包（…）` line and rebuild it as a packet
    pub fn encode_command(&self, line: &str, sequence: Option<u8>) -> Result<Reconstructed> {
        let fields = self.parse_command(line)?;
        self.reconstruct(&fields, sequence)
    }

    /// Register a table for a new function code
    pub fn register_table(
        &self,
        function_code: u16,
        key: Vec<u8>,
        name: Option<&str>,
    ) -> Result<()> {
        self.register_entry(TableEntry::new(
            function_code,
            key,
            name,
            TableClass::Other,
        ))
    }

    /// Register a fully described table for a new function code
    pub fn register_entry(&self, entry: TableEntry) -> Result<()> {
        self.tables_mut().insert(entry)
    }

    /// Add or overwrite a table, returning the one it replaced
    pub fn replace_table(&self, entry: TableEntry) -> Option<TableEntry> {
        self.tables_mut().replace(entry)
    }

    /// Recover key bytes from an obfuscated body and its known plaintext
    pub fn extract_table(cipher: &[u8], plain: &[u8]) -> Vec<u8> {
        xor_crypto::extract_key(cipher, plain)
    }

    /// Recover key bytes from a framed packet and the known plaintext of its body
    pub fn extract_table_from_packet(packet: &[u8], plain: &[u8]) -> Result<Vec<u8>> {
        let frame = Frame::deserialize(packet)?;
        Ok(xor_crypto::extract_key(frame.payload, plain))
    }
}
