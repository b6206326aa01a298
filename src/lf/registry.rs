use super::model::*;
use crate::{Error, Result};
use log::*;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A registry shared between a codec and any forks of it
pub type SharedRegistry = Arc<RwLock<TableRegistry>>;

const MOVE_KEY: [u8; 16] = [
    0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0xF9, 0x37, 0x58, 0x41, 0x3D, 0x72, 0x0E, 0x3C,
];

const USE_ITEM_KEY: [u8; 24] = [
    0x0F, 0x88, 0x7D, 0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0xD2, 0x3F, 0x70, 0x6A, 0x62, 0x70, 0x68, 0x3C,
    0x83, 0x82, 0x84, 0x89, 0xF5, 0xCD, 0xBB, 0xE7,
];

const DIALOG_ITEM_KEY: [u8; 24] = [
    0x6A, 0x26, 0x50, 0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0xAA, 0x2F, 0x30, 0x52, 0x40, 0x6C, 0x74, 0x3C,
    0xF2, 0xE2, 0xD4, 0x9A, 0x89, 0xF8, 0xBE, 0xDA,
];

const NPC_CLICK_KEY: [u8; 16] = [
    0x3C, 0xC6, 0xF8, 0x77, 0x3F, 0x4C, 0x3C, 0x3C, 0xCE, 0x3F, 0x3F, 0x6E, 0x3C, 0x6C, 0x3C, 0x3C,
];

const NPC_OPTION_KEY: [u8; 24] = [
    0x3C, 0xC6, 0xF8, 0x77, 0x3F, 0x4C, 0x3C, 0x3C, 0xCF, 0x3F, 0x3F, 0x6F, 0x3C, 0x6C, 0x3C, 0x3C,
    0x7C, 0xEB, 0x8C, 0x8D, 0x84, 0xF6, 0xB8, 0x99,
];

/// The known key tables in the order they were registered
///
/// Registration order matters: when two tables score the same the classifier keeps the one
/// registered first.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    entries: Vec<TableEntry>,
    index: HashMap<u16, usize>,
}

impl TableRegistry {
    /// An empty registry
    pub fn new() -> TableRegistry {
        Default::default()
    }

    /// The registry with the tables known to ship with the client
    pub fn builtin() -> TableRegistry {
        use TableClass::*;
        let builtin = vec![
            (3011, &MOVE_KEY[..], "移动_旧坐标系", Movement),
            (3013, &MOVE_KEY[..], "移动_新坐标系", Movement),
            (3017, &MOVE_KEY[..], "使用技能", Movement),
            (1006, &USE_ITEM_KEY[..], "使用物品", Item),
            (5014, &DIALOG_ITEM_KEY[..], "放入物品到对话框", Item),
            (5015, &DIALOG_ITEM_KEY[..], "从对话框取出物品", Item),
            (1010, &NPC_CLICK_KEY[..], "点击NPC", Npc),
            (1011, &NPC_OPTION_KEY[..], "NPC对话选项", Npc),
        ];

        let mut registry = TableRegistry::new();
        for (code, key, name, class) in builtin {
            registry.push(TableEntry::new(code, key.to_vec(), Some(name), class));
        }
        registry
    }

    /// Add a table for a function code that is not yet known
    pub fn insert(&mut self, entry: TableEntry) -> Result<()> {
        if self.index.contains_key(&entry.function_code) {
            return Err(Error::DuplicateFunctionCode(entry.function_code));
        }
        debug!(
            "Registering table {} ({}) with {} key bytes",
            entry.function_code,
            entry.name,
            entry.key.len()
        );
        self.push(entry);
        Ok(())
    }

    /// Add or overwrite the table for a function code
    ///
    /// An overwritten table keeps its place in the registration order. The previous entry is
    /// returned.
    pub fn replace(&mut self, entry: TableEntry) -> Option<TableEntry> {
        match self.index.get(&entry.function_code) {
            Some(&i) => {
                debug!("Replacing table {}", entry.function_code);
                Some(std::mem::replace(&mut self.entries[i], entry))
            }
            None => {
                self.push(entry);
                None
            }
        }
    }

    fn push(&mut self, entry: TableEntry) {
        self.index.insert(entry.function_code, self.entries.len());
        self.entries.push(entry);
    }

    /// The table for a function code
    pub fn get(&self, function_code: u16) -> Option<&TableEntry> {
        self.index.get(&function_code).map(|&i| &self.entries[i])
    }

    /// The table for a function code, failing if there is none
    pub fn lookup(&self, function_code: u16) -> Result<&TableEntry> {
        self.get(function_code)
            .ok_or(Error::UnknownFunctionCode(function_code))
    }

    /// All tables in registration order
    pub fn iter(&self) -> impl Iterator<Item = &TableEntry> {
        self.entries.iter()
    }

    /// Number of registered tables
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no table is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The name of a function code, or `未知功能_<code>` if it is not registered
    pub fn display_name(&self, function_code: u16) -> String {
        match self.get(function_code) {
            Some(entry) => entry.name.clone(),
            None => unknown_name(function_code),
        }
    }
}
