use lfpacket::lf::classify::{ScoreRule, ScoreRules};
use lfpacket::lf::de::parse_hex;
use lfpacket::lf::model::{TableClass, TableEntry};
use lfpacket::lf::registry::TableRegistry;
use lfpacket::lf_protocol::LfCodec;
use log::*;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;
use validator::Validate;
use validator_derive::Validate;

use crate::errors::Error;

#[derive(Debug, Deserialize, Validate, Clone)]
pub(crate) struct Config {
    #[validate]
    pub(crate) server: Option<ServerConfig>,

    #[validate(range(
        min = 1,
        max = 100000,
        message = "Invalid history size",
        code = "history_size"
    ))]
    #[serde(default = "default_history_size")]
    pub(crate) history_size: usize,

    #[validate]
    #[serde(default)]
    pub(crate) tables: Vec<TableConfig>,

    #[serde(default)]
    pub(crate) rules: Option<Vec<ScoreRule>>,
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub(crate) struct ServerConfig {
    pub(crate) address: String,

    #[validate(range(min = 1, max = 120, message = "Invalid timeout", code = "timeout"))]
    #[serde(default = "default_timeout")]
    pub(crate) timeout: u64,
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub(crate) struct TableConfig {
    pub(crate) function_code: u16,

    pub(crate) name: Option<String>,

    #[serde(default)]
    pub(crate) class: TableClass,

    #[validate(length(min = 1, max = 256, message = "Invalid key length", code = "key"))]
    #[serde(deserialize_with = "hex_key")]
    pub(crate) key: Vec<u8>,

    #[serde(default)]
    pub(crate) replace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: None,
            history_size: default_history_size(),
            tables: vec![],
            rules: None,
        }
    }
}

fn default_history_size() -> usize {
    1000
}

fn default_timeout() -> u64 {
    5
}

fn hex_key<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_hex(&text).map_err(serde::de::Error::custom)
}

impl ServerConfig {
    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Config {
    pub(crate) fn load(path: &Path) -> Result<Config, Error> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// The built-in tables plus the ones from the config
    pub(crate) fn build_codec(&self) -> Result<LfCodec, Error> {
        let mut registry = TableRegistry::builtin();
        for table in &self.tables {
            let entry = TableEntry::new(
                table.function_code,
                table.key.clone(),
                table.name.clone(),
                table.class,
            );
            if table.replace {
                registry.replace(entry);
            } else {
                registry.insert(entry)?;
            }
        }

        let rules = match &self.rules {
            Some(rules) => ScoreRules::from(rules.clone()),
            None => ScoreRules::default(),
        };
        Ok(LfCodec::new(registry, rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use indoc::indoc;

    fn parse(text: &str) -> Result<Config, Error> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_full_config() {
        let config = parse(indoc! {r#"
            history_size = 50

            [server]
            address = "127.0.0.1:7000"

            [[tables]]
            function_code = 7001
            name = "回城"
            class = "item"
            key = "11 22 33 44 55 66 77 88 99 AA BB CC DD EE FF 00"

            [[tables]]
            function_code = 1010
            key = "3C C6 F8 77 3F 4C 3C 3C CE 3F 3F 6E 3C 6C 3C 3C"
            class = "npc"
            replace = true

            [[rules]]
            measure = "param2_zero"
            weight = 100
        "#})
        .unwrap();

        assert_eq!(config.history_size, 50);
        assert_eq!(config.server.as_ref().unwrap().timeout(), Duration::from_secs(5));
        assert_eq!(config.tables[0].key.len(), 16);
        assert_eq!(config.tables[0].class, TableClass::Item);
        assert_eq!(config.tables[1].name, None);

        let codec = config.build_codec().unwrap();
        let registry = codec.registry();
        let registry = registry.read().unwrap();
        assert_eq!(registry.len(), 9);
        assert_eq!(registry.display_name(7001), "回城");
        assert_eq!(registry.display_name(1010), "未知功能_1010");
        assert_eq!(codec.rules().rules().len(), 1);
    }

    #[test]
    fn test_defaults() {
        let config = parse("").unwrap();
        assert!(config.server.is_none());
        assert_eq!(config.history_size, 1000);
        assert_eq!(config.build_codec().unwrap().rules(), &ScoreRules::default());
    }

    #[test]
    fn test_duplicate_table() {
        let config = parse(indoc! {r#"
            [[tables]]
            function_code = 1006
            key = "01"
        "#})
        .unwrap();
        assert_matches!(
            config.build_codec(),
            Err(Error::Codec(lfpacket::Error::DuplicateFunctionCode(1006)))
        );
    }

    #[test]
    fn test_validation() {
        assert_matches!(
            parse(indoc! {r#"
                [server]
                address = "127.0.0.1:7000"
                timeout = 0
            "#}),
            Err(Error::Validation(_))
        );
        assert_matches!(parse("history_size = 0"), Err(Error::Validation(_)));
        assert_matches!(
            parse(indoc! {r#"
                [[tables]]
                function_code = 7001
                key = ""
            "#}),
            Err(Error::Validation(_))
        );
        assert_matches!(
            parse(indoc! {r#"
                [[tables]]
                function_code = 7001
                key = "XY"
            "#}),
            Err(Error::Config(_))
        );
    }
}
