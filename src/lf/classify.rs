use super::model::*;
use super::registry::TableRegistry;
use super::text;
use super::xor_crypto;
use crate::{Error, Result};
use log::*;
use serde::Deserialize;
use std::convert::TryFrom;

/// A property of a decrypted candidate that can be counted
///
/// Predicates count as 0 or 1, the others count bytes or characters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "measure", rename_all = "snake_case")]
pub enum Measure {
    /// `param2` is zero
    Param2Zero,
    /// `param1` is zero and the table is one of `classes`
    Param1ZeroIn {
        /// Classes the predicate applies to
        classes: Vec<TableClass>,
    },
    /// `param1` is not zero and the table is one of `classes`
    Param1NonZeroIn {
        /// Classes the predicate applies to
        classes: Vec<TableClass>,
    },
    /// `param1` is below `bound`
    Param1Below {
        /// Exclusive upper bound
        bound: u32,
    },
    /// The length of the key table
    KeyLength,
    /// Printable GBK characters in the decrypted range `[start, end)`
    PrintableText {
        /// First byte of the range
        start: usize,
        /// One past the last byte of the range, clamped to the body length
        end: usize,
    },
    /// Every byte after the record is zero and there is at least one
    ZeroPaddedTail,
}

impl Measure {
    fn count(&self, candidate: &Candidate<'_>) -> usize {
        let record = &candidate.record;
        let class = candidate.entry.class;
        match self {
            Measure::Param2Zero => (record.param2 == 0) as usize,
            Measure::Param1ZeroIn { classes } => {
                (record.param1 == 0 && classes.contains(&class)) as usize
            }
            Measure::Param1NonZeroIn { classes } => {
                (record.param1 != 0 && classes.contains(&class)) as usize
            }
            Measure::Param1Below { bound } => (record.param1 < *bound) as usize,
            Measure::KeyLength => candidate.entry.key.len(),
            Measure::PrintableText { start, end } => {
                let end = (*end).min(candidate.decrypted.len());
                if *start >= end {
                    0
                } else {
                    text::printable_count(&candidate.decrypted[*start..end])
                }
            }
            Measure::ZeroPaddedTail => {
                let tail = &candidate.decrypted[RECORD_LEN.min(candidate.decrypted.len())..];
                (!tail.is_empty() && tail.iter().all(|&b| b == 0)) as usize
            }
        }
    }
}

/// One weighted entry in the scoring table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScoreRule {
    /// What to count
    #[serde(flatten)]
    pub measure: Measure,
    /// Points per counted unit
    pub weight: i64,
}

impl ScoreRule {
    /// Create a rule
    pub fn new(measure: Measure, weight: i64) -> ScoreRule {
        ScoreRule { measure, weight }
    }
}

/// The ordered scoring table
///
/// A candidate's score is the sum of `weight * count` over every rule, saturating at the
/// bounds of `i64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRules(Vec<ScoreRule>);

impl Default for ScoreRules {
    fn default() -> Self {
        use Measure::*;
        use TableClass::*;
        ScoreRules(vec![
            ScoreRule::new(Param2Zero, 100),
            ScoreRule::new(
                Param1ZeroIn {
                    classes: vec![Movement],
                },
                200,
            ),
            ScoreRule::new(
                Param1NonZeroIn {
                    classes: vec![Item, Npc],
                },
                50,
            ),
            ScoreRule::new(Param1Below { bound: 0x100_0000 }, 10),
            ScoreRule::new(KeyLength, 1),
            ScoreRule::new(PrintableText { start: 16, end: 24 }, 5),
            ScoreRule::new(ZeroPaddedTail, 40),
        ])
    }
}

impl From<Vec<ScoreRule>> for ScoreRules {
    fn from(rules: Vec<ScoreRule>) -> Self {
        ScoreRules(rules)
    }
}

impl ScoreRules {
    /// The rules in order
    pub fn rules(&self) -> &[ScoreRule] {
        &self.0
    }

    fn score(&self, candidate: &Candidate<'_>) -> i64 {
        self.0.iter().fold(0i64, |total, rule| {
            let count = i64::try_from(rule.measure.count(candidate)).unwrap_or(i64::MAX);
            total.saturating_add(rule.weight.saturating_mul(count))
        })
    }
}

/// A payload decrypted with one table that reproduced the table's own function code
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// The table that was tried
    pub entry: &'a TableEntry,
    /// The payload decrypted with it
    pub decrypted: Vec<u8>,
    /// The record read from `decrypted`
    pub record: LfRecord,
}

impl<'a> Candidate<'a> {
    /// Decrypt `payload` with `entry`
    ///
    /// Returns `None` if the decrypted function code is not the table's own code.
    pub fn try_table(entry: &'a TableEntry, payload: &[u8]) -> Option<Candidate<'a>> {
        let decrypted = xor_crypto::decrypt(&entry.key, payload);
        let (record, _) = LfRecord::deserialize(&decrypted).ok()?;
        if record.function_code != entry.function_code {
            return None;
        }
        Some(Candidate {
            entry,
            decrypted,
            record,
        })
    }
}

/// The table chosen for a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The winning table
    pub entry: TableEntry,
    /// The payload decrypted with it
    pub decrypted: Vec<u8>,
    /// The record read from `decrypted`
    pub record: LfRecord,
    /// The winning score
    pub score: i64,
}

/// Pick the key table that was used to obfuscate `payload`
///
/// Every table is tried in registration order. Candidates that fail the function code check
/// are dropped and the rest are scored. On equal scores the table registered first wins.
pub fn classify(
    registry: &TableRegistry,
    rules: &ScoreRules,
    payload: &[u8],
) -> Result<Classification> {
    let mut best: Option<(Candidate<'_>, i64)> = None;

    for entry in registry.iter() {
        let candidate = match Candidate::try_table(entry, payload) {
            Some(candidate) => candidate,
            None => continue,
        };
        let score = rules.score(&candidate);
        trace!(
            "Table {} ({}) scored {}",
            entry.function_code,
            entry.name,
            score
        );

        let better = best.as_ref().map_or(true, |(_, best_score)| score > *best_score);
        if better {
            best = Some((candidate, score));
        }
    }

    let (winner, score) = best.ok_or(Error::ClassificationFailure)?;
    debug!(
        "Classified as {} ({}) with score {}",
        winner.entry.function_code, winner.entry.name, score
    );

    Ok(Classification {
        entry: winner.entry.clone(),
        decrypted: winner.decrypted,
        record: winner.record,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lf::de::parse_hex;
    use assert_matches::assert_matches;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn payload(hex: &str) -> Vec<u8> {
        let buf = parse_hex(hex).unwrap();
        buf[2..buf.len() - 1].to_vec()
    }

    const MOVE: &str =
        "23 34 3C 3C 3C 3C 3C 3C 3C 3C 3C 3C 3F 41 3E 72 58 3C 3C 6C 3D 52 3C 3C 21";
    const USE_ITEM: &str = "23 34 53 48 3D 3C 3C 3C 3C 3C 3C 3C 3F 6A 3C 70 78 3C 53 5C 3C 3D 3C 3C 70 49 76 74 69 48 63 6D 6E 76 74 21";
    const NPC_CLICK: &str =
        "23 38 3C 44 46 7A 3F 4C 3C 3C 3C 3C 3F 6E 3C 6C 3C 3C 3C 3C 3C 3C 3C 3C 21";

    #[test]
    fn test_classify_movement() {
        init();
        let registry = TableRegistry::builtin();
        let result = classify(&registry, &ScoreRules::default(), &payload(MOVE)).unwrap();
        assert_eq!(result.entry.function_code, 3013);
        assert_eq!(result.score, 336);
        assert_eq!(result.record.param3, 103);
        assert_eq!(result.record.param4, 3);
        assert_eq!(result.record.param5, 86);
    }

    #[test]
    fn test_classify_item_tie_goes_to_first() {
        init();
        let registry = TableRegistry::builtin();
        let result = classify(&registry, &ScoreRules::default(), &payload(USE_ITEM)).unwrap();
        assert_eq!(result.entry.function_code, 1006);
        assert_eq!(result.score, 204);
        assert_eq!(result.record.param1, 4243548);
    }

    #[test]
    fn test_classify_npc_prefers_zero_tail() {
        init();
        let registry = TableRegistry::builtin();
        let result = classify(&registry, &ScoreRules::default(), &payload(NPC_CLICK)).unwrap();
        assert_eq!(result.entry.function_code, 1010);
        assert_eq!(result.score, 206);
        assert_eq!(result.record.param1, 230588928);
    }

    #[test]
    fn test_candidates_are_self_consistent() {
        init();
        let registry = TableRegistry::builtin();
        for hex in &[MOVE, USE_ITEM, NPC_CLICK] {
            let payload = payload(hex);
            for entry in registry.iter() {
                if let Some(candidate) = Candidate::try_table(entry, &payload) {
                    assert_eq!(candidate.record.function_code, entry.function_code);
                }
            }
        }
    }

    #[test]
    fn test_no_candidate() {
        init();
        let registry = TableRegistry::builtin();
        let garbage = [0x00; 22];
        assert_matches!(
            classify(&registry, &ScoreRules::default(), &garbage),
            Err(Error::ClassificationFailure)
        );
        assert_matches!(
            classify(&TableRegistry::new(), &ScoreRules::default(), &payload(MOVE)),
            Err(Error::ClassificationFailure)
        );
    }

    #[test]
    fn test_rules_replaceable() {
        init();
        // Only the key length counts, so the longer 1011 table beats 1010
        let rules = ScoreRules::from(vec![ScoreRule::new(Measure::KeyLength, 1)]);
        let builtin = TableRegistry::builtin();
        let mut registry = TableRegistry::new();
        for code in &[1010, 1011] {
            registry.insert(builtin.get(*code).unwrap().clone()).unwrap();
        }
        let result = classify(&registry, &rules, &payload(NPC_CLICK)).unwrap();
        assert_eq!(result.entry.function_code, 1011);
        assert_eq!(result.score, 24);
    }

    #[test]
    fn test_extreme_weights_saturate() {
        init();
        let registry = TableRegistry::builtin();
        let rules = ScoreRules::from(vec![
            ScoreRule::new(Measure::KeyLength, i64::MAX),
            ScoreRule::new(Measure::Param2Zero, i64::MAX),
        ]);
        let result = classify(&registry, &rules, &payload(MOVE)).unwrap();
        assert_eq!(result.score, i64::MAX);
        // Every candidate saturates, so the first registered one that passes the gate wins
        assert_eq!(result.entry.function_code, 3013);

        let rules = ScoreRules::from(vec![ScoreRule::new(Measure::KeyLength, i64::MIN)]);
        let result = classify(&registry, &rules, &payload(MOVE)).unwrap();
        assert_eq!(result.score, i64::MIN);
    }

    #[test]
    fn test_deterministic() {
        let registry = TableRegistry::builtin();
        let rules = ScoreRules::default();
        let first = classify(&registry, &rules, &payload(USE_ITEM)).unwrap();
        for _ in 0..10 {
            assert_eq!(classify(&registry, &rules, &payload(USE_ITEM)).unwrap(), first);
        }
    }

    #[test]
    fn test_rule_from_toml() {
        #[derive(Deserialize)]
        struct Rules {
            rules: Vec<ScoreRule>,
        }
        let rules: Rules = toml::from_str(
            r#"
            [[rules]]
            measure = "param1_below"
            bound = 4096
            weight = 3

            [[rules]]
            measure = "param1_non_zero_in"
            classes = ["npc"]
            weight = 50
            "#,
        )
        .unwrap();
        assert_eq!(
            rules.rules,
            vec![
                ScoreRule::new(Measure::Param1Below { bound: 4096 }, 3),
                ScoreRule::new(
                    Measure::Param1NonZeroIn {
                        classes: vec![TableClass::Npc]
                    },
                    50
                ),
            ]
        );
    }
}
