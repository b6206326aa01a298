//! The canonical text form of a packet
//!
//! ```text
//! 发送封包（0，0，3013，103，3，86，）
//! 发送封包（4243548，0，0，1006，6160463，修复神水）
//! ```
//!
//! When `param1` and `param2` are both zero the record is written directly: `0，0`, the
//! function code and the operands. Otherwise it is written targeted: `param1，param2`, a
//! zero, the function code and the first operand. Every number is followed by `，` and the
//! optional text ends the list.
//!
//! Text made only of digits reads back as a number, so the targeted form rejects it as an
//! extra operand.
//!
//! Item tables read `param3` and `param4` together as one u32 operand, so their operands are
//! `[u32 at offset 10, param5]`. Every other class uses `[param3, param4, param5]`.

use super::model::*;
use crate::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::convert::TryFrom;
use std::fmt::Write;
use std::str::FromStr;

/// The command word every plaintext line starts with
pub const COMMAND_NAME: &str = "发送封包";

const SEPARATOR: char = '，';

fn operands(record: &LfRecord, class: TableClass) -> Vec<u64> {
    match class {
        TableClass::Item => vec![record.wide_operand().into(), record.param5.into()],
        _ => vec![
            record.param3.into(),
            record.param4.into(),
            record.param5.into(),
        ],
    }
}

/// Render a record and its text in the canonical form
pub fn render(record: &LfRecord, class: TableClass, text: Option<&str>) -> String {
    let operands = operands(record, class);
    let numbers: Vec<u64> = if record.param1 == 0 && record.param2 == 0 {
        let head = [0, 0, u64::from(record.function_code)];
        head.iter().chain(operands.iter()).copied().collect()
    } else {
        let head = [
            u64::from(record.param1),
            u64::from(record.param2),
            0,
            u64::from(record.function_code),
        ];
        head.iter().chain(operands.iter().take(1)).copied().collect()
    };

    let mut out = format!("{}（", COMMAND_NAME);
    for n in numbers {
        let _ = write!(out, "{}{}", n, SEPARATOR);
    }
    if let Some(text) = text {
        out.push_str(text);
    }
    out.push('）');
    out
}

/// A parsed plaintext command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The numbers in the order they were written
    pub numbers: Vec<u64>,
    /// The trailing text, if any
    pub text: Option<String>,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Command> {
        lazy_static! {
            static ref COMMAND: Regex =
                Regex::new(r"^发送封包\s*[（(](?P<args>.*)[）)]$").expect("valid regex");
        }

        let s = s.trim();
        let args = COMMAND
            .captures(s)
            .and_then(|caps| caps.name("args"))
            .ok_or_else(|| Error::Format {
                why: format!("Not a {} command: {}", COMMAND_NAME, s),
            })?
            .as_str();

        let parts: Vec<&str> = args.split(SEPARATOR).map(str::trim).collect();
        let mut numbers = vec![];
        let mut text = None;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            match part.parse::<u64>() {
                Ok(n) => numbers.push(n),
                Err(_) => {
                    let rest = parts[i..].join("，");
                    let rest = rest.trim_end_matches(SEPARATOR).trim();
                    text = Some(rest.to_string());
                    break;
                }
            }
        }

        Ok(Command { numbers, text })
    }
}

impl Command {
    /// Turn the command into fields ready to be rebuilt
    ///
    /// `class_of` gives the class of a function code, which decides how the operands are laid
    /// out. Operands that are not written are zero.
    pub fn into_fields<F>(self, class_of: F) -> Result<PacketFields>
    where
        F: Fn(u16) -> TableClass,
    {
        let (param1, param2, function_code, rest, targeted) = match self.numbers.as_slice() {
            [0, 0, fc, rest @ ..] => (0, 0, *fc, rest, false),
            [p1, p2, 0, fc, rest @ ..] => (*p1, *p2, *fc, rest, true),
            _ => {
                return Err(Error::Format {
                    why: format!(
                        "Expected 0，0，code or param1，param2，0，code but got {:?}",
                        self.numbers
                    ),
                })
            }
        };

        let function_code = narrow::<u16>(function_code, "function code")?;
        let mut record = LfRecord {
            param1: narrow(param1, "param1")?,
            param2: narrow(param2, "param2")?,
            function_code,
            ..Default::default()
        };

        // The targeted form only carries the first operand
        if targeted && rest.len() > 1 {
            return Err(too_many(1, rest.len()));
        }

        match class_of(function_code) {
            TableClass::Item => {
                if rest.len() > 2 {
                    return Err(too_many(2, rest.len()));
                }
                let wide = rest.get(0).copied().unwrap_or(0);
                record.set_wide_operand(narrow(wide, "item operand")?);
                record.param5 = narrow(rest.get(1).copied().unwrap_or(0), "param5")?;
            }
            _ => {
                if rest.len() > 3 {
                    return Err(too_many(3, rest.len()));
                }
                let get = |i: usize| rest.get(i).copied().unwrap_or(0);
                record.param3 = narrow(get(0), "param3")?;
                record.param4 = narrow(get(1), "param4")?;
                record.param5 = narrow(get(2), "param5")?;
            }
        }

        Ok(PacketFields {
            record,
            text: self.text,
            min_len: 0,
        })
    }
}

fn narrow<T: TryFrom<u64>>(value: u64, field: &str) -> Result<T> {
    T::try_from(value).map_err(|_| Error::Format {
        why: format!("{} is out of range: {}", field, value),
    })
}

fn too_many(max: usize, got: usize) -> Error {
    Error::Format {
        why: format!("Expected at most {} operands, got {}", max, got),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn class_of(code: u16) -> TableClass {
        match code {
            1006 | 5014 | 5015 => TableClass::Item,
            1010 | 1011 => TableClass::Npc,
            _ => TableClass::Movement,
        }
    }

    #[test]
    fn test_render_direct() {
        let record = LfRecord {
            function_code: 3013,
            param3: 103,
            param4: 3,
            param5: 86,
            ..Default::default()
        };
        assert_eq!(
            render(&record, TableClass::Movement, None),
            "发送封包（0，0，3013，103，3，86，）"
        );
    }

    #[test]
    fn test_render_targeted_item() {
        let record = LfRecord {
            param1: 4243548,
            param2: 0,
            function_code: 1006,
            param3: 0x4F,
            param4: 0x5E,
            param5: 16,
        };
        assert_eq!(
            render(&record, TableClass::Item, Some("修复神水")),
            "发送封包（4243548，0，0，1006，6160463，修复神水）"
        );
    }

    #[test]
    fn test_render_targeted_npc() {
        let record = LfRecord {
            param1: 230588928,
            function_code: 1010,
            ..Default::default()
        };
        assert_eq!(
            render(&record, TableClass::Npc, None),
            "发送封包（230588928，0，0，1010，0，）"
        );
    }

    #[test]
    fn test_render_direct_item() {
        let record = LfRecord {
            function_code: 5014,
            param3: 1,
            param5: 2,
            ..Default::default()
        };
        assert_eq!(
            render(&record, TableClass::Item, None),
            "发送封包（0，0，5014，1，2，）"
        );
    }

    #[test]
    fn test_parse_command() {
        let cmd: Command = "发送封包（4243548，0，0，1006，6160463，修复神水）".parse().unwrap();
        assert_eq!(cmd.numbers, vec![4243548, 0, 0, 1006, 6160463]);
        assert_eq!(cmd.text.as_deref(), Some("修复神水"));

        let cmd: Command = "发送封包(0，0，3013，103，3，86，)".parse().unwrap();
        assert_eq!(cmd.numbers, vec![0, 0, 3013, 103, 3, 86]);
        assert_eq!(cmd.text, None);
    }

    #[test]
    fn test_parse_text_with_brackets() {
        let cmd: Command = "发送封包（1，0，0，1011，0，@加入骑士团1(0,58,初阶)）"
            .parse()
            .unwrap();
        assert_eq!(cmd.text.as_deref(), Some("@加入骑士团1(0,58,初阶)"));
    }

    #[test]
    fn test_parse_not_command() {
        assert_matches!("wait(100)".parse::<Command>(), Err(Error::Format { .. }));
        assert_matches!("发送封包 1,2".parse::<Command>(), Err(Error::Format { .. }));
    }

    #[test]
    fn test_fields_targeted_item() {
        let cmd: Command = "发送封包（4243548，0，0，1006，6160463，修复神水）".parse().unwrap();
        let fields = cmd.into_fields(class_of).unwrap();
        assert_eq!(fields.record.param1, 4243548);
        assert_eq!(fields.record.function_code, 1006);
        assert_eq!(fields.record.param3, 0x4F);
        assert_eq!(fields.record.param4, 0x5E);
        assert_eq!(fields.record.param5, 0);
        assert_eq!(fields.text.as_deref(), Some("修复神水"));
    }

    #[test]
    fn test_fields_direct_defaults() {
        let cmd: Command = "发送封包（0，0，3017，5，）".parse().unwrap();
        let fields = cmd.into_fields(class_of).unwrap();
        assert_eq!(
            fields.record,
            LfRecord {
                function_code: 3017,
                param3: 5,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_fields_render_roundtrip() {
        let line = "发送封包（0，0，3013，103，3，86，）";
        let fields = line.parse::<Command>().unwrap().into_fields(class_of).unwrap();
        assert_eq!(render(&fields.record, TableClass::Movement, None), line);
    }

    #[test]
    fn test_fields_errors() {
        let bad = |line: &str| line.parse::<Command>().unwrap().into_fields(class_of);
        assert_matches!(bad("发送封包（1，2，3，）"), Err(Error::Format { .. }));
        assert_matches!(bad("发送封包（0，0，70000，）"), Err(Error::Format { .. }));
        assert_matches!(bad("发送封包（0，0，3013，1，2，3，4，）"), Err(Error::Format { .. }));
        assert_matches!(bad("发送封包（0，0，1006，1，2，3，）"), Err(Error::Format { .. }));
        assert_matches!(bad("发送封包（0，0，3013，70000，）"), Err(Error::Format { .. }));
    }

    #[test]
    fn test_fields_targeted_single_operand() {
        let bad = |line: &str| line.parse::<Command>().unwrap().into_fields(class_of);
        assert_matches!(
            bad("发送封包（4243548，0，0，1006，6160463，123）"),
            Err(Error::Format { .. })
        );
        assert_matches!(
            bad("发送封包（230588928，0，0，1010，1，2，）"),
            Err(Error::Format { .. })
        );

        let fields = bad("发送封包（4243548，0，0，1006，6160463，x123）").unwrap();
        assert_eq!(fields.record.wide_operand(), 6160463);
        assert_eq!(fields.record.param5, 0);
        assert_eq!(fields.text.as_deref(), Some("x123"));
    }
}
