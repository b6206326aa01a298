//! Batch send scripts
//!
//! ```text
//! # walk then use an item
//! 发送封包（0，0，3013，100，200，）
//! wait(1000)
//! repeat(3)
//!     发送封包（4243548，0，0，1006，6160463，修复神水）
//!     wait(500)
//! end
//! ```
//!
//! Scripts are parsed completely before anything is sent, so a bad line or an unbalanced
//! `repeat` never leaves a script half run.

use super::{Outgoing, PacketSender, Result, SendRecord, StopHandle};
use crate::lf::model::TableClass;
use crate::lf::plaintext::{Command, COMMAND_NAME};
use crate::Error;
use lazy_static::lazy_static;
use log::*;
use regex::Regex;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// One step of a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Rebuild and send a `发送封包（…）` line
    Send(String),
    /// Sleep
    Wait(Duration),
    /// Run the body `count` times
    Repeat {
        /// How many times
        count: u32,
        /// The nested steps
        body: Vec<Step>,
    },
}

/// A parsed script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    /// The top level steps
    pub steps: Vec<Step>,
}

struct OpenRepeat {
    line: usize,
    count: u32,
    body: Vec<Step>,
}

fn innermost<'a>(root: &'a mut Vec<Step>, open: &'a mut Vec<OpenRepeat>) -> &'a mut Vec<Step> {
    match open.last_mut() {
        Some(repeat) => &mut repeat.body,
        None => root,
    }
}

fn script_error(line: usize, why: impl Into<String>) -> Error {
    Error::Script {
        line,
        why: why.into(),
    }
}

impl FromStr for Script {
    type Err = Error;

    fn from_str(text: &str) -> Result<Script> {
        lazy_static! {
            static ref WAIT: Regex = Regex::new(r"^wait\s*\(\s*(\d+)\s*\)$").expect("valid regex");
            static ref REPEAT: Regex =
                Regex::new(r"^repeat\s*\(\s*(\d+)\s*\)$").expect("valid regex");
        }

        let mut root = vec![];
        let mut open: Vec<OpenRepeat> = vec![];

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line == "end" {
                let repeat = open
                    .pop()
                    .ok_or_else(|| script_error(line_no, "end without a matching repeat"))?;
                innermost(&mut root, &mut open).push(Step::Repeat {
                    count: repeat.count,
                    body: repeat.body,
                });
            } else if let Some(caps) = WAIT.captures(line) {
                let ms = caps[1]
                    .parse::<u64>()
                    .map_err(|e| script_error(line_no, e.to_string()))?;
                innermost(&mut root, &mut open).push(Step::Wait(Duration::from_millis(ms)));
            } else if let Some(caps) = REPEAT.captures(line) {
                let count = caps[1]
                    .parse::<u32>()
                    .map_err(|e| script_error(line_no, e.to_string()))?;
                open.push(OpenRepeat {
                    line: line_no,
                    count,
                    body: vec![],
                });
            } else if line.starts_with(COMMAND_NAME) {
                // Operand counts depend on the table, which is only known when sending
                line.parse::<Command>()
                    .and_then(|command| command.into_fields(|_| TableClass::Other))
                    .map_err(|e| script_error(line_no, e.to_string()))?;
                innermost(&mut root, &mut open).push(Step::Send(line.to_string()));
            } else {
                return Err(script_error(line_no, format!("Unknown command: {}", line)));
            }
        }

        if let Some(repeat) = open.pop() {
            return Err(script_error(repeat.line, "repeat without a matching end"));
        }

        Ok(Script { steps: root })
    }
}

impl Script {
    /// Number of packets the script sends when run to the end
    pub fn send_count(&self) -> usize {
        fn count(steps: &[Step]) -> usize {
            steps
                .iter()
                .map(|step| match step {
                    Step::Send(_) => 1,
                    Step::Wait(_) => 0,
                    Step::Repeat { count: n, body } => *n as usize * count(body),
                })
                .sum()
        }
        count(&self.steps)
    }
}

/// What a script run did
#[derive(Debug, Clone, Default)]
pub struct ScriptReport {
    /// Every send attempt in order
    pub records: Vec<SendRecord>,
    /// True if the run ended because it was stopped
    pub stopped: bool,
}

/// Runs scripts against a sender
///
/// The stop flag is checked between steps. A wait that has started runs to its end.
#[derive(Debug, Clone, Default)]
pub struct ScriptRunner {
    stop: StopHandle,
}

impl ScriptRunner {
    /// A runner that is not stopped
    pub fn new() -> Self {
        Default::default()
    }

    /// A handle that stops the runner at the next step
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run `script` on the calling thread
    pub fn run<W: Write>(&self, script: &Script, sender: &PacketSender<W>) -> ScriptReport {
        info!("Running script with {} sends", script.send_count());
        let mut report = ScriptReport::default();
        report.stopped = !self.run_steps(&script.steps, sender, &mut report.records);
        if report.stopped {
            info!("Script stopped after {} sends", report.records.len());
        } else {
            info!("Script finished");
        }
        report
    }

    fn run_steps<W: Write>(
        &self,
        steps: &[Step],
        sender: &PacketSender<W>,
        records: &mut Vec<SendRecord>,
    ) -> bool {
        for step in steps {
            if self.stop.is_stopped() {
                return false;
            }
            match step {
                Step::Send(line) => {
                    records.push(sender.send_item(&Outgoing::Command(line.clone())));
                }
                Step::Wait(duration) => std::thread::sleep(*duration),
                Step::Repeat { count, body } => {
                    for _ in 0..*count {
                        if !self.run_steps(body, sender, records) {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// Run `script` on its own thread
    pub fn spawn<W>(
        self,
        script: Script,
        sender: Arc<PacketSender<W>>,
    ) -> JoinHandle<ScriptReport>
    where
        W: Write + Send + 'static,
    {
        std::thread::spawn(move || self.run(&script, &sender))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lf_protocol::LfCodec;
    use assert_matches::assert_matches;
    use indoc::indoc;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_parse_nested() {
        let script: Script = indoc! {"
            # comment
            发送封包（0，0，3013，100，200，）
            wait(10)

            repeat(2)
                发送封包（0，0，3017，1，）
                repeat(3)
                    wait(1)
                    发送封包（0，0，3011，2，）
                end
            end
        "}
        .parse()
        .unwrap();

        assert_eq!(script.steps.len(), 3);
        assert_eq!(script.steps[1], Step::Wait(Duration::from_millis(10)));
        assert_matches!(&script.steps[2], Step::Repeat { count: 2, body } if body.len() == 2);
        assert_eq!(script.send_count(), 1 + 2 * (1 + 3));
    }

    #[test]
    fn test_unmatched_end() {
        let e = indoc! {"
            发送封包（0，0，3013，100，200，）
            end
        "}
        .parse::<Script>();
        assert_matches!(e, Err(Error::Script { line: 2, .. }));
    }

    #[test]
    fn test_missing_end() {
        let e = indoc! {"
            repeat(2)
              repeat(2)
              end
            wait(5)
        "}
        .parse::<Script>();
        assert_matches!(e, Err(Error::Script { line: 1, .. }));
    }

    #[test]
    fn test_unknown_line() {
        let e = indoc! {"
            wait(5)
            jump(3)
        "}
        .parse::<Script>();
        assert_matches!(e, Err(Error::Script { line: 2, why }) if why.contains("jump"));

        let e = "发送封包（1，2）".parse::<Script>();
        assert_matches!(e, Err(Error::Script { line: 1, .. }));
    }

    #[test]
    fn test_run() {
        init();
        let sender = PacketSender::with_writer(LfCodec::default(), vec![], 100);
        let script: Script = indoc! {"
            repeat(3)
                发送封包（0，0，3013，103，3，86，）
            end
            发送封包（0，0，4242，）
        "}
        .parse()
        .unwrap();

        let report = ScriptRunner::new().run(&script, &sender);
        assert!(!report.stopped);
        assert_eq!(report.records.len(), 4);
        assert!(report.records[..3].iter().all(SendRecord::success));
        assert_matches!(
            report.records[3].error,
            Some(Error::UnknownFunctionCode(4242))
        );

        let written = sender.disconnect().unwrap();
        assert_eq!(written.len(), 3 * 25);
        assert_eq!(written[1], b'1');
        assert_eq!(written[26], b'2');
        assert_eq!(written[51], b'3');
    }

    #[test]
    fn test_stop_between_steps() {
        init();
        let sender = Arc::new(PacketSender::with_writer(LfCodec::default(), vec![], 100));
        let script: Script = indoc! {"
            repeat(1000)
                发送封包（0，0，3013，103，3，86，）
                wait(5)
            end
        "}
        .parse()
        .unwrap();

        let runner = ScriptRunner::new();
        let stop = runner.stop_handle();
        let handle = runner.spawn(script, sender.clone());
        std::thread::sleep(Duration::from_millis(50));
        stop.stop();

        let report = handle.join().unwrap();
        assert!(report.stopped);
        assert!(report.records.len() < 1000);
        assert_eq!(sender.stats().sent as usize, report.records.len());
    }
}
