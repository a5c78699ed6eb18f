use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::lifecycle::AppPhase;

static HMS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").expect("static duration pattern")
});
static MILLIS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)ms$").expect("static millis pattern"));

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("{command} needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("invalid duration: {0} (try 25m, 1h30m, 90s or 1500ms)")]
    InvalidDuration(String),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything a UI collaborator can ask of the timer, from a terminal line
/// or a WebSocket message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Start,
    Pause,
    Toggle,
    Reset,
    SetDuration { ms: u64 },
    Preset { name: String },
    Drag { x: f64, y: f64 },
    Lifecycle { phase: AppPhase },
    Status,
    #[serde(skip_deserializing)]
    Quit,
}

/// Parses one line of terminal input. Lines starting with `{` are read as
/// the same JSON messages the WebSocket server accepts.
pub fn parse_line(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.starts_with('{') {
        return Ok(serde_json::from_str(line)?);
    }

    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err(CommandError::Empty);
    };

    let command = match head.to_lowercase().as_str() {
        "start" | "s" => Command::Start,
        "pause" | "p" => Command::Pause,
        "toggle" | "t" => Command::Toggle,
        "reset" | "r" => Command::Reset,
        "status" | "st" => Command::Status,
        "quit" | "q" | "exit" => Command::Quit,
        "set" => {
            let value = words.next().ok_or(CommandError::MissingArgument {
                command: "set",
                argument: "a duration",
            })?;
            Command::SetDuration {
                ms: parse_duration(value)?,
            }
        }
        "preset" => {
            let name = words.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "preset",
                    argument: "a number or label",
                });
            }
            Command::Preset { name }
        }
        "drag" => {
            let mut coordinate = || {
                words
                    .next()
                    .ok_or(CommandError::MissingArgument {
                        command: "drag",
                        argument: "x and y",
                    })
                    .and_then(parse_coordinate)
            };
            let x = coordinate()?;
            let y = coordinate()?;
            Command::Drag { x, y }
        }
        "active" | "resume" | "fg" => Command::Lifecycle {
            phase: AppPhase::Active,
        },
        "inactive" => Command::Lifecycle {
            phase: AppPhase::Inactive,
        },
        "background" | "bg" => Command::Lifecycle {
            phase: AppPhase::Background,
        },
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}

/// Accepts `25m`, `1h30m`, `90s`, `1500ms`, or a bare number of minutes.
pub fn parse_duration(text: &str) -> Result<u64, CommandError> {
    let text = text.trim().to_lowercase();
    let invalid = || CommandError::InvalidDuration(text.clone());

    if let Some(caps) = MILLIS_PATTERN.captures(&text) {
        return caps[1].parse().map_err(|_| invalid());
    }
    if let Ok(minutes) = text.parse::<u64>() {
        return minutes.checked_mul(60_000).ok_or_else(invalid);
    }

    let caps = HMS_PATTERN.captures(&text).ok_or_else(invalid)?;
    if caps.get(1).is_none() && caps.get(2).is_none() && caps.get(3).is_none() {
        return Err(invalid());
    }

    let part = |index: usize, unit_ms: u64| -> Result<u64, CommandError> {
        match caps.get(index) {
            Some(m) => m
                .as_str()
                .parse::<u64>()
                .ok()
                .and_then(|n| n.checked_mul(unit_ms))
                .ok_or_else(invalid),
            None => Ok(0),
        }
    };
    let (hours, minutes, seconds) = (part(1, 3_600_000)?, part(2, 60_000)?, part(3, 1_000)?);
    let total = hours
        .checked_add(minutes)
        .and_then(|sum| sum.checked_add(seconds))
        .ok_or_else(invalid)?;
    Ok(total)
}

fn parse_coordinate(text: &str) -> Result<f64, CommandError> {
    text.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| CommandError::InvalidNumber(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_commands_and_aliases() {
        assert_eq!(parse_line("start").unwrap(), Command::Start);
        assert_eq!(parse_line("  P ").unwrap(), Command::Pause);
        assert_eq!(parse_line("t").unwrap(), Command::Toggle);
        assert_eq!(parse_line("reset").unwrap(), Command::Reset);
        assert_eq!(parse_line("q").unwrap(), Command::Quit);
        assert_eq!(
            parse_line("bg").unwrap(),
            Command::Lifecycle {
                phase: AppPhase::Background
            }
        );
    }

    #[test]
    fn parses_arguments() {
        assert_eq!(
            parse_line("set 1h30m").unwrap(),
            Command::SetDuration { ms: 5_400_000 }
        );
        assert_eq!(
            parse_line("preset Deep Focus").unwrap(),
            Command::Preset {
                name: "Deep Focus".to_string()
            }
        );
        assert_eq!(
            parse_line("drag 320 180.5").unwrap(),
            Command::Drag { x: 320.0, y: 180.5 }
        );
    }

    #[test]
    fn parses_json_messages() {
        assert_eq!(
            parse_line(r#"{"type":"set_duration","ms":600000}"#).unwrap(),
            Command::SetDuration { ms: 600_000 }
        );
        assert_eq!(
            parse_line(r#"{"type":"lifecycle","phase":"active"}"#).unwrap(),
            Command::Lifecycle {
                phase: AppPhase::Active
            }
        );
        assert!(matches!(
            parse_line(r#"{"type":"quit"}"#),
            Err(CommandError::Json(_))
        ));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(parse_line("   "), Err(CommandError::Empty)));
        assert!(matches!(parse_line("jump"), Err(CommandError::Unknown(_))));
        assert!(matches!(
            parse_line("set"),
            Err(CommandError::MissingArgument { command: "set", .. })
        ));
        assert!(matches!(
            parse_line("drag 1"),
            Err(CommandError::MissingArgument { command: "drag", .. })
        ));
        assert!(matches!(
            parse_line("drag 1 nan"),
            Err(CommandError::InvalidNumber(_))
        ));
    }

    #[test]
    fn duration_forms() {
        assert_eq!(parse_duration("25m").unwrap(), 1_500_000);
        assert_eq!(parse_duration("25").unwrap(), 1_500_000);
        assert_eq!(parse_duration("90s").unwrap(), 90_000);
        assert_eq!(parse_duration("1500ms").unwrap(), 1_500);
        assert_eq!(parse_duration("1H").unwrap(), 3_600_000);
        assert_eq!(parse_duration("1m30s").unwrap(), 90_000);
    }

    #[test]
    fn duration_rejects_garbage() {
        for text in ["", "m", "soon", "1d", "5m1h", "99999999999999999999"] {
            assert!(
                matches!(parse_duration(text), Err(CommandError::InvalidDuration(_))),
                "{text:?} should be rejected"
            );
        }
    }
}
