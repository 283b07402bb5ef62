//! Inbound triggers and their one-line text form.
//!
//! ```text
//! csv <name> [wait]       charging <p> [wait]     volume <p> [wait]
//! call <name>             stop-call               essential on|off
//! tap <band>              override on|off|toggle
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::GlyphError;
use crate::registry::WaitPolicy;
use crate::topology::MusicBand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideAction {
    On,
    Off,
    Toggle,
}

/// One request from an event producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Csv { name: String, policy: WaitPolicy },
    Charging { percent: u32, policy: WaitPolicy },
    Volume { percent: u32, policy: WaitPolicy },
    Call { name: String },
    StopCall,
    Essential(bool),
    Tap(MusicBand),
    Override(OverrideAction),
}

fn err(msg: impl Into<String>) -> GlyphError {
    GlyphError::Trigger(msg.into())
}

fn parse_policy(token: Option<&str>) -> Result<WaitPolicy, GlyphError> {
    match token {
        None => Ok(WaitPolicy::DropIfBusy),
        Some(t) if t.eq_ignore_ascii_case("wait") => Ok(WaitPolicy::Wait),
        Some(t) => Err(err(format!("expected \"wait\", got \"{t}\""))),
    }
}

fn parse_percent(token: Option<&str>) -> Result<u32, GlyphError> {
    let token = token.ok_or_else(|| err("missing percentage"))?;
    token
        .trim_end_matches('%')
        .parse()
        .map_err(|_| err(format!("invalid percentage \"{token}\"")))
}

fn parse_switch(token: Option<&str>) -> Result<bool, GlyphError> {
    match token.map(str::to_ascii_lowercase).as_deref() {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        Some(t) => Err(err(format!("expected on|off, got \"{t}\""))),
        None => Err(err("expected on|off")),
    }
}

impl FromStr for Trigger {
    type Err = GlyphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let Some((command, args)) = tokens.split_first() else {
            return Err(err("empty trigger"));
        };
        let command = command.to_ascii_lowercase();
        let max_args = match command.as_str() {
            "csv" | "play" | "charging" | "volume" => 2,
            "stop-call" | "stop_call" => 0,
            _ => 1,
        };
        if let Some(extra) = args.get(max_args) {
            return Err(err(format!("unexpected argument \"{extra}\"")));
        }
        let arg = args.first().copied();
        let policy = args.get(1).copied();

        let trigger = match command.as_str() {
            "csv" | "play" => Trigger::Csv {
                name: arg.ok_or_else(|| err("missing animation name"))?.to_string(),
                policy: parse_policy(policy)?,
            },
            "charging" => Trigger::Charging {
                percent: parse_percent(arg)?,
                policy: parse_policy(policy)?,
            },
            "volume" => Trigger::Volume {
                percent: parse_percent(arg)?,
                policy: parse_policy(policy)?,
            },
            "call" => Trigger::Call {
                name: arg.ok_or_else(|| err("missing animation name"))?.to_string(),
            },
            "stop-call" | "stop_call" => Trigger::StopCall,
            "essential" => Trigger::Essential(parse_switch(arg)?),
            "tap" => Trigger::Tap(
                arg.ok_or_else(|| err("missing band"))?
                    .parse()
                    .map_err(err)?,
            ),
            "override" => Trigger::Override(match arg.map(str::to_ascii_lowercase).as_deref() {
                Some("toggle") => OverrideAction::Toggle,
                _ if parse_switch(arg)? => OverrideAction::On,
                _ => OverrideAction::Off,
            }),
            other => return Err(err(format!("unknown trigger \"{other}\""))),
        };
        Ok(trigger)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wait = |p: &WaitPolicy| if *p == WaitPolicy::Wait { " wait" } else { "" };
        match self {
            Trigger::Csv { name, policy } => write!(f, "csv {name}{}", wait(policy)),
            Trigger::Charging { percent, policy } => {
                write!(f, "charging {percent}{}", wait(policy))
            }
            Trigger::Volume { percent, policy } => write!(f, "volume {percent}{}", wait(policy)),
            Trigger::Call { name } => write!(f, "call {name}"),
            Trigger::StopCall => f.write_str("stop-call"),
            Trigger::Essential(on) => write!(f, "essential {}", if *on { "on" } else { "off" }),
            Trigger::Tap(band) => write!(f, "tap {band}"),
            Trigger::Override(action) => {
                let a = match action {
                    OverrideAction::On => "on",
                    OverrideAction::Off => "off",
                    OverrideAction::Toggle => "toggle",
                };
                write!(f, "override {a}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Trigger {
        s.parse().unwrap()
    }

    #[test]
    fn parse_csv_with_and_without_wait() {
        assert_eq!(
            parse("csv bulb"),
            Trigger::Csv {
                name: "bulb".into(),
                policy: WaitPolicy::DropIfBusy
            }
        );
        assert_eq!(
            parse("csv bulb wait"),
            Trigger::Csv {
                name: "bulb".into(),
                policy: WaitPolicy::Wait
            }
        );
    }

    #[test]
    fn parse_ladders() {
        assert_eq!(
            parse("charging 62"),
            Trigger::Charging {
                percent: 62,
                policy: WaitPolicy::DropIfBusy
            }
        );
        assert_eq!(
            parse("  VOLUME 40% wait "),
            Trigger::Volume {
                percent: 40,
                policy: WaitPolicy::Wait
            }
        );
    }

    #[test]
    fn parse_call_and_stop() {
        assert_eq!(
            parse("call radiate"),
            Trigger::Call {
                name: "radiate".into()
            }
        );
        assert_eq!(parse("stop-call"), Trigger::StopCall);
    }

    #[test]
    fn parse_switches() {
        assert_eq!(parse("essential on"), Trigger::Essential(true));
        assert_eq!(parse("essential OFF"), Trigger::Essential(false));
        assert_eq!(parse("override toggle"), Trigger::Override(OverrideAction::Toggle));
        assert_eq!(parse("override on"), Trigger::Override(OverrideAction::On));
        assert_eq!(parse("tap mid_high"), Trigger::Tap(MusicBand::MidHigh));
    }

    #[test]
    fn parse_errors() {
        for bad in [
            "",
            "   ",
            "dance",
            "csv",
            "charging",
            "charging -5",
            "charging abc",
            "volume 10 now",
            "essential maybe",
            "tap bass",
            "override",
            "call",
            "call radiate extra",
            "stop-call now",
            "csv bulb wait more",
        ] {
            assert!(bad.parse::<Trigger>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn display_parses_back() {
        for s in [
            "csv bulb wait",
            "charging 62",
            "volume 100 wait",
            "call radiate",
            "stop-call",
            "essential off",
            "tap low",
            "override toggle",
        ] {
            assert_eq!(parse(s).to_string(), s);
        }
    }

    #[test]
    fn errors_are_trigger_errors() {
        let e = "dance".parse::<Trigger>().unwrap_err();
        assert!(matches!(e, GlyphError::Trigger(_)));
        assert_eq!(e.to_string(), "Trigger error: unknown trigger \"dance\"");
    }
}
