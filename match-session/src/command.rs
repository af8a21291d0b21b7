use crate::session_manager::Entity;
use enum_iterator::all;
use match_common::{period::Period, roster::PlayerId, side::Side, stats::StatKind};
use std::str::FromStr;
use thiserror::Error;

/// One line of input to the console driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Reset,
    Toggle(PlayerId),
    Increment(Entity, StatKind),
    Decrement(Entity, StatKind),
    Timeout(Side),
    ClearTimeout(Side),
    Period(Period),
    Save,
    Finish,
    Reopen,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCommandError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command `{0}`, try `help`")]
    Unknown(String),
    #[error("`{command}` needs a {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("{0}")]
    InvalidArgument(String),
    #[error("`{0}` takes no more arguments")]
    TooManyArguments(&'static str),
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let name = words.next().ok_or(ParseCommandError::Empty)?;
        let name = name.to_ascii_lowercase();

        let command = match name.as_str() {
            "start" => Self::Start,
            "pause" | "stop" => Self::Pause,
            "reset" => Self::Reset,
            "toggle" => Self::Toggle(arg(&mut words, "toggle", "player id")?.into()),
            "inc" | "dec" => {
                let command = if name == "inc" { "inc" } else { "dec" };
                let entity: Entity = arg(&mut words, command, "player id or `opponent`")?
                    .parse()
                    .map_err(ParseCommandError::InvalidArgument)?;
                let kind: StatKind = arg(&mut words, command, "stat")?
                    .parse()
                    .map_err(ParseCommandError::InvalidArgument)?;
                if command == "inc" {
                    Self::Increment(entity, kind)
                } else {
                    Self::Decrement(entity, kind)
                }
            }
            "timeout" | "untimeout" => {
                let command = if name == "timeout" {
                    "timeout"
                } else {
                    "untimeout"
                };
                let word = arg(&mut words, command, "side")?;
                let side = Side::from_key(&word.to_ascii_lowercase()).ok_or_else(|| {
                    ParseCommandError::InvalidArgument(format!(
                        "Unknown side `{word}`, expected `local` or `visitor`"
                    ))
                })?;
                if command == "timeout" {
                    Self::Timeout(side)
                } else {
                    Self::ClearTimeout(side)
                }
            }
            "period" => Self::Period(
                arg(&mut words, "period", "period")?
                    .parse::<Period>()
                    .map_err(ParseCommandError::InvalidArgument)?,
            ),
            "save" => Self::Save,
            "finish" => Self::Finish,
            "reopen" => Self::Reopen,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => return Err(ParseCommandError::Unknown(name)),
        };

        if words.next().is_some() {
            return Err(ParseCommandError::TooManyArguments(command.name()));
        }
        Ok(command)
    }
}

fn arg<'a, I: Iterator<Item = &'a str>>(
    words: &mut I,
    command: &'static str,
    argument: &'static str,
) -> Result<&'a str, ParseCommandError> {
    words
        .next()
        .ok_or(ParseCommandError::MissingArgument { command, argument })
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Reset => "reset",
            Self::Toggle(_) => "toggle",
            Self::Increment(..) => "inc",
            Self::Decrement(..) => "dec",
            Self::Timeout(_) => "timeout",
            Self::ClearTimeout(_) => "untimeout",
            Self::Period(_) => "period",
            Self::Save => "save",
            Self::Finish => "finish",
            Self::Reopen => "reopen",
            Self::Status => "status",
            Self::Help => "help",
            Self::Quit => "quit",
        }
    }
}

pub fn help_text() -> String {
    let stats: Vec<&str> = all::<StatKind>().map(|k| k.key()).collect();
    format!(
        "Commands:\n  \
         start | pause | reset\n  \
         toggle <player>\n  \
         inc <player|opponent> <stat>\n  \
         dec <player|opponent> <stat>\n  \
         timeout <local|visitor> | untimeout <local|visitor>\n  \
         period <1H|2H>\n  \
         save | finish | reopen | status | quit\n\
         Stats: {}",
        stats.join(", ")
    )
}
