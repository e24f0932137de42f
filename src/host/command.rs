use std::str::FromStr;
use thiserror::Error;

/// Console commands understood by the headless host
///
/// Item positions are 1-based, as shown in the log (`item 3/8`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// `next`: show the next carousel item
    Next,
    /// `goto <n>`: show item `n`
    Goto(usize),
    /// `refresh`: fetch feed and announcements now
    Refresh,
    /// `menu`: open or close the side menu
    Menu,
    /// `open <key>`: show a menu page
    Open(String),
    /// `home`: back to the carousel
    Home,
    /// `quit`: shut down
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error("Invalid item position: {0} (positions start at 1)")]
    InvalidPosition(String),
}

impl HostCommand {
    /// Zero-based carousel index for [`HostCommand::Goto`]
    pub fn index(&self) -> Option<usize> {
        match self {
            HostCommand::Goto(position) => position.checked_sub(1),
            _ => None,
        }
    }
}

impl FromStr for HostCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CommandError::Empty);
        };
        let argument = words.next();

        match verb.to_lowercase().as_str() {
            "next" | "n" => Ok(HostCommand::Next),
            "goto" | "g" => {
                let raw = argument.ok_or(CommandError::MissingArgument("goto"))?;
                match raw.parse::<usize>() {
                    Ok(position) if position >= 1 => Ok(HostCommand::Goto(position)),
                    _ => Err(CommandError::InvalidPosition(raw.to_string())),
                }
            }
            "refresh" | "r" => Ok(HostCommand::Refresh),
            "menu" | "m" => Ok(HostCommand::Menu),
            "open" | "o" => argument
                .map(|key| HostCommand::Open(key.to_string()))
                .ok_or(CommandError::MissingArgument("open")),
            "home" | "h" => Ok(HostCommand::Home),
            "quit" | "q" | "exit" => Ok(HostCommand::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
