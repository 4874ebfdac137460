//! Interactive command parsing and output formatting.

use std::fmt::Write;
use std::path::PathBuf;

use room_core::Members;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  room update     refresh the room's membership
  room members    list the cached membership
  sync            replace the working directory with the host's content
  upload          publish the working directory and notify the room
  dir <path>      set the working directory
  exit | q        leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomAction {
    Update,
    Members,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Room(RoomAction),
    Sync,
    Upload,
    Dir(PathBuf),
    Help,
    Exit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("usage: room update|members")]
    RoomUsage,

    #[error("usage: dir <path>")]
    DirUsage,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut words = line.split_whitespace();
        let head = words.next().ok_or(ParseError::Empty)?;

        match head {
            "room" => match words.next() {
                Some("update") => Ok(Command::Room(RoomAction::Update)),
                Some("members") => Ok(Command::Room(RoomAction::Members)),
                _ => Err(ParseError::RoomUsage),
            },
            "sync" => Ok(Command::Sync),
            "upload" => Ok(Command::Upload),
            "dir" => {
                // Paths may contain spaces
                let rest = line.trim_start().strip_prefix("dir").unwrap_or("").trim();
                if rest.is_empty() {
                    return Err(ParseError::DirUsage);
                }
                Ok(Command::Dir(PathBuf::from(rest)))
            }
            "help" | "?" => Ok(Command::Help),
            "exit" | "q" => Ok(Command::Exit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

/// One line per member, the host marked.
pub fn format_members(members: &Members) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "room {}", members.room_id);
    if members.nodes.is_empty() {
        out.push_str("  (no members)\n");
        return out;
    }
    for (addr, peer_id) in &members.nodes {
        let marker = if addr == &members.host_addr { " (host)" } else { "" };
        let _ = writeln!(out, "  {} {}{}", peer_id, addr, marker);
    }
    out
}
