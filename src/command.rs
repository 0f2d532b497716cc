//! Command registry and dispatcher.
//!
//! Commands form a flat namespace. The `delete` command takes a single item
//! name; everything else an item needs is submitted as a form, so the
//! dispatcher only resolves *which* handler is meant.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Items the `delete` command can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeleteItem {
    Machine,
    SerialConsole,
    RemotePower,
}

impl DeleteItem {
    /// All items, in help order.
    pub const ALL: [DeleteItem; 3] = [
        DeleteItem::Machine,
        DeleteItem::SerialConsole,
        DeleteItem::RemotePower,
    ];

    /// Wire name of the item.
    pub fn as_str(self) -> &'static str {
        match self {
            DeleteItem::Machine => "machine",
            DeleteItem::SerialConsole => "serialconsole",
            DeleteItem::RemotePower => "remotepower",
        }
    }

    /// Path of the item's describe/execute endpoint.
    pub fn path(self) -> &'static str {
        match self {
            DeleteItem::Machine => "/machine/delete",
            DeleteItem::SerialConsole => "/serialconsole/delete",
            DeleteItem::RemotePower => "/remotepower/delete",
        }
    }
}

impl fmt::Display for DeleteItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeleteItem {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let item = s.to_lowercase();
        DeleteItem::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == item)
            .ok_or(DispatchError::UnknownItem(item))
    }
}

/// Dispatcher failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Item is missing!")]
    MissingArgument,

    #[error("Unknown item '{0}'!")]
    UnknownItem(String),

    #[error("Invalid number of arguments for '{0}'!")]
    InvalidArgumentCount(DeleteItem),
}

/// Resolve the raw argument string of `delete` to an item.
///
/// The first whitespace-separated token names the item (case-insensitive).
/// Items take no further arguments on the command line.
pub fn dispatch(raw_args: Option<&str>) -> Result<DeleteItem, DispatchError> {
    let mut tokens = raw_args.unwrap_or_default().split_whitespace();
    let first = tokens.next().ok_or(DispatchError::MissingArgument)?;
    let item: DeleteItem = first.parse()?;

    let sub_arguments = tokens.count();
    if sub_arguments != 0 {
        return Err(DispatchError::InvalidArgumentCount(item));
    }

    tracing::debug!(item = %item, "dispatched delete command");
    Ok(item)
}

/// A client-invocable command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Unique command name.
    pub name: &'static str,
    /// Request method of the dispatch endpoint.
    pub method: &'static str,
    /// Dispatch endpoint path.
    pub url: &'static str,
    /// Argument grammar, in positional order.
    pub arguments: &'static [&'static str],
    pub help_short: &'static str,
    pub help: &'static str,
}

const DELETE_HELP_SHORT: &str = "Removes information from the database.";

const DELETE_HELP: &str = "\
Deletes items from the database.

Usage:
    DELETE <item> [args*]

Arguments:
    item - Specify the item which should be deleted. Items are:

             machine       : Delete a machine (superusers only).
             serialconsole : Delete serial console of a specific machine
                             (superusers only).
             remotepower   : Delete remote power of a specific machine
                             (superusers only).

Example:
    DELETE machine
";

/// The `delete` command.
pub const DELETE: Command = Command {
    name: "delete",
    method: "GET",
    url: "/delete",
    arguments: &["item", "args*"],
    help_short: DELETE_HELP_SHORT,
    help: DELETE_HELP,
};

/// Fixed set of commands, built once at startup.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: Vec<Command>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: vec![DELETE],
        }
    }

    /// Look up a command by name.
    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// All registered commands.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Valid item names of `delete`, for client-side completion.
    pub fn list_command_names(&self) -> BTreeSet<&'static str> {
        DeleteItem::ALL.iter().map(|item| item.as_str()).collect()
    }
}
