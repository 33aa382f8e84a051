//! The three backup actions and what each needs from the command line.

use crate::command::FlagTable;
use crate::flags::FlagSet;
use crate::mail::Mail;
use crate::server::Database;
use crate::Result;
use chrono::NaiveDateTime;
use std::path::Path;

pub mod dump;
pub mod sync_copy;

pub use dump::{mongo_dump, mongo_export, mongo_generic};
pub use sync_copy::{copy_tree, sync_cp_dump};

/// Reported when the output directory is missing at run time
pub const MISSING_OUTPUT: &str = "Error: Missing -o option or value.";

/// Outcome of an action that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionReport {
    Completed,
    /// The action finished but reported an error or warning
    Failed(String),
}

impl ActionReport {
    pub fn is_failed(&self) -> bool {
        matches!(self, ActionReport::Failed(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ActionReport::Completed => None,
            ActionReport::Failed(message) => Some(message),
        }
    }
}

impl From<Option<String>> for ActionReport {
    fn from(failure: Option<String>) -> Self {
        failure.map_or(ActionReport::Completed, ActionReport::Failed)
    }
}

const DUMP_TABLE: FlagTable = &[
    ("-l", "--oplog"),
    ("-z", "--gzip"),
    ("-b", "--db="),
    ("-o", "--out="),
    ("-q", "--quiet"),
    ("-i", "--tlsInsecure"),
    ("-r", "--dumpDbUsersAndRoles"),
    ("-t", "--collection="),
];

const EXPORT_TABLE: FlagTable = &[
    ("-b", "--db="),
    ("-t", "--collection="),
    ("-o", "--out="),
    ("-q", "--quiet"),
    ("-i", "--tlsInsecure"),
];

/// Backup action selected by one of `-A`, `-M` or `-E`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SyncCopy,
    MongoDump,
    MongoExport,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::SyncCopy, Action::MongoDump, Action::MongoExport];

    /// Flag that selects this action
    pub fn flag(self) -> &'static str {
        match self {
            Action::SyncCopy => "-A",
            Action::MongoDump => "-M",
            Action::MongoExport => "-E",
        }
    }

    /// Flags that must accompany the trigger flag
    pub fn required_flags(self) -> &'static [&'static str] {
        match self {
            Action::SyncCopy | Action::MongoDump => &["-o"],
            Action::MongoExport => &["-o", "-b", "-t"],
        }
    }

    /// External tool run by the action, if any
    pub fn program(self) -> Option<&'static str> {
        match self {
            Action::SyncCopy => None,
            Action::MongoDump => Some("mongodump"),
            Action::MongoExport => Some("mongoexport"),
        }
    }

    /// Flags passed through to the external tool
    pub fn table(self) -> FlagTable {
        match self {
            Action::SyncCopy => &[],
            Action::MongoDump => DUMP_TABLE,
            Action::MongoExport => EXPORT_TABLE,
        }
    }

    /// The selected action. Validation guarantees at most one is present.
    pub fn from_flags(flags: &FlagSet) -> Option<Action> {
        Action::ALL
            .into_iter()
            .find(|action| flags.contains(action.flag()))
    }

    pub async fn run(self, server: &mut dyn Database, ctx: &mut RunContext<'_>) -> Result<ActionReport> {
        match self {
            Action::SyncCopy => sync_cp_dump(server, ctx).await,
            Action::MongoDump => mongo_dump(&*server, ctx).await,
            Action::MongoExport => mongo_export(&*server, ctx).await,
        }
    }
}

/// State shared by the actions of one run
pub struct RunContext<'a> {
    pub flags: &'a FlagSet,
    /// Options derived from the server config, appended to tool commands
    pub req_args: Vec<String>,
    pub mail: Option<Mail>,
    /// Run start, used for artifact names
    pub now: NaiveDateTime,
}

impl<'a> RunContext<'a> {
    pub fn new(flags: &'a FlagSet, now: NaiveDateTime) -> Self {
        Self {
            flags,
            req_args: Vec::new(),
            mail: None,
            now,
        }
    }

    pub fn with_req_args(mut self, req_args: Vec<String>) -> Self {
        self.req_args = req_args;
        self
    }

    pub fn with_mail(mut self, mail: Option<Mail>) -> Self {
        self.mail = mail;
        self
    }

    /// Dump directory from `-o`, if given a value
    pub fn output_dir(&self) -> Option<&'a Path> {
        let flags: &'a FlagSet = self.flags;
        flags
            .value("-o")
            .filter(|dir| !dir.is_empty())
            .map(Path::new)
    }

    /// Directory of the mongo programs from `-p`
    pub fn bin_dir(&self) -> Option<&'a Path> {
        let flags: &'a FlagSet = self.flags;
        flags.value("-p").map(Path::new)
    }

    /// Whether console echo is suppressed (`-x`)
    pub fn suppress(&self) -> bool {
        self.flags.contains("-x")
    }
}
