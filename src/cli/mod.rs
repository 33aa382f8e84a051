//! Command-line interface for mongo_db_dump.
//!
//! Flags are parsed with clap, then turned into a [`FlagSet`] so that the
//! option rules and the command builder can work on flag names. The set is
//! ordered as the flags appeared on the command line.

use crate::actions::Action;
use crate::flags::FlagSet;
use crate::validate::Rules;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use std::ffi::OsString;

const LONG_ABOUT: &str = "\
Runs dumps against a MongoDB server. Depending on the dump type selected it
can dump the whole server, single databases or single collections.

A log file, and an error file when errors are detected, are written to the
dump directory (-o). With -q the dump tool writes no log entries.

The server configuration (-c, in the -d directory) is a TOML file:

    name = \"HOSTNAME\"
    host = \"HOST_IP\"
    port = 27017
    user = \"USER\"
    password = \"PSWORD\"
    auth_db = \"admin\"
    auth_mech = \"SCRAM-SHA-1\"

Optional [tls] (ca_certs, certkey, certkey_phrase) and [ssl] (client_ca,
client_key, client_cert, client_phrase) tables enable encrypted connections.

Examples:
    mongo_db_dump -c mongo -d config -o /db_dump -z -M -l
    mongo_db_dump -c mongo -d config -o /db_dump -E -b shop -t orders";

/// mongo_db_dump - MongoDB dump orchestrator
#[derive(Parser, Debug, Default)]
#[command(name = "mongo_db_dump")]
#[command(about = "Run mongodump, mongoexport or a lock-and-copy dump of a MongoDB server")]
#[command(long_about = LONG_ABOUT)]
pub struct Cli {
    /// Server configuration file
    #[arg(short = 'c', value_name = "FILE")]
    pub config: Option<String>,

    /// Directory holding the configuration file
    #[arg(short = 'd', value_name = "DIR")]
    pub config_dir: Option<String>,

    /// Directory holding the mongo programs, when not in $PATH
    #[arg(short = 'p', value_name = "DIR")]
    pub bin_dir: Option<String>,

    /// Run mongodump
    #[arg(short = 'M')]
    pub mongodump: bool,

    /// Run the sync/copy dump (lock the server and copy its data files)
    #[arg(short = 'A')]
    pub sync_copy: bool,

    /// Run mongoexport for one collection
    #[arg(short = 'E')]
    pub mongoexport: bool,

    /// Dump directory, created when missing
    #[arg(short = 'o', value_name = "DIR")]
    pub output: Option<String>,

    /// Compress the dump
    #[arg(short = 'z')]
    pub gzip: bool,

    /// Include the oplog in the dump
    #[arg(short = 'l')]
    pub oplog: bool,

    /// Quiet mode for the dump tool
    #[arg(short = 'q')]
    pub quiet: bool,

    /// Skip TLS certificate checks
    #[arg(short = 'i')]
    pub tls_insecure: bool,

    /// Include users and roles (requires -b)
    #[arg(short = 'r')]
    pub users_and_roles: bool,

    /// Database name
    #[arg(short = 'b', value_name = "DATABASE")]
    pub database: Option<String>,

    /// Collection name (requires -b)
    #[arg(short = 't', value_name = "NAME")]
    pub collection: Option<String>,

    /// Mail the output to these addresses
    #[arg(short = 'e', value_name = "EMAIL", num_args = 1..)]
    pub email: Option<Vec<String>>,

    /// Mail subject line (requires -e)
    #[arg(short = 's', value_name = "SUBJECT", num_args = 1..)]
    pub subject: Option<Vec<String>>,

    /// Flavor id for the program lock
    #[arg(short = 'y', value_name = "ID")]
    pub flavor: Option<String>,

    /// Suppress standard out
    #[arg(short = 'x')]
    pub suppress: bool,

    /// Print the version and exit
    #[arg(short = 'v')]
    pub version: bool,
}

impl From<&Cli> for FlagSet {
    fn from(cli: &Cli) -> Self {
        let mut flags = FlagSet::new();

        let values = [
            ("-c", &cli.config),
            ("-d", &cli.config_dir),
            ("-p", &cli.bin_dir),
            ("-o", &cli.output),
            ("-b", &cli.database),
            ("-t", &cli.collection),
            ("-y", &cli.flavor),
        ];
        for (name, value) in values {
            if let Some(value) = value {
                flags = flags.with_value(name, value.clone());
            }
        }

        let switches = [
            ("-M", cli.mongodump),
            ("-A", cli.sync_copy),
            ("-E", cli.mongoexport),
            ("-z", cli.gzip),
            ("-l", cli.oplog),
            ("-q", cli.quiet),
            ("-i", cli.tls_insecure),
            ("-r", cli.users_and_roles),
            ("-x", cli.suppress),
        ];
        for (name, set) in switches {
            if set {
                flags = flags.with_switch(name);
            }
        }

        for (name, values) in [("-e", &cli.email), ("-s", &cli.subject)] {
            if let Some(values) = values {
                flags = flags.with_values(name, values.iter().cloned());
            }
        }

        flags
    }
}

/// Parse the process arguments, exiting with clap's message on error
pub fn parse_args() -> (Cli, FlagSet) {
    parse_from(std::env::args_os()).unwrap_or_else(|e| e.exit())
}

/// Parse `args` (program name first) into the options and their flag set
pub fn parse_from<I, T>(args: I) -> Result<(Cli, FlagSet), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = Cli::command().try_get_matches_from(args)?;
    let cli = Cli::from_arg_matches(&matches)?;
    let flags = ordered_flags(&cli, &matches);
    Ok((cli, flags))
}

fn ordered_flags(cli: &Cli, matches: &ArgMatches) -> FlagSet {
    let command = Cli::command();
    let mut flags = FlagSet::from(cli);
    flags.sort_by_key(|name| {
        let short = name.strip_prefix('-').and_then(|rest| rest.chars().next());
        command
            .get_arguments()
            .find(|arg| arg.get_short() == short)
            .and_then(|arg| matches.index_of(arg.get_id().as_str()))
            .unwrap_or(usize::MAX)
    });
    flags
}

/// Option rules for the program
pub fn rules() -> Rules {
    let mut conditional = vec![("-r", vec!["-b"]), ("-t", vec!["-b"]), ("-s", vec!["-e"])];
    conditional.extend(
        Action::ALL
            .into_iter()
            .map(|action| (action.flag(), action.required_flags().to_vec())),
    );

    Rules {
        required: vec!["-c", "-d", "-o"],
        xor_required: vec![Action::ALL.into_iter().map(Action::flag).collect()],
        xor_optional: vec![("-l", "-b")],
        conditional,
        dir_check: vec![("-d", 5), ("-p", 5)],
        dir_create: vec![("-o", 7)],
    }
}

/// Usage line printed after a rule violation
pub fn usage() -> String {
    Cli::command().render_usage().to_string()
}
