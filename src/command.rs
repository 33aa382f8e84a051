//! Builds argument lists for the mongo command line tools.

use crate::config::{Credential, ServerConfig};
use crate::flags::FlagSet;
use std::path::{Path, PathBuf};

/// Internal flag name paired with the tool's flag string. Strings ending in
/// `=` take the flag's value appended.
pub type FlagTable = &'static [(&'static str, &'static str)];

/// Config entries that become required tool options when set
pub const REQUIRED_OPTIONS: &[(&str, &str)] = &[
    ("auth_db", "--authenticationDatabase="),
    ("auth_mech", "--authenticationMechanism="),
];

/// How the password reaches the tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordMode {
    /// Passed as `--password=` in the argument list
    Inline,
    /// Left out of the argument list and written to the child's stdin
    Stdin,
}

/// A ready to run tool invocation
#[derive(Debug, Clone)]
pub struct DumpCommand {
    /// Program first, then its arguments
    pub argv: Vec<String>,
    /// Secret to write to stdin, if any
    pub credential: Option<Credential>,
}

impl DumpCommand {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

/// Assembles a [`DumpCommand`] from the server config and the flag set
pub struct CommandBuilder<'a> {
    program: &'a str,
    server: &'a ServerConfig,
    bin_dir: Option<&'a Path>,
    table: FlagTable,
    overrides: Vec<(&'static str, String)>,
    extra: Vec<String>,
    password_mode: PasswordMode,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(program: &'a str, server: &'a ServerConfig) -> Self {
        Self {
            program,
            server,
            bin_dir: None,
            table: &[],
            overrides: Vec::new(),
            extra: Vec::new(),
            password_mode: PasswordMode::Stdin,
        }
    }

    /// Directory holding the program, instead of searching `$PATH`
    pub fn with_bin_dir(mut self, bin_dir: Option<&'a Path>) -> Self {
        self.bin_dir = bin_dir;
        self
    }

    pub fn with_table(mut self, table: FlagTable) -> Self {
        self.table = table;
        self
    }

    /// Use `value` for `flag` instead of the flag set's value
    pub fn with_override(mut self, flag: &'static str, value: impl Into<String>) -> Self {
        self.overrides.push((flag, value.into()));
        self
    }

    /// Arguments appended after everything else
    pub fn with_extra(mut self, extra: impl IntoIterator<Item = String>) -> Self {
        self.extra.extend(extra);
        self
    }

    pub fn with_password_mode(mut self, mode: PasswordMode) -> Self {
        self.password_mode = mode;
        self
    }

    pub fn program_path(&self) -> PathBuf {
        match self.bin_dir {
            Some(dir) => dir.join(self.program),
            None => PathBuf::from(self.program),
        }
    }

    pub fn build(&self, flags: &FlagSet) -> DumpCommand {
        let mut argv = vec![self.program_path().display().to_string()];
        argv.extend(connection_args(self.server, self.password_mode));
        argv.extend(self.translated(flags));
        argv.extend(self.extra.iter().cloned());

        let credential = match self.password_mode {
            PasswordMode::Stdin => self.server.credential(),
            PasswordMode::Inline => None,
        };

        DumpCommand { argv, credential }
    }

    fn translated(&self, flags: &FlagSet) -> Vec<String> {
        let mut args = Vec::new();
        for (flag, external) in self.table {
            let overridden = self
                .overrides
                .iter()
                .find(|(name, _)| name == flag)
                .map(|(_, value)| value.as_str());

            if !flags.contains(flag) && overridden.is_none() {
                continue;
            }

            if external.ends_with('=') {
                if let Some(value) = overridden.or_else(|| flags.value(flag)) {
                    args.push(format!("{}{}", external, value));
                }
            } else {
                args.push(external.to_string());
            }
        }
        args
    }
}

/// Host, credential and transport security flags for `server`
pub fn connection_args(server: &ServerConfig, password_mode: PasswordMode) -> Vec<String> {
    let mut args = Vec::new();

    match (&server.repset, &server.repset_hosts) {
        (Some(repset), Some(hosts)) => args.push(format!("--host={}/{}", repset, hosts)),
        _ => {
            args.push(format!("--host={}", server.host));
            args.push(format!("--port={}", server.port));
        }
    }

    if server.auth {
        if let Some(user) = &server.user {
            args.push(format!("--username={}", user));
        }
        if password_mode == PasswordMode::Inline {
            if let Some(password) = &server.password {
                args.push(format!("--password={}", password));
            }
        }
    }

    if let Some(tls) = &server.tls {
        args.push("--tls".to_string());
        push_opt(&mut args, "--tlsCAFile=", &tls.ca_certs);
        push_opt(&mut args, "--tlsCertificateKeyFile=", &tls.certkey);
        push_opt(&mut args, "--tlsCertificateKeyFilePassword=", &tls.certkey_phrase);
    } else if let Some(ssl) = &server.ssl {
        args.push("--ssl".to_string());
        push_opt(&mut args, "--sslCAFile=", &ssl.client_ca);
        push_opt(&mut args, "--sslPEMKeyFile=", &ssl.client_cert);
        push_opt(&mut args, "--sslPEMKeyPassword=", &ssl.client_phrase);
    }

    args
}

fn push_opt(args: &mut Vec<String>, flag: &str, value: &Option<String>) {
    if let Some(value) = value {
        args.push(format!("{}{}", flag, value));
    }
}

/// Options taken from config entries named in `table`, skipping unset ones.
/// Authentication options are only meaningful when auth is enabled.
pub fn required_options(server: &ServerConfig, table: &[(&str, &str)]) -> Vec<String> {
    if !server.auth {
        return Vec::new();
    }

    table
        .iter()
        .filter_map(|(entry, flag)| {
            let value = match *entry {
                "auth_db" => server.auth_db.as_deref(),
                "auth_mech" => server.auth_mech.as_deref(),
                _ => None,
            };
            value
                .filter(|v| !v.is_empty())
                .map(|v| format!("{}{}", flag, v))
        })
        .collect()
}
