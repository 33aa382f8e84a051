//! Declarative rules over a [`FlagSet`], checked before anything runs.

use crate::flags::FlagSet;
use std::ffi::CString;
use std::fs::DirBuilder;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// A rule violation. The first one found stops validation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RuleError {
    #[error("Missing required option: {flag}")]
    MissingRequired { flag: String },

    #[error("Exactly one of {} is required", .group.join(", "))]
    XorNone { group: Vec<String> },

    #[error("Only one of {} may be given", .present.join(", "))]
    XorMany { present: Vec<String> },

    #[error("Option {flag} cannot be used with {excluded}")]
    Excluded { flag: String, excluded: String },

    #[error("Option {flag} requires {required}")]
    MissingConditional { flag: String, required: String },

    #[error("Option {flag} requires a directory path")]
    MissingDirectory { flag: String },

    #[error("Directory {path} for {flag} does not exist")]
    NoSuchDirectory { flag: String, path: String },

    #[error("Directory {path} for {flag} lacks permission {perms}")]
    Permission { flag: String, path: String, perms: u32 },

    #[error("Unable to create directory {path} for {flag}: {reason}")]
    CreateFailed {
        flag: String,
        path: String,
        reason: String,
    },
}

/// Rule set evaluated in declaration order of its classes
#[derive(Debug, Clone, Default)]
pub struct Rules {
    /// Flags that must all be present
    pub required: Vec<&'static str>,
    /// Groups where exactly one member must be present
    pub xor_required: Vec<Vec<&'static str>>,
    /// `(a, b)`: when `a` is present `b` must not be
    pub xor_optional: Vec<(&'static str, &'static str)>,
    /// `(a, [b..])`: when `a` is present every `b` must be
    pub conditional: Vec<(&'static str, Vec<&'static str>)>,
    /// Existing directories and the access level they need (4 r, 2 w, 1 x)
    pub dir_check: Vec<(&'static str, u32)>,
    /// Directories created when absent, then checked at the given level
    pub dir_create: Vec<(&'static str, u32)>,
}

impl Rules {
    /// Run every rule class in order, stopping at the first violation
    pub fn check(&self, flags: &FlagSet) -> Result<(), RuleError> {
        self.check_required(flags)?;
        self.check_xor_required(flags)?;
        self.check_xor_optional(flags)?;
        self.check_conditional(flags)?;
        self.check_dirs(flags)?;
        self.create_dirs(flags)?;
        debug!("All option rules passed");
        Ok(())
    }

    pub fn check_required(&self, flags: &FlagSet) -> Result<(), RuleError> {
        match self.required.iter().find(|flag| !flags.contains(flag)) {
            Some(flag) => Err(RuleError::MissingRequired {
                flag: flag.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn check_xor_required(&self, flags: &FlagSet) -> Result<(), RuleError> {
        for group in &self.xor_required {
            let present: Vec<String> = group
                .iter()
                .filter(|flag| flags.contains(flag))
                .map(|flag| flag.to_string())
                .collect();

            match present.len() {
                1 => {}
                0 => {
                    return Err(RuleError::XorNone {
                        group: group.iter().map(|f| f.to_string()).collect(),
                    })
                }
                _ => return Err(RuleError::XorMany { present }),
            }
        }
        Ok(())
    }

    pub fn check_xor_optional(&self, flags: &FlagSet) -> Result<(), RuleError> {
        for (flag, excluded) in &self.xor_optional {
            if flags.contains(flag) && flags.contains(excluded) {
                return Err(RuleError::Excluded {
                    flag: flag.to_string(),
                    excluded: excluded.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn check_conditional(&self, flags: &FlagSet) -> Result<(), RuleError> {
        for (flag, needs) in &self.conditional {
            if !flags.contains(flag) {
                continue;
            }
            if let Some(missing) = needs.iter().find(|need| !flags.contains(need)) {
                return Err(RuleError::MissingConditional {
                    flag: flag.to_string(),
                    required: missing.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn check_dirs(&self, flags: &FlagSet) -> Result<(), RuleError> {
        for (flag, perms) in &self.dir_check {
            if !flags.contains(flag) {
                continue;
            }
            let path = dir_value(flags, flag)?;
            if !path.is_dir() {
                return Err(RuleError::NoSuchDirectory {
                    flag: flag.to_string(),
                    path: path.display().to_string(),
                });
            }
            check_access(flag, path, *perms)?;
        }
        Ok(())
    }

    pub fn create_dirs(&self, flags: &FlagSet) -> Result<(), RuleError> {
        for (flag, perms) in &self.dir_create {
            if !flags.contains(flag) {
                continue;
            }
            let path = dir_value(flags, flag)?;
            if !path.is_dir() {
                info!("Creating directory {}", path.display());
                DirBuilder::new()
                    .recursive(true)
                    .mode(dir_mode(*perms))
                    .create(path)
                    .map_err(|e| RuleError::CreateFailed {
                        flag: flag.to_string(),
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
            }
            check_access(flag, path, *perms)?;
        }
        Ok(())
    }
}

fn dir_value<'a>(flags: &'a FlagSet, flag: &str) -> Result<&'a Path, RuleError> {
    flags
        .value(flag)
        .filter(|value| !value.is_empty())
        .map(Path::new)
        .ok_or_else(|| RuleError::MissingDirectory {
            flag: flag.to_string(),
        })
}

/// Owner gets the full level; group and other get its read/execute bits.
fn dir_mode(perms: u32) -> u32 {
    let perms = perms & 0o7;
    (perms << 6) | ((perms & 0o5) << 3) | (perms & 0o5)
}

fn check_access(flag: &str, path: &Path, perms: u32) -> Result<(), RuleError> {
    if has_access(path, perms) {
        Ok(())
    } else {
        Err(RuleError::Permission {
            flag: flag.to_string(),
            path: path.display().to_string(),
            perms,
        })
    }
}

/// Whether the current user has `perms` access, where the digit uses the
/// same bit values as `R_OK`/`W_OK`/`X_OK`.
pub fn has_access(path: &Path, perms: u32) -> bool {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    let mode = (perms & 0o7) as libc::c_int;
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(c_path.as_ptr(), mode) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn program_rules() -> Rules {
        Rules {
            required: vec!["-c", "-d", "-o"],
            xor_required: vec![vec!["-A", "-M", "-E"]],
            xor_optional: vec![("-l", "-b")],
            conditional: vec![
                ("-r", vec!["-b"]),
                ("-t", vec!["-b"]),
                ("-s", vec!["-e"]),
                ("-E", vec!["-b", "-t"]),
            ],
            dir_check: Vec::new(),
            dir_create: Vec::new(),
        }
    }

    fn base() -> FlagSet {
        FlagSet::new()
            .with_value("-c", "mongo")
            .with_value("-d", "config")
            .with_value("-o", "/tmp/dump")
    }

    #[test]
    fn test_valid_mongodump_flags() {
        let flags = base().with_switch("-M").with_switch("-z");
        assert_eq!(program_rules().check(&flags), Ok(()));
    }

    #[rstest]
    #[case("-c")]
    #[case("-d")]
    #[case("-o")]
    fn test_missing_required(#[case] missing: &str) {
        let mut flags = FlagSet::new().with_switch("-M");
        for (name, value) in [("-c", "mongo"), ("-d", "config"), ("-o", "/tmp")] {
            if name != missing {
                flags = flags.with_value(name, value);
            }
        }

        assert_eq!(
            program_rules().check(&flags),
            Err(RuleError::MissingRequired {
                flag: missing.to_string()
            })
        );
    }

    #[rstest]
    #[case(&["-A", "-M"])]
    #[case(&["-M", "-E"])]
    #[case(&["-A", "-E"])]
    #[case(&["-A", "-M", "-E"])]
    fn test_xor_rejects_multiple_actions(#[case] actions: &[&str]) {
        let mut flags = base().with_value("-b", "db").with_value("-t", "coll");
        for action in actions {
            flags = flags.with_switch(action);
        }

        assert!(matches!(
            program_rules().check(&flags),
            Err(RuleError::XorMany { .. })
        ));
    }

    #[test]
    fn test_xor_requires_one_action() {
        assert!(matches!(
            program_rules().check(&base()),
            Err(RuleError::XorNone { .. })
        ));
    }

    #[test]
    fn test_oplog_excludes_database() {
        let flags = base()
            .with_switch("-M")
            .with_switch("-l")
            .with_value("-b", "db");

        assert_eq!(
            program_rules().check(&flags),
            Err(RuleError::Excluded {
                flag: "-l".into(),
                excluded: "-b".into()
            })
        );
    }

    #[rstest]
    #[case("-r", "-b")]
    #[case("-t", "-b")]
    fn test_conditional_requires_database(#[case] flag: &str, #[case] needed: &str) {
        let flags = base().with_switch("-M").with_value(flag, "x");

        assert_eq!(
            program_rules().check(&flags),
            Err(RuleError::MissingConditional {
                flag: flag.into(),
                required: needed.into()
            })
        );
    }

    #[test]
    fn test_subject_requires_email() {
        let flags = base().with_switch("-M").with_values("-s", ["Nightly"]);

        assert!(matches!(
            program_rules().check(&flags),
            Err(RuleError::MissingConditional { .. })
        ));
    }

    #[test]
    fn test_export_requires_database_and_collection() {
        let flags = base().with_switch("-E").with_value("-b", "db");

        assert_eq!(
            program_rules().check(&flags),
            Err(RuleError::MissingConditional {
                flag: "-E".into(),
                required: "-t".into()
            })
        );
    }

    #[test]
    fn test_dir_check() {
        let temp_dir = TempDir::new().unwrap();
        let rules = Rules {
            dir_check: vec![("-d", 5)],
            ..Rules::default()
        };

        let ok = FlagSet::new().with_value("-d", temp_dir.path().to_str().unwrap());
        assert_eq!(rules.check(&ok), Ok(()));

        let missing = temp_dir.path().join("nope");
        let bad = FlagSet::new().with_value("-d", missing.to_str().unwrap());
        assert!(matches!(
            rules.check(&bad),
            Err(RuleError::NoSuchDirectory { .. })
        ));

        // Absent optional flag is not checked.
        assert_eq!(rules.check(&FlagSet::new()), Ok(()));
    }

    #[test]
    fn test_dir_create() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("dumps").join("nightly");
        let rules = Rules {
            dir_create: vec![("-o", 7)],
            ..Rules::default()
        };

        let flags = FlagSet::new().with_value("-o", target.to_str().unwrap());
        assert_eq!(rules.check(&flags), Ok(()));
        assert!(target.is_dir());
    }

    #[test]
    fn test_dir_mode() {
        assert_eq!(dir_mode(7), 0o755);
        assert_eq!(dir_mode(5), 0o555);
    }

    #[test]
    fn test_rule_classes_run_in_order() {
        // Both required and xor are violated; required is reported first.
        let flags = FlagSet::new().with_switch("-A").with_switch("-M");
        assert!(matches!(
            program_rules().check(&flags),
            Err(RuleError::MissingRequired { .. })
        ));
    }
}
