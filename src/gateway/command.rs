//! Shape check of the client-requested command.
//!
//! Nothing here touches the filesystem, the network or the log: a command
//! that fails these checks never reaches any of them.

use std::ffi::OsStr;

use thiserror::Error;

/// Environment variable through which sshd hands over the client's command.
pub const SSH_ORIGINAL_COMMAND: &str = "SSH_ORIGINAL_COMMAND";

/// Smallest token count of an rsync server invocation:
/// program, `--server`, flags, `.`, destination.
pub const MIN_TOKENS: usize = 5;

/// Why a command was rejected before policy evaluation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// No command was supplied (interactive login attempt).
    #[error("no command supplied")]
    Missing,

    /// The command is not valid UTF-8.
    #[error("command is not valid UTF-8")]
    NotUnicode,

    /// Too few tokens for an rsync server invocation.
    #[error("command has {found} token(s), at least {MIN_TOKENS} required")]
    TooShort {
        /// Number of tokens found.
        found: usize,
    },

    /// The first token names some other program.
    #[error("command runs '{program}', only '{expected}' is permitted")]
    WrongProgram {
        /// First token as supplied.
        program: String,
        /// Configured program name.
        expected: String,
    },
}

/// A command that passed the shape check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    raw: String,
    tokens: Vec<String>,
}

impl Invocation {
    /// The command exactly as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whitespace-separated tokens, never fewer than [`MIN_TOKENS`].
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The candidate destination (last token).
    pub fn destination(&self) -> &str {
        self.tokens.last().map(String::as_str).unwrap_or_default()
    }
}

/// Validates raw commands against the permitted program.
#[derive(Debug, Clone)]
pub struct CommandParser {
    program_name: String,
}

impl CommandParser {
    /// Parser accepting commands whose first token is named `program_name`.
    pub fn new(program_name: impl Into<String>) -> Self {
        Self {
            program_name: program_name.into(),
        }
    }

    /// Check the raw value of [`SSH_ORIGINAL_COMMAND`].
    pub fn parse_env(&self, raw: Option<&OsStr>) -> Result<Invocation, CommandError> {
        let raw = raw.ok_or(CommandError::Missing)?;
        let raw = raw.to_str().ok_or(CommandError::NotUnicode)?;
        self.parse(raw)
    }

    /// Check a command string.
    pub fn parse(&self, raw: &str) -> Result<Invocation, CommandError> {
        let tokens: Vec<String> = raw.split_whitespace().map(str::to_string).collect();

        if tokens.len() < MIN_TOKENS {
            return Err(CommandError::TooShort {
                found: tokens.len(),
            });
        }

        let program = &tokens[0];
        let file_name = program.rsplit('/').next().unwrap_or(program);
        if file_name != self.program_name {
            return Err(CommandError::WrongProgram {
                program: program.clone(),
                expected: self.program_name.clone(),
            });
        }

        Ok(Invocation {
            raw: raw.to_string(),
            tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> CommandParser {
        CommandParser::new("rsync")
    }

    #[test]
    fn test_parse_rsync_server_command() {
        let inv = parser()
            .parse("rsync --server -logDtpre.iLsfxC . /srv/projects/p1/sub")
            .unwrap();

        assert_eq!(inv.tokens().len(), 5);
        assert_eq!(inv.tokens()[2], "-logDtpre.iLsfxC");
        assert_eq!(inv.destination(), "/srv/projects/p1/sub");
        assert_eq!(inv.raw(), "rsync --server -logDtpre.iLsfxC . /srv/projects/p1/sub");
    }

    #[test]
    fn test_absolute_program_path_accepted() {
        let inv = parser().parse("/usr/bin/rsync --server -e.Lsfx . dst").unwrap();
        assert_eq!(inv.tokens()[0], "/usr/bin/rsync");
    }

    #[test]
    fn test_extra_whitespace_collapses() {
        let inv = parser()
            .parse("  rsync\t--server   -vlogDtpr . \n notes ")
            .unwrap();
        assert_eq!(inv.tokens(), ["rsync", "--server", "-vlogDtpr", ".", "notes"]);
    }

    #[test]
    fn test_too_short() {
        assert_eq!(
            parser().parse("ls -la"),
            Err(CommandError::TooShort { found: 2 })
        );
        assert_eq!(
            parser().parse("rsync --server . dst"),
            Err(CommandError::TooShort { found: 4 })
        );
        assert_eq!(parser().parse(""), Err(CommandError::TooShort { found: 0 }));
    }

    #[test]
    fn test_wrong_program() {
        for cmd in [
            "bash -c id ; rsync x",
            "notrsync --server -e . dst",
            "rsync-evil --server -e . dst",
            "/tmp/rsync/sh --server -e . dst",
        ] {
            assert!(
                matches!(parser().parse(cmd), Err(CommandError::WrongProgram { .. })),
                "accepted {cmd:?}"
            );
        }
    }

    #[test]
    fn test_custom_program_name() {
        let parser = CommandParser::new("openrsync");
        assert!(parser.parse("openrsync --server -e . dst").is_ok());
        assert!(parser.parse("rsync --server -e . dst").is_err());
    }

    #[test]
    fn test_parse_env_missing() {
        assert_eq!(parser().parse_env(None), Err(CommandError::Missing));
    }

    #[test]
    fn test_parse_env_not_unicode() {
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(b"rsync --server -e . /srv/\xff");
        assert_eq!(parser().parse_env(Some(raw)), Err(CommandError::NotUnicode));
    }
}
