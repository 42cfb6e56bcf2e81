//! Configuration file loader.
//!
//! Each non-comment, non-blank line describes one watch: five
//! colon-separated fields, `path:mask:command:user:mail`. `#` terminates a
//! line (everything after it, including on an otherwise-blank line, is a
//! comment). Fields are walked byte-by-byte rather than as `char`s, since
//! the grammar treats the line as Latin-1-ish text the way the original
//! implementation's `char`-indexed parser did.

use std::fs;
use std::path::{Path, PathBuf};

use nix::unistd::{pathconf, PathconfVar};

use crate::error::{ConfigError, EngineError};

/// Conservative fallback when the filesystem hosting a watched path
/// doesn't report `NAME_MAX` (not all filesystems do).
const DEFAULT_MAX_NAME_LEN: usize = 255;

const MAX_COMMAND_LEN: usize = 256;
const MAX_USER_LEN: usize = 32;
const MAX_MAIL_LEN: usize = 36;

/// One accepted line from the config file, not yet registered with the
/// kernel. `config::load` hands a `Vec<ParsedWatch>` to the caller, which
/// is responsible for installing each with the kernel adapter and handing
/// the result to the registry (config has no business knowing about
/// watch descriptors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedWatch {
    pub path: PathBuf,
    pub event_mask: u32,
    pub command: String,
    pub user: String,
    pub mail_recipient: String,
}

/// Load and validate a config file. Malformed lines are logged and
/// skipped (never fatal); only the file-open/read itself is fatal to
/// startup.
pub fn load(path: &Path) -> Result<Vec<ParsedWatch>, EngineError> {
    let contents = fs::read_to_string(path).map_err(|source| EngineError::ConfigOpen {
        path: path.to_path_buf(),
        source,
    })?;

    let mut watches = Vec::new();
    for (index, raw_line) in contents.lines().enumerate() {
        let line_no = index + 1;
        match parse_line(raw_line, line_no) {
            Ok(Some(watch)) => watches.push(watch),
            Ok(None) => {} // blank or fully-commented line
            Err(e) => log::warn!("skipping {path:?}: {e}"),
        }
    }
    Ok(watches)
}

fn parse_line(raw_line: &str, line_no: usize) -> Result<Option<ParsedWatch>, ConfigError> {
    let bytes = raw_line.as_bytes();
    let mut content_end = bytes.len();

    for (i, &b) in bytes.iter().enumerate() {
        if b == b'#' {
            content_end = i;
            break;
        }
        if b == b'\'' {
            return Err(ConfigError::IllegalChar { line: line_no, position: i });
        }
        if b < 0x20 || b == 0x7f {
            return Err(ConfigError::InvisibleChar { line: line_no, position: i });
        }
    }

    let content = std::str::from_utf8(&bytes[..content_end])
        .unwrap_or("")
        .trim();
    if content.is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = content.split(':').collect();
    if fields.len() < 5 {
        return Err(ConfigError::TooFewFields { line: line_no, found: fields.len() });
    }
    if fields.len() > 5 {
        return Err(ConfigError::TooManyFields {
            line: line_no,
            excess: fields[5..].iter().map(|s| s.to_string()).collect(),
        });
    }

    let path = PathBuf::from(fields[0]);
    let max_name_len = max_name_len_for(&path, line_no)?;

    let mask_field = fields[1];
    let event_mask = parse_mask(mask_field, line_no)?;

    let command = fields[2];
    if command.len() > MAX_COMMAND_LEN {
        return Err(ConfigError::CommandTooLong {
            line: line_no,
            len: command.len(),
            max: MAX_COMMAND_LEN,
        });
    }

    let user = fields[3];
    if user.len() > MAX_USER_LEN {
        return Err(ConfigError::UserTooLong {
            line: line_no,
            len: user.len(),
            max: MAX_USER_LEN,
        });
    }

    let mail = fields[4];
    if mail.len() > MAX_MAIL_LEN {
        return Err(ConfigError::MailTooLong {
            line: line_no,
            len: mail.len(),
            max: MAX_MAIL_LEN,
        });
    }

    log::trace!("line {line_no}: max name length for {path:?} is {max_name_len}");

    Ok(Some(ParsedWatch {
        path,
        event_mask,
        command: command.to_string(),
        user: user.to_string(),
        mail_recipient: mail.to_string(),
    }))
}

fn parse_mask(field: &str, line_no: usize) -> Result<u32, ConfigError> {
    let value = field
        .parse::<u32>()
        .map_err(|_| ConfigError::BadMask { line: line_no, value: field.to_string() })?;

    if value == 0 {
        return Err(ConfigError::ZeroMask { line: line_no });
    }
    Ok(value)
}

/// Query the maximum filename length for the filesystem hosting `path`.
/// The query doubles as an existence hint: a filesystem that can't report
/// `NAME_MAX` at all (`Ok(None)`) just means the platform doesn't support
/// the query, so the default is used, but the query itself failing
/// (`Err`) means `path` couldn't be resolved, and the line is rejected —
/// mirrors the original's `badPony=1` on `pathconf() <= 0`.
fn max_name_len_for(path: &Path, line_no: usize) -> Result<usize, ConfigError> {
    match pathconf(path, PathconfVar::NAME_MAX) {
        Ok(Some(value)) => Ok(value as usize),
        Ok(None) => Ok(DEFAULT_MAX_NAME_LEN),
        Err(source) => Err(ConfigError::UnresolvablePath {
            line: line_no,
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_only_lines_are_skipped() {
        assert_eq!(parse_line("", 1).unwrap(), None);
        assert_eq!(parse_line("   ", 2).unwrap(), None);
        assert_eq!(parse_line("# just a comment", 3).unwrap(), None);
    }

    #[test]
    fn apostrophe_is_rejected() {
        let err = parse_line("/tmp:256:/bin/true:nobody:root's mail", 1).unwrap_err();
        assert!(matches!(err, ConfigError::IllegalChar { .. }));
    }

    #[test]
    fn too_few_fields_is_rejected() {
        let err = parse_line("/tmp:256:/bin/true", 1).unwrap_err();
        assert!(matches!(err, ConfigError::TooFewFields { found: 3, .. }));
    }

    #[test]
    fn too_many_fields_is_rejected() {
        let err = parse_line("/tmp:256:/bin/true:nobody:root@localhost:extra", 1).unwrap_err();
        assert!(matches!(err, ConfigError::TooManyFields { .. }));
    }

    #[test]
    fn zero_mask_is_rejected() {
        let err = parse_line("/tmp:0:/bin/true:nobody:root@localhost", 1).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroMask { .. }));
    }

    #[test]
    fn hex_mask_is_rejected() {
        let err = parse_line("/tmp:0x100:/bin/true:nobody:root@localhost", 1).unwrap_err();
        assert!(matches!(err, ConfigError::BadMask { .. }));
    }

    #[test]
    fn trailing_comment_is_stripped() {
        let watch = parse_line("/tmp:256:/bin/true:nobody:root@localhost  # note", 1)
            .unwrap()
            .expect("accepted line");
        assert_eq!(watch.mail_recipient, "root@localhost");
    }

    #[test]
    fn oversized_command_is_rejected() {
        let long_command = "x".repeat(MAX_COMMAND_LEN + 1);
        let line = format!("/tmp:256:{long_command}:nobody:root@localhost");
        let err = parse_line(&line, 1).unwrap_err();
        assert!(matches!(err, ConfigError::CommandTooLong { .. }));
    }
}
