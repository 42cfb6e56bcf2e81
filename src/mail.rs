//! Mail composition and submission.
//!
//! The original shelled out via `popen(MAILCOMMAND, "w")` and wrote RFC-822
//! headers by hand into the pipe. We keep that shape — a piped subprocess,
//! not an SMTP client library — but go through `std::process::Command`
//! with a captured stdin instead of raw `popen`.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use chrono::Local;

use crate::error::WorkerError;

/// Mirrors the original's `MAIL_TRANSPORT`.
const MAIL_TRANSPORT: &str = "/usr/sbin/sendmail";

/// Mirrors `MAIL_OPTIONS`: act as `gidget`, don't generate a `From ` envelope
/// line, mail errors back to sender, ignore dots on their own line, and
/// read recipients from the headers we provide.
const MAIL_ARGS: &[&str] = &["-Fgidget", "-odi", "-oem", "-oi", "-t"];

/// Everything the worker has learned about one finished trick, used to
/// compose the notification mail body. Exit status is deliberately not
/// part of this: the mail is sent as soon as the grandchild's output pipe
/// reaches EOF, before `waitpid` resolves the exit status (§4.6 steps 9
/// and 10 run in that order).
pub struct MailContext<'a> {
    pub recipient: &'a str,
    pub user: &'a str,
    pub triggering_path: &'a Path,
    pub command: &'a str,
    pub shell: &'a Path,
    pub watch_id: u32,
    pub mask: u32,
    pub output: &'a [u8],
}

/// Compose and submit a mail for a completed trick. No-op (returns `Ok`
/// without spawning anything) when `output` is empty, matching the
/// original's "only mail when there's something to say" behavior.
pub fn notify(ctx: &MailContext) -> Result<(), WorkerError> {
    if ctx.output.is_empty() {
        return Ok(());
    }

    let mut child = Command::new(MAIL_TRANSPORT)
        .args(MAIL_ARGS)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(WorkerError::Mail)?;

    let mut stdin = child.stdin.take().expect("piped stdin");
    let body = compose(ctx);
    stdin.write_all(body.as_bytes()).map_err(WorkerError::Mail)?;
    drop(stdin);

    child.wait().map_err(WorkerError::Mail)?;
    Ok(())
}

fn compose(ctx: &MailContext) -> String {
    let date = Local::now().to_rfc2822();
    let mut body = String::new();
    body.push_str(&format!("From: {} (gidget)\n", ctx.user));
    body.push_str(&format!("To: {}\n", ctx.recipient));
    body.push_str(&format!(
        "Subject: gidget event: {}\n",
        ctx.triggering_path.display()
    ));
    body.push_str(&format!("Date: {date}\n"));
    body.push_str("Auto-Submitted: auto-generated\n");
    body.push_str(&format!("X-gidget-object: {}\n", ctx.triggering_path.display()));
    body.push_str(&format!("X-gidget-watch: {}\n", ctx.watch_id));
    body.push_str(&format!("X-gidget-mask: {}\n", ctx.mask));
    body.push('\n');
    body.push_str(&format!("{} -c {}:\n\n", ctx.shell.display(), ctx.command));
    body.push_str(&String::from_utf8_lossy(ctx.output));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn skips_submission_when_output_is_empty() {
        let ctx = MailContext {
            recipient: "root@localhost",
            user: "nobody",
            triggering_path: &PathBuf::from("/tmp/x"),
            command: "/bin/true",
            shell: &PathBuf::from("/bin/sh"),
            watch_id: 1,
            mask: 0x100,
            output: &[],
        };
        assert!(notify(&ctx).is_ok());
    }

    #[test]
    fn composed_body_carries_required_headers() {
        let ctx = MailContext {
            recipient: "root@localhost",
            user: "nobody",
            triggering_path: &PathBuf::from("/tmp/x"),
            command: "/bin/true",
            shell: &PathBuf::from("/bin/sh"),
            watch_id: 3,
            mask: 0x100,
            output: b"boom",
        };
        let body = compose(&ctx);
        assert!(body.starts_with("From: nobody (gidget)\n"));
        assert!(body.contains("To: root@localhost\n"));
        assert!(body.contains("Subject: gidget event: /tmp/x"));
        assert!(body.contains("X-gidget-watch: 3\n"));
        assert!(body.contains("X-gidget-mask: 256\n"));
        assert!(body.ends_with("boom"));
    }
}
