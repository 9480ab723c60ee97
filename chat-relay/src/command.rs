//! Parsing of decoded client lines into chat commands.
//!
//! Grammar, applied after the line has been run through the codec:
//! - `/pm <target> <text...>` sends a private message. Only the first two
//!   single spaces delimit; `<text...>` keeps any further spaces.
//! - `/quit` (any case) ends the session.
//! - Anything else is broadcast verbatim.
//!
//! The sign-off [`PLAIN_QUIT`] arrives unencoded and is matched on the wire
//! line before decoding, so it never reaches [`Command::parse`].

use anyhow::{Result, bail};

const PM_PREFIX: &str = "/pm";

/// Raw sign-off line sent without obfuscation.
pub const PLAIN_QUIT: &str = "QUIT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Broadcast { text: String },
    Private { target: String, text: String },
    Quit,
}

impl Command {
    /// Parses one decoded line.
    ///
    /// # Errors
    /// Only a private message missing its target or text is rejected. The
    /// caller drops such lines without telling the sender.
    pub fn parse(line: &str) -> Result<Self> {
        if line.eq_ignore_ascii_case("/quit") {
            return Ok(Command::Quit);
        }

        if !is_private_message(line) {
            return Ok(Command::Broadcast {
                text: line.to_string(),
            });
        }

        let parts: Vec<&str> = line.splitn(3, ' ').collect();
        match parts.as_slice() {
            [_, target, text] => Ok(Command::Private {
                target: target.to_string(),
                text: text.to_string(),
            }),
            _ => bail!("private message requires a target and text: /pm <name> <text>"),
        }
    }
}

fn is_private_message(line: &str) -> bool {
    line == PM_PREFIX
        || line
            .strip_prefix(PM_PREFIX)
            .is_some_and(|rest| rest.starts_with(' '))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private(target: &str, text: &str) -> Command {
        Command::Private {
            target: target.into(),
            text: text.into(),
        }
    }

    #[test]
    fn plain_text_is_broadcast() {
        assert_eq!(
            Command::parse("hello everyone").unwrap(),
            Command::Broadcast {
                text: "hello everyone".into()
            }
        );
        assert_eq!(
            Command::parse("").unwrap(),
            Command::Broadcast { text: "".into() }
        );
    }

    #[test]
    fn pm_keeps_spaces_in_text() {
        assert_eq!(
            Command::parse("/pm bob hello there").unwrap(),
            private("bob", "hello there")
        );
        assert_eq!(
            Command::parse("/pm bob  spaced  out ").unwrap(),
            private("bob", " spaced  out ")
        );
    }

    #[test]
    fn pm_with_empty_text_is_accepted() {
        assert_eq!(Command::parse("/pm bob ").unwrap(), private("bob", ""));
    }

    #[test]
    fn pm_splits_on_single_spaces() {
        // Double space leaves an empty target, which simply matches nobody.
        assert_eq!(
            Command::parse("/pm  bob hi").unwrap(),
            private("", "bob hi")
        );
    }

    #[test]
    fn malformed_pm_is_rejected() {
        assert!(Command::parse("/pm").is_err());
        assert!(Command::parse("/pm bob").is_err());
    }

    #[test]
    fn pm_prefix_without_space_is_broadcast() {
        assert_eq!(
            Command::parse("/pmbob hi").unwrap(),
            Command::Broadcast {
                text: "/pmbob hi".into()
            }
        );
    }

    #[test]
    fn quit_variants() {
        assert_eq!(Command::parse("/quit").unwrap(), Command::Quit);
        assert_eq!(Command::parse("/QUIT").unwrap(), Command::Quit);
        assert!(matches!(
            Command::parse("QUIT"),
            Ok(Command::Broadcast { .. })
        ));
        assert!(matches!(
            Command::parse("quit"),
            Ok(Command::Broadcast { .. })
        ));
    }
}
