//! Command-line argument parsing.

use anyhow::{bail, Context, Result};

use stitchdesk_core::preferences::{ColorTheme, PreferencePatch, ThemeMode};

pub const USAGE: &str = "\
Usage: stitchdesk <command>

Commands:
  token inspect <token>            Decode a token and report its expiry
  prefs show                       Print the stored preferences
  prefs theme <light|dark|system>  Change the theme mode
  prefs color <color>              Change the color theme
  prefs set <key>=<value>...       Update settings and save them
  prefs reset                      Restore default settings
  session login <access> [refresh] Store session tokens
  session status                   Report the stored session
  session logout                   End the session
  session watch                    Monitor the session until it ends
  config show                      Print the effective configuration
  config init                      Write the effective configuration to the config file";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    TokenInspect { token: String },
    PrefsShow,
    PrefsTheme(ThemeMode),
    PrefsColor(ColorTheme),
    PrefsSet(PreferencePatch),
    PrefsReset,
    SessionLogin {
        access: String,
        refresh: Option<String>,
    },
    SessionStatus,
    SessionLogout,
    SessionWatch,
    ConfigShow,
    ConfigInit,
}

/// Parse arguments (without the program name) into a command.
pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Command> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();

    let command = match args.as_slice() {
        [] | ["help"] | ["--help"] | ["-h"] => Command::Help,

        ["token", "inspect", token] => Command::TokenInspect {
            token: token.to_string(),
        },

        ["prefs", "show"] => Command::PrefsShow,
        ["prefs", "theme", mode] => Command::PrefsTheme(mode.parse()?),
        ["prefs", "color", color] => Command::PrefsColor(color.parse()?),
        ["prefs", "set", assignments @ ..] if !assignments.is_empty() => Command::PrefsSet(
            PreferencePatch::from_assignments(assignments).context("Invalid settings")?,
        ),
        ["prefs", "reset"] => Command::PrefsReset,

        ["session", "login", access] => Command::SessionLogin {
            access: access.to_string(),
            refresh: None,
        },
        ["session", "login", access, refresh] => Command::SessionLogin {
            access: access.to_string(),
            refresh: Some(refresh.to_string()),
        },
        ["session", "status"] => Command::SessionStatus,
        ["session", "logout"] => Command::SessionLogout,
        ["session", "watch"] => Command::SessionWatch,

        ["config", "show"] => Command::ConfigShow,
        ["config", "init"] => Command::ConfigInit,

        _ => bail!("Unrecognized command: {}\n\n{}", args.join(" "), USAGE),
    };
    Ok(command)
}
