//! Interactive session as a pure state machine.
//!
//! The wizard never touches the terminal: callers ask it for the current
//! prompt, feed it one line of input and act on the returned [`Outcome`].

use crate::error::SpecError;
use crate::forward::{TunnelKind, TunnelSpec};
use crate::sshargs::{self, ConnectionConfig};
use crate::store::PersistedConfig;

const HELP_TOKENS: [&str; 3] = ["help", "?", "ayuda"];
const CLEAR_TOKEN: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Mode,
    Host,
    Forward,
    User,
    Port,
    Identity,
    Pty,
    Keepalive,
    ExtraArgs,
    ExitOnFailure,
    Background,
    Command,
    Confirm,
}

impl Step {
    fn next(self) -> Step {
        match self {
            Step::Mode => Step::Host,
            Step::Host => Step::Forward,
            Step::Forward => Step::User,
            Step::User => Step::Port,
            Step::Port => Step::Identity,
            Step::Identity => Step::Pty,
            Step::Pty => Step::Keepalive,
            Step::Keepalive => Step::ExtraArgs,
            Step::ExtraArgs => Step::ExitOnFailure,
            Step::ExitOnFailure => Step::Background,
            Step::Background => Step::Command,
            Step::Command | Step::Confirm => Step::Confirm,
        }
    }
}

/// A confirmed interactive session, ready to persist and launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub connection: ConnectionConfig,
    pub tunnel: TunnelSpec,
}

impl Session {
    pub fn mode(&self) -> TunnelKind {
        self.tunnel.kind
    }

    pub fn ssh_args(&self) -> Result<Vec<String>, SpecError> {
        sshargs::assemble(self.mode(), &self.connection, &self.tunnel)
    }

    pub fn to_persisted(&self) -> PersistedConfig {
        PersistedConfig {
            connection: self.connection.clone(),
            tunnel: Some(self.tunnel.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Advanced,
    Help(String),
    Invalid(String),
    Finished(Session),
    Cancelled,
}

pub struct Wizard {
    step: Step,
    mode: TunnelKind,
    saved_tunnel: Option<TunnelSpec>,
    tunnel: Option<TunnelSpec>,
    connection: ConnectionConfig,
}

impl Wizard {
    /// Starts a session whose defaults come from `saved`.
    pub fn new(saved: PersistedConfig) -> Self {
        let mode = saved
            .tunnel
            .as_ref()
            .map(|t| t.kind)
            .unwrap_or(TunnelKind::Local);
        Self {
            step: Step::Mode,
            mode,
            saved_tunnel: saved.tunnel,
            tunnel: None,
            connection: saved.connection,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Saved forwarding rule, offered only when it fits the chosen mode.
    fn forward_default(&self) -> Option<&TunnelSpec> {
        self.saved_tunnel.as_ref().filter(|t| t.kind == self.mode)
    }

    pub fn prompt(&self) -> String {
        let c = &self.connection;
        match self.step {
            Step::Mode => format!("Mode (local/remoto/socks) [{}]", self.mode),
            Step::Host => with_default("Remote host", Some(c.host.as_str())),
            Step::Forward => with_default(
                &format!("Forwarding {}", self.mode.expected_format()),
                self.forward_default().map(|t| t.to_string()).as_deref(),
            ),
            Step::User => with_default("SSH user", c.user.as_deref()),
            Step::Port => format!("SSH port [{}]", c.port),
            Step::Identity => with_default("Private key path", c.identity.as_deref()),
            Step::Pty => yes_no("Disable pseudo-TTY", !c.pty),
            Step::Keepalive => match c.keepalive {
                Some(secs) => format!("Keepalive interval in seconds, 0 to disable [{secs}]"),
                None => "Keepalive interval in seconds, 0 to disable [off]".to_string(),
            },
            Step::ExtraArgs => with_default(
                "Extra ssh arguments, comma-separated",
                Some(c.extra_args.join(",").as_str()),
            ),
            Step::ExitOnFailure => yes_no(
                "Exit if the forward cannot be set up",
                c.exit_on_forward_failure,
            ),
            Step::Background => yes_no("Run in background", c.background),
            Step::Command => with_default("Remote command (empty for -N)", c.command.as_deref()),
            Step::Confirm => yes_no("Launch this tunnel", true),
        }
    }

    pub fn help(&self) -> String {
        match self.step {
            Step::Mode => "Pick the tunnel type:\n\
                - local: opens a local port and forwards it to a destination reachable from the server\n\
                - remoto: opens a port on the server and forwards it to a destination reachable from this machine\n\
                - socks: opens a local SOCKS proxy"
                .to_string(),
            Step::Host => "IP address or DNS name of the machine you connect to over SSH.".to_string(),
            Step::Forward => format!(
                "Format: {}\nExample: {}",
                self.mode.expected_format(),
                self.mode.example()
            ),
            Step::User => format!(
                "Login user on the SSH server (e.g. ubuntu, debian). Leave empty for ssh's default, `{CLEAR_TOKEN}` to forget the saved one."
            ),
            Step::Port => "Port of the SSH service on the server (usually 22).".to_string(),
            Step::Identity => format!(
                "Path to your private key (e.g. ~/.ssh/id_ed25519). Leave empty if you use an agent, `{CLEAR_TOKEN}` to forget the saved one."
            ),
            Step::Pty => "Tunnels rarely need a terminal; answer y to pass -T.".to_string(),
            Step::Keepalive => {
                "Seconds between server-alive probes that keep the session open (e.g. 30); 0 turns them off."
                    .to_string()
            }
            Step::ExtraArgs => format!(
                "Optional extra ssh options, comma-separated. Example: -v,-o,StrictHostKeyChecking=no. `{CLEAR_TOKEN}` clears them."
            ),
            Step::ExitOnFailure => {
                "Answer y to make ssh exit when the port forward cannot be established (ExitOnForwardFailure=yes)."
                    .to_string()
            }
            Step::Background => "Answer y to leave the tunnel running in the background (ssh -f).".to_string(),
            Step::Command => format!(
                "Optional command to run on the server. Leave empty to only hold the tunnel (-N), `{CLEAR_TOKEN}` to forget the saved one."
            ),
            Step::Confirm => "Answer y to save these settings and start ssh, n to quit without changes.".to_string(),
        }
    }

    /// Command line the session would run, once every field is collected.
    pub fn preview(&self) -> Option<Result<Vec<String>, SpecError>> {
        let tunnel = self.tunnel.as_ref()?;
        if self.step != Step::Confirm {
            return None;
        }
        Some(sshargs::assemble(self.mode, &self.connection, tunnel))
    }

    pub fn advance(&mut self, input: &str) -> Outcome {
        let input = input.trim();
        if is_help(input) {
            return Outcome::Help(self.help());
        }
        match self.accept(input) {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                self.step = self.step.next();
                Outcome::Advanced
            }
            Err(message) => Outcome::Invalid(message),
        }
    }

    fn accept(&mut self, input: &str) -> Result<Option<Outcome>, String> {
        let c = &mut self.connection;
        match self.step {
            Step::Mode => {
                if !input.is_empty() {
                    self.mode = input.parse::<TunnelKind>().map_err(|e| e.to_string())?;
                }
            }
            Step::Host => {
                if !input.is_empty() {
                    c.host = input.to_string();
                } else if c.host.trim().is_empty() {
                    return Err("Host is required.".to_string());
                }
            }
            Step::Forward => {
                let spec = if input.is_empty() {
                    self.forward_default()
                        .cloned()
                        .ok_or_else(|| "Forwarding is required.".to_string())?
                } else {
                    TunnelSpec::parse(self.mode, input).map_err(|e| e.to_string())?
                };
                self.tunnel = Some(spec);
            }
            Step::User => optional_text(&mut c.user, input),
            Step::Port => {
                let token = if input.is_empty() {
                    c.port.to_string()
                } else {
                    input.to_string()
                };
                c.port = match token.parse::<u16>() {
                    Ok(port) if port > 0 => port,
                    _ => return Err(format!("Invalid port `{token}`; use 1-65535.")),
                };
            }
            Step::Identity => optional_text(&mut c.identity, input),
            Step::Pty => c.pty = !parse_yes_no(input, !c.pty)?,
            Step::Keepalive => {
                if input == CLEAR_TOKEN {
                    c.keepalive = None;
                } else if !input.is_empty() {
                    let secs = input.parse::<u32>().map_err(|_| {
                        format!("Invalid interval `{input}`; use a whole number of seconds.")
                    })?;
                    c.keepalive = (secs > 0).then_some(secs);
                }
            }
            Step::ExtraArgs => {
                if input == CLEAR_TOKEN {
                    c.extra_args.clear();
                } else if !input.is_empty() {
                    c.extra_args = input
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                }
            }
            Step::ExitOnFailure => {
                c.exit_on_forward_failure = parse_yes_no(input, c.exit_on_forward_failure)?
            }
            Step::Background => c.background = parse_yes_no(input, c.background)?,
            Step::Command => optional_text(&mut c.command, input),
            Step::Confirm => {
                if !parse_yes_no(input, true)? {
                    return Ok(Some(Outcome::Cancelled));
                }
                let session = Session {
                    connection: self.connection.clone(),
                    tunnel: self
                        .tunnel
                        .clone()
                        .ok_or_else(|| "Forwarding is required.".to_string())?,
                };
                session.ssh_args().map_err(|e| e.to_string())?;
                return Ok(Some(Outcome::Finished(session)));
            }
        }
        Ok(None)
    }
}

pub fn is_help(input: &str) -> bool {
    let input = input.trim();
    HELP_TOKENS.iter().any(|t| t.eq_ignore_ascii_case(input))
}

fn with_default(label: &str, default: Option<&str>) -> String {
    match default.filter(|d| !d.is_empty()) {
        Some(d) => format!("{label} [{d}]"),
        None => label.to_string(),
    }
}

fn yes_no(label: &str, default: bool) -> String {
    format!("{label} [y/n] ({})", if default { "y" } else { "n" })
}

fn optional_text(field: &mut Option<String>, input: &str) {
    if input == CLEAR_TOKEN {
        *field = None;
    } else if !input.is_empty() {
        *field = Some(input.to_string());
    }
}

fn parse_yes_no(input: &str, default: bool) -> Result<bool, String> {
    match input.to_lowercase().as_str() {
        "" => Ok(default),
        "y" | "yes" | "s" | "si" | "sí" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err(format!("Invalid answer `{input}`; use y or n.")),
    }
}
