use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SpecError, UnknownMode};

const LOCAL_FORMAT: &str = "[bind_address:]local_port:dest_host:dest_port";
const REMOTE_FORMAT: &str = "[bind_address:]remote_port:dest_host:dest_port";
const DYNAMIC_FORMAT: &str = "[bind_address:]socks_port";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelKind {
    Local,
    Remote,
    Dynamic,
}

impl TunnelKind {
    pub const ALL: [TunnelKind; 3] = [TunnelKind::Local, TunnelKind::Remote, TunnelKind::Dynamic];

    pub fn ssh_flag(self) -> &'static str {
        match self {
            TunnelKind::Local => "-L",
            TunnelKind::Remote => "-R",
            TunnelKind::Dynamic => "-D",
        }
    }

    /// Subcommand name used on the command line and in prompts.
    pub fn mode_name(self) -> &'static str {
        match self {
            TunnelKind::Local => "local",
            TunnelKind::Remote => "remoto",
            TunnelKind::Dynamic => "socks",
        }
    }

    pub fn expected_format(self) -> &'static str {
        match self {
            TunnelKind::Local => LOCAL_FORMAT,
            TunnelKind::Remote => REMOTE_FORMAT,
            TunnelKind::Dynamic => DYNAMIC_FORMAT,
        }
    }

    pub fn example(self) -> &'static str {
        match self {
            TunnelKind::Local => "8080:127.0.0.1:80 or 0.0.0.0:8080:127.0.0.1:80",
            TunnelKind::Remote => "9090:127.0.0.1:22",
            TunnelKind::Dynamic => "1080 or 127.0.0.1:1080",
        }
    }
}

impl fmt::Display for TunnelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode_name())
    }
}

impl FromStr for TunnelKind {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "l" => Ok(TunnelKind::Local),
            "remoto" | "remote" | "r" => Ok(TunnelKind::Remote),
            "socks" | "dynamic" | "d" => Ok(TunnelKind::Dynamic),
            _ => Err(UnknownMode(s.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

/// One forwarding rule. `destination` is set exactly for local and remote
/// tunnels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelSpec {
    pub kind: TunnelKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,
    pub listen_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
}

impl TunnelSpec {
    pub fn parse(kind: TunnelKind, input: &str) -> Result<TunnelSpec, SpecError> {
        let trimmed = input.trim();
        let expected = kind.expected_format();
        let invalid = || SpecError::InvalidFormat {
            kind,
            input: trimmed.to_string(),
            expected,
        };
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let parts = trimmed.split(':').collect::<Vec<_>>();
        match kind {
            TunnelKind::Local | TunnelKind::Remote => {
                let (bind, rest) = match parts.len() {
                    3 => (None, &parts[..]),
                    4 => (Some(parts[0]), &parts[1..]),
                    _ => return Err(invalid()),
                };
                let bind_address = parse_bind(bind, expected)?;
                let listen_port = parse_port(rest[0], expected)?;
                let host = rest[1].trim();
                if host.is_empty() {
                    return Err(SpecError::EmptyHost { expected });
                }
                let port = parse_port(rest[2], expected)?;
                Ok(TunnelSpec {
                    kind,
                    bind_address,
                    listen_port,
                    destination: Some(Destination {
                        host: host.to_string(),
                        port,
                    }),
                })
            }
            TunnelKind::Dynamic => {
                let (bind, port) = match parts.len() {
                    1 => (None, parts[0]),
                    2 => (Some(parts[0]), parts[1]),
                    _ => return Err(invalid()),
                };
                Ok(TunnelSpec {
                    kind,
                    bind_address: parse_bind(bind, expected)?,
                    listen_port: parse_port(port, expected)?,
                    destination: None,
                })
            }
        }
    }
}

impl fmt::Display for TunnelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(bind) = &self.bind_address {
            write!(f, "{bind}:")?;
        }
        write!(f, "{}", self.listen_port)?;
        if let Some(dest) = &self.destination {
            write!(f, ":{}:{}", dest.host, dest.port)?;
        }
        Ok(())
    }
}

fn parse_bind(token: Option<&str>, expected: &'static str) -> Result<Option<String>, SpecError> {
    match token.map(str::trim) {
        None => Ok(None),
        Some("") => Err(SpecError::EmptyHost { expected }),
        Some(addr) => Ok(Some(addr.to_string())),
    }
}

fn parse_port(token: &str, expected: &'static str) -> Result<u16, SpecError> {
    let invalid = || SpecError::InvalidPort {
        token: token.to_string(),
        expected,
    };
    let port = token.trim().parse::<u16>().map_err(|_| invalid())?;
    if port == 0 {
        return Err(invalid());
    }
    Ok(port)
}
