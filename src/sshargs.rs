use serde::{Deserialize, Serialize};

use crate::error::SpecError;
use crate::forward::{TunnelKind, TunnelSpec};

pub const DEFAULT_SSH_PORT: u16 = 22;
const SERVER_ALIVE_COUNT_MAX: u32 = 3;

/// Everything about the ssh connection other than the forwarding rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keepalive: Option<u32>,
    pub pty: bool,
    pub extra_args: Vec<String>,
    pub background: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub exit_on_forward_failure: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: None,
            port: DEFAULT_SSH_PORT,
            identity: None,
            keepalive: None,
            pty: true,
            extra_args: Vec::new(),
            background: false,
            command: None,
            exit_on_forward_failure: false,
        }
    }
}

impl ConnectionConfig {
    /// `user@host`, or just `host` when no user is set.
    pub fn destination(&self) -> String {
        match self.user.as_deref().filter(|u| !u.is_empty()) {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

/// Builds the ssh argument list (without the program name) for `mode`.
pub fn assemble(
    mode: TunnelKind,
    config: &ConnectionConfig,
    spec: &TunnelSpec,
) -> Result<Vec<String>, SpecError> {
    if spec.kind != mode {
        return Err(SpecError::ModeMismatch {
            mode,
            spec: spec.kind,
        });
    }
    if config.host.trim().is_empty() {
        return Err(SpecError::EmptyHost {
            expected: "a host name or IP address",
        });
    }

    let mut args = Vec::new();
    if !config.pty {
        args.push("-T".to_string());
    }
    args.push("-p".to_string());
    args.push(config.port.to_string());
    if let Some(identity) = config.identity.as_deref().filter(|i| !i.is_empty()) {
        args.push("-i".to_string());
        args.push(identity.to_string());
    }
    if let Some(interval) = config.keepalive {
        args.push("-o".to_string());
        args.push(format!("ServerAliveInterval={interval}"));
        args.push("-o".to_string());
        args.push(format!("ServerAliveCountMax={SERVER_ALIVE_COUNT_MAX}"));
    }
    if config.exit_on_forward_failure {
        args.push("-o".to_string());
        args.push("ExitOnForwardFailure=yes".to_string());
    }
    args.extend(config.extra_args.iter().cloned());

    args.push(mode.ssh_flag().to_string());
    args.push(spec.to_string());

    let command = config.command.as_deref().filter(|c| !c.trim().is_empty());
    if command.is_none() {
        args.push("-N".to_string());
    }
    if config.background {
        args.push("-f".to_string());
    }
    args.push(config.destination());
    if let Some(command) = command {
        args.push(command.to_string());
    }
    Ok(args)
}

/// Renders an argument list as a copy-pasteable shell line.
pub fn display_command(program: &str, args: &[String]) -> String {
    shell_words::join(std::iter::once(program).chain(args.iter().map(String::as_str)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: TunnelKind, s: &str) -> TunnelSpec {
        TunnelSpec::parse(kind, s).unwrap()
    }

    fn config(host: &str) -> ConnectionConfig {
        ConnectionConfig {
            host: host.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn local_scenario() {
        let cfg = ConnectionConfig {
            user: Some("ubuntu".into()),
            ..config("192.168.1.10")
        };
        let args = assemble(
            TunnelKind::Local,
            &cfg,
            &spec(TunnelKind::Local, "8080:127.0.0.1:80"),
        )
        .unwrap();
        assert_eq!(
            args,
            ["-p", "22", "-L", "8080:127.0.0.1:80", "-N", "ubuntu@192.168.1.10"]
        );
    }

    #[test]
    fn socks_without_pty() {
        let cfg = ConnectionConfig {
            pty: false,
            ..config("192.168.1.10")
        };
        let args = assemble(TunnelKind::Dynamic, &cfg, &spec(TunnelKind::Dynamic, "1080")).unwrap();
        assert_eq!(args, ["-T", "-p", "22", "-D", "1080", "-N", "192.168.1.10"]);
    }

    #[test]
    fn remote_command_suppresses_no_execute_flag() {
        let fwd = spec(TunnelKind::Remote, "9090:127.0.0.1:22");
        let with_cmd = ConnectionConfig {
            command: Some("tail -f /var/log/syslog".into()),
            pty: false,
            ..config("srv")
        };
        let args = assemble(TunnelKind::Remote, &with_cmd, &fwd).unwrap();
        assert!(!args.contains(&"-N".to_string()));
        assert!(args.contains(&"-T".to_string()));
        assert_eq!(args.last().unwrap(), "tail -f /var/log/syslog");
        assert_eq!(args[args.len() - 2], "srv");

        let args = assemble(TunnelKind::Remote, &config("srv"), &fwd).unwrap();
        assert!(args.contains(&"-N".to_string()));
        assert_eq!(args.last().unwrap(), "srv");
    }

    #[test]
    fn mode_mismatch_is_rejected() {
        let err = assemble(
            TunnelKind::Local,
            &config("srv"),
            &spec(TunnelKind::Remote, "9090:127.0.0.1:22"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SpecError::ModeMismatch {
                mode: TunnelKind::Local,
                spec: TunnelKind::Remote
            }
        );
    }

    #[test]
    fn empty_host_is_rejected() {
        let err = assemble(
            TunnelKind::Dynamic,
            &config("  "),
            &spec(TunnelKind::Dynamic, "1080"),
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::EmptyHost { .. }));
    }

    #[test]
    fn flags_precede_forward_which_precedes_host() {
        let cfg = ConnectionConfig {
            user: Some("deploy".into()),
            port: 2222,
            identity: Some("~/.ssh/id_ed25519".into()),
            keepalive: Some(30),
            exit_on_forward_failure: true,
            extra_args: vec!["-v".into(), "-o".into(), "StrictHostKeyChecking=no".into()],
            background: true,
            ..config("bastion")
        };
        let args = assemble(
            TunnelKind::Local,
            &cfg,
            &spec(TunnelKind::Local, "0.0.0.0:5432:db:5432"),
        )
        .unwrap();
        assert_eq!(
            args,
            [
                "-p",
                "2222",
                "-i",
                "~/.ssh/id_ed25519",
                "-o",
                "ServerAliveInterval=30",
                "-o",
                "ServerAliveCountMax=3",
                "-o",
                "ExitOnForwardFailure=yes",
                "-v",
                "-o",
                "StrictHostKeyChecking=no",
                "-L",
                "0.0.0.0:5432:db:5432",
                "-N",
                "-f",
                "deploy@bastion",
            ]
        );
    }

    #[test]
    fn display_command_quotes_when_needed() {
        let args = vec!["-N".to_string(), "host".to_string(), "echo it's up".to_string()];
        assert_eq!(
            display_command("ssh", &args),
            r"ssh -N host 'echo it'\''s up'"
        );
        let args = vec!["-L".to_string(), "8080:127.0.0.1:80".to_string(), "u@h".to_string()];
        assert_eq!(display_command("ssh", &args), "ssh -L 8080:127.0.0.1:80 u@h");
        assert_eq!(display_command("ssh", &[String::new()]), "ssh ''");
    }
}
