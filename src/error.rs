use std::path::PathBuf;
use thiserror::Error;

use crate::forward::TunnelKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("invalid {kind} forwarding `{input}`; expected {expected}")]
    InvalidFormat {
        kind: TunnelKind,
        input: String,
        expected: &'static str,
    },
    #[error("invalid port `{token}` (must be 1-65535); expected {expected}")]
    InvalidPort {
        token: String,
        expected: &'static str,
    },
    #[error("host must not be empty; expected {expected}")]
    EmptyHost { expected: &'static str },
    #[error("mode `{mode}` cannot use a {spec} forwarding ({flag})", flag = .spec.ssh_flag())]
    ModeMismatch { mode: TunnelKind, spec: TunnelKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mode `{0}`; use local, remoto or socks")]
pub struct UnknownMode(pub String);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HOME is not set; pass --config to choose a config file")]
    NoHome,
    #[error("failed to load {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to save {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("ssh client not found on PATH; install openssh-client")]
    NotFound(#[source] which::Error),
    #[error("failed to spawn ssh")]
    Spawn(#[source] std::io::Error),
    #[error("failed to wait for ssh")]
    Wait(#[source] std::io::Error),
    #[error("ssh exited with {}", describe_exit(.code))]
    Exited { code: Option<i32> },
}

impl LaunchError {
    /// Exit code to hand back to the shell.
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::Exited { code: Some(code) } => *code,
            LaunchError::Exited { code: None } => 130,
            _ => 1,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}
