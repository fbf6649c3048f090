use log::{debug, info, warn};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tokio::signal::unix::{signal, Signal, SignalKind};

use crate::error::LaunchError;
use crate::sshargs::{self, ConnectionConfig};

pub const SSH_PROGRAM: &str = "ssh";

/// Runs an assembled ssh command line.
#[allow(async_fn_in_trait)]
pub trait Launcher {
    async fn launch(&self, args: &[String], background: bool) -> Result<ExitStatus, LaunchError>;
}

/// The system OpenSSH client, resolved on `PATH`.
pub struct SshLauncher {
    program: PathBuf,
}

impl SshLauncher {
    pub fn locate() -> Result<Self, LaunchError> {
        let program = which::which(SSH_PROGRAM).map_err(LaunchError::NotFound)?;
        debug!("using ssh client at {}", program.display());
        Ok(Self { program })
    }
}

impl Launcher for SshLauncher {
    async fn launch(&self, args: &[String], background: bool) -> Result<ExitStatus, LaunchError> {
        // Listen before spawning so a SIGTERM never leaves ssh behind.
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(err) => {
                warn!("cannot listen for SIGTERM: {err}");
                None
            }
        };
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(LaunchError::Spawn)?;
        if background {
            // ssh -f forks once authenticated, so this wait ends when the tunnel detaches.
            info!("ssh will move to the background once the tunnel is up");
        }

        // The child shares our process group and receives terminal SIGINT
        // itself. SIGTERM is only sent to us, so it is passed on. Either way
        // stay alive until ssh exits so its status is reported.
        loop {
            tokio::select! {
                status = child.wait() => return status.map_err(LaunchError::Wait),
                interrupt = tokio::signal::ctrl_c() => match interrupt {
                    Ok(()) => debug!("interrupt received, waiting for ssh to exit"),
                    Err(err) => {
                        warn!("cannot listen for interrupts: {err}");
                        return child.wait().await.map_err(LaunchError::Wait);
                    }
                },
                Some(()) = next_signal(&mut terminate) => {
                    info!("terminate received, stopping ssh");
                    if let Err(err) = child.start_kill() {
                        warn!("failed to stop ssh: {err}");
                    }
                }
            }
        }
    }
}

/// Next delivery on `stream`; never resolves without one.
async fn next_signal(stream: &mut Option<Signal>) -> Option<()> {
    match stream {
        Some(stream) => stream.recv().await,
        None => std::future::pending().await,
    }
}

/// Prints the command line instead of running it.
pub struct DryRun;

impl Launcher for DryRun {
    async fn launch(&self, args: &[String], _background: bool) -> Result<ExitStatus, LaunchError> {
        println!("{}", sshargs::display_command(SSH_PROGRAM, args));
        Ok(ExitStatus::default())
    }
}

/// Launches the tunnel and turns a failed ssh run into an error carrying
/// its exit code.
pub async fn start<L: Launcher>(
    launcher: &L,
    config: &ConnectionConfig,
    args: &[String],
) -> Result<(), LaunchError> {
    if config.user.is_none() {
        debug!(
            "no login user given; ssh picks it from its config, else the local user {}",
            whoami::username()
        );
    }
    info!(
        "opening tunnel via {}: {}",
        config.destination(),
        sshargs::display_command(SSH_PROGRAM, args)
    );
    let status = launcher.launch(args, config.background).await?;
    if !status.success() {
        return Err(LaunchError::Exited {
            code: status.code(),
        });
    }
    if config.background {
        info!("tunnel to {} is running in the background", config.destination());
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::Recorder;
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            host: "srv".into(),
            background: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn start_passes_args_and_background_flag() {
        let recorder = Recorder::default();
        let args = vec!["-D".to_string(), "1080".to_string(), "srv".to_string()];
        start(&recorder, &config(), &args).await.unwrap();
        assert_eq!(recorder.calls.borrow().as_slice(), &[(args, true)]);
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_the_code() {
        let recorder = Recorder {
            exit_code: 255,
            ..Default::default()
        };
        let err = start(&recorder, &config(), &[]).await.unwrap_err();
        assert!(matches!(err, LaunchError::Exited { code: Some(255) }));
        assert_eq!(err.exit_code(), 255);
    }

    #[tokio::test]
    async fn dry_run_succeeds_without_spawning() {
        let status = DryRun.launch(&["-N".to_string()], false).await.unwrap();
        assert!(status.success());
    }
}
