use anyhow::{Context, Result};
use log::{info, warn};
use std::future::Future;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::launch::{self, Launcher, SSH_PROGRAM};
use crate::sshargs;
use crate::store::ConfigStore;
use crate::wizard::{Outcome, Session, Step, Wizard};

const BANNER: &str =
    "Interactive mode. Type `help` or `?` at any prompt for guidance; Ctrl-D quits without saving.";

/// Runs an interactive session on the terminal, then saves and launches it.
/// Ctrl-C only cancels the prompts; once ssh runs, the launcher owns it.
pub async fn run<L: Launcher>(store: &ConfigStore, launcher: &L) -> Result<()> {
    let mut stdin = BufReader::new(io::stdin());
    let mut stdout = io::stdout();
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for interrupts: {err}");
            std::future::pending::<()>().await;
        }
    };
    run_with(store, launcher, &mut stdin, &mut stdout, interrupt).await
}

/// Prompts until `interrupt` resolves or the session is confirmed. A
/// confirmed session is saved and launched with `interrupt` out of the way.
pub async fn run_with<L, R, W, I>(
    store: &ConfigStore,
    launcher: &L,
    input: &mut R,
    output: &mut W,
    interrupt: I,
) -> Result<()>
where
    L: Launcher,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    I: Future<Output = ()>,
{
    output.write_all(format!("{BANNER}\n").as_bytes()).await?;
    let mut wizard = Wizard::new(store.load().await);
    let prompted = tokio::select! {
        session = prompt_session(&mut wizard, input, output) => Some(session?),
        () = interrupt => None,
    };
    let Some(prompted) = prompted else {
        output.write_all(b"\n").await?;
        output.flush().await?;
        info!("interrupted; nothing saved");
        return Ok(());
    };
    let Some(session) = prompted else {
        info!("session cancelled; nothing saved");
        return Ok(());
    };

    let args = session.ssh_args()?;
    if let Err(err) = store.save(&session.to_persisted()).await {
        warn!("{err}; launching anyway");
    }
    launch::start(launcher, &session.connection, &args)
        .await
        .with_context(|| format!("tunnel to {} failed", session.connection.destination()))?;
    Ok(())
}

/// Feeds lines to the wizard until it finishes. `None` means the user
/// declined or input ended.
pub async fn prompt_session<R, W>(
    wizard: &mut Wizard,
    input: &mut R,
    output: &mut W,
) -> Result<Option<Session>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        if wizard.step() == Step::Confirm {
            match wizard.preview() {
                Some(Ok(args)) => {
                    let line = sshargs::display_command(SSH_PROGRAM, &args);
                    output.write_all(format!("\n{line}\n").as_bytes()).await?;
                }
                Some(Err(err)) => output.write_all(format!("{err}\n").as_bytes()).await?,
                None => {}
            }
        }
        output
            .write_all(format!("{}: ", wizard.prompt()).as_bytes())
            .await?;
        output.flush().await?;

        let mut line = String::new();
        if input
            .read_line(&mut line)
            .await
            .context("failed to read from stdin")?
            == 0
        {
            output.write_all(b"\n").await?;
            output.flush().await?;
            return Ok(None);
        }

        match wizard.advance(&line) {
            Outcome::Advanced => {}
            Outcome::Help(text) | Outcome::Invalid(text) => {
                output.write_all(format!("{text}\n").as_bytes()).await?;
            }
            Outcome::Finished(session) => return Ok(Some(session)),
            Outcome::Cancelled => return Ok(None),
        }
    }
}
