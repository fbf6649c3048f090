use crate::error::SpecError;
use crate::forward::{TunnelKind, TunnelSpec};
use crate::launch::{self, DryRun, SshLauncher};
use crate::sshargs::{self, ConnectionConfig, DEFAULT_SSH_PORT};
use crate::store::ConfigStore;
use crate::{interactive, logging};
use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use log::debug;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tunelssh",
    version,
    about = "Builds and launches ssh port-forwarding tunnels (local, remote and SOCKS)"
)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Settings file remembered by interactive mode
    #[arg(long, global = true, env = "TUNELSSH_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Print the ssh command instead of running it
    #[arg(long, global = true)]
    pub dry_run: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive mode with remembered settings (default)
    Interactivo,
    /// Local forwarding (ssh -L)
    Local(TunnelArgs),
    /// Remote forwarding (ssh -R)
    Remoto(TunnelArgs),
    /// Dynamic SOCKS proxy (ssh -D)
    Socks(TunnelArgs),
    /// Quick usage guide
    Ayuda,
}

#[derive(Args, Debug, Clone)]
pub struct TunnelArgs {
    /// Remote host (IP or DNS name)
    pub host: String,
    #[command(flatten)]
    pub forward: ForwardArgs,
    /// SSH login user
    #[arg(short, long)]
    pub user: Option<String>,
    /// SSH port
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_SSH_PORT,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub port: u16,
    /// Path to the private key
    #[arg(short, long, value_name = "PATH")]
    pub identity: Option<String>,
    /// Disable pseudo-terminal allocation (ssh -T)
    #[arg(long)]
    pub no_pty: bool,
    /// Server-alive interval in seconds (0 disables)
    #[arg(long, value_name = "SECONDS")]
    pub keepalive: Option<u32>,
    /// Extra argument passed to ssh as is (repeatable)
    #[arg(long = "ssh-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub ssh_args: Vec<String>,
    /// Run in the background (ssh -f)
    #[arg(short = 'f', long)]
    pub background: bool,
    /// Remote command to run; without one the session only holds the tunnel (ssh -N)
    #[arg(short, long)]
    pub command: Option<String>,
    /// Make ssh exit when the forward cannot be set up
    #[arg(long)]
    pub exit_on_forward_failure: bool,
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ForwardArgs {
    /// Local forward: [bind_address:]local_port:dest_host:dest_port
    #[arg(short = 'L', long, value_name = "SPEC", value_parser = parse_local)]
    pub local_forward: Option<TunnelSpec>,
    /// Remote forward: [bind_address:]remote_port:dest_host:dest_port
    #[arg(short = 'R', long, value_name = "SPEC", value_parser = parse_remote)]
    pub remote_forward: Option<TunnelSpec>,
    /// SOCKS proxy: [bind_address:]socks_port
    #[arg(short = 'D', long, value_name = "SPEC", value_parser = parse_dynamic)]
    pub dynamic_forward: Option<TunnelSpec>,
}

fn parse_local(s: &str) -> Result<TunnelSpec, SpecError> {
    TunnelSpec::parse(TunnelKind::Local, s)
}

fn parse_remote(s: &str) -> Result<TunnelSpec, SpecError> {
    TunnelSpec::parse(TunnelKind::Remote, s)
}

fn parse_dynamic(s: &str) -> Result<TunnelSpec, SpecError> {
    TunnelSpec::parse(TunnelKind::Dynamic, s)
}

impl ForwardArgs {
    fn into_spec(self) -> Option<TunnelSpec> {
        self.local_forward
            .or(self.remote_forward)
            .or(self.dynamic_forward)
    }
}

impl TunnelArgs {
    /// Splits the flags into a connection config and the forwarding rule
    /// for `mode`.
    pub fn resolve(self, mode: TunnelKind) -> Result<(ConnectionConfig, TunnelSpec), SpecError> {
        let spec = self
            .forward
            .into_spec()
            .ok_or_else(|| SpecError::InvalidFormat {
                kind: mode,
                input: String::new(),
                expected: mode.expected_format(),
            })?;
        if spec.kind != mode {
            return Err(SpecError::ModeMismatch {
                mode,
                spec: spec.kind,
            });
        }
        let config = ConnectionConfig {
            host: self.host,
            user: self.user.filter(|u| !u.is_empty()),
            port: self.port,
            identity: self.identity.filter(|i| !i.is_empty()),
            keepalive: self.keepalive.filter(|secs| *secs > 0),
            pty: !self.no_pty,
            extra_args: self.ssh_args,
            background: self.background,
            command: self.command.filter(|c| !c.trim().is_empty()),
            exit_on_forward_failure: self.exit_on_forward_failure,
        };
        Ok((config, spec))
    }
}

/// Parses the command line and runs it; `main` turns errors into exit codes.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    debug!("{cli:?}");

    let tunnel = match cli.command.unwrap_or(Commands::Interactivo) {
        Commands::Ayuda => {
            print_guide();
            return Ok(());
        }
        Commands::Interactivo => {
            let path = match cli.config {
                Some(path) => path,
                None => ConfigStore::default_path()?,
            };
            let store = ConfigStore::new(path);
            debug!("settings file: {}", store.path().display());
            return if cli.dry_run {
                interactive::run(&store, &DryRun).await
            } else {
                interactive::run(&store, &SshLauncher::locate()?).await
            };
        }
        Commands::Local(args) => args.resolve(TunnelKind::Local)?,
        Commands::Remoto(args) => args.resolve(TunnelKind::Remote)?,
        Commands::Socks(args) => args.resolve(TunnelKind::Dynamic)?,
    };

    let (config, spec) = tunnel;
    let args = sshargs::assemble(spec.kind, &config, &spec)?;
    if cli.dry_run {
        launch::start(&DryRun, &config, &args).await?;
    } else {
        launch::start(&SshLauncher::locate()?, &config, &args).await?;
    }
    Ok(())
}

fn print_guide() {
    println!("Quick guide (non-interactive mode):");
    println!("1) Pick the tunnel type: local, remoto or socks");
    println!("2) Give the remote host (IP or DNS name)");
    println!("3) Describe the forward with -L, -R or -D to match the type");
    println!("4) Optional: user, port, key, keepalive, extra ssh arguments, ...");
    println!();
    println!("Forward formats:");
    for kind in TunnelKind::ALL {
        println!("  {:<7} {} {}", kind.mode_name(), kind.ssh_flag(), kind.expected_format());
    }
    println!();
    println!("Examples:");
    println!("  Local : tunelssh local 192.168.1.10 -L 8080:127.0.0.1:80");
    println!("  Remote: tunelssh remoto 192.168.1.10 -R 9090:127.0.0.1:22");
    println!("  SOCKS : tunelssh socks 192.168.1.10 -D 1080");
    println!();
    println!("Run `tunelssh` with no arguments for interactive mode.");
}
