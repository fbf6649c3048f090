mod cli;
mod error;
mod forward;
mod interactive;
mod launch;
mod logging;
mod sshargs;
mod store;
mod wizard;

use error::{LaunchError, SpecError};

const VALIDATION_EXIT: i32 = 2;

#[tokio::main]
async fn main() {
    // Exit explicitly: a pending stdin read would otherwise hold up runtime shutdown.
    match cli::run().await {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(exit_code(&err));
        }
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<SpecError>().is_some() {
        return VALIDATION_EXIT;
    }
    match err.downcast_ref::<LaunchError>() {
        Some(launch_err) => launch_err.exit_code(),
        None => 1,
    }
}
