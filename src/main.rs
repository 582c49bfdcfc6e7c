use std::io;

use argh::FromArgs;
use jsh::Interpreter;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// An interactive command shell with background-job tracking.
struct Args {
    /// print the shell version and exit
    #[argh(switch, short = 'v')]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    if args.version {
        println!("jsh version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Diagnostics go to stderr so they never interleave with command output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    Interpreter::default().repl()
}
