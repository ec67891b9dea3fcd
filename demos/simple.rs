//! Start PowerShell, run one command and print what it wrote.
//!
//! ```text
//! RUST_LOG=libpwsh=debug cargo run --example simple
//! ```

use libpwsh::{Result, Session};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let session = Session::start().await?;

    let output = session.execute(["Get-ComputerInfo"]).await;
    session.close().await;

    let output = output?;
    print!("{}", output.stdout);
    if !output.stderr.is_empty() {
        eprint!("{}", output.stderr);
    }
    Ok(())
}
