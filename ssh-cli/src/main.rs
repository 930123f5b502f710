//! Demo binary for the SFTP engines (C9/C10): spins up a local server
//! rooted at a chosen directory, connects a client to it over an
//! in-process duplex pipe, and runs one subcommand against it.
//!
//! A real deployment drives the client over an SSH `session` channel's
//! `subsystem "sftp"` request instead of a duplex pipe; swapping the
//! transport is exactly replacing the `FramedSink`/`FramedSource`
//! construction below; everything downstream of the `SftpClient` is
//! unchanged.

mod duplex_channel;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use duplex_channel::{FramedSink, FramedSource};
use sftp::{SftpClient, SftpServer};

#[derive(Parser)]
#[command(name = "ssh-cli", about = "Demo CLI for the SFTP client/server engines")]
struct Cli {
    /// Directory the demo server is rooted at (acts as its chroot).
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a remote directory.
    Ls { path: String },
    /// Download a remote file to a local path.
    Get { remote: String, local: PathBuf },
    /// Upload a local file or directory to a remote path.
    Put {
        local: PathBuf,
        remote: String,
        #[arg(long)]
        recursive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client_side);
    let (server_read, server_write) = tokio::io::split(server_side);

    let server = SftpServer::new(Arc::new(FramedSink::new(server_write)), Some(cli.root.clone()));
    let server_task = tokio::spawn(server.serve(Box::new(FramedSource::new(server_read))));

    let client = SftpClient::connect(
        Arc::new(FramedSink::new(client_write)),
        Box::new(FramedSource::new(client_read)),
        sftp_proto::MAX_VERSION,
    )
    .await?;

    match cli.command {
        Command::Ls { path } => {
            let names = client.readdir_all(&path).await?;
            for name in names {
                println!("{}", name.filename);
            }
        }
        Command::Get { remote, local } => {
            let handle = client.open_read(&remote).await?;
            let attrs = client.fstat(&handle).await?;
            let size = attrs.size.unwrap_or(0);
            let data = client.read_range(&handle, 0, size).await?;
            client.close(handle).await?;
            tokio::fs::write(&local, data).await?;
            println!("downloaded {remote} -> {}", local.display());
        }
        Command::Put { local, remote, recursive } => {
            if !recursive {
                let data = tokio::fs::read(&local).await?;
                let handle = client.create(&remote, Default::default()).await?;
                let write_result = client.write_range(&handle, 0, &data).await;
                client.close(handle).await?;
                write_result?;
            } else {
                client.upload_recursive(&local, &remote, true, false, None).await?;
            }
            println!("uploaded {} -> {remote}", local.display());
        }
    }

    drop(client);
    let _ = server_task.await;
    Ok(())
}
