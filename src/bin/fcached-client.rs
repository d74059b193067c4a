//! A thin command-line driver over [`fcached::client::Connection`] (SPEC_FULL.md §2 item 10):
//! one subcommand per documented client call, issuing exactly one request and printing its
//! result. Argument parsing and evicted-file dump-to-directory behavior live here, in the
//! demonstration binary, never in the library itself — per spec.md §1 these are explicitly
//! out of scope for the core.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fcached::client::Connection;
use fcached::wire::OpenFlags;

/// Minimal client-side configuration (spec.md §6 "Client config"): none of this is parsed by
/// the library, only by this binary.
#[derive(Parser)]
struct Args {
    /// Path of the server's listening socket.
    #[clap(long, default_value = "/tmp/fcached.sock")]
    socket_path: PathBuf,

    /// Directory evicted files are written to, if a command returns any.
    #[clap(long)]
    evicted_dir: Option<PathBuf>,

    /// Print each request/response as it happens.
    #[clap(long)]
    verbose: bool,

    #[command(subcommand)]
    command: ClientCommand,
}

#[derive(Subcommand)]
enum ClientCommand {
    /// `openFile`.
    Open {
        pathname: String,
        #[clap(long)]
        create: bool,
        #[clap(long)]
        lock: bool,
    },
    /// `closeFile`.
    Close { pathname: String },
    /// `readFile`, printed to stdout as raw bytes.
    Read { pathname: String },
    /// `readNFiles`; `n <= 0` means all.
    ReadN {
        #[clap(default_value_t = 0)]
        n: i64,
    },
    /// `writeFile`; must follow an `open --create --lock` of the same pathname on a prior
    /// connection (spec.md §4.2 write precondition holds per connection, not per process).
    Write { pathname: String, content: String },
    /// `appendToFile`.
    Append { pathname: String, content: String },
    /// `lockFile`.
    Lock { pathname: String },
    /// `unlockFile`.
    Unlock { pathname: String },
    /// `removeFile`.
    Remove { pathname: String },
}

fn dump_evicted(dir: Option<&PathBuf>, evicted: &[fcached::client::EvictedFile]) {
    for file in evicted {
        eprintln!("evicted: {} ({} bytes)", file.pathname, file.content.len());
        if let Some(dir) = dir {
            let path = dir.join(&file.pathname);
            if let Err(e) = std::fs::write(&path, &file.content) {
                eprintln!("failed to dump evicted file {}: {e}", path.display());
            }
        }
    }
}

fn main() -> std::process::ExitCode {
    let args = Args::parse();
    env_logger::init();

    let mut conn = match Connection::open(&args.socket_path, std::process::id()) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("fcached-client: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let result = match args.command {
        ClientCommand::Open { pathname, create, lock } => {
            let mut flags = OpenFlags::empty();
            if create {
                flags |= OpenFlags::O_CREATE;
            }
            if lock {
                flags |= OpenFlags::O_LOCK;
            }
            if args.verbose {
                eprintln!("open {pathname} flags={flags:?}");
            }
            conn.open_file(&pathname, flags).map(|evicted| dump_evicted(args.evicted_dir.as_ref(), &evicted))
        }
        ClientCommand::Close { pathname } => conn.close_file(&pathname),
        ClientCommand::Read { pathname } => conn.read_file(&pathname).map(|content| {
            use std::io::Write;
            let _ = std::io::stdout().write_all(&content);
        }),
        ClientCommand::ReadN { n } => conn.read_n_files(n).map(|files| {
            for (pathname, content) in files {
                println!("{pathname}: {} bytes", content.len());
            }
        }),
        ClientCommand::Write { pathname, content } => {
            conn.write_file(&pathname, content.into_bytes()).map(|evicted| dump_evicted(args.evicted_dir.as_ref(), &evicted))
        }
        ClientCommand::Append { pathname, content } => {
            conn.append_to_file(&pathname, content.into_bytes()).map(|evicted| dump_evicted(args.evicted_dir.as_ref(), &evicted))
        }
        ClientCommand::Lock { pathname } => conn.lock_file(&pathname),
        ClientCommand::Unlock { pathname } => conn.unlock_file(&pathname),
        ClientCommand::Remove { pathname } => conn.remove_file(&pathname),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fcached-client: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
