//! room-sync: keep a directory in sync with the other members of a room.
//!
//! A peer either joins an existing room through a rendezvous service, or
//! (`--create`) runs the rendezvous service itself, creates a room and acts
//! as its host: peers notify the host after publishing, and the host pulls
//! their content and republishes it for everyone else.

use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rendezvous::{AppState, RendezvousServer, SyncTrigger};
use room_core::ContentStore;
use room_sync::config::validate_room_id;
use room_sync::shell::{Command, HELP, ParseError, RoomAction, format_members};
use room_sync::{Config, IpfsStore, RendezvousClient, Session, WorkspaceSync};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "room-sync")]
#[command(about = "Sync a directory with the members of a room")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the ipfs executable
    #[arg(long)]
    ipfs: Option<PathBuf>,

    /// Path to the ipget executable
    #[arg(long)]
    ipget: Option<PathBuf>,

    /// Rendezvous service address
    #[arg(long)]
    host: Option<String>,

    /// Listen address for the rendezvous service in host mode
    #[arg(long)]
    listen: Option<String>,

    /// Run the rendezvous service and create a new room
    #[arg(long, conflicts_with = "room")]
    create: bool,

    /// Room to join
    #[arg(short, long)]
    room: Option<String>,

    /// Working directory to sync
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Start an ipfs daemon for the lifetime of this process
    #[arg(long)]
    daemon: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn merge_into(&self, config: &mut Config) {
        if let Some(ipfs) = &self.ipfs {
            config.ipfs_path = ipfs.clone();
        }
        if let Some(ipget) = &self.ipget {
            config.ipget_path = ipget.clone();
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(listen) = &self.listen {
            config.listen = listen.clone();
        }
        if let Some(dir) = &self.dir {
            config.working_dir = Some(dir.clone());
        }
    }
}

/// Address a host-mode peer uses to reach its own rendezvous service.
fn loopback_host(mut addr: SocketAddr) -> String {
    if addr.ip().is_unspecified() {
        addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    addr.to_string()
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "debug,room_sync=debug,rendezvous=debug"
    } else {
        "info,room_sync=info,rendezvous=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load(args.config.as_deref())?;
    args.merge_into(&mut config);
    config.validate(args.create)?;

    let room_arg = match (&args.room, args.create) {
        (Some(room), _) => {
            validate_room_id(room)?;
            Some(room.clone())
        }
        (None, true) => None,
        (None, false) => bail!("Either --create or --room is required"),
    };

    // Host mode binds first so its own client can reach the bound port
    let listener = if args.create {
        let listener = TcpListener::bind(&config.listen)
            .await
            .with_context(|| format!("Failed to listen on {}", config.listen))?;
        Some(listener)
    } else {
        None
    };
    let host = match &listener {
        Some(listener) => loopback_host(listener.local_addr()?),
        None => config.host.clone(),
    };

    let store = Arc::new(IpfsStore::new(
        config.ipfs_path.clone(),
        config.ipget_path.clone(),
    ));
    if args.daemon {
        store.start_daemon().await?;
        tokio::time::sleep(config.daemon_warmup()).await;
    }

    let client = RendezvousClient::new(&host)?;
    let session = Arc::new(Session::new(store.clone(), client));
    let id = session.refresh_identity().await?;
    info!("Peer ID: {}", id.id);

    if let Some(backup) = &config.bootstrap_backup {
        store.save_bootstrap_list(backup).await?;
    }

    let workspace = Arc::new(WorkspaceSync::new(
        session.clone(),
        config.sync_step_timeout(),
    ));
    if let Some(dir) = &config.working_dir {
        workspace.set_working_path(dir.clone());
    }

    let server = match listener {
        Some(listener) => {
            let trigger = Arc::new(SyncTrigger::new(workspace.clone()));
            let state = Arc::new(AppState::new(trigger));
            Some(RendezvousServer::serve(listener, state)?)
        }
        None => None,
    };

    let result = run(&session, &workspace, room_arg).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }

    if let Some(server) = &server {
        let shutdown = &config.shutdown;
        match server
            .shutdown_within(shutdown.deadline(), shutdown.retry_delay())
            .await
        {
            Ok(()) => server.stopped().await?,
            Err(e) => warn!("Rendezvous service did not stop cleanly: {}", e),
        }
    }

    if let Some(backup) = &config.bootstrap_backup {
        if let Err(e) = store.load_bootstrap_list(backup).await {
            warn!("Failed to restore bootstrap list: {}", e);
        }
    }
    if args.daemon {
        store.stop_daemon().await?;
    }

    info!("Bye");
    result
}

/// Join the room, then serve interactive commands until `exit` or EOF.
async fn run(
    session: &Session<IpfsStore>,
    workspace: &WorkspaceSync<IpfsStore>,
    room: Option<String>,
) -> Result<()> {
    let room_id = match room {
        Some(room) => room,
        None => {
            let room = session.create_room().await?;
            println!("Room created: {}", room);
            room
        }
    };

    session.join_room(&room_id).await?;
    let members = session.poll_members().await?;
    print!("{}", format_members(&members));
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(ParseError::Empty) => {
                prompt();
                continue;
            }
            Err(e) => {
                println!("{}", e);
                prompt();
                continue;
            }
        };

        if command == Command::Exit {
            break;
        }
        if let Err(e) = execute(session, workspace, command).await {
            println!("error: {:#}", e);
        }
        prompt();
    }
    Ok(())
}

async fn execute(
    session: &Session<IpfsStore>,
    workspace: &WorkspaceSync<IpfsStore>,
    command: Command,
) -> Result<()> {
    match command {
        Command::Room(RoomAction::Update) => {
            let members = session.poll_members().await?;
            print!("{}", format_members(&members));
        }
        Command::Room(RoomAction::Members) => match session.last_members() {
            Some(members) => print!("{}", format_members(&members)),
            None => println!("No members cached, run `room update`"),
        },
        Command::Sync => {
            let path = working_path(workspace)?;
            session.sync_from_host(&path).await?;
            println!("Synced {}", path.display());
        }
        Command::Upload => {
            let path = working_path(workspace)?;
            session.upload(&path).await?;
            println!("Uploaded {}", path.display());
        }
        Command::Dir(path) => {
            if !path.is_dir() {
                bail!("{} is not a directory", path.display());
            }
            println!("Working directory: {}", path.display());
            workspace.set_working_path(path);
        }
        Command::Help => println!("{}", HELP),
        Command::Exit => {}
    }
    Ok(())
}

fn working_path(workspace: &WorkspaceSync<IpfsStore>) -> Result<PathBuf> {
    workspace
        .working_path()
        .context("Working directory not set, use `dir <path>`")
}
