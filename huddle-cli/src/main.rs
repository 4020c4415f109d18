use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::*;
use huddle_core::{ParticipantId, RoomId};
use huddle_peer::{
    ConnectionState, LoopbackHub, RemoteTrackInfo, RoomHandle, RoomObserver, RoomSnapshot,
    SyntheticMediaSource, TransportConfig, WebRtcConnectionFactory, spawn_room,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cargo-huddle")]
#[command(bin_name = "cargo-huddle")]
enum Cli {
    Huddle(HuddleArgs),
}

#[derive(clap::Args)]
struct HuddleArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an in-process mesh call over real WebRTC connections.
    Simulate {
        #[arg(short, long, default_value_t = 3)]
        participants: usize,

        #[arg(short, long, default_value = "huddle")]
        room: String,

        /// Transport settings as JSON; defaults to host candidates only.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Only audio tracks.
        #[arg(long)]
        audio_only: bool,

        /// Random participant ids instead of `peer-NN`; shuffles who initiates each pair.
        #[arg(long)]
        random_ids: bool,
    },

    /// Print the default transport settings.
    Config,
}

/// Prints room notifications for one participant.
struct ConsoleObserver {
    local_id: ParticipantId,
}

#[async_trait]
impl RoomObserver for ConsoleObserver {
    async fn on_room_entered(&self, room_id: RoomId) {
        println!("{} entered {}", self.local_id.to_string().bold(), room_id);
    }

    async fn on_peer_joined(&self, peer_id: ParticipantId) {
        println!("{} sees {} join", self.local_id.to_string().bold(), peer_id);
    }

    async fn on_session_stable(&self, peer_id: ParticipantId) {
        println!(
            "{} {} <-> {}",
            "🤝".green(),
            self.local_id.to_string().bold(),
            peer_id
        );
    }

    async fn on_remote_track(&self, peer_id: ParticipantId, track: RemoteTrackInfo) {
        println!(
            "{} {} receives {} from {}",
            "🎧".cyan(),
            self.local_id.to_string().bold(),
            track.kind,
            peer_id
        );
    }

    async fn on_connection_state(&self, peer_id: ParticipantId, state: ConnectionState) {
        if state == ConnectionState::Failed {
            println!(
                "{} {} -> {} connection failed",
                "⚠️".red(),
                self.local_id,
                peer_id
            );
        }
    }

    async fn on_room_error(&self, message: String) {
        println!("{} {}: {}", "❌".red(), self.local_id, message);
    }
}

fn main() -> Result<()> {
    let Cli::Huddle(args) = Cli::parse();

    match args.command {
        Commands::Simulate {
            participants,
            room,
            config,
            timeout_secs,
            audio_only,
            random_ids,
        } => {
            init_tracing();
            let config = load_config(config)?;
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(simulate(
                participants,
                RoomId::from(room),
                config,
                Duration::from_secs(timeout_secs),
                audio_only,
                random_ids,
            ))?;
        }
        Commands::Config => {
            let json = serde_json::to_string_pretty(&TransportConfig::default())?;
            println!("{json}");
        }
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .try_init();
}

fn load_config(path: Option<PathBuf>) -> Result<TransportConfig> {
    let Some(path) = path else {
        return Ok(TransportConfig::local());
    };
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid transport config {}", path.display()))
}

async fn simulate(
    count: usize,
    room: RoomId,
    config: TransportConfig,
    timeout: Duration,
    audio_only: bool,
    random_ids: bool,
) -> Result<()> {
    if count < 2 {
        anyhow::bail!("A mesh needs at least two participants");
    }
    println!(
        "{}",
        format!("🚀 Starting a {count}-way call in {room}...").green().bold()
    );

    let hub = LoopbackHub::new();
    let factory = Arc::new(WebRtcConnectionFactory::new(config.clone()));
    let media = SyntheticMediaSource {
        audio: true,
        video: !audio_only,
    };

    let mut handles = Vec::with_capacity(count);
    for i in 0..count {
        let local_id = if random_ids {
            ParticipantId::random()
        } else {
            ParticipantId::from(format!("peer-{i:02}"))
        };
        let handle = spawn_room(
            local_id.clone(),
            &config,
            factory.clone(),
            hub.signaling_for(local_id.clone()),
            Arc::new(ConsoleObserver {
                local_id: local_id.clone(),
            }),
        );
        hub.connect(handle.clone());

        if i == 0 {
            handle.create_room(room.clone(), &media).await?;
        } else {
            handle.join_room(room.clone(), &media).await?;
        }
        handles.push(handle);
    }

    let converged = tokio::time::timeout(
        timeout,
        futures::future::join_all(handles.iter().map(|h| wait_for_mesh(h, count - 1))),
    )
    .await;

    let snapshots = futures::future::join_all(handles.iter().map(RoomHandle::snapshot)).await;
    for snapshot in snapshots.into_iter().flatten() {
        print_snapshot(&snapshot);
    }

    for handle in &handles {
        handle.leave_room().await?;
    }

    match converged {
        Ok(_) => {
            println!("{}", "✨ Every session is stable!".green().bold());
            Ok(())
        }
        Err(_) => anyhow::bail!("Mesh did not converge within {}s", timeout.as_secs()),
    }
}

async fn wait_for_mesh(handle: &RoomHandle, peers: usize) {
    loop {
        if let Ok(snapshot) = handle.snapshot().await {
            if snapshot.sessions.len() == peers && snapshot.all_stable() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn print_snapshot(snapshot: &RoomSnapshot) {
    println!("   📂 {}", snapshot.local_id.to_string().bold());
    for session in &snapshot.sessions {
        println!(
            "      {} {} (tracks: {}, buffered candidates: {})",
            session.peer_id,
            session.state.to_string().yellow(),
            session.attached_tracks.len(),
            session.pending_candidates
        );
    }
}
