use std::sync::Arc;

use clap::{Parser, Subcommand};
use reward_frontend::client::HttpOutcomeClient;
use reward_frontend::config::EngineConfig;
use reward_frontend::mapper::WheelMapper;
use reward_frontend::reconciler::SessionReconciler;
use reward_frontend::sequencer::{Phase, PhaseDescriptor, Target};
use reward_frontend::store::SessionStore;
use reward_frontend::{CardGame, WheelGame};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive reward reveals against a running authority")]
struct Args {
    /// Overrides REWARD_API_BASE_URL
    #[arg(short, long)]
    url: Option<String>,

    /// Print phase descriptors as JSON lines
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Spin the wheel once
    Spin,
    /// Pick one card of the envelope draw
    Cards {
        #[arg(short, long)]
        slot: usize,
    },
}

fn describe(descriptor: &PhaseDescriptor) -> String {
    let target = match &descriptor.target {
        Target::None => String::new(),
        Target::Rotation { from, to } => format!("rotate {:.1} -> {:.1}", from, to),
        Target::Slot { index, reward } => {
            format!("slot {} = {} ({})", index, reward.outcome_id, reward.reward_amount)
        }
        Target::Ghosts { slots } => slots
            .iter()
            .map(|(index, reward)| format!("slot {} = {}", index, reward.outcome_id))
            .collect::<Vec<_>>()
            .join(", "),
        Target::Summary { outcome } => {
            format!("won {} ({})", outcome.outcome_id, outcome.reward_amount)
        }
    };
    format!(
        "[session {}] {:?} {}ms {:?} {}",
        descriptor.session,
        descriptor.phase,
        descriptor.progress_duration_ms,
        descriptor.easing,
        target
    )
}

/// Prints descriptors until the session reaches its summary.
async fn print_phases(mut descriptors: mpsc::UnboundedReceiver<PhaseDescriptor>, json: bool) {
    while let Some(descriptor) = descriptors.recv().await {
        match serde_json::to_string(&descriptor) {
            Ok(line) if json => println!("{}", line),
            _ => println!("{}", describe(&descriptor)),
        }
        if descriptor.phase == Phase::Summarized {
            return;
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = EngineConfig::from_env();
    if let Some(url) = args.url {
        config.api_base_url = url;
    }
    info!(base_url = %config.api_base_url, "Connecting to reward authority");

    let client = Arc::new(HttpOutcomeClient::from_config(&config)?);
    let reconciler = Arc::new(SessionReconciler::new(Arc::clone(&client), SessionStore::new()));

    match args.command {
        Command::Spin => {
            let mapper = WheelMapper::new(config.load_pocket_table()?, config.extra_rotations);
            let game = WheelGame::new(client, reconciler, mapper, config.wheel_timings());
            let aggregate = game.load().await?;
            println!("{} spins left, {} received so far", aggregate.total_spin_left, aggregate.total_received_reward);

            let printer = tokio::spawn(print_phases(game.subscribe(), args.json));
            let report = game.spin().await?;
            printer.await?;
            if let Some(aggregate) = report.aggregate {
                println!("{} spins left, {} received so far", aggregate.total_spin_left, aggregate.total_received_reward);
            }
        }
        Command::Cards { slot } => {
            let game = CardGame::new(client, reconciler, config.card_slots, config.card_timings());
            game.load().await?;

            let printer = tokio::spawn(print_phases(game.subscribe(), args.json));
            let report = game.pick(slot).await?;
            printer.await?;
            if let Some(aggregate) = report.aggregate {
                println!("{} received so far", aggregate.total_received_reward);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(args).await {
        error!("Reveal failed: {}", e);
        std::process::exit(1);
    }
}
