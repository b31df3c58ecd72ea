use anyhow::Context;
use clap::{Parser, Subcommand};
use groupting_config::load as load_config;
use groupting_database::{CreateGroupRequest, CreateUserRequest};
use groupting_matching::{FinalizeOutcome, SeekOutcome};
use groupting_runtime::{shutdown_signal, telemetry, MatchingServices};
use tokio::sync::watch;
use tracing::info;

#[derive(Parser)]
#[command(name = "groupting")]
#[command(about = "Groupting matching coordinator (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator and the periodic sweeper until Ctrl-C
    Serve,
    /// Seed the database with sample users and idle groups
    Seed,
    /// Put a group into the seeking state and try to match it now
    Seek { group_id: String },
    /// Withdraw a seeking group
    Cancel { group_id: String },
    /// Replay triggers for every matched and seeking group once
    Sweep,
    /// Dump users, groups and chatrooms
    Dump,
}

const SEED_USERS: &[(&str, &str)] = &[
    ("u1", "Minji"),
    ("u2", "Jisoo"),
    ("u3", "Hyun"),
    ("u4", "Dana"),
    ("u5", "Seo"),
    ("u6", "Yuna"),
    ("u7", "Taeho"),
    ("u8", "Eun"),
];

const SEED_GROUPS: &[(&str, &str, &[&str])] = &[
    ("alpha", "Alpha", &["u1", "u2"]),
    ("bravo", "Bravo", &["u3", "u4"]),
    ("charlie", "Charlie", &["u5", "u6"]),
    ("delta", "Delta", &["u7"]),
    ("echo", "Echo", &["u8"]),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = MatchingServices::initialise(&config)
        .await
        .context("failed to initialise matching services")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(services, config.matching.sweep_interval()).await,
        Commands::Seed => seed_data(&services).await,
        Commands::Seek { group_id } => seek_group(&services, &group_id).await,
        Commands::Cancel { group_id } => cancel_group(&services, &group_id).await,
        Commands::Sweep => sweep_once(&services).await,
        Commands::Dump => dump_data(&services).await,
    }
}

async fn run_server(
    services: MatchingServices,
    sweep_interval: std::time::Duration,
) -> anyhow::Result<()> {
    info!("starting Groupting matching coordinator");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let changes = services.store.feed().subscribe();
    let runner = tokio::spawn(
        services
            .coordinator
            .clone()
            .run(changes, shutdown_rx.clone()),
    );

    let coordinator = services.coordinator.clone();
    let sweeper = tokio::spawn(async move {
        coordinator.run_sweeper(sweep_interval, shutdown_rx).await;
    });

    shutdown_signal().await;
    // Receivers may already be gone if both loops exited on their own.
    let _ = shutdown_tx.send(true);

    runner.await.context("coordinator task failed")?;
    sweeper.await.context("sweeper task failed")?;

    info!("coordinator shut down");
    Ok(())
}

async fn seed_data(services: &MatchingServices) -> anyhow::Result<()> {
    info!("seeding database with sample data");

    let users = services.store.users();
    let mut users_created = 0;
    for (id, nickname) in SEED_USERS {
        if users.find_by_id(id).await?.is_some() {
            continue;
        }
        users
            .create(&CreateUserRequest {
                id: id.to_string(),
                nickname: Some(nickname.to_string()),
                current_group_id: None,
            })
            .await
            .with_context(|| format!("failed to insert user {id}"))?;
        users_created += 1;
    }

    let groups = services.store.groups();
    let mut groups_created = 0;
    for (id, name, members) in SEED_GROUPS {
        if groups.find_by_id(id).await?.is_some() {
            continue;
        }
        groups
            .create(&CreateGroupRequest {
                id: Some(id.to_string()),
                name: Some(name.to_string()),
                member_ids: members.iter().map(|m| m.to_string()).collect(),
            })
            .await
            .with_context(|| format!("failed to insert group {id}"))?;
        groups_created += 1;
    }

    println!("Database seeded with sample data:");
    println!("- {users_created} users created");
    println!("- {groups_created} groups created");
    println!("Run 'seek <group_id>' on two groups of the same size to match them");

    Ok(())
}

async fn seek_group(services: &MatchingServices, group_id: &str) -> anyhow::Result<()> {
    services
        .store
        .groups()
        .start_seeking(group_id)
        .await
        .with_context(|| format!("failed to start seeking for group {group_id}"))?;

    let coordinator = &services.coordinator;
    match coordinator.seek(group_id).await? {
        SeekOutcome::Matched(pair) => {
            println!("{} matched with {}", pair.group.id, pair.peer.id);
            for (side, peer) in [(&pair.group.id, &pair.peer.id), (&pair.peer.id, &pair.group.id)] {
                if let FinalizeOutcome::Created(finalized) = coordinator.finalize(side, peer).await? {
                    println!(
                        "chatroom {} created for {} participants",
                        finalized.chatroom.id,
                        finalized.chatroom.participants.len()
                    );
                }
            }
        }
        SeekOutcome::NoCandidate => println!("{group_id} is seeking; no group of the same size yet"),
        SeekOutcome::NoLongerSeeking => println!("{group_id} was claimed or withdrawn meanwhile"),
        SeekOutcome::GaveUp { reason } => {
            println!("{group_id} stays seeking, pairing gave up: {reason}")
        }
    }
    Ok(())
}

async fn cancel_group(services: &MatchingServices, group_id: &str) -> anyhow::Result<()> {
    let group = services
        .store
        .groups()
        .stop_seeking(group_id)
        .await
        .with_context(|| format!("failed to cancel seeking for group {group_id}"))?;
    println!("{} is now {}", group.id, group.status);
    Ok(())
}

async fn sweep_once(services: &MatchingServices) -> anyhow::Result<()> {
    let report = services.coordinator.sweep().await.context("sweep failed")?;
    println!(
        "Sweep replayed {} groups: {} paired, {} chatrooms created, {} failed",
        report.replayed, report.paired, report.finalized, report.failed
    );
    Ok(())
}

async fn dump_data(services: &MatchingServices) -> anyhow::Result<()> {
    info!("dumping matching data from database");

    let users = services.store.users().list().await.context("failed to fetch users")?;
    println!("=== USERS ===");
    if users.is_empty() {
        println!("No users found in database");
    } else {
        println!("Found {} users:", users.len());
        println!("{:<25} {:<20} {:<45} {:<8}", "ID", "Nickname", "Current Group", "Version");
        println!("{}", "-".repeat(100));
        for user in users {
            println!(
                "{:<25} {:<20} {:<45} {:<8}",
                user.id,
                user.display_name(),
                user.current_group_id.as_deref().unwrap_or("NULL"),
                user.version
            );
        }
    }

    let groups = services.store.groups().list().await.context("failed to fetch groups")?;
    println!("\n=== GROUPS ===");
    if groups.is_empty() {
        println!("No groups found in database");
    } else {
        println!("Found {} groups:", groups.len());
        println!(
            "{:<25} {:<15} {:<10} {:<30} {:<25} {:<8}",
            "ID", "Name", "Status", "Members", "Matched With", "Version"
        );
        println!("{}", "-".repeat(120));
        for group in groups {
            println!(
                "{:<25} {:<15} {:<10} {:<30} {:<25} {:<8}",
                group.id,
                group.name.as_deref().unwrap_or("NULL"),
                group.status,
                group.member_ids.join(","),
                group.matched_group_id.as_deref().unwrap_or("NULL"),
                group.version
            );
        }
    }

    let chatrooms = services
        .store
        .chatrooms()
        .list()
        .await
        .context("failed to fetch chatrooms")?;
    println!("\n=== CHATROOMS ===");
    if chatrooms.is_empty() {
        println!("No chatrooms found in database");
    } else {
        println!("Found {} chatrooms:", chatrooms.len());
        println!("{:<45} {:<40} {:<25}", "ID", "Participants", "Created At");
        println!("{}", "-".repeat(115));
        for chatroom in chatrooms {
            println!(
                "{:<45} {:<40} {:<25}",
                chatroom.id,
                chatroom.participants.join(","),
                chatroom.created_at
            );
        }
    }

    Ok(())
}
