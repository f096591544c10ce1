use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegate_core::{CredentialIssuer, FaceMatcher, ARCFACE_TOLERANCE};
use facegate_store::UserStore;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "facegate", about = "Facegate verification operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a verification link for a member
    Link {
        /// Discord user id
        #[arg(short, long)]
        user: String,
        /// Discord guild id
        #[arg(short, long)]
        guild: String,
        /// Guild display name shown on the verification page
        #[arg(short = 'n', long)]
        guild_name: String,
    },
    /// List other registered users in a guild whose face matches this user's
    AltCheck {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        guild: String,
        /// Maximum Euclidean distance counted as a match
        #[arg(short, long, default_value_t = ARCFACE_TOLERANCE)]
        tolerance: f32,
    },
    /// Show registration and verified guilds for a user
    Status {
        #[arg(short, long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Link { user, guild, guild_name } => {
            let token = CredentialIssuer::new(config.jwt_secret()?)?.issue(&user, &guild, &guild_name)?;
            tracing::debug!(user_id = %user, guild_id = %guild, "issued verification credential");
            println!("{}", config.verification_url(&token, &guild));
        }
        Commands::AltCheck { user, guild, tolerance } => {
            let store = open_store(&config).await?;
            match store.find_alts(&user, &guild, &FaceMatcher::new(tolerance)).await? {
                None => println!("{user} is not registered"),
                Some(alts) if alts.is_empty() => println!("No alt accounts found for {user} in {guild}"),
                Some(alts) => {
                    println!("Possible alt accounts for {user} in {guild}:");
                    for alt in alts {
                        println!("  {alt}");
                    }
                }
            }
        }
        Commands::Status { user } => {
            let store = open_store(&config).await?;
            match store.get(&user).await? {
                None => println!("{user}: not registered"),
                Some(record) => {
                    println!("{user}: registered");
                    println!("  registered: {}", record.created_at);
                    println!("  updated:    {}", record.updated_at);
                    println!("  vector:     {} dims", record.face_vector.dims());
                    if record.guilds.is_empty() {
                        println!("  guilds:     none");
                    } else {
                        let guilds: Vec<&str> = record.guilds.iter().map(String::as_str).collect();
                        println!("  guilds:     {}", guilds.join(", "));
                    }
                }
            }
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> Result<UserStore> {
    UserStore::open(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_alt_check_default_tolerance() {
        let cli = Cli::parse_from(["facegate", "alt-check", "--user", "1", "--guild", "7"]);
        match cli.command {
            Commands::AltCheck { tolerance, .. } => assert_eq!(tolerance, ARCFACE_TOLERANCE),
            _ => panic!("expected alt-check"),
        }
    }
}
