pub mod commands;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "bi-dashboard-api")]
#[command(about = "BI dashboard backend: sessions, provider tokens, insights and administration")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Listen port, overrides PORT")]
        port: Option<u16>,
    },

    #[command(about = "Promote an existing identity to ADMIN and mark its email verified")]
    MakeAdmin {
        #[arg(help = "Email of the identity to promote")]
        email: String,
    },

    #[command(about = "Print a bcrypt hash for a password")]
    HashPassword {
        #[arg(help = "Plaintext password")]
        password: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => commands::serve::handle(config, port).await,
        Commands::MakeAdmin { email } => commands::admin::make_admin(config, &email).await,
        Commands::HashPassword { password } => commands::password::hash(&config, &password),
    }
}
