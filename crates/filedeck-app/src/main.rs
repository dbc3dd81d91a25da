use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::Colorize;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

use filedeck::cli::{Cli, Commands};
use filedeck::config::{ClientConfig, ServerConfig};
use filedeck::types::{DirListing, EntryKind};
use filedeck::{console, logging, ApiClient, WebServer};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();
    let client = ApiClient::new(ClientConfig::from_cli(&cli));

    match &cli.command {
        Commands::Serve(args) => {
            let config = ServerConfig::resolve(args, cli.token.clone())?;
            WebServer::new(config)?.start().await?;
        }
        Commands::Console => {
            console::run(&ClientConfig::from_cli(&cli)).await?;
        }
        Commands::Ls { path } => {
            print_listing(&client.list_dir(path).await?);
        }
        Commands::Mkdir { parent, name } => {
            client.create_folder(parent, name).await?;
            println!(
                "{} {}/{}",
                "📁 Created".green(),
                parent.trim_end_matches('/'),
                name
            );
        }
        Commands::Rm { path } => {
            client.delete(path).await?;
            println!("{} {}", "🗑️  Deleted".green(), path);
        }
        Commands::Mv { path, new_name } => {
            client.rename(path, new_name).await?;
            println!("{} {} -> {}", "✏️  Renamed".green(), path, new_name);
        }
        Commands::Cat { path } => {
            print!("{}", client.read_file(path).await?);
        }
        Commands::Write { path, content } => {
            let content = match content {
                Some(content) => content.clone(),
                None => {
                    let mut buffer = String::new();
                    tokio::io::stdin()
                        .read_to_string(&mut buffer)
                        .await
                        .context("failed to read stdin")?;
                    buffer
                }
            };
            client.write_file(path, &content).await?;
            println!("{} {}", "✅ Wrote".green(), path);
        }
        Commands::Upload { local, dir } => {
            let bytes = tokio::fs::read(local)
                .await
                .with_context(|| format!("failed to read {}", local.display()))?;
            let file_name = local
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("upload")
                .to_string();
            client.upload(dir, &file_name, bytes).await?;
            println!("{} {} -> {}", "⬆️  Uploaded".green(), local.display(), dir);
        }
        Commands::Download { path, local } => {
            let dest = match local {
                Some(dest) => dest.clone(),
                None => PathBuf::from(
                    path.rsplit('/')
                        .find(|part| !part.is_empty())
                        .unwrap_or("download"),
                ),
            };
            client.download_to(path, &dest).await?;
            println!(
                "{} {} -> {}",
                "⬇️  Downloaded".green(),
                path,
                dest.display()
            );
        }
        Commands::Info => {
            let info = client.system_info().await?;
            println!("CPU:    {}", info.cpu);
            println!("Memory: {}", info.memory);
            println!("Disk:   {}", info.disk);
            println!("Uptime: {}", format_uptime(info.uptime));
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            clap_complete::generate(*shell, &mut command, name, &mut std::io::stdout());
        }
    }

    Ok(())
}

fn print_listing(listing: &DirListing) {
    println!("{}", listing.path.bold());
    for item in &listing.items {
        let name = match item.kind {
            EntryKind::Directory => item.name.blue().bold().to_string(),
            EntryKind::File => item.name.normal().to_string(),
        };
        println!("{:>14}  {:>19}  {}", item.size, item.modified, name);
    }
}

fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = seconds % 86_400 / 3_600;
    let minutes = seconds % 3_600 / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
