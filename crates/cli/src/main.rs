mod completions;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use shop::{ShopClient, ShopCommand};

#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Browse the catalog, manage the cart and check out through the storefront engine")]
#[command(version)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Shop(ShopCommand),

    #[command(flatten)]
    System(SystemCommands),
}

#[derive(Subcommand)]
enum SystemCommands {
    /// Configuration management
    #[command(display_order = 20)]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Write a default configuration file
    #[command(display_order = 21)]
    Init,
    /// Generate shell completions
    #[command(display_order = 22)]
    Completions {
        /// Shell to generate completions for; omit for setup instructions
        shell: Option<Shell>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// Show configuration file path
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Default to WARN level for quiet CLI output
    // Use RUST_LOG=debug to see exchange timings
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::System(cmd) => match cmd {
            SystemCommands::Config { action } => handle_config(action),
            SystemCommands::Init => handle_init(),
            SystemCommands::Completions { shell: Some(shell) } => {
                completions::generate_completions(shell);
                Ok(())
            }
            SystemCommands::Completions { shell: None } => {
                completions::print_install_hint();
                Ok(())
            }
        },
        Commands::Shop(cmd) => {
            let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            rt.block_on(run_shop(cmd, cli.json))
        }
    }
}

async fn run_shop(cmd: ShopCommand, json: bool) -> Result<()> {
    let cfg = config::load_config()?;
    let channel = cfg.engine.channel();
    tracing::debug!(
        executable = %channel.executable().display(),
        request = %channel.request_path().display(),
        response = %channel.response_path().display(),
        "Using engine"
    );

    let client = ShopClient::new(channel);
    shop::handle_shop_command(cmd, &client, json).await
}

fn handle_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let cfg = config::load_config()?;
            let toml_str = toml::to_string_pretty(&cfg)?;
            println!("{}", toml_str);
            Ok(())
        }
        ConfigAction::Get { key } => {
            let cfg = config::load_config()?;
            match config::get_config_value(&cfg, &key) {
                Some(value) => println!("{}", value),
                None => {
                    if config::KEYS.contains(&key.as_str()) {
                        println!("(not set)");
                    } else {
                        anyhow::bail!("Unknown config key: {}", key);
                    }
                }
            }
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            let mut cfg = config::load_config()?;
            config::set_config_value(&mut cfg, &key, &value)?;
            config::save_config(&cfg)?;
            println!("Set {} = {}", key, value);
            Ok(())
        }
        ConfigAction::Path => {
            let path = config::get_config_file()?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn handle_init() -> Result<()> {
    let config_file = config::get_config_file()?;

    if config_file.exists() {
        println!("Config file already exists: {}", config_file.display());
        return Ok(());
    }

    let cfg = config::Config::default();
    config::save_config(&cfg)?;
    println!("Created config file: {}", config_file.display());

    let channel = cfg.engine.channel();
    println!();
    println!("Default engine settings:");
    println!("  Executable: {}", channel.executable().display());
    println!("  Request file: {}", channel.request_path().display());
    println!("  Response file: {}", channel.response_path().display());
    println!("  Timeout: {} ms", channel.timeout().as_millis());
    println!();
    println!("Point the CLI at your engine with:");
    println!("  storefront config set engine.working_dir /path/to/engine");

    Ok(())
}
