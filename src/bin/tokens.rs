use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use token_resolver::chain::ChainId;
use token_resolver::config::Config;
use token_resolver::naming::{DomainResolver, NameTable, NamingFanout};
use token_resolver::orchestrator::{ImportSink, Resolver, ResolverContext};
use token_resolver::query::commands::{
    ImportHint, cmd_add, cmd_clear, cmd_domain, cmd_list, cmd_remove, cmd_resolve,
};
use token_resolver::query::formatters::OutputFormat;
use token_resolver::registry::{StaticTokens, TokenRegistry};
use token_resolver::repository::{Database, SqliteRegistryStore};
use token_resolver::rpc::RpcClient;
use token_resolver::verifier::TokenVerifier;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tokens")]
#[command(about = "Resolve token addresses and names, and manage imported tokens", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "table")]
    format: String,

    /// Overrides CHAIN_ID
    #[arg(long)]
    chain_id: Option<ChainId>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an address or name and check whether it is a token
    Resolve { query: String },
    /// Resolve and add a confirmed token
    Add { query: String },
    Remove { address: String },
    /// Remove every user-added token on the chain
    Clear,
    List,
    /// Reverse lookup of an address's domain name and profile
    Domain { address: String },
}

struct App {
    config: Config,
    chain_id: ChainId,
    names: NameTable,
    naming: Arc<NamingFanout>,
    registry: Arc<TokenRegistry>,
}

impl App {
    fn new(config: Config, chain_id: ChainId) -> Result<Self> {
        let db = Database::new(&config.database_url)?;
        let store = Arc::new(SqliteRegistryStore::new(db));

        let static_tokens = config
            .token_list_path
            .as_ref()
            .map(StaticTokens::load)
            .transpose()?
            .unwrap_or_default();
        let registry = Arc::new(TokenRegistry::new(store, static_tokens));

        let names = config
            .names_path
            .as_ref()
            .map(NameTable::load)
            .transpose()?
            .unwrap_or_default();
        let naming = Arc::new(NamingFanout::new(names.providers(), config.provider_timeout));

        Ok(Self {
            config,
            chain_id,
            names,
            naming,
            registry,
        })
    }

    fn resolver(&self, import: Option<Arc<dyn ImportSink>>) -> Result<Resolver> {
        let client = RpcClient::new(
            self.config.require_rpc()?,
            self.chain_id,
            self.config.multicall_address,
        )?;
        info!("RPC client ready on {}", client.get_current_url());

        Ok(Resolver::spawn(ResolverContext {
            chain_id: self.chain_id,
            // One-shot queries have nothing to debounce against.
            debounce: std::time::Duration::ZERO,
            naming: self.naming.clone(),
            registry: self.registry.clone(),
            verifier: Arc::new(TokenVerifier::new(Arc::new(client))),
            import,
        }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::from(cli.format.as_str());

    let config = Config::from_env()?;
    let chain_id = cli.chain_id.unwrap_or(config.chain_id);
    let app = App::new(config, chain_id)?;

    match cli.command {
        Commands::Resolve { query } => {
            let resolver = app.resolver(Some(Arc::new(ImportHint) as Arc<dyn ImportSink>))?;
            cmd_resolve(&resolver, &query, &format).await?;
        }
        Commands::Add { query } => {
            let resolver = app.resolver(None)?;
            cmd_add(&resolver, &app.registry, chain_id, &query, &format).await?;
        }
        Commands::Remove { address } => {
            cmd_remove(&app.registry, chain_id, &address)?;
        }
        Commands::Clear => {
            cmd_clear(&app.registry, chain_id)?;
        }
        Commands::List => {
            cmd_list(&app.registry, chain_id, &format)?;
        }
        Commands::Domain { address } => {
            let resolver =
                DomainResolver::new(app.naming.clone(), Some(app.names.profile_source()));
            cmd_domain(&resolver, chain_id, &address, &format).await?;
        }
    }

    Ok(())
}
