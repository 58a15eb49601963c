//! fixhub CLI - agent-authored fixes as GitHub pull requests
//!
//! Usage:
//!   fixhub init                                   Write a default fixhub.toml
//!   fixhub submit -e owner/repo -p "task"         Run a task through the agent
//!   fixhub history                                List stored requests
//!   fixhub apply --diff fix.patch --original f    Apply a diff locally
//!   fixhub jwt                                    Print a GitHub App JWT
//!   fixhub token                                  Request an installation token
//!   fixhub verify-webhook --payload body.json --signature sha256=...

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fixhub_agent::ResponsesClient;
use fixhub_core::config::DEFAULT_CONFIG_FILE;
use fixhub_core::FixhubConfig;
use fixhub_github::{
    FixPublisher, GithubApi, GithubClient, GithubTransport, InstallationTokenCache,
    RepositoryContextBuilder, RepositoryFileService, TokenSigner,
};
use fixhub_session::{AgentSession, FixService, JsonFileRequestStore, RequestStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "fixhub")]
#[command(author, version, about = "Turn agent-authored diffs into GitHub pull requests")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (defaults to fixhub.toml in the working directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Where to write the file
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Run a task through the agent and publish its fix
    Submit {
        /// Repository as owner/repo
        #[arg(short, long)]
        environment: String,

        /// Task description
        #[arg(short, long, conflicts_with = "prompt_file")]
        prompt: Option<String>,

        /// Read the task description from a file
        #[arg(long, value_name = "FILE")]
        prompt_file: Option<PathBuf>,
    },

    /// List stored requests, newest first
    History {
        /// Show at most this many requests
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print the full response text
        #[arg(long)]
        full: bool,
    },

    /// Apply a unified diff to a local file and print the result
    Apply {
        /// Diff file
        #[arg(long, value_name = "FILE")]
        diff: PathBuf,

        /// Original file; omitted for new files
        #[arg(long, value_name = "FILE")]
        original: Option<PathBuf>,

        /// Which file of the diff to apply (defaults to the first)
        #[arg(long)]
        path: Option<String>,
    },

    /// Print a freshly signed GitHub App JWT
    Jwt,

    /// Request a GitHub installation token
    Token {
        /// Print the token instead of a masked form
        #[arg(long)]
        reveal: bool,
    },

    /// Check a webhook payload against its X-Hub-Signature-256 header
    VerifyWebhook {
        /// Raw payload file
        #[arg(long, value_name = "FILE")]
        payload: PathBuf,

        /// Header value, sha256=<hex>
        #[arg(long)]
        signature: String,

        /// Webhook secret (defaults to the configured one)
        #[arg(long)]
        secret: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Submit {
            environment,
            prompt,
            prompt_file,
        } => cmd_submit(config_path, environment, prompt, prompt_file).await,
        Commands::History { limit, full } => cmd_history(config_path, limit, full),
        Commands::Apply {
            diff,
            original,
            path,
        } => cmd_apply(&diff, original.as_deref(), path.as_deref()),
        Commands::Jwt => cmd_jwt(config_path),
        Commands::Token { reveal } => cmd_token(config_path, reveal).await,
        Commands::VerifyWebhook {
            payload,
            signature,
            secret,
        } => cmd_verify_webhook(config_path, &payload, &signature, secret),
    }
}

fn load_config(path: Option<&Path>) -> Result<FixhubConfig> {
    FixhubConfig::load(path).context("Failed to load configuration")
}

struct GithubStack {
    signer: Arc<TokenSigner>,
    tokens: Arc<InstallationTokenCache>,
    api: Arc<dyn GithubApi>,
}

fn github_stack(config: &FixhubConfig) -> Result<GithubStack> {
    let signer = Arc::new(TokenSigner::from_config(&config.github));
    let transport = GithubTransport::from_config(&config.github)?;
    let installation_id = config.github.installation_id()?;
    let tokens = Arc::new(InstallationTokenCache::new(
        signer.clone(),
        Arc::new(transport.clone()),
        installation_id,
    ));
    let api: Arc<dyn GithubApi> = Arc::new(GithubClient::new(transport, tokens.clone()));
    Ok(GithubStack {
        signer,
        tokens,
        api,
    })
}

fn open_store(config: &FixhubConfig) -> Arc<dyn RequestStore> {
    Arc::new(JsonFileRequestStore::new(config.store.path.clone()))
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    FixhubConfig::write_default(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    println!("Set GITHUB_APP_ID, GITHUB_PRIVATE_KEY_FILE, GITHUB_INSTALLATION_ID and OPENAI_API_KEY");
    println!("or fill in the [github] and [agent] sections.");
    Ok(())
}

async fn cmd_submit(
    config_path: Option<&Path>,
    environment: String,
    prompt: Option<String>,
    prompt_file: Option<PathBuf>,
) -> Result<()> {
    let prompt = match (prompt, prompt_file) {
        (Some(prompt), _) => prompt,
        (None, Some(file)) => std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read prompt file {}", file.display()))?,
        (None, None) => bail!("Provide --prompt or --prompt-file"),
    };

    let config = load_config(config_path)?;
    let github = github_stack(&config)?;
    let agent = ResponsesClient::from_config(&config.agent)?;

    let publisher = FixPublisher::new(github.api.clone())
        .with_branch_prefix(config.github.branch_prefix.clone());
    let files = RepositoryFileService::new(github.api.clone())
        .with_default_ref(config.session.default_branch.clone());
    let session = AgentSession::new(Arc::new(agent), Arc::new(files), Arc::new(publisher))
        .with_config(config.session.clone());
    let service = FixService::new(
        RepositoryContextBuilder::new(github.api.clone()),
        session,
        open_store(&config),
    );

    info!("Submitting task for {}", environment);
    let (record, outcome) = service
        .submit_with_outcome(&environment, &prompt)
        .await
        .context("Task failed")?;

    println!("Request {} ({:?}, {} round(s))", record.id, outcome.stop_reason, outcome.rounds);
    println!();
    println!("{}", record.response_text.as_deref().unwrap_or_default());
    Ok(())
}

fn cmd_history(config_path: Option<&Path>, limit: Option<usize>, full: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let records = open_store(&config)
        .list_all()
        .context("Failed to read request history")?;

    if records.is_empty() {
        println!("No requests recorded in {}", config.store.path.display());
        return Ok(());
    }

    for record in records.iter().take(limit.unwrap_or(usize::MAX)) {
        println!(
            "{}  {}  {}  {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.id,
            record.environment,
            record.model
        );
        println!("  prompt: {}", first_line(&record.prompt));
        if let Some(text) = &record.response_text {
            if full {
                for line in text.lines() {
                    println!("  | {}", line);
                }
            } else {
                println!("  result: {}", first_line(text));
            }
        }
    }
    Ok(())
}

fn first_line(text: &str) -> &str {
    text.trim().lines().next().unwrap_or_default()
}

fn cmd_apply(diff_path: &Path, original: Option<&Path>, path: Option<&str>) -> Result<()> {
    let diff_text = std::fs::read_to_string(diff_path)
        .with_context(|| format!("Failed to read {}", diff_path.display()))?;
    let diff = fixhub_patch::parse(&diff_text);

    let file = match path {
        Some(path) => diff
            .get(path)
            .with_context(|| format!("Diff does not touch {}", path))?,
        None => diff
            .files()
            .first()
            .context("Diff contains no file changes")?,
    };

    let original_text = original
        .map(|p| {
            std::fs::read_to_string(p).with_context(|| format!("Failed to read {}", p.display()))
        })
        .transpose()?;

    info!(
        "Applying {} hunk(s) to {}",
        file.hunks.len(),
        file.new_path
    );
    print!("{}", fixhub_patch::apply(original_text.as_deref(), file));
    Ok(())
}

fn cmd_jwt(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let signer = TokenSigner::from_config(&config.github);
    let jwt = signer.create_jwt().context("Failed to sign GitHub App JWT")?;
    println!("{}", jwt);
    Ok(())
}

async fn cmd_token(config_path: Option<&Path>, reveal: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let github = github_stack(&config)?;
    let token = github
        .tokens
        .get_installation_token()
        .await
        .context("Failed to obtain installation token")?;

    if reveal {
        println!("{}", token);
    } else {
        println!("{}", mask(&token));
    }
    if let Some(cached) = github.tokens.cached() {
        println!("expires at {}", cached.expires_at);
    }
    info!("Token issued for app {}", github.signer.masked_app_id());
    Ok(())
}

fn mask(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{}****", visible)
}

fn cmd_verify_webhook(
    config_path: Option<&Path>,
    payload: &Path,
    signature: &str,
    secret: Option<String>,
) -> Result<()> {
    let secret = match secret {
        Some(secret) => secret,
        None => load_config(config_path)?
            .github
            .webhook_secret
            .filter(|s| !s.trim().is_empty())
            .context("No webhook secret given or configured (GITHUB_WEBHOOK_SECRET)")?,
    };
    let body = std::fs::read(payload)
        .with_context(|| format!("Failed to read {}", payload.display()))?;

    if fixhub_github::verify_signature(&body, secret.as_bytes(), signature.trim()) {
        println!("Signature valid");
        Ok(())
    } else {
        bail!("Signature does not match payload")
    }
}
