use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use web_research_assistant::config::Settings;
use web_research_assistant::mcp;
use web_research_assistant::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(
    name = "web-research-assistant",
    version,
    about = "Developer research assistant: web, package, repo, and service-status tools over MCP"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdio (the default when no subcommand is given).
    /// AI hosts (Claude Desktop, Cursor, etc.) connect via JSON-RPC.
    Serve,
    /// Print the tool catalog with parameter schemas as JSON
    Tools,
    /// Invoke a single tool and print its reply (handy for smoke tests)
    Call {
        /// Tool name, e.g. web_search
        tool: String,
        /// Tool parameters as a JSON object
        #[arg(short, long, default_value = "{}")]
        params: String,
        /// Shorthand for the mandatory `reasoning` parameter
        #[arg(short, long)]
        reasoning: Option<String>,
    },
}

fn main() {
    // stdout belongs to the MCP transport; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    info!(
        search = %settings.searxng_url,
        clamp = settings.max_response_chars,
        usage_log = %settings.usage_log.display(),
        pixabay = settings.pixabay_api_key.is_some(),
        github_token = settings.github_token.is_some(),
        "starting web-research-assistant"
    );

    let orchestrator = Arc::new(Orchestrator::new(settings));

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => rt.block_on(async {
            if let Err(e) = mcp::serve_stdio(orchestrator).await {
                eprintln!("MCP server error: {e}");
                std::process::exit(1);
            }
        }),
        Commands::Tools => {
            let catalog: Vec<serde_json::Value> = orchestrator
                .tools()
                .iter()
                .map(|spec| {
                    serde_json::json!({
                        "name": spec.name,
                        "description": spec.description,
                        "input_schema": (spec.schema)(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&catalog).unwrap_or_default());
        }
        Commands::Call {
            tool,
            params,
            reasoning,
        } => {
            let mut params: serde_json::Value = match serde_json::from_str(&params) {
                Ok(value) => value,
                Err(e) => {
                    eprintln!("--params must be a JSON object: {e}");
                    std::process::exit(2);
                }
            };
            if let (Some(reasoning), Some(obj)) = (reasoning, params.as_object_mut()) {
                obj.insert("reasoning".into(), serde_json::Value::String(reasoning));
            }
            let body = rt.block_on(orchestrator.invoke(&tool, params));
            println!("{body}");
        }
    }
}
