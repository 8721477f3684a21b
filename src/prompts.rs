//! Static prompt templates. Prompts only interpolate their arguments into
//! message text; they never call upstreams.

use rmcp::model::{
    GetPromptResult, Prompt, PromptArgument, PromptMessage, PromptMessageRole,
};
use rmcp::ErrorData as McpError;
use serde_json::Value;

type PromptArgs = Option<serde_json::Map<String, Value>>;

fn arg(args: &PromptArgs, name: &str) -> Option<String> {
    args.as_ref()
        .and_then(|map| map.get(name))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .filter(|s| !s.trim().is_empty())
}

fn required_arg(args: &PromptArgs, name: &str) -> Result<String, McpError> {
    arg(args, name)
        .ok_or_else(|| McpError::invalid_params(format!("missing required argument '{name}'"), None))
}

fn argument(name: &str, description: &str, required: bool) -> PromptArgument {
    PromptArgument {
        name: name.to_string(),
        title: None,
        description: Some(description.to_string()),
        required: Some(required),
    }
}

pub fn list() -> Vec<Prompt> {
    vec![
        Prompt::new(
            "research_package",
            Some("Evaluate a package before adopting it: health, popularity, maintenance, and upgrade risk."),
            Some(vec![
                argument("package", "Package name to research", true),
                argument("registry", "npm, pypi, crates, or go (default: auto-detect)", false),
            ]),
        ),
        Prompt::new(
            "debug_error",
            Some("Work through an error message systematically using the error-translation tools."),
            Some(vec![
                argument("error", "The full error message or traceback", true),
                argument("language", "Language hint, e.g. python or rust", false),
                argument("framework", "Framework hint, e.g. react or django", false),
            ]),
        ),
        Prompt::new(
            "compare_technologies",
            Some("Compare technologies for a decision, aspect by aspect, with sources."),
            Some(vec![
                argument("technologies", "Comma-separated list of 2-5 technology names", true),
                argument("category", "framework, library, database, language, or tool", false),
            ]),
        ),
        Prompt::new(
            "evaluate_repository",
            Some("Judge a repository's health: activity, maintenance, community, and fit."),
            Some(vec![argument("repo", "owner/repo or a GitHub URL", true)]),
        ),
        Prompt::new(
            "check_service_health",
            Some("Check one or more external services for outages before debugging your own code."),
            Some(vec![argument(
                "services",
                "Comma-separated service names, e.g. github, stripe",
                true,
            )]),
        ),
    ]
}

pub fn get(name: &str, args: PromptArgs) -> Result<GetPromptResult, McpError> {
    let messages = match name {
        "research_package" => {
            let package = required_arg(&args, "package")?;
            let registry = arg(&args, "registry").unwrap_or_else(|| "auto".into());
            vec![PromptMessage::new_text(
                PromptMessageRole::User,
                format!(
                    "Research the package `{package}` (registry: {registry}) before we adopt it.\n\
                     1. Use package_info for version, license, downloads, and maintenance recency.\n\
                     2. Use github_repo on its repository for stars, open issues, and recent commits.\n\
                     3. Use get_changelog to gauge upgrade difficulty and breaking-change habits.\n\
                     Summarize: health, popularity, maintenance cadence, and any risks."
                ),
            )]
        }
        "debug_error" => {
            let error = required_arg(&args, "error")?;
            let language = arg(&args, "language");
            let framework = arg(&args, "framework");
            let mut hints = String::new();
            if let Some(language) = language {
                hints.push_str(&format!(" The language is {language}."));
            }
            if let Some(framework) = framework {
                hints.push_str(&format!(" The framework is {framework}."));
            }
            vec![PromptMessage::new_text(
                PromptMessageRole::User,
                format!(
                    "Help me fix this error.{hints}\n\n```\n{error}\n```\n\n\
                     Use translate_error to identify the error type and find solutions, \
                     then explain the most likely cause and the fix in my context. \
                     If the top results disagree, say so."
                ),
            )]
        }
        "compare_technologies" => {
            let technologies = required_arg(&args, "technologies")?;
            let category = arg(&args, "category").unwrap_or_else(|| "auto".into());
            vec![PromptMessage::new_text(
                PromptMessageRole::User,
                format!(
                    "Compare these technologies for an upcoming decision: {technologies} \
                     (category: {category}).\n\
                     Use compare_tech for the matrix, then package_info/github_repo where numbers \
                     matter. End with a recommendation and the trade-off it accepts."
                ),
            )]
        }
        "evaluate_repository" => {
            let repo = required_arg(&args, "repo")?;
            vec![PromptMessage::new_text(
                PromptMessageRole::User,
                format!(
                    "Evaluate the repository {repo}.\n\
                     Use github_repo for activity and community signals, and get_changelog if it \
                     ships releases. Verdict: actively maintained, coasting, or abandoned — with \
                     the evidence."
                ),
            )]
        }
        "check_service_health" => {
            let services = required_arg(&args, "services")?;
            vec![PromptMessage::new_text(
                PromptMessageRole::User,
                format!(
                    "Check the health of these services: {services}.\n\
                     Run check_service_status for each, then summarize which are degraded and \
                     whether any observed problems could be caused by them rather than our code."
                ),
            )]
        }
        other => {
            return Err(McpError::invalid_params(
                format!("Unknown prompt: {other}"),
                None,
            ))
        }
    };

    Ok(GetPromptResult {
        description: None,
        messages,
    })
}
