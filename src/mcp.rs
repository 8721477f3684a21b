//! MCP (Model Context Protocol) server glue.
//!
//! Exposes the orchestrator's tool registry, the URI-templated resources,
//! and the prompt catalog over stdio JSON-RPC. This layer only serializes;
//! dispatch, validation, clamping, and usage tracking live in
//! [`crate::orchestrator`].

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::{
    model::*, service::RequestContext, ErrorData as McpError, RoleServer, ServerHandler,
    ServiceExt,
};

use crate::error::ResearchError;
use crate::orchestrator::Orchestrator;
use crate::prompts;

#[derive(Clone)]
pub struct ResearchMcp {
    orchestrator: Arc<Orchestrator>,
}

impl ResearchMcp {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    fn describe_tools(&self) -> Vec<Tool> {
        self.orchestrator
            .tools()
            .iter()
            .map(|spec| {
                let schema = (spec.schema)();
                let schema_object = schema.as_object().cloned().unwrap_or_default();
                Tool {
                    name: Cow::Borrowed(spec.name),
                    title: None,
                    description: Some(Cow::Borrowed(spec.description)),
                    input_schema: Arc::new(schema_object),
                    output_schema: None,
                    annotations: None,
                    execution: None,
                    icons: None,
                    meta: None,
                }
            })
            .collect()
    }

    fn describe_resource_templates(&self) -> Vec<ResourceTemplate> {
        let template = |uri_template: &str, name: &str, description: &str| {
            RawResourceTemplate {
                uri_template: uri_template.to_string(),
                name: name.to_string(),
                title: None,
                description: Some(description.to_string()),
                mime_type: Some("application/json".to_string()),
                icons: None,
            }
            .no_annotation()
        };
        vec![
            template(
                "package://{registry}/{name}",
                "package",
                "Package metadata from npm, pypi, crates, or go",
            ),
            template(
                "github://{owner}/{repo}",
                "github-repo",
                "Repository metadata, including recent commits",
            ),
            template(
                "status://{service}",
                "service-status",
                "Current operational status of a service",
            ),
            template(
                "changelog://{registry}/{package}",
                "changelog",
                "Classified release notes with upgrade difficulty",
            ),
        ]
    }
}

fn resource_error(err: ResearchError) -> McpError {
    match err {
        ResearchError::InvalidInput(_) | ResearchError::NotFound(_) => {
            McpError::invalid_params(err.to_string(), None)
        }
        other => McpError::internal_error(other.to_string(), None),
    }
}

impl ServerHandler for ResearchMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Developer research assistant. Tools: web_search, search_examples, \
                 search_images, crawl_url, package_info, package_search, github_repo, \
                 translate_error, api_docs, extract_data, compare_tech, get_changelog, \
                 check_service_status. Every tool requires a `reasoning` parameter \
                 explaining why the call is being made. Resources mirror the lookup \
                 tools as JSON (package://, github://, status://, changelog://)."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: "web-research-assistant".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: Some("Web Research Assistant".into()),
                description: Some(
                    "Web search, package, repository, docs, and status research tools".into(),
                ),
                icons: None,
                website_url: None,
            },
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult {
            tools: self.describe_tools(),
            next_cursor: None,
            meta: Default::default(),
        }))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        let orchestrator = self.orchestrator.clone();
        async move {
            let params = serde_json::Value::Object(request.arguments.unwrap_or_default());
            // The orchestrator converts every failure into readable text, so
            // the transport never sees a protocol-level tool error.
            let body = orchestrator.invoke(&request.name, params).await;
            Ok(CallToolResult::success(vec![Content::text(body)]))
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        // Everything this server serves is parameterized; only templates exist.
        std::future::ready(Ok(ListResourcesResult {
            resources: Vec::new(),
            next_cursor: None,
            meta: Default::default(),
        }))
    }

    fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourceTemplatesResult, McpError>> + Send + '_
    {
        std::future::ready(Ok(ListResourceTemplatesResult {
            resource_templates: self.describe_resource_templates(),
            next_cursor: None,
            meta: Default::default(),
        }))
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        let orchestrator = self.orchestrator.clone();
        async move {
            let document = orchestrator
                .read_resource(&request.uri)
                .await
                .map_err(resource_error)?;
            let text = serde_json::to_string_pretty(&document)
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;
            Ok(ReadResourceResult {
                contents: vec![ResourceContents::TextResourceContents {
                    uri: request.uri,
                    mime_type: Some("application/json".into()),
                    text,
                    meta: Default::default(),
                }],
            })
        }
    }

    fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListPromptsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListPromptsResult {
            prompts: prompts::list(),
            next_cursor: None,
            meta: Default::default(),
        }))
    }

    fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<GetPromptResult, McpError>> + Send + '_ {
        std::future::ready(prompts::get(&request.name, request.arguments))
    }
}

/// Start the MCP server on stdio. Returns when the host closes the stream.
pub async fn serve_stdio(orchestrator: Arc<Orchestrator>) -> Result<(), Box<dyn std::error::Error>> {
    let server = ResearchMcp::new(orchestrator);
    let transport = rmcp::transport::io::stdio();
    let service = server.serve(transport).await.inspect_err(|e| {
        tracing::error!("MCP serve error: {e}");
    })?;
    service.waiting().await?;
    Ok(())
}
