use std::collections::BTreeMap;
use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use serde::Serialize;

mod params;

use params::*;

use crate::camelot::{self, CamelotCode, CamelotPriority};
use crate::config::ResultsConfig;
use crate::error::MatchError;
use crate::index::{BuildReport, CollectionStats};
use crate::session::MatchSession;

const TOP_COUNT: usize = 10;

fn internal(msg: String) -> McpError {
    McpError::internal_error(msg, None)
}

/// Caller mistakes become `invalid_params`; everything else is internal.
fn match_error(e: MatchError) -> McpError {
    if e.is_caller_error() {
        McpError::invalid_params(e.to_string(), None)
    } else {
        internal(e.to_string())
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| internal(format!("{e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[derive(Debug, Serialize)]
struct HarmonicEntry {
    code: CamelotCode,
    key: &'static str,
    priority: CamelotPriority,
    priority_value: u8,
}

#[derive(Debug, Serialize)]
struct StatsResponse<'a> {
    stats: &'a CollectionStats,
    report: &'a BuildReport,
    key_distribution: BTreeMap<String, usize>,
    top_labels: Vec<(String, usize)>,
    top_artists: Vec<(String, usize)>,
}

#[derive(Clone)]
pub struct MixwheelServer {
    session: Arc<MatchSession>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl MixwheelServer {
    pub fn new(session: Arc<MatchSession>) -> Self {
        Self {
            session,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Find harmonic next-track candidates for a reference track. Returns ranked same-key, step-up and step-down buckets with per-factor subscores."
    )]
    async fn find_matches(
        &self,
        params: Parameters<FindMatchesParams>,
    ) -> Result<CallToolResult, McpError> {
        let FindMatchesParams { track, max_results } = params.0;
        let policy = match max_results {
            Some(0) => {
                return Err(McpError::invalid_params(
                    "max_results must be at least 1".to_string(),
                    None,
                ));
            }
            Some(max) => Some(ResultsConfig {
                max_results: max,
                ..self.session.config().results
            }),
            None => None,
        };

        let session = Arc::clone(&self.session);
        let report = tokio::task::spawn_blocking(move || match policy {
            Some(policy) => session.find_matches_with(&track, &policy),
            None => session.find_matches(&track),
        })
        .await
        .map_err(|e| internal(format!("Match task failed: {e}")))?
        .map_err(match_error)?;
        json_result(&report)
    }

    #[tool(description = "Rebuild the collection index from the track store")]
    async fn reload_collection(&self) -> Result<CallToolResult, McpError> {
        let session = Arc::clone(&self.session);
        let summary = tokio::task::spawn_blocking(move || session.reload())
            .await
            .map_err(|e| internal(format!("Reload task failed: {e}")))?
            .map_err(match_error)?;
        json_result(&summary)
    }

    #[tool(
        description = "Statistics for the loaded collection: track counts, key distribution, top labels and artists, skipped tracks"
    )]
    async fn collection_stats(&self) -> Result<CallToolResult, McpError> {
        let collection = self.session.snapshot().map_err(match_error)?;
        let key_distribution = collection
            .index()
            .iter()
            .map(|(code, by_bpm)| (code.to_string(), by_bpm.values().map(Vec::len).sum()))
            .collect();
        json_result(&StatsResponse {
            stats: collection.stats(),
            report: collection.report(),
            key_distribution,
            top_labels: collection.stats().top_labels(TOP_COUNT),
            top_artists: collection.stats().top_artists(TOP_COUNT),
        })
    }

    #[tool(
        description = "List the Camelot codes that mix harmonically with a code or key, with their priority"
    )]
    async fn harmonic_codes(
        &self,
        params: Parameters<HarmonicCodesParams>,
    ) -> Result<CallToolResult, McpError> {
        let raw = params.0.code;
        let code = camelot::key_to_camelot(&raw).ok_or_else(|| {
            McpError::invalid_params(format!("Unrecognized Camelot code or key: '{raw}'"), None)
        })?;
        let entries: Vec<HarmonicEntry> = camelot::harmonic_codes(code)
            .into_iter()
            .map(|(code, priority)| HarmonicEntry {
                code,
                key: code.key_name(),
                priority,
                priority_value: priority.value(),
            })
            .collect();
        json_result(&entries)
    }
}

#[tool_handler]
impl ServerHandler for MixwheelServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Harmonic mixing assistant. Look up a track and get ranked next-track \
                 candidates that are key-compatible on the Camelot wheel and within \
                 pitch range. Reload after importing new tracks."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
