//! Intent Analyzer.
//!
//! Asks the model, in isolation, whether the current message needs a tool,
//! and runs the tool-calling round trip on a copy of the transcript.

use smartday_core::error::{Error, ProviderError};
use smartday_core::message::{ToolCallRequest, Transcript, Turn};
use smartday_core::provider::{
    Provider, ProviderRequest, ProviderResponse, SamplingParams, ToolChoice, ToolDefinition,
};
use smartday_core::tool::{ToolKind, ToolRegistry};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Returned when any step of a tool run fails.
pub const TOOL_APOLOGY: &str = "[도구 실행 중 오류가 발생했습니다. 잠시 뒤에 다시 이용해주세요.]";

/// The model's answer to "does this message need a tool?".
#[derive(Debug, Clone)]
pub struct Analysis {
    /// The assistant turn exactly as the model returned it
    pub choice: Turn,
    pub first_call: Option<ToolCallRequest>,
    pub requested_calls: usize,
}

impl Analysis {
    fn from_response(response: ProviderResponse) -> Self {
        let calls = response.message.tool_calls();
        let first_call = calls.first().cloned();
        let requested_calls = calls.len();
        Self {
            choice: response.message,
            first_call,
            requested_calls,
        }
    }

    pub fn wants_tool(&self) -> bool {
        self.first_call.is_some()
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.first_call.as_ref().map(|c| c.name.as_str())
    }
}

/// Result of a tool round trip.
#[derive(Debug, Clone)]
pub struct ToolRun {
    pub response: ProviderResponse,
    /// Assistant tool-call turn and tool-result turn to merge into the live
    /// transcript. Empty when the run fell back to the apology.
    pub turns: Vec<Turn>,
    pub kind: Option<ToolKind>,
}

pub struct IntentAnalyzer {
    provider: Arc<dyn Provider>,
    model: String,
    tools: Arc<ToolRegistry>,
    sampling: SamplingParams,
}

impl IntentAnalyzer {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        sampling: SamplingParams,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            tools,
            sampling,
        }
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// One isolated request: just `message` and the tool catalog, with the
    /// model choosing whether to call a tool.
    ///
    /// Errors propagate; the caller decides how to recover.
    pub async fn analyze(
        &self,
        message: &str,
        catalog: &[ToolDefinition],
    ) -> Result<Analysis, ProviderError> {
        let request = ProviderRequest::new(&self.model, vec![Turn::user(message)])
            .with_tools(catalog.to_vec(), ToolChoice::Auto);

        let response = self.provider.complete(request).await?;
        let analysis = Analysis::from_response(response);
        debug!(
            wants_tool = analysis.wants_tool(),
            requested = analysis.requested_calls,
            tool = analysis.tool_name().unwrap_or("-"),
            "Intent analyzed"
        );
        if analysis.requested_calls > 1 {
            info!(requested = analysis.requested_calls, "Model asked for several tools, running the first");
        }
        Ok(analysis)
    }

    /// Execute the first requested call over `snapshot` and ask the model
    /// for the final answer.
    ///
    /// Never fails: argument, tool and model errors all become the
    /// [`TOOL_APOLOGY`] response.
    pub async fn run(&self, analysis: &Analysis, snapshot: Transcript) -> ToolRun {
        match self.try_run(analysis, snapshot).await {
            Ok(run) => run,
            Err(e) => {
                warn!(tool = analysis.tool_name().unwrap_or("-"), error = %e, "Tool run failed, substituting apology");
                ToolRun {
                    response: ProviderResponse::synthetic(TOOL_APOLOGY),
                    turns: Vec::new(),
                    kind: None,
                }
            }
        }
    }

    async fn try_run(&self, analysis: &Analysis, mut working: Transcript) -> Result<ToolRun, Error> {
        let call = analysis
            .first_call
            .clone()
            .ok_or_else(|| Error::Internal("no tool call requested".into()))?;

        let request_turn = Turn::Assistant {
            content: analysis.choice.content().to_string(),
            tags: BTreeSet::new(),
            tool_calls: vec![call.clone()],
        };
        working.push(request_turn.clone())?;

        let (kind, output) = self.tools.invoke_call(&call).await?;
        info!(tool = %kind, unavailable = output.is_unavailable(), "Tool invoked");

        let result_turn = Turn::tool_result(&call.id, kind.name(), output.to_string());
        working.push(result_turn.clone())?;

        let request = ProviderRequest::new(&self.model, working.turns().to_vec())
            .with_sampling(self.sampling.clone());
        let response = self.provider.complete(request).await?;

        Ok(ToolRun {
            response,
            turns: vec![request_turn, result_turn],
            kind: Some(kind),
        })
    }
}
