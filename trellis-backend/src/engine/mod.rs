//! Agent execution engine - the bounded tool-calling loop
//!
//! One invocation repeatedly asks the configured backend for a completion,
//! executes whatever tool calls come back (with full containment), and feeds
//! the results into the next iteration until the model answers without
//! calling tools. The loop is bounded to the resolved tool set and a maximum
//! iteration count.

pub mod stream;

pub use stream::{event_channel, AgentEvent, EventSink, EventStream, EVENT_BUFFER};

use crate::ai::{AiClient, Message, ToolCall, ToolHistoryEntry, ToolResponse};
use crate::error::CoreError;
use crate::memory::ConversationMemory;
use crate::models::MemoryRole;
use crate::tools::{execute_contained, Tool, ToolContext, ToolDefinition, ToolResult};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Maximum number of tool execution iterations per invocation
const MAX_TOOL_ITERATIONS: usize = 10;

/// One entry of the ordered tool-invocation trace
#[derive(Debug, Clone, Serialize)]
pub struct IntermediateStep {
    pub tool_name: String,
    pub arguments: Value,
    pub tool_output: String,
}

/// Result of a non-streaming invocation
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    pub output: String,
    pub intermediate_steps: Vec<IntermediateStep>,
}

#[derive(Clone)]
pub struct AgentExecutionEngine {
    client: AiClient,
    tools: Vec<Arc<dyn Tool>>,
    memory: Option<Arc<dyn ConversationMemory>>,
    conversation_id: Option<String>,
    context: ToolContext,
    max_iterations: usize,
}

impl AgentExecutionEngine {
    pub fn new(client: AiClient, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            client,
            tools,
            memory: None,
            conversation_id: None,
            context: ToolContext::new(),
            max_iterations: MAX_TOOL_ITERATIONS,
        }
    }

    /// Attach durable memory keyed by conversation id. History is read
    /// before the invocation and the new turn appended after it completes;
    /// nothing spans the read-call-append sequence atomically.
    pub fn with_memory(
        mut self,
        memory: Arc<dyn ConversationMemory>,
        conversation_id: impl Into<String>,
    ) -> Self {
        self.memory = Some(memory);
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_context(mut self, context: ToolContext) -> Self {
        self.context = context;
        self
    }

    /// Run one blocking invocation to completion and return the full answer
    /// plus the ordered tool trace.
    pub async fn ask(&self, message: &str) -> Result<AgentOutcome, CoreError> {
        let tool_defs = self.tool_definitions();
        let messages = self.build_messages(message)?;
        let mut history: Vec<ToolHistoryEntry> = Vec::new();
        let mut steps: Vec<IntermediateStep> = Vec::new();
        let mut iterations = 0;

        let output = loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(CoreError::Backend(format!(
                    "agent loop exceeded {} iterations without a final answer",
                    self.max_iterations
                )));
            }

            log::debug!("[AGENT_LOOP] Iteration {} starting", iterations);

            let response = self
                .client
                .generate_with_tools(messages.clone(), &history, &tool_defs)
                .await
                .map_err(CoreError::Backend)?;

            if response.tool_calls.is_empty() {
                break response.content;
            }

            let responses = self
                .run_tool_calls(&response.tool_calls, &mut steps, None)
                .await;
            history.push(ToolHistoryEntry::new(response.tool_calls, responses));
        };

        self.append_turn(message, &output);

        log::info!(
            "[AGENT_LOOP] Invocation finished after {} iteration(s), {} tool call(s)",
            iterations,
            steps.len()
        );

        Ok(AgentOutcome {
            output,
            intermediate_steps: steps,
        })
    }

    /// Run one invocation as a live event stream. The loop runs on its own
    /// task; the returned stream yields events in producer order and ends
    /// when the invocation completes. Cancelling (or dropping) the stream
    /// stops the task relaying at its next emission point.
    pub fn stream(&self, message: &str) -> EventStream {
        let (sink, stream) = event_channel(EVENT_BUFFER);
        let engine = self.clone();
        let message = message.to_string();

        tokio::spawn(async move {
            engine.run_streaming(message, sink).await;
        });

        stream
    }

    async fn run_streaming(self, message: String, sink: EventSink) {
        let tool_defs = self.tool_definitions();
        let messages = match self.build_messages(&message) {
            Ok(m) => m,
            Err(e) => {
                log::error!("[AGENT_LOOP] Failed to build conversation: {}", e);
                return;
            }
        };
        let mut history: Vec<ToolHistoryEntry> = Vec::new();
        let mut steps: Vec<IntermediateStep> = Vec::new();
        let mut iterations = 0;

        let output = loop {
            iterations += 1;
            if iterations > self.max_iterations {
                log::warn!(
                    "[AGENT_LOOP] Streaming invocation exceeded {} iterations",
                    self.max_iterations
                );
                return;
            }
            if sink.is_cancelled() {
                log::info!("[AGENT_LOOP] Consumer cancelled, stopping invocation");
                return;
            }

            // Token deltas flow through a side channel so the backend client
            // stays unaware of the event protocol
            let (token_tx, mut token_rx) = mpsc::channel::<String>(32);
            let token_sink = sink.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(text) = token_rx.recv().await {
                    if !token_sink.emit(AgentEvent::Token { data: text }).await {
                        break;
                    }
                }
            });

            let response = self
                .client
                .stream_with_tools(messages.clone(), &history, &tool_defs, token_tx)
                .await;
            let _ = forwarder.await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    log::error!("[AGENT_LOOP] Streaming generation failed: {}", e);
                    return;
                }
            };

            if response.tool_calls.is_empty() {
                break response.content;
            }

            let responses = self
                .run_tool_calls(&response.tool_calls, &mut steps, Some(&sink))
                .await;
            if responses.len() < response.tool_calls.len() {
                // Cancelled mid-round; the partial trace is not persisted
                return;
            }
            history.push(ToolHistoryEntry::new(response.tool_calls, responses));
        };

        self.append_turn(&message, &output);

        log::info!(
            "[AGENT_LOOP] Streaming invocation finished after {} iteration(s), {} tool call(s)",
            iterations,
            steps.len()
        );
    }

    /// Execute one round of tool calls in order, recording the trace.
    /// With a sink, a tool_start event precedes every execution; a failed
    /// emit (cancelled consumer) stops the round short.
    async fn run_tool_calls(
        &self,
        calls: &[ToolCall],
        steps: &mut Vec<IntermediateStep>,
        sink: Option<&EventSink>,
    ) -> Vec<ToolResponse> {
        let mut responses = Vec::with_capacity(calls.len());

        for call in calls {
            if let Some(sink) = sink {
                let emitted = sink
                    .emit(AgentEvent::ToolStart {
                        tool: call.name.clone(),
                        tool_input: call.arguments.clone(),
                    })
                    .await;
                if !emitted {
                    return responses;
                }
            }

            let result = self.execute_call(call).await;

            steps.push(IntermediateStep {
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
                tool_output: result.content.clone(),
            });
            responses.push(ToolResponse {
                tool_call_id: call.id.clone(),
                content: result.content,
                is_error: !result.success,
            });
        }

        responses
    }

    /// Execute one call against the resolved tool set. A call naming a tool
    /// outside the set is answered with an error result, not executed.
    async fn execute_call(&self, call: &ToolCall) -> ToolResult {
        let tool = self
            .tools
            .iter()
            .find(|t| t.definition().name == call.name)
            .cloned();

        match tool {
            Some(tool) => {
                log::info!("[AGENT_LOOP] Executing tool '{}'", call.name);
                execute_contained(tool, call.arguments.clone(), self.context.clone()).await
            }
            None => {
                log::warn!(
                    "[AGENT_LOOP] Model requested tool '{}' outside the resolved set",
                    call.name
                );
                ToolResult::error(format!(
                    "Tool '{}' is not available in this conversation",
                    call.name
                ))
            }
        }
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// System prompt, prior conversation turns, then the current message
    fn build_messages(&self, message: &str) -> Result<Vec<Message>, CoreError> {
        let tool_names: Vec<String> = self.tools.iter().map(|t| t.definition().name).collect();
        let mut messages = vec![Message::system(format!(
            "You are a data-provider agent. Answer the user's request using the \
             conversation history and the available tools. Prefer calling a tool over \
             guessing whenever one can supply the data.\n\nAvailable tools: {}",
            tool_names.join(", ")
        ))];

        if let (Some(memory), Some(conversation_id)) = (&self.memory, &self.conversation_id) {
            for record in memory.read_all(conversation_id)? {
                let msg = match record.role {
                    MemoryRole::Human => Message::user(record.content),
                    MemoryRole::Ai => Message::assistant(record.content),
                };
                messages.push(msg);
            }
        }

        messages.push(Message::user(message.to_string()));
        Ok(messages)
    }

    /// Persist the completed human/ai turn. Storage failures are logged, not
    /// surfaced - the answer was already produced.
    fn append_turn(&self, message: &str, output: &str) {
        if let (Some(memory), Some(conversation_id)) = (&self.memory, &self.conversation_id) {
            if let Err(e) = memory.append(conversation_id, MemoryRole::Human, message) {
                log::error!("[AGENT_LOOP] Failed to store user turn: {}", e);
            }
            if let Err(e) = memory.append(conversation_id, MemoryRole::Ai, output) {
                log::error!("[AGENT_LOOP] Failed to store agent turn: {}", e);
            }
        }
    }
}
