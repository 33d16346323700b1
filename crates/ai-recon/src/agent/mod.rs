//! The `agent` module is a bounded tool-calling (ReAct) loop.
//!
//! The loop alternates between asking the model and running the tools it calls,
//! until the model answers or `max_iterations` model calls were made.
//! One iteration is one model call.
//!
//! The model is behind the [`ChatModel`] trait and the tools behind [`WeatherTools`],
//! so the loop runs the same against OpenAI or against in-memory fakes.

// region:    --- Modules

mod tools;

pub use tools::*;

use crate::event::EventBus;
use crate::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

// endregion: --- Modules

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI agent. \
Give highly specific answers based on the information you're provided. \
Prefer to gather information with the tools provided to you rather than giving basic, generic answers.";

// region:    --- Types

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
	pub id: String,
	pub name: String,
	/// Raw JSON arguments, as sent by the model.
	pub arguments: String,
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
	System(String),
	User(String),
	Assistant {
		content: Option<String>,
		tool_calls: Vec<ToolCall>,
	},
	Tool {
		tool_call_id: String,
		content: String,
	},
}

/// What the model did on one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelTurn {
	/// Finish reason `tool_calls`.
	ToolCalls {
		content: Option<String>,
		calls: Vec<ToolCall>,
	},
	/// Finish reason `stop`.
	Answer(String),
	/// Any other finish reason (length, content filter). The loop goes on.
	Incomplete(Option<String>),
}

#[async_trait]
pub trait ChatModel: Send + Sync {
	async fn complete(
		&self,
		history: &[ChatMessage],
		tools: &[ToolSpec],
	) -> Result<ModelTurn>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
	Answer(String),
	/// `iterations` model calls were made without an answer.
	Exhausted { iterations: u32 },
}

#[derive(Debug, Clone)]
pub enum AgentEvent {
	IterationStarted(u32),
	ToolCalled { name: String, arguments: String },
	Answered,
	Exhausted { iterations: u32 },
}

enum AgentState {
	AwaitingModel,
	DispatchingTool(Vec<ToolCall>),
	Done(String),
}

// endregion: --- Types

// region:    --- Agent

pub struct Agent<M, T> {
	model: M,
	tools: T,
	system_prompt: String,
	max_iterations: u32,
	event_bus: EventBus,
}

/// Constructor functions
impl<M, T> Agent<M, T>
where
	M: ChatModel,
	T: WeatherTools,
{
	pub fn new(model: M, tools: T, event_bus: EventBus) -> Self {
		Agent {
			model,
			tools,
			system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
			max_iterations: DEFAULT_MAX_ITERATIONS,
			event_bus,
		}
	}

	pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
		self.system_prompt = system_prompt.into();
		self
	}

	pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
		self.max_iterations = max_iterations;
		self
	}
}

/// Public functions
impl<M, T> Agent<M, T>
where
	M: ChatModel,
	T: WeatherTools,
{
	pub fn max_iterations(&self) -> u32 {
		self.max_iterations
	}

	/// Runs the loop for `query`, starting from a fresh history.
	pub async fn run(&self, query: &str) -> Result<AgentOutcome> {
		if query.trim().is_empty() {
			return Err(Error::EmptyQuery);
		}

		let specs = tool_specs();
		let mut history = vec![
			ChatMessage::System(self.system_prompt.clone()),
			ChatMessage::User(query.to_string()),
		];
		let mut iterations: u32 = 0;
		let mut state = AgentState::AwaitingModel;

		loop {
			state = match state {
				AgentState::AwaitingModel => {
					if iterations >= self.max_iterations {
						self.event_bus.send(AgentEvent::Exhausted { iterations })?;
						return Ok(AgentOutcome::Exhausted { iterations });
					}
					iterations += 1;
					self.event_bus.send(AgentEvent::IterationStarted(iterations))?;

					let turn = self.model.complete(&history, &specs).await?;
					debug!(iteration = iterations, history = history.len(), "model turn");

					match turn {
						ModelTurn::ToolCalls { content, calls } => {
							history.push(ChatMessage::Assistant {
								content,
								tool_calls: calls.clone(),
							});
							AgentState::DispatchingTool(calls)
						}
						ModelTurn::Answer(answer) => {
							history.push(ChatMessage::Assistant {
								content: Some(answer.clone()),
								tool_calls: Vec::new(),
							});
							AgentState::Done(answer)
						}
						ModelTurn::Incomplete(content) => {
							if let Some(content) = content {
								history.push(ChatMessage::Assistant {
									content: Some(content),
									tool_calls: Vec::new(),
								});
							}
							AgentState::AwaitingModel
						}
					}
				}

				AgentState::DispatchingTool(calls) => {
					for call in calls {
						self.event_bus.send(AgentEvent::ToolCalled {
							name: call.name.clone(),
							arguments: call.arguments.clone(),
						})?;
						let content = dispatch(&self.tools, &call).await?;
						history.push(ChatMessage::Tool {
							tool_call_id: call.id,
							content,
						});
					}
					AgentState::AwaitingModel
				}

				AgentState::Done(answer) => {
					self.event_bus.send(AgentEvent::Answered)?;
					return Ok(AgentOutcome::Answer(answer));
				}
			}
		}
	}
}

// endregion: --- Agent

// region:    --- Tests

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::VecDeque;
	use std::sync::Mutex;

	/// Replays scripted turns and records the history it was called with.
	struct ScriptedModel {
		turns: Mutex<VecDeque<ModelTurn>>,
		calls: Mutex<Vec<Vec<ChatMessage>>>,
	}

	impl ScriptedModel {
		fn new(turns: Vec<ModelTurn>) -> Self {
			Self {
				turns: Mutex::new(turns.into()),
				calls: Mutex::new(Vec::new()),
			}
		}

		fn num_calls(&self) -> usize {
			self.calls.lock().unwrap().len()
		}

		fn last_history(&self) -> Vec<ChatMessage> {
			self.calls.lock().unwrap().last().cloned().unwrap_or_default()
		}
	}

	#[async_trait]
	impl ChatModel for &ScriptedModel {
		async fn complete(
			&self,
			history: &[ChatMessage],
			_tools: &[ToolSpec],
		) -> Result<ModelTurn> {
			self.calls.lock().unwrap().push(history.to_vec());
			let turn = self.turns.lock().unwrap().pop_front();
			Ok(turn.expect("model called more than scripted"))
		}
	}

	fn tool_turn(id: &str, name: &str, arguments: &str) -> ModelTurn {
		ModelTurn::ToolCalls {
			content: None,
			calls: vec![ToolCall {
				id: id.to_string(),
				name: name.to_string(),
				arguments: arguments.to_string(),
			}],
		}
	}

	#[tokio::test]
	async fn test_agent_direct_answer_one_call() -> Result<()> {
		let model = ScriptedModel::new(vec![ModelTurn::Answer("Hello there".to_string())]);
		let agent = Agent::new(&model, HardCodedTools, EventBus::new());

		let outcome = agent.run("Say hello").await?;

		assert_eq!(outcome, AgentOutcome::Answer("Hello there".to_string()));
		assert_eq!(model.num_calls(), 1);
		Ok(())
	}

	#[tokio::test]
	async fn test_agent_tools_then_answer() -> Result<()> {
		let model = ScriptedModel::new(vec![
			tool_turn("call_1", GET_LOCATION, "{}"),
			tool_turn(
				"call_2",
				GET_CURRENT_WEATHER,
				r#"{"location":"Delta Square, Bhubaneswar, Odisha, India"}"#,
			),
			ModelTurn::Answer("Go for a swim, it is sunny and 35 C.".to_string()),
		]);
		let agent = Agent::new(&model, HardCodedTools, EventBus::new());

		let outcome = agent.run("What should I do this afternoon?").await?;

		assert!(matches!(outcome, AgentOutcome::Answer(_)));
		assert_eq!(model.num_calls(), 3);

		// system, user, (assistant, tool) x 2
		let history = model.last_history();
		assert_eq!(history.len(), 6);
		assert_eq!(
			history[3],
			ChatMessage::Tool {
				tool_call_id: "call_1".to_string(),
				content: "Delta Square, Bhubaneswar, Odisha, India".to_string(),
			}
		);
		let ChatMessage::Tool { content, .. } = &history[5] else {
			panic!("last message should be a tool result");
		};
		assert!(content.contains("Sunny"));
		Ok(())
	}

	#[tokio::test]
	async fn test_agent_exhausts_after_max_iterations() -> Result<()> {
		let turns = (0..6)
			.map(|i| {
				if i % 2 == 0 {
					tool_turn(&format!("call_{i}"), GET_LOCATION, "{}")
				} else {
					tool_turn(&format!("call_{i}"), GET_CURRENT_WEATHER, r#"{"location":"Oslo"}"#)
				}
			})
			.collect();
		let model = ScriptedModel::new(turns);
		let bus = EventBus::new();
		let mut rx = bus.subscribe()?;
		let agent = Agent::new(&model, HardCodedTools, bus);

		let outcome = agent.run("Loop forever").await?;

		assert_eq!(outcome, AgentOutcome::Exhausted { iterations: 5 });
		assert_eq!(model.num_calls(), 5);

		let mut exhausted_evt = false;
		while let Ok(evt) = rx.try_recv() {
			if let crate::event::Event::Agent(AgentEvent::Exhausted { iterations }) = evt {
				exhausted_evt = iterations == 5;
			}
		}
		assert!(exhausted_evt);
		Ok(())
	}

	#[tokio::test]
	async fn test_agent_custom_max_iterations() -> Result<()> {
		let model = ScriptedModel::new(vec![
			tool_turn("call_1", GET_LOCATION, "{}"),
			tool_turn("call_2", GET_LOCATION, "{}"),
		]);
		let agent =
			Agent::new(&model, HardCodedTools, EventBus::new()).with_max_iterations(2);

		let outcome = agent.run("Where am I?").await?;

		assert_eq!(outcome, AgentOutcome::Exhausted { iterations: 2 });
		assert_eq!(model.num_calls(), 2);
		Ok(())
	}

	#[tokio::test]
	async fn test_agent_incomplete_turn_loops() -> Result<()> {
		let model = ScriptedModel::new(vec![
			ModelTurn::Incomplete(Some("The weather in".to_string())),
			ModelTurn::Answer("The weather in Oslo is rainy.".to_string()),
		]);
		let agent = Agent::new(&model, HardCodedTools, EventBus::new());

		let outcome = agent.run("Weather in Oslo?").await?;

		assert_eq!(
			outcome,
			AgentOutcome::Answer("The weather in Oslo is rainy.".to_string())
		);
		assert_eq!(model.last_history().len(), 3);
		Ok(())
	}

	#[tokio::test]
	async fn test_agent_unknown_tool_is_fatal() {
		let model = ScriptedModel::new(vec![
			tool_turn("call_1", "getStockPrice", r#"{"ticker":"AAPL"}"#),
			ModelTurn::Answer("unreachable".to_string()),
		]);
		let agent = Agent::new(&model, HardCodedTools, EventBus::new());

		let res = agent.run("Price of AAPL?").await;

		assert!(matches!(res, Err(Error::UnknownTool(_))));
		assert_eq!(model.num_calls(), 1);
	}

	#[tokio::test]
	async fn test_agent_empty_query() {
		let model = ScriptedModel::new(Vec::new());
		let agent = Agent::new(&model, HardCodedTools, EventBus::new());

		let res = agent.run("   ").await;

		assert!(matches!(res, Err(Error::EmptyQuery)));
		assert_eq!(model.num_calls(), 0);
	}
}

// endregion: --- Tests
