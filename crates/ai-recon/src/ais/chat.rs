//! Chat completions, as the agent `ChatModel`.

use crate::agent::{ChatMessage, ChatModel, ModelTurn, ToolCall, ToolSpec};
use crate::ais::{AisClient, OaClient};
use crate::{Error, Result};
use async_openai::types::{
	ChatChoice, ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
	ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
	ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
	ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
	CreateChatCompletionRequestArgs, FinishReason, FunctionCall, FunctionObjectArgs,
};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct OpenAiChat {
	oa_client: OaClient,
	model: String,
}

impl OpenAiChat {
	pub fn new(ais: &AisClient, model: impl Into<String>) -> Self {
		Self {
			oa_client: ais.oa_client().clone(),
			model: model.into(),
		}
	}

	/// Single user question, no tools, returns the text of the reply.
	pub async fn ask(&self, question: &str) -> Result<String> {
		if question.trim().is_empty() {
			return Err(Error::EmptyQuery);
		}

		let history = [ChatMessage::User(question.to_string())];
		match self.complete(&history, &[]).await? {
			ModelTurn::Answer(text) => Ok(text),
			ModelTurn::Incomplete(text) | ModelTurn::ToolCalls { content: text, .. } => {
				Ok(text.unwrap_or_default())
			}
		}
	}
}

#[async_trait]
impl ChatModel for OpenAiChat {
	async fn complete(
		&self,
		history: &[ChatMessage],
		tools: &[ToolSpec],
	) -> Result<ModelTurn> {
		let messages = history
			.iter()
			.map(to_request_message)
			.collect::<Result<Vec<_>>>()?;

		let mut req = CreateChatCompletionRequestArgs::default();
		req.model(&self.model).messages(messages);
		if !tools.is_empty() {
			let tools = tools.iter().map(to_tool).collect::<Result<Vec<_>>>()?;
			req.tools(tools);
		}
		let req = req.build()?;

		let res = self.oa_client.chat().create(req).await?;
		let choice = res
			.choices
			.into_iter()
			.next()
			.ok_or(Error::NoChoiceInChatResponse)?;

		Ok(turn_from_choice(choice))
	}
}

// region:    --- Mappers

fn to_request_message(msg: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
	let msg = match msg {
		ChatMessage::System(content) => ChatCompletionRequestSystemMessageArgs::default()
			.content(content.as_str())
			.build()?
			.into(),
		ChatMessage::User(content) => ChatCompletionRequestUserMessageArgs::default()
			.content(content.as_str())
			.build()?
			.into(),
		ChatMessage::Assistant {
			content,
			tool_calls,
		} => {
			let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
			if let Some(content) = content {
				builder.content(content.as_str());
			}
			if !tool_calls.is_empty() {
				let tool_calls = tool_calls
					.iter()
					.map(|call| ChatCompletionMessageToolCall {
						id: call.id.clone(),
						r#type: ChatCompletionToolType::Function,
						function: FunctionCall {
							name: call.name.clone(),
							arguments: call.arguments.clone(),
						},
					})
					.collect::<Vec<_>>();
				builder.tool_calls(tool_calls);
			}
			builder.build()?.into()
		}
		ChatMessage::Tool {
			tool_call_id,
			content,
		} => ChatCompletionRequestToolMessageArgs::default()
			.tool_call_id(tool_call_id.as_str())
			.content(content.as_str())
			.build()?
			.into(),
	};

	Ok(msg)
}

fn to_tool(spec: &ToolSpec) -> Result<ChatCompletionTool> {
	let function = FunctionObjectArgs::default()
		.name(spec.name)
		.description(spec.description)
		.parameters(spec.parameters.clone())
		.build()?;

	let tool = ChatCompletionToolArgs::default()
		.r#type(ChatCompletionToolType::Function)
		.function(function)
		.build()?;

	Ok(tool)
}

fn turn_from_choice(choice: ChatChoice) -> ModelTurn {
	let content = choice.message.content;

	match choice.finish_reason {
		Some(FinishReason::ToolCalls) => {
			let calls = choice
				.message
				.tool_calls
				.unwrap_or_default()
				.into_iter()
				.map(|call| ToolCall {
					id: call.id,
					name: call.function.name,
					arguments: call.function.arguments,
				})
				.collect();
			ModelTurn::ToolCalls { content, calls }
		}
		Some(FinishReason::Stop) => ModelTurn::Answer(content.unwrap_or_default()),
		_ => ModelTurn::Incomplete(content),
	}
}

// endregion: --- Mappers

// region:    --- Tests

#[cfg(test)]
mod tests {
	use super::*;
	use async_openai::types::CreateChatCompletionResponse;
	use serde_json::json;

	fn first_choice(finish_reason: &str, message: serde_json::Value) -> ChatChoice {
		let res: CreateChatCompletionResponse = serde_json::from_value(json!({
			"id": "chatcmpl-1",
			"object": "chat.completion",
			"created": 1_700_000_000,
			"model": "gpt-4",
			"choices": [{
				"index": 0,
				"message": message,
				"finish_reason": finish_reason,
				"logprobs": null
			}]
		}))
		.expect("response should parse");

		res.choices.into_iter().next().expect("one choice")
	}

	#[test]
	fn test_turn_from_tool_calls_choice() {
		let choice = first_choice(
			"tool_calls",
			json!({
				"role": "assistant",
				"content": null,
				"tool_calls": [{
					"id": "call_abc",
					"type": "function",
					"function": {"name": "getLocation", "arguments": "{}"}
				}]
			}),
		);

		let turn = turn_from_choice(choice);

		assert_eq!(
			turn,
			ModelTurn::ToolCalls {
				content: None,
				calls: vec![ToolCall {
					id: "call_abc".to_string(),
					name: "getLocation".to_string(),
					arguments: "{}".to_string(),
				}],
			}
		);
	}

	#[test]
	fn test_turn_from_stop_and_length_choices() {
		let stop = first_choice(
			"stop",
			json!({"role": "assistant", "content": "It is sunny."}),
		);
		let length = first_choice(
			"length",
			json!({"role": "assistant", "content": "It is"}),
		);

		assert_eq!(
			turn_from_choice(stop),
			ModelTurn::Answer("It is sunny.".to_string())
		);
		assert_eq!(
			turn_from_choice(length),
			ModelTurn::Incomplete(Some("It is".to_string()))
		);
	}

	#[test]
	fn test_to_request_message_assistant_with_tool_calls() -> Result<()> {
		let msg = ChatMessage::Assistant {
			content: None,
			tool_calls: vec![ToolCall {
				id: "call_1".to_string(),
				name: "getCurrentWeather".to_string(),
				arguments: r#"{"location":"Oslo"}"#.to_string(),
			}],
		};

		let req_msg = to_request_message(&msg)?;
		let value = serde_json::to_value(&req_msg)?;

		assert_eq!(value["role"], "assistant");
		assert_eq!(value["tool_calls"][0]["function"]["name"], "getCurrentWeather");
		Ok(())
	}
}

// endregion: --- Tests
