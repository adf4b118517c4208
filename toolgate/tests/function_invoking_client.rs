//! The tool-call loop with confirmation wired in.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use toolgate::cancellation::CancellationToken;
use toolgate::client::{ChatClient, ChatMessage, ChatOptions, ChatRole, MAX_ITERATIONS_FINISH_REASON};
use toolgate::config::FunctionInvocationConfig;
use toolgate::errors::GateError;
use toolgate::events::CollectingEventSink;
use toolgate::filter::{confirmation_channel, PolicyHandler};
use toolgate::testing::{CountingTool, ManualHandler, ScriptedChatClient};
use toolgate::tools::{FnTool, ToolCallRequest, ToolDefinition, ToolRegistry, NOT_EXECUTED_NOTICE};
use toolgate::wiring::{ChatClientBuilder, SessionScope};

fn weather_call(id: &str, city: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, "get_weather", format!(r#"{{"city":"{city}"}}"#))
}

fn token() -> Arc<CancellationToken> {
    Arc::new(CancellationToken::new())
}

#[tokio::test]
async fn gated_loop_mixes_approved_and_denied_calls() {
    let weather = CountingTool::new("get_weather").returning(serde_json::json!("sunny"));
    let delete = CountingTool::new("delete_file");
    let tools = Arc::new(
        ToolRegistry::new()
            .with_tool(weather.clone())
            .with_tool(delete.clone()),
    );
    let inner = Arc::new(
        ScriptedChatClient::new()
            .then_tool_calls(vec![
                weather_call("call_1", "Paris"),
                ToolCallRequest::new("call_2", "delete_file", r#"{"path":"/etc/passwd"}"#),
            ])
            .then_text("Paris is sunny. I did not delete the file."),
    );
    let scope = SessionScope::new();
    scope.filter().subscribe(PolicyHandler::deny_list(["delete_file"]));
    let sink = Arc::new(CollectingEventSink::new());

    let client = ChatClientBuilder::new(inner.clone())
        .with_tools(tools)
        .configure_options(|o| o.model = Some("gpt-4o".to_string()))
        .use_tool_call_confirmation(&scope)
        .with_event_sink(sink.clone())
        .build()
        .unwrap();

    let response = client
        .complete(&[ChatMessage::user("Weather in Paris?")], &ChatOptions::new(), &token())
        .await
        .unwrap();

    assert_eq!(weather.call_count(), 1);
    assert_eq!(delete.call_count(), 0);

    let roles: Vec<ChatRole> = response.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![ChatRole::Assistant, ChatRole::Tool, ChatRole::Tool, ChatRole::Assistant]
    );
    assert_eq!(response.messages[1].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(response.messages[1].content, "sunny");
    assert_eq!(response.messages[2].content, NOT_EXECUTED_NOTICE);
    assert_eq!(response.text(), "Paris is sunny. I did not delete the file.");

    let requests = inner.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].options.model.as_deref(), Some("gpt-4o"));
    assert_eq!(requests[0].options.tools.len(), 2);
    assert_eq!(requests[1].messages.len(), 4);

    assert_eq!(sink.events_of_type("tool.not_executed").len(), 1);
    assert_eq!(sink.events_of_type("tool.completed").len(), 1);
}

#[tokio::test]
async fn ui_channel_decides_each_call() {
    let weather = CountingTool::new("get_weather");
    let tools = Arc::new(ToolRegistry::new().with_tool(weather.clone()));
    let inner = Arc::new(
        ScriptedChatClient::new()
            .then_tool_calls(vec![weather_call("call_1", "Paris"), weather_call("call_2", "Oslo")])
            .then_text("done"),
    );
    let scope = SessionScope::new();
    let (handler, mut requests) = confirmation_channel(4);
    scope.filter().subscribe(handler);

    let ui = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(request) = requests.recv().await {
            let city = request.call.argument("city").cloned().unwrap_or_default();
            seen.push(city.clone());
            if city == "Paris" {
                request.approve();
            } else {
                request.deny();
            }
        }
        seen
    });

    let client = ChatClientBuilder::new(inner)
        .with_tools(tools)
        .use_tool_call_confirmation(&scope)
        .build()
        .unwrap();
    let response = client
        .complete(&[ChatMessage::user("Compare Paris and Oslo")], &ChatOptions::new(), &token())
        .await
        .unwrap();

    assert_eq!(weather.call_count(), 1);
    assert_eq!(response.messages[2].content, NOT_EXECUTED_NOTICE);

    drop(client);
    drop(scope);
    let seen = ui.await.unwrap();
    assert_eq!(seen, vec![serde_json::json!("Paris"), serde_json::json!("Oslo")]);
}

#[tokio::test]
async fn unknown_tool_and_bad_arguments_become_tool_messages() {
    let inner = Arc::new(
        ScriptedChatClient::new()
            .then_tool_calls(vec![
                ToolCallRequest::new("call_1", "launch_rockets", "{}"),
                ToolCallRequest::new("call_2", "get_weather", "{not json"),
            ])
            .then_text("sorry"),
    );
    let weather = CountingTool::new("get_weather");
    let client = ChatClientBuilder::new(inner)
        .with_tools(Arc::new(ToolRegistry::new().with_tool(weather.clone())))
        .use_tool_call_confirmation(&SessionScope::new())
        .build()
        .unwrap();

    let response = client
        .complete(&[ChatMessage::user("go")], &ChatOptions::new(), &token())
        .await
        .unwrap();

    assert!(response.messages[1].content.contains("launch_rockets"));
    assert!(response.messages[2].content.starts_with("Error:"));
    assert_eq!(weather.call_count(), 0);
}

#[tokio::test]
async fn iteration_limit_forces_final_answer_without_tools() {
    let inner = Arc::new(
        ScriptedChatClient::new()
            .then_tool_calls(vec![weather_call("call_1", "Paris")])
            .then_tool_calls(vec![weather_call("call_2", "Paris")])
            .then_text("giving up"),
    );
    let weather = CountingTool::new("get_weather");
    let client = ChatClientBuilder::new(inner.clone())
        .with_tools(Arc::new(ToolRegistry::new().with_tool(weather.clone())))
        .with_invocation_config(FunctionInvocationConfig::new().with_max_iterations(2))
        .build()
        .unwrap();

    let response = client
        .complete(&[ChatMessage::user("loop")], &ChatOptions::new(), &token())
        .await
        .unwrap();

    assert_eq!(weather.call_count(), 2);
    assert_eq!(response.finish_reason.as_deref(), Some(MAX_ITERATIONS_FINISH_REASON));
    assert!(inner.requests()[2].options.tools.is_empty());
}

#[tokio::test]
async fn cancelled_request_stops_before_calling_the_model() {
    let inner = Arc::new(ScriptedChatClient::new().then_text("never sent"));
    let client = ChatClientBuilder::new(inner.clone()).build().unwrap();
    let cancel = token();
    cancel.cancel("user left");

    let err = client
        .complete(&[ChatMessage::user("hi")], &ChatOptions::new(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, GateError::Cancelled(_)));
    assert!(inner.requests().is_empty());
}

#[tokio::test]
async fn closure_tools_receive_parsed_arguments() {
    let tools = Arc::new(ToolRegistry::new().with_tool(FnTool::new(
        ToolDefinition::new("get_weather").with_description("Current weather for a city"),
        |args| async move {
            let city = args
                .get("city")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("nowhere")
                .to_string();
            Ok(serde_json::json!({"city": city, "forecast": "rain"}))
        },
    )));
    let inner = Arc::new(
        ScriptedChatClient::new()
            .then_tool_calls(vec![weather_call("call_1", "Oslo")])
            .then_text("Bring an umbrella."),
    );
    let client = ChatClientBuilder::new(inner)
        .with_tools(tools)
        .use_tool_call_confirmation(&SessionScope::new())
        .build()
        .unwrap();

    let response = client
        .complete(&[ChatMessage::user("Oslo?")], &ChatOptions::new(), &token())
        .await
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&response.messages[1].content).unwrap();
    assert_eq!(value, serde_json::json!({"city": "Oslo", "forecast": "rain"}));
}

#[tokio::test]
async fn concurrent_gated_calls_resolve_independently() {
    let weather = CountingTool::new("get_weather");
    let tools = Arc::new(ToolRegistry::new().with_tool(weather.clone()));
    let inner = Arc::new(
        ScriptedChatClient::new()
            .then_tool_calls(vec![weather_call("a", "Paris"), weather_call("b", "Oslo")])
            .then_text("done"),
    );
    let scope = SessionScope::new();
    let handler = ManualHandler::new();
    scope.filter().subscribe(handler.clone());

    let client = ChatClientBuilder::new(inner)
        .with_tools(tools)
        .with_invocation_config(FunctionInvocationConfig::new().with_concurrent_invocation(true))
        .use_tool_call_confirmation(&scope)
        .build()
        .unwrap();
    let turn = tokio::spawn(async move {
        client
            .complete(&[ChatMessage::user("Paris and Oslo?")], &ChatOptions::new(), &token())
            .await
    });

    let (first, first_pending) = handler.next().await;
    let (second, second_pending) = handler.next().await;
    let ((_, pending_a), (_, pending_b)) = if first.call_id() == "a" {
        ((first, first_pending), (second, second_pending))
    } else {
        ((second, second_pending), (first, first_pending))
    };

    assert!(pending_b.approve());
    tokio::task::yield_now().await;
    assert!(!turn.is_finished());
    assert!(pending_a.deny());

    let response = turn.await.unwrap().unwrap();
    assert_eq!(weather.call_count(), 1);
    assert_eq!(weather.received_arguments()[0]["city"], "Oslo");
    assert_eq!(response.messages[1].tool_call_id.as_deref(), Some("a"));
    assert_eq!(response.messages[1].content, NOT_EXECUTED_NOTICE);
    assert_eq!(response.messages[2].tool_call_id.as_deref(), Some("b"));
    assert_eq!(response.messages[2].content, "ok");
}
