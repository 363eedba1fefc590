//! End-to-end pump-mode scenarios against a scripted completion client.
//!
//! Each test builds a workspace in a temp dir, seeds templates and sessions,
//! and runs reconciliation passes the way `steward daemon --pump` would.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use steward_core::{
    AgentType, AssistantReply, ConversationStore, Layout, Message, MockCompletion, Orchestrator,
    OrchestratorConfig, ParsedToolCall, Role, Template,
};

fn workspace() -> (tempfile::TempDir, Layout) {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    layout.ensure().unwrap();
    (dir, layout)
}

fn write_template(
    layout: &Layout,
    id: &str,
    agent_type: AgentType,
    tools: &[&str],
    system_prompt: &str,
) {
    let template = Template {
        id: id.to_string(),
        agent_type,
        model: "gpt-4o".to_string(),
        system_prompt: system_prompt.to_string(),
        tools: tools.iter().map(|s| s.to_string()).collect(),
        metadata: BTreeMap::new(),
    };
    let yaml = serde_yml::to_string(&template).unwrap();
    std::fs::write(layout.template_file(id), yaml).unwrap();
}

fn seed_session(layout: &Layout, agent_id: &str, session_id: &str, log: Vec<Message>) {
    let store = ConversationStore::new(layout.clone());
    store.create_session(agent_id, Some(session_id)).unwrap();
    for message in log {
        store.append_message(session_id, message).unwrap();
    }
}

fn orchestrator(
    layout: &Layout,
    replies: Vec<AssistantReply>,
) -> (Arc<MockCompletion>, Orchestrator) {
    let mock = Arc::new(MockCompletion::new(replies));
    let orch = Orchestrator::with_config(
        layout.clone(),
        OrchestratorConfig::default(),
        mock.clone(),
    )
    .unwrap();
    (mock, orch)
}

fn text_reply(text: &str) -> AssistantReply {
    AssistantReply {
        content: Some(text.to_string()),
        tool_calls: Vec::new(),
    }
}

fn tool_reply(calls: Vec<(&str, &str, serde_json::Value)>) -> AssistantReply {
    AssistantReply {
        content: None,
        tool_calls: calls
            .into_iter()
            .map(|(id, name, arguments)| ParsedToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            })
            .collect(),
    }
}

fn log_of(layout: &Layout, session_id: &str) -> Vec<Message> {
    ConversationStore::new(layout.clone())
        .read_session(session_id)
        .unwrap()
        .log
}

// E1: safe greeting
#[tokio::test]
async fn pump_appends_plain_assistant_reply() {
    let (_dir, layout) = workspace();
    write_template(
        &layout,
        "greeter",
        AgentType::Solo,
        &[],
        "Reply 'Hi there!' to any greeting",
    );
    seed_session(&layout, "greeter", "greeter-01", vec![Message::user("Hello")]);

    let (mock, orch) = orchestrator(&layout, vec![text_reply("Hi there!")]);
    orch.pump().await.unwrap();

    let log = log_of(&layout, "greeter-01");
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].role, Role::Assistant);
    assert_eq!(log[1].content, "Hi there!");

    // The system prompt went out first on the wire
    let call = mock.call(0).unwrap();
    assert_eq!(call.messages[0].role, "system");
    assert!(call.messages[0].content.as_deref().unwrap().contains("Hi there!"));
}

// E2: safe tool use executes in the same pass
#[tokio::test]
async fn pump_executes_safe_tool_immediately() {
    let (_dir, layout) = workspace();
    std::fs::write(layout.root().join("memo.txt"), "Test data").unwrap();
    write_template(&layout, "reader", AgentType::Retriever, &["read_file"], "Read files");
    seed_session(&layout, "reader", "reader-01", vec![Message::user("Read memo.txt")]);

    let (mock, orch) = orchestrator(
        &layout,
        vec![tool_reply(vec![("call_1", "read_file", json!({"path": "memo.txt"}))])],
    );
    orch.pump().await.unwrap();

    let log = log_of(&layout, "reader-01");
    assert_eq!(log.len(), 3);
    assert_eq!(log[1].role, Role::Assistant);
    assert_eq!(log[1].tool_calls[0].name, "read_file");
    assert_eq!(log[2].role, Role::ToolResult);
    assert_eq!(log[2].tool_call_id.as_deref(), Some("call_1"));
    let result = log[2].result.as_ref().unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["content"], "Test data");

    // Only the declared tool was offered
    assert_eq!(mock.call(0).unwrap().tool_names, vec!["read_file".to_string()]);
}

// E3: gated shell command waits for approval across passes
#[tokio::test]
async fn gated_command_pends_then_runs_after_approval() {
    let (_dir, layout) = workspace();
    write_template(&layout, "executor", AgentType::Executor, &["execute_command"], "Run things");
    seed_session(
        &layout,
        "executor",
        "executor-01",
        vec![Message::user("Run 'echo hello'")],
    );

    // Pass 1: the model asks for a shell command; no allowlist file exists so
    // it is gated
    let (_mock, orch) = orchestrator(
        &layout,
        vec![tool_reply(vec![(
            "call_sh",
            "execute_command",
            json!({"command": "echo hello"}),
        )])],
    );
    orch.pump().await.unwrap();

    let log = log_of(&layout, "executor-01");
    assert_eq!(log.len(), 2, "no tool_result before a decision");
    let ledger = orch.ledger();
    let pending = ledger.list_pending().unwrap();
    assert_eq!(pending.len(), 1);

    // Pass 2, fresh process, ledger unchanged: nothing moves
    let (mock2, orch2) = orchestrator(&layout, Vec::new());
    orch2.pump().await.unwrap();
    assert_eq!(log_of(&layout, "executor-01").len(), 2);
    assert_eq!(mock2.call_count(), 0, "suspended session never reaches the model");
    assert_eq!(orch2.ledger().list_pending().unwrap().len(), 1);

    // Human approves by flipping the marker
    let approvals = layout.approvals_file();
    let raw = std::fs::read_to_string(&approvals).unwrap();
    std::fs::write(&approvals, raw.replace("- [ ]", "- [x]")).unwrap();

    // Pass 3, fresh process again: reconciliation finds the decision
    let (_mock3, orch3) = orchestrator(&layout, Vec::new());
    orch3.pump().await.unwrap();

    let log = log_of(&layout, "executor-01");
    assert_eq!(log.len(), 3);
    let result = log[2].result.as_ref().unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["stdout"], "hello\n");
    assert!(orch3.ledger().list_pending().unwrap().is_empty());
}

// E4: rejection produces a failure result and runs nothing
#[tokio::test]
async fn rejected_command_yields_failure_result() {
    let (_dir, layout) = workspace();
    let marker = layout.root().join("should-not-exist.txt");
    write_template(&layout, "executor", AgentType::Executor, &["execute_command"], "Run things");
    seed_session(
        &layout,
        "executor",
        "executor-01",
        vec![Message::user("Touch a file")],
    );

    let (_mock, orch) = orchestrator(
        &layout,
        vec![tool_reply(vec![(
            "call_sh",
            "execute_command",
            json!({"command": format!("touch {}", marker.display())}),
        )])],
    );
    orch.pump().await.unwrap();

    let approvals = layout.approvals_file();
    let raw = std::fs::read_to_string(&approvals).unwrap();
    std::fs::write(&approvals, raw.replace("- [ ]", "- [-]")).unwrap();

    let (_mock2, orch2) = orchestrator(&layout, Vec::new());
    orch2.pump().await.unwrap();

    let log = log_of(&layout, "executor-01");
    assert_eq!(log.len(), 3);
    let result = log[2].result.as_ref().unwrap();
    assert_eq!(result["success"], false);
    assert_eq!(result["error"], "rejected by operator");
    assert!(!marker.exists(), "rejected command must not run");
}

// E5: cross-agent delegation
#[tokio::test]
async fn send_message_routes_before_result_is_recorded() {
    let (_dir, layout) = workspace();
    write_template(&layout, "planner", AgentType::Planner, &["send_message"], "Plan");
    write_template(&layout, "executor", AgentType::Executor, &[], "Execute");
    seed_session(&layout, "planner", "planner-01", vec![Message::user("Delegate")]);
    seed_session(&layout, "executor", "executor-001", Vec::new());

    let (_mock, orch) = orchestrator(
        &layout,
        vec![tool_reply(vec![(
            "call_send",
            "send_message",
            json!({"agent_id": "executor-001", "content": "Do X"}),
        )])],
    );
    orch.pump().await.unwrap();

    let target_log = log_of(&layout, "executor-001");
    assert_eq!(target_log.len(), 1);
    assert_eq!(target_log[0].role, Role::User);
    assert_eq!(target_log[0].content, "Do X");

    let origin_log = log_of(&layout, "planner-01");
    assert_eq!(origin_log.len(), 3);
    let result = origin_log[2].result.as_ref().unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["delivered_to"], "executor-001");
}

#[tokio::test]
async fn send_message_to_missing_target_fails_inline() {
    let (_dir, layout) = workspace();
    write_template(&layout, "planner", AgentType::Planner, &["send_message"], "Plan");
    seed_session(&layout, "planner", "planner-01", vec![Message::user("Delegate")]);

    let (_mock, orch) = orchestrator(
        &layout,
        vec![tool_reply(vec![(
            "call_send",
            "send_message",
            json!({"agent_id": "nobody", "content": "Do X"}),
        )])],
    );
    orch.pump().await.unwrap();

    let log = log_of(&layout, "planner-01");
    let result = log[2].result.as_ref().unwrap();
    assert_eq!(result["success"], false);
    assert!(result["error"].as_str().unwrap().contains("nobody"));
}

// E6: check-in cadence
#[tokio::test]
async fn checkin_records_baseline_then_fires_after_interval() {
    let (_dir, layout) = workspace();
    write_template(&layout, "planner", AgentType::Planner, &[], "Plan");
    seed_session(&layout, "planner", "planner-01", vec![Message::user("start")]);

    // First pass only records the baseline
    let (_mock, orch) = orchestrator(&layout, Vec::new());
    orch.pump().await.unwrap();
    assert_eq!(log_of(&layout, "planner-01").len(), 1);

    let checkin = steward_core::CheckinState::load(&layout.checkin_file(), 60).unwrap();
    assert!(checkin.last_checkin.is_some());
    assert_eq!(checkin.count, 0);

    // Backdate the baseline past the interval
    let stale = steward_core::CheckinState {
        last_checkin: Some(chrono::Utc::now() - chrono::Duration::seconds(61)),
        ..checkin
    };
    stale.save(&layout.checkin_file()).unwrap();

    // The planner will be advanced after the nudge lands; give the mock a
    // reply for that round-trip
    let (_mock2, orch2) = orchestrator(&layout, vec![text_reply("on it")]);
    orch2.pump().await.unwrap();

    let log = log_of(&layout, "planner-01");
    let nudge = log
        .iter()
        .find(|m| m.content == "Check-in with running agents to ensure progress")
        .expect("check-in message appended");
    assert_eq!(nudge.role, Role::User);

    let after = steward_core::CheckinState::load(&layout.checkin_file(), 60).unwrap();
    assert_eq!(after.count, 1);
    assert_eq!(after.planner_session.as_deref(), Some("planner-01"));
    assert!(after.last_reason.contains("interval elapsed"));
}

// Property 6: pump determinism
#[tokio::test]
async fn second_pump_without_changes_is_a_no_op() {
    let (_dir, layout) = workspace();
    write_template(&layout, "greeter", AgentType::Solo, &[], "Greet");
    seed_session(&layout, "greeter", "greeter-01", vec![Message::user("Hello")]);

    let (mock, orch) = orchestrator(&layout, vec![text_reply("Hi there!")]);
    orch.pump().await.unwrap();
    let after_first = log_of(&layout, "greeter-01");

    orch.pump().await.unwrap();
    let after_second = log_of(&layout, "greeter-01");

    assert_eq!(after_first.len(), after_second.len());
    assert_eq!(mock.call_count(), 1, "finished session is not re-advanced");
}

// Property 1/2: append-only prefix and unique call/result pairing through a
// full gated round-trip
#[tokio::test]
async fn gated_round_trip_preserves_prefix_and_pairing() {
    let (_dir, layout) = workspace();
    write_template(&layout, "executor", AgentType::Executor, &["execute_command"], "Run");
    seed_session(&layout, "executor", "executor-01", vec![Message::user("go")]);

    let (_mock, orch) = orchestrator(
        &layout,
        vec![tool_reply(vec![(
            "call_sh",
            "execute_command",
            json!({"command": "echo ok"}),
        )])],
    );
    orch.pump().await.unwrap();
    let before: Vec<String> = log_of(&layout, "executor-01")
        .iter()
        .map(|m| format!("{:?}:{}", m.role, m.content))
        .collect();

    let approvals = layout.approvals_file();
    let raw = std::fs::read_to_string(&approvals).unwrap();
    std::fs::write(&approvals, raw.replace("- [ ]", "- [x]")).unwrap();

    let (_mock2, orch2) = orchestrator(&layout, Vec::new());
    orch2.pump().await.unwrap();
    // And once more: the closed entry must not re-execute
    let (_mock3, orch3) = orchestrator(&layout, Vec::new());
    orch3.pump().await.unwrap();

    let log = log_of(&layout, "executor-01");
    let after: Vec<String> = log
        .iter()
        .map(|m| format!("{:?}:{}", m.role, m.content))
        .collect();
    assert_eq!(&after[..before.len()], &before[..], "earlier log is a prefix");

    let results: Vec<_> = log
        .iter()
        .filter(|m| m.role == Role::ToolResult && m.tool_call_id.as_deref() == Some("call_sh"))
        .collect();
    assert_eq!(results.len(), 1, "exactly one result per call id");
}

// Mixed turn: safe calls after a gated one wait for the decision
#[tokio::test]
async fn in_order_execution_suspends_at_first_gated_call() {
    let (_dir, layout) = workspace();
    std::fs::write(layout.root().join("memo.txt"), "Test data").unwrap();
    write_template(
        &layout,
        "worker",
        AgentType::Executor,
        &["execute_command", "read_file"],
        "Work",
    );
    seed_session(&layout, "worker", "worker-01", vec![Message::user("go")]);

    let (_mock, orch) = orchestrator(
        &layout,
        vec![tool_reply(vec![
            ("call_a", "execute_command", json!({"command": "echo first"})),
            ("call_b", "read_file", json!({"path": "memo.txt"})),
        ])],
    );
    orch.pump().await.unwrap();

    // Suspended at the gate: neither call has a result yet
    let log = log_of(&layout, "worker-01");
    assert_eq!(log.len(), 2);

    let approvals = layout.approvals_file();
    let raw = std::fs::read_to_string(&approvals).unwrap();
    std::fs::write(&approvals, raw.replace("- [ ]", "- [x]")).unwrap();

    let (_mock2, orch2) = orchestrator(&layout, Vec::new());
    orch2.pump().await.unwrap();

    let log = log_of(&layout, "worker-01");
    assert_eq!(log.len(), 4, "both results landed after the decision");
    assert_eq!(log[2].tool_call_id.as_deref(), Some("call_a"));
    assert_eq!(log[3].tool_call_id.as_deref(), Some("call_b"));
    assert_eq!(log[3].result.as_ref().unwrap()["content"], "Test data");
}

// Planner turn-complete heuristic: a successful create_task parks the session
#[tokio::test]
async fn successful_create_task_ends_the_planner_turn() {
    let (_dir, layout) = workspace();
    write_template(&layout, "planner", AgentType::Planner, &["create_task"], "Plan");
    let store = ConversationStore::new(layout.clone());
    store.create_session("planner", Some("planner-01")).unwrap();
    store
        .append_message("planner-01", Message::user("assign"))
        .unwrap();
    store
        .append_message(
            "planner-01",
            Message::assistant_with_tool_calls(
                "",
                vec![steward_core::ToolCallRequest {
                    id: "call_t".to_string(),
                    name: "create_task".to_string(),
                    arguments: json!({"title": "x", "priority": "high", "stakeholders": "ops"}),
                }],
            ),
        )
        .unwrap();
    store
        .append_message(
            "planner-01",
            Message::tool_result("call_t", json!({"success": true})),
        )
        .unwrap();
    store
        .append_message("planner-01", Message::user("ping"))
        .unwrap();

    let (mock, orch) = orchestrator(&layout, Vec::new());
    orch.pump().await.unwrap();

    assert_eq!(mock.call_count(), 0, "turn already complete, no round-trip");
    assert_eq!(log_of(&layout, "planner-01").len(), 4);
}

// Invariant: a dangling tool_result errors the session instead of advancing
#[tokio::test]
async fn broken_log_marks_session_errored() {
    let (_dir, layout) = workspace();
    write_template(&layout, "greeter", AgentType::Solo, &[], "Greet");
    seed_session(
        &layout,
        "greeter",
        "greeter-01",
        vec![
            Message::user("hello"),
            Message::tool_result("ghost", json!({"success": true})),
        ],
    );

    let (mock, orch) = orchestrator(&layout, Vec::new());
    orch.pump().await.unwrap();

    assert_eq!(mock.call_count(), 0);
    let session = ConversationStore::new(layout.clone())
        .read_session("greeter-01")
        .unwrap();
    assert_eq!(session.status, steward_core::SessionStatus::Error);
}

// Allowlisted shell commands skip the gate entirely
#[tokio::test]
async fn allowlisted_command_runs_without_approval() {
    let (_dir, layout) = workspace();
    std::fs::write(
        layout.allowlist_file(),
        "patterns:\n  - \"^echo \"\n",
    )
    .unwrap();
    write_template(&layout, "executor", AgentType::Executor, &["execute_command"], "Run");
    seed_session(&layout, "executor", "executor-01", vec![Message::user("go")]);

    let (_mock, orch) = orchestrator(
        &layout,
        vec![tool_reply(vec![(
            "call_sh",
            "execute_command",
            json!({"command": "echo fast-path"}),
        )])],
    );
    orch.pump().await.unwrap();

    let log = log_of(&layout, "executor-01");
    assert_eq!(log.len(), 3);
    assert_eq!(log[2].result.as_ref().unwrap()["stdout"], "fast-path\n");
    assert!(orch.ledger().list_pending().unwrap().is_empty());
}
