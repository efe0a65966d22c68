//! Minimal MCP server over stdio used by the session tests.
//!
//! Environment:
//! - `FAKE_MCP_LABEL` prefixes echo replies (default `fake`)
//! - `FAKE_MCP_EXTRA_TOOL` advertises one more tool with that name
//! - `FAKE_MCP_SLOW_MS` sets how long the `slow` tool sleeps (default 5000)

use serde_json::{Value, json};
use std::env;
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

fn main() -> io::Result<()> {
    let label = env::var("FAKE_MCP_LABEL").unwrap_or_else(|_| "fake".to_string());
    let mut tools = vec![
        tool("echo", json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        })),
        tool("fail", json!({"type": "object"})),
        tool("slow", json!({"type": "object"})),
        tool("add_tool", json!({"type": "object"})),
        tool("server_requests", json!({"type": "object"})),
        tool("cancellations", json!({"type": "object"})),
    ];
    let slow = env::var("FAKE_MCP_SLOW_MS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(5000);
    if let Ok(extra) = env::var("FAKE_MCP_EXTRA_TOOL") {
        tools.push(tool(&extra, json!({"type": "object"})));
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut replies: Vec<Value> = Vec::new();
    let mut cancelled: Vec<Value> = Vec::new();

    for line in stdin.lock().lines() {
        let line = line?;
        let Ok(message) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        let id = message.get("id").cloned();
        let method = message.get("method").and_then(Value::as_str).map(str::to_string);

        let Some(method) = method else {
            // A reply to one of our own requests.
            replies.push(message);
            continue;
        };

        match (method.as_str(), id) {
            ("initialize", Some(id)) => send(&mut stdout, json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": message["params"]["protocolVersion"],
                    "capabilities": {"tools": {"listChanged": true}},
                    "serverInfo": {"name": label, "version": "0.0.0"}
                }
            }))?,
            ("notifications/initialized", None) => {
                send(&mut stdout, json!({"jsonrpc": "2.0", "id": "srv-1", "method": "ping"}))?;
                send(&mut stdout, json!({
                    "jsonrpc": "2.0",
                    "id": "srv-2",
                    "method": "sampling/createMessage",
                    "params": {}
                }))?;
            }
            ("notifications/cancelled", None) => {
                cancelled.push(message["params"]["requestId"].clone());
            }
            ("tools/list", Some(id)) => send(&mut stdout, json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"tools": tools}
            }))?,
            ("tools/call", Some(id)) => {
                let name = message["params"]["name"].as_str().unwrap_or_default().to_string();
                let arguments = message["params"]["arguments"].clone();
                let result = match name.as_str() {
                    "echo" => text_result(
                        &format!("{label}: {}", arguments["text"].as_str().unwrap_or_default()),
                        false,
                    ),
                    "fail" => text_result("boom", true),
                    "slow" => {
                        thread::sleep(Duration::from_millis(slow));
                        text_result("finally", false)
                    }
                    "add_tool" => {
                        tools.push(tool("late", json!({"type": "object"})));
                        text_result("added", false)
                    }
                    "cancellations" => {
                        text_result(&Value::Array(cancelled.clone()).to_string(), false)
                    }
                    "server_requests" => {
                        text_result(&Value::Array(replies.clone()).to_string(), false)
                    }
                    other if tools.iter().any(|t| t["name"] == other) => {
                        text_result(&format!("{label}: {other}"), false)
                    }
                    other => {
                        send(&mut stdout, json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "error": {"code": -32602, "message": format!("Unknown tool: {other}")}
                        }))?;
                        continue;
                    }
                };
                send(&mut stdout, json!({"jsonrpc": "2.0", "id": id, "result": result}))?;
                if name == "add_tool" {
                    send(&mut stdout, json!({
                        "jsonrpc": "2.0",
                        "method": "notifications/tools/list_changed"
                    }))?;
                }
            }
            (_, Some(id)) => send(&mut stdout, json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": "method not found"}
            }))?,
            (_, None) => {}
        }
    }
    Ok(())
}

fn tool(name: &str, schema: Value) -> Value {
    json!({"name": name, "description": format!("{name} tool"), "inputSchema": schema})
}

fn text_result(text: &str, is_error: bool) -> Value {
    json!({"content": [{"type": "text", "text": text}], "isError": is_error})
}

fn send(stdout: &mut io::Stdout, message: Value) -> io::Result<()> {
    let mut handle = stdout.lock();
    writeln!(handle, "{message}")?;
    handle.flush()
}
