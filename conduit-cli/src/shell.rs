use conduit_core::agent::{AgentError, ChatSession, TurnOutcome};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const PROMPT: &str = "Query: ";

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShellOptions {
    pub show_tools: bool,
}

/// Reads queries line by line until `quit`/`exit`, end of input, or Ctrl-C
/// at the prompt. Ctrl-C during a turn cancels only that turn.
pub async fn run<R, W>(
    session: &mut ChatSession,
    input: R,
    mut output: W,
    options: ShellOptions,
) -> Result<(), ShellError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all(b"\nChat started. Type your queries or 'quit' to exit.\n")
        .await?;
    let mut lines = input.lines();

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = interrupted() => {
                info!("Interrupted at prompt; ending session");
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if is_exit_command(query) {
            break;
        }

        debug!("Processing query from shell");
        let cancel = CancellationToken::new();
        let turn = session.run_turn(query, &cancel);
        tokio::pin!(turn);
        let result = tokio::select! {
            result = &mut turn => result,
            _ = interrupted() => {
                cancel.cancel();
                turn.await
            }
        };

        match result {
            Ok(outcome) => write_outcome(&mut output, &outcome, options).await?,
            Err(AgentError::Cancelled) => output.write_all(b"\nTurn cancelled.\n").await?,
            Err(err) => {
                error!(%err, "Turn failed");
                let line = format!("\nError: {}\n", err.user_message());
                output.write_all(line.as_bytes()).await?;
            }
        }
    }

    output.flush().await?;
    Ok(())
}

fn is_exit_command(query: &str) -> bool {
    query.eq_ignore_ascii_case("quit") || query.eq_ignore_ascii_case("exit")
}

async fn write_outcome<W>(
    output: &mut W,
    outcome: &TurnOutcome,
    options: ShellOptions,
) -> Result<(), ShellError>
where
    W: AsyncWrite + Unpin,
{
    let mut text = String::from("\n");
    if options.show_tools {
        for step in &outcome.steps {
            let args = serde_json::Value::Object(step.input.clone());
            text.push_str(&format!("[Calling tool {} with args {}]\n", step.tool, args));
        }
    }
    text.push_str(&outcome.answer);
    text.push('\n');
    output.write_all(text.as_bytes()).await?;
    Ok(())
}

/// Resolves on Ctrl-C. Never resolves when the signal cannot be watched.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
