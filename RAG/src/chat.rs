use crate::agent::RagAgent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Reads questions line by line and writes answers until `exit`/`quit` or end of input.
///
/// Per-request failures are reported to `output` and the loop keeps going.
pub async fn chat_loop<R, W>(agent: &RagAgent, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output
        .write_all("Starting chat (type 'exit' to quit)...\n".as_bytes())
        .await?;

    loop {
        output.write_all(b"You: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\n").await?;
            break;
        };
        if is_exit_command(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        match agent.answer_question(&line).await {
            Ok(answer) => {
                output
                    .write_all(format!("Agent: {}\n\n", answer).as_bytes())
                    .await?;
            }
            Err(err) => {
                log::error!("Question failed ({}): {}", err.kind(), err);
                output
                    .write_all(format!("Error: {}\n\n", err).as_bytes())
                    .await?;
            }
        }
    }

    output.flush().await?;
    Ok(())
}
