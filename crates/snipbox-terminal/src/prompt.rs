//! Line prompt built from key reads and echoed output.

use crate::error::Result;
use crate::input::InputBridge;
use crate::output::OutputBridge;
use crate::transport::ConsoleKey;
use tokio_util::sync::CancellationToken;

/// Reads a line of at most `max_bytes` UTF-8 bytes, echoing as the user types.
///
/// Backspace erases the last character and Enter finishes the line.
/// Returns `Ok(None)` if the read is cancelled.
///
/// # Errors
///
/// Propagates transport and key-read errors.
pub async fn read_line(
    output: &OutputBridge,
    input: &InputBridge,
    cancel: &CancellationToken,
    max_bytes: usize,
) -> Result<Option<String>> {
    output
        .exclusive(|| read_line_inner(output, input, cancel, max_bytes))
        .await
}

async fn read_line_inner(
    output: &OutputBridge,
    input: &InputBridge,
    cancel: &CancellationToken,
    max_bytes: usize,
) -> Result<Option<String>> {
    let mut line = String::new();

    loop {
        let Some(key) = input.read_key(cancel).await? else {
            return Ok(None);
        };

        match key.key {
            ConsoleKey::Enter => {
                output.write_line("").await?;
                return Ok(Some(line));
            }
            ConsoleKey::Backspace => {
                if line.pop().is_some() {
                    output.write_text("\x08 \x08").await?;
                }
            }
            ConsoleKey::Char | ConsoleKey::Tab => {
                let ch = match key.key {
                    ConsoleKey::Tab => '\t',
                    _ => match key.ch {
                        Some(c) if !c.is_control() => c,
                        _ => continue,
                    },
                };
                if line.len() + ch.len_utf8() > max_bytes {
                    continue;
                }
                line.push(ch);
                let mut buf = [0u8; 4];
                output.write_text(ch.encode_utf8(&mut buf)).await?;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use snipbox_core::{SessionId, TerminalConfig};
    use std::sync::Arc;

    fn setup() -> (OutputBridge, InputBridge, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let output = OutputBridge::spawn(
            SessionId::generate(),
            transport.clone(),
            &TerminalConfig::default(),
        );
        let input = InputBridge::new(transport.clone(), CancellationToken::new());
        (output, input, transport)
    }

    #[tokio::test]
    async fn test_reads_line_with_echo() {
        let (output, input, transport) = setup();
        transport.push_text("hey\x08y\n");

        let line = read_line(&output, &input, &CancellationToken::new(), 64)
            .await
            .unwrap();
        output.flush().await.unwrap();

        assert_eq!(line.as_deref(), Some("hey"));
        assert_eq!(transport.output(), "hey\x08 \x08y\n");
        assert_eq!(output.cursor(), (0, 1));
    }

    #[tokio::test]
    async fn test_respects_byte_limit() {
        let (output, input, transport) = setup();
        transport.push_text("abcdef\n");
        let line = read_line(&output, &input, &CancellationToken::new(), 3)
            .await
            .unwrap();
        assert_eq!(line.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_cancelled_read_returns_none() {
        let (output, input, transport) = setup();
        transport.push_text("ab");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let line = read_line(&output, &input, &cancel, 64).await.unwrap();
        assert_eq!(line, None);
    }
}
