//! JSON-lines host transport, the shape a native-messaging shim would speak:
//! one message per line on stdin, one command per line on stdout.

use anyhow::Result;
use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdout},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::daemon::messages::{send_or_drop, Message};

use super::{Host, HostCommand};

/// Writes each command as one JSON line.
pub struct StdioHost<W> {
    out: W,
}

impl StdioHost<Stdout> {
    pub fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
        }
    }
}

impl Default for StdioHost<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> StdioHost<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }
}

#[async_trait]
impl<W: AsyncWrite + Send + Unpin + 'static> Host for StdioHost<W> {
    async fn deliver(&mut self, command: HostCommand) -> Result<()> {
        let mut line = serde_json::to_vec(&command)?;
        line.push(b'\n');
        self.out.write_all(&line).await?;
        self.out.flush().await?;
        Ok(())
    }
}

/// Reads messages off the host pipe until EOF or shutdown. Lines that do not
/// parse are logged and skipped; a host bug must not take the daemon down.
pub async fn read_messages(
    input: impl tokio::io::AsyncRead + Unpin,
    sender: mpsc::Sender<Message>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut lines = BufReader::new(input).lines();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("Host pipe closed");
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Message>(&line) {
                    Ok(message) => send_or_drop(&sender, message),
                    Err(e) => warn!("Ignoring malformed host message {line:?}: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::daemon::messages::Message;
    use crate::host::{Host, HostCommand};

    use super::{read_messages, StdioHost};

    #[tokio::test]
    async fn test_read_messages_skips_garbage_lines() -> Result<()> {
        let input = b"{\"type\":\"USER_ACTIVITY\"}\n\
            not json\n\
            \n\
            {\"type\":\"TAB_ACTIVATED\",\"tab_id\":1,\"url\":\"https://a.example\"}\n"
            .as_slice();

        let (sender, mut receiver) = mpsc::channel(8);
        read_messages(input, sender, CancellationToken::new()).await?;

        assert_eq!(receiver.recv().await, Some(Message::UserActivity));
        assert_eq!(
            receiver.recv().await,
            Some(Message::TabActivated {
                tab_id: 1,
                url: Some("https://a.example".into())
            })
        );
        assert_eq!(receiver.recv().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_stdio_host_writes_one_line_per_command() -> Result<()> {
        let mut host = StdioHost::with_writer(Vec::new());
        host.deliver(HostCommand::Notify {
            title: "t".into(),
            message: "m".into(),
        })
        .await?;
        host.deliver(HostCommand::UpdateDimStatus {
            tab_id: 4,
            is_active: true,
        })
        .await?;

        let text = String::from_utf8(host.out)?;
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"NOTIFY\""));
        assert!(lines[1].contains("\"UPDATE_DIM_STATUS\""));
        Ok(())
    }
}
