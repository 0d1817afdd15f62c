//! Line-oriented chat loops between the terminal and the client queues.

use std::time::Duration;

use tether_client::{Connectivity, ConnectivityWatch, MessageQueue};
use tether_core::Message;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// How long the output loop waits on the inbound queue before re-checking
/// connectivity.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Read lines from `input` and queue each non-blank one as a message from
/// `user`, echoing it to `echo`.
///
/// Messages carry a per-session sequence number starting at 1 and the local
/// time. Returns the number of messages queued once `input` reaches EOF.
pub async fn input_loop<R, W>(input: R, user: &str, outbound: &MessageQueue, mut echo: W) -> io::Result<u64>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut seq = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        seq += 1;
        let message = Message::new(user, line).with_seq(seq).stamped_now();
        echo.write_all(format!("<< {message}\n").as_bytes()).await?;
        echo.flush().await?;
        outbound.push(message);
    }

    debug!(sent = seq, "input closed");
    Ok(seq)
}

/// Print inbound messages to `out` as they arrive.
///
/// The connectivity flag is checked after every message and every
/// [`POLL_INTERVAL`] without traffic; a status line is printed when it has
/// changed. Runs until writing fails.
pub async fn output_loop<W>(inbound: MessageQueue, connectivity: ConnectivityWatch, mut out: W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut last = connectivity.current();

    loop {
        let mut text = String::new();
        if let Some(message) = inbound.pop_timeout(POLL_INTERVAL).await {
            text = format!(">> {message}\n");
        }
        let now = connectivity.current();
        if now != last {
            last = now;
            text.push_str(status_line(now));
        }
        if text.is_empty() {
            continue;
        }
        out.write_all(text.as_bytes()).await?;
        out.flush().await?;
    }
}

/// Wait up to `limit` for every queued line to be sent, including the one
/// the send worker is currently writing. Returns whether that happened.
pub async fn drain(outbound: &MessageQueue, limit: Duration) -> bool {
    tokio::time::timeout(limit, async {
        while !outbound.is_settled() {
            tokio::time::sleep(DRAIN_POLL).await;
        }
    })
    .await
    .is_ok()
}

fn status_line(state: Connectivity) -> &'static str {
    match state {
        Connectivity::Connected => "-- connected\n",
        Connectivity::Disconnected => "-- connection lost, reconnecting\n",
    }
}
