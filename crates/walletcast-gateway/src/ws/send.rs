use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};
use walletcast_core::types::ClientId;

#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    pub write_timeout: Duration,
    pub heartbeat: Duration,
}

/// Per-client writer: the only task that touches the socket sink.
///
/// Drains the Hub-fed outbound queue and pings on every heartbeat. Returns
/// when the queue closes (client unregistered), a write fails, or a write
/// takes longer than `write_timeout`.
pub async fn run_writer<S>(
    client_id: ClientId,
    mut sink: S,
    mut outbound: mpsc::Receiver<String>,
    config: WriterConfig,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut heartbeat = time::interval_at(Instant::now() + config.heartbeat, config.heartbeat);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let msg = tokio::select! {
            payload = outbound.recv() => match payload {
                Some(payload) => Message::Text(payload.into()),
                None => {
                    let close = sink.send(Message::Close(None));
                    let _ = time::timeout(config.write_timeout, close).await;
                    debug!(%client_id, "outbound queue closed, writer done");
                    return;
                }
            },
            _ = heartbeat.tick() => Message::Ping(Default::default()),
        };

        match time::timeout(config.write_timeout, sink.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(%client_id, error = %e, "socket write failed");
                return;
            }
            Err(_) => {
                warn!(
                    %client_id,
                    timeout_ms = config.write_timeout.as_millis() as u64,
                    "socket write stalled, dropping client"
                );
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::PollSender;

    fn config(write_timeout_ms: u64) -> WriterConfig {
        WriterConfig {
            write_timeout: Duration::from_millis(write_timeout_ms),
            heartbeat: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn forwards_payloads_in_order_then_closes() {
        let (sock_tx, mut sock_rx) = mpsc::channel::<Message>(8);
        let (out_tx, out_rx) = mpsc::channel(8);
        let writer = tokio::spawn(run_writer(
            ClientId::new(),
            PollSender::new(sock_tx),
            out_rx,
            config(1000),
        ));

        out_tx.send("one".to_string()).await.unwrap();
        out_tx.send("two".to_string()).await.unwrap();
        drop(out_tx);
        writer.await.unwrap();

        assert!(matches!(sock_rx.recv().await, Some(Message::Text(t)) if t.as_str() == "one"));
        assert!(matches!(sock_rx.recv().await, Some(Message::Text(t)) if t.as_str() == "two"));
        assert!(matches!(sock_rx.recv().await, Some(Message::Close(None))));
    }

    #[tokio::test]
    async fn stalled_socket_ends_writer() {
        // capacity 1 and never drained: second write blocks forever
        let (sock_tx, _sock_rx) = mpsc::channel::<Message>(1);
        let (out_tx, out_rx) = mpsc::channel(8);
        let writer = tokio::spawn(run_writer(
            ClientId::new(),
            PollSender::new(sock_tx),
            out_rx,
            config(50),
        ));

        out_tx.send("fills".to_string()).await.unwrap();
        out_tx.send("stalls".to_string()).await.unwrap();
        time::timeout(Duration::from_secs(2), writer)
            .await
            .expect("writer must give up on a stalled socket")
            .unwrap();
    }

    #[tokio::test]
    async fn broken_socket_ends_writer() {
        let (sock_tx, sock_rx) = mpsc::channel::<Message>(1);
        drop(sock_rx);
        let (out_tx, out_rx) = mpsc::channel(8);
        let writer = tokio::spawn(run_writer(
            ClientId::new(),
            PollSender::new(sock_tx),
            out_rx,
            config(1000),
        ));

        out_tx.send("lost".to_string()).await.unwrap();
        time::timeout(Duration::from_secs(1), writer)
            .await
            .unwrap()
            .unwrap();
    }
}
