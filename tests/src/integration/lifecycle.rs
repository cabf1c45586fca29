//! Client lifecycle: close semantics and stats accounting.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pubrpc_client::transport::channel;
    use pubrpc_client::{ClientConfig, ClientError, RpcClient};
    use pubrpc_types::Response;
    use serde_json::json;

    fn config() -> ClientConfig {
        ClientConfig {
            request_timeout: Duration::from_millis(1000),
            sweep_interval_override: Some(Duration::from_millis(50)),
            ..Default::default()
        }
    }

    /// close() fails every outstanding request and stream with `Closed`
    /// instead of leaving them dangling.
    #[tokio::test]
    async fn test_close_fails_outstanding_work() {
        crate::init_tracing();
        let (transport, mut remote) = channel::pair();
        let client = RpcClient::new(transport, config()).unwrap();

        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.send_request("p".into(), "work", None).await })
        };
        let stream = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .send_stream_request("s".into(), "tail", None, |_data, _cancel| {})
                    .await
            })
        };
        let _ = remote.next_request().await.unwrap();
        let _ = remote.next_request().await.unwrap();

        client.close().await;

        assert!(matches!(pending.await.unwrap(), Err(ClientError::Closed)));
        assert!(matches!(stream.await.unwrap(), Err(ClientError::Closed)));
        assert_eq!(client.pending_len(), 0);
        assert_eq!(client.streams_len(), 0);
    }

    /// close() is idempotent and everything after it fails fast.
    #[tokio::test]
    async fn test_close_idempotent_and_fast_fail() {
        let (transport, _remote) = channel::pair();
        let client = RpcClient::new(transport, config()).unwrap();

        client.close().await;
        client.close().await;

        assert!(matches!(
            client.send_request("x".into(), "work", None).await,
            Err(ClientError::Closed)
        ));
        assert!(matches!(
            client
                .send_stream_request("y".into(), "tail", None, |_d, _c| {})
                .await,
            Err(ClientError::Closed)
        ));
    }

    /// Byte counters move on every frame; round-trip aggregates move only
    /// when a tracker resolves.
    #[tokio::test]
    async fn test_stats_accounting() {
        let (transport, mut remote) = channel::pair();
        let client = RpcClient::new(transport, config()).unwrap();

        let task = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.send_request("a".into(), "work", None).await })
        };
        let _ = remote.next_request().await.unwrap();

        // Ack first: received bytes move, completions do not.
        remote.reply(Response::ack("a".into()).to_bytes().unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        let snap = client.stats().unwrap();
        assert!(snap.sent_bytes > 0);
        assert!(snap.received_bytes > 0);
        assert_eq!(snap.requests_completed, 0);
        assert!(snap.min_round_trip.is_none());

        remote.reply(Response::result("a".into(), json!(1)).to_bytes().unwrap());
        task.await.unwrap().unwrap();

        let snap = client.stats().unwrap();
        assert_eq!(snap.requests_completed, 1);
        assert!(snap.min_round_trip.is_some());
        assert!(snap.max_round_trip >= snap.min_round_trip);
        assert!(snap.last_received_at.is_some());
        client.close().await;
    }

    /// `call` generates unique identifiers; two concurrent calls do not
    /// collide.
    #[tokio::test]
    async fn test_call_generates_distinct_ids() {
        let (transport, mut remote) = channel::pair();
        let client = RpcClient::new(transport, config()).unwrap();

        let a = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.call("work", None).await })
        };
        let b = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.call("work", None).await })
        };

        let f1 = remote.next_request().await.unwrap();
        let f2 = remote.next_request().await.unwrap();
        let r1: pubrpc_types::Request = serde_json::from_slice(&f1).unwrap();
        let r2: pubrpc_types::Request = serde_json::from_slice(&f2).unwrap();
        assert_ne!(r1.id, r2.id);

        remote.reply(Response::result(r1.id, json!(1)).to_bytes().unwrap());
        remote.reply(Response::result(r2.id, json!(2)).to_bytes().unwrap());
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        client.close().await;
    }
}
