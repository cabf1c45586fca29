//! Stream request flows: chunk delivery, terminal frames, cancellation,
//! and the notification fallback for frames that match nothing.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use pubrpc_client::transport::channel;
    use pubrpc_client::{ClientConfig, ClientError, ClientStats, NotificationHandler, RpcClient};
    use pubrpc_types::{Request, Response, RpcErrorPayload};
    use serde_json::{json, Value};

    fn config() -> ClientConfig {
        ClientConfig {
            request_timeout: Duration::from_millis(1000),
            sweep_interval_override: Some(Duration::from_millis(50)),
            ..Default::default()
        }
    }

    /// Chunk then terminal result: the sink sees exactly the chunk, the
    /// caller gets the terminal value, and the stream entry is gone.
    #[tokio::test]
    async fn test_chunk_then_terminal_result() {
        crate::init_tracing();
        let (transport, mut remote) = channel::pair();
        let client = RpcClient::new(transport, config()).unwrap();

        let chunks: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let task = {
            let client = Arc::clone(&client);
            let chunks = Arc::clone(&chunks);
            tokio::spawn(async move {
                client
                    .send_stream_request("s1".into(), "tail", None, move |data, _cancel| {
                        chunks.lock().push(data);
                    })
                    .await
            })
        };
        let frame = remote.next_request().await.unwrap();
        let req: Request = serde_json::from_slice(&frame).unwrap();
        assert!(req.options.unwrap().stream);

        remote.reply(Response::stream_chunk("s1".into(), json!("chunk-A")).to_bytes().unwrap());
        remote.reply(Response::stream_result("s1".into(), json!("done")).to_bytes().unwrap());

        assert_eq!(task.await.unwrap().unwrap(), json!("done"));
        assert_eq!(chunks.lock().as_slice(), &[json!("chunk-A")]);
        assert_eq!(client.streams_len(), 0);
        client.close().await;
    }

    /// Chunks alone never complete the stream; the caller stays pending
    /// until a terminal frame arrives.
    #[tokio::test]
    async fn test_chunks_never_complete_stream() {
        let (transport, mut remote) = channel::pair();
        let client = RpcClient::new(transport, config()).unwrap();

        let task = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .send_stream_request("s".into(), "tail", None, |_data, _cancel| {})
                    .await
            })
        };
        let _ = remote.next_request().await.unwrap();

        for i in 0..3 {
            remote.reply(Response::stream_chunk("s".into(), json!(i)).to_bytes().unwrap());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());
        assert_eq!(client.streams_len(), 1);

        remote.reply(Response::stream_result("s".into(), Value::Null).to_bytes().unwrap());
        assert_eq!(task.await.unwrap().unwrap(), Value::Null);
        client.close().await;
    }

    /// A terminal error frame fails the stream's caller.
    #[tokio::test]
    async fn test_terminal_error_fails_stream() {
        let (transport, mut remote) = channel::pair();
        let client = RpcClient::new(transport, config()).unwrap();

        let task = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .send_stream_request("s".into(), "tail", None, |_data, _cancel| {})
                    .await
            })
        };
        let _ = remote.next_request().await.unwrap();
        remote.reply(
            Response::stream_error("s".into(), RpcErrorPayload::new(-32002, "upstream gone"))
                .to_bytes()
                .unwrap(),
        );

        match task.await.unwrap() {
            Err(ClientError::Remote(payload)) => assert_eq!(payload.code, Some(-32002)),
            other => panic!("expected remote error, got {other:?}"),
        }
        assert_eq!(client.streams_len(), 0);
        client.close().await;
    }

    /// Chunks arriving after the terminal frame match no stream and fall
    /// through to the notification handler.
    #[tokio::test]
    async fn test_post_terminal_chunk_is_notification() {
        let (transport, mut remote) = channel::pair();
        let pushed: Arc<Mutex<Vec<Response>>> = Arc::new(Mutex::new(Vec::new()));
        let handler: NotificationHandler = {
            let pushed = Arc::clone(&pushed);
            Arc::new(move |resp| pushed.lock().push(resp))
        };
        let client = RpcClient::with_handlers(
            transport,
            config(),
            handler,
            Arc::new(ClientStats::default()),
        )
        .unwrap();

        let task = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .send_stream_request("s".into(), "tail", None, |_data, _cancel| {})
                    .await
            })
        };
        let _ = remote.next_request().await.unwrap();
        remote.reply(Response::stream_result("s".into(), json!("done")).to_bytes().unwrap());
        task.await.unwrap().unwrap();

        remote.reply(Response::stream_chunk("s".into(), json!("straggler")).to_bytes().unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;

        let pushed = pushed.lock();
        assert_eq!(pushed.len(), 1);
        let frame = pushed[0].stream.as_ref().unwrap();
        assert_eq!(frame.data, Some(json!("straggler")));
        client.close().await;
    }

    /// The sink's cancellation handle closes the stream from inside a
    /// chunk callback; the caller resolves as cancelled.
    #[tokio::test]
    async fn test_sink_can_cancel_its_own_stream() {
        let (transport, mut remote) = channel::pair();
        let client = RpcClient::new(transport, config()).unwrap();

        let task = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .send_stream_request("s".into(), "tail", None, |_data, cancel| {
                        cancel.cancel(true);
                    })
                    .await
            })
        };
        let _ = remote.next_request().await.unwrap();
        remote.reply(Response::stream_chunk("s".into(), json!("first")).to_bytes().unwrap());

        assert!(matches!(task.await.unwrap(), Err(ClientError::Cancelled)));
        assert_eq!(client.streams_len(), 0);
        client.close().await;
    }

    /// Client-side stream cancellation with drop-reply: later frames for
    /// the id become unsolicited.
    #[tokio::test]
    async fn test_cancel_stream_request_drop_reply() {
        let (transport, mut remote) = channel::pair();
        let client = RpcClient::new(transport, config()).unwrap();

        let task = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .send_stream_request("s".into(), "tail", None, |_data, _cancel| {
                        panic!("no chunk should be delivered after cancellation");
                    })
                    .await
            })
        };
        let _ = remote.next_request().await.unwrap();
        client.cancel_stream_request(&"s".into(), true).await;
        assert!(matches!(task.await.unwrap(), Err(ClientError::Cancelled)));

        remote.reply(Response::stream_chunk("s".into(), json!("late")).to_bytes().unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.streams_len(), 0);
        client.close().await;
    }

    /// A plain notification (no id, no stream envelope) reaches the
    /// handler untouched.
    #[tokio::test]
    async fn test_plain_notification_forwarded() {
        let (transport, remote) = channel::pair();
        let pushed: Arc<Mutex<Vec<Response>>> = Arc::new(Mutex::new(Vec::new()));
        let handler: NotificationHandler = {
            let pushed = Arc::clone(&pushed);
            Arc::new(move |resp| pushed.lock().push(resp))
        };
        let client = RpcClient::with_handlers(
            transport,
            config(),
            handler,
            Arc::new(ClientStats::default()),
        )
        .unwrap();

        let push = Response {
            result: Some(json!({"event": "rebalance"})),
            ..Default::default()
        };
        remote.reply(push.to_bytes().unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(pushed.lock()[0].result, Some(json!({"event": "rebalance"})));
        client.close().await;
    }
}
