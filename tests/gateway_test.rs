//! Integration tests for the gateway transport against a local stub gateway

#[cfg(all(feature = "gateway", feature = "server"))]
mod gateway_tests {
    use axum::{
        body::Bytes,
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Router,
    };
    use motion_sensor_agent::config::Config;
    use motion_sensor_agent::control::ControlMailbox;
    use motion_sensor_agent::core::{EventRecord, ManualClock, Pipeline, Sampler};
    use motion_sensor_agent::gateway::{GatewayConfig, GatewayTransport};
    use motion_sensor_agent::publisher::{NoFeedback, Publisher, Transport};
    use motion_sensor_agent::sensor::{SyntheticAccelerometer, Waveform};
    use motion_sensor_agent::telemetry::create_shared_log;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct Received {
        topic: String,
        body: Vec<u8>,
        authorization: Option<String>,
        client_id: Option<String>,
    }

    type Inbox = Arc<Mutex<Vec<Received>>>;

    fn header(headers: &HeaderMap, name: &str) -> Option<String> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    /// Serve a minimal gateway on `port` (0 for random) from a background thread.
    fn spawn_stub(port: u16) -> (u16, Inbox) {
        let inbox: Inbox = Arc::new(Mutex::new(Vec::new()));
        let store = inbox.clone();
        let (tx, rx) = std::sync::mpsc::channel();

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("stub runtime");
            runtime.block_on(async move {
                let app = Router::new()
                    .route("/health", get(|| async { "ok" }))
                    .route(
                        "/v1/topics/:topic",
                        post(
                            move |Path(topic): Path<String>, headers: HeaderMap, body: Bytes| {
                                let store = store.clone();
                                async move {
                                    store.lock().unwrap().push(Received {
                                        topic,
                                        body: body.to_vec(),
                                        authorization: header(&headers, "authorization"),
                                        client_id: header(&headers, "x-client-id"),
                                    });
                                    StatusCode::OK
                                }
                            },
                        ),
                    );
                let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
                    .await
                    .expect("bind stub");
                tx.send(listener.local_addr().expect("stub addr").port())
                    .expect("report port");
                axum::serve(listener, app).await.expect("stub server");
            });
        });

        let port = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("stub started");
        (port, inbox)
    }

    fn gateway_config(port: u16) -> GatewayConfig {
        let mut config = GatewayConfig::new("127.0.0.1", port, "secret");
        config.client_id = "bench-01".to_string();
        config.request_timeout = Duration::from_secs(2);
        config
    }

    #[test]
    fn test_publish_reaches_gateway() {
        let (port, inbox) = spawn_stub(0);
        let mut transport = GatewayTransport::connect(gateway_config(port)).unwrap();
        assert!(transport.connected());

        assert!(transport.publish("accelerometer_out", br#"{"timestamp":1,"accl_mag":0.0}"#));

        let received = inbox.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].topic, "accelerometer_out");
        assert_eq!(received[0].body, br#"{"timestamp":1,"accl_mag":0.0}"#);
        assert_eq!(received[0].authorization.as_deref(), Some("Bearer secret"));
        assert_eq!(received[0].client_id.as_deref(), Some("bench-01"));
    }

    #[test]
    fn test_service_reconnects_after_backoff() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let mut config = gateway_config(port);
        config.reconnect_backoff = Duration::ZERO;
        let mut transport = GatewayTransport::connect(config).unwrap();
        assert!(!transport.connected());

        let (_, inbox) = spawn_stub(port);
        transport.service();
        assert!(transport.connected());

        assert!(transport.publish("accelerometer_out", b"{}"));
        assert_eq!(inbox.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_pipeline_publishes_over_gateway() {
        let (port, inbox) = spawn_stub(0);
        let config = Config::default();

        let transport = GatewayTransport::connect(gateway_config(port)).unwrap();
        let sampler = Sampler::start(
            SyntheticAccelerometer::new(Waveform::from_name("sine").unwrap(), 64.0),
            ManualClock::new(),
            64.0,
        )
        .unwrap();
        let publisher = Publisher::new(
            transport,
            NoFeedback,
            config.transport.publish_topic.clone(),
            config.payload.budget(),
            config.feedback.tone(),
        );
        let mut pipeline = Pipeline::new(
            &config,
            sampler,
            publisher,
            ControlMailbox::new(),
            create_shared_log(),
        )
        .unwrap();

        let report = pipeline.run_cycle().unwrap();
        assert!(report.published());

        let received = inbox.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        let record = EventRecord::decode(&received[0].body).unwrap();
        assert_eq!(record.accl_fft.len(), 9);
    }
}
