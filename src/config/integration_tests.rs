// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod integration_tests {
    use serde_json::json;
    use std::io::Write;
    use std::time::Duration;

    use crate::config::{load_and_validate_config, BackendKind, RuntimeBuilder, WorkerKind};
    use crate::engine::QueuerMode;
    use crate::errors::{ConfigError, ValidationError};

    /// Test that the fan-out sample loads and validates
    #[test]
    fn test_fan_out_yaml_loading() {
        let config = load_and_validate_config("configs/fan-out.yaml").unwrap();

        assert_eq!(config.entry.as_deref(), Some("split"));
        assert_eq!(config.workers.len(), 3);
        assert_eq!(config.workers[0].kind, WorkerKind::Slicer);
        assert_eq!(config.workers[2].name(), "split");
        assert!(config.workers[2].collect);
        assert_eq!(config.logging.filter.as_deref(), Some("info"));
    }

    /// Test that the TOML queue sample carries queuer options through
    #[test]
    fn test_queue_toml_loading() {
        let config = load_and_validate_config("configs/queue.toml").unwrap();

        assert_eq!(config.broker.kind, BackendKind::Memory);
        let submit = config.worker("submit").unwrap().queuer.clone().unwrap();
        assert_eq!(submit.mode, QueuerMode::Pusher);
        assert_eq!(submit.high_water_mark, 50);
        let resize = config.worker("resize").unwrap().queuer.clone().unwrap();
        assert_eq!(resize.mode, QueuerMode::Handler);
        assert_eq!(resize.concurrency, 4);
        assert_eq!(resize.expire_ms, 60_000);
    }

    /// Test that a cyclic sample is rejected with the cycle path
    #[test]
    fn test_invalid_cycle_rejected() {
        match load_and_validate_config("configs/invalid-cycle.yaml") {
            Err(ConfigError::Invalid(errors)) => assert_eq!(
                errors,
                vec![ValidationError::CyclicLink {
                    cycle: vec!["fetch".into(), "parse".into(), "fetch".into()],
                }]
            ),
            other => panic!("expected a validation failure, got {:?}", other.map(|c| c.workers.len())),
        }
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(b"workers: [ { id: a, kind: teleporter } ]").unwrap();

        assert!(matches!(load_and_validate_config(file.path()), Err(ConfigError::Yaml(_))));
    }

    /// Test running the fan-out sample end to end
    #[tokio::test]
    async fn test_fan_out_pipeline_runs() {
        let config = load_and_validate_config("configs/fan-out.yaml").unwrap();
        let pipeline = RuntimeBuilder::from_config(&config).await.unwrap();
        let mut completions = pipeline.completions().unwrap();

        pipeline.call(json!(["a", "b", "c"])).await.unwrap();

        let outcome = completions.recv().await.unwrap().unwrap();
        assert_eq!(outcome.value, json!(["a", "b", "c"]));
    }

    /// Test running the broadcast sample end to end
    #[tokio::test]
    async fn test_broadcast_pipeline_runs() {
        let config = load_and_validate_config("configs/broadcast.yaml").unwrap();
        let pipeline = RuntimeBuilder::from_config(&config).await.unwrap();
        let mut completions = pipeline.completions().unwrap();

        pipeline.call(json!({ "image": "cat.png" })).await.unwrap();

        let outcome = completions.recv().await.unwrap().unwrap();
        assert_eq!(outcome.value, json!({ "image": "cat.png" }));
        assert!(completions.try_recv().is_err());
    }

    /// Test the queue sample round trip through the in-memory broker
    #[tokio::test]
    async fn test_queue_pipeline_round_trip() {
        let config = load_and_validate_config("configs/queue.toml").unwrap();
        let pipeline = RuntimeBuilder::from_config(&config).await.unwrap();
        let mut completions = pipeline.completions().unwrap();
        pipeline.start().await.unwrap();

        pipeline
            .call(json!({ "queue": "resize", "result": "return", "width": 64 }))
            .await
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(2), completions.recv())
            .await
            .expect("result within timeout")
            .unwrap()
            .unwrap();
        assert_eq!(outcome.value["width"], json!(64));
        assert_eq!(outcome.last, Some(true));
        assert_eq!(pipeline.queuer("submit").unwrap().origin_count(), 0);
        pipeline.stop();
    }
}
