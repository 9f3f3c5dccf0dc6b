//! Config Module Tests
//!
//! ## Test Scopes
//! - **Parsing**: JSON documents with and without optional fields.
//! - **Validation**: dense worker ids, empty clusters, unknown ids.
//! - **Mappings**: verbosity to tracing level, result mode to control string.

#[cfg(test)]
mod tests {
    use crate::config::types::{
        ClusterConfig, ConfigError, MASTER_NODE_ID, NodeInfo, ResultMode, Verbosity,
    };
    use std::io::Write;
    use std::path::PathBuf;

    const THREE_WORKERS: &str = r#"{
        "master": { "id": -1, "host": "127.0.0.1", "port": 12345 },
        "workers": [
            { "id": 0, "host": "127.0.0.1", "port": 10001 },
            { "id": 1, "host": "127.0.0.1", "port": 10002 },
            { "id": 2, "host": "127.0.0.1", "port": 10003 }
        ],
        "verbosity": "info",
        "result_mode": "explicit"
    }"#;

    // ============================================================
    // PARSING TESTS
    // ============================================================

    #[test]
    fn test_parse_full_config() {
        let config = ClusterConfig::from_json(THREE_WORKERS).unwrap();

        assert_eq!(config.num_workers(), 3);
        assert_eq!(config.master.id, MASTER_NODE_ID);
        assert_eq!(config.verbosity, Verbosity::Info);
        assert_eq!(config.result_mode, ResultMode::Explicit);
    }

    #[test]
    fn test_optional_fields_take_defaults() {
        let json = r#"{
            "master": { "id": -1, "host": "localhost", "port": 12345 },
            "workers": [ { "id": 0, "host": "localhost", "port": 10001 } ]
        }"#;

        let config = ClusterConfig::from_json(json).unwrap();

        assert_eq!(config.verbosity, Verbosity::Debug);
        assert_eq!(config.result_mode, ResultMode::KeepLocal);
        assert_eq!(config.output_path, PathBuf::from("final_result.txt"));
        assert_eq!(config.reconnect_delay_ms, 1000);
        assert!(config.local_result_dir.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(THREE_WORKERS.as_bytes()).unwrap();

        let config = ClusterConfig::load(file.path()).unwrap();
        assert_eq!(config.workers[2].port, 10003);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = ClusterConfig::load("/definitely/not/here.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let result = ClusterConfig::from_json("{ not json");
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    // ============================================================
    // VALIDATION TESTS
    // ============================================================

    #[test]
    fn test_default_config_is_valid() {
        let config = ClusterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.master.port, 12345);
        assert_eq!(config.workers, vec![NodeInfo::new(0, "localhost", 10001)]);
    }

    #[test]
    fn test_empty_worker_list_is_rejected() {
        let config = ClusterConfig {
            workers: vec![],
            ..ClusterConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoWorkers)));
    }

    #[test]
    fn test_sparse_ids_are_rejected() {
        let config = ClusterConfig {
            workers: vec![
                NodeInfo::new(0, "localhost", 10001),
                NodeInfo::new(2, "localhost", 10003),
            ],
            ..ClusterConfig::default()
        };

        match config.validate() {
            Err(ConfigError::NonDenseIds { position, id }) => {
                assert_eq!(position, 1);
                assert_eq!(id, 2);
            }
            other => panic!("expected NonDenseIds, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_worker_lookup() {
        let config = ClusterConfig::from_json(THREE_WORKERS).unwrap();
        assert!(config.worker(2).is_ok());
        assert!(matches!(config.worker(3), Err(ConfigError::UnknownWorker(3))));
    }

    #[test]
    fn test_worker_peers_exclude_self_and_include_master() {
        let config = ClusterConfig::from_json(THREE_WORKERS).unwrap();

        let peers = config.worker_peers(1);
        let ids: Vec<i32> = peers.iter().map(|p| p.id).collect();

        assert_eq!(ids, vec![0, 2, MASTER_NODE_ID]);
        assert!(peers.last().unwrap().is_master());
    }

    // ============================================================
    // MAPPING TESTS
    // ============================================================

    #[test]
    fn test_verbosity_ordering_and_levels() {
        assert!(Verbosity::Deep < Verbosity::Debug);
        assert!(Verbosity::Debug < Verbosity::Info);
        assert!(Verbosity::Warn < Verbosity::Err);

        assert_eq!(Verbosity::Deep.as_level(), tracing::Level::TRACE);
        assert_eq!(Verbosity::Err.as_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_result_mode_control_strings() {
        assert_eq!(ResultMode::Explicit.control_string(), "EXPLICIT");
        assert_eq!(ResultMode::KeepLocal.control_string(), "KEEP_LOCAL");

        assert_eq!(ResultMode::from_control_string("EXPLICIT"), ResultMode::Explicit);
        assert_eq!(ResultMode::from_control_string("KEEP_LOCAL"), ResultMode::KeepLocal);
        assert_eq!(ResultMode::from_control_string("whatever"), ResultMode::KeepLocal);
    }

    #[test]
    fn test_node_address() {
        let node = NodeInfo::new(3, "tp-1d22-04", 10004);
        assert_eq!(node.address(), "tp-1d22-04:10004");
        assert!(!node.is_master());
    }
}
