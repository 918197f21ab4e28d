// Well-known labels
pub const KUBERNETES_IO_METADATA_NAME_KEY: &str = "kubernetes.io/metadata.name";

// API group and field manager
pub const MONITORING_GROUP: &str = "monitoring.coreos.com";
pub const PROMETHEUS_OPERATOR_FIELD_MANAGER: &str = "PrometheusOperator";

// Defaults
pub const DEFAULT_PROMETHEUS_VERSION: &str = "v3.5.0";
pub const DEFAULT_SCRAPE_INTERVAL: &str = "30s";
pub const DEFAULT_EVALUATION_INTERVAL: &str = "30s";
pub const DEFAULT_PROMETHEUS_LABEL_NAME: &str = "prometheus";
pub const DEFAULT_REPLICA_LABEL_NAME: &str = "prometheus_replica";
pub const DEFAULT_PROBE_PATH: &str = "/probe";

// Files and directories mounted into the Prometheus pod
pub const CONFIG_FILENAME: &str = "prometheus.yaml.gz";
pub const TLS_ASSETS_DIR: &str = "/etc/prometheus/certs";
pub const RULES_DIR: &str = "/etc/prometheus/rules";
pub const DEFAULT_QUERY_LOG_DIR: &str = "/var/log/prometheus";

// Placeholders substituted by the config reloader at runtime
pub const POD_NAME_PLACEHOLDER: &str = "$(POD_NAME)";
pub const SHARD_PLACEHOLDER: &str = "$(SHARD)";

// Condition and reason strings
pub const INVALID_CONFIGURATION_REASON: &str = "InvalidConfiguration";

// Metric names
pub const SELECTED_RESOURCES_METRIC: &str = "prometheus_operator_selected_resources";
pub const REJECTED_RESOURCES_METRIC: &str = "prometheus_operator_rejected_resources";
