//! # Constants
//!
//! Well-known names, labels and default timings shared across the operator.

/// Field manager and event reporter name
pub const CONTROLLER_NAME: &str = "rhmi-operator";

/// API group of the operator's own resources
pub const API_GROUP: &str = "integreatly.org";

/// Namespace holding the RHMI, RHMIConfig and the installation config record
pub const DEFAULT_WATCH_NAMESPACE: &str = "redhat-rhmi-operator";

/// Suffix of the installation config record name (prefixed by the namespace prefix)
pub const INSTALLATION_CONFIG_SUFFIX: &str = "installation-config";

/// Name of the singleton upgrade schedule
pub const RHMI_CONFIG_NAME: &str = "rhmi-config";

/// Names of the operator's own subscription, the only one the upgrade controller acts on
pub const OPERATOR_SUBSCRIPTION_NAMES: [&str; 2] = ["integreatly", "addon-rhmi"];

/// Service account the operator itself runs as
pub const OPERATOR_SERVICE_ACCOUNT: &str =
    "system:serviceaccount:redhat-rhmi-operator:rhmi-operator";

/// Finalizer held on the installation until every uninstall stage has completed
pub const INSTALLATION_FINALIZER: &str = "finalizer.integreatly.org/installation";

// Requeue timings
pub const DEFAULT_REQUEUE_IN_PROGRESS_SECS: u64 = 10;
pub const DEFAULT_REQUEUE_COMPLETE_SECS: u64 = 300;
pub const DEFAULT_UPGRADE_APPROVED_REQUEUE_SECS: u64 = 10;
pub const DEFAULT_UPGRADE_WAIT_REQUEUE_SECS: u64 = 60;

/// Bound on the ad-hoc cluster lookups made during bootstrap
pub const DEFAULT_CLUSTER_API_TIMEOUT_SECS: u64 = 10;

/// Attempts for read-modify-write updates that hit a resource version conflict
pub const DEFAULT_STATUS_WRITE_RETRIES: u32 = 3;

// HTTP server
pub const DEFAULT_METRICS_PORT: u16 = 5000;
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

// Pull secret copied into the operator and product namespaces
pub const DEFAULT_PULL_SECRET_NAME: &str = "pull-secret";
pub const DEFAULT_PULL_SECRET_NAMESPACE: &str = "openshift-config";

// Labels applied to objects owned by an installation
pub const LABEL_INTEGREATLY: &str = "integreatly";
pub const LABEL_INSTALLATION_UID: &str = "integreatly.org/installation-uid";
pub const LABEL_MONITORING_KEY: &str = "monitoring-key";
pub const MONITORING_KEY_VALUE: &str = "middleware";
pub const LABEL_USER_MONITORING: &str = "openshift.io/user-monitoring";

// Event reasons
pub const EVENT_PROCESSING_ERROR: &str = "ProcessingError";
pub const EVENT_INSTALLATION_COMPLETED: &str = "InstallationCompleted";
pub const EVENT_PREFLIGHT_CHECK_PASSED: &str = "PreflightCheckPassed";
pub const EVENT_UPGRADE_APPROVED: &str = "UpgradeApproved";

// Upgrade scheduling
/// Length of an upgrade window in hours
pub const UPGRADE_WINDOW_HOURS: i64 = 6;
/// Upgrades are never approved in the last hour of a window
pub const UPGRADE_WINDOW_MARGIN_HOURS: i64 = 1;
/// Days an unapproved upgrade may wait before it is forced
pub const UPGRADE_DEADLINE_DAYS: i64 = 14;
pub const DEFAULT_BACKUP_APPLY_ON: &str = "03:01";
pub const DEFAULT_MAINTENANCE_APPLY_FROM: &str = "Thu 02:00";

// Annotations
pub const ANNOTATION_SERVICE_AFFECTING: &str = "serviceAffecting";
pub const ANNOTATION_LAST_EDIT_USERNAME: &str = "lastEditUsername";
pub const ANNOTATION_LAST_EDIT_TIMESTAMP: &str = "lastEditTimestamp";

// Operator lifecycle manager defaults
pub const DEFAULT_CATALOG_SOURCE: &str = "rhmi-operators";
pub const DEFAULT_CATALOG_SOURCE_NAMESPACE: &str = "openshift-marketplace";
pub const DEFAULT_OPERATOR_GROUP_NAME: &str = "rhmi-registry-og";
pub const INTEGREATLY_CHANNEL: &str = "rhmi";
