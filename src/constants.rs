use std::time::Duration;

/// Resource type name for the key manager.
pub const KEYS_RESOURCE: &str = "etcd_keys";

/// Resource type name for the discovery URL generator.
pub const DISCOVERY_RESOURCE: &str = "etcd_discovery";

/// Identity reported for every `etcd_keys` instance; the key set has no remote identity of its own.
pub const KEYS_RESOURCE_ID: &str = "etcd";

/// Public etcd discovery service.
pub const DEFAULT_DISCOVERY_ENDPOINT: &str = "https://discovery.etcd.io/new";

/// Cluster size requested from the discovery service when none is given.
pub const DEFAULT_CLUSTER_SIZE: u32 = 3;

/// Upper bound on a single store or discovery request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// etcd v2 error code for a missing key.
pub const ETCD_KEY_NOT_FOUND: u64 = 100;

/// Handshake protocol versions written to stdout once the server is listening.
pub const CORE_PROTOCOL_VERSION: u32 = 1;
pub const APP_PROTOCOL_VERSION: u32 = 1;
