/// User agent string for HTTP requests
pub const USER_AGENT: &str = "iqair-influx/0.1.0";

/// IQAir (AirVisual) API base URL
pub const IQAIR_API_BASE: &str = "https://api.airvisual.com/v2";

/// Configuration file read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Status value the IQAir API reports for a usable reading
pub const STATUS_SUCCESS: &str = "success";

/// Per-request timeout for both the IQAir API and InfluxDB
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_THROTTLE_RETRY_MAX_COUNT: u32 = 3;
pub const DEFAULT_THROTTLE_WAIT_MAX_SECONDS: u64 = 10;
