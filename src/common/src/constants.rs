pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8600";
pub const DEFAULT_APP_CONFIG_PATH: &str = "apps.yaml";
pub const DEFAULT_SHADOW_PATH: &str = "shadow";

/// Captured output lines retained per launched application.
pub const OUTPUT_HISTORY_LINES: usize = 1000;

/// Bearer token lifetime.
pub const TOKEN_TTL_MINUTES: i64 = 10;

/// Prefix marking stderr lines in captured output.
pub const STDERR_MARKER: &str = "!";
