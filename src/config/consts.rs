// src/config/consts.rs

// Net config
pub const SOURCE_URL: &str = "https://territorial.io/clans";
pub const HTTP_TIMEOUT_SECS: u64 = 30;
pub const USER_AGENT: &str = concat!("clan_watch/", env!("CARGO_PKG_VERSION"));

// Local store
pub const STORE_DIR: &str = ".store";
pub const STORE_FILE: &str = "clan_data.json";
pub const CREATED_SUFFIX: &str = "created";
pub const CORRUPT_SUFFIX: &str = "corrupt";
pub const LOG_FILE: &str = "debug.log";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const RETENTION_DAYS: i64 = 30;

// Scrape
pub const MAX_ENTRIES: usize = 10;

// Charts
pub const DEFAULT_OUT_DIR: &str = "out";
pub const WINDOW_HOURS: i64 = 24;
pub const CHART_CAPTION: &str = "Top Clans Rankings over Past Day";
pub const CHART_TITLE: &str = "Top Clans Points over Past Day";

// Notify
pub const WEBHOOK_ENV: &str = "DISCORD_WEBHOOK_URL";
