use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::collector::CollectorOptions;
use crate::delay_manager::Pacing;
use crate::error::RunError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Every recognised option. Values come from flags, then the environment
/// (a `.env` file is loaded into it first), then the defaults below.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Account the session logs in as; its own following is the `self` list
    #[arg(long, env = "FG_USERNAME", global = true)]
    pub username: Option<String>,

    /// Opaque credential handed to the session
    #[arg(long, env = "FG_AUTH_TOKEN", hide_env_values = true, global = true)]
    pub auth_token: Option<String>,

    #[arg(long, env = "FG_BASE_URL", default_value = "https://x.com", global = true)]
    pub base_url: String,

    #[arg(long, env = "FG_DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Defaults to <data_dir>/following
    #[arg(long, env = "FG_CHECKPOINT_DIR", global = true)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Seconds between two collected targets
    #[arg(long, env = "FG_USER_DELAY", default_value_t = 3, global = true)]
    pub user_delay: u64,

    /// Seconds to pause after every `batch_size` collected targets
    #[arg(long, env = "FG_BATCH_DELAY", default_value_t = 5, global = true)]
    pub batch_delay: u64,

    #[arg(long, env = "FG_BATCH_SIZE", default_value_t = 200, global = true)]
    pub batch_size: usize,

    /// Random extra milliseconds added to each pause
    #[arg(long, env = "FG_DELAY_JITTER_MS", default_value_t = 0, global = true)]
    pub delay_jitter_ms: u64,

    /// Item cap per target
    #[arg(long, env = "FG_MAX_ITEMS", default_value_t = 500, global = true)]
    pub max_items: usize,

    #[arg(long, env = "FG_SELF_MAX_ITEMS", default_value_t = 5000, global = true)]
    pub self_max_items: usize,

    /// Cycles without new accounts before a list counts as complete
    #[arg(long, env = "FG_MAX_STALL", default_value_t = 3, global = true)]
    pub max_stall: usize,

    #[arg(long, env = "FG_LIST_MAX_STALL", default_value_t = 10, global = true)]
    pub list_max_stall: usize,

    #[arg(long, env = "FG_LIST_MAX_CYCLES", default_value_t = 200, global = true)]
    pub list_max_cycles: usize,

    /// Milliseconds to let new content render after each reveal
    #[arg(long, env = "FG_SETTLE_MS", default_value_t = 2000, global = true)]
    pub settle_ms: u64,

    #[arg(long, env = "FG_LIST_SETTLE_MS", default_value_t = 1500, global = true)]
    pub list_settle_ms: u64,

    /// Milliseconds a list may take to show its first entry
    #[arg(long, env = "FG_LOAD_TIMEOUT_MS", default_value_t = 5000, global = true)]
    pub load_timeout_ms: u64,

    #[arg(long, env = "FG_REQUEST_TIMEOUT", default_value_t = 30, global = true)]
    pub request_timeout: u64,

    #[arg(long, env = "FG_USER_AGENT", default_value = DEFAULT_USER_AGENT, global = true)]
    pub user_agent: String,
}

impl Config {
    pub fn validate(&self) -> Result<(), RunError> {
        if self.base_url.trim().is_empty() {
            return Err(RunError::Config("base url is empty".to_string()));
        }
        if self.max_stall == 0 || self.list_max_stall == 0 {
            return Err(RunError::Config("stall window must be at least 1".to_string()));
        }
        if self.max_items == 0 || self.self_max_items == 0 {
            return Err(RunError::Config("item cap must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn require_username(&self) -> Result<&str, RunError> {
        self.username
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| RunError::Config("FG_USERNAME not set".to_string()))
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.checkpoint_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("following"))
    }

    pub fn aggregate_path(&self, namespace: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}_following_network.csv", namespace))
    }

    pub fn export_path(&self) -> PathBuf {
        self.data_dir.join("my_following.csv")
    }

    pub fn selected_path(&self) -> PathBuf {
        self.data_dir.join("selected_users.txt")
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            user_delay: Duration::from_secs(self.user_delay),
            batch_delay: Duration::from_secs(self.batch_delay),
            batch_size: self.batch_size,
            jitter: Duration::from_millis(self.delay_jitter_ms),
        }
    }

    /// Options for one target's following list.
    pub fn target_options(&self) -> CollectorOptions {
        CollectorOptions {
            max_items: self.max_items,
            max_stall: self.max_stall,
            max_cycles: None,
            settle: Duration::from_millis(self.settle_ms),
            load_timeout: Duration::from_millis(self.load_timeout_ms),
            ..CollectorOptions::default()
        }
    }

    pub fn self_options(&self) -> CollectorOptions {
        CollectorOptions {
            max_items: self.self_max_items,
            load_timeout: Duration::from_millis(self.load_timeout_ms.saturating_mul(2)),
            ..self.target_options()
        }
    }

    pub fn list_member_options(&self) -> CollectorOptions {
        CollectorOptions {
            max_stall: self.list_max_stall,
            max_cycles: Some(self.list_max_cycles),
            settle: Duration::from_millis(self.list_settle_ms),
            load_timeout: Duration::from_millis(self.load_timeout_ms),
            ..CollectorOptions::list_members()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}
