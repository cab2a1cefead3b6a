use std::{
    collections::HashSet,
    env,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
    time::Duration,
};

use anyhow::{anyhow, Result};
use config::{Config as config_config, File as config_file};
use serde::{Deserialize, Serialize};

use crate::{
    declare::Vendor,
    logging::{self, rotate},
};

const CONFIG_PATH: &str = "app.json";
pub(crate) const MONITOR_CONFIG: &str = "MONITOR_CONFIG";
const MONITOR_USER_AGENT: &str = "MONITOR_USER_AGENT";
/// 來源的 cookie 可由環境變數 `<SOURCE>_AUTH_COOKIE` 覆蓋，例如 `SPDB_AUTH_COOKIE`
const AUTH_COOKIE_SUFFIX: &str = "_AUTH_COOKIE";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct App {
    #[serde(default)]
    pub system: System,
    #[serde(default = "default_sources")]
    pub sources: Vec<Source>,
    #[serde(default = "default_products")]
    pub products: Vec<Product>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct System {
    /// 寫入紀錄檔的間隔 (秒)
    #[serde(default = "default_log_interval")]
    pub log_interval: u64,
    /// 重新讀取設定檔的間隔 (秒)
    #[serde(default = "default_config_reload_interval")]
    pub config_reload_interval: u64,
    /// 更新畫面的間隔 (秒)
    #[serde(default = "default_display_interval")]
    pub display_interval: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// 單次請求的逾時 (秒)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// 每個產品數值欄位的寬度
    #[serde(default = "default_field_width")]
    pub field_width: usize,
    #[serde(default = "default_log_path")]
    pub log_path: String,
    #[serde(default = "default_log_max_bytes")]
    pub log_max_bytes: u64,
    #[serde(default = "default_log_backups")]
    pub log_backups: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Source {
    pub name: String,
    pub vendor: Vendor,
    /// 輪詢間隔 (秒)
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    #[serde(default)]
    pub auth_cookie: String,
    /// 有設定時會定期檢查登入狀態，檢查失敗期間不輪詢
    #[serde(default)]
    pub probe_interval: Option<u64>,
    /// 收益率所在的 HTML 頁面
    #[serde(default)]
    pub yield_url: Option<String>,
    #[serde(default)]
    pub yield_selector: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Product {
    /// 銀行端的產品代碼
    pub id: String,
    /// 顯示名稱，空白時使用銀行回傳的名稱
    #[serde(default)]
    pub label: String,
    /// 對應 `Source::name`
    pub source: String,
}

fn default_log_interval() -> u64 {
    15
}

fn default_config_reload_interval() -> u64 {
    300
}

fn default_display_interval() -> u64 {
    1
}

fn default_user_agent() -> String {
    "Monitor".to_string()
}

fn default_request_timeout() -> u64 {
    3
}

fn default_field_width() -> usize {
    13
}

fn default_log_path() -> String {
    "log/Monitor.log".to_string()
}

fn default_log_max_bytes() -> u64 {
    rotate::DEFAULT_MAX_SIZE
}

fn default_log_backups() -> usize {
    rotate::DEFAULT_MAX_BACKUPS
}

fn default_poll_interval() -> u64 {
    7
}

fn default_sources() -> Vec<Source> {
    vec![
        Source {
            name: "nbcb".to_string(),
            vendor: Vendor::NbcbEbank,
            poll_interval: 7,
            auth_cookie: String::new(),
            probe_interval: None,
            yield_url: None,
            yield_selector: None,
        },
        Source {
            name: "spdb".to_string(),
            vendor: Vendor::Spdb,
            poll_interval: 1,
            auth_cookie: String::new(),
            probe_interval: Some(60),
            yield_url: None,
            yield_selector: None,
        },
    ]
}

fn default_products() -> Vec<Product> {
    vec![
        Product {
            id: "1004".to_string(),
            label: "天利鑫B".to_string(),
            source: "nbcb".to_string(),
        },
        Product {
            id: "1005".to_string(),
            label: "如意鑫A".to_string(),
            source: "nbcb".to_string(),
        },
        Product {
            id: "2301187111".to_string(),
            label: "天添盈增利1号".to_string(),
            source: "spdb".to_string(),
        },
    ]
}

impl Default for System {
    fn default() -> Self {
        System {
            log_interval: default_log_interval(),
            config_reload_interval: default_config_reload_interval(),
            display_interval: default_display_interval(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
            field_width: default_field_width(),
            log_path: default_log_path(),
            log_max_bytes: default_log_max_bytes(),
            log_backups: default_log_backups(),
        }
    }
}

impl Default for App {
    fn default() -> Self {
        App {
            system: System::default(),
            sources: default_sources(),
            products: default_products(),
        }
    }
}

impl System {
    pub fn log_interval(&self) -> Duration {
        Duration::from_secs(self.log_interval.max(1))
    }

    pub fn config_reload_interval(&self) -> Duration {
        Duration::from_secs(self.config_reload_interval.max(1))
    }

    pub fn display_interval(&self) -> Duration {
        Duration::from_secs(self.display_interval.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }
}

impl Source {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.max(1))
    }

    pub fn probe_interval(&self) -> Option<Duration> {
        self.probe_interval.map(|s| Duration::from_secs(s.max(1)))
    }
}

impl App {
    /// 讀取設定檔，檔案不存在時使用預設值，最後以環境變數覆蓋
    pub fn load() -> Result<Self> {
        Self::from_file(config_path())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let app = if path.exists() {
            config_config::builder()
                .add_source(config_file::from(path.to_path_buf()))
                .build()?
                .try_deserialize::<App>()?
        } else {
            logging::warn_file_async(format!(
                "{} not found, using the default settings",
                path.display()
            ));
            App::default()
        };

        let app = app.override_with_env();
        app.validate()?;
        Ok(app)
    }

    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// 檢查產品對應的來源都存在，且來源名稱不重複
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::with_capacity(self.sources.len());
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                return Err(anyhow!("Duplicate source name: {}", source.name));
            }
        }

        for product in &self.products {
            if self.source(&product.source).is_none() {
                return Err(anyhow!(
                    "Product {} refers to an unknown source {}",
                    product.id,
                    product.source
                ));
            }
        }

        Ok(())
    }

    /// 將來至於 env 的設定值覆蓋掉檔案上的設定值
    fn override_with_env(mut self) -> Self {
        if let Ok(agent) = env::var(MONITOR_USER_AGENT) {
            self.system.user_agent = agent;
        }

        for source in self.sources.iter_mut() {
            let key = format!("{}{}", source.name.to_uppercase(), AUTH_COOKIE_SUFFIX);
            if let Ok(cookie) = env::var(key) {
                source.auth_cookie = cookie;
            }
        }

        self
    }
}

/// 執行期間可重新載入的設定
pub struct Live {
    current: RwLock<Arc<App>>,
}

impl Live {
    pub fn new(app: App) -> Self {
        Live {
            current: RwLock::new(Arc::new(app)),
        }
    }

    /// 取得目前設定的快照
    pub fn current(&self) -> Arc<App> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// 用新的設定取代目前的設定，回傳是否有變動
    pub fn replace(&self, app: App) -> bool {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if **guard == app {
            return false;
        }
        *guard = Arc::new(app);
        true
    }

    /// 重新讀取設定檔，讀取失敗時保留原本的設定
    pub fn reload(&self) -> Result<bool> {
        let app = App::load()?;
        Ok(self.replace(app))
    }
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    env::var(MONITOR_CONFIG)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(CONFIG_PATH))
}
