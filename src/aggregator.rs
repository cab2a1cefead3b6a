//! 產品狀態的集中管理。
//!
//! 每個產品一個 [`Slot`]，只有該產品自己的 tick 會寫入，Display 與紀錄檔只讀取。
//! 狀態轉移：未初始化 → 有資料 → 暫無資料 → 有資料 ...
//!
//! 抓取失敗會讓產品變成暫無資料，之後第一筆成功的讀數視為第一次觀察 (持平)。

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
    time::Duration,
};

use hashbrown::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    config::{Source, System},
    crawler::{self, Fetcher, RawValue},
    declare::Vendor,
    error::{FetchError, TrendError},
    trend::{self, ProductReading},
    util::http::Http,
};

/// 提供給輸出端的產品狀態快照
#[derive(Debug, Clone, PartialEq)]
pub struct ProductState {
    pub product_id: String,
    /// `None` 代表尚未取得或暫時無法取得
    pub current: Option<ProductReading>,
}

/// 一次 tick 的結果
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Available(ProductReading),
    Unavailable(FetchError),
    /// 來源的登入檢查未通過，這次沒有發出請求
    Gated,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TickError {
    #[error("Product {0} is not registered")]
    UnknownProduct(String),

    #[error("No fetcher for vendor {0}")]
    NoFetcher(Vendor),

    #[error(transparent)]
    Trend(#[from] TrendError),
}

/// 註冊產品時的設定
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub product_id: String,
    /// 空白時使用銀行回傳的名稱
    pub label: String,
    pub source: Source,
    pub poll_interval: Duration,
}

struct Settings {
    label: String,
    source: Source,
    poll_interval: Duration,
}

struct Slot {
    product_id: String,
    settings: RwLock<Settings>,
    /// 來源需要登入檢查時，檢查通過前不輪詢
    gate_open: AtomicBool,
    current: RwLock<Option<ProductReading>>,
    /// 同一個產品的 tick 不重疊
    tick_lock: Mutex<()>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Slot {
    fn new(registration: Registration) -> Self {
        let gate_open = registration.source.probe_interval.is_none();
        Slot {
            product_id: registration.product_id,
            settings: RwLock::new(Settings {
                label: registration.label,
                source: registration.source,
                poll_interval: registration.poll_interval,
            }),
            gate_open: AtomicBool::new(gate_open),
            current: RwLock::new(None),
            tick_lock: Mutex::new(()),
        }
    }

    fn source(&self) -> Source {
        read(&self.settings).source.clone()
    }

    fn source_name_is(&self, name: &str) -> bool {
        read(&self.settings).source.name == name
    }

    /// 設定的名稱優先，其次是銀行回傳的名稱，最後是產品代碼
    fn label_for(&self, raw: &RawValue) -> String {
        let settings = read(&self.settings);
        if !settings.label.is_empty() {
            return settings.label.clone();
        }

        raw.label
            .clone()
            .unwrap_or_else(|| self.product_id.clone())
    }

    fn current(&self) -> Option<ProductReading> {
        read(&self.current).clone()
    }

    fn set(&self, reading: Option<ProductReading>) {
        *write(&self.current) = reading;
    }

    fn state(&self) -> ProductState {
        ProductState {
            product_id: self.product_id.clone(),
            current: self.current(),
        }
    }
}

pub struct Aggregator {
    slots: RwLock<Vec<Arc<Slot>>>,
    fetchers: HashMap<Vendor, Arc<dyn Fetcher>>,
}

impl Aggregator {
    pub fn new(fetchers: HashMap<Vendor, Arc<dyn Fetcher>>) -> Self {
        Aggregator {
            slots: RwLock::new(Vec::new()),
            fetchers,
        }
    }

    /// 為每一種銀行介面建立 Fetcher
    pub fn with_http(http: Arc<Http>) -> Self {
        let fetchers = Vendor::iterator()
            .map(|vendor| (vendor, crawler::fetcher_for(vendor, Arc::clone(&http))))
            .collect();

        Self::new(fetchers)
    }

    /// 加入輪詢清單，同一個產品代碼重複註冊不會有任何效果
    ///
    /// 回傳是否為新加入的產品
    pub fn register_product(&self, registration: Registration) -> bool {
        let mut slots = write(&self.slots);
        if slots
            .iter()
            .any(|s| s.product_id == registration.product_id)
        {
            return false;
        }

        let gated_source = registration
            .source
            .probe_interval
            .map(|_| registration.source.name.clone());
        let slot = Slot::new(registration);
        // 同一來源的產品共用最近一次登入檢查的結果
        if let Some(sibling) = gated_source
            .and_then(|name| slots.iter().find(|s| s.source_name_is(&name)))
        {
            let open = sibling.gate_open.load(Ordering::Relaxed);
            slot.gate_open.store(open, Ordering::Relaxed);
        }

        slots.push(Arc::new(slot));
        true
    }

    /// 更新已註冊產品的設定 (重新載入設定檔時使用)
    ///
    /// 名稱變更代表不同的產品身分，原本的讀數會清除。
    pub fn update_product(&self, registration: Registration) -> bool {
        let slot = match self.slot(&registration.product_id) {
            Some(slot) => slot,
            None => return false,
        };

        let label_changed = {
            let mut settings = write(&slot.settings);
            let label_changed = settings.label != registration.label;
            if settings.source.probe_interval.is_some() && registration.source.probe_interval.is_none() {
                slot.gate_open.store(true, Ordering::Relaxed);
            }
            settings.label = registration.label;
            settings.source = registration.source;
            settings.poll_interval = registration.poll_interval;
            label_changed
        };

        if label_changed {
            slot.set(None);
        }

        true
    }

    pub fn product_ids(&self) -> Vec<String> {
        read(&self.slots)
            .iter()
            .map(|s| s.product_id.clone())
            .collect()
    }

    pub fn poll_interval(&self, product_id: &str) -> Option<Duration> {
        self.slot(product_id)
            .map(|s| read(&s.settings).poll_interval)
    }

    fn slot(&self, product_id: &str) -> Option<Arc<Slot>> {
        read(&self.slots)
            .iter()
            .find(|s| s.product_id == product_id)
            .cloned()
    }

    fn fetcher(&self, vendor: Vendor) -> Result<&Arc<dyn Fetcher>, TickError> {
        self.fetchers.get(&vendor).ok_or(TickError::NoFetcher(vendor))
    }

    /// 抓取一次並更新該產品的狀態
    ///
    /// 抓取失敗轉為 [`Transition::Unavailable`]，不會回傳錯誤；
    /// 名稱不符時回傳錯誤且保留原本的讀數。
    pub async fn tick(&self, product_id: &str, system: &System) -> Result<Transition, TickError> {
        let slot = self
            .slot(product_id)
            .ok_or_else(|| TickError::UnknownProduct(product_id.to_string()))?;
        let _guard = slot.tick_lock.lock().await;

        if !slot.gate_open.load(Ordering::Relaxed) {
            slot.set(None);
            return Ok(Transition::Gated);
        }

        let source = slot.source();
        let fetcher = self.fetcher(source.vendor)?;

        match fetcher.fetch(&source, product_id, system).await {
            Err(why) => {
                slot.set(None);
                Ok(Transition::Unavailable(why))
            }
            Ok(raw) => {
                let label = slot.label_for(&raw);
                let previous = slot.current();
                let reading =
                    trend::mark(previous.as_ref(), raw.limit, &label)?.with_aux(raw.yield_rate);
                slot.set(Some(reading.clone()));
                Ok(Transition::Available(reading))
            }
        }
    }

    /// 檢查來源是否可用，結果決定該來源所有產品是否繼續輪詢
    ///
    /// 來源沒有任何產品時不做事；檢查失敗時該來源的產品立即變成暫無資料。
    pub async fn probe(&self, source_name: &str, system: &System) -> Result<bool, TickError> {
        let slots: Vec<Arc<Slot>> = read(&self.slots)
            .iter()
            .filter(|s| s.source_name_is(source_name))
            .cloned()
            .collect();
        let first = match slots.first() {
            Some(first) => first,
            None => return Ok(false),
        };

        let source = first.source();
        let fetcher = self.fetcher(source.vendor)?;
        let passed = fetcher
            .probe(&source, &first.product_id, system)
            .await
            .is_ok();

        for slot in &slots {
            slot.gate_open.store(passed, Ordering::Relaxed);
            if !passed {
                slot.set(None);
            }
        }

        Ok(passed)
    }

    /// 依註冊順序回傳所有產品目前的狀態
    pub fn snapshot(&self) -> Vec<ProductState> {
        read(&self.slots).iter().map(|s| s.state()).collect()
    }
}
