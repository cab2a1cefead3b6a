//! 監控流程使用的錯誤分類。
//!
//! 抓取失敗 ([`FetchError`]) 會在 tick 邊界被吸收成「暫時無資料」，
//! 趨勢比對的錯誤 ([`TrendError`]) 代表狀態錯亂，必須記錄下來。

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// 連線、DNS 或非 2xx 的回應
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    /// 回應的格式不符預期
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 回應的清單內找不到該產品
    #[error("Product {0} not found in response")]
    NotFound(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(why: reqwest::Error) -> Self {
        if why.is_timeout() {
            FetchError::Timeout
        } else if why.is_decode() {
            FetchError::ParseError(why.to_string())
        } else {
            FetchError::Network(why.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(why: serde_json::Error) -> Self {
        FetchError::ParseError(why.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrendError {
    /// 前一筆與新一筆屬於不同的產品
    #[error("Invariant violation: previous reading is '{previous}' but new reading is '{current}'")]
    InvariantViolation { previous: String, current: String },
}
