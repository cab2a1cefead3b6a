use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    config::{Source, System},
    declare::Vendor,
    error::FetchError,
    util::http::{Http, RequestOptions},
};

/// 寧波銀行
pub mod nbcb;
/// 浦發銀行
pub mod spdb;
/// 從 HTML 頁面補上收益率
pub mod yield_page;

/// 單次抓取的結果
#[derive(Debug, Clone, PartialEq)]
pub struct RawValue {
    /// 可用額度
    pub limit: Decimal,
    /// 預期收益率 (%)
    pub yield_rate: Option<Decimal>,
    /// 銀行回傳的產品名稱
    pub label: Option<String>,
}

impl RawValue {
    pub fn new(limit: Decimal) -> Self {
        RawValue {
            limit,
            yield_rate: None,
            label: None,
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// 抓取一個產品的可用額度，不做重試
    async fn fetch(
        &self,
        source: &Source,
        product_id: &str,
        system: &System,
    ) -> Result<RawValue, FetchError>;

    /// 檢查來源是否可用 (例如登入的 session 是否還有效)
    async fn probe(
        &self,
        source: &Source,
        product_id: &str,
        system: &System,
    ) -> Result<(), FetchError> {
        self.fetch(source, product_id, system).await.map(|_| ())
    }
}

/// 依設定的銀行介面建立對應的 Fetcher
pub fn fetcher_for(vendor: Vendor, http: Arc<Http>) -> Arc<dyn Fetcher> {
    let inner: Box<dyn Fetcher> = match vendor {
        Vendor::NbcbEbank => Box::new(nbcb::ebank::Ebank::new(Arc::clone(&http))),
        Vendor::NbcbZhongtai => Box::new(nbcb::zhongtai::Zhongtai::new(Arc::clone(&http))),
        Vendor::Spdb => Box::new(spdb::Spdb::new(Arc::clone(&http))),
    };

    Arc::new(yield_page::WithYieldPage::new(inner, http))
}

pub(crate) fn request_options<'a>(source: &'a Source, system: &'a System) -> RequestOptions<'a> {
    RequestOptions::new(&system.user_agent, system.request_timeout()).with_cookie(&source.auth_cookie)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn source(vendor: Vendor) -> Source {
        Source {
            name: vendor.to_string(),
            vendor,
            poll_interval: 1,
            auth_cookie: String::new(),
            probe_interval: None,
            yield_url: None,
            yield_selector: None,
        }
    }

    #[test]
    fn test_request_options() {
        let mut s = source(Vendor::Spdb);
        s.auth_cookie = "JSESSIONID=abc".to_string();
        let system = System::default();
        let options = request_options(&s, &system);
        assert_eq!(options.user_agent, "Monitor");
        assert_eq!(options.cookie, Some("JSESSIONID=abc"));
        assert_eq!(options.timeout, std::time::Duration::from_secs(3));
    }
}
