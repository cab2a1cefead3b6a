use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    config::{Source, System},
    crawler::{request_options, Fetcher, RawValue},
    error::FetchError,
    logging,
    util::http::{element, Http},
};

/// 額度抓取成功、且來源設定了 `yield_url` 與 `yield_selector` 時，
/// 從該 HTML 頁面補上收益率。收益率抓不到不影響額度。
pub struct WithYieldPage {
    inner: Box<dyn Fetcher>,
    http: Arc<Http>,
}

impl WithYieldPage {
    pub fn new(inner: Box<dyn Fetcher>, http: Arc<Http>) -> Self {
        WithYieldPage { inner, http }
    }

    async fn fetch_yield(
        &self,
        source: &Source,
        url: &str,
        selector: &str,
        system: &System,
    ) -> Option<Decimal> {
        let options = request_options(source, system);
        let html = match self.http.get_text(url, &options).await {
            Ok(html) => html,
            Err(why) => {
                logging::warn_file_async(format!(
                    "Failed to fetch the yield page of {} because {:?}",
                    source.name, why
                ));
                return None;
            }
        };

        parse_yield(&html, selector, &source.name)
    }
}

fn parse_yield(html: &str, selector: &str, source_name: &str) -> Option<Decimal> {
    match element::select_decimal(html, selector) {
        Ok(rate) => Some(rate),
        Err(why) => {
            logging::warn_file_async(format!(
                "Failed to parse the yield of {} because {:?}",
                source_name, why
            ));
            None
        }
    }
}

#[async_trait]
impl Fetcher for WithYieldPage {
    async fn fetch(
        &self,
        source: &Source,
        product_id: &str,
        system: &System,
    ) -> Result<RawValue, FetchError> {
        let mut raw = self.inner.fetch(source, product_id, system).await?;

        if raw.yield_rate.is_none() {
            if let (Some(url), Some(selector)) = (&source.yield_url, &source.yield_selector) {
                raw.yield_rate = self.fetch_yield(source, url, selector, system).await;
            }
        }

        Ok(raw)
    }

    async fn probe(
        &self,
        source: &Source,
        product_id: &str,
        system: &System,
    ) -> Result<(), FetchError> {
        self.inner.probe(source, product_id, system).await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{crawler::tests::source, declare::Vendor};

    struct Fixed(RawValue);

    #[async_trait]
    impl Fetcher for Fixed {
        async fn fetch(&self, _: &Source, _: &str, _: &System) -> Result<RawValue, FetchError> {
            Ok(self.0.clone())
        }
    }

    macro_rules! aw {
        ($e:expr) => {
            tokio_test::block_on($e)
        };
    }

    #[test]
    fn test_parse_yield() {
        let html = r#"<table><tr><td class="rate">2.85%</td></tr></table>"#;
        assert_eq!(parse_yield(html, "td.rate", "nbcb"), Some(dec!(2.85)));
        assert_eq!(parse_yield(html, "td.limit", "nbcb"), None);
    }

    #[test]
    fn test_without_yield_page_passes_through() {
        let raw = RawValue::new(dec!(1000));
        let fetcher = WithYieldPage::new(
            Box::new(Fixed(raw.clone())),
            Arc::new(Http::new().unwrap()),
        );
        let result = aw!(fetcher.fetch(&source(Vendor::NbcbEbank), "1004", &System::default()));
        assert_eq!(result, Ok(raw));
    }

    #[tokio::test]
    async fn test_unreachable_yield_page_keeps_limit() {
        let mut s = source(Vendor::NbcbEbank);
        s.yield_url = Some("http://127.0.0.1:9/yield".to_string());
        s.yield_selector = Some("td.rate".to_string());
        let fetcher = WithYieldPage::new(
            Box::new(Fixed(RawValue::new(dec!(1000)))),
            Arc::new(Http::new().unwrap()),
        );

        let raw = fetcher.fetch(&s, "1004", &System::default()).await.unwrap();
        assert_eq!(raw.limit, dec!(1000));
        assert!(raw.yield_rate.is_none());
    }
}
