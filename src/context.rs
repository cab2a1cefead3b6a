use std::sync::Arc;

use anyhow::Result;
use chrono::Local;

use crate::{
    aggregator::{Aggregator, Registration, TickError, Transition},
    config::{self, App},
    logging,
    scheduler::Job,
    sink::{display, record::Record},
    util::http::Http,
};

/// 程式執行期間共用的狀態，在 main 建立一次後以 `Arc` 傳給各個排程工作
pub struct AppContext {
    pub config: config::Live,
    pub aggregator: Aggregator,
    pub record: Record,
}

impl AppContext {
    pub fn new(app: App) -> Result<Self> {
        let http = Arc::new(Http::new()?);
        Ok(Self::with_aggregator(app, Aggregator::with_http(http)))
    }

    pub fn with_aggregator(app: App, aggregator: Aggregator) -> Self {
        let record = Record::from_system(&app.system);
        let ctx = AppContext {
            config: config::Live::new(app.clone()),
            aggregator,
            record,
        };
        ctx.register_all(&app);
        ctx
    }

    /// 依設定註冊產品，已註冊的產品只更新設定
    ///
    /// 回傳需要新開的排程工作
    pub fn register_all(&self, app: &App) -> Vec<Job> {
        let mut jobs = Vec::new();

        for product in &app.products {
            let source = match app.source(&product.source) {
                Some(source) => source.clone(),
                None => continue,
            };
            let registration = Registration {
                product_id: product.id.clone(),
                label: product.label.clone(),
                poll_interval: source.poll_interval(),
                source,
            };

            if self.aggregator.register_product(registration.clone()) {
                jobs.push(Job::Product(product.id.clone()));
            } else {
                self.aggregator.update_product(registration);
            }
        }

        for source in app.sources.iter().filter(|s| s.probe_interval.is_some()) {
            jobs.push(Job::Probe(source.name.clone()));
        }

        jobs
    }

    /// 輪詢一個產品，抓取失敗與名稱不符只記錄下來
    pub async fn tick(&self, product_id: &str) -> Result<()> {
        let app = self.config.current();
        match self.aggregator.tick(product_id, &app.system).await {
            Ok(Transition::Unavailable(why)) => {
                logging::warn_file_async(format!(
                    "Product {} is unavailable because {}",
                    product_id, why
                ));
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(why @ TickError::Trend(_)) => {
                logging::error_file_async(format!(
                    "Product {} kept its previous reading: {}",
                    product_id, why
                ));
                Ok(())
            }
            Err(why) => Err(why.into()),
        }
    }

    pub async fn probe(&self, source_name: &str) -> Result<()> {
        let app = self.config.current();
        let source = match app.source(source_name) {
            Some(source) if source.probe_interval.is_some() => source,
            _ => return Ok(()),
        };

        if !self.aggregator.probe(source_name, &app.system).await? {
            logging::warn_file_async(format!(
                "The session of {}({}) is not available",
                source_name,
                source.vendor.name()
            ));
        }

        Ok(())
    }

    pub fn display(&self) -> Result<()> {
        let app = self.config.current();
        display::show_stdout(&self.aggregator.snapshot(), app.system.field_width)
    }

    pub fn write_record(&self) -> Result<()> {
        let app = self.config.current();
        self.record
            .write(&self.aggregator.snapshot(), app.system.field_width, Local::now())
    }

    /// 重新讀取設定檔，新的產品會回傳對應的排程工作
    pub fn reload(&self) -> Result<Vec<Job>> {
        if !self.config.reload()? {
            return Ok(Vec::new());
        }

        logging::info_file_async("The settings have been reloaded".to_string());
        Ok(self.register_all(&self.config.current()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{fs, time::Duration};

    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        aggregator::tests::{aggregator_with, Scripted},
        config::{Product, Source},
        crawler::RawValue,
        declare::{Direction, Vendor},
    };

    pub(crate) fn test_app(name: &str) -> App {
        let mut app = App {
            sources: vec![Source {
                name: "nbcb".to_string(),
                vendor: Vendor::NbcbEbank,
                poll_interval: 1,
                auth_cookie: String::new(),
                probe_interval: None,
                yield_url: None,
                yield_selector: None,
            }],
            products: vec![Product {
                id: "1005".to_string(),
                label: "如意鑫A".to_string(),
                source: "nbcb".to_string(),
            }],
            ..App::default()
        };
        app.system.log_path = std::env::temp_dir()
            .join(format!("quota_monitor_ctx_{}_{}", name, std::process::id()))
            .join("Monitor.log")
            .to_string_lossy()
            .to_string();
        app
    }

    #[test]
    fn test_register_all() {
        let mut app = test_app("register");
        app.sources.push(Source {
            name: "spdb".to_string(),
            vendor: Vendor::Spdb,
            poll_interval: 1,
            auth_cookie: String::new(),
            probe_interval: Some(60),
            yield_url: None,
            yield_selector: None,
        });
        let ctx = AppContext::with_aggregator(
            app.clone(),
            aggregator_with(Vendor::NbcbEbank, Scripted::new(vec![])),
        );
        assert_eq!(ctx.aggregator.product_ids(), vec!["1005"]);

        // 再註冊一次不會產生新的產品工作
        assert_eq!(ctx.register_all(&app), vec![Job::Probe("spdb".to_string())]);

        app.products.push(Product {
            id: "1004".to_string(),
            label: "天利鑫B".to_string(),
            source: "nbcb".to_string(),
        });
        app.sources[0].poll_interval = 7;
        let jobs = ctx.register_all(&app);
        assert!(jobs.contains(&Job::Product("1004".to_string())));
        assert!(!jobs.contains(&Job::Product("1005".to_string())));
        assert_eq!(
            ctx.aggregator.poll_interval("1005"),
            Some(Duration::from_secs(7))
        );
    }

    #[tokio::test]
    async fn test_end_to_end_record_line() {
        let app = test_app("e2e");
        let log_path = app.system.log_path.clone();
        let ctx = AppContext::with_aggregator(
            app,
            aggregator_with(
                Vendor::NbcbEbank,
                Scripted::values(&[dec!(100), dec!(90), dec!(90), dec!(120)]),
            ),
        );

        let mut directions = Vec::new();
        for _ in 0..4 {
            ctx.tick("1005").await.unwrap();
            let state = ctx.aggregator.snapshot().remove(0);
            directions.push(state.current.unwrap().direction);
        }
        assert_eq!(
            directions,
            vec![
                Direction::Flat,
                Direction::Down,
                Direction::Flat,
                Direction::Up
            ]
        );

        ctx.write_record().unwrap();
        let content = fs::read_to_string(&log_path).unwrap();
        let line = content.lines().last().unwrap();
        assert!(line.ends_with("  如意鑫A 120"));
        assert!(!line.contains("100"));
        assert!(!line.contains('↑'));

        // 抓取失敗後從紀錄中消失
        ctx.tick("1005").await.unwrap();
        ctx.write_record().unwrap();
        let content = fs::read_to_string(&log_path).unwrap();
        assert!(!content.lines().last().unwrap().contains("如意鑫A"));

        if let Some(dir) = std::path::Path::new(&log_path).parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn test_label_mismatch_is_handled_in_tick() {
        let mut app = test_app("mismatch");
        app.products[0].label = String::new();
        let raw = |limit, label: &str| RawValue {
            limit,
            yield_rate: None,
            label: Some(label.to_string()),
        };
        let ctx = AppContext::with_aggregator(
            app,
            aggregator_with(
                Vendor::NbcbEbank,
                Scripted::new(vec![Ok(raw(dec!(100), "如意鑫A")), Ok(raw(dec!(50), "天利鑫B"))]),
            ),
        );

        assert!(ctx.tick("1005").await.is_ok());
        // 已記錄過錯誤，不再交給排程重複記錄
        assert!(ctx.tick("1005").await.is_ok());

        let current = ctx.aggregator.snapshot().remove(0).current.unwrap();
        assert_eq!(current.label, "如意鑫A");
        assert_eq!(current.value, dec!(100));
        assert!(ctx.tick("404").await.is_err());
    }

    #[tokio::test]
    async fn test_probe_without_probe_interval_is_noop() {
        let ctx = AppContext::with_aggregator(
            test_app("probe"),
            aggregator_with(Vendor::NbcbEbank, Scripted::new(vec![])),
        );
        assert!(ctx.probe("nbcb").await.is_ok());
        assert!(ctx.probe("missing").await.is_ok());
    }
}
