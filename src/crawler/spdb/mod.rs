use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::{Source, System},
    crawler::{request_options, Fetcher, RawValue},
    error::FetchError,
    util::{http::Http, text},
};

const HOST: &str = "ebank.spdb.com.cn";

#[derive(Serialize, Debug)]
struct QueryAvlLimitAmntRequest<'a> {
    #[serde(rename = "FinanceNo")]
    finance_no: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct QueryAvlLimitAmntResponse {
    /// 可用額度，例如 "12,345,678.00"；session 失效時沒有這個欄位
    #[serde(rename = "CanUseQuota", default)]
    pub can_use_quota: Option<Value>,
}

impl QueryAvlLimitAmntResponse {
    pub fn to_raw(&self, product_id: &str) -> Result<RawValue, FetchError> {
        let quota = self
            .can_use_quota
            .as_ref()
            .ok_or_else(|| FetchError::NotFound(product_id.to_string()))?;

        text::decimal_from_json(quota)
            .map(RawValue::new)
            .map_err(|why| FetchError::ParseError(format!("{:?}", why)))
    }
}

/// 浦發銀行，請求時原封不動帶上設定檔內的 cookie
pub struct Spdb {
    http: Arc<Http>,
}

impl Spdb {
    pub fn new(http: Arc<Http>) -> Self {
        Spdb { http }
    }
}

#[async_trait]
impl Fetcher for Spdb {
    async fn fetch(
        &self,
        source: &Source,
        product_id: &str,
        system: &System,
    ) -> Result<RawValue, FetchError> {
        let url = format!(
            "https://{}/msper-web-finance/QueryAvlLimitAmnt.json",
            HOST
        );
        let options = request_options(source, system);
        let req = QueryAvlLimitAmntRequest {
            finance_no: product_id,
        };
        let res = self
            .http
            .post_json::<_, QueryAvlLimitAmntResponse>(&url, &options, Some(&req))
            .await?;

        res.to_raw(product_id)
    }
}
