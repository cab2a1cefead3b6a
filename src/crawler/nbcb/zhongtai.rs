use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    config::{Source, System},
    crawler::{nbcb::ZHONGTAI_HOST, request_options, Fetcher, RawValue},
    error::FetchError,
    util::{http::Http, text},
};

#[derive(Deserialize, Debug)]
pub struct OnsaleResponse {
    pub body: Body,
}

#[derive(Deserialize, Debug)]
pub struct Body {
    #[serde(default)]
    pub list: Vec<Prd>,
}

#[derive(Deserialize, Debug)]
pub struct Prd {
    #[serde(rename = "prdCode")]
    pub prd_code: String,
    #[serde(rename = "prdName", default)]
    pub prd_name: String,
    /// 預期收益率，例如 "3.25%"
    #[serde(rename = "expectedRateShow", default)]
    pub expected_rate_show: Value,
    /// 單筆可用額度
    #[serde(rename = "perUseLimit")]
    pub per_use_limit: Value,
}

impl OnsaleResponse {
    pub fn find(&self, product_id: &str) -> Result<RawValue, FetchError> {
        let prd = self
            .body
            .list
            .iter()
            .find(|p| p.prd_code == product_id)
            .ok_or_else(|| FetchError::NotFound(product_id.to_string()))?;

        let limit = text::decimal_from_json(&prd.per_use_limit)
            .map_err(|why| FetchError::ParseError(format!("{:?}", why)))?;
        // 收益率只是附加資訊，解析不了就不顯示
        let yield_rate = text::decimal_from_json(&prd.expected_rate_show).ok();
        let label = Some(prd.prd_name.trim().to_string()).filter(|n| !n.is_empty());

        Ok(RawValue {
            limit,
            yield_rate,
            label,
        })
    }
}

/// 寧波銀行中台的在售產品清單
pub struct Zhongtai {
    http: Arc<Http>,
}

impl Zhongtai {
    pub fn new(http: Arc<Http>) -> Self {
        Zhongtai { http }
    }
}

#[async_trait]
impl Fetcher for Zhongtai {
    async fn fetch(
        &self,
        source: &Source,
        product_id: &str,
        system: &System,
    ) -> Result<RawValue, FetchError> {
        let url = format!(
            "https://{}/zhongtai/finance/prds/p-onsale-channel?turnPageBeginPos=1&turnPageShowNum=6&prdOrigin=0&prdClassify=0",
            ZHONGTAI_HOST
        );
        let options = request_options(source, system)
            .with_header("x_gw_app_id", "1101")
            .with_header("x-gw-back-http-method", "GET");
        let res = self
            .http
            .post_json::<Value, OnsaleResponse>(&url, &options, None)
            .await?;

        res.find(product_id)
    }
}
