use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    config::{Source, System},
    crawler::{nbcb::EBANK_HOST, request_options, Fetcher, RawValue},
    error::FetchError,
    util::{http::Http, text},
};

#[derive(Deserialize, Debug)]
pub struct ProdsResponse {
    pub cd: Cd,
}

#[derive(Deserialize, Debug)]
pub struct Cd {
    #[serde(rename = "iProdUseLimits", default)]
    pub prod_use_limits: Vec<ProdUseLimit>,
}

#[derive(Deserialize, Debug)]
pub struct ProdUseLimit {
    #[serde(rename = "prodId")]
    pub prod_id: String,
    /// 總可用額度，可能是數字或字串
    #[serde(rename = "totUseLimit")]
    pub tot_use_limit: Value,
}

impl ProdsResponse {
    pub fn find(&self, product_id: &str) -> Result<RawValue, FetchError> {
        let item = self
            .cd
            .prod_use_limits
            .iter()
            .find(|p| p.prod_id == product_id)
            .ok_or_else(|| FetchError::NotFound(product_id.to_string()))?;

        text::decimal_from_json(&item.tot_use_limit)
            .map(RawValue::new)
            .map_err(|why| FetchError::ParseError(format!("{:?}", why)))
    }
}

/// 寧波銀行個人網銀，不需登入
pub struct Ebank {
    http: Arc<Http>,
}

impl Ebank {
    pub fn new(http: Arc<Http>) -> Self {
        Ebank { http }
    }
}

#[async_trait]
impl Fetcher for Ebank {
    async fn fetch(
        &self,
        source: &Source,
        product_id: &str,
        system: &System,
    ) -> Result<RawValue, FetchError> {
        let url = format!(
            "https://{}/perbank/HB06201_noSessionFinancialProds.do?riskLevel=2&isSelling=1&orderType=2&investTerm=4&TemplateCode=9901&WEB_CHN=NH",
            EBANK_HOST
        );
        let options = request_options(source, system);
        let res = self.http.get_json::<ProdsResponse>(&url, &options).await?;

        res.find(product_id)
    }
}
