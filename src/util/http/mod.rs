use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};

use crate::{error::FetchError, logging::Logger};

pub mod element;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

/// 每次請求的附加設定
#[derive(Debug, Clone)]
pub struct RequestOptions<'a> {
    pub user_agent: &'a str,
    /// 原封不動帶入的 Cookie
    pub cookie: Option<&'a str>,
    pub headers: header::HeaderMap,
    pub timeout: Duration,
}

impl<'a> RequestOptions<'a> {
    pub fn new(user_agent: &'a str, timeout: Duration) -> Self {
        RequestOptions {
            user_agent,
            cookie: None,
            headers: header::HeaderMap::new(),
            timeout,
        }
    }

    pub fn with_cookie(mut self, cookie: &'a str) -> Self {
        if !cookie.is_empty() {
            self.cookie = Some(cookie);
        }
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.insert(
            header::HeaderName::from_static(name),
            header::HeaderValue::from_static(value),
        );
        self
    }
}

/// 安裝 rustls 的 ring 加密實作，重複呼叫無副作用
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// reqwest client 的包裝，由 `AppContext` 持有
pub struct Http {
    client: Client,
}

impl Http {
    pub fn new() -> Result<Self> {
        install_crypto_provider();
        let client = Client::builder()
            // ===== 壓縮 =====
            .brotli(true)
            .gzip(true)
            .zstd(true)
            // ===== 超時設置 =====
            .connect_timeout(Duration::from_secs(8))
            // ===== TCP 優化 =====
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            // ===== 連接池 =====
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            // 銀行的 session cookie 由設定檔提供，不自動保存
            .cookie_store(false)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))?;

        Ok(Http { client })
    }

    /// Performs an HTTP GET request and deserializes the JSON response into the specified type.
    pub async fn get_json<RES: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions<'_>,
    ) -> Result<RES, FetchError> {
        let res = self
            .send(Method::GET, url, options, None::<fn(_) -> _>)
            .await?;
        parse_json(res).await
    }

    /// Performs an HTTP GET request and returns the response as text.
    pub async fn get_text(
        &self,
        url: &str,
        options: &RequestOptions<'_>,
    ) -> Result<String, FetchError> {
        Ok(self
            .send(Method::GET, url, options, None::<fn(_) -> _>)
            .await?
            .text()
            .await?)
    }

    /// Performs an HTTP POST request with an optional JSON body and deserializes the JSON response.
    pub async fn post_json<REQ, RES>(
        &self,
        url: &str,
        options: &RequestOptions<'_>,
        req: Option<&REQ>,
    ) -> Result<RES, FetchError>
    where
        REQ: Serialize,
        RES: DeserializeOwned,
    {
        let res = self
            .send(
                Method::POST,
                url,
                options,
                Some(|rb: RequestBuilder| {
                    if let Some(r) = req {
                        rb.json(r)
                    } else {
                        rb
                    }
                }),
            )
            .await?;
        parse_json(res).await
    }

    /// Sends a single HTTP request. No retry here: the scheduler polls again on the next tick.
    ///
    /// Non-2xx statuses are turned into [`FetchError::Network`].
    async fn send(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions<'_>,
        body: Option<impl FnOnce(RequestBuilder) -> RequestBuilder>,
    ) -> Result<Response, FetchError> {
        let visit_log = format!("{method}:{url}");
        let mut rb = self
            .client
            .request(method, url)
            .timeout(options.timeout)
            .header(header::USER_AGENT, options.user_agent)
            .headers(options.headers.clone());

        if let Some(cookie) = options.cookie {
            rb = rb.header(header::COOKIE, cookie);
        }

        if let Some(body_fn) = body {
            rb = body_fn(rb);
        }

        let start = Instant::now();
        let res = rb.send().await;
        let elapsed = start.elapsed().as_millis();

        match res {
            Ok(response) => {
                LOGGER.info(format!("{} {} {} ms", visit_log, response.status(), elapsed));
                response.error_for_status().map_err(|why| {
                    FetchError::Network(format!("{} responded {:?}", visit_log, why.status()))
                })
            }
            Err(why) => {
                LOGGER.error(format!("{} failed because {:?}. {} ms", visit_log, why, elapsed));
                Err(FetchError::from(why))
            }
        }
    }
}

async fn parse_json<RES: DeserializeOwned>(res: Response) -> Result<RES, FetchError> {
    let res_body = res.text().await?;
    serde_json::from_str(&res_body).map_err(|e| {
        let head: String = res_body.chars().take(256).collect();
        FetchError::ParseError(format!("Error parsing response JSON({}): {:?}", head, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_options() {
        let options = RequestOptions::new("Monitor", Duration::from_secs(3))
            .with_cookie("")
            .with_header("x_gw_app_id", "1101");
        assert!(options.cookie.is_none());
        assert_eq!(options.headers.get("x_gw_app_id").unwrap(), "1101");

        let options = options.with_cookie("JSESSIONID=abc");
        assert_eq!(options.cookie, Some("JSESSIONID=abc"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let http = Http::new().unwrap();
        let options = RequestOptions::new("Monitor", Duration::from_secs(2));
        let result = http
            .get_text("http://127.0.0.1:9/unreachable", &options)
            .await;
        assert!(matches!(
            result,
            Err(FetchError::Network(_)) | Err(FetchError::Timeout)
        ));
    }
}
