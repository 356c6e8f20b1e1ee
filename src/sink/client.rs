use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, Url};
use serde::Deserialize;

use crate::config::InfluxConfig;
use crate::error::{ListenerError, Result};

/// Per-request timeout for every call to the store.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin client for the InfluxDB 1.x HTTP API: database bootstrap and
/// line-protocol writes. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    http: reqwest::Client,
    base: Url,
    user: String,
    password: String,
}

// ─── /query response shape ───────────────────────────────────────

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

// ─── InfluxClient impl ───────────────────────────────────────────

impl InfluxClient {
    pub fn new(cfg: &InfluxConfig) -> Result<Self> {
        let url = cfg.url();
        let base = Url::parse(&url).map_err(|e| ListenerError::InvalidUrl {
            url,
            reason: e.to_string(),
        })?;
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base,
            user: cfg.user.clone(),
            password: cfg.password.clone(),
        })
    }

    /// Names of all databases on the server (`SHOW DATABASES`).
    pub async fn describe_databases(&self) -> Result<Vec<String>> {
        let resp = self.query(Method::GET, "SHOW DATABASES").send().await?;
        let body = check_status(resp).await?.text().await?;
        let parsed: QueryResponse = serde_json::from_str(&body)?;

        let mut names = Vec::new();
        for result in parsed.results {
            if let Some(err) = result.error {
                return Err(ListenerError::Query(err));
            }
            for series in result.series {
                names.extend(
                    series
                        .values
                        .iter()
                        .filter_map(|row| row.first()?.as_str().map(str::to_owned)),
                );
            }
        }
        Ok(names)
    }

    pub async fn create_database(&self, name: &str) -> Result<()> {
        let statement = format!("CREATE DATABASE \"{}\"", name.replace('"', "\\\""));
        let resp = self.query(Method::POST, &statement).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Create `name` unless it already exists. Returns whether it was created.
    pub async fn ensure_database(&self, name: &str) -> Result<bool> {
        if self.describe_databases().await?.iter().any(|db| db == name) {
            return Ok(false);
        }
        self.create_database(name).await?;
        tracing::info!(database = name, "created InfluxDB database");
        Ok(true)
    }

    /// POST newline-separated line protocol with millisecond timestamps.
    pub async fn write(&self, database: &str, retention_policy: &str, body: String) -> Result<()> {
        let mut url = self.endpoint("/write");
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("db", database);
            if !retention_policy.is_empty() {
                q.append_pair("rp", retention_policy);
            }
            q.append_pair("precision", "ms");
        }

        let resp = self
            .authed(self.http.post(url))
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    // ── Request helpers ─────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url
    }

    fn query(&self, method: Method, statement: &str) -> RequestBuilder {
        let mut url = self.endpoint("/query");
        url.query_pairs_mut().append_pair("q", statement);
        self.authed(self.http.request(method, url))
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        if self.user.is_empty() {
            req
        } else {
            req.basic_auth(&self.user, Some(&self.password))
        }
    }
}

/// Turn a non-2xx response into `StoreStatus`, keeping the body for the log.
async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ListenerError::StoreStatus { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_show_databases() {
        let body = r#"{"results":[{"statement_id":0,"series":[{"name":"databases","columns":["name"],"values":[["_internal"],["jmeter"]]}]}]}"#;
        let parsed: QueryResponse = serde_json::from_str(body).unwrap();
        let names: Vec<_> = parsed.results[0].series[0]
            .values
            .iter()
            .filter_map(|row| row.first()?.as_str())
            .collect();
        assert_eq!(names, ["_internal", "jmeter"]);
    }

    #[test]
    fn decodes_statement_error() {
        let body = r#"{"results":[{"statement_id":0,"error":"not authorized"}]}"#;
        let parsed: QueryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results[0].error.as_deref(), Some("not authorized"));
        assert!(parsed.results[0].series.is_empty());
    }

    #[test]
    fn builds_endpoints_from_config() {
        let client = InfluxClient::new(&InfluxConfig {
            host: "influx.local".into(),
            port: 9999,
            ..InfluxConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.endpoint("/write").as_str(),
            "http://influx.local:9999/write"
        );
    }
}
