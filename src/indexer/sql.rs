use crate::error::{
    Error,
    Result,
};
use reqwest::StatusCode;
use serde::{
    Deserialize,
    de::DeserializeOwned,
};
use url::Url;

/// Client for Torii's `GET /sql?query=` endpoint.
#[derive(Clone, Debug)]
pub struct SqlClient {
    base_url: Url,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ErrorDto {
    error: Option<String>,
    message: Option<String>,
}

impl SqlClient {
    /// Accepts either the Torii root or its GraphQL URL.
    pub fn new(torii_url: &str) -> Result<Self> {
        let trimmed = torii_url.trim_end_matches('/');
        let trimmed = trimmed.strip_suffix("/graphql").unwrap_or(trimmed);
        let base_url = Url::parse(&format!("{trimmed}/"))?;
        let http = reqwest::Client::builder().build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn sql_url(&self, sql: &str) -> Result<Url> {
        let mut url = self.base_url.join("sql")?;
        url.query_pairs_mut().append_pair("query", sql);
        Ok(url)
    }

    pub async fn query<T: DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>> {
        let rows = self.query_rows(sql).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(Error::from))
            .collect()
    }

    pub async fn query_rows(&self, sql: &str) -> Result<Vec<serde_json::Value>> {
        let url = self.sql_url(sql)?;
        tracing::debug!(query = %compact(sql), "sql query");
        let res = self.http.get(url).send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            return Err(indexer_error(status, &bytes));
        }
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        rows_from_body(body)
    }
}

fn indexer_error(status: StatusCode, bytes: &[u8]) -> Error {
    let message = serde_json::from_slice::<ErrorDto>(bytes)
        .ok()
        .and_then(|dto| dto.error.or(dto.message))
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned());
    Error::Indexer {
        status: status.as_u16(),
        message,
    }
}

pub(crate) fn rows_from_body(body: serde_json::Value) -> Result<Vec<serde_json::Value>> {
    match body {
        serde_json::Value::Array(rows) => Ok(rows),
        serde_json::Value::Object(mut map) => {
            for key in ["rows", "data", "results"] {
                if let Some(serde_json::Value::Array(rows)) = map.remove(key) {
                    return Ok(rows);
                }
            }
            let message = map
                .get("error")
                .or_else(|| map.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unexpected response shape")
                .to_string();
            Err(Error::Indexer {
                status: StatusCode::OK.as_u16(),
                message,
            })
        }
        other => Err(Error::Decode(format!("unexpected sql response: {other}"))),
    }
}

fn compact(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
