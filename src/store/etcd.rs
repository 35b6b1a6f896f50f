use super::traits::{MonitorStore, StoreError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

type Result<T> = std::result::Result<T, StoreError>;

/// Client for the etcd v3 JSON gateway. Keys and values travel base64-encoded;
/// values are JSON documents.
#[derive(Debug)]
pub struct EtcdStore {
    base_url: String,
    client: reqwest::Client,
}

impl EtcdStore {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            return Err(StoreError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MonitorStore for EtcdStore {
    async fn get_dict(&self, key: &str) -> Result<Value> {
        let request = RangeRequest {
            key: STANDARD.encode(key),
        };
        let response: RangeResponse = self.post("/v3/kv/range", &request).await?;

        let kv = response
            .kvs
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let raw = STANDARD
            .decode(kv.value.as_bytes())
            .map_err(|e| StoreError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(serde_json::from_slice(&raw)?)
    }

    async fn put_dict(&self, key: &str, value: Value) -> Result<()> {
        let request = PutRequest {
            key: STANDARD.encode(key),
            value: STANDARD.encode(serde_json::to_vec(&value)?),
        };
        let _: Value = self.post("/v3/kv/put", &request).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RangeRequest {
    key: String,
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Serialize)]
struct PutRequest {
    key: String,
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let store = EtcdStore::new("http://etcd:2379/", Duration::from_secs(1)).unwrap();
        assert_eq!(store.base_url, "http://etcd:2379");
    }

    #[test]
    fn test_range_response_without_kvs() {
        let response: RangeResponse =
            serde_json::from_str(r#"{"header":{"revision":"7"}}"#).unwrap();
        assert!(response.kvs.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_store_errors() {
        let store = EtcdStore::new("http://127.0.0.1:1", Duration::from_millis(200)).unwrap();
        assert!(store.get_dict("/cnf/t2").await.is_err());
    }
}
