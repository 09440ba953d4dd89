//! Test doubles shared by unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::api::BitbucketClient;
use crate::client::{ApiClient, QueryParams};
use crate::config::{BitbucketConfig, BitbucketCredentials};
use crate::error::{BitbucketError, BitbucketResult};

/// Fails every request with a transport error.
pub(crate) struct Offline;

#[async_trait]
impl ApiClient for Offline {
    async fn get(&self, _url: Url, _params: &QueryParams) -> BitbucketResult<Value> {
        Err(BitbucketError::Transport("offline".into()))
    }

    async fn put(&self, _url: Url, _params: &QueryParams, _body: &Value) -> BitbucketResult<Value> {
        Err(BitbucketError::Transport("offline".into()))
    }

    async fn delete(&self, _url: Url, _params: &QueryParams) -> BitbucketResult<Value> {
        Err(BitbucketError::Transport("offline".into()))
    }
}

pub(crate) fn offline_client() -> BitbucketClient {
    let config = BitbucketConfig::new(BitbucketCredentials::token("t"));
    match BitbucketClient::new(Arc::new(Offline), &config) {
        Ok(client) => client,
        Err(e) => panic!("default config must produce a client: {e}"),
    }
}
