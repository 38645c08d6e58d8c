//! Outcome Client: the engine's only view of the reward authority.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::constants::{
    AGGREGATE_ENDPOINT, BUDGET_ENDPOINT, CARD_DRAW_ENDPOINT, DETAILS_ENDPOINT, SPIN_ENDPOINT,
};
use shared::{
    CardDraw, CardDrawRequest, CardDrawResponse, EventAggregate, EventDetails, SpinRequest,
    SpinResponse, TurnBudget, TurnOutcome,
};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::ClientError;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Requests issued to the reward authority. Implementations perform no
/// retries and keep no state of their own.
pub trait OutcomeClient: Send + Sync + 'static {
    fn request_spin_outcome(&self) -> impl Future<Output = ClientResult<TurnOutcome>> + Send;

    /// Picks `slot_index` out of `total_slots` and returns the reward bound to
    /// every slot of the draw.
    fn request_card_outcome(
        &self,
        slot_index: usize,
        total_slots: usize,
    ) -> impl Future<Output = ClientResult<CardDraw>> + Send;

    fn fetch_budget(&self) -> impl Future<Output = ClientResult<TurnBudget>> + Send;

    fn fetch_event_aggregate(&self) -> impl Future<Output = ClientResult<EventAggregate>> + Send;

    fn fetch_event_details(&self) -> impl Future<Output = ClientResult<EventDetails>> + Send;
}

/// [`OutcomeClient`] over the authority's JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpOutcomeClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpOutcomeClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &EngineConfig) -> ClientResult<Self> {
        Self::new(
            config.api_base_url.clone(),
            config.auth_token.clone(),
            config.request_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            debug!(%status, "authority returned non-success status");
            return Err(ClientError::Failed(status));
        }
        Ok(response.json::<T>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(self.http.get(self.url(path))).await
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

impl OutcomeClient for HttpOutcomeClient {
    async fn request_spin_outcome(&self) -> ClientResult<TurnOutcome> {
        let request = SpinRequest { timestamp: now_millis() };
        let response: SpinResponse = self
            .send(self.http.post(self.url(SPIN_ENDPOINT)).json(&request))
            .await?;
        if !response.success {
            return Err(ClientError::Rejected(
                response.message.unwrap_or_else(|| "spin refused".to_string()),
            ));
        }
        response
            .outcome
            .ok_or_else(|| ClientError::UnexpectedResponse("spin succeeded without an outcome".to_string()))
    }

    async fn request_card_outcome(&self, slot_index: usize, total_slots: usize) -> ClientResult<CardDraw> {
        let request = CardDrawRequest { slot_index, total_slots };
        let response: CardDrawResponse = self
            .send(self.http.post(self.url(CARD_DRAW_ENDPOINT)).json(&request))
            .await?;
        if !response.success {
            return Err(ClientError::Rejected(
                response.message.unwrap_or_else(|| "draw refused".to_string()),
            ));
        }
        Ok(CardDraw {
            chosen_slot: slot_index,
            per_slot_rewards: response.per_slot_rewards,
        })
    }

    async fn fetch_budget(&self) -> ClientResult<TurnBudget> {
        self.get(BUDGET_ENDPOINT).await
    }

    async fn fetch_event_aggregate(&self) -> ClientResult<EventAggregate> {
        self.get(AGGREGATE_ENDPOINT).await
    }

    async fn fetch_event_details(&self) -> ClientResult<EventDetails> {
        self.get(DETAILS_ENDPOINT).await
    }
}
