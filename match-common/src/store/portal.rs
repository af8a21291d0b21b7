use super::{FieldUpdate, MatchDocument, MatchStore, Registry, StoreError};
use crate::roster::{MatchId, Player, PlayerId};
use core::time::Duration;
use log::{debug, info, warn};
use reqwest::{
    Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode,
    header::{AUTHORIZATION, HeaderValue},
};
use serde_json::{Map, Value};
use std::future::Future;

/// HTTP client for the remote match document store
#[derive(Debug, Clone)]
pub struct PortalClient {
    base_url: String,
    access_token: Option<String>,
    client: Client,
}

impl PortalClient {
    pub fn new(
        base_url: &str,
        access_token: Option<&str>,
        require_https: bool,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = ClientBuilder::new()
            .https_only(require_https)
            .timeout(timeout)
            .build()?;

        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self {
            base_url,
            access_token: access_token.map(|s| s.to_string()),
            client,
        })
    }

    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    fn match_url(&self, id: &MatchId) -> String {
        format!("{}/api/matches/{}", self.base_url, id)
    }
}

/// Builds the body of a partial update. Each path is sent as its own key, the server applies
/// them one by one.
fn update_body(updates: Vec<FieldUpdate>) -> Value {
    let fields: Map<String, Value> = updates.into_iter().map(|u| (u.path, u.value)).collect();
    serde_json::json!({ "updates": fields })
}

async fn check_status(response: Response, id: Option<&MatchId>) -> Result<Response, StoreError> {
    if let (StatusCode::NOT_FOUND, Some(id)) = (response.status(), id) {
        return Err(StoreError::NotFound(id.clone()));
    }
    match response.status() {
        StatusCode::OK | StatusCode::NO_CONTENT => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            warn!("Store denied access, response: {response:?}");
            Err(StoreError::PermissionDenied)
        }
        status => {
            warn!("Store request failed, response: {response:?}");
            let body = response.text().await?;
            Err(StoreError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }
}

impl MatchStore for PortalClient {
    fn load(
        &self,
        id: &MatchId,
    ) -> impl Future<Output = Result<MatchDocument, StoreError>> + Send + 'static {
        let request = authenticated_request(
            &self.client,
            Method::GET,
            &self.match_url(id),
            &self.access_token,
        )
        .send();
        let id = id.clone();

        async move {
            let response = check_status(request.await?, Some(&id)).await?;
            let body = response.text().await?;
            let document: MatchDocument = serde_json::from_str(&body)?;
            info!("Loaded match {id} from the store");
            Ok(document)
        }
    }

    fn update(
        &self,
        id: &MatchId,
        updates: Vec<FieldUpdate>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send + 'static {
        let request = authenticated_request(
            &self.client,
            Method::PATCH,
            &self.match_url(id),
            &self.access_token,
        )
        .json(&update_body(updates));
        let client_ = self.client.clone();
        let id = id.clone();

        async move {
            let request = request.build()?;
            debug!("Sending match update to the store: {request:?}");
            let response = client_.execute(request).await?;
            check_status(response, Some(&id)).await?;
            info!("Store update for match {id} successful");
            Ok(())
        }
    }
}

impl Registry for PortalClient {
    fn fetch_players(
        &self,
        ids: &[PlayerId],
    ) -> impl Future<Output = Result<Vec<Player>, StoreError>> + Send + 'static {
        let url = format!("{}/api/players", self.base_url);
        let joined = ids
            .iter()
            .map(PlayerId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let request = authenticated_request(&self.client, Method::GET, &url, &self.access_token)
            .query(&[("ids", joined)])
            .send();

        async move {
            let response = check_status(request.await?, None).await?;
            let players = response.json::<Vec<Player>>().await?;
            debug!("Fetched {} players from the registry", players.len());
            Ok(players)
        }
    }
}

fn authenticated_request(
    client: &Client,
    method: Method,
    url: &str,
    access_token: &Option<String>,
) -> RequestBuilder {
    let mut request = client.request(method, url);
    if let Some(token) = access_token {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => request = request.header(AUTHORIZATION, value),
            Err(e) => warn!("Access token can't be used as a header, sending without it: {e}"),
        }
    }
    request
}
