use super::models::{BoardLabel, BoardList, BoardMember, RawCard};
use super::{BoardError, BoardSource};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::env;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.trello.com/1";

const CARD_FIELDS: &str = "id,name,desc,due,dueComplete,idBoard,idList,idLabels,idMembers,labels,pos,shortLink,shortUrl,url,dateLastActivity,closed";
const MEMBER_FIELDS: &str = "id,fullName,username";

/// Connection settings for the Trello REST API.
///
/// Credentials are optional here and checked on every request, so a server can
/// start without them and report a configuration error per run.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
}

impl BoardConfig {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|value| !value.trim().is_empty());

        Self {
            base_url: non_empty("TRELLO_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: non_empty("TRELLO_API_KEY"),
            api_token: non_empty("TRELLO_API_TOKEN"),
            request_timeout: env::var("TRELLO_TIMEOUT_MS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or_else(|| Duration::from_secs(30)),
        }
    }
}

#[derive(Clone)]
pub struct BoardClient {
    http: reqwest::Client,
    config: BoardConfig,
}

impl BoardClient {
    pub fn new(config: BoardConfig) -> Result<Self, BoardError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("editorial-importer/0.1")
            .build()
            .map_err(BoardError::Http)?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, BoardError> {
        let (key, token) = match (&self.config.api_key, &self.config.api_token) {
            (Some(key), Some(token)) => (key, token),
            _ => {
                return Err(BoardError::Config(
                    "missing Trello credentials; set TRELLO_API_KEY and TRELLO_API_TOKEN".into(),
                ));
            }
        };

        let raw = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let mut url = Url::parse(&raw)
            .map_err(|err| BoardError::Config(format!("invalid Trello API URL `{raw}`: {err}")))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("key", key);
            query.append_pair("token", token);
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }

        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, BoardError> {
        let url = self.build_url(path, params)?;
        log::debug!("GET {}", path);

        let response = self.http.get(url).send().await.map_err(BoardError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BoardError::Network { status, body });
        }

        let body = response.bytes().await.map_err(BoardError::Http)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl BoardSource for BoardClient {
    async fn fetch_me(&self) -> Result<BoardMember, BoardError> {
        self.get_json("/members/me", &[("fields", MEMBER_FIELDS)]).await
    }

    async fn fetch_lists(&self, board_id: &str) -> Result<Vec<BoardList>, BoardError> {
        self.get_json(
            &format!("/boards/{board_id}/lists"),
            &[("fields", "id,name,pos,closed")],
        )
        .await
    }

    async fn fetch_cards(&self, board_id: &str) -> Result<Vec<RawCard>, BoardError> {
        self.get_json(
            &format!("/boards/{board_id}/cards"),
            &[
                ("fields", CARD_FIELDS),
                ("members", "true"),
                ("member_fields", MEMBER_FIELDS),
            ],
        )
        .await
    }

    async fn fetch_labels(&self, board_id: &str) -> Result<Vec<BoardLabel>, BoardError> {
        self.get_json(&format!("/boards/{board_id}/labels"), &[]).await
    }

    async fn fetch_members(&self, board_id: &str) -> Result<Vec<BoardMember>, BoardError> {
        self.get_json(
            &format!("/boards/{board_id}/members"),
            &[("fields", MEMBER_FIELDS)],
        )
        .await
    }
}
