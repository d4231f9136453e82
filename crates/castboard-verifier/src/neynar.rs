/// NEYNAR HTTP ORACLE
///
/// Verifies Farcaster actions against the Neynar v2 API:
/// - cast:   author of the target cast, or the user's newest cast posted
///           since the action was started when no target is set
/// - recast: a recast reaction by the user on the target cast
/// - like:   a like reaction by the user on the target cast
/// - follow: the target user appears in the user's following list
///
/// Response parsing is kept in plain functions over the decoded bodies.

use crate::oracle::{ActionDescriptor, ActionOracle, OracleError};
use async_trait::async_trait;
use castboard_core::{ActionKind, Fid};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.neynar.com/v2";
const FOLLOWING_PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeynarConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NeynarConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

pub struct NeynarOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl NeynarOracle {
    pub fn new(config: &NeynarConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T, OracleError> {
        let mut request = self.client.get(format!("{}{}", self.base_url, endpoint)).query(query);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| OracleError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ActionOracle for NeynarOracle {
    async fn verify_action(&self, fid: &Fid, action: &ActionDescriptor) -> Result<bool, OracleError> {
        let user_fid = parse_fid(fid)?;
        debug!(fid = %fid, kind = %action.kind, "Verifying action with Neynar");

        match action.kind {
            ActionKind::Cast => match &action.target_content {
                Some(hash) => {
                    let body: CastResponse = self
                        .get("/farcaster/cast", &[("identifier", hash.clone()), ("type", "hash".into())])
                        .await?;
                    Ok(cast_authored_by(&body, user_fid))
                }
                None => {
                    let body: FeedResponse = self
                        .get("/farcaster/feed/user/casts", &[("fid", user_fid.to_string()), ("limit", "1".into())])
                        .await?;
                    Ok(cast_since(&body, action.started_at))
                }
            },
            ActionKind::Recast | ActionKind::Like => {
                let hash = action
                    .target_content
                    .clone()
                    .ok_or(OracleError::MissingTarget(action.kind))?;
                let reaction = if action.kind == ActionKind::Recast { "recasts" } else { "likes" };
                let body: ReactionsResponse = self
                    .get("/farcaster/reactions", &[("hash", hash), ("types", reaction.into())])
                    .await?;
                Ok(reacted_by(&body, user_fid, action.kind))
            }
            ActionKind::Follow => {
                let target = action
                    .target_user
                    .as_deref()
                    .ok_or(OracleError::MissingTarget(action.kind))?;
                let body: FollowingResponse = self
                    .get(
                        "/farcaster/following",
                        &[("fid", user_fid.to_string()), ("limit", FOLLOWING_PAGE_LIMIT.to_string())],
                    )
                    .await?;
                Ok(follows(&body, target))
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRef {
    pub fid: u64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CastResponse {
    #[serde(default)]
    pub cast: Option<CastBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CastBody {
    #[serde(default)]
    pub author: Option<UserRef>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub casts: Vec<CastBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReactionsResponse {
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reaction {
    #[serde(default)]
    pub reaction_type: Option<String>,
    #[serde(default)]
    pub user: Option<UserRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowingResponse {
    #[serde(default)]
    pub users: Vec<FollowEntry>,
}

/// Either a flat user or a follow object wrapping one
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowEntry {
    #[serde(default)]
    pub fid: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user: Option<UserRef>,
}

fn parse_fid(fid: &Fid) -> Result<u64, OracleError> {
    fid.as_str()
        .parse()
        .map_err(|_| OracleError::InvalidFid(fid.to_string()))
}

pub fn cast_authored_by(body: &CastResponse, fid: u64) -> bool {
    body.cast
        .as_ref()
        .and_then(|c| c.author.as_ref())
        .map_or(false, |author| author.fid == fid)
}

/// The newest cast in `body` was posted at or after `started_at`.
/// Without a start time any cast counts; a cast with no timestamp never does.
pub fn cast_since(body: &FeedResponse, started_at: Option<DateTime<Utc>>) -> bool {
    let Some(newest) = body.casts.first() else {
        return false;
    };
    match started_at {
        None => true,
        Some(start) => newest.timestamp.map_or(false, |posted| posted >= start),
    }
}

pub fn reacted_by(body: &ReactionsResponse, fid: u64, kind: ActionKind) -> bool {
    body.reactions.iter().any(|r| {
        r.user.as_ref().map_or(false, |u| u.fid == fid) && r.reaction_type.as_deref() == Some(kind.name())
    })
}

/// `target` matches by fid when numeric, otherwise by username (case-insensitive)
pub fn follows(body: &FollowingResponse, target: &str) -> bool {
    let target_fid: Option<u64> = target.parse().ok();
    body.users.iter().any(|entry| {
        let fid = entry.fid.or_else(|| entry.user.as_ref().map(|u| u.fid));
        let username = entry
            .username
            .as_deref()
            .or_else(|| entry.user.as_ref().and_then(|u| u.username.as_deref()));
        match target_fid {
            Some(target_fid) => fid == Some(target_fid),
            None => username.map_or(false, |name| name.eq_ignore_ascii_case(target)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_author() {
        let body: CastResponse =
            serde_json::from_str(r#"{"cast":{"hash":"0xabc","author":{"fid":42,"username":"alice"}}}"#).unwrap();
        assert!(cast_authored_by(&body, 42));
        assert!(!cast_authored_by(&body, 7));
        assert!(!cast_authored_by(&CastResponse::default(), 42));
    }

    #[test]
    fn test_reactions_match_user_and_type() {
        let body: ReactionsResponse = serde_json::from_str(
            r#"{"reactions":[
                {"reaction_type":"like","user":{"fid":1}},
                {"reaction_type":"recast","user":{"fid":2}}
            ]}"#,
        )
        .unwrap();
        assert!(reacted_by(&body, 1, ActionKind::Like));
        assert!(!reacted_by(&body, 1, ActionKind::Recast));
        assert!(reacted_by(&body, 2, ActionKind::Recast));
        assert!(!reacted_by(&body, 3, ActionKind::Like));
    }

    #[test]
    fn test_follow_by_fid_or_username() {
        let body: FollowingResponse = serde_json::from_str(
            r#"{"users":[
                {"object":"follow","user":{"fid":3,"username":"dwr"}},
                {"fid":1,"username":"farcaster"}
            ]}"#,
        )
        .unwrap();
        assert!(follows(&body, "farcaster"));
        assert!(follows(&body, "DWR"));
        assert!(follows(&body, "3"));
        assert!(!follows(&body, "vitalik"));
        assert!(!follows(&body, "99"));
    }

    #[test]
    fn test_missing_fields_decode_to_empty() {
        let body: ReactionsResponse = serde_json::from_str("{}").unwrap();
        assert!(body.reactions.is_empty());
        let feed: FeedResponse = serde_json::from_str(r#"{"casts":[{"author":{"fid":5}}]}"#).unwrap();
        assert_eq!(feed.casts.len(), 1);
    }

    #[test]
    fn test_untargeted_cast_must_follow_start() {
        let start = "2024-06-01T09:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let before: FeedResponse = serde_json::from_str(
            r#"{"casts":[{"author":{"fid":5},"timestamp":"2024-05-31T22:15:03.000Z"}]}"#,
        )
        .unwrap();
        let after: FeedResponse = serde_json::from_str(
            r#"{"casts":[{"author":{"fid":5},"timestamp":"2024-06-01T09:00:42.000Z"}]}"#,
        )
        .unwrap();
        let undated: FeedResponse = serde_json::from_str(r#"{"casts":[{"author":{"fid":5}}]}"#).unwrap();

        assert!(!cast_since(&before, Some(start)));
        assert!(cast_since(&after, Some(start)));
        assert!(!cast_since(&undated, Some(start)));
        assert!(cast_since(&before, None));
        assert!(!cast_since(&FeedResponse::default(), None));
    }

    #[tokio::test]
    async fn test_non_numeric_fid_rejected() {
        let oracle = NeynarOracle::new(&NeynarConfig::default()).unwrap();
        let descriptor = ActionDescriptor {
            kind: ActionKind::Cast,
            target_content: None,
            target_user: None,
            started_at: None,
        };
        assert_eq!(
            oracle.verify_action(&Fid::from("alice"), &descriptor).await,
            Err(OracleError::InvalidFid("alice".into()))
        );
    }
}
