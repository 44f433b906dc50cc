//! Response envelopes of the remote API and their conversion into pages
//!
//! The API wraps every answer in `{ "response": ..., "error": ... }`. The
//! batched comments method additionally reports partial failures of its inner
//! calls in `execute_errors`.

use crate::model::{Comment, Item, Page, Post, Profile, Source};
use crate::FetchError;
use serde::Deserialize;

/// Error code the API uses for "rate limit reached"
pub const RATE_LIMIT_CODE: i64 = 29;

/// "Too many requests per second": retried like a transport hiccup
pub const TOO_MANY_REQUESTS_CODE: i64 = 6;

/// "Internal server error"
pub const INTERNAL_ERROR_CODE: i64 = 10;

/// Error object embedded in a response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    pub error_code: i64,
    #[serde(default)]
    pub error_msg: String,
}

impl ApiError {
    /// Maps the remote error code onto the crawler's retry taxonomy
    pub fn classify(&self) -> FetchError {
        match self.error_code {
            RATE_LIMIT_CODE => FetchError::RateLimited {
                code: self.error_code,
                message: self.error_msg.clone(),
            },
            TOO_MANY_REQUESTS_CODE | INTERNAL_ERROR_CODE => FetchError::Transient(format!(
                "remote error {}: {}",
                self.error_code, self.error_msg
            )),
            code => FetchError::Fatal {
                code,
                message: self.error_msg.clone(),
            },
        }
    }
}

/// Top-level response envelope
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "Option::default")]
    pub response: Option<T>,
    #[serde(default)]
    pub error: Option<ApiError>,
    #[serde(default)]
    pub execute_errors: Vec<ApiError>,
}

impl<T> Envelope<T> {
    /// Unwraps the payload or classifies the reported failure
    ///
    /// A rate-limit among `execute_errors` fails the whole call; other inner
    /// errors (usually a deleted post) are logged and the partial payload is
    /// kept.
    pub fn into_result(self) -> Result<T, FetchError> {
        if let Some(error) = self.error {
            return Err(error.classify());
        }

        if let Some(limited) = self
            .execute_errors
            .iter()
            .find(|e| e.error_code == RATE_LIMIT_CODE)
        {
            return Err(limited.classify());
        }

        for error in &self.execute_errors {
            tracing::warn!(
                code = error.error_code,
                "Partial failure inside batched call: {}",
                error.error_msg
            );
        }

        self.response
            .ok_or_else(|| FetchError::Transient("response payload missing".to_string()))
    }
}

/// Numeric or string identifier, as the batched method returns either
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Number(i64),
    Text(String),
}

impl WireId {
    pub fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

/// Payload of the batched comments method
#[derive(Debug, Default, Deserialize)]
pub struct CommentsResponse {
    #[serde(default)]
    pub posts: PostsBlock,
    #[serde(default)]
    pub items: Vec<WireItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostsBlock {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub items: Vec<Post>,
}

/// Comments of one post together with their authors
#[derive(Debug, Deserialize)]
pub struct WireItem {
    #[serde(rename = "group_id", alias = "groupID", alias = "GroupID", alias = "groupId")]
    pub group_id: Option<WireId>,
    #[serde(rename = "post_id", alias = "postID", alias = "PostID", alias = "postId")]
    pub post_id: WireId,
    #[serde(default, alias = "Comments")]
    pub comments: CommentsBlock,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentsBlock {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub items: Vec<Comment>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl CommentsResponse {
    /// Converts the payload into a page for `source`
    ///
    /// Comments get their parent ids and a web link to the post; profile
    /// resolution is left to the crawler.
    pub fn into_page(self, source: &Source, web_base_url: &str) -> Page {
        let items = self
            .items
            .into_iter()
            .map(|item| {
                let post_id = item.post_id.into_string();
                let source_id = item
                    .group_id
                    .map(WireId::into_string)
                    .unwrap_or_else(|| source.id.clone());
                let url = post_url(web_base_url, &source_id, &post_id);

                let comments = item
                    .comments
                    .items
                    .into_iter()
                    .map(|mut comment| {
                        comment.post_id = post_id.clone();
                        comment.source_id = source_id.clone();
                        comment.post_url = url.clone();
                        comment
                    })
                    .collect();

                Item {
                    post_id,
                    source_id,
                    comments,
                    profiles: item.comments.profiles,
                }
            })
            .collect();

        Page {
            posts: self.posts.items,
            items,
            total_count: self.posts.count,
        }
    }
}

/// Builds the web link of a post, e.g. `https://vk.com/public42?w=wall-42_7`
pub fn post_url(web_base_url: &str, source_id: &str, post_id: &str) -> String {
    format!(
        "{}/public{}?w=wall{}_{}",
        web_base_url.trim_end_matches('/'),
        source_id.trim_start_matches('-'),
        source_id,
        post_id
    )
}

/// One entry of the group lookup response
#[derive(Debug, Clone, Deserialize)]
pub struct GroupInfo {
    pub id: i64,
    #[serde(default)]
    pub screen_name: String,
    #[serde(default)]
    pub name: String,
}

/// Pairs looked-up groups with the names that were asked for
///
/// The lookup answers in request order, but it silently skips names it does
/// not know, so pairing by index is only a fallback; an exact (case
/// insensitive) screen name match wins.
pub fn match_groups(requested: &[String], groups: Vec<GroupInfo>) -> Vec<Source> {
    groups
        .into_iter()
        .enumerate()
        .map(|(index, group)| {
            let name = requested
                .iter()
                .find(|name| name.eq_ignore_ascii_case(&group.screen_name))
                .or_else(|| {
                    if group.screen_name.is_empty() {
                        requested.get(index)
                    } else {
                        None
                    }
                })
                .cloned()
                .unwrap_or(group.screen_name);
            Source::new(format!("-{}", group.id), name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_JSON: &str = r#"{
        "response": {
            "posts": {
                "count": 5,
                "items": [
                    {"id": 1, "owner_id": -42, "from_id": -42, "date": 1600000000,
                     "post_type": "post", "text": "hello",
                     "likes": {"count": 3}, "comments": {"count": 5},
                     "reposts": {"count": 0}, "views": {"count": 100}}
                ]
            },
            "items": [
                {"groupID": "-42", "postID": 1,
                 "comments": {
                    "count": 1,
                    "items": [{"id": 10, "from_id": 7, "date": 1600000100, "text": "hi",
                               "likes": {"count": 0}, "reply_to_user": 8}],
                    "profiles": [{"id": 7, "first_name": "Ivan", "last_name": "Petrov",
                                  "sex": 2, "bdate": "1.1.1990",
                                  "city": {"id": 1, "title": "Moscow"}}]
                 }}
            ]
        }
    }"#;

    #[test]
    fn test_decode_comments_page() {
        let envelope: Envelope<CommentsResponse> = serde_json::from_str(PAGE_JSON).unwrap();
        let source = Source::new("-42", "testgroup");
        let page = envelope
            .into_result()
            .unwrap()
            .into_page(&source, "https://vk.com");

        assert_eq!(page.total_count, 5);
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].comment_count(), 5);
        assert_eq!(page.posts[0].views.count, 100);

        let item = &page.items[0];
        assert_eq!(item.post_id, "1");
        assert_eq!(item.source_id, "-42");
        assert_eq!(item.comments[0].reply_to_user, Some(8));
        assert_eq!(item.comments[0].post_url, "https://vk.com/public42?w=wall-42_1");
        assert_eq!(item.profiles[0].city.as_ref().unwrap().title, "Moscow");
        assert_eq!(item.profiles[0].byear, 0);
    }

    #[test]
    fn test_item_without_group_id_uses_source() {
        let json = r#"{"response": {"posts": {"count": 0, "items": []},
                       "items": [{"post_id": "9", "comments": {"items": [], "profiles": []}}]}}"#;
        let envelope: Envelope<CommentsResponse> = serde_json::from_str(json).unwrap();
        let page = envelope
            .into_result()
            .unwrap()
            .into_page(&Source::new("-5", "five"), "https://vk.com/");

        assert_eq!(page.items[0].source_id, "-5");
        assert_eq!(page.items[0].post_id, "9");
    }

    #[test]
    fn test_classify_api_errors() {
        let limited = ApiError {
            error_code: 29,
            error_msg: "Rate limit reached".to_string(),
        };
        assert!(matches!(
            limited.classify(),
            FetchError::RateLimited { code: 29, .. }
        ));

        let flood = ApiError {
            error_code: 6,
            error_msg: "Too many requests per second".to_string(),
        };
        assert!(matches!(flood.classify(), FetchError::Transient(_)));

        let denied = ApiError {
            error_code: 15,
            error_msg: "Access denied".to_string(),
        };
        assert_eq!(
            denied.classify(),
            FetchError::Fatal {
                code: 15,
                message: "Access denied".to_string()
            }
        );
    }

    #[test]
    fn test_execute_rate_limit_fails_call() {
        let json = r#"{"response": {"posts": {"count": 1, "items": []}, "items": []},
                       "execute_errors": [{"method": "wall.get", "error_code": 29,
                                           "error_msg": "Rate limit reached"}]}"#;
        let envelope: Envelope<CommentsResponse> = serde_json::from_str(json).unwrap();
        assert!(matches!(
            envelope.into_result(),
            Err(FetchError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_other_execute_errors_keep_payload() {
        let json = r#"{"response": {"posts": {"count": 1, "items": []}, "items": []},
                       "execute_errors": [{"method": "wall.getComments", "error_code": 100,
                                           "error_msg": "post was deleted"}]}"#;
        let envelope: Envelope<CommentsResponse> = serde_json::from_str(json).unwrap();
        assert!(envelope.into_result().is_ok());
    }

    #[test]
    fn test_missing_payload_is_transient() {
        let envelope: Envelope<CommentsResponse> = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            envelope.into_result(),
            Err(FetchError::Transient(_))
        ));
    }

    #[test]
    fn test_match_groups() {
        let requested = vec!["Habr".to_string(), "apiclub".to_string()];
        let groups = vec![
            GroupInfo {
                id: 1,
                screen_name: "apiclub".to_string(),
                name: "API Club".to_string(),
            },
            GroupInfo {
                id: 2,
                screen_name: "habr".to_string(),
                name: "Habr".to_string(),
            },
        ];

        let sources = match_groups(&requested, groups);
        assert_eq!(sources[0], Source::new("-1", "apiclub"));
        assert_eq!(sources[1], Source::new("-2", "Habr"));
    }
}
