//! Record types shared by the fetcher, the crawler and the stores
//!
//! # Components
//!
//! - `Source`: one crawlable group
//! - `Page`: one fetched batch of posts, comments and profiles
//! - `Post`, `Comment`, `Profile`: the records that get persisted
//! - `resolve`: same-page profile resolution and record filtering

mod resolve;

pub use resolve::{birth_year, process_page, resolve_profiles, ProcessedPage};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A crawlable group, identified by its canonical id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    /// Canonical id as used by the remote API (e.g. `-12345`)
    pub id: String,

    /// Human-readable screen name from the sources file
    pub name: String,
}

impl Source {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// One fetched page of a source's feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Posts in feed order
    pub posts: Vec<Post>,

    /// Comment bundles, one per post that has comments
    pub items: Vec<Item>,

    /// Size of the source's post population as of this fetch
    pub total_count: u64,
}

/// Comments and author profiles for a single post
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub post_id: String,
    pub source_id: String,
    pub comments: Vec<Comment>,
    pub profiles: Vec<Profile>,
}

/// `{ "count": n }` objects the API uses for engagement counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count {
    #[serde(default)]
    pub count: u64,
}

impl Count {
    pub fn new(count: u64) -> Self {
        Self { count }
    }
}

/// A wall post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    #[serde(default)]
    pub from_id: i64,
    #[serde(default)]
    pub owner_id: i64,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub post_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub likes: Count,
    #[serde(default)]
    pub comments: Count,
    #[serde(default)]
    pub reposts: Count,
    #[serde(default)]
    pub views: Count,
}

impl Post {
    /// Number of comments the remote reports for this post
    pub fn comment_count(&self) -> u64 {
        self.comments.count
    }
}

/// A comment under a wall post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    #[serde(default)]
    pub from_id: i64,
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub post_url: String,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub likes: Count,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_user: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_comment: Option<i64>,

    /// Author profile, resolved from the page the comment arrived in
    #[serde(default)]
    pub profile: Option<Profile>,
}

/// A comment author
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub sex: i64,
    #[serde(default)]
    pub bdate: String,

    /// Year part of `bdate`, zero when unknown
    #[serde(default)]
    pub byear: i32,
    #[serde(default)]
    pub city: Option<Place>,
    #[serde(default)]
    pub country: Option<Place>,
}

/// City or country reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub id: i64,
    #[serde(default)]
    pub title: String,
}
