//! Same-page profile resolution and record filtering

use crate::model::{Comment, Page, Post, Profile, Source};
use std::collections::{HashMap, HashSet};

/// Records from one page that qualify for persistence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedPage {
    /// Posts with at least one comment
    pub posts: Vec<Post>,

    /// Comments with text, profiles attached
    pub comments: Vec<Comment>,

    /// Every profile in the page, once per id
    pub profiles: Vec<Profile>,
}

impl ProcessedPage {
    pub fn record_count(&self) -> usize {
        self.posts.len() + self.comments.len() + self.profiles.len()
    }
}

/// Extracts the year from a `day.month.year` birth date
///
/// Dates without a year (`"12.3"`), empty strings and garbage all yield 0.
pub fn birth_year(bdate: &str) -> i32 {
    let parts: Vec<&str> = bdate.split('.').collect();
    if parts.len() > 2 {
        parts[2].trim().parse().unwrap_or(0)
    } else {
        0
    }
}

/// Attaches profiles to the comments of the same page
///
/// The lookup is built only from this page's profiles. A comment whose author
/// is not among them ends up with `profile: None`, even if that author was
/// seen on an earlier page.
pub fn resolve_profiles(page: &mut Page) {
    let mut lookup: HashMap<i64, Profile> = HashMap::new();
    for item in page.items.iter_mut() {
        for profile in item.profiles.iter_mut() {
            profile.byear = birth_year(&profile.bdate);
            lookup.insert(profile.id, profile.clone());
        }
    }

    for item in page.items.iter_mut() {
        for comment in item.comments.iter_mut() {
            comment.profile = lookup.get(&comment.from_id).cloned();
        }
    }
}

/// Resolves profiles and drops records that must not be persisted
///
/// Posts without comments and comments with empty text (deleted or redacted)
/// are filtered out. Comments are stamped with the crawling source and their
/// parent post so the stored record is self-describing.
pub fn process_page(mut page: Page, source: &Source) -> ProcessedPage {
    resolve_profiles(&mut page);

    let posts = page
        .posts
        .into_iter()
        .filter(|post| post.comment_count() > 0)
        .collect();

    let mut comments = Vec::new();
    let mut profiles = Vec::new();
    let mut seen_profiles = HashSet::new();

    for item in page.items {
        for mut comment in item.comments {
            if comment.text.is_empty() {
                continue;
            }
            comment.post_id = item.post_id.clone();
            comment.source_id = source.id.clone();
            comment.source_name = source.name.clone();
            comments.push(comment);
        }
        for profile in item.profiles {
            if seen_profiles.insert(profile.id) {
                profiles.push(profile);
            }
        }
    }

    ProcessedPage {
        posts,
        comments,
        profiles,
    }
}
