//! Key layout of the record store
//!
//! ```text
//! comments/{source}/{post}/post.json
//! comments/{source}/{post}/{comment}.json
//! comments/{source}/offset.txt
//! comments/{source}/count.txt
//! profiles/{profile}.json
//! PostsCounter.txt, ProfilesCounter.txt, CommentsCounter.txt
//! ```

pub const COMMENTS_DIR: &str = "comments";
pub const PROFILES_DIR: &str = "profiles";

pub const POST_FILE: &str = "post.json";
pub const OFFSET_FILE: &str = "offset.txt";
pub const COUNT_FILE: &str = "count.txt";

pub const POSTS_COUNTER: &str = "PostsCounter.txt";
pub const PROFILES_COUNTER: &str = "ProfilesCounter.txt";
pub const COMMENTS_COUNTER: &str = "CommentsCounter.txt";

pub fn source_dir(source_id: &str) -> String {
    format!("{}/{}", COMMENTS_DIR, source_id)
}

pub fn post_dir(source_id: &str, post_id: &str) -> String {
    format!("{}/{}/{}", COMMENTS_DIR, source_id, post_id)
}

pub fn post_key(source_id: &str, post_id: &str) -> String {
    format!("{}/{}", post_dir(source_id, post_id), POST_FILE)
}

pub fn comment_key(source_id: &str, post_id: &str, comment_id: i64) -> String {
    format!("{}/{}.json", post_dir(source_id, post_id), comment_id)
}

pub fn profile_key(profile_id: i64) -> String {
    format!("{}/{}.json", PROFILES_DIR, profile_id)
}

pub fn offset_key(source_id: &str) -> String {
    format!("{}/{}", source_dir(source_id), OFFSET_FILE)
}

pub fn count_key(source_id: &str) -> String {
    format!("{}/{}", source_dir(source_id), COUNT_FILE)
}
