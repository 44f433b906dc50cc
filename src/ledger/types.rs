use serde::Serialize;
use std::fmt;

/// Durable resume position of one source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    /// Number of posts already persisted from the start of the feed
    pub offset: u64,

    /// Post population reported by the last fetched page
    pub total: u64,
}

impl Checkpoint {
    pub fn new(offset: u64, total: u64) -> Self {
        Self { offset, total }
    }

    /// Progress as a percentage, 0 when the total is unknown
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.offset as f64 / self.total as f64
        }
    }

    /// True once the offset has caught up with the reported total
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.offset >= self.total
    }
}

/// The kinds of record that are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Post,
    Profile,
    Comment,
}

/// Point-in-time copy of the three global counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub posts: u64,
    pub profiles: u64,
    pub comments: u64,
}

impl Counters {
    pub fn get(&self, kind: RecordKind) -> u64 {
        match kind {
            RecordKind::Post => self.posts,
            RecordKind::Profile => self.profiles,
            RecordKind::Comment => self.comments,
        }
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "posts: {}, profiles: {}, comments: {}",
            self.posts, self.profiles, self.comments
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_percent() {
        assert_eq!(Checkpoint::new(0, 0).percent(), 0.0);
        assert_eq!(Checkpoint::new(5, 20).percent(), 25.0);
    }

    #[test]
    fn test_checkpoint_is_complete() {
        assert!(!Checkpoint::new(0, 0).is_complete());
        assert!(!Checkpoint::new(4, 5).is_complete());
        assert!(Checkpoint::new(5, 5).is_complete());
    }

    #[test]
    fn test_counters_display() {
        let counters = Counters {
            posts: 1,
            profiles: 2,
            comments: 3,
        };
        assert_eq!(counters.to_string(), "posts: 1, profiles: 2, comments: 3");
        assert_eq!(counters.get(RecordKind::Profile), 2);
    }
}
