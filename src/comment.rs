//! The comment model consumed from the storage collaborator, plus the
//! narrow contracts this core talks through (§ external interfaces).
//!
//! Comments are owned by the store; the core only reads them (ranking,
//! highlight refresh) and mirrors vote/reaction toggles locally so UI state
//! can update before the store round-trip completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::anchor::Anchor;

pub type CommentId = String;
pub type UserId = String;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub anchor: Anchor,
    pub author_id: UserId,
    pub author_name: String,
    pub text: String,
    /// Creation time, ms since epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub upvotes: BTreeSet<UserId>,
    #[serde(default)]
    pub downvotes: BTreeSet<UserId>,
    /// emoji -> users who reacted with it.
    #[serde(default)]
    pub reactions: BTreeMap<String, BTreeSet<UserId>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl Comment {
    pub fn upvote_count(&self) -> usize {
        self.upvotes.len()
    }

    pub fn downvote_count(&self) -> usize {
        self.downvotes.len()
    }

    pub fn reaction_count(&self, emoji: &str) -> usize {
        self.reactions.get(emoji).map(|u| u.len()).unwrap_or(0)
    }

    /// Toggle a vote: voting again removes it, voting the other way moves it.
    pub fn toggle_vote(&mut self, direction: VoteDirection, user: &str) {
        let (own, other) = match direction {
            VoteDirection::Up => (&mut self.upvotes, &mut self.downvotes),
            VoteDirection::Down => (&mut self.downvotes, &mut self.upvotes),
        };
        if !own.remove(user) {
            own.insert(user.to_string());
            other.remove(user);
        }
    }

    /// Toggle a reaction for a user; empty reaction sets are dropped.
    pub fn toggle_reaction(&mut self, emoji: &str, user: &str) {
        let users = self.reactions.entry(emoji.to_string()).or_default();
        if !users.remove(user) {
            users.insert(user.to_string());
        }
        if self.reactions.get(emoji).is_some_and(|u| u.is_empty()) {
            self.reactions.remove(emoji);
        }
    }
}

/// Display order: most-upvoted first, ties broken newest-first.
pub fn sort_comments(comments: &mut [Comment]) {
    comments.sort_by(|a, b| {
        b.upvote_count()
            .cmp(&a.upvote_count())
            .then(b.timestamp.cmp(&a.timestamp))
    });
}

/// Human-readable relative age of a timestamp ("just now", "5m ago", ...).
pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff_ms = now_ms.saturating_sub(timestamp_ms);
    let minutes = diff_ms / 60_000;
    let hours = diff_ms / 3_600_000;
    let days = diff_ms / 86_400_000;

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 30 {
        format!("{}d ago", days)
    } else {
        match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
            Some(date) => date.format("%-m/%-d/%Y").to_string(),
            None => String::new(),
        }
    }
}

// =============================================================================
// Collaborator contracts
// =============================================================================

/// Persistent comment storage keyed by page URL. Transport is out of scope;
/// only payload shapes matter.
pub trait CommentStore {
    fn fetch_comments(&self, page_url: &str) -> Vec<Comment>;
    fn create_comment(&mut self, anchor: Anchor, text: &str, author: &UserProfile) -> CommentId;
    fn toggle_vote(&mut self, comment_id: &str, direction: VoteDirection, user_id: &str) -> bool;
    fn toggle_reaction(&mut self, comment_id: &str, emoji: &str, user_id: &str) -> bool;
    fn delete_comment(&mut self, comment_id: &str) -> bool;
}

/// User preferences relevant to the core.
pub trait PreferenceStore {
    fn show_highlights(&self) -> bool {
        true
    }
    fn enable_notifications(&self) -> bool {
        true
    }
}

/// Identity provider: who is signed in, if anyone.
pub trait IdentityProvider {
    fn current_user(&self) -> Option<UserProfile>;
}

// =============================================================================
// In-memory store (tests & native embedding)
// =============================================================================

/// Change events surfaced to live-update consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum CommentEvent {
    Added { comment: Comment },
    Modified { comment: Comment },
    Deleted { comment_id: CommentId },
}

/// Simple in-memory `CommentStore` with a drainable event log standing in
/// for the live-update stream.
#[derive(Debug, Default)]
pub struct MemoryCommentStore {
    comments: Vec<Comment>,
    events: Vec<CommentEvent>,
    next_id: u64,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events accumulated since the last drain.
    pub fn drain_events(&mut self) -> Vec<CommentEvent> {
        std::mem::take(&mut self.events)
    }

    fn find_mut(&mut self, comment_id: &str) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == comment_id)
    }
}

impl CommentStore for MemoryCommentStore {
    fn fetch_comments(&self, page_url: &str) -> Vec<Comment> {
        let mut out: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.anchor.page_url == page_url)
            .cloned()
            .collect();
        sort_comments(&mut out);
        out
    }

    fn create_comment(&mut self, anchor: Anchor, text: &str, author: &UserProfile) -> CommentId {
        self.next_id += 1;
        let id = format!("c{}-{}", self.next_id, anchor.anchor_id());
        let comment = Comment {
            id: id.clone(),
            anchor,
            author_id: author.id.clone(),
            author_name: author.display_name.clone(),
            text: text.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            upvotes: BTreeSet::new(),
            downvotes: BTreeSet::new(),
            reactions: BTreeMap::new(),
        };
        self.events.push(CommentEvent::Added {
            comment: comment.clone(),
        });
        self.comments.push(comment);
        id
    }

    fn toggle_vote(&mut self, comment_id: &str, direction: VoteDirection, user_id: &str) -> bool {
        let Some(comment) = self.find_mut(comment_id) else {
            return false;
        };
        comment.toggle_vote(direction, user_id);
        let comment = comment.clone();
        self.events.push(CommentEvent::Modified { comment });
        true
    }

    fn toggle_reaction(&mut self, comment_id: &str, emoji: &str, user_id: &str) -> bool {
        let Some(comment) = self.find_mut(comment_id) else {
            return false;
        };
        comment.toggle_reaction(emoji, user_id);
        let comment = comment.clone();
        self.events.push(CommentEvent::Modified { comment });
        true
    }

    fn delete_comment(&mut self, comment_id: &str) -> bool {
        let before = self.comments.len();
        self.comments.retain(|c| c.id != comment_id);
        let deleted = self.comments.len() < before;
        if deleted {
            self.events.push(CommentEvent::Deleted {
                comment_id: comment_id.to_string(),
            });
        }
        deleted
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(url: &str) -> Anchor {
        Anchor {
            page_url: url.to_string(),
            selector: "html > body > p".to_string(),
            selected_text: "abc".to_string(),
            start_offset: 0,
            end_offset: 3,
            context_before: String::new(),
            context_after: String::new(),
            captured_at: 0,
        }
    }

    fn comment(id: &str, upvoters: &[&str], timestamp: i64) -> Comment {
        Comment {
            id: id.to_string(),
            anchor: anchor("https://x.test"),
            author_id: "u1".into(),
            author_name: "Someone".into(),
            text: "hi".into(),
            timestamp,
            upvotes: upvoters.iter().map(|u| u.to_string()).collect(),
            downvotes: BTreeSet::new(),
            reactions: BTreeMap::new(),
        }
    }

    #[test]
    fn test_sort_upvotes_then_recency() {
        let mut comments = vec![
            comment("old-popular", &["a", "b"], 100),
            comment("new-quiet", &[], 300),
            comment("newer-popular", &["c", "d"], 200),
        ];
        sort_comments(&mut comments);
        let order: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["newer-popular", "old-popular", "new-quiet"]);
    }

    #[test]
    fn test_vote_toggle_and_switch() {
        let mut c = comment("c1", &[], 0);
        c.toggle_vote(VoteDirection::Up, "u9");
        assert_eq!(c.upvote_count(), 1);
        // Same direction again removes.
        c.toggle_vote(VoteDirection::Up, "u9");
        assert_eq!(c.upvote_count(), 0);
        // Switching moves the vote.
        c.toggle_vote(VoteDirection::Up, "u9");
        c.toggle_vote(VoteDirection::Down, "u9");
        assert_eq!(c.upvote_count(), 0);
        assert_eq!(c.downvote_count(), 1);
    }

    #[test]
    fn test_reaction_toggle_drops_empty_sets() {
        let mut c = comment("c1", &[], 0);
        c.toggle_reaction("🔥", "u1");
        c.toggle_reaction("🔥", "u2");
        assert_eq!(c.reaction_count("🔥"), 2);
        c.toggle_reaction("🔥", "u1");
        c.toggle_reaction("🔥", "u2");
        assert_eq!(c.reaction_count("🔥"), 0);
        assert!(c.reactions.is_empty());
    }

    #[test]
    fn test_relative_time() {
        let now = 1_700_000_000_000i64;
        assert_eq!(format_relative_time(now - 10_000, now), "just now");
        assert_eq!(format_relative_time(now - 5 * 60_000, now), "5m ago");
        assert_eq!(format_relative_time(now - 3 * 3_600_000, now), "3h ago");
        assert_eq!(format_relative_time(now - 2 * 86_400_000, now), "2d ago");
        // Over 30 days falls back to a date.
        let formatted = format_relative_time(now - 40 * 86_400_000, now);
        assert!(formatted.contains('/'), "{}", formatted);
    }

    #[test]
    fn test_store_stamps_creation_time() {
        let mut store = MemoryCommentStore::new();
        let author = UserProfile {
            id: "u1".into(),
            display_name: "Someone".into(),
            email: "s@x.test".into(),
            avatar_url: None,
        };
        let before = Utc::now().timestamp_millis();
        let id = store.create_comment(anchor("https://a.test"), "hi", &author);
        let fetched = store.fetch_comments("https://a.test");
        assert_eq!(fetched[0].id, id);
        assert!(fetched[0].timestamp >= before);
    }

    #[test]
    fn test_memory_store_filters_by_page_and_streams_events() {
        let mut store = MemoryCommentStore::new();
        let author = UserProfile {
            id: "u1".into(),
            display_name: "Someone".into(),
            email: "s@x.test".into(),
            avatar_url: None,
        };
        let id_a = store.create_comment(anchor("https://a.test"), "first", &author);
        let _id_b = store.create_comment(anchor("https://b.test"), "second", &author);

        let page_a = store.fetch_comments("https://a.test");
        assert_eq!(page_a.len(), 1);
        assert_eq!(page_a[0].id, id_a);

        assert!(store.toggle_vote(&id_a, VoteDirection::Up, "u2"));
        assert!(store.delete_comment(&id_a));
        assert!(!store.delete_comment(&id_a));

        let kinds: Vec<&str> = store
            .drain_events()
            .iter()
            .map(|e| match e {
                CommentEvent::Added { .. } => "added",
                CommentEvent::Modified { .. } => "modified",
                CommentEvent::Deleted { .. } => "deleted",
            })
            .collect();
        assert_eq!(kinds, vec!["added", "added", "modified", "deleted"]);
        assert!(store.drain_events().is_empty());
    }
}
