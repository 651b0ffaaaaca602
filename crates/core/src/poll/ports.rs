//! Port interfaces for poll persistence

use async_trait::async_trait;
use schej_domain::{Poll, Response, Result, ScheduledEvent};

/// Trait for poll persistence.
///
/// Response writes touch only the participant's entry so concurrent
/// submissions for different participants never overwrite each other.
#[async_trait]
pub trait PollRepository: Send + Sync {
    /// Get poll by ID, including responses
    async fn get_by_id(&self, id: &str) -> Result<Option<Poll>>;

    /// Insert a new poll
    async fn create(&self, poll: &Poll) -> Result<()>;

    /// Insert or replace one participant's response
    async fn upsert_response(&self, poll_id: &str, response: &Response) -> Result<()>;

    /// Flag the remindee with `email` as responded. Returns whether one matched.
    async fn mark_remindee_responded(&self, poll_id: &str, email: &str) -> Result<bool>;

    /// Store the scheduled event only if the poll has none yet.
    ///
    /// Returns `false` when another caller finalized the poll first.
    async fn record_scheduled_event(&self, poll_id: &str, event: &ScheduledEvent) -> Result<bool>;

    /// Overwrite the scheduled event of an already finalized poll
    async fn update_scheduled_event(&self, poll_id: &str, event: &ScheduledEvent) -> Result<()>;

    /// Polls the user owns or has a response in
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Poll>>;
}
