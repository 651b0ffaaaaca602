//! Poll commands

use schej_core::NewPoll;
use schej_domain::{Poll, Result, UserPolls};

use crate::utils::command_helpers::execute_command;
use crate::AppContext;

/// Create a poll owned by `owner_id`
pub async fn create_poll(ctx: &AppContext, owner_id: &str, input: NewPoll) -> Result<Poll> {
    execute_command("polls::create_poll", || async {
        ctx.poll_service.create_poll(owner_id, input).await
    })
    .await
}

/// Get a poll with its responses
pub async fn get_poll(ctx: &AppContext, poll_id: &str) -> Result<Poll> {
    execute_command("polls::get_poll", || async { ctx.poll_service.get_poll(poll_id).await })
        .await
}

/// Polls the user owns and polls they responded to, without responses
pub async fn list_user_polls(ctx: &AppContext, user_id: &str) -> Result<UserPolls> {
    execute_command("polls::list_user_polls", || async {
        ctx.poll_service.list_user_polls(user_id).await
    })
    .await
}
