use crate::helper::BotHelper;
use crate::mattermost::Platform;
use crate::models::{EVENT_POSTED, WebSocketEvent};
use crate::responder::Responder;

/// Answers posts made in the debugging channel. Everything else is ignored.
pub async fn handle_event<P: Platform>(
    helper: &BotHelper<P>,
    responder: &Responder,
    event: &WebSocketEvent,
) {
    if event.event != EVENT_POSTED {
        return;
    }

    let Some(debugging_channel) = helper.debugging_channel() else {
        return;
    };
    if event.broadcast.channel_id != debugging_channel.id {
        return;
    }

    let Some(post) = event.post() else {
        tracing::warn!(seq = event.seq, "Posted event without a readable post");
        return;
    };

    // Never answer ourselves
    if helper.bot_user().is_some_and(|u| u.id == post.user_id) {
        return;
    }

    let reply = responder.respond(&post.message);
    tracing::debug!(post_id = %post.id, reply, "Replying to post");
    helper.send_msg_to_debugging_channel(reply, &post.id).await;
}
