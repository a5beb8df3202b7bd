//! Best-effort profile lookups for direct-message conversations.

use std::collections::{BTreeSet, HashMap};

use futures::stream::{self, StreamExt};

use super::client::ChatClient;
use crate::types::{Conversation, UserSummary};

/// Concurrent `users.info` calls in flight at once
const MAX_CONCURRENT_LOOKUPS: usize = 8;

/// Attach the peer's profile to every direct message in `conversations`.
///
/// Each distinct peer is looked up once. Lookups run concurrently and a
/// failed lookup leaves its conversations untouched.
pub async fn enrich_dm_users(client: &ChatClient, conversations: &mut [Conversation]) {
    let peers: BTreeSet<String> = conversations
        .iter()
        .filter(|c| c.is_im)
        .filter_map(|c| c.user.clone())
        .collect();
    if peers.is_empty() {
        return;
    }

    let profiles: HashMap<String, UserSummary> = stream::iter(peers)
        .map(|user_id| async move {
            match client.user_info(&user_id).await {
                Ok(user) => Some((user_id, user.summary())),
                Err(e) => {
                    tracing::debug!(user = %user_id, error = %e, "skipping profile lookup");
                    None
                }
            }
        })
        .buffer_unordered(MAX_CONCURRENT_LOOKUPS)
        .filter_map(|found| async move { found })
        .collect()
        .await;

    for conversation in conversations.iter_mut().filter(|c| c.is_im) {
        if let Some(profile) = conversation.user.as_ref().and_then(|u| profiles.get(u)) {
            conversation.dm_user = Some(profile.clone());
        }
    }
}
