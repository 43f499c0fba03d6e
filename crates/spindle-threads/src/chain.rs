//! Reply-chain publishing.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{Credential, PublishOutcome, ThreadsApi};

/// Pause between consecutive posts of one chain (platform rate-limit courtesy).
pub const DEFAULT_POST_DELAY: Duration = Duration::from_millis(1500);

/// Publishes an ordered list of posts as a single thread, each post replying
/// to the previous successfully published one.
pub struct ChainPublisher {
    api: Arc<dyn ThreadsApi>,
    post_delay: Duration,
}

impl ChainPublisher {
    /// Create a publisher using the default inter-post delay.
    pub fn new(api: Arc<dyn ThreadsApi>) -> Self {
        Self {
            api,
            post_delay: DEFAULT_POST_DELAY,
        }
    }

    /// Override the inter-post delay for every chain this publisher sends.
    pub fn with_post_delay(mut self, post_delay: Duration) -> Self {
        self.post_delay = post_delay;
        self
    }

    /// The API this publisher talks to.
    pub fn api(&self) -> &Arc<dyn ThreadsApi> {
        &self.api
    }

    /// Publish `posts` in order.
    ///
    /// A failed post does not abort the chain: later posts reply to the last
    /// post that did publish (or stand alone if none has yet). The returned
    /// `published_ids` has one slot per input post.
    #[tracing::instrument(skip(self, credential, posts), fields(user_id = %credential.user_id, count = posts.len()))]
    pub async fn publish(&self, credential: &Credential, posts: &[String]) -> PublishOutcome {
        let mut outcome = PublishOutcome {
            published_ids: Vec::with_capacity(posts.len()),
            errors: Vec::new(),
        };
        let mut reply_to: Option<String> = None;

        for (index, text) in posts.iter().enumerate() {
            let position = index + 1;

            let container_id = match self
                .api
                .create_container(credential, text, reply_to.as_deref())
                .await
            {
                Ok(id) => id,
                Err(e) => {
                    warn!(position, error = %e, "failed to create container");
                    outcome.errors.push(format!("Post {}: {}", position, e));
                    outcome.published_ids.push(None);
                    continue;
                }
            };

            let media_id = match self.api.publish_container(credential, &container_id).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(position, container_id = %container_id, error = %e, "failed to publish container");
                    outcome.errors.push(format!("Post {}: {}", position, e));
                    outcome.published_ids.push(None);
                    continue;
                }
            };

            debug!(position, media_id = %media_id, "published post");
            outcome.published_ids.push(Some(media_id.clone()));
            reply_to = Some(media_id);

            if position < posts.len() && !self.post_delay.is_zero() {
                tokio::time::sleep(self.post_delay).await;
            }
        }

        info!(
            published = outcome.published_count(),
            failed = outcome.failed_count(),
            "chain publish finished"
        );
        outcome
    }
}
