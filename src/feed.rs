//! Feed synchronization.
//!
//! Subscribes to the post store's broad change stream and, on any event,
//! refetches the full ordered list instead of merging event payloads —
//! bandwidth traded for correctness simplicity. Bursts are debounced into
//! a single in-flight fetch: the first event starts a short settle window,
//! everything queued inside it is drained, and one refetch runs. Events
//! that arrive while that fetch is in flight stay queued and trigger
//! exactly one follow-up round.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::PostStore;
use crate::error::Result;
use crate::post::{sort_feed, Post};

/// Default settle window for collapsing event bursts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Keeps an ordered in-memory copy of the post feed in sync with the store.
pub struct FeedSynchronizer {
    store: Arc<dyn PostStore>,
    feed: watch::Sender<Vec<Post>>,
    refreshes: AtomicU64,
}

impl FeedSynchronizer {
    pub fn new(store: Arc<dyn PostStore>) -> Arc<Self> {
        let (feed, _) = watch::channel(Vec::new());
        Arc::new(Self {
            store,
            feed,
            refreshes: AtomicU64::new(0),
        })
    }

    /// Subscribes to feed updates.
    pub fn feed(&self) -> watch::Receiver<Vec<Post>> {
        self.feed.subscribe()
    }

    /// Snapshot of the current feed.
    pub fn current(&self) -> Vec<Post> {
        self.feed.borrow().clone()
    }

    /// Number of completed refetches, mostly useful for observing burst
    /// collapsing.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Refetches the whole list and publishes it.
    ///
    /// On failure the previous list is kept; the next change event (or
    /// manual call) retries.
    pub async fn refresh(&self) -> Result<()> {
        let mut posts = self.store.list_posts().await?;
        sort_feed(&mut posts);
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        self.feed.send_replace(posts);
        Ok(())
    }

    /// Optimistically inserts a post the local client just created.
    ///
    /// Deduplicates by id so a direct insertion followed by the next
    /// refetch (which replaces the list wholesale) cannot double-insert.
    pub fn insert_local(&self, post: Post) {
        self.feed.send_modify(|posts| {
            if posts.iter().any(|p| p.id == post.id) {
                return;
            }
            posts.push(post);
            sort_feed(posts);
        });
    }

    /// Spawns the background loop driving refetches from change events.
    pub fn spawn(self: &Arc<Self>, debounce: Duration) -> JoinHandle<()> {
        let sync = Arc::clone(self);
        let mut changes = self.store.subscribe();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => debug!("Post change event: {change:?}"),
                    Err(RecvError::Lagged(skipped)) => {
                        // Missed events still mean "something changed".
                        warn!("Change stream lagged by {skipped} events");
                    }
                    Err(RecvError::Closed) => break,
                }

                // Settle window: collapse whatever else the burst brings.
                tokio::time::sleep(debounce).await;
                loop {
                    match changes.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }

                if let Err(e) = sync.refresh().await {
                    warn!("Feed refresh failed: {e}");
                }
            }
            debug!("Change stream closed; feed synchronizer stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, PostStore};
    use crate::post::{NewPost, PostDraft};

    async fn create_post(backend: &MemoryBackend, content: &str) -> Post {
        backend
            .create_post(NewPost {
                user_id: "author".to_string(),
                body: PostDraft::wisdom(content).validate().unwrap(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_manual_refresh_publishes_ordered_feed() {
        let backend = Arc::new(MemoryBackend::new());
        let sync = FeedSynchronizer::new(backend.clone());

        create_post(&backend, "first").await;
        create_post(&backend, "second").await;

        sync.refresh().await.unwrap();
        assert_eq!(sync.current().len(), 2);
        assert_eq!(sync.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_burst_collapses_to_single_refresh() {
        let backend = Arc::new(MemoryBackend::new());
        let sync = FeedSynchronizer::new(backend.clone());
        let handle = sync.spawn(Duration::from_millis(100));

        // Three events land well inside one settle window.
        create_post(&backend, "a").await;
        create_post(&backend, "b").await;
        create_post(&backend, "c").await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sync.current().len(), 3);
        assert_eq!(sync.refresh_count(), 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_local_insert_deduplicates_against_refetch() {
        let backend = Arc::new(MemoryBackend::new());
        let sync = FeedSynchronizer::new(backend.clone());

        let post = create_post(&backend, "optimistic").await;
        sync.insert_local(post.clone());
        assert_eq!(sync.current().len(), 1);

        // The refetch replaces the list; inserting the same post again
        // afterwards must not duplicate it either.
        sync.refresh().await.unwrap();
        sync.insert_local(post);
        assert_eq!(sync.current().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_list() {
        let backend = Arc::new(MemoryBackend::new());
        let sync = FeedSynchronizer::new(backend.clone());
        create_post(&backend, "kept").await;
        sync.refresh().await.unwrap();

        let disabled = FeedSynchronizer::new(Arc::new(crate::backend::DisabledBackend::new()));
        disabled.insert_local(sync.current().remove(0));
        assert!(disabled.refresh().await.is_err());
        assert_eq!(disabled.current().len(), 1);
    }
}
