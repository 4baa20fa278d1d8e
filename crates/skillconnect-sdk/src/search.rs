//! Search-as-you-type over the user directory
//!
//! Keystrokes are pushed into a [`Debouncer`]; a query runs only once input
//! settles. Queries may still overlap on the wire, so each one takes a
//! [`LatestOnly`] ticket and only the newest ticket's response is published.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::gateway::RemoteGateway;
use crate::model::User;
use crate::notice::{Action, Notifier};
use crate::task::{with_timeout, Debouncer, LatestOnly};

/// Quiet period before a typed query is sent
pub const DEFAULT_QUIET: Duration = Duration::from_millis(300);

/// Users matching the most recent settled query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub query: String,
    pub users: Vec<User>,
}

pub struct UserSearch {
    input: Debouncer<String>,
    results: watch::Receiver<SearchResults>,
    worker: JoinHandle<()>,
}

impl UserSearch {
    pub fn spawn(
        gateway: Arc<dyn RemoteGateway>,
        notifier: Notifier,
        quiet: Duration,
        timeout: Duration,
    ) -> Self {
        let (input, mut queries) = Debouncer::<String>::spawn(quiet);
        let (tx, results) = watch::channel(SearchResults::default());
        let tx = Arc::new(tx);
        let sequence = Arc::new(LatestOnly::new());

        let worker = tokio::spawn(async move {
            while let Some(raw) = queries.recv().await {
                let ticket = sequence.issue();
                let query = raw.trim().to_string();

                // Clearing the box clears the list without a call
                if query.is_empty() {
                    tx.send_replace(SearchResults::default());
                    continue;
                }

                let gateway = gateway.clone();
                let notifier = notifier.clone();
                let sequence = sequence.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    match with_timeout(timeout, gateway.search_users(&query)).await {
                        Ok(users) => match sequence.accept(ticket, users) {
                            Some(users) => {
                                debug!(%query, found = users.len(), "User search finished");
                                tx.send_replace(SearchResults { query, users });
                            }
                            None => debug!(%query, "Discarding results of superseded search"),
                        },
                        Err(e) if sequence.is_latest(ticket) => {
                            warn!(%query, error = %e, "User search failed");
                            notifier.warn(
                                Action::Refresh { what: "user search".into() },
                                format!("Search for '{}' failed: {}", query, e),
                            );
                        }
                        Err(_) => {}
                    }
                });
            }
        });

        Self {
            input,
            results,
            worker,
        }
    }

    /// Record the current contents of the search box
    pub fn push(&self, query: impl Into<String>) {
        if !self.input.push(query.into()) {
            warn!("User search input closed");
        }
    }

    pub fn results(&self) -> SearchResults {
        self.results.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchResults> {
        self.results.clone()
    }
}

impl Drop for UserSearch {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;

    fn user(id: i64, username: &str) -> User {
        User {
            user_id: id,
            username: Some(username.into()),
            ..Default::default()
        }
    }

    fn gateway() -> Arc<MockGateway> {
        Arc::new(
            MockGateway::new()
                .with_user(user(1, "ada"))
                .with_user(user(2, "adam"))
                .with_user(user(3, "grace")),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_burst_sends_one_query() {
        let gateway = gateway();
        let search = UserSearch::spawn(
            gateway.clone(),
            Notifier::new(),
            DEFAULT_QUIET,
            Duration::from_secs(5),
        );
        let mut rx = search.subscribe();

        search.push("a");
        search.push("ad");
        search.push("ada");
        rx.changed().await.unwrap();

        let results = search.results();
        assert_eq!(results.query, "ada");
        assert_eq!(results.users.len(), 2);
        assert_eq!(gateway.calls_to("search_users"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_for_old_query_is_dropped() {
        let gateway = gateway();
        let search = UserSearch::spawn(
            gateway.clone(),
            Notifier::new(),
            DEFAULT_QUIET,
            Duration::from_secs(5),
        );
        let mut rx = search.subscribe();

        let hold = gateway.hold_next("search_users");
        search.push("ada");
        gateway.wait_for_calls("search_users", 1).await;

        search.push("grace");
        rx.changed().await.unwrap();
        assert_eq!(search.results().query, "grace");

        hold.release();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let results = search.results();
        assert_eq!(results.query, "grace");
        assert_eq!(results.users, vec![user(3, "grace")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_query_clears_without_call() {
        let gateway = gateway();
        let search = UserSearch::spawn(
            gateway.clone(),
            Notifier::new(),
            DEFAULT_QUIET,
            Duration::from_secs(5),
        );
        let mut rx = search.subscribe();

        search.push("grace");
        rx.changed().await.unwrap();
        assert_eq!(search.results().users.len(), 1);

        search.push("   ");
        rx.changed().await.unwrap();
        assert_eq!(search.results(), SearchResults::default());
        assert_eq!(gateway.calls_to("search_users"), 1);
    }
}
