//! Session Reconciler: refreshes budget and aggregate from the authority.
//!
//! One reconciler is shared by every reader of the event totals. Concurrent
//! callers queue on a fetch lock and share results instead of issuing a
//! request each. A plain [`SessionReconciler::read`] takes any fetch that
//! completes after the call. [`SessionReconciler::reconcile`] confirms a turn,
//! so it only reuses a fetch that started after the call: one already in
//! flight may carry totals from before the turn.

use std::sync::Arc;

use shared::EventAggregate;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::client::OutcomeClient;
use crate::error::{Result, RevealError};
use crate::store::SessionStore;

#[derive(Debug)]
pub struct SessionReconciler<C> {
    client: Arc<C>,
    store: SessionStore,
    fetch_lock: Mutex<()>,
}

impl<C: OutcomeClient> SessionReconciler<C> {
    pub fn new(client: Arc<C>, store: SessionStore) -> Self {
        Self {
            client,
            store,
            fetch_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Flags the cached totals as outdated, e.g. after a turn settles.
    pub fn invalidate(&self) {
        self.store.mark_stale();
    }

    /// Fetches budget and aggregate and makes them authoritative locally.
    /// On failure the cache stays stale, so the next read retries.
    pub async fn reconcile(&self) -> Result<EventAggregate> {
        self.fetch_after(self.store.generation()).await
    }

    /// Cached totals if fresh, otherwise a reconciliation.
    pub async fn read(&self) -> Result<EventAggregate> {
        match self.store.fresh() {
            Some(aggregate) => Ok(aggregate),
            None => self.fetch_after(self.store.applied_generation()).await,
        }
    }

    async fn fetch_after(&self, seen: u64) -> Result<EventAggregate> {
        let _fetching = self.fetch_lock.lock().await;
        if let Some(aggregate) = self.store.fresh_since(seen) {
            return Ok(aggregate);
        }

        let generation = self.store.start_fetch();
        let fetched = futures::try_join!(
            self.client.fetch_budget(),
            self.client.fetch_event_aggregate()
        );
        let (budget, aggregate) = fetched.map_err(|e| {
            warn!("Reconciliation failed, will retry on next read: {}", e);
            self.store.mark_stale();
            RevealError::ReconciliationFailed(e.to_string())
        })?;

        info!(
            remaining_turns = budget.remaining_turns,
            total_received_reward = aggregate.total_received_reward,
            "event totals reconciled"
        );
        self.store.apply_fetched(generation, budget, aggregate.clone());
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientResult;
    use crate::error::ClientError;
    use crate::mocks::MockOutcomeClient;
    use crate::store::lock;
    use shared::{CardDraw, EventDetails, TurnBudget, TurnOutcome};
    use std::future::{ready, Future};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Answers with the authority's state as it was when the request was
    /// sent, after a fixed delay.
    struct SnapshotClient {
        state: StdMutex<(TurnBudget, usize)>,
        latency: Duration,
    }

    impl SnapshotClient {
        fn new(budget: TurnBudget) -> Self {
            Self {
                state: StdMutex::new((budget, 0)),
                latency: Duration::from_millis(200),
            }
        }

        fn spend_turn(&self) {
            lock(&self.state).0.remaining_turns -= 1;
        }

        fn fetches(&self) -> usize {
            lock(&self.state).1
        }
    }

    impl OutcomeClient for SnapshotClient {
        fn request_spin_outcome(&self) -> impl Future<Output = ClientResult<TurnOutcome>> + Send {
            ready(Err(ClientError::UnexpectedResponse("no spins".to_string())))
        }

        fn request_card_outcome(
            &self,
            _slot_index: usize,
            _total_slots: usize,
        ) -> impl Future<Output = ClientResult<CardDraw>> + Send {
            ready(Err(ClientError::UnexpectedResponse("no draws".to_string())))
        }

        fn fetch_budget(&self) -> impl Future<Output = ClientResult<TurnBudget>> + Send {
            let budget = {
                let mut state = lock(&self.state);
                state.1 += 1;
                state.0
            };
            let latency = self.latency;
            async move {
                tokio::time::sleep(latency).await;
                Ok(budget)
            }
        }

        fn fetch_event_aggregate(&self) -> impl Future<Output = ClientResult<EventAggregate>> + Send {
            let aggregate = EventAggregate {
                total_spin_left: lock(&self.state).0.remaining_turns,
                ..EventAggregate::default()
            };
            let latency = self.latency;
            async move {
                tokio::time::sleep(latency).await;
                Ok(aggregate)
            }
        }

        fn fetch_event_details(&self) -> impl Future<Output = ClientResult<EventDetails>> + Send {
            ready(Err(ClientError::UnexpectedResponse("no details".to_string())))
        }
    }

    fn setup(client: MockOutcomeClient) -> (Arc<MockOutcomeClient>, SessionReconciler<MockOutcomeClient>) {
        let client = Arc::new(client);
        let reconciler = SessionReconciler::new(Arc::clone(&client), SessionStore::new());
        (client, reconciler)
    }

    #[tokio::test]
    async fn test_reconcile_overwrites_speculative_budget() {
        let (_client, reconciler) = setup(MockOutcomeClient::new(TurnBudget::new(3, 3)));
        reconciler.store().apply_authoritative(TurnBudget::new(1, 3), EventAggregate::default());

        let aggregate = reconciler.reconcile().await.unwrap();
        assert_eq!(aggregate.total_spin_left, 3);
        assert_eq!(reconciler.store().budget(), TurnBudget::new(3, 3));
    }

    #[tokio::test]
    async fn test_read_serves_cache_until_invalidated() {
        let (client, reconciler) = setup(MockOutcomeClient::new(TurnBudget::new(2, 3)));
        reconciler.read().await.unwrap();
        reconciler.read().await.unwrap();
        assert_eq!(client.aggregate_calls(), 1);

        reconciler.invalidate();
        reconciler.read().await.unwrap();
        assert_eq!(client.aggregate_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_readers_share_one_fetch() {
        let (client, reconciler) = setup(
            MockOutcomeClient::new(TurnBudget::new(2, 3)).with_latency(Duration::from_millis(200)),
        );
        let (first, second, third) =
            tokio::join!(reconciler.read(), reconciler.read(), reconciler.read());
        assert_eq!(first.unwrap(), second.unwrap());
        assert!(third.is_ok());
        assert_eq!(client.aggregate_calls(), 1);
        assert_eq!(client.budget_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_ignores_fetch_sent_before_the_turn() {
        let client = Arc::new(SnapshotClient::new(TurnBudget::new(3, 3)));
        let reconciler = SessionReconciler::new(Arc::clone(&client), SessionStore::new());

        let settle = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            client.spend_turn();
            reconciler.invalidate();
            reconciler.reconcile().await
        };
        let (early, settled) = tokio::join!(reconciler.read(), settle);

        assert_eq!(early.unwrap().total_spin_left, 3);
        assert_eq!(settled.unwrap().total_spin_left, 2);
        assert_eq!(reconciler.store().budget().remaining_turns, 2);
        assert!(!reconciler.store().is_stale());
        assert_eq!(client.fetches(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_retried_on_next_read() {
        let (client, reconciler) = setup(MockOutcomeClient::new(TurnBudget::new(2, 3)));
        client.fail_reconciliation(true);
        let err = reconciler.read().await.unwrap_err();
        assert!(matches!(err, RevealError::ReconciliationFailed(_)));
        assert!(reconciler.store().is_stale());

        client.fail_reconciliation(false);
        let aggregate = reconciler.read().await.unwrap();
        assert_eq!(aggregate.total_spin_left, 2);
        assert!(!reconciler.store().is_stale());
    }
}
