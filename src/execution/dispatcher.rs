//! Execution Dispatcher
//!
//! Packs batches into one `executeOrderGroups` call and submits it.
//! Every order id is marked pending before submission through a
//! [`PendingGuard`], so a failed submission (after bounded retries) rolls
//! the marks back on every exit path. A successful submission hands the
//! marks to a confirmation watcher, which removes executed orders from the
//! book and then releases them.
//!
//! Created: 2026-10-18

use super::signer::TransactionSender;
use crate::contracts::ILimitOrderRouter;
use crate::error::ExecutionError;
use crate::orders::{GasCreditLedger, OrderBook, PendingExecution};
use crate::types::OrderId;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::sol_types::SolCall;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub router: Address,
    /// Drop orders whose owner has no gas credit
    pub require_gas_credit: bool,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub poll_interval: Duration,
    pub confirmation_timeout: Duration,
}

/// A submitted execution transaction
#[derive(Debug)]
pub struct Submitted {
    pub hash: TxHash,
    pub order_ids: Vec<OrderId>,
    /// Confirmation watcher; dropping the handle leaves it running
    pub confirmation: JoinHandle<()>,
}

pub struct ExecutionDispatcher<S: ?Sized> {
    sender: Arc<S>,
    book: OrderBook,
    ledger: GasCreditLedger,
    pending: PendingExecution,
    settings: DispatchSettings,
}

impl<S: TransactionSender + ?Sized> ExecutionDispatcher<S> {
    pub fn new(
        sender: Arc<S>,
        book: OrderBook,
        ledger: GasCreditLedger,
        pending: PendingExecution,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            sender,
            book,
            ledger,
            pending,
            settings,
        }
    }

    /// Submit `batches` as one transaction. `Ok(None)` when nothing was left to send.
    pub async fn dispatch(&self, batches: Vec<Vec<OrderId>>) -> Result<Option<Submitted>, ExecutionError> {
        let batches = self.eligible(batches);
        if batches.is_empty() {
            return Ok(None);
        }

        let ids: Vec<OrderId> = batches.iter().flatten().copied().collect();
        let guard = self.pending.mark(&ids);
        // Ids another dispatch marked since the eligibility check belong to it
        let owned: HashSet<OrderId> = guard.ids().iter().copied().collect();
        let batches: Vec<Vec<OrderId>> = batches
            .into_iter()
            .map(|batch| batch.into_iter().filter(|id| owned.contains(id)).collect::<Vec<_>>())
            .filter(|batch| !batch.is_empty())
            .collect();
        if batches.is_empty() {
            return Ok(None);
        }

        let order_count = owned.len();
        let data = Bytes::from(
            ILimitOrderRouter::executeOrderGroupsCall {
                orderGroups: batches,
            }
            .abi_encode(),
        );
        let hash = self.send_with_retry(data).await?;

        let order_ids = guard.commit();
        info!("Execution tx {} submitted for {} orders", hash, order_count);
        let confirmation = self.watch(hash, order_ids.clone());
        Ok(Some(Submitted {
            hash,
            order_ids,
            confirmation,
        }))
    }

    fn eligible(&self, batches: Vec<Vec<OrderId>>) -> Vec<Vec<OrderId>> {
        batches
            .into_iter()
            .map(|batch| {
                batch
                    .into_iter()
                    .filter(|id| self.is_eligible(id))
                    .collect::<Vec<_>>()
            })
            .filter(|batch| !batch.is_empty())
            .collect()
    }

    fn is_eligible(&self, id: &OrderId) -> bool {
        if self.pending.is_pending(id) {
            return false;
        }
        let Some(order) = self.book.get(id) else {
            debug!("Order {} left the book before dispatch", id);
            return false;
        };
        if self.settings.require_gas_credit && !self.ledger.has_credit(&order.owner) {
            debug!("Order {} owner {:?} has no gas credit", id, order.owner);
            return false;
        }
        true
    }

    async fn send_with_retry(&self, data: Bytes) -> Result<TxHash, ExecutionError> {
        let attempts = self.settings.max_retries.max(1);
        let mut attempt = 1;
        loop {
            match self.sender.send(self.settings.router, data.clone()).await {
                Ok(hash) => return Ok(hash),
                Err(e) if attempt >= attempts => {
                    return Err(ExecutionError::RetriesExhausted {
                        attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!("Submission attempt {}/{} failed: {}", attempt, attempts, e);
                    attempt += 1;
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
            }
        }
    }

    fn watch(&self, hash: TxHash, order_ids: Vec<OrderId>) -> JoinHandle<()> {
        let sender = Arc::clone(&self.sender);
        let book = self.book.clone();
        let pending = self.pending.clone();
        let poll_interval = self.settings.poll_interval;
        let timeout = self.settings.confirmation_timeout;
        tokio::spawn(async move {
            match sender.wait_for_transaction(hash, poll_interval, timeout).await {
                Ok(true) => {
                    for id in &order_ids {
                        book.remove(id);
                    }
                    info!("Execution tx {} confirmed, {} orders filled", hash, order_ids.len());
                }
                Ok(false) => warn!("Execution tx {} reverted", hash),
                Err(e) => warn!("Execution tx {} unconfirmed: {}", hash, e),
            }
            pending.release(&order_ids);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{order, MockSender};
    use crate::types::Side;
    use alloy::primitives::U256;
    use std::sync::atomic::Ordering;

    const ROUTER: Address = Address::repeat_byte(0x10);
    const WETH: Address = Address::repeat_byte(0xEE);
    const X: Address = Address::repeat_byte(0x01);

    struct Fixture {
        sender: Arc<MockSender>,
        book: OrderBook,
        ledger: GasCreditLedger,
        pending: PendingExecution,
        dispatcher: ExecutionDispatcher<MockSender>,
    }

    fn fixture(sender: MockSender, require_gas_credit: bool) -> Fixture {
        let sender = Arc::new(sender);
        let book = OrderBook::new(WETH);
        let ledger = GasCreditLedger::new();
        let pending = PendingExecution::new();
        let dispatcher = ExecutionDispatcher::new(
            Arc::clone(&sender),
            book.clone(),
            ledger.clone(),
            pending.clone(),
            DispatchSettings {
                router: ROUTER,
                require_gas_credit,
                max_retries: 3,
                retry_delay: Duration::from_millis(1),
                poll_interval: Duration::from_millis(1),
                confirmation_timeout: Duration::from_millis(50),
            },
        );
        Fixture {
            sender,
            book,
            ledger,
            pending,
            dispatcher,
        }
    }

    fn seed(f: &Fixture, ids: &[u8]) -> Vec<OrderId> {
        ids.iter()
            .map(|id| {
                let o = order(*id, Side::Buy, X, WETH, 10);
                f.ledger.set(o.owner, U256::from(1u64));
                f.book.upsert(o.clone());
                o.id
            })
            .collect()
    }

    #[tokio::test]
    async fn test_failed_submission_rolls_back_pending_marks() {
        let f = fixture(MockSender::failing(10), true);
        let ids = seed(&f, &[1, 2]);

        let result = f.dispatcher.dispatch(vec![ids.clone()]).await;
        assert!(matches!(
            result,
            Err(ExecutionError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(f.sender.send_attempts.load(Ordering::SeqCst), 3);
        assert!(f.pending.is_empty());
        assert!(ids.iter().all(|id| f.book.contains(id)));
    }

    #[tokio::test]
    async fn test_retry_then_confirm_removes_orders() {
        let f = fixture(MockSender::failing(1), true);
        let first = seed(&f, &[1, 2]);
        let second = seed(&f, &[3]);

        let submitted = f
            .dispatcher
            .dispatch(vec![first.clone(), second.clone()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(submitted.hash, TxHash::repeat_byte(0x77));
        assert_eq!(submitted.order_ids.len(), 3);

        let sent = f.sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ROUTER);
        let call = ILimitOrderRouter::executeOrderGroupsCall::abi_decode(&sent[0].1).unwrap();
        assert_eq!(call.orderGroups, vec![first.clone(), second.clone()]);

        submitted.confirmation.await.unwrap();
        assert!(f.book.is_empty());
        assert!(f.pending.is_empty());
    }

    #[tokio::test]
    async fn test_revert_keeps_orders_and_releases_marks() {
        let sender = MockSender::default();
        sender.revert_on_chain.store(true, Ordering::SeqCst);
        let f = fixture(sender, true);
        let ids = seed(&f, &[1]);

        let submitted = f.dispatcher.dispatch(vec![ids.clone()]).await.unwrap().unwrap();
        submitted.confirmation.await.unwrap();
        assert!(f.book.contains(&ids[0]));
        assert!(f.pending.is_empty());
    }

    #[tokio::test]
    async fn test_orders_without_gas_credit_are_dropped() {
        let f = fixture(MockSender::default(), true);
        let o = order(1, Side::Buy, X, WETH, 10);
        f.book.upsert(o.clone());

        assert!(f.dispatcher.dispatch(vec![vec![o.id]]).await.unwrap().is_none());
        assert_eq!(f.sender.send_attempts.load(Ordering::SeqCst), 0);

        let f = fixture(MockSender::default(), false);
        f.book.upsert(o.clone());
        assert!(f.dispatcher.dispatch(vec![vec![o.id]]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pending_orders_are_not_resubmitted() {
        let f = fixture(MockSender::default(), true);
        let ids = seed(&f, &[1, 2]);
        let _in_flight = f.pending.mark(&ids[..1]);

        let submitted = f.dispatcher.dispatch(vec![ids.clone()]).await.unwrap().unwrap();
        assert_eq!(submitted.order_ids, vec![ids[1]]);
        submitted.confirmation.await.unwrap();
        // The other in-flight mark is untouched by this watcher
        assert!(f.pending.is_pending(&ids[0]));
    }
}
