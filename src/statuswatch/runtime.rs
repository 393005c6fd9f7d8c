/*
 * Copyright (C) 2025 The Statuswatch Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::statuswatch::controller::StatusController;
use crate::statuswatch::logger::{log_info, log_warn};
use crate::statuswatch::object::{ObjectKey, StatusObject};

const COMPONENT: &str = "status-executor";

const DEFAULT_QUEUE_CAPACITY: usize = 256;

const ERROR_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Cloneable multi-producer work queue feeding controller executors.
#[derive(Clone)]
pub struct WorkQueue<T> {
    inner: Arc<WorkQueueInner<T>>,
}

struct WorkQueueInner<T> {
    sender: mpsc::Sender<T>,
    receiver: Mutex<mpsc::Receiver<T>>,
}

impl<T> WorkQueue<T>
where
    T: Send + 'static,
{
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            inner: Arc::new(WorkQueueInner {
                sender,
                receiver: Mutex::new(receiver),
            }),
        }
    }

    pub async fn enqueue(&self, item: T) -> Result<(), mpsc::error::SendError<T>> {
        self.inner.sender.send(item).await
    }

    pub async fn next(&self) -> Option<T> {
        let mut guard = self.inner.receiver.lock().await;
        guard.recv().await
    }
}

impl<T> Default for WorkQueue<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Drains the queue and runs the controller for each identity.
///
/// Successful passes re-enqueue the identity after the controller's requeue
/// delay; failed passes are logged and retried on a short fixed delay. Any
/// dispatcher with equivalent at-least-once semantics may replace this loop.
/// The task ends once every queue handle has been dropped.
pub fn spawn_executor<T>(
    controller: Arc<StatusController<T>>,
    queue: WorkQueue<ObjectKey>,
) -> JoinHandle<()>
where
    T: StatusObject + 'static,
{
    tokio::spawn(async move {
        log_info(
            COMPONENT,
            "executor started",
            &[("kind", controller.group_kind().kind.as_str())],
        );
        while let Some(key) = queue.next().await {
            let delay = match controller.reconcile(&key) {
                Ok(outcome) => outcome.requeue_after,
                Err(err) => {
                    log_warn(
                        COMPONENT,
                        "reconcile failed, will retry",
                        &[
                            ("kind", controller.group_kind().kind.as_str()),
                            ("namespace", key.namespace.as_str()),
                            ("name", key.name.as_str()),
                            ("error", err.to_string().as_str()),
                        ],
                    );
                    Some(ERROR_RETRY_DELAY)
                }
            };
            if let Some(delay) = delay {
                let queue = queue.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = queue.enqueue(key).await;
                });
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statuswatch::controller::ControllerOptions;
    use crate::statuswatch::events::EventBuffer;
    use crate::statuswatch::object::GroupKind;
    use crate::statuswatch::store::{MemoryStore, ObjectStore, StoreError};
    use crate::statuswatch::unstructured::UnstructuredObject;
    use prometheus::Registry;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Duration};

    #[tokio::test]
    async fn work_queue_orders_items() {
        let queue: WorkQueue<u32> = WorkQueue::new(4);
        queue.enqueue(1).await.expect("enqueue 1");
        queue.enqueue(2).await.expect("enqueue 2");
        queue.enqueue(3).await.expect("enqueue 3");

        assert_eq!(queue.next().await, Some(1));
        assert_eq!(queue.next().await, Some(2));
        assert_eq!(queue.next().await, Some(3));
    }

    struct CountingStore {
        inner: MemoryStore<UnstructuredObject>,
        reads: AtomicUsize,
    }

    impl ObjectStore<UnstructuredObject> for CountingStore {
        fn get(&self, key: &ObjectKey) -> Result<UnstructuredObject, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }
    }

    #[tokio::test]
    async fn executor_requeues_after_successful_pass() {
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            reads: AtomicUsize::new(0),
        });
        let key = ObjectKey::new("default", "web-0");
        store.inner.insert(
            key.clone(),
            UnstructuredObject::new(json!({"status": {"conditions": []}})),
        );

        let registry = Registry::new();
        let controller = Arc::new(
            StatusController::new(
                GroupKind::new("apps.example.com", "TestResource"),
                store.clone(),
                Arc::new(EventBuffer::new()),
                &registry,
                ControllerOptions {
                    requeue_interval: Duration::from_millis(10),
                },
            )
            .expect("controller built"),
        );

        let queue: WorkQueue<ObjectKey> = WorkQueue::default();
        let executor = spawn_executor(controller, queue.clone());
        queue.enqueue(key).await.expect("enqueue");

        sleep(Duration::from_millis(200)).await;
        assert!(store.reads.load(Ordering::SeqCst) >= 2);
        executor.abort();
    }
}
