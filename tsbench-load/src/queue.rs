//! Bounded work queues between the scheduler and the workers

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Sending side, owned by the scheduler
///
/// Dropping it closes every queue, which lets workers drain and exit.
#[derive(Debug)]
pub enum WorkQueues<B> {
    /// One queue shared by all workers
    Shared(mpsc::Sender<B>),
    /// One queue per worker; partition `i` goes to worker `i % workers`
    Dedicated(Vec<mpsc::Sender<B>>),
}

impl<B> WorkQueues<B> {
    /// Hand a batch to a worker, blocking the calling thread while the queue
    /// is full. Returns false once all workers have gone away.
    ///
    /// Must not be called from inside the async runtime.
    pub fn send_blocking(&self, partition: usize, batch: B) -> bool {
        match self {
            WorkQueues::Shared(sender) => sender.blocking_send(batch).is_ok(),
            WorkQueues::Dedicated(senders) => senders[partition % senders.len()].blocking_send(batch).is_ok(),
        }
    }

    /// Async counterpart of [`send_blocking`](Self::send_blocking)
    pub async fn send(&self, partition: usize, batch: B) -> bool {
        match self {
            WorkQueues::Shared(sender) => sender.send(batch).await.is_ok(),
            WorkQueues::Dedicated(senders) => senders[partition % senders.len()].send(batch).await.is_ok(),
        }
    }
}

/// Receiving side, one per worker
#[derive(Debug)]
pub enum WorkReceiver<B> {
    Shared(Arc<Mutex<mpsc::Receiver<B>>>),
    Dedicated(mpsc::Receiver<B>),
}

impl<B> WorkReceiver<B> {
    /// Next batch, or `None` once the queue is closed and empty
    pub async fn recv(&mut self) -> Option<B> {
        match self {
            WorkReceiver::Shared(receiver) => receiver.lock().await.recv().await,
            WorkReceiver::Dedicated(receiver) => receiver.recv().await,
        }
    }

    /// Stop accepting batches; queued ones can still be received
    pub async fn close(&mut self) {
        match self {
            WorkReceiver::Shared(receiver) => receiver.lock().await.close(),
            WorkReceiver::Dedicated(receiver) => receiver.close(),
        }
    }
}

/// Build the queues for `workers` workers, each holding up to `capacity`
/// batches
pub fn work_queues<B>(workers: usize, capacity: usize, dedicated: bool) -> (WorkQueues<B>, Vec<WorkReceiver<B>>) {
    let workers = workers.max(1);
    let capacity = capacity.max(1);

    if dedicated {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..workers)
            .map(|_| {
                let (tx, rx) = mpsc::channel(capacity);
                (tx, WorkReceiver::Dedicated(rx))
            })
            .unzip();
        (WorkQueues::Dedicated(senders), receivers)
    } else {
        let (tx, rx) = mpsc::channel(capacity);
        let shared = Arc::new(Mutex::new(rx));
        let receivers = (0..workers)
            .map(|_| WorkReceiver::Shared(Arc::clone(&shared)))
            .collect();
        (WorkQueues::Shared(tx), receivers)
    }
}
