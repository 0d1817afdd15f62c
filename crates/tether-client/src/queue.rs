//! Unbounded FIFO message queues crossing the application/connection boundary.
//!
//! A [`MessageQueue`] is a cloneable handle: any number of producers may
//! [`push`](MessageQueue::push) and any number of consumers may
//! [`pop`](MessageQueue::pop), but each message is delivered to exactly one
//! consumer. Queues live for the whole process and survive reconnects.
//!
//! There is no backpressure. While disconnected the outbound queue grows
//! without limit; an optional high-water mark logs a warning the first time
//! the depth reaches it (re-armed once the depth drops below).
//!
//! A consumer that needs to know when a message is fully handled takes it
//! with [`take`](MessageQueue::take). The returned [`Delivery`] keeps the
//! queue unsettled until it is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tether_core::Message;
use tokio::sync::{Mutex, mpsc};
use tracing::warn;

/// Cloneable handle to an unbounded, order-preserving message queue.
#[derive(Clone)]
pub struct MessageQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    name: &'static str,
    tx: mpsc::UnboundedSender<Message>,
    rx: Mutex<mpsc::UnboundedReceiver<Message>>,
    depth: AtomicUsize,
    in_flight: AtomicUsize,
    high_water_mark: Option<usize>,
    above_mark: AtomicBool,
}

impl MessageQueue {
    /// Create an empty queue. `name` labels log lines.
    pub fn new(name: &'static str) -> Self {
        Self::with_high_water_mark(name, None)
    }

    /// Create an empty queue that warns when its depth reaches `mark`.
    pub fn with_high_water_mark(name: &'static str, mark: Option<usize>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(QueueInner {
                name,
                tx,
                rx: Mutex::new(rx),
                depth: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                high_water_mark: mark,
                above_mark: AtomicBool::new(false),
            }),
        }
    }

    /// Queue label.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Append a message. Never blocks.
    pub fn push(&self, message: Message) {
        let depth = self.inner.depth.fetch_add(1, Ordering::AcqRel) + 1;
        // The receiver lives in `inner`, so the channel cannot be closed here.
        let _ = self.inner.tx.send(message);

        if let Some(mark) = self.inner.high_water_mark {
            if depth >= mark && !self.inner.above_mark.swap(true, Ordering::AcqRel) {
                warn!(queue = self.inner.name, depth, mark, "queue reached high-water mark");
            }
        }
    }

    /// Take the oldest message, suspending while the queue is empty.
    ///
    /// Cancel safe: dropping the future before it resolves never loses a
    /// message. Returns `None` only if every sender is gone, which cannot
    /// happen while this handle is alive.
    pub async fn pop(&self) -> Option<Message> {
        let message = self.inner.rx.lock().await.recv().await?;
        self.on_removed();
        Some(message)
    }

    /// Take the oldest message and count it as in flight until the returned
    /// [`Delivery`] is dropped. Cancel safe like [`pop`](Self::pop).
    pub async fn take(&self) -> Option<Delivery> {
        let message = self.inner.rx.lock().await.recv().await?;
        // Counted before the depth drops so is_settled never sees a gap
        let _ = self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        self.on_removed();
        Some(Delivery {
            message,
            queue: Arc::clone(&self.inner),
        })
    }

    /// Like [`pop`](Self::pop) but gives up after `timeout`.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<Message> {
        tokio::time::timeout(timeout, self.pop()).await.ok().flatten()
    }

    /// Take the oldest message if one is ready and no other consumer is
    /// currently waiting.
    pub fn try_pop(&self) -> Option<Message> {
        let message = self.inner.rx.try_lock().ok()?.try_recv().ok()?;
        self.on_removed();
        Some(message)
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.inner.depth.load(Ordering::Acquire)
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages taken with [`take`](Self::take) whose delivery is not done.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Empty with nothing in flight.
    pub fn is_settled(&self) -> bool {
        self.in_flight() == 0 && self.is_empty()
    }

    fn on_removed(&self) {
        let depth = self.inner.depth.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        if let Some(mark) = self.inner.high_water_mark {
            if depth < mark {
                self.inner.above_mark.store(false, Ordering::Release);
            }
        }
    }
}

/// A message taken off a queue for delivery.
pub struct Delivery {
    message: Message,
    queue: Arc<QueueInner>,
}

impl Delivery {
    /// The message being delivered.
    pub fn message(&self) -> &Message {
        &self.message
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        let _ = self.queue.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("queue", &self.queue.name)
            .field("message", &self.message)
            .finish()
    }
}

impl std::fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageQueue")
            .field("name", &self.inner.name)
            .field("len", &self.len())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(text: &str) -> Message {
        Message::new("bob", text)
    }

    #[tokio::test]
    async fn fifo_order() {
        let queue = MessageQueue::new("test");
        for i in 0..5 {
            queue.push(msg(&format!("m{i}")));
        }
        assert_eq!(queue.len(), 5);
        for i in 0..5 {
            let m = queue.pop().await.unwrap();
            assert_eq!(m.text(), format!("m{i}"));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let producer = MessageQueue::new("test");
        let consumer = producer.clone();
        producer.push(msg("shared"));
        assert_eq!(consumer.pop().await.unwrap().text(), "shared");
        assert!(producer.is_empty());
    }

    #[tokio::test]
    async fn pop_suspends_until_push() {
        let queue = MessageQueue::new("test");
        let q2 = queue.clone();
        let handle = tokio::spawn(async move { q2.pop().await });

        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        queue.push(msg("late"));
        assert_eq!(handle.await.unwrap().unwrap().text(), "late");
    }

    #[tokio::test(start_paused = true)]
    async fn pop_timeout_expires_on_empty_queue() {
        let queue = MessageQueue::new("test");
        assert!(queue.pop_timeout(Duration::from_millis(50)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_pop_loses_nothing() {
        let queue = MessageQueue::new("test");
        assert!(queue.pop_timeout(Duration::from_millis(10)).await.is_none());
        queue.push(msg("kept"));
        assert_eq!(queue.pop().await.unwrap().text(), "kept");
    }

    #[tokio::test]
    async fn each_message_goes_to_one_consumer() {
        let queue = MessageQueue::new("test");
        let mut handles = Vec::new();
        for _ in 0..4 {
            let q = queue.clone();
            handles.push(tokio::spawn(async move { q.pop().await.unwrap() }));
        }
        for i in 0..4 {
            queue.push(msg(&format!("m{i}")));
        }
        let mut seen: Vec<String> = Vec::new();
        for h in handles {
            seen.push(h.await.unwrap().text().to_string());
        }
        seen.sort();
        assert_eq!(seen, vec!["m0", "m1", "m2", "m3"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn try_pop_empty_and_ready() {
        let queue = MessageQueue::new("test");
        assert!(queue.try_pop().is_none());
        queue.push(msg("now"));
        assert_eq!(queue.try_pop().unwrap().text(), "now");
        assert!(queue.try_pop().is_none());
    }

    #[tokio::test]
    async fn taken_message_stays_in_flight_until_dropped() {
        let queue = MessageQueue::new("outbound");
        queue.push(msg("last"));
        assert!(!queue.is_settled());

        let delivery = queue.take().await.unwrap();
        assert_eq!(delivery.message().text(), "last");
        assert!(queue.is_empty());
        assert_eq!(queue.in_flight(), 1);
        assert!(!queue.is_settled());

        drop(delivery);
        assert_eq!(queue.in_flight(), 0);
        assert!(queue.is_settled());
    }

    #[test]
    fn high_water_mark_rearms_below_mark() {
        let queue = MessageQueue::with_high_water_mark("outbound", Some(2));
        queue.push(msg("a"));
        assert!(!queue.inner.above_mark.load(Ordering::Acquire));
        queue.push(msg("b"));
        assert!(queue.inner.above_mark.load(Ordering::Acquire));
        let _ = queue.try_pop();
        assert!(!queue.inner.above_mark.load(Ordering::Acquire));
        // Delivery is unaffected by the mark
        queue.push(msg("c"));
        queue.push(msg("d"));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn debug_shows_name_and_len() {
        let queue = MessageQueue::new("inbound");
        queue.push(msg("x"));
        let debug = format!("{queue:?}");
        assert!(debug.contains("inbound"));
        assert!(debug.contains("len: 1"));
    }
}
