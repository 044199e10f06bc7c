//! # Non-blocking event fan-out to multiple subscribers.
//!
//! [`SubscriberSet`] delivers events to several [`Subscribe`] implementations
//! without blocking whoever publishes them. [`SubscriberSet::attach`] additionally
//! spawns a listener that forwards everything published on a [`Bus`].
//!
//! ## Architecture
//! ```text
//! Bus ──► listener (attach) ──► emit(event)
//!                                  ├──► [queue 1] ──► worker 1 ──► sub1.on_event()
//!                                  │    (bounded)        └──────► panic → SubscriberPanicked
//!                                  └──► [queue N] ──► worker N ──► subN.on_event()
//! ```
//!
//! ## Rules
//! - Per-subscriber FIFO; no ordering across subscribers
//! - Full queue: the event is dropped for that subscriber only and `SubscriberOverflow` is published
//! - A panicking handler is reported as `SubscriberPanicked`; its worker keeps going
//! - Subscriber events caused by subscriber events are logged, not re-published
//! - `shutdown` forwards whatever the bus still buffers, then waits for every worker

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::panic_message;
use crate::events::{Bus, Event};
use crate::subscribers::Subscribe;

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Queues of all subscribers plus the bus used for overflow reports.
struct Fanout {
    channels: Vec<SubscriberChannel>,
    bus: Bus,
}

impl Fanout {
    fn emit(&self, event: Arc<Event>) {
        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if event.is_subscriber_event() {
                tracing::warn!(subscriber = channel.name, reason, "dropped subscriber event");
            } else {
                self.bus
                    .publish(Event::subscriber_overflow(channel.name, reason));
            }
        }
    }
}

/// Fan-out coordinator for event subscribers.
pub struct SubscriberSet {
    fanout: Arc<Fanout>,
    workers: Vec<JoinHandle<()>>,
    listener: Option<(JoinHandle<()>, CancellationToken)>,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber; overflow and panic reports go to `bus`.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            workers.push(tokio::spawn(worker(sub, rx, bus.clone())));
            channels.push(SubscriberChannel { name, sender: tx });
        }

        Self {
            fanout: Arc::new(Fanout { channels, bus }),
            workers,
            listener: None,
        }
    }

    /// Creates the set and forwards every event published on `bus` to it.
    #[must_use]
    pub fn attach(subs: Vec<Arc<dyn Subscribe>>, bus: &Bus) -> Self {
        let rx = bus.subscribe();
        let mut set = Self::new(subs, bus.clone());
        let stop = CancellationToken::new();
        let handle = tokio::spawn(listen(rx, Arc::clone(&set.fanout), stop.clone()));
        set.listener = Some((handle, stop));
        set
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.fanout.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fanout.channels.is_empty()
    }

    /// Delivers `event` to every subscriber queue without waiting.
    pub fn emit(&self, event: &Event) {
        self.fanout.emit(Arc::new(event.clone()));
    }

    /// Stops the listener (after forwarding buffered events), closes the queues and
    /// waits until every subscriber handled what it had queued.
    pub async fn shutdown(self) {
        if let Some((handle, stop)) = self.listener {
            stop.cancel();
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "subscriber listener ended abnormally");
            }
        }
        drop(self.fanout);
        for handle in self.workers {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "subscriber worker ended abnormally");
            }
        }
    }
}

async fn worker(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let outcome = std::panic::AssertUnwindSafe(sub.on_event(ev.as_ref()))
            .catch_unwind()
            .await;
        if let Err(panic) = outcome {
            let info = panic_message(panic.as_ref());
            tracing::error!(subscriber = sub.name(), %info, "subscriber panicked");
            if !ev.is_subscriber_event() {
                bus.publish(Event::subscriber_panicked(sub.name(), info));
            }
        }
    }
}

async fn listen(mut rx: broadcast::Receiver<Event>, fanout: Arc<Fanout>, stop: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            received = rx.recv() => match received {
                Ok(ev) => fanout.emit(Arc::new(ev)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
            _ = stop.cancelled() => break,
        }
    }
    // forward what was published before shutdown
    loop {
        match rx.try_recv() {
            Ok(ev) => fanout.emit(Arc::new(ev)),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "subscriber listener lagged behind the bus");
            }
            Err(_) => return,
        }
    }
}
