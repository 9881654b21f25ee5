use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, MouseEvent};
use tokio::sync::mpsc;

use orbit::error::{AppError, Result};
use orbit::fs::tree::{TreeListener, TreeUpdate};

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// A key press event.
    Key(KeyEvent),
    /// A mouse event.
    Mouse(MouseEvent),
    /// A periodic tick for rendering.
    Tick,
    /// Terminal resize event.
    Resize(u16, u16),
    /// The file tree changed shape.
    TreeUpdated(TreeUpdate),
}

/// Async event handler that polls crossterm events and forwards them via a channel.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    /// Create a new EventHandler with the given tick rate.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        // crossterm's poll blocks, keep it off the async workers.
        tokio::task::spawn_blocking(move || loop {
            let sent = if event::poll(tick_rate).unwrap_or(false) {
                match event::read() {
                    Ok(CrosstermEvent::Key(key)) => event_tx.send(Event::Key(key)),
                    Ok(CrosstermEvent::Mouse(mouse)) => event_tx.send(Event::Mouse(mouse)),
                    Ok(CrosstermEvent::Resize(w, h)) => event_tx.send(Event::Resize(w, h)),
                    _ => Ok(()),
                }
            } else {
                event_tx.send(Event::Tick)
            };
            if sent.is_err() {
                break;
            }
        });

        Self { rx, tx }
    }

    /// Get a sender clone for background tasks.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event (blocks until available).
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| AppError::Terminal("Event channel closed".into()))
    }
}

/// Forwards tree updates into the UI event queue.
pub struct TreeEventSink(pub mpsc::UnboundedSender<Event>);

impl TreeListener for TreeEventSink {
    fn on_tree_updated(&self, update: TreeUpdate) {
        // A closed queue means the UI is shutting down.
        let _ = self.0.send(Event::TreeUpdated(update));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit::fs::tree::UpdateKind;

    #[test]
    fn sink_forwards_updates() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = TreeEventSink(tx);
        sink.on_tree_updated(TreeUpdate {
            kind: UpdateKind::Inserted,
            anchor: 0,
            start: 1,
            count: 3,
        });

        match rx.try_recv() {
            Ok(Event::TreeUpdated(update)) => assert_eq!(update.item_count(), 3),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn sink_ignores_closed_queue() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sink = TreeEventSink(tx);
        sink.on_tree_updated(TreeUpdate {
            kind: UpdateKind::Removed,
            anchor: 0,
            start: 1,
            count: 1,
        });
    }
}
