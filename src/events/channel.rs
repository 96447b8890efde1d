//! Crossbeam-backed event plumbing.

use super::Event;
use crossbeam_channel::{Receiver, Sender};

/// Producer half, handed to the engine. Cheap to clone across workers.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Publish an event. A disconnected receiver is not an error: the scan
    /// runs the same whether or not anyone listens.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }
}

/// Consumer half, held by the CLI or a test
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Blocking iterator that ends when every sender is dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Constructor for sender/receiver pairs
pub struct EventChannel;

impl EventChannel {
    /// Unbounded pair. Scan events are small and few per photo.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// Sender with no receiver; every event is discarded
pub fn null_sender() -> EventSender {
    EventChannel::new().0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ScanEvent, ScanPhase};
    use std::thread;

    fn phase(phase: ScanPhase) -> Event {
        Event::Scan(ScanEvent::PhaseChanged { phase })
    }

    #[test]
    fn worker_threads_can_publish() {
        let (sender, receiver) = EventChannel::new();
        let worker = sender.clone();
        thread::spawn(move || worker.send(phase(ScanPhase::PerceptualHashing)))
            .join()
            .unwrap();
        drop(sender);

        let received: Vec<Event> = receiver.iter().collect();
        assert_eq!(received.len(), 1);
        assert!(matches!(
            received[0],
            Event::Scan(ScanEvent::PhaseChanged {
                phase: ScanPhase::PerceptualHashing
            })
        ));
    }

    #[test]
    fn null_sender_swallows_events() {
        let sender = null_sender();
        sender.send(Event::Scan(ScanEvent::Error {
            message: "nobody listening".to_string(),
        }));
    }

    #[test]
    fn iteration_ends_when_senders_drop() {
        let (sender, receiver) = EventChannel::new();
        sender.send(phase(ScanPhase::Narrowing));
        sender.send(phase(ScanPhase::ByteHashing));
        drop(sender);

        assert_eq!(receiver.iter().count(), 2);
    }
}
