//! Notification bus: subscription lists keyed by (notification, source) and
//! fan-out into the event scheduler.
//!
//! The bus knows nothing about handler dispatch; it calls back into
//! [`EventScheduler::submit`], the same separation a `Scheduler`/
//! `SchedulerDelegate` split gives a timer scheduler that knows nothing
//! about the event queue it eventually calls back into.

use std::collections::HashMap;

use crate::fwk_id::{Id, IdKind};
use crate::fwk_status::{FwkResult, Status};
use crate::fwk_thread::{EventRecord, EventSink};

/// Capability handed to a module's `start`/`stop`/`process_event`/
/// `process_notification` callback: event submission (via the [`EventSink`]
/// supertrait) plus the notification-bus operations a module needs to act as
/// a subscriber or publisher. Implemented by a small wrapper the registry
/// builds per dispatch, pairing the live event scheduler with the shared
/// notification bus — no module ever holds both at once outside the call.
pub trait NotificationSink: EventSink {
    fn subscribe(&mut self, notification_id: Id, source_id: Id, subscriber_id: Id) -> FwkResult<()>;
    fn unsubscribe(&mut self, notification_id: Id, source_id: Id, subscriber_id: Id);
    /// Publish `event` (`event.is_notification` must be set, `event.id` and
    /// `event.source_id` identify the notification) to every current
    /// subscriber. Returns the fan-out count, i.e. how many responses to
    /// expect if `event.response_requested` was set.
    fn notify(&mut self, event: &EventRecord) -> FwkResult<usize>;
}

/// Subscription lists for every `(notification id, source id)` pair that
/// has at least one subscriber.
#[derive(Default)]
pub struct NotificationBus {
    subscribers: HashMap<(Id, Id), Vec<Id>>,
}

impl NotificationBus {
    #[must_use]
    pub fn new() -> Self {
        NotificationBus::default()
    }

    /// Subscribe `subscriber_id` to notifications of kind `notification_id`
    /// raised by `source_id`. Idempotent — subscribing twice has the same
    /// effect as subscribing once.
    pub fn subscribe(&mut self, notification_id: Id, source_id: Id, subscriber_id: Id) -> FwkResult<()> {
        if !notification_id.is_kind(IdKind::Notification) || !subscriber_id.is_defined() || !source_id.is_defined() {
            return Err(Status::ParamError);
        }
        let list = self.subscribers.entry((notification_id, source_id)).or_default();
        if !list.contains(&subscriber_id) {
            list.push(subscriber_id);
        }
        Ok(())
    }

    /// Remove a previously registered subscription. A no-op if it was never
    /// registered.
    pub fn unsubscribe(&mut self, notification_id: Id, source_id: Id, subscriber_id: Id) {
        if let Some(list) = self.subscribers.get_mut(&(notification_id, source_id)) {
            list.retain(|id| *id != subscriber_id);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self, notification_id: Id, source_id: Id) -> usize {
        self.subscribers
            .get(&(notification_id, source_id))
            .map_or(0, Vec::len)
    }

    /// Publish a notification: submit one copy of `event` per subscriber,
    /// addressed to that subscriber. Returns the number of subscribers the
    /// notification fanned out to (the acknowledgement count).
    pub fn publish(&self, scheduler: &mut dyn EventSink, event: &EventRecord) -> FwkResult<usize> {
        if !event.is_notification || !event.id.is_kind(IdKind::Notification) {
            return Err(Status::ParamError);
        }
        let Some(subscribers) = self.subscribers.get(&(event.id, event.source_id)) else {
            return Ok(0);
        };
        let mut delivered = 0;
        for &subscriber in subscribers {
            let mut copy = *event;
            copy.target_id = subscriber;
            copy.response_requested = false;
            scheduler.submit(&mut copy)?;
            delivered += 1;
        }
        log::debug!(
            "fwk_notification: {:?} from {:?} delivered to {delivered} subscriber(s)",
            event.id,
            event.source_id
        );
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fwk_thread::EventScheduler;

    #[test]
    fn publish_fans_out_to_every_subscriber() {
        let mut bus = NotificationBus::new();
        let notif = Id::notification(0, 0);
        let source = Id::module(0);
        bus.subscribe(notif, source, Id::module(1)).unwrap();
        bus.subscribe(notif, source, Id::module(2)).unwrap();

        let mut sched = EventScheduler::<8>::new();
        let event = EventRecord {
            is_notification: true,
            ..EventRecord::new(source, Id::NONE, notif)
        };
        let delivered = bus.publish(&mut sched, &event).unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(sched.free_count(), 6);
    }

    #[test]
    fn publish_with_no_subscribers_delivers_nothing() {
        let mut bus = NotificationBus::new();
        let mut sched = EventScheduler::<8>::new();
        let event = EventRecord {
            is_notification: true,
            ..EventRecord::new(Id::module(0), Id::NONE, Id::notification(0, 0))
        };
        assert_eq!(bus.publish(&mut sched, &event).unwrap(), 0);
    }

    #[test]
    fn unsubscribe_removes_a_subscriber() {
        let mut bus = NotificationBus::new();
        let notif = Id::notification(0, 0);
        let source = Id::module(0);
        bus.subscribe(notif, source, Id::module(1)).unwrap();
        bus.unsubscribe(notif, source, Id::module(1));
        assert_eq!(bus.subscriber_count(notif, source), 0);
    }
}
