//! Scenario: a notification fans out to every current subscriber exactly
//! once, and no longer reaches a subscriber that has unsubscribed.

use std::cell::RefCell;
use std::rc::Rc;

use scp_fwk_core::fwk_id::Id;
use scp_fwk_core::fwk_module::ModuleConfig;
use scp_fwk_core::fwk_thread::EventRecord;
use scp_fwk_core::Runtime;

use crate::demos::{NotifierModule, WatcherModule, NOTIFIER_EVENT_FIRE, NOTIFIER_NOTIFICATION_TICK};

#[test]
fn publish_reaches_every_subscriber_until_it_unsubscribes() {
    let mut runtime = Runtime::<64>::new(1).unwrap();

    let notifier_id = runtime.registry.register(Box::new(NotifierModule), ModuleConfig::none()).unwrap();

    let watcher_a_seen = Rc::new(RefCell::new(Vec::new()));
    let watcher_a_id = runtime
        .registry
        .register(Box::new(WatcherModule::new(notifier_id, watcher_a_seen.clone())), ModuleConfig::none())
        .unwrap();

    let watcher_b_seen = Rc::new(RefCell::new(Vec::new()));
    let watcher_b_id = runtime
        .registry
        .register(Box::new(WatcherModule::new(notifier_id, watcher_b_seen.clone())), ModuleConfig::none())
        .unwrap();

    runtime.start_all().unwrap();

    let mut fire = EventRecord::new(Id::NONE, notifier_id, Id::event(notifier_id.module_idx(), NOTIFIER_EVENT_FIRE));
    runtime.scheduler.submit(&mut fire).unwrap();
    runtime.run_until_idle();

    assert_eq!(watcher_a_seen.borrow().len(), 1);
    assert_eq!(watcher_b_seen.borrow().len(), 1);
    assert_eq!(watcher_a_seen.borrow()[0], notifier_id);

    let notification_id = Id::notification(notifier_id.module_idx(), NOTIFIER_NOTIFICATION_TICK);
    runtime.registry.unsubscribe(notification_id, notifier_id, watcher_b_id);

    let mut fire_again = EventRecord::new(Id::NONE, notifier_id, Id::event(notifier_id.module_idx(), NOTIFIER_EVENT_FIRE));
    runtime.scheduler.submit(&mut fire_again).unwrap();
    runtime.run_until_idle();

    assert_eq!(watcher_a_seen.borrow().len(), 2, "remaining subscriber should still receive the second publish");
    assert_eq!(watcher_b_seen.borrow().len(), 1, "unsubscribed watcher must not receive further notifications");
    let _ = watcher_a_id;
}
