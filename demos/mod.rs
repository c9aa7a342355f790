//! In-memory example modules exercising the framework end to end.
//!
//! Not part of the shipped library — every hosted module here exists only to
//! give the integration tests under `tests/` something concrete to bring up,
//! bind, and dispatch events through, the way a lightweight mock hardware
//! adapter gives integration tests something to assert call histories
//! against. A real product would replace these with its own
//! clock/PSU/sensor/protocol drivers.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use scp_fwk_core::fwk_id::Id;
use scp_fwk_core::fwk_module::{ApiHandle, Module, ModuleRegistry};
use scp_fwk_core::fwk_notification::NotificationSink;
use scp_fwk_core::fwk_status::{FwkResult, Outcome, Status};
use scp_fwk_core::fwk_thread::{EventRecord, EventSink};

/// Event index a [`PsuModule`] answers: "measure the rail and reply with its
/// millivolt reading".
pub const PSU_EVENT_MEASURE: u16 = 0;

/// The API a [`PsuModule`] hands out through the bind broker.
pub trait RailApi {
    fn rail_mv(&self) -> u32;
}

struct FixedRail(u32);

impl RailApi for FixedRail {
    fn rail_mv(&self) -> u32 {
        self.0
    }
}

/// Per-module configuration for [`PsuModule`], handed in via
/// [`scp_fwk_core::fwk_module::ModuleConfig::data`].
pub struct PsuConfig {
    pub rail_mv: u32,
    /// When set, `process_event` defers its response instead of answering
    /// inline — exercises the delayed-response path.
    pub defer_response: bool,
}

/// Module A: exposes one API (its rail voltage) and one event (a
/// synchronous or deferred measurement request).
pub struct PsuModule {
    rail_mv: u32,
    defer_response: bool,
    /// Cookie of the most recent deferred request, shared with the test
    /// harness so it can stand in for "a later timer tick" and resolve it.
    pub pending_cookie: Rc<RefCell<Option<u32>>>,
}

impl PsuModule {
    #[must_use]
    pub fn new(pending_cookie: Rc<RefCell<Option<u32>>>) -> Self {
        PsuModule { rail_mv: 0, defer_response: false, pending_cookie }
    }
}

impl Module for PsuModule {
    fn name(&self) -> &'static str {
        "psu"
    }

    fn api_count(&self) -> usize {
        1
    }

    fn event_count(&self) -> usize {
        1
    }

    fn has_process_bind_request(&self) -> bool {
        true
    }

    fn has_process_event(&self) -> bool {
        true
    }

    fn init(
        &mut self,
        _module_id: Id,
        _element_count: usize,
        data: &dyn Any,
        _registry: &mut ModuleRegistry,
    ) -> FwkResult<()> {
        let config = data.downcast_ref::<PsuConfig>().ok_or(Status::ParamError)?;
        self.rail_mv = config.rail_mv;
        self.defer_response = config.defer_response;
        Ok(())
    }

    fn process_bind_request(&mut self, _requester: Id, _target: Id, _api_id: Id) -> FwkResult<ApiHandle> {
        Ok(ApiHandle::new(Rc::new(FixedRail(self.rail_mv))))
    }

    fn process_event(
        &mut self,
        event: &EventRecord,
        response: &mut EventRecord,
        _sink: &mut dyn NotificationSink,
    ) -> FwkResult<Outcome> {
        if !self.defer_response {
            response.set_params(&self.rail_mv.to_le_bytes())?;
            return Ok(Outcome::Complete);
        }
        response.is_delayed_response = true;
        *self.pending_cookie.borrow_mut() = Some(event.cookie);
        Ok(Outcome::Complete)
    }
}

/// Resolve a [`PsuModule`]'s parked delayed response — stands in for "a
/// later timer tick" waking the driver up to finish a measurement it
/// deferred. `psu_module_id` must be the `Id::module(..)` the `PsuModule`
/// was registered under.
pub fn resolve_psu_measurement(
    psu_module_id: Id,
    cookie: u32,
    rail_mv: u32,
    sched: &mut dyn EventSink,
) -> FwkResult<()> {
    let mut resolution = EventRecord::new(psu_module_id, Id::NONE, Id::event(psu_module_id.module_idx(), PSU_EVENT_MEASURE));
    resolution.is_delayed_response = true;
    resolution.cookie = cookie;
    resolution.set_params(&rail_mv.to_le_bytes())?;
    sched.submit(&mut resolution)
}

/// Module B: eagerly binds to a [`PsuModule`]'s `RailApi` during its own
/// `init` (legal because `init` runs in registration order, so a `PsuModule`
/// registered earlier is already `Initialized`), then records the value it
/// read.
pub struct ConsumerModule {
    psu_module_id: Id,
    pub observed_rail_mv: Rc<RefCell<Option<u32>>>,
}

impl ConsumerModule {
    #[must_use]
    pub fn new(psu_module_id: Id, observed_rail_mv: Rc<RefCell<Option<u32>>>) -> Self {
        ConsumerModule { psu_module_id, observed_rail_mv }
    }
}

impl Module for ConsumerModule {
    fn name(&self) -> &'static str {
        "consumer"
    }

    fn init(
        &mut self,
        _module_id: Id,
        _element_count: usize,
        _data: &dyn Any,
        registry: &mut ModuleRegistry,
    ) -> FwkResult<()> {
        let handle = registry.bind(self.psu_module_id, self.psu_module_id.build_api(0))?;
        let rail = handle.downcast::<FixedRail>().ok_or(Status::HandlerError)?;
        *self.observed_rail_mv.borrow_mut() = Some(rail.rail_mv());
        Ok(())
    }
}

/// Event index a [`NotifierModule`] accepts: "fire your one declared
/// notification now".
pub const NOTIFIER_EVENT_FIRE: u16 = 0;
/// The one notification index a [`NotifierModule`] declares.
pub const NOTIFIER_NOTIFICATION_TICK: u16 = 0;

/// Module N: declares one notification and one event that triggers
/// publishing it. A real product would fire this from a timer ISR instead
/// of an explicit event; routing it through an event keeps the demo
/// deterministic for tests.
pub struct NotifierModule;

impl Module for NotifierModule {
    fn name(&self) -> &'static str {
        "notifier"
    }

    fn event_count(&self) -> usize {
        1
    }

    fn notification_count(&self) -> usize {
        1
    }

    fn has_process_event(&self) -> bool {
        true
    }

    fn init(&mut self, _module_id: Id, _element_count: usize, _data: &dyn Any, _registry: &mut ModuleRegistry) -> FwkResult<()> {
        Ok(())
    }

    fn process_event(
        &mut self,
        event: &EventRecord,
        response: &mut EventRecord,
        sink: &mut dyn NotificationSink,
    ) -> FwkResult<Outcome> {
        let notification_id = Id::notification(event.target_id.module_idx(), NOTIFIER_NOTIFICATION_TICK);
        let publish = EventRecord {
            is_notification: true,
            source_id: event.target_id,
            ..EventRecord::new(event.target_id, Id::NONE, notification_id)
        };
        let delivered = sink.notify(&publish)?;
        response.set_params(&(delivered as u32).to_le_bytes())?;
        Ok(Outcome::Complete)
    }
}

/// Module X/Y: subscribes, during its own `init`, to a [`NotifierModule`]'s
/// tick notification, and records every notification it is fanned out.
pub struct WatcherModule {
    notifier_module_id: Id,
    pub received: Rc<RefCell<Vec<Id>>>,
}

impl WatcherModule {
    #[must_use]
    pub fn new(notifier_module_id: Id, received: Rc<RefCell<Vec<Id>>>) -> Self {
        WatcherModule { notifier_module_id, received }
    }
}

impl Module for WatcherModule {
    fn name(&self) -> &'static str {
        "watcher"
    }

    fn has_process_notification(&self) -> bool {
        true
    }

    fn init(
        &mut self,
        module_id: Id,
        _element_count: usize,
        _data: &dyn Any,
        registry: &mut ModuleRegistry,
    ) -> FwkResult<()> {
        let notification_id = Id::notification(self.notifier_module_id.module_idx(), NOTIFIER_NOTIFICATION_TICK);
        registry.subscribe(notification_id, self.notifier_module_id, module_id)
    }

    fn process_notification(
        &mut self,
        event: &EventRecord,
        _response: &mut EventRecord,
        _sink: &mut dyn NotificationSink,
    ) -> FwkResult<Outcome> {
        self.received.borrow_mut().push(event.source_id);
        Ok(Outcome::Complete)
    }
}

/// Module used purely as a response sink in tests: declares one event (so
/// it has a valid address to be a request's `source_id`) and records every
/// `EventRecord` dispatched to it, in arrival order.
pub struct ResponseRecorderModule {
    pub received: Rc<RefCell<Vec<EventRecord>>>,
}

impl ResponseRecorderModule {
    #[must_use]
    pub fn new(received: Rc<RefCell<Vec<EventRecord>>>) -> Self {
        ResponseRecorderModule { received }
    }
}

impl Module for ResponseRecorderModule {
    fn name(&self) -> &'static str {
        "response-recorder"
    }

    fn event_count(&self) -> usize {
        1
    }

    fn has_process_event(&self) -> bool {
        true
    }

    fn init(&mut self, _module_id: Id, _element_count: usize, _data: &dyn Any, _registry: &mut ModuleRegistry) -> FwkResult<()> {
        Ok(())
    }

    fn process_event(
        &mut self,
        event: &EventRecord,
        _response: &mut EventRecord,
        _sink: &mut dyn NotificationSink,
    ) -> FwkResult<Outcome> {
        self.received.borrow_mut().push(*event);
        Ok(Outcome::Complete)
    }
}

/// Event index a [`FailingModule`] accepts.
pub const FAILING_EVENT_ANY: u16 = 0;

/// Module whose `process_event` always returns an error, used to exercise
/// response routing when the handler itself fails: a caller that requested
/// a response must still receive one rather than waiting on a reply that
/// was silently dropped alongside the handler's error.
pub struct FailingModule;

impl Module for FailingModule {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn event_count(&self) -> usize {
        1
    }

    fn has_process_event(&self) -> bool {
        true
    }

    fn init(&mut self, _module_id: Id, _element_count: usize, _data: &dyn Any, _registry: &mut ModuleRegistry) -> FwkResult<()> {
        Ok(())
    }

    fn process_event(
        &mut self,
        _event: &EventRecord,
        _response: &mut EventRecord,
        _sink: &mut dyn NotificationSink,
    ) -> FwkResult<Outcome> {
        Err(Status::HandlerError)
    }
}

/// Module used to probe ISR ingress ordering: declares one event, and
/// records the first parameter byte of each dispatched event — a caller-
/// assigned tag, not the pool-internal cookie — so a test can assert
/// intra-source FIFO ordering was preserved end to end.
pub struct OrderProbeModule {
    pub order: Rc<RefCell<Vec<u8>>>,
}

impl OrderProbeModule {
    #[must_use]
    pub fn new(order: Rc<RefCell<Vec<u8>>>) -> Self {
        OrderProbeModule { order }
    }
}

impl Module for OrderProbeModule {
    fn name(&self) -> &'static str {
        "order-probe"
    }

    fn event_count(&self) -> usize {
        1
    }

    fn has_process_event(&self) -> bool {
        true
    }

    fn init(&mut self, _module_id: Id, _element_count: usize, _data: &dyn Any, _registry: &mut ModuleRegistry) -> FwkResult<()> {
        Ok(())
    }

    fn process_event(
        &mut self,
        event: &EventRecord,
        _response: &mut EventRecord,
        _sink: &mut dyn NotificationSink,
    ) -> FwkResult<Outcome> {
        self.order.borrow_mut().push(event.params().first().copied().unwrap_or(0));
        Ok(Outcome::Complete)
    }
}
