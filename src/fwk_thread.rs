//! Event scheduler: a fixed-capacity pool of event records, a task-context
//! FIFO, an ISR-context FIFO, and the delayed-response parking used by
//! `submit_and_wait`. No heap allocation happens after construction — every
//! queue is a `heapless` fixed-capacity structure over pool slot indices,
//! never over the records themselves.
//!
//! A lock-free SPSC ring (ISR producer, task consumer, atomics for
//! head/tail) generalized from a fixed `Event` enum pushed by value to a
//! pool of `EventRecord`s addressed by index, so a free list and a
//! delayed-response parking list can both be layered on top of it.

use crate::fwk_id::Id;
use crate::fwk_status::{FwkResult, Status};

/// Size of an event record's inline parameter buffer. Large enough for the
/// widest payload any hosted module in this workspace needs to pass by
/// value; a product with larger payloads would raise this constant, not
/// switch to heap allocation.
pub const EVENT_PARAMS_CAP: usize = 32;

/// A single event or notification record. `Copy` so the scheduler can move
/// it between a pool slot and a caller's stack without touching the heap.
#[derive(Clone, Copy)]
pub struct EventRecord {
    pub source_id: Id,
    pub target_id: Id,
    pub id: Id,
    pub is_notification: bool,
    pub is_response: bool,
    pub response_requested: bool,
    pub is_delayed_response: bool,
    pub cookie: u32,
    params: [u8; EVENT_PARAMS_CAP],
    params_len: usize,
}

impl Default for EventRecord {
    fn default() -> Self {
        EventRecord {
            source_id: Id::NONE,
            target_id: Id::NONE,
            id: Id::NONE,
            is_notification: false,
            is_response: false,
            response_requested: false,
            is_delayed_response: false,
            cookie: 0,
            params: [0; EVENT_PARAMS_CAP],
            params_len: 0,
        }
    }
}

impl EventRecord {
    #[must_use]
    pub fn new(source_id: Id, target_id: Id, id: Id) -> Self {
        EventRecord {
            source_id,
            target_id,
            id,
            ..EventRecord::default()
        }
    }

    /// Copy `bytes` into the record's inline parameter buffer.
    pub fn set_params(&mut self, bytes: &[u8]) -> FwkResult<()> {
        if bytes.len() > EVENT_PARAMS_CAP {
            return Err(Status::ParamError);
        }
        self.params[..bytes.len()].copy_from_slice(bytes);
        self.params_len = bytes.len();
        Ok(())
    }

    #[must_use]
    pub fn params(&self) -> &[u8] {
        &self.params[..self.params_len]
    }

}

/// Build the response shell the scheduler pre-fills before handing a
/// dispatched event to its target's handler: addressed back at the
/// original sender, carrying the same cookie, not yet a delayed response.
#[must_use]
pub(crate) fn response_shell(request: &EventRecord) -> EventRecord {
    EventRecord {
        source_id: request.target_id,
        target_id: request.source_id,
        id: request.id,
        is_notification: false,
        is_response: true,
        response_requested: false,
        is_delayed_response: false,
        cookie: request.cookie,
        params: [0; EVENT_PARAMS_CAP],
        params_len: 0,
    }
}

/// A reduced event, without a parameter payload, for the common case of
/// "fire this and move on" submissions. Widened into a full [`EventRecord`]
/// once it reaches a pool slot.
pub struct LightEvent {
    pub source_id: Id,
    pub target_id: Id,
    pub id: Id,
    pub is_notification: bool,
    pub response_requested: bool,
}

impl From<LightEvent> for EventRecord {
    fn from(light: LightEvent) -> Self {
        EventRecord {
            source_id: light.source_id,
            target_id: light.target_id,
            id: light.id,
            is_notification: light.is_notification,
            response_requested: light.response_requested,
            ..EventRecord::default()
        }
    }
}

/// The event pool plus its task/ISR FIFOs and delayed-response parking
/// list. `CAP` is the pool's fixed capacity, chosen by the product
/// integrator; a reasonable floor is the declared notification fan-out
/// plus 64 in-flight records, but that sizing decision belongs to the
/// product, not the core.
pub struct EventScheduler<const CAP: usize> {
    pool: [EventRecord; CAP],
    free: heapless::Vec<usize, CAP>,
    task_queue: heapless::Deque<usize, CAP>,
    isr_queue: heapless::Deque<usize, CAP>,
    delayed: heapless::Vec<((Id, u32), usize), CAP>,
    current: Option<usize>,
    next_cookie: u32,
    wait_in_progress: bool,
}

impl<const CAP: usize> EventScheduler<CAP> {
    #[must_use]
    pub fn new() -> Self {
        let mut free = heapless::Vec::new();
        for slot in (0..CAP).rev() {
            // Unwrap is safe: `free`'s capacity is exactly `CAP`.
            free.push(slot).ok();
        }
        EventScheduler {
            pool: [EventRecord::default(); CAP],
            free,
            task_queue: heapless::Deque::new(),
            isr_queue: heapless::Deque::new(),
            delayed: heapless::Vec::new(),
            current: None,
            next_cookie: 1,
            wait_in_progress: false,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        CAP
    }

    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    #[must_use]
    pub(crate) fn wait_in_progress(&self) -> bool {
        self.wait_in_progress
    }

    pub(crate) fn set_wait_in_progress(&mut self, value: bool) {
        self.wait_in_progress = value;
    }

    #[must_use]
    pub(crate) fn current(&self) -> Option<usize> {
        self.current
    }

    pub(crate) fn set_current(&mut self, slot: Option<usize>) {
        self.current = slot;
    }

    pub(crate) fn record(&self, slot: usize) -> EventRecord {
        self.pool[slot]
    }

    pub(crate) fn free_slot(&mut self, slot: usize) {
        self.pool[slot] = EventRecord::default();
        // Unwrap is safe: a slot can only be freed after being allocated
        // from this same free list, so capacity can never be exceeded.
        self.free.push(slot).ok();
    }

    fn alloc_cookie(&mut self) -> u32 {
        let cookie = self.next_cookie;
        self.next_cookie = self.next_cookie.wrapping_add(1);
        if self.next_cookie == 0 {
            self.next_cookie = 1;
        }
        cookie
    }

    /// Submit an event from task context. Stamps a fresh cookie into
    /// `event` unless it is itself a response (which keeps its request's
    /// cookie) or a delayed-response resolution (handled below). If
    /// `event.source_id` is undefined, it is auto-stamped from the
    /// currently dispatching event's target id.
    pub fn submit(&mut self, event: &mut EventRecord) -> FwkResult<()> {
        if !event.source_id.is_defined() {
            if let Some(slot) = self.current {
                event.source_id = self.pool[slot].target_id;
            }
        }

        if event.is_delayed_response {
            return self.resolve_delayed(event);
        }

        if !event.is_response {
            event.cookie = self.alloc_cookie();
        }

        let slot = self.free.pop().ok_or(Status::NoMemError)?;
        self.pool[slot] = *event;
        self.task_queue.push_back(slot).map_err(|_| {
            self.free.push(slot).ok();
            Status::NoMemError
        })?;
        Ok(())
    }

    /// Submit a parameter-less event; returns the cookie assigned to it.
    pub fn submit_light(&mut self, light: LightEvent) -> FwkResult<u32> {
        let mut event = EventRecord::from(light);
        self.submit(&mut event)?;
        Ok(event.cookie)
    }

    /// Submit from interrupt context. Only ever touches the pool and the
    /// ISR FIFO, masked by a critical section — never the task FIFO or the
    /// delayed-response list, which belong exclusively to task context.
    pub fn submit_from_isr(&mut self, mut event: EventRecord) -> FwkResult<()> {
        if event.is_delayed_response {
            return Err(Status::ParamError);
        }
        if !event.is_response {
            event.cookie = self.alloc_cookie();
        }
        critical_section::with(|_| {
            let slot = self.free.pop().ok_or(Status::NoMemError)?;
            self.pool[slot] = event;
            self.isr_queue.push_back(slot).map_err(|_| {
                self.free.push(slot).ok();
                Status::NoMemError
            })
        })
    }

    /// Move one record from the ISR FIFO onto the task FIFO, under a
    /// critical section for the ISR-side pop only. Returns whether a
    /// record moved.
    pub fn drain_isr_into_task(&mut self) -> bool {
        let moved = critical_section::with(|_| self.isr_queue.pop_front());
        match moved {
            Some(slot) => {
                // Task FIFO capacity equals pool capacity, so this can only
                // fail if the bookkeeping above is broken.
                self.task_queue.push_back(slot).ok();
                true
            }
            None => false,
        }
    }

    pub(crate) fn pop_task(&mut self) -> Option<usize> {
        self.task_queue.pop_front()
    }

    /// Park a constructed response record awaiting a later
    /// `is_delayed_response` resolution, keyed by its `(source_id, cookie)`.
    pub(crate) fn park(&mut self, record: EventRecord) -> FwkResult<()> {
        let slot = self.free.pop().ok_or(Status::NoMemError)?;
        self.pool[slot] = record;
        self.delayed
            .push(((record.source_id, record.cookie), slot))
            .map_err(|_| {
                self.free.push(slot).ok();
                Status::NoMemError
            })
    }

    fn resolve_delayed(&mut self, event: &EventRecord) -> FwkResult<()> {
        let key = (event.source_id, event.cookie);
        let position = self.delayed.iter().position(|(k, _)| *k == key);
        let Some(position) = position else {
            return Err(Status::ParamError);
        };
        let (_, slot) = self.delayed.swap_remove(position);
        self.pool[slot].set_params(event.params())?;
        self.task_queue.push_back(slot).map_err(|_| Status::NoMemError)?;
        Ok(())
    }

}

impl<const CAP: usize> Default for EventScheduler<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

/// Object-safe submission capability, independent of a scheduler's pool
/// capacity. The `Module` trait's `start`/`stop`/`process_event`/
/// `process_notification` callbacks take `&mut dyn EventSink` rather than a
/// concrete `EventScheduler<CAP>` so that hosted modules (and the `Module`
/// trait itself) never need to be generic over pool size — only the
/// top-level [`crate::Runtime`] that owns the concrete scheduler does.
pub trait EventSink {
    fn submit(&mut self, event: &mut EventRecord) -> FwkResult<()>;
    fn submit_light(&mut self, light: LightEvent) -> FwkResult<u32>;
}

impl<const CAP: usize> EventSink for EventScheduler<CAP> {
    fn submit(&mut self, event: &mut EventRecord) -> FwkResult<()> {
        EventScheduler::submit(self, event)
    }

    fn submit_light(&mut self, light: LightEvent) -> FwkResult<u32> {
        EventScheduler::submit_light(self, light)
    }
}

/// ISR ingress: the fixed, small surface permitted from interrupt context.
///
/// A platform interrupt is registered, once, to a target id during task
/// context bring-up; the ISR itself (outside this crate, in
/// platform-specific code) builds an [`EventRecord`] and calls
/// [`isr::IsrTable::fire`], which is the *only* framework entry point
/// callable from interrupt context. `fire` masks global interrupts for the
/// minimal window needed to pop a pool slot and push it to the ISR FIFO; it
/// never touches the task FIFO, delayed-response lists, subscription lists,
/// or module state.
pub mod isr {
    use super::{EventRecord, EventScheduler};
    use crate::fwk_id::Id;
    use crate::fwk_status::{FwkResult, Status};

    /// One platform interrupt's registered target.
    struct IsrBinding {
        interrupt_id: u32,
        target: Id,
    }

    /// Fixed-capacity table mapping platform interrupt ids to the module (or
    /// element) that should receive them. Built once, from task context,
    /// during bring-up.
    pub struct IsrTable<const N: usize> {
        bindings: heapless::Vec<IsrBinding, N>,
    }

    impl<const N: usize> IsrTable<N> {
        #[must_use]
        pub fn new() -> Self {
            IsrTable { bindings: heapless::Vec::new() }
        }

        /// Register the target for `interrupt_id`. Task-context only;
        /// rejects a duplicate registration of the same interrupt id.
        pub fn register(&mut self, interrupt_id: u32, target: Id) -> FwkResult<()> {
            if self.bindings.iter().any(|b| b.interrupt_id == interrupt_id) {
                return Err(Status::ParamError);
            }
            self.bindings
                .push(IsrBinding { interrupt_id, target })
                .map_err(|_| Status::NoMemError)
        }

        #[must_use]
        pub fn target_of(&self, interrupt_id: u32) -> Option<Id> {
            self.bindings.iter().find(|b| b.interrupt_id == interrupt_id).map(|b| b.target)
        }

        /// The sole entry point callable from interrupt context: look up
        /// `interrupt_id`'s registered target, address `event` to it, and
        /// submit it onto the ISR FIFO under a critical section.
        pub fn fire<const CAP: usize>(
            &self,
            interrupt_id: u32,
            mut event: EventRecord,
            scheduler: &mut EventScheduler<CAP>,
        ) -> FwkResult<()> {
            let target = self.target_of(interrupt_id).ok_or(Status::ParamError)?;
            event.target_id = target;
            scheduler.submit_from_isr(event)
        }
    }

    impl<const N: usize> Default for IsrTable<N> {
        fn default() -> Self {
            Self::new()
        }
    }

}
