//! Runtime: owns the module registry and the event scheduler together, and
//! drives the dispatch loop that connects them. Kept as two sibling fields
//! of one struct, rather than behind a shared-ownership cell, so the
//! dispatch loop can borrow a target module (via the registry) and the
//! scheduler at the same time through ordinary field-level borrow
//! splitting.

use crate::fwk_module::ModuleRegistry;
use crate::fwk_status::{FwkResult, Status};
use crate::fwk_thread::EventScheduler;

/// The two process-wide singletons a product assembles once at start-up: the
/// module registry (which also owns the notification bus — see
/// [`ModuleRegistry::subscribe`]) and the event scheduler.
pub struct Runtime<const CAP: usize> {
    pub registry: ModuleRegistry,
    pub scheduler: EventScheduler<CAP>,
}

impl<const CAP: usize> Runtime<CAP> {
    #[must_use]
    pub fn new(bind_rounds: u8) -> FwkResult<Self> {
        Ok(Runtime {
            registry: ModuleRegistry::new(bind_rounds)?,
            scheduler: EventScheduler::new(),
        })
    }

    /// Run the `Initialize -> Bind -> Start` bring-up sequence.
    pub fn start_all(&mut self) -> FwkResult<()> {
        self.registry.start_all(&mut self.scheduler)
    }

    /// Run every module's `stop` callback in reverse registration order.
    pub fn stop_all(&mut self) {
        self.registry.stop_all(&mut self.scheduler);
    }

    /// Dispatch exactly one event if the task FIFO has one ready,
    /// otherwise move one record from the ISR FIFO to the task FIFO.
    /// Returns whether any work happened, so callers can loop until idle.
    pub fn dispatch_one(&mut self) -> bool {
        match self.scheduler.pop_task() {
            Some(slot) => {
                self.dispatch_slot(slot);
                true
            }
            None => self.scheduler.drain_isr_into_task(),
        }
    }

    /// Dispatch events until both FIFOs are empty.
    pub fn run_until_idle(&mut self) {
        while self.dispatch_one() {}
    }

    /// Submit `request` and block the caller (by nested-dispatching other
    /// events) until its response arrives. Refuses to nest: only one
    /// `submit_and_wait` may be outstanding on the call stack at a time.
    pub fn submit_and_wait(
        &mut self,
        mut request: crate::fwk_thread::EventRecord,
    ) -> FwkResult<crate::fwk_thread::EventRecord> {
        if self.scheduler.wait_in_progress() {
            return Err(Status::BusyError);
        }

        request.response_requested = true;
        let saved_current = self.scheduler.current();
        self.scheduler.set_wait_in_progress(true);
        let result = self.scheduler.submit(&mut request).and_then(|()| {
            let awaited_cookie = request.cookie;
            self.run_nested_until(awaited_cookie)
        });
        self.scheduler.set_wait_in_progress(false);
        self.scheduler.set_current(saved_current);
        result
    }

    /// Dispatch events normally until the one carrying `awaited_cookie` as
    /// an `is_response` record pops off the task FIFO, at which point it is
    /// captured directly rather than handed to a handler (it is addressed
    /// to the caller of `submit_and_wait`, which is the stack frame
    /// currently running, not a registered module).
    fn run_nested_until(&mut self, awaited_cookie: u32) -> FwkResult<crate::fwk_thread::EventRecord> {
        loop {
            let Some(slot) = self.scheduler.pop_task() else {
                if !self.scheduler.drain_isr_into_task() {
                    log::warn!("fwk_thread: submit_and_wait starved waiting for cookie {awaited_cookie}");
                    return Err(Status::TimeoutError);
                }
                continue;
            };

            let event = self.scheduler.record(slot);
            if event.is_response && event.cookie == awaited_cookie {
                self.scheduler.free_slot(slot);
                return Ok(event);
            }

            self.dispatch_slot(slot);
        }
    }

    /// Invoke the target module's handler for the record at `slot`, then
    /// route any response it produced (submit it immediately, or park it
    /// if the handler asked for a delayed response), and finally free the
    /// request's own slot.
    fn dispatch_slot(&mut self, slot: usize) {
        let event = self.scheduler.record(slot);
        self.scheduler.set_current(Some(slot));

        let target_idx = event.target_id.module_idx() as usize;
        if target_idx >= self.registry.module_count() {
            log::warn!("fwk_thread: dropping event addressed to unknown module {:?}", event.target_id);
            self.scheduler.set_current(None);
            self.scheduler.free_slot(slot);
            return;
        }

        let mut response = crate::fwk_thread::response_shell(&event);
        let outcome = self.registry.dispatch(target_idx, &event, &mut response, &mut self.scheduler);

        if let Err(status) = outcome {
            log::warn!("fwk_thread: handler for {:?} returned {status}", event.target_id);
        }

        // A requested response is owed to the caller whether or not the
        // handler itself succeeded; only the handler's own failure is
        // logged above, never swallowed along with its reply.
        if event.response_requested {
            let routed = if response.is_delayed_response {
                self.scheduler.park(response)
            } else {
                self.scheduler.submit(&mut response).map(|()| ())
            };
            if let Err(status) = routed {
                log::warn!("fwk_thread: could not route response to {:?}: {status}", response.target_id);
            }
        }

        self.scheduler.set_current(None);
        self.scheduler.free_slot(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fwk_id::Id;
    use crate::fwk_thread::EventRecord;

    /// A `submit_and_wait` already in progress on the call stack must
    /// refuse a second one rather than silently nesting — reentrant waits
    /// cannot be told apart by cookie alone once more than one is parked.
    #[test]
    fn nested_submit_and_wait_is_refused() {
        let mut runtime = Runtime::<8>::new(1).unwrap();
        runtime.scheduler.set_wait_in_progress(true);

        let request = EventRecord::new(Id::NONE, Id::module(0), Id::event(0, 0));
        assert_eq!(runtime.submit_and_wait(request), Err(Status::BusyError));
    }
}
