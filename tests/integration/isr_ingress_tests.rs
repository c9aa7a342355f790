//! Scenario: events submitted from interrupt context preserve their
//! relative order once drained, events submitted from task context
//! preserve theirs, and the two streams interleave only at drain points:
//! a task-context event already queued dispatches before any ISR record
//! that has not yet been drained, no matter the order the ISR records were
//! fired in relative to it.

use std::cell::RefCell;
use std::rc::Rc;

use scp_fwk_core::fwk_id::Id;
use scp_fwk_core::fwk_module::ModuleConfig;
use scp_fwk_core::fwk_thread::isr::IsrTable;
use scp_fwk_core::fwk_thread::EventRecord;
use scp_fwk_core::Runtime;

use crate::demos::OrderProbeModule;

#[test]
fn isr_and_task_submissions_each_preserve_their_own_order() {
    let mut runtime = Runtime::<64>::new(1).unwrap();

    let order = Rc::new(RefCell::new(Vec::new()));
    let probe_id = runtime.registry.register(Box::new(OrderProbeModule::new(order.clone())), ModuleConfig::none()).unwrap();
    runtime.start_all().unwrap();

    let mut isr_table = IsrTable::<4>::new();
    isr_table.register(7, probe_id).unwrap();

    // Two ISR-context submissions (tagged 1 and 3), interleaved with one
    // task-context submission (tagged 2) in between, before anything is
    // drained.
    let mut isr_event_a = EventRecord::new(Id::NONE, Id::NONE, Id::event(probe_id.module_idx(), 0));
    isr_event_a.set_params(&[1]).unwrap();
    isr_table.fire(7, isr_event_a, &mut runtime.scheduler).unwrap();

    let mut task_event = EventRecord::new(Id::NONE, probe_id, Id::event(probe_id.module_idx(), 0));
    task_event.set_params(&[2]).unwrap();
    runtime.scheduler.submit(&mut task_event).unwrap();

    let mut isr_event_b = EventRecord::new(Id::NONE, Id::NONE, Id::event(probe_id.module_idx(), 0));
    isr_event_b.set_params(&[3]).unwrap();
    isr_table.fire(7, isr_event_b, &mut runtime.scheduler).unwrap();

    runtime.run_until_idle();

    // The task-context event was already on the task FIFO before either
    // ISR record got drained onto it, so it dispatches first; the two ISR
    // records then drain and dispatch in the order they were fired.
    assert_eq!(*order.borrow(), vec![2, 1, 3]);
}
