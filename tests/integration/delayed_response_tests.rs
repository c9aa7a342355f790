//! Scenario: a handler defers its response; a later, unrelated submission
//! resolves it by matching `(source_id, cookie)`, and the waiter receives
//! exactly one response with no duplicate delivery.

use std::cell::RefCell;
use std::rc::Rc;

use scp_fwk_core::fwk_id::Id;
use scp_fwk_core::fwk_module::{ElementsSource, ModuleConfig};
use scp_fwk_core::fwk_status::Status;
use scp_fwk_core::fwk_thread::EventRecord;
use scp_fwk_core::Runtime;

use crate::demos::{resolve_psu_measurement, PsuConfig, PsuModule, ResponseRecorderModule, PSU_EVENT_MEASURE};

#[test]
fn deferred_measurement_resolves_exactly_once() {
    let mut runtime = Runtime::<64>::new(1).unwrap();

    let pending = Rc::new(RefCell::new(None));
    let psu_config = ModuleConfig::new(
        Rc::new(PsuConfig { rail_mv: 1800, defer_response: true }),
        ElementsSource::Static(Vec::new()),
    );
    let psu_id = runtime.registry.register(Box::new(PsuModule::new(pending.clone())), psu_config).unwrap();

    let received = Rc::new(RefCell::new(Vec::new()));
    let recorder_id =
        runtime.registry.register(Box::new(ResponseRecorderModule::new(received.clone())), ModuleConfig::none()).unwrap();

    runtime.start_all().unwrap();

    let mut request = EventRecord::new(recorder_id, psu_id, Id::event(psu_id.module_idx(), PSU_EVENT_MEASURE));
    request.response_requested = true;
    runtime.scheduler.submit(&mut request).unwrap();
    runtime.run_until_idle();

    assert!(received.borrow().is_empty(), "response must not arrive before the deferred measurement resolves");
    let cookie = pending.borrow_mut().take().expect("psu module should have parked a cookie");

    resolve_psu_measurement(psu_id, cookie, 1800, &mut runtime.scheduler).unwrap();
    runtime.run_until_idle();

    let seen = received.borrow();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].is_response);
    assert_eq!(u32::from_le_bytes(seen[0].params().try_into().unwrap()), 1800);
    drop(seen);

    assert_eq!(resolve_psu_measurement(psu_id, cookie, 1800, &mut runtime.scheduler), Err(Status::ParamError));
    runtime.run_until_idle();
    assert_eq!(received.borrow().len(), 1, "resolving an already-resolved cookie must not deliver a duplicate");
}
