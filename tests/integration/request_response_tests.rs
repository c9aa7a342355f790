//! Scenario: a synchronous request/response round trip through
//! `submit_and_wait`, with the reply's cookie matching the request.

use std::cell::RefCell;
use std::rc::Rc;

use scp_fwk_core::fwk_id::Id;
use scp_fwk_core::fwk_module::{ElementsSource, ModuleConfig};
use scp_fwk_core::fwk_thread::EventRecord;
use scp_fwk_core::Runtime;

use crate::demos::{FailingModule, PsuConfig, PsuModule, FAILING_EVENT_ANY, PSU_EVENT_MEASURE};

#[test]
fn synchronous_measurement_request_returns_the_rail_voltage() {
    let mut runtime = Runtime::<64>::new(1).unwrap();

    let pending = Rc::new(RefCell::new(None));
    let psu_config =
        ModuleConfig::new(Rc::new(PsuConfig { rail_mv: 5000, defer_response: false }), ElementsSource::Static(Vec::new()));
    let psu_id = runtime.registry.register(Box::new(PsuModule::new(pending)), psu_config).unwrap();
    runtime.start_all().unwrap();

    let request = EventRecord::new(Id::NONE, psu_id, Id::event(psu_id.module_idx(), PSU_EVENT_MEASURE));
    let response = runtime.submit_and_wait(request).unwrap();

    assert!(response.is_response);
    let rail_mv = u32::from_le_bytes(response.params().try_into().unwrap());
    assert_eq!(rail_mv, 5000);
}

#[test]
fn a_handler_error_does_not_swallow_its_requested_response() {
    let mut runtime = Runtime::<64>::new(1).unwrap();

    let failing_id = runtime.registry.register(Box::new(FailingModule), ModuleConfig::none()).unwrap();
    runtime.start_all().unwrap();

    let request = EventRecord::new(Id::NONE, failing_id, Id::event(failing_id.module_idx(), FAILING_EVENT_ANY));
    let response = runtime.submit_and_wait(request).unwrap();

    assert!(response.is_response, "a response_requested caller must still get a reply when the handler errors");
}
