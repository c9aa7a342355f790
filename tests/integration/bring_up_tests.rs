//! Scenario: two modules bring up together, one eagerly binding to the
//! other's API during its own `init`, and both end up `Started`.

use std::cell::RefCell;
use std::rc::Rc;

use scp_fwk_core::fwk_module::{ElementsSource, EntityState, ModuleConfig};
use scp_fwk_core::Runtime;

use crate::demos::{ConsumerModule, PsuConfig, PsuModule};

#[test]
fn eager_bind_during_init_succeeds_and_both_modules_reach_started() {
    let mut runtime = Runtime::<64>::new(1).unwrap();

    let pending = Rc::new(RefCell::new(None));
    let psu_config = ModuleConfig::new(Rc::new(PsuConfig { rail_mv: 3300, defer_response: false }), ElementsSource::Static(Vec::new()));
    let psu_id = runtime.registry.register(Box::new(PsuModule::new(pending)), psu_config).unwrap();

    let observed = Rc::new(RefCell::new(None));
    let consumer_id = runtime
        .registry
        .register(Box::new(ConsumerModule::new(psu_id, observed.clone())), ModuleConfig::none())
        .unwrap();

    runtime.start_all().unwrap();

    assert_eq!(*observed.borrow(), Some(3300));
    assert_eq!(runtime.registry.state_of(psu_id).unwrap(), EntityState::Started);
    assert_eq!(runtime.registry.state_of(consumer_id).unwrap(), EntityState::Started);
}
