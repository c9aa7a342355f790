//! Module descriptor: the `Module` trait and the static configuration a
//! product hands to the registry for each registered module.

use std::any::Any;
use std::rc::Rc;

use crate::fwk_id::Id;
use crate::fwk_notification::NotificationSink;
use crate::fwk_status::{FwkResult, Outcome, Status};
use crate::fwk_thread::EventRecord;

/// Broad classification of a module, carried for diagnostics only — the
/// framework does not branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleCategory {
    Driver,
    Hal,
    Protocol,
    Service,
}

/// A type-erased, reference-counted capability object handed out by the bind
/// broker. The requester downcasts it back to the concrete API trait it
/// expects. Acquired once during the `Bind` stage and held for the module's
/// lifetime — not a per-dispatch allocation.
#[derive(Clone)]
pub struct ApiHandle(Rc<dyn Any>);

impl ApiHandle {
    /// Wrap a concrete API object for handing across a bind request.
    pub fn new<T: 'static>(api: Rc<T>) -> Self {
        ApiHandle(api)
    }

    /// Attempt to recover the concrete API type the caller expects.
    #[must_use]
    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        self.0.clone().downcast::<T>().ok()
    }
}

/// One element's static shape, handed to the registry either up front
/// (`ElementsSource::Static`) or produced by a generator invoked during
/// `init` (`ElementsSource::Dynamic`).
pub struct ElementDescriptor {
    pub name: &'static str,
    pub sub_element_count: usize,
    pub data: Rc<dyn Any>,
}

impl ElementDescriptor {
    #[must_use]
    pub fn new(name: &'static str, sub_element_count: usize, data: Rc<dyn Any>) -> Self {
        ElementDescriptor {
            name,
            sub_element_count,
            data,
        }
    }
}

/// Where a module's element table comes from.
pub enum ElementsSource {
    /// The element count and per-element data are known before `init` runs.
    Static(Vec<ElementDescriptor>),
    /// The element table is produced by a generator invoked during `init`,
    /// after the module has seen its own module-level configuration data.
    Dynamic(Box<dyn Fn(Id) -> Vec<ElementDescriptor>>),
}

/// Static, per-module configuration handed to the registry at registration
/// time. Assembled by hand in product/test code — the crate itself never
/// reads a file or an environment variable to build one.
pub struct ModuleConfig {
    pub data: Rc<dyn Any>,
    pub elements: ElementsSource,
}

impl ModuleConfig {
    #[must_use]
    pub fn new(data: Rc<dyn Any>, elements: ElementsSource) -> Self {
        ModuleConfig { data, elements }
    }

    /// A module with no elements and no module-level configuration data.
    #[must_use]
    pub fn none() -> Self {
        ModuleConfig {
            data: Rc::new(()),
            elements: ElementsSource::Static(Vec::new()),
        }
    }
}

/// The contract every hosted module implements. One trait covering every
/// lifecycle callback, rather than a C-style table of optional function
/// pointers — modules self-report which optional callbacks they implement
/// through the `has_*` predicates, and the registry validates the
/// descriptor consistency rules from those predicates before ever calling
/// them.
///
/// Callbacks that run during `Initialize`/`Bind` (`init`, `element_init`,
/// `post_init`, `bind`) take a `&mut ModuleRegistry` and must not submit
/// events. Callbacks that run during `Start`/`Run`/`Stop` (`start`, `stop`,
/// `process_event`, `process_notification`) take a `&mut dyn
/// NotificationSink` instead and may submit events, and subscribe to or
/// publish notifications, freely. The two capabilities are never both
/// available in the same callback: encoding it in the parameter list rather
/// than in a comment makes violating it a compile error instead of a
/// review miss.
pub trait Module: Any {
    /// Human-readable name, used in logs and debug output only.
    fn name(&self) -> &'static str;

    fn category(&self) -> ModuleCategory {
        ModuleCategory::Service
    }

    /// Number of distinct event kinds this module defines.
    fn event_count(&self) -> usize {
        0
    }

    /// Number of distinct notification kinds this module defines.
    fn notification_count(&self) -> usize {
        0
    }

    /// Number of distinct APIs this module exposes through the bind broker.
    fn api_count(&self) -> usize {
        0
    }

    fn has_process_bind_request(&self) -> bool {
        false
    }

    fn has_element_init(&self) -> bool {
        false
    }

    fn has_process_event(&self) -> bool {
        false
    }

    fn has_process_notification(&self) -> bool {
        false
    }

    /// Called once per module during the `Initialize` stage, before any
    /// element is initialized. `data` is the module's configuration data
    /// from [`ModuleConfig::data`]. May perform an eager bind (via
    /// `registry.bind`) against another module that is already
    /// `Initialized`, but must not submit events.
    fn init(
        &mut self,
        module_id: Id,
        element_count: usize,
        data: &dyn Any,
        registry: &mut super::ModuleRegistry,
    ) -> FwkResult<()>;

    /// Called once per element, after the owning module's `init` returns.
    fn element_init(
        &mut self,
        element_id: Id,
        sub_element_count: usize,
        data: &dyn Any,
        registry: &mut super::ModuleRegistry,
    ) -> FwkResult<()> {
        let _ = (element_id, sub_element_count, data, registry);
        Ok(())
    }

    /// Called once per module after every one of its elements has been
    /// initialized.
    fn post_init(&mut self, module_id: Id, registry: &mut super::ModuleRegistry) -> FwkResult<()> {
        let _ = (module_id, registry);
        Ok(())
    }

    /// Called once per bind round for the module itself, and again for each
    /// of its elements. `id` is the module id on the module-level call and
    /// the element id on the element-level call.
    fn bind(&mut self, id: Id, round: u8, registry: &mut super::ModuleRegistry) -> FwkResult<()> {
        let _ = (id, round, registry);
        Ok(())
    }

    /// Handle an incoming bind request for one of this module's APIs.
    /// `requester` is the id that is currently being bound (the module or
    /// element whose `bind` callback is on the call stack), `target` is the
    /// id the request was addressed to.
    fn process_bind_request(
        &mut self,
        requester: Id,
        target: Id,
        api_id: Id,
    ) -> FwkResult<ApiHandle> {
        let _ = (requester, target, api_id);
        Err(Status::HandlerError)
    }

    /// Called once per module, then once per element, after binding
    /// completes. The event scheduler is live; the module may submit
    /// events, and may subscribe to or publish notifications.
    fn start(&mut self, id: Id, sink: &mut dyn NotificationSink) -> FwkResult<()> {
        let _ = (id, sink);
        Ok(())
    }

    /// Called once per module, then once per element, during shutdown.
    fn stop(&mut self, id: Id, sink: &mut dyn NotificationSink) -> FwkResult<()> {
        let _ = (id, sink);
        Ok(())
    }

    /// Handle a dispatched event addressed to this module or one of its
    /// elements. Write a response into `response` if
    /// `event.response_requested`; return `Outcome::Pending` if the
    /// eventual result will arrive later as a delayed response.
    fn process_event(
        &mut self,
        event: &EventRecord,
        response: &mut EventRecord,
        sink: &mut dyn NotificationSink,
    ) -> FwkResult<Outcome> {
        let _ = (event, response, sink);
        Ok(Outcome::Complete)
    }

    /// Handle a dispatched notification fan-out record.
    fn process_notification(
        &mut self,
        event: &EventRecord,
        response: &mut EventRecord,
        sink: &mut dyn NotificationSink,
    ) -> FwkResult<Outcome> {
        let _ = (event, response, sink);
        Ok(Outcome::Complete)
    }
}

/// Placeholder left in the registry's module slot while the real module is
/// temporarily taken out to call one of its own callbacks. Any call into it
/// indicates a reentrancy bug (a module binding or dispatching to itself
/// while its own callback is already on the stack) and is reported as
/// `StateError` rather than panicking.
pub(super) struct TakenModule;

impl Module for TakenModule {
    fn name(&self) -> &'static str {
        "<taken>"
    }

    fn init(
        &mut self,
        _module_id: Id,
        _element_count: usize,
        _data: &dyn Any,
        _registry: &mut super::ModuleRegistry,
    ) -> FwkResult<()> {
        Err(Status::StateError)
    }

    fn process_bind_request(
        &mut self,
        _requester: Id,
        _target: Id,
        _api_id: Id,
    ) -> FwkResult<ApiHandle> {
        Err(Status::StateError)
    }
}
