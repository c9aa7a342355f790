//! Module registry: owns every registered module's instance and runtime
//! state, drives the `Initialize -> Bind -> Start` bring-up sequence and the
//! `Stop` shutdown sequence, and hosts the bind broker.

use std::any::Any;
use std::rc::Rc;

use crate::fwk_id::{Id, IdKind};
use crate::fwk_notification::{NotificationBus, NotificationSink};
use crate::fwk_status::{FwkResult, Outcome, Status};
use crate::fwk_thread::{EventRecord, EventSink, LightEvent};

use super::context::{ElementContext, EntityState, ModuleContext};
use super::descriptor::{ApiHandle, ElementDescriptor, ElementsSource, Module, ModuleConfig, TakenModule};

/// Pairs the live event scheduler (owned by the caller, handed in per
/// dispatch) with the registry's own notification bus so a module callback
/// sees one capability object instead of two. Never stored — built fresh on
/// the stack for the duration of a single callback invocation.
struct CombinedSink<'a> {
    sink: &'a mut dyn EventSink,
    bus: &'a mut NotificationBus,
}

impl EventSink for CombinedSink<'_> {
    fn submit(&mut self, event: &mut EventRecord) -> FwkResult<()> {
        self.sink.submit(event)
    }

    fn submit_light(&mut self, light: LightEvent) -> FwkResult<u32> {
        self.sink.submit_light(light)
    }
}

impl NotificationSink for CombinedSink<'_> {
    fn subscribe(&mut self, notification_id: Id, source_id: Id, subscriber_id: Id) -> FwkResult<()> {
        self.bus.subscribe(notification_id, source_id, subscriber_id)
    }

    fn unsubscribe(&mut self, notification_id: Id, source_id: Id, subscriber_id: Id) {
        self.bus.unsubscribe(notification_id, source_id, subscriber_id);
    }

    fn notify(&mut self, event: &EventRecord) -> FwkResult<usize> {
        self.bus.publish(self.sink, event)
    }
}

/// Which bring-up/shutdown stage the registry is currently driving. The bind
/// broker consults this to decide whether a bind request is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initialize,
    Bind,
    Start,
    Run,
    Stop,
}

/// Owns every registered module, keyed by registration order (the module's
/// index). Registration must complete before [`ModuleRegistry::start_all`]
/// runs; no module can be added afterwards.
pub struct ModuleRegistry {
    initialized: bool,
    modules: Vec<Box<dyn Module>>,
    configs: Vec<ModuleConfig>,
    contexts: Vec<ModuleContext>,
    stage: Stage,
    binding_subject: Id,
    bind_rounds: u8,
    notifications: NotificationBus,
}

impl ModuleRegistry {
    /// Build an empty registry. `bind_rounds` controls how many times
    /// [`ModuleRegistry::start_all`] invokes every module's `bind` callback
    /// before moving on to `Start` — most products need only one round, but
    /// a module that must observe a peer's bindings before requesting its
    /// own (a "late binder") needs at least two. Rejects `0`.
    pub fn new(bind_rounds: u8) -> FwkResult<Self> {
        if bind_rounds == 0 {
            return Err(Status::ParamError);
        }
        Ok(ModuleRegistry {
            initialized: false,
            modules: Vec::new(),
            configs: Vec::new(),
            contexts: Vec::new(),
            stage: Stage::Initialize,
            binding_subject: Id::NONE,
            bind_rounds,
            notifications: NotificationBus::new(),
        })
    }

    /// Subscribe `subscriber_id` to notifications of kind `notification_id`
    /// raised by `source_id`. Callable from `init`/`bind`/`post_init` (which
    /// only ever see `&mut ModuleRegistry`) as well as from `start`/
    /// `process_event`/`process_notification` (via the `NotificationSink`
    /// handed to those callbacks).
    pub fn subscribe(&mut self, notification_id: Id, source_id: Id, subscriber_id: Id) -> FwkResult<()> {
        if !self.is_valid_id(notification_id) || !self.is_valid_id(source_id) || !self.is_valid_id(subscriber_id) {
            return Err(Status::ParamError);
        }
        self.notifications.subscribe(notification_id, source_id, subscriber_id)
    }

    pub fn unsubscribe(&mut self, notification_id: Id, source_id: Id, subscriber_id: Id) {
        self.notifications.unsubscribe(notification_id, source_id, subscriber_id);
    }

    #[must_use]
    pub fn subscriber_count(&self, notification_id: Id, source_id: Id) -> usize {
        self.notifications.subscriber_count(notification_id, source_id)
    }

    /// Register a module, assigning it the next module index. Returns the
    /// id the module will be addressed by for the rest of the process's
    /// life. Must be called before [`ModuleRegistry::start_all`].
    pub fn register(&mut self, module: Box<dyn Module>, config: ModuleConfig) -> FwkResult<Id> {
        if self.initialized {
            return Err(Status::StateError);
        }
        let idx = self.modules.len();
        if idx >= usize::from(u16::MAX) {
            return Err(Status::NoMemError);
        }
        self.modules.push(module);
        self.configs.push(config);
        self.contexts.push(ModuleContext::new());
        Ok(Id::module(idx as u16))
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.initialized
    }

    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Whether `id` names something that actually exists given the
    /// registered modules' declared element/api/event/notification counts.
    #[must_use]
    pub fn is_valid_id(&self, id: Id) -> bool {
        if id.is_kind(IdKind::None) {
            return false;
        }
        let module_idx = id.module_idx() as usize;
        if module_idx >= self.modules.len() {
            return false;
        }
        match id.kind() {
            IdKind::None => false,
            IdKind::Module => true,
            IdKind::Element => (id.element_idx() as usize) < self.contexts[module_idx].elements.len(),
            IdKind::SubElement => {
                let element_idx = id.element_idx() as usize;
                element_idx < self.contexts[module_idx].elements.len()
                    && (id.sub_element_idx() as usize)
                        < self.contexts[module_idx].elements[element_idx].sub_element_count
            }
            IdKind::Api => (id.api_idx() as usize) < self.modules[module_idx].api_count(),
            IdKind::Event => (id.event_idx() as usize) < self.modules[module_idx].event_count(),
            IdKind::Notification => {
                (id.notification_idx() as usize) < self.modules[module_idx].notification_count()
            }
        }
    }

    /// Lifecycle state of a module, element, or sub-element (a sub-element
    /// shares its owning element's state).
    pub fn state_of(&self, id: Id) -> FwkResult<EntityState> {
        if !self.is_valid_id(id) {
            return Err(Status::ParamError);
        }
        let module_idx = id.module_idx() as usize;
        match id.kind() {
            IdKind::Module => Ok(self.contexts[module_idx].state),
            IdKind::Element | IdKind::SubElement => {
                Ok(self.contexts[module_idx].elements[id.element_idx() as usize].state)
            }
            _ => Err(Status::ParamError),
        }
    }

    pub fn element_count(&self, module_id: Id) -> FwkResult<usize> {
        if !module_id.is_kind(IdKind::Module) || !self.is_valid_id(module_id) {
            return Err(Status::ParamError);
        }
        Ok(self.contexts[module_id.module_idx() as usize].elements.len())
    }

    pub fn sub_element_count(&self, element_id: Id) -> FwkResult<usize> {
        if !element_id.is_kind(IdKind::Element) || !self.is_valid_id(element_id) {
            return Err(Status::ParamError);
        }
        let module_idx = element_id.module_idx() as usize;
        let element_idx = element_id.element_idx() as usize;
        Ok(self.contexts[module_idx].elements[element_idx].sub_element_count)
    }

    pub fn element_name(&self, element_id: Id) -> FwkResult<&'static str> {
        if !matches!(element_id.kind(), IdKind::Element | IdKind::SubElement) || !self.is_valid_id(element_id) {
            return Err(Status::ParamError);
        }
        let module_idx = element_id.module_idx() as usize;
        let element_idx = element_id.element_idx() as usize;
        Ok(self.contexts[module_idx].elements[element_idx].name)
    }

    /// The bind broker. Dispatches to the target's `process_bind_request`,
    /// provided the current stage permits binding against it: either the
    /// registry is mid-`Bind`, or it is still mid-`Initialize` and the
    /// target module has already completed `init` (an eager bind).
    pub fn bind(&mut self, target: Id, api_id: Id) -> FwkResult<ApiHandle> {
        if !api_id.is_kind(IdKind::Api) || !self.is_valid_id(target) || !self.is_valid_id(api_id) {
            return Err(Status::ParamError);
        }
        if api_id.module_idx() != target.module_idx() {
            return Err(Status::ParamError);
        }

        let target_state = self.state_of(target)?;
        let stage_ok = self.stage == Stage::Bind
            || (self.stage == Stage::Initialize && target_state >= EntityState::Initialized);
        if !stage_ok {
            log::warn!(
                "fwk_module::bind: {target:?} not reachable from stage {:?} (target state {target_state:?})",
                self.stage
            );
            return Err(Status::StateError);
        }

        let requester = self.binding_subject;
        let target_module_idx = target.module_idx() as usize;
        let result =
            self.with_module(target_module_idx, |m, _reg| m.process_bind_request(requester, target, api_id));
        if let Err(status) = result {
            log::warn!("fwk_module::bind: {target:?} refused api {api_id:?}: {status}");
        }
        result
    }

    /// Dispatch one already-popped event record to its target module's
    /// `process_event` (or `process_notification`, if `event.is_notification`
    /// is set). `sched` is the live event scheduler, paired internally with
    /// the registry's own notification bus.
    pub(crate) fn dispatch(
        &mut self,
        target_idx: usize,
        event: &EventRecord,
        response: &mut EventRecord,
        sched: &mut dyn EventSink,
    ) -> FwkResult<Outcome> {
        if event.is_notification {
            self.with_module_sched(target_idx, sched, |m, s| m.process_notification(event, response, s))
        } else {
            self.with_module_sched(target_idx, sched, |m, s| m.process_event(event, response, s))
        }
    }

    /// Run the full `Initialize -> Bind -> Start` bring-up sequence exactly
    /// once. Fails with `StateError` if already started.
    pub fn start_all(&mut self, sched: &mut dyn EventSink) -> FwkResult<()> {
        if self.initialized {
            return Err(Status::StateError);
        }

        self.stage = Stage::Initialize;
        for idx in 0..self.modules.len() {
            self.init_module(idx).inspect_err(|status| {
                log::error!("fwk_module: init of module {idx} failed: {status}");
            })?;
        }

        self.stage = Stage::Bind;
        for round in 0..self.bind_rounds {
            for idx in 0..self.modules.len() {
                let module_id = Id::module(idx as u16);
                self.binding_subject = module_id;
                self.with_module(idx, |m, reg| m.bind(module_id, round, reg))
                    .inspect_err(|status| log::error!("fwk_module: bind round {round} of {module_id:?} failed: {status}"))?;

                for element_idx in 0..self.contexts[idx].elements.len() {
                    let element_id = Id::element(idx as u16, element_idx as u16);
                    self.binding_subject = element_id;
                    self.with_module(idx, |m, reg| m.bind(element_id, round, reg)).inspect_err(
                        |status| log::error!("fwk_module: bind round {round} of {element_id:?} failed: {status}"),
                    )?;
                }
            }
        }
        for ctx in &mut self.contexts {
            ctx.state = EntityState::Bound;
            for element in &mut ctx.elements {
                element.state = EntityState::Bound;
            }
        }

        self.stage = Stage::Start;
        for idx in 0..self.modules.len() {
            let module_id = Id::module(idx as u16);
            self.with_module_sched(idx, sched, |m, s| m.start(module_id, s))
                .inspect_err(|status| log::error!("fwk_module: start of {module_id:?} failed: {status}"))?;
            for element_idx in 0..self.contexts[idx].elements.len() {
                let element_id = Id::element(idx as u16, element_idx as u16);
                self.with_module_sched(idx, sched, |m, s| m.start(element_id, s))
                    .inspect_err(|status| log::error!("fwk_module: start of {element_id:?} failed: {status}"))?;
            }
            self.contexts[idx].state = EntityState::Started;
            for element in &mut self.contexts[idx].elements {
                element.state = EntityState::Started;
            }
        }

        self.stage = Stage::Run;
        self.initialized = true;
        log::info!("fwk_module: start_all complete, {} module(s) running", self.modules.len());
        Ok(())
    }

    /// Run `stop` on every element then every module, in reverse
    /// registration order. Idempotent: a no-op if `start_all` never ran or
    /// already completed.
    pub fn stop_all(&mut self, sched: &mut dyn EventSink) {
        if !self.initialized {
            return;
        }
        self.stage = Stage::Stop;
        for idx in (0..self.modules.len()).rev() {
            for element_idx in (0..self.contexts[idx].elements.len()).rev() {
                let element_id = Id::element(idx as u16, element_idx as u16);
                if let Err(status) = self.with_module_sched(idx, sched, |m, s| m.stop(element_id, s)) {
                    log::warn!("fwk_module: stop of {element_id:?} reported {status}");
                }
                self.contexts[idx].elements[element_idx].state = EntityState::Suspended;
            }
            let module_id = Id::module(idx as u16);
            if let Err(status) = self.with_module_sched(idx, sched, |m, s| m.stop(module_id, s)) {
                log::warn!("fwk_module: stop of {module_id:?} reported {status}");
            }
            self.contexts[idx].state = EntityState::Suspended;
        }
        self.initialized = false;
        log::info!("fwk_module: stop_all complete");
    }

    /// Run the one module through `init`, resolve its element table, then
    /// `element_init` each element and finally `post_init`.
    ///
    /// A static element table is fully known before `init` runs, so its
    /// contexts are built *before* the call — a module may legitimately
    /// query its own elements from inside its own `init`. A dynamic
    /// generator only produces elements after `init` returns (it may
    /// depend on the module's own configuration data), so its contexts can
    /// only be built afterward.
    fn init_module(&mut self, idx: usize) -> FwkResult<()> {
        let module_id = Id::module(idx as u16);

        let static_elements: Option<Vec<ElementDescriptor>> = match &self.configs[idx].elements {
            ElementsSource::Static(v) => Some(
                v.iter()
                    .map(|d| ElementDescriptor::new(d.name, d.sub_element_count, Rc::clone(&d.data)))
                    .collect(),
            ),
            ElementsSource::Dynamic(_) => None,
        };
        let element_count_hint = static_elements.as_ref().map_or(0, Vec::len);

        if let Some(elements) = &static_elements {
            if !elements.is_empty() && !self.modules[idx].has_element_init() {
                return Err(Status::ParamError);
            }
            self.contexts[idx].elements =
                elements.iter().map(|d| ElementContext::new(d.name, d.sub_element_count)).collect();
        }

        let data = Rc::clone(&self.configs[idx].data);

        self.binding_subject = module_id;
        self.with_module(idx, |m, reg| {
            if m.api_count() > 0 && !m.has_process_bind_request() {
                return Err(Status::ParamError);
            }
            if m.api_count() == 0 && m.has_process_bind_request() {
                return Err(Status::ParamError);
            }
            // An event is addressed to the module that owns it (the
            // namespace module index in its `Id`), so a module that
            // declares events must be able to handle being their target.
            // A notification's fan-out is addressed to each subscriber
            // rather than back to the declaring module, but the same
            // module can still be on the receiving end of its own
            // notification in other flows, so the declaring module must
            // be able to handle one too.
            if m.event_count() > 0 && !m.has_process_event() {
                return Err(Status::ParamError);
            }
            if m.notification_count() > 0 && !m.has_process_notification() {
                return Err(Status::ParamError);
            }
            m.init(module_id, element_count_hint, data.as_ref(), reg)
        })?;

        let elements: Vec<ElementDescriptor> = if let Some(elements) = static_elements {
            elements
        } else {
            let generated = match &self.configs[idx].elements {
                ElementsSource::Dynamic(generator) => generator(module_id),
                ElementsSource::Static(_) => unreachable!("static element table already resolved above"),
            };
            if !generated.is_empty() && !self.modules[idx].has_element_init() {
                return Err(Status::ParamError);
            }
            self.contexts[idx].elements =
                generated.iter().map(|d| ElementContext::new(d.name, d.sub_element_count)).collect();
            generated
        };

        for (element_idx, descriptor) in elements.iter().enumerate() {
            let element_id = Id::element(idx as u16, element_idx as u16);
            self.binding_subject = element_id;
            let sub_element_count = descriptor.sub_element_count;
            let element_data = Rc::clone(&descriptor.data);
            self.with_module(idx, |m, reg| {
                m.element_init(element_id, sub_element_count, element_data.as_ref(), reg)
            })?;
            self.contexts[idx].elements[element_idx].state = EntityState::Initialized;
        }

        self.binding_subject = module_id;
        self.with_module(idx, |m, reg| m.post_init(module_id, reg))?;
        self.contexts[idx].state = EntityState::Initialized;
        Ok(())
    }

    /// Temporarily detach the module at `idx` from the registry so its own
    /// callback can take `&mut ModuleRegistry` without aliasing itself.
    fn with_module<F, R>(&mut self, idx: usize, f: F) -> R
    where
        F: FnOnce(&mut dyn Module, &mut ModuleRegistry) -> R,
    {
        let mut taken: Box<dyn Module> = std::mem::replace(&mut self.modules[idx], Box::new(TakenModule));
        let result = f(taken.as_mut(), self);
        self.modules[idx] = taken;
        result
    }

    /// Same detach trick, but for callbacks that run after `Initialize`
    /// (`start`/`stop`/`process_event`/`process_notification`), which need a
    /// [`NotificationSink`] instead of registry access. Builds the combined
    /// sink internally by pairing the caller's live scheduler with this
    /// registry's own notification bus.
    fn with_module_sched<F, R>(&mut self, idx: usize, sched: &mut dyn EventSink, f: F) -> R
    where
        F: FnOnce(&mut dyn Module, &mut dyn NotificationSink) -> R,
    {
        let mut combined = CombinedSink { sink: sched, bus: &mut self.notifications };
        let mut taken: Box<dyn Module> = std::mem::replace(&mut self.modules[idx], Box::new(TakenModule));
        let result = f(taken.as_mut(), &mut combined);
        self.modules[idx] = taken;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fwk_thread::EventScheduler;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Leaf {
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Module for Leaf {
        fn name(&self) -> &'static str {
            "leaf"
        }

        fn init(
            &mut self,
            _module_id: Id,
            _element_count: usize,
            _data: &dyn Any,
            _registry: &mut ModuleRegistry,
        ) -> FwkResult<()> {
            self.log.borrow_mut().push("leaf:init");
            Ok(())
        }

        fn start(&mut self, _id: Id, _sink: &mut dyn NotificationSink) -> FwkResult<()> {
            self.log.borrow_mut().push("leaf:start");
            Ok(())
        }

        fn bind(&mut self, id: Id, _round: u8, registry: &mut ModuleRegistry) -> FwkResult<()> {
            if id.is_kind(IdKind::Module) {
                let handle = registry.bind(Id::module(0), Id::api(0, 0))?;
                assert_eq!(*handle.downcast::<u32>().unwrap(), 42);
                self.log.borrow_mut().push("leaf:bind-ok");
            }
            Ok(())
        }
    }

    struct Root {
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Module for Root {
        fn name(&self) -> &'static str {
            "root"
        }

        fn api_count(&self) -> usize {
            1
        }

        fn has_process_bind_request(&self) -> bool {
            true
        }

        fn init(
            &mut self,
            _module_id: Id,
            _element_count: usize,
            _data: &dyn Any,
            _registry: &mut ModuleRegistry,
        ) -> FwkResult<()> {
            self.log.borrow_mut().push("root:init");
            Ok(())
        }

        fn process_bind_request(
            &mut self,
            _requester: Id,
            _target: Id,
            _api_id: Id,
        ) -> FwkResult<ApiHandle> {
            Ok(ApiHandle::new(Rc::new(42_u32)))
        }
    }

    #[test]
    fn bring_up_runs_modules_in_order_and_allows_binds_during_bind_stage() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ModuleRegistry::new(1).unwrap();
        registry
            .register(
                Box::new(Root { log: log.clone() }),
                ModuleConfig::none(),
            )
            .unwrap();
        registry
            .register(Box::new(Leaf { log: log.clone() }), ModuleConfig::none())
            .unwrap();

        let mut sched = EventScheduler::<64>::new();
        registry.start_all(&mut sched).unwrap();

        let seen = log.borrow().clone();
        assert_eq!(seen, vec!["root:init", "leaf:init", "leaf:bind-ok", "root:start", "leaf:start"]);
        assert_eq!(registry.stage(), Stage::Run);
        assert!(registry.is_running());
        assert_eq!(registry.state_of(Id::module(0)).unwrap(), EntityState::Started);
    }

    #[test]
    fn double_start_is_rejected() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ModuleRegistry::new(1).unwrap();
        registry
            .register(Box::new(Leaf { log: log.clone() }), ModuleConfig::none())
            .unwrap();
        let mut sched = EventScheduler::<64>::new();
        registry.start_all(&mut sched).unwrap();
        assert_eq!(registry.start_all(&mut sched), Err(Status::StateError));
    }

    #[test]
    fn bind_outside_bind_or_eager_initialize_window_is_state_error() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ModuleRegistry::new(1).unwrap();
        registry
            .register(
                Box::new(Root { log: log.clone() }),
                ModuleConfig::none(),
            )
            .unwrap();
        let mut sched = EventScheduler::<64>::new();
        registry.start_all(&mut sched).unwrap();
        assert_eq!(registry.bind(Id::module(0), Id::api(0, 0)), Err(Status::StateError));
    }

    #[test]
    fn invalid_ids_are_rejected_by_construction_count() {
        let mut registry = ModuleRegistry::new(1).unwrap();
        registry
            .register(
                Box::new(Leaf { log: Rc::new(RefCell::new(Vec::new())) }),
                ModuleConfig::none(),
            )
            .unwrap();
        assert!(!registry.is_valid_id(Id::module(5)));
        assert!(!registry.is_valid_id(Id::element(0, 0)));
        assert!(registry.is_valid_id(Id::module(0)));
    }

    struct SelfInspecting {
        seen_element_count: Rc<RefCell<Option<usize>>>,
    }

    impl Module for SelfInspecting {
        fn name(&self) -> &'static str {
            "self-inspecting"
        }

        fn has_element_init(&self) -> bool {
            true
        }

        fn init(
            &mut self,
            module_id: Id,
            _element_count: usize,
            _data: &dyn Any,
            registry: &mut ModuleRegistry,
        ) -> FwkResult<()> {
            *self.seen_element_count.borrow_mut() = Some(registry.element_count(module_id).unwrap());
            Ok(())
        }
    }

    #[test]
    fn a_static_element_table_is_visible_to_the_module_s_own_init() {
        let seen = Rc::new(RefCell::new(None));
        let mut registry = ModuleRegistry::new(1).unwrap();
        registry
            .register(
                Box::new(SelfInspecting { seen_element_count: seen.clone() }),
                ModuleConfig::new(
                    Rc::new(()),
                    ElementsSource::Static(vec![
                        ElementDescriptor::new("a", 0, Rc::new(())),
                        ElementDescriptor::new("b", 0, Rc::new(())),
                    ]),
                ),
            )
            .unwrap();
        let mut sched = EventScheduler::<64>::new();
        registry.start_all(&mut sched).unwrap();

        assert_eq!(*seen.borrow(), Some(2));
    }
}
