//! Runtime state the registry keeps per module and per element, separate
//! from the module's own instance data. Indexed by module/element index —
//! an arena of contexts, never a pointer shared between modules.

/// Lifecycle state of a module or an element. An element's state never
/// exceeds its owning module's state — the registry enforces this when
/// advancing either one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityState {
    Uninitialized,
    Initialized,
    Bound,
    Started,
    Suspended,
}

pub(super) struct ElementContext {
    pub name: &'static str,
    pub sub_element_count: usize,
    pub state: EntityState,
}

impl ElementContext {
    pub(super) fn new(name: &'static str, sub_element_count: usize) -> Self {
        ElementContext {
            name,
            sub_element_count,
            state: EntityState::Uninitialized,
        }
    }
}

pub(super) struct ModuleContext {
    pub state: EntityState,
    pub elements: Vec<ElementContext>,
}

impl ModuleContext {
    pub(super) fn new() -> Self {
        ModuleContext {
            state: EntityState::Uninitialized,
            elements: Vec::new(),
        }
    }
}
