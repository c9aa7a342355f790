//! Identifier model.
//!
//! An [`Id`] is a small `Copy` tagged union that names every addressable
//! entity in the system: a module, one of its elements, a sub-element of an
//! element, an API exposed by a module, an event kind, or a notification
//! kind. Construction is total and infallible — ids can be built in `const`
//! context and placed in static tables — while *validity* (does this id
//! refer to something that actually exists in the running system) is a
//! separate, fallible check performed against the live
//! [`ModuleRegistry`](crate::fwk_module::ModuleRegistry).
//!
//! Three `u16` indices are packed alongside an 8-bit kind tag into a single
//! `u64`. Which indices are meaningful depends on the kind:
//!
//! | kind | idx0 | idx1 | idx2 |
//! |---|---|---|---|
//! | `Module` | module | — | — |
//! | `Element` | module | element | — |
//! | `SubElement` | module | element | sub-element |
//! | `Api` | module | api | — |
//! | `Event` | module | event | — |
//! | `Notification` | module | notification | — |

use core::fmt;

const TAG_SHIFT: u32 = 48;
const IDX0_SHIFT: u32 = 32;
const IDX1_SHIFT: u32 = 16;
const IDX_MASK: u64 = 0xFFFF;
const TAG_MASK: u64 = 0xFF;

/// Which kind of entity an [`Id`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IdKind {
    None = 0,
    Module = 1,
    Element = 2,
    SubElement = 3,
    Api = 4,
    Event = 5,
    Notification = 6,
}

impl IdKind {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => IdKind::None,
            1 => IdKind::Module,
            2 => IdKind::Element,
            3 => IdKind::SubElement,
            4 => IdKind::Api,
            5 => IdKind::Event,
            6 => IdKind::Notification,
            _ => panic!("corrupt fwk_id tag"),
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IdKind::None => "none",
            IdKind::Module => "module",
            IdKind::Element => "element",
            IdKind::SubElement => "sub-element",
            IdKind::Api => "api",
            IdKind::Event => "event",
            IdKind::Notification => "notification",
        };
        f.write_str(s)
    }
}

/// A typed, flat identifier. Total ordering of equality over all fields;
/// no partial/fuzzy matching.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(u64);

impl Id {
    /// The single `None` id — names nothing, never valid against any registry.
    pub const NONE: Id = Id(0);

    const fn pack(kind: IdKind, idx0: u16, idx1: u16, idx2: u16) -> Id {
        Id(((kind as u64) << TAG_SHIFT)
            | ((idx0 as u64) << IDX0_SHIFT)
            | ((idx1 as u64) << IDX1_SHIFT)
            | (idx2 as u64))
    }

    /// Build a module id. Infallible.
    #[must_use]
    pub const fn module(module_idx: u16) -> Id {
        Id::pack(IdKind::Module, module_idx, 0, 0)
    }

    /// Build an element id. Infallible.
    #[must_use]
    pub const fn element(module_idx: u16, element_idx: u16) -> Id {
        Id::pack(IdKind::Element, module_idx, element_idx, 0)
    }

    /// Build a sub-element id. Infallible.
    #[must_use]
    pub const fn sub_element(module_idx: u16, element_idx: u16, sub_element_idx: u16) -> Id {
        Id::pack(IdKind::SubElement, module_idx, element_idx, sub_element_idx)
    }

    /// Build an API id. Infallible.
    #[must_use]
    pub const fn api(module_idx: u16, api_idx: u16) -> Id {
        Id::pack(IdKind::Api, module_idx, api_idx, 0)
    }

    /// Build an event id. Infallible.
    #[must_use]
    pub const fn event(module_idx: u16, event_idx: u16) -> Id {
        Id::pack(IdKind::Event, module_idx, event_idx, 0)
    }

    /// Build a notification id. Infallible.
    #[must_use]
    pub const fn notification(module_idx: u16, notification_idx: u16) -> Id {
        Id::pack(IdKind::Notification, module_idx, notification_idx, 0)
    }

    /// The kind tag carried by this id.
    #[must_use]
    pub const fn kind(self) -> IdKind {
        IdKind::from_raw(((self.0 >> TAG_SHIFT) & TAG_MASK) as u8)
    }

    /// Whether this id carries the given kind tag.
    #[must_use]
    pub fn is_kind(self, kind: IdKind) -> bool {
        self.kind() == kind
    }

    /// Whether this id is anything other than [`IdKind::None`]. Mirrors the
    /// original's `fwk_optional_id_is_defined` for ids that name an optional
    /// relationship (e.g. a module's bind target).
    #[must_use]
    pub fn is_defined(self) -> bool {
        !self.is_kind(IdKind::None)
    }

    /// The owning module's index. Valid for every kind except `None`.
    ///
    /// # Panics (debug builds only)
    /// Panics if called on `Id::NONE` — accessing the module index of an id
    /// that names nothing is a programming error.
    #[must_use]
    pub fn module_idx(self) -> u16 {
        debug_assert!(
            self.kind() != IdKind::None,
            "fwk_id: module index of a None id"
        );
        ((self.0 >> IDX0_SHIFT) & IDX_MASK) as u16
    }

    /// The element index. Valid for `Element` and `SubElement` ids only.
    #[must_use]
    pub fn element_idx(self) -> u16 {
        debug_assert!(
            matches!(self.kind(), IdKind::Element | IdKind::SubElement),
            "fwk_id: element index of a {} id",
            self.kind()
        );
        ((self.0 >> IDX1_SHIFT) & IDX_MASK) as u16
    }

    /// The sub-element index. Valid for `SubElement` ids only.
    #[must_use]
    pub fn sub_element_idx(self) -> u16 {
        debug_assert!(
            self.kind() == IdKind::SubElement,
            "fwk_id: sub-element index of a {} id",
            self.kind()
        );
        (self.0 & IDX_MASK) as u16
    }

    /// The API index. Valid for `Api` ids only.
    #[must_use]
    pub fn api_idx(self) -> u16 {
        debug_assert!(
            self.kind() == IdKind::Api,
            "fwk_id: api index of a {} id",
            self.kind()
        );
        ((self.0 >> IDX1_SHIFT) & IDX_MASK) as u16
    }

    /// The event index. Valid for `Event` ids only.
    #[must_use]
    pub fn event_idx(self) -> u16 {
        debug_assert!(
            self.kind() == IdKind::Event,
            "fwk_id: event index of a {} id",
            self.kind()
        );
        ((self.0 >> IDX1_SHIFT) & IDX_MASK) as u16
    }

    /// The notification index. Valid for `Notification` ids only.
    #[must_use]
    pub fn notification_idx(self) -> u16 {
        debug_assert!(
            self.kind() == IdKind::Notification,
            "fwk_id: notification index of a {} id",
            self.kind()
        );
        ((self.0 >> IDX1_SHIFT) & IDX_MASK) as u16
    }

    /// The owning module id of any non-`None` id.
    #[must_use]
    pub fn parent_module(self) -> Id {
        if self.kind() == IdKind::None {
            Id::NONE
        } else {
            Id::module(self.module_idx())
        }
    }

    /// Extend any non-`None` id into an element id under the same module.
    #[must_use]
    pub fn build_element(self, element_idx: u16) -> Id {
        Id::element(self.module_idx(), element_idx)
    }

    /// Extend an `Element` or `SubElement` id into a sub-element id.
    #[must_use]
    pub fn build_sub_element(self, sub_element_idx: u16) -> Id {
        debug_assert!(matches!(self.kind(), IdKind::Element | IdKind::SubElement));
        Id::sub_element(self.module_idx(), self.element_idx(), sub_element_idx)
    }

    /// Extend any non-`None` id into an API id under the same module.
    #[must_use]
    pub fn build_api(self, api_idx: u16) -> Id {
        Id::api(self.module_idx(), api_idx)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            IdKind::None => write!(f, "Id::None"),
            IdKind::Module => write!(f, "Id::Module({})", self.module_idx()),
            IdKind::Element => write!(
                f,
                "Id::Element({}:{})",
                self.module_idx(),
                self.element_idx()
            ),
            IdKind::SubElement => write!(
                f,
                "Id::SubElement({}:{}:{})",
                self.module_idx(),
                self.element_idx(),
                self.sub_element_idx()
            ),
            IdKind::Api => write!(f, "Id::Api({}:{})", self.module_idx(), self.api_idx()),
            IdKind::Event => write!(f, "Id::Event({}:{})", self.module_idx(), self.event_idx()),
            IdKind::Notification => write!(
                f,
                "Id::Notification({}:{})",
                self.module_idx(),
                self.notification_idx()
            ),
        }
    }
}
