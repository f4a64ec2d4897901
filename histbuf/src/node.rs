//! Node identity, parent links and ascent to the owning collection
//!
//! Every node is an `Rc` handle around an inner struct. A node records its
//! owner through a non-owning weak link that is set exactly once, when the
//! node is first attached to a parent field. The link is what makes
//! double-attachment detectable and what lets any node find its root.

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use hashbrown::HashSet;

use crate::collection::{Collection, CollectionInner};
use crate::error::{structure, Result};

/// Behaviour shared by every node handle
pub trait Node {
    /// Name of the node type, e.g. `"RegularBinning"`
    fn kind(&self) -> &'static str;

    /// True once the node has been attached to a parent
    fn is_attached(&self) -> bool;

    /// Walk parent links up to the root, which must be a [`Collection`]
    fn collection(&self) -> Result<Collection>;
}

pub(crate) trait NodeInner: Any {
    fn kind(&self) -> &'static str;
    fn link(&self) -> &Link;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Back-reference from a node to its owner
#[derive(Default)]
pub(crate) struct Link {
    parent: RefCell<Option<Weak<dyn NodeInner>>>,
}

impl Link {
    /// A link already pointing at `parent`, for nodes built during decoding
    pub(crate) fn attached(parent: Weak<dyn NodeInner>) -> Self {
        Self {
            parent: RefCell::new(Some(parent)),
        }
    }

    pub(crate) fn is_claimed(&self) -> bool {
        self.parent.borrow().is_some()
    }

    pub(crate) fn set(&self, parent: Weak<dyn NodeInner>) {
        *self.parent.borrow_mut() = Some(parent);
    }

    fn parent(&self) -> Result<Option<Rc<dyn NodeInner>>> {
        match self.parent.borrow().as_ref() {
            None => Ok(None),
            Some(weak) => weak
                .upgrade()
                .map(Some)
                .ok_or_else(|| structure("parent node has been dropped")),
        }
    }
}

/// Crate-side view of a handle, used when claiming ownership
pub(crate) trait Attach: Node {
    fn link(&self) -> &Link;
    fn addr(&self) -> usize;
}

/// Find the collection at the top of `start`'s ancestry
pub(crate) fn owning_collection(start: Rc<dyn NodeInner>) -> Result<Collection> {
    let kind = start.kind();
    let mut seen: HashSet<usize> = HashSet::new();
    let mut node = start;
    loop {
        let addr = Rc::as_ptr(&node) as *const () as usize;
        if !seen.insert(addr) {
            return Err(structure("hierarchy is recursively nested"));
        }
        match node.link().parent()? {
            Some(parent) => node = parent,
            None => break,
        }
    }
    node.into_any()
        .downcast::<CollectionInner>()
        .map(Collection)
        .map_err(|_| structure(format!("{kind} object is not nested in a hierarchy")))
}

/// Addresses of `start` and every node above it
pub(crate) fn lineage(start: Rc<dyn NodeInner>) -> Result<HashSet<usize>> {
    let mut seen: HashSet<usize> = HashSet::new();
    let mut node = start;
    loop {
        if !seen.insert(Rc::as_ptr(&node) as *const () as usize) {
            return Err(structure("hierarchy is recursively nested"));
        }
        match node.link().parent()? {
            Some(parent) => node = parent,
            None => return Ok(seen),
        }
    }
}

/// The collection directly holding the node behind `link`, if any
pub(crate) fn parent_collection(link: &Link) -> Option<Rc<CollectionInner>> {
    let parent = link.parent().ok().flatten()?;
    parent.into_any().downcast::<CollectionInner>().ok()
}

/// Declare a node handle around an inner struct with a `link` field
macro_rules! node_handle {
    ($(#[$meta:meta])* $name:ident, $inner:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(pub(crate) ::std::rc::Rc<$inner>);

        impl $crate::node::NodeInner for $inner {
            fn kind(&self) -> &'static str {
                stringify!($name)
            }

            fn link(&self) -> &$crate::node::Link {
                &self.link
            }

            fn into_any(self: ::std::rc::Rc<Self>) -> ::std::rc::Rc<dyn ::std::any::Any> {
                self
            }
        }

        impl $crate::node::Node for $name {
            fn kind(&self) -> &'static str {
                stringify!($name)
            }

            fn is_attached(&self) -> bool {
                self.0.link.is_claimed()
            }

            fn collection(&self) -> $crate::error::Result<$crate::collection::Collection> {
                $crate::node::owning_collection(self.0.clone())
            }
        }

        impl $crate::node::Attach for $name {
            fn link(&self) -> &$crate::node::Link {
                &self.0.link
            }

            fn addr(&self) -> usize {
                ::std::rc::Rc::as_ptr(&self.0) as *const () as usize
            }
        }

        #[allow(dead_code)]
        impl $name {
            pub(crate) fn weak(&self) -> ::std::rc::Weak<dyn $crate::node::NodeInner> {
                let weak: ::std::rc::Weak<$inner> = ::std::rc::Rc::downgrade(&self.0);
                weak
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(
                    f,
                    "<{} at 0x{:012x}>",
                    stringify!($name),
                    $crate::node::Attach::addr(self)
                )
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                ::std::rc::Rc::ptr_eq(&self.0, &other.0)
            }
        }

        impl Eq for $name {}
    };
}

/// Declare a closed union of node handles that behaves as a node itself
macro_rules! node_union {
    ($(#[$meta:meta])* $name:ident { $($variant:ident($ty:ty)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum $name {
            $($variant($ty),)+
        }

        impl $crate::node::Node for $name {
            fn kind(&self) -> &'static str {
                match self {
                    $($name::$variant(x) => $crate::node::Node::kind(x),)+
                }
            }

            fn is_attached(&self) -> bool {
                match self {
                    $($name::$variant(x) => $crate::node::Node::is_attached(x),)+
                }
            }

            fn collection(&self) -> $crate::error::Result<$crate::collection::Collection> {
                match self {
                    $($name::$variant(x) => $crate::node::Node::collection(x),)+
                }
            }
        }

        impl $crate::node::Attach for $name {
            fn link(&self) -> &$crate::node::Link {
                match self {
                    $($name::$variant(x) => $crate::node::Attach::link(x),)+
                }
            }

            fn addr(&self) -> usize {
                match self {
                    $($name::$variant(x) => $crate::node::Attach::addr(x),)+
                }
            }
        }

        $(
            impl From<$ty> for $name {
                fn from(x: $ty) -> Self {
                    $name::$variant(x)
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::{IntegerBinning, RealInterval, RegularBinning};
    use crate::ErrorCategory;

    #[test]
    fn test_detached_node_has_no_collection() {
        let interval = RealInterval::new(0.0, 1.0).unwrap();
        assert!(!interval.is_attached());
        let err = interval.collection().unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Structure));
    }

    #[test]
    fn test_attach_sets_link() {
        let interval = RealInterval::new(0.0, 1.0).unwrap();
        let binning = RegularBinning::new(10, interval.clone()).unwrap();
        assert!(interval.is_attached());
        assert!(!binning.is_attached());
        // root is a binning, not a collection
        assert!(interval.collection().is_err());
    }

    #[test]
    fn test_cycle_is_detected() {
        let a = IntegerBinning::new(0, 1);
        let b = IntegerBinning::new(0, 1);
        Attach::link(&a).set(b.weak());
        Attach::link(&b).set(a.weak());
        let err = a.collection().unwrap_err();
        assert!(err.to_string().contains("recursively nested"));
    }

    #[test]
    fn test_debug_and_identity() {
        let a = IntegerBinning::new(0, 1);
        let b = IntegerBinning::new(0, 1);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(format!("{a:?}").starts_with("<IntegerBinning at 0x"));
    }
}
