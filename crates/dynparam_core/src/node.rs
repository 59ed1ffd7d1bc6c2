//! Tree Nodes and Handles

use dynparam_rtmem::RtString;

use crate::arena::{Arena, Key};
use crate::hints::HintSet;
use crate::value::ParamValue;
use crate::view::ViewContext;

/// Handle to a group; stays detectable as stale after the group is freed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub(crate) Key);

/// Handle to a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterId(pub(crate) Key);

/// Handle to a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(pub(crate) Key);

/// How the control side's picture of a node differs from the producer's
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
    /// Both sides agree
    Nothing,
    /// Not yet announced to the control side
    Appear,
    /// Announced, removed by the producer, waiting to be retired
    Disappear,
}

impl Pending {
    /// Contribution to every ancestor's pending-descendant count
    pub(crate) fn weight(self) -> i32 {
        match self {
            Pending::Nothing => 0,
            Pending::Appear | Pending::Disappear => 1,
        }
    }
}

/// Sibling links inside a parent's child list
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Links {
    pub(crate) prev: Option<Key>,
    pub(crate) next: Option<Key>,
}

pub(crate) trait Linked {
    fn links(&self) -> &Links;
    fn links_mut(&mut self) -> &mut Links;
}

/// Insertion-ordered list of children threaded through their `Links`
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ChildList {
    pub(crate) head: Option<Key>,
    pub(crate) tail: Option<Key>,
    pub(crate) len: usize,
}

impl ChildList {
    pub(crate) fn push_back<T: Linked>(&mut self, arena: &mut Arena<T>, key: Key) {
        if let Some(node) = arena.get_mut(key) {
            *node.links_mut() = Links {
                prev: self.tail,
                next: None,
            };
        }
        match self.tail {
            Some(tail) => {
                if let Some(node) = arena.get_mut(tail) {
                    node.links_mut().next = Some(key);
                }
            }
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        self.len += 1;
    }

    pub(crate) fn unlink<T: Linked>(&mut self, arena: &mut Arena<T>, key: Key) {
        let Some(links) = arena.get(key).map(|node| *node.links()) else {
            return;
        };
        match links.prev {
            Some(prev) => {
                if let Some(node) = arena.get_mut(prev) {
                    node.links_mut().next = links.next;
                }
            }
            None => self.head = links.next,
        }
        match links.next {
            Some(next) => {
                if let Some(node) = arena.get_mut(next) {
                    node.links_mut().prev = links.prev;
                }
            }
            None => self.tail = links.prev,
        }
        self.len -= 1;
    }
}

pub(crate) struct GroupNode {
    pub(crate) name: RtString,
    pub(crate) parent: Option<Key>,
    /// Root is depth 0
    pub(crate) depth: usize,
    pub(crate) links: Links,
    pub(crate) groups: ChildList,
    pub(crate) parameters: ChildList,
    pub(crate) commands: ChildList,
    pub(crate) hints: HintSet,
    pub(crate) pending: Pending,
    /// Descendants (not counting this group) whose state is not `Nothing`
    pub(crate) pending_descendants: u32,
    /// Set while the control side knows the group
    pub(crate) context: Option<ViewContext>,
}

pub(crate) struct ParameterNode {
    pub(crate) name: RtString,
    pub(crate) group: Key,
    pub(crate) links: Links,
    pub(crate) hints: HintSet,
    pub(crate) value: ParamValue,
    /// Value owner's back-reference to its own storage
    pub(crate) tag: u64,
    pub(crate) pending: Pending,
    pub(crate) context: Option<ViewContext>,
}

pub(crate) struct CommandNode {
    pub(crate) name: RtString,
    pub(crate) group: Key,
    pub(crate) links: Links,
    pub(crate) hints: HintSet,
    pub(crate) pending: Pending,
    pub(crate) context: Option<ViewContext>,
}

impl Linked for GroupNode {
    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

impl Linked for ParameterNode {
    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

impl Linked for CommandNode {
    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}
