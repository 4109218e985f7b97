//! Index-linked task registry
//!
//! Circular doubly linked lists over a fixed slot arena. Links are slot
//! indices instead of pointers, so nodes can move between the active and
//! suspended lists in O(1) without any aliasing references. Each list head
//! is a virtual sentinel index outside the slot range; an empty list is a
//! sentinel linked to itself.

/// Reserved index meaning "no slot".
pub const NIL: u16 = u16::MAX;

const ACTIVE_HEAD: u16 = u16::MAX - 2;
const SUSPENDED_HEAD: u16 = u16::MAX - 1;

/// Which of the two scheduler lists a registry operation targets.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ListId {
    Active,
    Suspended,
}

#[derive(Clone, Copy)]
pub struct Link {
    pub prev: u16,
    pub next: u16,
}

impl Link {
    const fn detached() -> Self {
        Link {
            prev: NIL,
            next: NIL,
        }
    }
}

/// True for the virtual sentinel indices terminating a traversal.
pub fn is_sentinel(idx: u16) -> bool {
    idx == ACTIVE_HEAD || idx == SUSPENDED_HEAD
}

fn head_index(list: ListId) -> u16 {
    match list {
        ListId::Active => ACTIVE_HEAD,
        ListId::Suspended => SUSPENDED_HEAD,
    }
}

/// Link storage for `CAP` slots plus the two list sentinels.
pub struct Registry<const CAP: usize> {
    links: [Link; CAP],
    heads: [Link; 2],
}

impl<const CAP: usize> Registry<CAP> {
    pub const fn new() -> Self {
        Registry {
            links: [Link::detached(); CAP],
            heads: [
                Link {
                    prev: ACTIVE_HEAD,
                    next: ACTIVE_HEAD,
                },
                Link {
                    prev: SUSPENDED_HEAD,
                    next: SUSPENDED_HEAD,
                },
            ],
        }
    }

    /// Resolves an index to its link. `None` for `NIL` or an out-of-range
    /// index, which callers treat as corruption and abort their pass.
    pub fn link(&self, idx: u16) -> Option<Link> {
        match idx {
            ACTIVE_HEAD => Some(self.heads[0]),
            SUSPENDED_HEAD => Some(self.heads[1]),
            i => self.links.get(i as usize).copied(),
        }
    }

    fn link_mut(&mut self, idx: u16) -> Option<&mut Link> {
        match idx {
            ACTIVE_HEAD => Some(&mut self.heads[0]),
            SUSPENDED_HEAD => Some(&mut self.heads[1]),
            i => self.links.get_mut(i as usize),
        }
    }

    /// First slot of `list`, or the sentinel index when the list is empty.
    pub fn first(&self, list: ListId) -> u16 {
        match list {
            ListId::Active => self.heads[0].next,
            ListId::Suspended => self.heads[1].next,
        }
    }

    /// Inserts `idx` right after the sentinel of `list`.
    pub fn insert_head(&mut self, list: ListId, idx: u16) {
        let head = head_index(list);
        let first = self.first(list);
        if let Some(l) = self.link_mut(first) {
            l.prev = idx;
        }
        if let Some(l) = self.link_mut(idx) {
            l.prev = head;
            l.next = first;
        }
        if let Some(l) = self.link_mut(head) {
            l.next = idx;
        }
    }

    /// Unlinks `idx` from whichever list holds it. The node self-heals to a
    /// singleton loop, so removing it twice or reinserting it later is safe.
    pub fn remove(&mut self, idx: u16) {
        let Some(Link { prev, next }) = self.link(idx) else {
            return;
        };
        if prev == NIL || next == NIL {
            return;
        }
        if let Some(l) = self.link_mut(next) {
            l.prev = prev;
        }
        if let Some(l) = self.link_mut(prev) {
            l.next = next;
        }
        if let Some(l) = self.link_mut(idx) {
            l.prev = idx;
            l.next = idx;
        }
    }

    /// Forward iteration over the slot indices of `list`.
    ///
    /// Visits at most `CAP + 1` nodes and stops on any link that does not
    /// resolve, so a corrupted cycle cannot make this loop forever.
    pub fn iter(&self, list: ListId) -> Iter<'_, CAP> {
        Iter {
            registry: self,
            node: self.first(list),
            visited: 0,
        }
    }
}

pub struct Iter<'a, const CAP: usize> {
    registry: &'a Registry<CAP>,
    node: u16,
    visited: usize,
}

impl<const CAP: usize> Iterator for Iter<'_, CAP> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if is_sentinel(self.node) || self.visited > CAP {
            return None;
        }
        let cur = self.node;
        let link = self.registry.link(cur)?;
        self.node = link.next;
        self.visited += 1;
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_is_sentinel_loop() {
        let reg: Registry<4> = Registry::new();
        assert!(is_sentinel(reg.first(ListId::Active)));
        assert!(is_sentinel(reg.first(ListId::Suspended)));
        assert_eq!(reg.iter(ListId::Active).count(), 0);
    }

    #[test]
    fn insert_head_orders_most_recent_first() {
        let mut reg: Registry<4> = Registry::new();
        reg.insert_head(ListId::Active, 0);
        reg.insert_head(ListId::Active, 1);
        reg.insert_head(ListId::Active, 2);
        let order: Vec<u16> = reg.iter(ListId::Active).collect();
        assert_eq!(order, [2, 1, 0]);
    }

    #[test]
    fn remove_from_middle_relinks_neighbors() {
        let mut reg: Registry<4> = Registry::new();
        reg.insert_head(ListId::Active, 0);
        reg.insert_head(ListId::Active, 1);
        reg.insert_head(ListId::Active, 2);
        reg.remove(1);
        let order: Vec<u16> = reg.iter(ListId::Active).collect();
        assert_eq!(order, [2, 0]);
    }

    #[test]
    fn removed_node_self_heals_and_reinserts() {
        let mut reg: Registry<4> = Registry::new();
        reg.insert_head(ListId::Active, 0);
        reg.remove(0);
        let link = reg.link(0).unwrap();
        assert_eq!((link.prev, link.next), (0, 0));
        // second removal is a no-op on a singleton loop
        reg.remove(0);
        reg.insert_head(ListId::Suspended, 0);
        let order: Vec<u16> = reg.iter(ListId::Suspended).collect();
        assert_eq!(order, [0]);
    }

    #[test]
    fn lists_stay_disjoint() {
        let mut reg: Registry<4> = Registry::new();
        reg.insert_head(ListId::Active, 0);
        reg.insert_head(ListId::Suspended, 1);
        reg.remove(0);
        reg.insert_head(ListId::Suspended, 0);
        assert_eq!(reg.iter(ListId::Active).count(), 0);
        assert_eq!(reg.iter(ListId::Suspended).count(), 2);
    }

    #[test]
    fn detached_node_removal_is_ignored() {
        let mut reg: Registry<4> = Registry::new();
        reg.insert_head(ListId::Active, 0);
        reg.remove(3);
        assert_eq!(reg.iter(ListId::Active).count(), 1);
    }
}
