//! Unique identifiers and the registries keyed by them.
//!
//! Every registry in the engine (meshes, images, entities) hands out `Uid`s
//! through a [`UidAllocator`]. Id `0` is reserved as the null id when a
//! [`Registry`] is constructed, so a zero uid never resolves to an object.

/// Identifier handed out by a [`UidAllocator`]. `0` is the null id.
pub type Uid = usize;

/// The reserved null id.
pub const NULL_UID: Uid = 0;

/// Hands out unique ids, reusing released ids before issuing fresh ones.
///
/// Released ids are kept on a stack: the most recently released id is the
/// first one handed out again.
#[derive(Debug, Default, Clone)]
pub struct UidAllocator {
    open: Vec<Uid>,
    top: Uid,
}

impl UidAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self) -> Uid {
        match self.open.pop() {
            Some(uid) => uid,
            None => {
                let uid = self.top;
                self.top += 1;
                uid
            }
        }
    }

    /// Makes `uid` available for the next [`reserve`](Self::reserve).
    pub fn release(&mut self, uid: Uid) {
        if uid >= self.top || self.open.contains(&uid) {
            log::warn!("Ignoring release of uid {uid}, it is not currently reserved.");
            return;
        }
        self.open.push(uid);
    }

    /// Number of released ids waiting to be reused.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Number of ids ever issued (live or released).
    pub fn issued(&self) -> usize {
        self.top
    }
}

/// Dense object storage indexed by [`Uid`].
///
/// Slot `0` is reserved for the null object and is never handed out.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    uids: UidAllocator,
    slots: Vec<Option<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        let mut uids = UidAllocator::new();
        let null = uids.reserve();
        debug_assert_eq!(null, NULL_UID);
        Self {
            uids,
            slots: vec![None],
        }
    }

    /// Stores `obj` and returns its uid.
    pub fn insert(&mut self, obj: T) -> Uid {
        self.insert_with(|_| obj)
    }

    /// Reserves a uid first so the object can be constructed knowing its own id.
    pub fn insert_with(&mut self, ctor: impl FnOnce(Uid) -> T) -> Uid {
        let uid = self.uids.reserve();
        let obj = ctor(uid);
        if uid >= self.slots.len() {
            self.slots.push(Some(obj));
        } else {
            self.slots[uid] = Some(obj);
        }
        uid
    }

    pub fn get(&self, uid: Uid) -> Option<&T> {
        if uid == NULL_UID {
            return None;
        }
        self.slots.get(uid).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, uid: Uid) -> Option<&mut T> {
        if uid == NULL_UID {
            return None;
        }
        self.slots.get_mut(uid).and_then(Option::as_mut)
    }

    /// Removes and returns the object, releasing its uid. Removing the null id
    /// or an empty slot does nothing.
    pub fn remove(&mut self, uid: Uid) -> Option<T> {
        if uid == NULL_UID {
            return None;
        }
        let obj = self.slots.get_mut(uid)?.take()?;
        self.uids.release(uid);
        Some(obj)
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live objects in uid order.
    pub fn iter(&self) -> impl Iterator<Item = (Uid, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(uid, slot)| slot.as_ref().map(|obj| (uid, obj)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Uid, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(uid, slot)| slot.as_mut().map(|obj| (uid, obj)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_uid_is_reused_before_fresh_ones() {
        let mut uids = UidAllocator::new();
        let issued: Vec<_> = (0..5).map(|_| uids.reserve()).collect();
        assert_eq!(issued, vec![0, 1, 2, 3, 4]);

        uids.release(2);
        assert_eq!(uids.reserve(), 2);
        assert_eq!(uids.reserve(), 5);
    }

    #[test]
    fn release_order_is_last_in_first_out() {
        let mut uids = UidAllocator::new();
        (0..4).for_each(|_| _ = uids.reserve());
        uids.release(1);
        uids.release(3);
        assert_eq!(uids.reserve(), 3);
        assert_eq!(uids.reserve(), 1);
        assert_eq!(uids.open_count(), 0);
    }

    #[test]
    fn double_release_is_ignored() {
        let mut uids = UidAllocator::new();
        (0..3).for_each(|_| _ = uids.reserve());
        uids.release(1);
        uids.release(1);
        uids.release(7);
        assert_eq!(uids.open_count(), 1);
    }

    #[test]
    fn registry_reserves_null_slot() {
        let mut registry = Registry::new();
        let a = registry.insert("a");
        assert_eq!(a, 1);
        assert_eq!(registry.get(NULL_UID), None);
        assert_eq!(registry.get(a), Some(&"a"));
        assert_eq!(registry.remove(NULL_UID), None);
    }

    #[test]
    fn registry_reuses_removed_slot() {
        let mut registry = Registry::new();
        let ids: Vec<_> = ["a", "b", "c"].into_iter().map(|s| registry.insert(s)).collect();
        assert_eq!(registry.remove(ids[1]), Some("b"));
        assert_eq!(registry.get(ids[1]), None);
        assert_eq!(registry.len(), 2);

        let d = registry.insert_with(|uid| {
            assert_eq!(uid, ids[1]);
            "d"
        });
        assert_eq!(d, ids[1]);
        assert_eq!(
            registry.iter().map(|(_, s)| *s).collect::<Vec<_>>(),
            vec!["a", "d", "c"]
        );
    }
}
