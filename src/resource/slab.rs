//! Handle table with slot reuse.

use crate::error::AbiError;

enum Slot<T> {
    /// Free slot; `next` links to the next free slot, or to `slots.len()`
    /// when this is the last one.
    Free { next: u32 },
    Occupied(T),
}

/// Maps 32-bit handles to host values. Removal pushes the slot onto a free
/// list threaded through the free slots themselves, and insertion pops from
/// it before growing. The table never shrinks.
pub struct Slab<T> {
    slots: Vec<Slot<T>>,
    head: u32,
    live: usize,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            head: 0,
            live: 0,
        }
    }
}

impl<T> Slab<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> u32 {
        self.live += 1;
        let handle = self.head;
        if handle as usize == self.slots.len() {
            self.slots.push(Slot::Occupied(value));
            self.head = handle + 1;
            return handle;
        }
        let slot = &mut self.slots[handle as usize];
        self.head = match slot {
            Slot::Free { next } => *next,
            Slot::Occupied(_) => unreachable!("free list head {handle} is occupied"),
        };
        *slot = Slot::Occupied(value);
        handle
    }

    pub fn get(&self, handle: u32) -> Result<&T, AbiError> {
        match self.slots.get(handle as usize) {
            Some(Slot::Occupied(value)) => Ok(value),
            _ => Err(AbiError::InvalidHandle(handle)),
        }
    }

    pub fn remove(&mut self, handle: u32) -> Result<T, AbiError> {
        let slot = self
            .slots
            .get_mut(handle as usize)
            .filter(|slot| matches!(slot, Slot::Occupied(_)))
            .ok_or(AbiError::InvalidHandle(handle))?;
        match std::mem::replace(slot, Slot::Free { next: self.head }) {
            Slot::Occupied(value) => {
                self.head = handle;
                self.live -= 1;
                Ok(value)
            }
            Slot::Free { .. } => unreachable!(),
        }
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every live value out, leaving the table empty.
    pub fn drain(&mut self) -> Vec<T> {
        self.head = 0;
        self.live = 0;
        std::mem::take(&mut self.slots)
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Occupied(value) => Some(value),
                Slot::Free { .. } => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn get_returns_inserted_value_until_removed() {
        let mut slab = Slab::new();
        let a = slab.insert("a");
        let b = slab.insert("b");
        assert_eq!((a, b), (0, 1));
        assert_eq!(*slab.get(a).unwrap(), "a");
        assert_eq!(slab.remove(a).unwrap(), "a");
        assert!(matches!(slab.get(a), Err(AbiError::InvalidHandle(0))));
        assert!(matches!(slab.remove(a), Err(AbiError::InvalidHandle(0))));
        assert_eq!(slab.len(), 1);
        assert_eq!(*slab.get(b).unwrap(), "b");
    }

    #[test]
    fn removed_handle_is_reused_before_growing() {
        let mut slab = Slab::new();
        for i in 0..4 {
            slab.insert(i);
        }
        slab.remove(2).unwrap();
        assert_eq!(slab.insert(20), 2);
        assert_eq!(slab.insert(40), 4);

        slab.remove(1).unwrap();
        slab.remove(3).unwrap();
        assert_eq!(slab.insert(30), 3);
        assert_eq!(slab.insert(10), 1);
        assert_eq!(slab.insert(50), 5);
        assert_eq!(slab.len(), 6);
    }

    #[test]
    fn handles_far_beyond_table_are_invalid() {
        let mut slab = Slab::new();
        slab.insert(());
        for handle in [1, 1000, u32::MAX] {
            assert!(matches!(slab.get(handle), Err(AbiError::InvalidHandle(h)) if h == handle));
            assert!(matches!(slab.remove(handle), Err(AbiError::InvalidHandle(_))));
        }
        assert_eq!(slab.len(), 1);
    }

    #[test]
    fn drain_empties_the_table() {
        let mut slab = Slab::new();
        slab.insert(1);
        let gone = slab.insert(2);
        slab.insert(3);
        slab.remove(gone).unwrap();
        let mut rest = slab.drain();
        rest.sort();
        assert_eq!(rest, vec![1, 3]);
        assert!(slab.is_empty());
        assert_eq!(slab.len(), 0);
        assert_eq!(slab.insert(9), 0);
    }

    proptest! {
        // Model the table as a map and check every live handle stays valid.
        #[test]
        fn live_handles_never_alias(ops in proptest::collection::vec(any::<Option<u8>>(), 1..128)) {
            let mut slab = Slab::new();
            let mut live: Vec<(u32, u32)> = Vec::new();
            for (step, op) in ops.into_iter().enumerate() {
                match op {
                    Some(pick) if !live.is_empty() => {
                        let (handle, value) = live.swap_remove(pick as usize % live.len());
                        prop_assert_eq!(slab.remove(handle).unwrap(), value);
                        prop_assert!(slab.get(handle).is_err());
                    }
                    _ => {
                        let handle = slab.insert(step as u32);
                        prop_assert!(live.iter().all(|(h, _)| *h != handle));
                        live.push((handle, step as u32));
                    }
                }
                prop_assert_eq!(slab.len(), live.len());
                for (handle, value) in &live {
                    prop_assert_eq!(*slab.get(*handle).unwrap(), *value);
                }
            }
        }
    }
}
