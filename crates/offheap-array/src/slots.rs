//! Slot table keyed by `(slot, generation)` pairs.
//!
//! Removing an entry bumps its slot's generation, so a [`ViewKey`] that
//! outlives its entry resolves to nothing instead of to whatever later
//! reuses the slot. Removing twice is a no-op.

use offheap_core::ViewKey;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational slot table with free-list reuse.
pub(crate) struct SlotTable<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    live: usize,
}

impl<T> SlotTable<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Store `value` and return the key that resolves to it.
    pub(crate) fn insert(&mut self, value: T) -> ViewKey {
        self.live += 1;
        if let Some(slot) = self.free_list.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.value = Some(value);
            return ViewKey {
                slot,
                generation: entry.generation,
            };
        }
        let slot = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        ViewKey {
            slot,
            generation: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn get(&self, key: ViewKey) -> Option<&T> {
        let entry = self.slots.get(key.slot as usize)?;
        if entry.generation != key.generation {
            return None;
        }
        entry.value.as_ref()
    }

    /// Remove and return the value behind `key`, or `None` if the key is
    /// stale.
    pub(crate) fn remove(&mut self, key: ViewKey) -> Option<T> {
        let entry = self.slots.get_mut(key.slot as usize)?;
        if entry.generation != key.generation {
            return None;
        }
        let value = entry.value.take()?;
        self.live -= 1;
        Self::retire(entry, key.slot, &mut self.free_list);
        Some(value)
    }

    /// Live entries with their keys.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (ViewKey, &T)> {
        self.slots.iter().enumerate().filter_map(|(slot, entry)| {
            entry.value.as_ref().map(|v| {
                (
                    ViewKey {
                        slot: slot as u32,
                        generation: entry.generation,
                    },
                    v,
                )
            })
        })
    }

    /// Remove every live entry, invalidating all outstanding keys.
    pub(crate) fn drain_into(&mut self, out: &mut impl Extend<T>) {
        for (slot, entry) in self.slots.iter_mut().enumerate() {
            if let Some(value) = entry.value.take() {
                out.extend(Some(value));
                Self::retire(entry, slot as u32, &mut self.free_list);
            }
        }
        self.live = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    fn retire(entry: &mut Slot<T>, slot: u32, free_list: &mut Vec<u32>) {
        entry.generation = entry.generation.wrapping_add(1);
        // A wrapped generation would let a key from epoch 0 resolve again,
        // so the slot is retired instead of recycled.
        if entry.generation != 0 {
            free_list.push(slot);
        }
    }
}
