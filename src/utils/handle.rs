use std::hash::Hash;
use std::marker::PhantomData;

/// Generational index into a [`Pool`].
#[derive(Debug)]
pub struct Handle<T> {
    pub slot: u16,
    pub generation: u16,
    phantom: PhantomData<T>,
}

impl<T> Handle<T> {
    pub fn new(slot: u16, generation: u16) -> Self {
        Self {
            slot,
            generation,
            phantom: PhantomData,
        }
    }

    /// Packs the handle into a single integer, generation in the high half.
    pub fn to_bits(self) -> u32 {
        (u32::from(self.generation) << 16) | u32::from(self.slot)
    }

    pub fn from_bits(bits: u32) -> Self {
        Self::new((bits & 0xFFFF) as u16, (bits >> 16) as u16)
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Copy for Handle<T> {}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// Slot allocator with generation checks.
///
/// Releasing a slot bumps its generation, so handles that outlived their item
/// (or were already released) resolve to `None` instead of aliasing a newer
/// item.
pub struct Pool<T> {
    items: Vec<Option<T>>,
    empty: Vec<usize>,
    generation: Vec<u16>,
    live: usize,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        const INITIAL_SIZE: usize = 64;
        Pool::new(INITIAL_SIZE)
    }
}

impl<T> Pool<T> {
    pub fn new(initial_size: usize) -> Self {
        let mut p = Pool {
            items: Vec::with_capacity(initial_size),
            empty: Vec::with_capacity(initial_size),
            generation: vec![0; initial_size],
            live: 0,
        };

        // Lowest slots are handed out first.
        p.empty = (0..initial_size).rev().collect();
        p.items.resize_with(initial_size, || None);

        p
    }

    pub fn insert(&mut self, item: T) -> Handle<T> {
        let slot = match self.empty.pop() {
            Some(slot) => slot,
            None => {
                let slot = self.items.len();
                assert!(slot <= u16::MAX as usize, "pool exhausted ({slot} live items)");
                self.items.push(None);
                self.generation.push(0);
                slot
            }
        };

        self.items[slot] = Some(item);
        self.live += 1;

        Handle::new(slot as u16, self.generation[slot])
    }

    /// Removes the item behind `item`. Stale handles are ignored.
    pub fn release(&mut self, item: Handle<T>) -> Option<T> {
        let slot = item.slot as usize;
        if self.generation.get(slot) != Some(&item.generation) {
            return None;
        }

        let taken = self.items[slot].take()?;
        self.generation[slot] = self.generation[slot].wrapping_add(1);
        self.empty.push(slot);
        self.live -= 1;
        Some(taken)
    }

    pub fn get_ref(&self, item: Handle<T>) -> Option<&T> {
        let slot = item.slot as usize;
        if self.generation.get(slot) == Some(&item.generation) {
            self.items[slot].as_ref()
        } else {
            None
        }
    }

    pub fn get_mut_ref(&mut self, item: Handle<T>) -> Option<&mut T> {
        let slot = item.slot as usize;
        if self.generation.get(slot) == Some(&item.generation) {
            self.items[slot].as_mut()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.items.iter().enumerate().filter_map(|(slot, item)| {
            item.as_ref()
                .map(|item| (Handle::new(slot as u16, self.generation[slot]), item))
        })
    }
}
