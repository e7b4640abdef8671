//! Component B: per-client handle tables (spec §4.B).
//!
//! A fixed-capacity array indexed by the wire ID. Allocation is a linear
//! scan for the first empty slot; lookup range-checks the ID; release
//! drops the slot's value (invariant 1: a slot is either empty or owns
//! exactly one strong reference). Capacity is fixed at construction time so
//! wire IDs never change meaning across the table's lifetime (spec §9:
//! "integer ID = array index" is deliberate).

use xrbroker_proto::ResultCode;

pub struct HandleTable<T> {
    slots: Vec<Option<T>>,
}

impl<T> HandleTable<T> {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear scan for the first empty slot (spec §4.B). Returns
    /// `IPC_FAILURE` without mutating state if the table is full
    /// (testable property §8.1).
    pub fn allocate(&mut self, value: T) -> Result<u32, ResultCode> {
        let idx = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(ResultCode::IpcFailure)?;
        self.slots[idx] = Some(value);
        Ok(idx as u32)
    }

    /// Inserts at a specific index, used only to pre-populate the
    /// semantic-space prefix of the space table (spec §4.B). Overwrites
    /// whatever was there, returning it.
    pub fn insert_at(&mut self, id: u32, value: T) -> Result<Option<T>, ResultCode> {
        let slot = self
            .slots
            .get_mut(id as usize)
            .ok_or(ResultCode::IpcFailure)?;
        Ok(std::mem::replace(slot, Some(value)))
    }

    pub fn get(&self, id: u32) -> Result<&T, ResultCode> {
        self.slots
            .get(id as usize)
            .and_then(|s| s.as_ref())
            .ok_or(ResultCode::IpcFailure)
    }

    pub fn get_mut(&mut self, id: u32) -> Result<&mut T, ResultCode> {
        self.slots
            .get_mut(id as usize)
            .and_then(|s| s.as_mut())
            .ok_or(ResultCode::IpcFailure)
    }

    pub fn is_valid(&self, id: u32) -> bool {
        self.slots.get(id as usize).is_some_and(Option::is_some)
    }

    /// Releases the slot, returning whatever value it held (spec §4.B).
    /// A release of an already-empty or out-of-range slot is `IPC_FAILURE`.
    pub fn release(&mut self, id: u32) -> Result<T, ResultCode> {
        let slot = self
            .slots
            .get_mut(id as usize)
            .ok_or(ResultCode::IpcFailure)?;
        slot.take().ok_or(ResultCode::IpcFailure)
    }

    /// Releases every occupied slot, in ascending ID order, calling `f` on
    /// each value. Used by session-destroy cascades (spec §4.E.1).
    pub fn drain_all(&mut self, mut f: impl FnMut(u32, T)) {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.take() {
                f(idx as u32, value);
            }
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.is_some().then_some(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_until_full_then_fails() {
        let mut table = HandleTable::<u32>::new(2);
        assert_eq!(table.allocate(10).unwrap(), 0);
        assert_eq!(table.allocate(20).unwrap(), 1);
        assert_eq!(table.allocate(30), Err(ResultCode::IpcFailure));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn release_frees_slot_for_reuse() {
        let mut table = HandleTable::<u32>::new(1);
        let id = table.allocate(10).unwrap();
        assert_eq!(table.release(id).unwrap(), 10);
        assert_eq!(table.allocate(20).unwrap(), id);
    }

    #[test]
    fn lookup_out_of_range_or_empty_fails() {
        let table = HandleTable::<u32>::new(1);
        assert_eq!(table.get(0), Err(ResultCode::IpcFailure));
        assert_eq!(table.get(5), Err(ResultCode::IpcFailure));
    }

    #[test]
    fn drain_all_visits_every_occupied_slot_and_empties_table() {
        let mut table = HandleTable::<u32>::new(4);
        table.allocate(1).unwrap();
        table.allocate(2).unwrap();
        let mut seen = Vec::new();
        table.drain_all(|id, v| seen.push((id, v)));
        assert_eq!(seen, vec![(0, 1), (1, 2)]);
        assert!(table.is_empty());
    }
}
