use crate::continuation::ContinuationSlot;
use crate::state::StateCell;
use crate::task_cell::VTable;

/// The type-erased prefix of every task record.
pub(crate) struct Header {
    state: StateCell,
    vtable: &'static VTable,
    continuation: ContinuationSlot,
}

impl std::fmt::Debug for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Header")
            .field("state", &self.state)
            .field("continuation", &self.continuation)
            .finish()
    }
}

impl Header {
    pub(crate) fn new(vtable: &'static VTable) -> Self {
        Self {
            state: StateCell::new(),
            vtable,
            continuation: ContinuationSlot::new(),
        }
    }

    pub(crate) fn state(&self) -> &StateCell {
        &self.state
    }

    pub(crate) fn vtable(&self) -> &'static VTable {
        self.vtable
    }

    /// The slot holding the waker of whoever awaits this task.
    pub(crate) fn continuation(&self) -> &ContinuationSlot {
        &self.continuation
    }
}
