//! Local slot allocation
//!
//! Every generated method receives its arguments as a positional array and a
//! keyword table. The frame layout is fixed:
//!
//! ```text
//! [self?][positional args][keyword args][param 0]..[param n-1]
//! ```

use crate::error::{CompileError, CompileResult};
use crate::params::ParameterList;
use rustc_hash::FxHashMap;
use tracing::trace;

/// What a local slot holds
///
/// The two argument containers are roles of their own, so no parameter name
/// can ever alias them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotRole {
    Receiver,
    PositionalArgs,
    KeywordArgs,
    Named(String),
}

/// Append-only mapping from slot roles to local indices
#[derive(Debug, Clone, Default)]
pub struct LocalSlotTable {
    slots: FxHashMap<SlotRole, u16>,
    order: Vec<SlotRole>,
}

impl LocalSlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next slot for `role`, returning its index
    pub fn reserve(&mut self, role: SlotRole) -> CompileResult<u16> {
        if self.slots.contains_key(&role) {
            return Err(CompileError::InternalError {
                message: format!("local slot for {role:?} reserved twice"),
            });
        }

        let index = u16::try_from(self.order.len()).map_err(|_| CompileError::TooManyLocals)?;
        if index == u16::MAX {
            return Err(CompileError::TooManyLocals);
        }

        trace!(?role, index, "reserved local slot");
        self.slots.insert(role.clone(), index);
        self.order.push(role);
        Ok(index)
    }

    pub fn slot(&self, role: &SlotRole) -> Option<u16> {
        self.slots.get(role).copied()
    }

    pub fn named(&self, name: &str) -> Option<u16> {
        self.slot(&SlotRole::Named(name.to_string()))
    }

    pub fn receiver(&self) -> Option<u16> {
        self.slot(&SlotRole::Receiver)
    }

    pub fn positional_args(&self) -> Option<u16> {
        self.slot(&SlotRole::PositionalArgs)
    }

    pub fn keyword_args(&self) -> Option<u16> {
        self.slot(&SlotRole::KeywordArgs)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Frame size for the code attribute
    pub fn max_locals(&self) -> u16 {
        // reserve() keeps len below u16::MAX
        self.order.len() as u16
    }

    /// Roles with their indices, in reservation order
    pub fn iter(&self) -> impl Iterator<Item = (&SlotRole, u16)> {
        self.order.iter().enumerate().map(|(i, role)| (role, i as u16))
    }
}

/// Builds the slot table of one callable
pub struct SlotAllocator {
    table: LocalSlotTable,
}

impl SlotAllocator {
    fn new() -> Self {
        Self {
            table: LocalSlotTable::new(),
        }
    }

    /// Reserve receiver (if any), both argument containers, then one slot per
    /// visible parameter
    pub fn allocate(has_receiver: bool, params: &ParameterList) -> CompileResult<LocalSlotTable> {
        let mut allocator = Self::new();
        if has_receiver {
            allocator.table.reserve(SlotRole::Receiver)?;
        }
        allocator.table.reserve(SlotRole::PositionalArgs)?;
        allocator.table.reserve(SlotRole::KeywordArgs)?;
        for param in params {
            allocator.table.reserve(SlotRole::Named(param.name.clone()))?;
        }
        Ok(allocator.table)
    }
}
