//! Per-mutation confirmation

use crate::plan::Mutation;

/// Synchronous decision callback consulted before each committed mutation
///
/// Only used in commit mode. Any `FnMut(&Mutation) -> bool` closure works.
pub trait Confirmation {
    /// Return `true` to proceed with the mutation
    fn confirm(&mut self, mutation: &Mutation) -> bool;
}

/// Approves every mutation
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysApprove;

impl Confirmation for AlwaysApprove {
    fn confirm(&mut self, _mutation: &Mutation) -> bool {
        true
    }
}

/// Declines every mutation
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysDeny;

impl Confirmation for AlwaysDeny {
    fn confirm(&mut self, _mutation: &Mutation) -> bool {
        false
    }
}

impl<F> Confirmation for F
where
    F: FnMut(&Mutation) -> bool,
{
    fn confirm(&mut self, mutation: &Mutation) -> bool {
        self(mutation)
    }
}
