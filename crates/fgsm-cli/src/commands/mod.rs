//! Subcommand implementations

pub(crate) mod attack;
pub(crate) mod bounds;
pub(crate) mod eval;
