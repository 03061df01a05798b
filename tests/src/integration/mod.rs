//! Cross-crate integration tests.

pub mod capacity;
pub mod correlation;
pub mod end_to_end;

#[cfg(test)]
mod fixtures;
