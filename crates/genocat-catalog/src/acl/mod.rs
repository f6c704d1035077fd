//! ACL mutation.

mod mutator;

pub use mutator::{AclMutator, UpdateAclParams};
