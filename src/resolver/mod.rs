//! Hierarchical resolution over the topology.
//!
//! Both resolvers walk the same [`ScopeChain`]: the queried node followed by
//! its ancestors up to the enterprise, with GLOBAL as the implicit fallback.
//! Resolution is read-only and a pure function of [`KernelState`].
//!
//! [`KernelState`]: crate::state::KernelState

pub mod chain;
pub mod compliance;
pub mod flags;

pub use chain::{ChainLink, ScopeChain};
pub use compliance::{resolve_effective_compliance, ComplianceMode};
pub use flags::{resolve_effective_flag, resolve_effective_flags};
