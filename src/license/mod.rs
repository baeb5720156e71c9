//! License reasoning: restrictiveness, compatibility and text identification.
//!
//! - [`restrictiveness`]: maps license identifiers onto the
//!   [`Restrictiveness`](crate::models::Restrictiveness) scale.
//! - [`compat`]: the one-directional "may I depend on you" predicate.
//! - [`identifier`]: n-gram classifier matching text against license templates.
//! - [`ids`]: identifiers a manifest may declare.

pub mod compat;
pub mod identifier;
pub mod ids;
pub mod restrictiveness;

/// Stand-in for an absent or unidentifiable license.
pub const UNKNOWN: &str = "Unknown";

/// Proprietary license with no grant to other parties.
pub const ALL_RIGHTS_RESERVED: &str = "AllRightsReserved";

pub const PUBLIC_DOMAIN: &str = "PublicDomain";
