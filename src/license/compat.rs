use crate::license::restrictiveness::restrictiveness;
use crate::license::{ALL_RIGHTS_RESERVED, UNKNOWN};
use crate::manifest::ManifestNode;
use crate::models::Restrictiveness;

/// Return true if a component licensed under `license_id` may depend on one
/// licensed under `dep_license_id`.
///
/// Deliberately one-directional and biased toward reporting:
/// - an unclassified dependency license is never compatible
/// - a permissive dependency license is always compatible
/// - otherwise the two identifiers must match, and `AllRightsReserved`
///   never matches itself since it carries no shared grant between parties
pub fn are_licenses_compatible(license_id: &str, dep_license_id: &str) -> bool {
    match restrictiveness(dep_license_id) {
        Restrictiveness::Unknown => false,
        Restrictiveness::Permissive => true,
        Restrictiveness::LessRestrictive | Restrictiveness::Restrictive => {
            dep_license_id == license_id && license_id != ALL_RIGHTS_RESERVED
        }
    }
}

/// Return true if `node` may depend on `dep`.
///
/// A copyright holder of `node` that is also a licensee or copyright holder
/// of `dep` authorizes the edge regardless of license identifiers.
pub fn is_dependent_license_compatible(node: &ManifestNode, dep: &ManifestNode) -> bool {
    let authorized = node.copyright_holders.iter().any(|owner| {
        dep.licensees.contains(owner) || dep.copyright_holders.contains(owner)
    });
    if authorized {
        return true;
    }

    are_licenses_compatible(
        node.license.as_deref().unwrap_or(UNKNOWN),
        dep.license.as_deref().unwrap_or(UNKNOWN),
    )
}
