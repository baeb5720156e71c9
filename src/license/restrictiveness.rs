use crate::license::UNKNOWN;
use crate::models::Restrictiveness;

/// Classify a license identifier on the restrictiveness scale.
///
/// Lookup order: the exact identifier, then its family prefix (the text
/// before the first `-`, so `GPL-3.0` falls back to `GPL`), then `Unknown`.
pub fn restrictiveness(license_id: &str) -> Restrictiveness {
    let family = license_id.split('-').next().unwrap_or(license_id);
    lookup(license_id)
        .or_else(|| lookup(family))
        .unwrap_or(Restrictiveness::Unknown)
}

fn lookup(key: &str) -> Option<Restrictiveness> {
    let level = match key {
        // Permissive
        "Apache-1.1"
        | "BSL"
        | "BSD"
        | "IJG"
        | "ISC"
        | "MIT"
        | "OpenSSL"
        | "PublicDomain"
        | "W3C"
        | "Zlib" => Restrictiveness::Permissive,

        // Less restrictive
        "Apache-2.0" => Restrictiveness::LessRestrictive,

        // Restrictive
        "AFL"
        | "AGPL"
        | "AllRightsReserved"
        | "Artistic"
        | "CDDL-1.0"
        | "CPOL"
        | "CPL-1.0"
        | "EPL"
        | "EUPL"
        | "GPL"
        | "LGPL"
        | "MPL"
        | "MS-RL"
        | "RPSL"
        | "SPL" => Restrictiveness::Restrictive,

        UNKNOWN => Restrictiveness::Unknown,

        _ => return None,
    };
    Some(level)
}
