//! Recognized license identifiers.
//!
//! [`LICENSE_IDS`] are SPDX identifiers the classifier may have a template
//! for. Manifests may additionally declare the non-SPDX identifiers in
//! [`EXTRA_IDS`].

use crate::license::{ALL_RIGHTS_RESERVED, PUBLIC_DOMAIN, UNKNOWN};

pub const LICENSE_IDS: &[&str] = &[
    "0BSD",
    "AAL",
    "AFL-1.1",
    "AFL-1.2",
    "AFL-2.0",
    "AFL-2.1",
    "AFL-3.0",
    "AGPL-1.0",
    "AGPL-3.0",
    "AGPL-3.0-only",
    "AGPL-3.0-or-later",
    "APSL-2.0",
    "Apache-1.0",
    "Apache-1.1",
    "Apache-2.0",
    "Artistic-1.0",
    "Artistic-2.0",
    "BSD-1-Clause",
    "BSD-2-Clause",
    "BSD-3-Clause",
    "BSD-3-Clause-Clear",
    "BSD-4-Clause",
    "BSL-1.0",
    "CC-BY-3.0",
    "CC-BY-4.0",
    "CC-BY-SA-4.0",
    "CC0-1.0",
    "CDDL-1.0",
    "CDDL-1.1",
    "CPAL-1.0",
    "CPL-1.0",
    "ECL-2.0",
    "EPL-1.0",
    "EPL-2.0",
    "EUPL-1.1",
    "EUPL-1.2",
    "GPL-1.0",
    "GPL-2.0",
    "GPL-2.0-only",
    "GPL-2.0-or-later",
    "GPL-3.0",
    "GPL-3.0-only",
    "GPL-3.0-or-later",
    "IJG",
    "ISC",
    "LGPL-2.0",
    "LGPL-2.1",
    "LGPL-2.1-only",
    "LGPL-2.1-or-later",
    "LGPL-3.0",
    "LGPL-3.0-only",
    "LGPL-3.0-or-later",
    "LPPL-1.3c",
    "MIT",
    "MIT-0",
    "MPL-1.0",
    "MPL-1.1",
    "MPL-2.0",
    "MS-PL",
    "MS-RL",
    "NCSA",
    "OFL-1.1",
    "OSL-3.0",
    "OpenSSL",
    "PHP-3.01",
    "PostgreSQL",
    "Python-2.0",
    "RPSL-1.0",
    "SPL-1.0",
    "UPL-1.0",
    "Unlicense",
    "W3C",
    "WTFPL",
    "X11",
    "ZPL-2.1",
    "Zlib",
];

pub const EXTRA_IDS: &[&str] = &[ALL_RIGHTS_RESERVED, PUBLIC_DOMAIN, UNKNOWN];

fn valid_ids() -> impl Iterator<Item = &'static str> {
    LICENSE_IDS.iter().chain(EXTRA_IDS).copied()
}

/// Return true if `id` may appear in a manifest's `license` field.
pub fn is_valid_license(id: &str) -> bool {
    valid_ids().any(|valid| valid == id)
}

/// Return the recognized identifier equal to `id` ignoring case, if any.
pub fn suggest(id: &str) -> Option<&'static str> {
    let lower = id.to_lowercase();
    valid_ids().find(|valid| valid.to_lowercase() == lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_licenses() {
        assert!(is_valid_license("MIT"));
        assert!(is_valid_license("GPL-3.0"));
        assert!(is_valid_license("AllRightsReserved"));
        assert!(is_valid_license("Unknown"));
        assert!(!is_valid_license("bogus"));
        assert!(!is_valid_license("mit"));
    }

    #[test]
    fn test_suggest() {
        assert_eq!(suggest("mit"), Some("MIT"));
        assert_eq!(suggest("apache-2.0"), Some("Apache-2.0"));
        assert_eq!(suggest("publicdomain"), Some("PublicDomain"));
        assert_eq!(suggest("bogus"), None);
    }

    #[test]
    fn test_ids_are_sorted_and_unique() {
        let mut sorted = LICENSE_IDS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, LICENSE_IDS);
    }
}
