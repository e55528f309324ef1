//! Matricule generation and validation
//!
//! Human-readable, date-encoded identifiers:
//! `<PREFIX>-<YYYYMMDD>-<4 uppercase hex>` with PREFIX in {PAT, PRX, ORD},
//! exactly 17 characters. The suffix is 2 cryptographically random bytes,
//! which gives 65536 values per day per prefix. The generator does NOT
//! guarantee uniqueness: the persistence layer enforces a uniqueness
//! constraint and callers retry generation on a violation.

use chrono::Utc;
use rand::RngCore;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Identifier family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatriculeKind {
    /// Patient
    Patient,
    /// Prescription
    Prescription,
    /// Prescription order (group)
    Order,
}

impl MatriculeKind {
    /// Three-letter prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            MatriculeKind::Patient => "PAT",
            MatriculeKind::Prescription => "PRX",
            MatriculeKind::Order => "ORD",
        }
    }

    fn pattern(&self) -> &'static Regex {
        static PAT: OnceLock<Regex> = OnceLock::new();
        static PRX: OnceLock<Regex> = OnceLock::new();
        static ORD: OnceLock<Regex> = OnceLock::new();
        match self {
            MatriculeKind::Patient => PAT
                .get_or_init(|| Regex::new(r"^PAT-\d{8}-[A-F0-9]{4}$").unwrap()),
            MatriculeKind::Prescription => PRX
                .get_or_init(|| Regex::new(r"^PRX-\d{8}-[A-F0-9]{4}$").unwrap()),
            // Orders may aggregate several prescriptions: 4-8 hex chars
            MatriculeKind::Order => ORD
                .get_or_init(|| Regex::new(r"^ORD-\d{8}-[A-F0-9]{4,8}$").unwrap()),
        }
    }
}

impl fmt::Display for MatriculeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Generate one matricule of the given kind, dated today
pub fn generate(kind: MatriculeKind) -> String {
    generate_with_suffix_bytes(kind, 2)
}

/// Patient matricule (`PAT-YYYYMMDD-XXXX`)
pub fn patient() -> String {
    generate(MatriculeKind::Patient)
}

/// Prescription matricule (`PRX-YYYYMMDD-XXXX`)
pub fn prescription() -> String {
    generate(MatriculeKind::Prescription)
}

/// Order matricule (`ORD-YYYYMMDD-XXXX`)
pub fn order() -> String {
    generate(MatriculeKind::Order)
}

/// Order-group matricule with a widened suffix
///
/// The suffix is widened with the number of prescriptions the order
/// aggregates (4 to 8 hex chars). Display/grouping convention only, not a
/// security boundary.
pub fn order_group(prescription_count: usize) -> String {
    let bytes = (2 + prescription_count / 4).clamp(2, 4);
    generate_with_suffix_bytes(MatriculeKind::Order, bytes)
}

fn generate_with_suffix_bytes(kind: MatriculeKind, suffix_bytes: usize) -> String {
    let mut buf = vec![0u8; suffix_bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    format!(
        "{}-{}-{}",
        kind.prefix(),
        Utc::now().format("%Y%m%d"),
        hex::encode_upper(&buf),
    )
}

/// Whether `value` is a well-formed matricule of the given kind
pub fn is_valid(kind: MatriculeKind, value: &str) -> bool {
    kind.pattern().is_match(value)
}

/// Detect which kind, if any, a value belongs to
pub fn kind_of(value: &str) -> Option<MatriculeKind> {
    [
        MatriculeKind::Patient,
        MatriculeKind::Prescription,
        MatriculeKind::Order,
    ]
    .into_iter()
    .find(|kind| is_valid(*kind, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_format_and_length() {
        for kind in [
            MatriculeKind::Patient,
            MatriculeKind::Prescription,
            MatriculeKind::Order,
        ] {
            let id = generate(kind);
            assert_eq!(id.len(), 17, "{}", id);
            assert!(id.starts_with(kind.prefix()));
            assert!(is_valid(kind, &id), "{}", id);
        }
    }

    #[test]
    fn test_validator_rejects_wrong_shape() {
        assert!(!is_valid(MatriculeKind::Patient, "PAT-2025011-AB12")); // 7-digit date
        assert!(!is_valid(MatriculeKind::Patient, "PAT-20250101-ab12")); // lowercase
        assert!(!is_valid(MatriculeKind::Patient, "PRX-20250101-AB12")); // wrong prefix
        assert!(!is_valid(MatriculeKind::Patient, "PAT-20250101-AB123")); // too long
        assert!(!is_valid(MatriculeKind::Patient, "PAT-20250101-GH12")); // non-hex
    }

    #[test]
    fn test_order_group_suffix_width() {
        let small = order_group(1);
        let large = order_group(12);
        assert!(is_valid(MatriculeKind::Order, &small), "{}", small);
        assert!(is_valid(MatriculeKind::Order, &large), "{}", large);
        assert!(large.len() > small.len());
        assert!(large.len() <= "ORD-YYYYMMDD-".len() + 8);
    }

    #[test]
    fn test_kind_detection() {
        assert_eq!(kind_of(&patient()), Some(MatriculeKind::Patient));
        assert_eq!(kind_of(&prescription()), Some(MatriculeKind::Prescription));
        assert_eq!(kind_of("garbage"), None);
    }

    #[test]
    fn test_uniqueness_birthday_bound() {
        // 10k draws from a 65536-value space: expected distinct is
        // 65536 * (1 - (1 - 1/65536)^10000) ~ 9273. Assert well below the
        // expectation so the test never flakes, well above catastrophic.
        let ids: HashSet<String> = (0..10_000).map(|_| prescription()).collect();
        assert!(ids.len() >= 9_000, "only {} distinct ids", ids.len());

        for id in ids.iter().take(50) {
            assert!(is_valid(MatriculeKind::Prescription, id), "{}", id);
        }
    }
}
