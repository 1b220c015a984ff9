//! Demonstration records written by `initLedger`.

use crate::record::Record;

/// Details payload shared by every seed record, kept byte-for-byte as the
/// lending demo shipped it (including the stray closing brace).
pub const SEED_DETAILS: &str = "{'Tenor':'6','Amount':'10000','rate':'6'}}";

/// `(owner, timestamp, custodian)` for each seed record, in key order.
const SEED: [(&str, &str, &str); 8] = [
    ("Arnold", "1504054225", "Irene"),
    ("Bob", "1504057825", "Jenny"),
    ("calvin", "1493517025", "Kathy"),
    ("David", "1496105425", "Leslie"),
    ("Edward", "1493512301", "Mike"),
    ("Frankie", "1494117101", "Norman"),
    ("Gloria", "1496104301", "Oslen"),
    ("Helen", "1485066691", "Patrick"),
];

/// Number of seed records. Seeding occupies keys `"1"..="8"`.
pub const SEED_COUNT: usize = SEED.len();

/// The seed records in the order they are written.
pub fn seed_records() -> Vec<Record> {
    SEED.iter()
        .map(|(owner, timestamp, custodian)| Record::new(*owner, SEED_DETAILS, *timestamp, *custodian))
        .collect()
}

/// Ledger key of the seed record at 0-based position `index`.
pub fn seed_key(index: usize) -> String {
    (index + 1).to_string()
}
