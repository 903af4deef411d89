// Binary record file framing: [version: u8][wincode payload].

pub(super) const RECORDS_VERSION: u8 = 1;

pub(super) fn with_version_prefix(version: u8, payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(version);
    out.extend_from_slice(&payload);
    out
}

/// Splits a framed blob into (version, payload). None for an empty blob.
pub(super) fn split_version(bytes: &[u8]) -> Option<(u8, &[u8])> {
    bytes.split_first().map(|(v, rest)| (*v, rest))
}
