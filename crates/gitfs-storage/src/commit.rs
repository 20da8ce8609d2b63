//! Commit header parsing.

/// Returns the value of the first header line `"<key> <value>"` in a commit.
///
/// Only the header region is searched: scanning stops at the first empty line,
/// which separates the headers from the commit message.
pub fn commit_header<'a>(data: &'a [u8], key: &str) -> Option<&'a [u8]> {
    let key = key.as_bytes();
    for line in data.split(|&b| b == b'\n') {
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix(key).and_then(|v| v.strip_prefix(b" ")) {
            return Some(value);
        }
    }
    None
}
