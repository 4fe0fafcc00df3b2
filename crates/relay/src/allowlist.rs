//! Static allow-list of caller identities.

use std::collections::HashSet;

/// Set of caller identities permitted to use the relay.
///
/// Built once at startup and never mutated; share it as `Arc<Allowlist>`.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    ids: HashSet<String>,
}

impl Allowlist {
    #[must_use]
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated list (`"U1, U2,,U3"`).
    ///
    /// Entries are trimmed and empty entries dropped. This is configuration parsing only:
    /// [`Allowlist::is_authorized`] compares caller ids verbatim.
    #[must_use]
    pub fn from_csv(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        )
    }

    /// True iff `caller_id` is non-empty and present in the list (exact, case-sensitive).
    ///
    /// An empty list denies everyone.
    #[must_use]
    pub fn is_authorized(&self, caller_id: &str) -> bool {
        !caller_id.is_empty() && self.ids.contains(caller_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_exact() {
        let list = Allowlist::new(["U1", "U2"]);
        assert!(list.is_authorized("U1"));
        assert!(list.is_authorized("U2"));
        assert!(!list.is_authorized("u1"));
        assert!(!list.is_authorized(" U1"));
        assert!(!list.is_authorized("U3"));
    }

    #[test]
    fn empty_caller_is_never_authorized() {
        let list = Allowlist::new([""]);
        assert!(!list.is_authorized(""));
    }

    #[test]
    fn empty_list_fails_closed() {
        let list = Allowlist::from_csv("");
        assert!(list.is_empty());
        assert!(!list.is_authorized("U1"));
        assert!(!list.is_authorized(""));
    }

    #[test]
    fn csv_trims_and_drops_blanks() {
        let list = Allowlist::from_csv(" U1, U2 ,, ,U3");
        assert_eq!(list.len(), 3);
        assert!(list.is_authorized("U2"));
        assert!(!list.is_authorized(" U2 "));
    }
}
