/// Administrative operations on a Medium tier store. The Slow tier is never touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Record counts by status and bytes used.
    Stats,
    /// One line per record, oldest first.
    List { limit: Option<usize> },
    /// Remove expired, stale-version and unreadable records.
    Purge,
    /// Remove the record for one locator (and scope).
    Invalidate { locator: String, scope: Option<String> },
    /// Remove every record.
    Clear,
}
