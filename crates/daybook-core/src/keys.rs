// ABOUTME: Backend key layout for journal data.
// ABOUTME: Index key holds an owner's summary array; entry keys hold full records.

const NAMESPACE: &str = "journal";
const INDEX_SUFFIX: &str = ":entries";

/// `journal:{owner}:entries`
pub fn index_key(owner: &str) -> String {
    format!("{}:{}{}", NAMESPACE, owner, INDEX_SUFFIX)
}

/// `journal:{owner}:entry:{id}`
pub fn entry_key(owner: &str, entry_id: &str) -> String {
    format!("{}{}", entry_prefix(owner), entry_id)
}

/// Prefix shared by every entry key of one owner.
pub fn entry_prefix(owner: &str) -> String {
    format!("{}:{}:entry:", NAMESPACE, owner)
}

/// Prefix shared by every key daybook writes.
pub fn namespace_prefix() -> String {
    format!("{}:", NAMESPACE)
}

/// Recover the owner from an index key, if the key is one.
pub fn owner_from_index_key(key: &str) -> Option<&str> {
    key.strip_prefix(NAMESPACE)
        .and_then(|rest| rest.strip_prefix(':'))
        .and_then(|rest| rest.strip_suffix(INDEX_SUFFIX))
        .filter(|owner| !owner.is_empty())
}

/// Recover the owner from an entry key. Keys whose id part contains a
/// separator are rejected as ambiguous.
pub fn owner_from_entry_key(key: &str) -> Option<&str> {
    let rest = key.strip_prefix(NAMESPACE)?.strip_prefix(':')?;
    let (owner, entry_id) = rest.rsplit_once(":entry:")?;
    if owner.is_empty() || entry_id.is_empty() || entry_id.contains(':') {
        return None;
    }
    Some(owner)
}
