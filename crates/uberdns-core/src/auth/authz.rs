//! Authorization gate
//!
//! Pure predicates over a resolved identity. Every mutating operation calls
//! the matching predicate before touching the store; a `false` becomes
//! `Error::Forbidden` and nothing is enqueued.

use crate::model::{Domain, Record, User};

/// Only the owner may change a record
///
/// Admin and staff get no override here. Id 0 is never a valid owner, so the
/// anonymous user is rejected even against an orphaned row.
pub fn can_mutate_record(user: &User, record: &Record) -> bool {
    user.is_authenticated() && user.id == record.owner_id
}

/// Domains belong to the operators
pub fn can_mutate_domain(user: &User, _domain: Option<&Domain>) -> bool {
    user.is_privileged()
}

/// Purging every cached record at once is an operator action
pub fn can_purge_globally(user: &User) -> bool {
    user.is_privileged()
}

/// Listing other users' records and the domain table
pub fn can_list_all(user: &User) -> bool {
    user.is_privileged()
}
