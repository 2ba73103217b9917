//! Parallel-compatibility analysis between scheduled tasks.

use crate::task::UsageRecord;

/// Decide whether two tasks may record and submit concurrently, without a
/// barrier batch between their command lists.
///
/// Both usage lists must be sorted by resource identity; the setup pass
/// guarantees that. A single merge walk then finds every resource used by
/// both sides in `O(|lhs| + |rhs|)`. A shared resource conflicts when the two
/// sides need different entry states, or when either side uses it in more
/// than one state internally (or writes it) and therefore owns it for the
/// duration of its list.
pub fn can_execute_parallel(lhs: &[UsageRecord], rhs: &[UsageRecord]) -> bool {
    let mut it1 = lhs.iter().peekable();
    let mut it2 = rhs.iter().peekable();

    while let (Some(a), Some(b)) = (it1.peek(), it2.peek()) {
        if a.resource < b.resource {
            it1.next();
        } else if b.resource < a.resource {
            it2.next();
        } else {
            if a.first_state != b.first_state || a.multiple_use || b.multiple_use {
                return false;
            }
            it1.next();
            it2.next();
        }
    }

    true
}
