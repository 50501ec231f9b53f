//! Order-stable, duplicate-free set unions over `Vec`.
//!
//! Every "add to set" write in the registry goes through here so that the
//! in-memory and Postgres adapters agree on the resulting order.

/// Append each item of `incoming` to `target` unless already present.
/// Returns how many items were actually added.
pub fn union_into<T: PartialEq + Clone>(target: &mut Vec<T>, incoming: &[T]) -> usize {
    let mut added = 0;
    for item in incoming {
        if !target.contains(item) {
            target.push(item.clone());
            added += 1;
        }
    }
    added
}

/// Owned union of two slices, `a` first.
pub fn union<T: PartialEq + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    union_into(&mut out, a);
    union_into(&mut out, b);
    out
}
