use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crossbeam::atomic::AtomicCell;

use super::now_millis;

pub type IdType = u64;
pub static ID_COUNTER: AtomicCell<IdType> = AtomicCell::new(1);

/// The last value handed out by [next_time_id]
static LAST_TIME_ID: AtomicCell<IdType> = AtomicCell::new(0);

/// A process-unique identifier for any type, such as a subscriber handle or a scheduled expiry.
pub struct Id<T> {
    value: IdType,
    kind: PhantomData<T>,
}

impl<T> Id<T> {
    /// Creates a new id.
    pub fn new() -> Self {
        Self {
            value: ID_COUNTER.fetch_add(1),
            kind: PhantomData,
        }
    }

    pub fn value(&self) -> IdType {
        self.value
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}
impl<T> Eq for Id<T> {}

/// Returns the current unix time in milliseconds, bumped if needed so that
/// every call in this process gets a strictly greater value than the last.
pub fn next_time_id() -> IdType {
    let now = now_millis().max(0) as IdType;

    loop {
        let last = LAST_TIME_ID.load();
        let next = now.max(last + 1);

        if LAST_TIME_ID.compare_exchange(last, next).is_ok() {
            return next;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_time_ids_are_strictly_increasing() {
        let ids: Vec<_> = (0..1000).map(|_| next_time_id()).collect();

        assert!(
            ids.windows(2).all(|w| w[0] < w[1]),
            "ids generated in the same millisecond must still increase"
        );
    }

    #[test]
    fn test_ids_are_unique() {
        struct Marker;

        let first = Id::<Marker>::new();
        let second = Id::<Marker>::new();

        assert_ne!(first, second);
        assert_eq!(first, first.clone());
    }
}
