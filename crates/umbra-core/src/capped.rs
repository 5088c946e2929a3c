//! Fixed-capacity lists for per-frame scene data.

use std::ops::Deref;

use crate::error::{Error, Result};

/// A `Vec` that refuses to grow past a fixed capacity.
///
/// Pushing into a full list returns [`Error::CapacityExceeded`] and leaves the
/// contents untouched, so callers that don't care can simply ignore the error.
#[derive(Debug, Clone)]
pub struct CappedVec<T> {
    what: &'static str,
    capacity: usize,
    items: Vec<T>,
}

impl<T> CappedVec<T> {
    pub fn new(what: &'static str, capacity: usize) -> Self {
        Self {
            what,
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    /// Appends `item`, returning its index.
    pub fn push(&mut self, item: T) -> Result<usize> {
        if self.items.len() >= self.capacity {
            return Err(Error::CapacityExceeded {
                what: self.what,
                capacity: self.capacity,
            });
        }
        self.items.push(item);
        Ok(self.items.len() - 1)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }
}

impl<T> Deref for CappedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_past_capacity_is_rejected() {
        let mut list = CappedVec::new("lights", 2);
        assert_eq!(list.push(1), Ok(0));
        assert_eq!(list.push(2), Ok(1));
        assert!(list.is_full());
        assert_eq!(
            list.push(3),
            Err(Error::CapacityExceeded {
                what: "lights",
                capacity: 2
            })
        );
        assert_eq!(&list[..], &[1, 2]);
    }

    #[test]
    fn clear_frees_capacity_again() {
        let mut list = CappedVec::new("instances", 1);
        assert!(list.push(0).is_ok());
        assert!(list.push(1).is_err());

        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.push(2), Ok(0));
        assert_eq!(list.capacity(), 1);
    }
}
