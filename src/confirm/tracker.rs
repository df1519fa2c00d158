/// Holds the current and previous value of a tracked quantity.
///
/// `changed()` compares the two by value, so feeding the same value twice in a
/// row reads as "no transition". A fresh tracker reports no change until the
/// first `update`.
#[derive(Clone, Debug)]
pub struct ChangeTracker<T> {
    current: T,
    previous: T,
}

impl<T: Clone + PartialEq> ChangeTracker<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: initial.clone(),
            previous: initial,
        }
    }

    pub fn update(&mut self, value: T) {
        self.previous = std::mem::replace(&mut self.current, value);
    }

    pub fn changed(&self) -> bool {
        self.current != self.previous
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn previous(&self) -> &T {
        &self.previous
    }
}

impl<T: Clone + PartialEq + Default> Default for ChangeTracker<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn unchanged_until_first_update() {
        let tracker = ChangeTracker::new(0.0_f64);
        assert!(!tracker.changed());
        assert_eq!(*tracker.current(), 0.0);
    }

    #[test]
    fn detects_transitions_by_value() {
        let mut tracker = ChangeTracker::new(0usize);

        tracker.update(12);
        assert!(tracker.changed());
        assert_eq!(*tracker.previous(), 0);

        tracker.update(12);
        assert!(!tracker.changed());

        tracker.update(3);
        assert!(tracker.changed());
        assert_eq!(*tracker.previous(), 12);
        assert_eq!(*tracker.current(), 3);
    }

    #[test]
    fn compares_maps_structurally() {
        let mut tracker: ChangeTracker<BTreeMap<String, usize>> = ChangeTracker::default();

        let mut counts = BTreeMap::new();
        counts.insert("dog".to_string(), 1);
        tracker.update(counts.clone());
        assert!(tracker.changed());

        tracker.update(counts);
        assert!(!tracker.changed());
    }
}
