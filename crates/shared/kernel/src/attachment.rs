//! Typed attachments carried by a deployment unit between processors.
//!
//! Keys are `const` values identified by name, so subsystems can share a key by
//! exporting it:
//!
//! ```rust
//! use dhub_kernel::attachment::{AttachmentKey, Attachments};
//!
//! const CONTEXT_ROOT: AttachmentKey<String> = AttachmentKey::new("web.context-root");
//!
//! let mut attachments = Attachments::default();
//! attachments.put(CONTEXT_ROOT, "/shop".to_owned());
//! assert_eq!(attachments.get(CONTEXT_ROOT).map(String::as_str), Some("/shop"));
//! ```

use fxhash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

type Slot = Box<dyn Any + Send + Sync>;

/// Key for a single attachment value of type `T`.
pub struct AttachmentKey<T> {
    name: &'static str,
    marker: PhantomData<fn() -> T>,
}

impl<T> AttachmentKey<T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name, marker: PhantomData }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for AttachmentKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for AttachmentKey<T> {}

impl<T> fmt::Debug for AttachmentKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttachmentKey({})", self.name)
    }
}

/// Key for an attachment that accumulates values of type `T`.
pub struct AttachmentList<T> {
    name: &'static str,
    marker: PhantomData<fn() -> T>,
}

impl<T> AttachmentList<T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name, marker: PhantomData }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for AttachmentList<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for AttachmentList<T> {}

impl<T> fmt::Debug for AttachmentList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttachmentList({})", self.name)
    }
}

/// Heterogeneous attachment bag.
///
/// A key whose name is bound to a value of another type behaves as absent.
#[derive(Default)]
pub struct Attachments {
    values: FxHashMap<&'static str, Slot>,
    lists: FxHashMap<&'static str, Slot>,
}

impl Attachments {
    /// Stores `value`, returning the previous value of the same type.
    pub fn put<T: Send + Sync + 'static>(&mut self, key: AttachmentKey<T>, value: T) -> Option<T> {
        self.values
            .insert(key.name, Box::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
            .map(|previous| *previous)
    }

    #[must_use]
    pub fn get<T: 'static>(&self, key: AttachmentKey<T>) -> Option<&T> {
        self.values.get(key.name).and_then(|slot| slot.downcast_ref::<T>())
    }

    pub fn get_mut<T: 'static>(&mut self, key: AttachmentKey<T>) -> Option<&mut T> {
        self.values.get_mut(key.name).and_then(|slot| slot.downcast_mut::<T>())
    }

    /// Removes the value if it is a `T`; a value of another type stays in place.
    pub fn remove<T: 'static>(&mut self, key: AttachmentKey<T>) -> Option<T> {
        if !self.contains(key) {
            return None;
        }
        self.values
            .remove(key.name)
            .and_then(|slot| slot.downcast::<T>().ok())
            .map(|value| *value)
    }

    #[must_use]
    pub fn contains<T: 'static>(&self, key: AttachmentKey<T>) -> bool {
        self.get(key).is_some()
    }

    /// Appends to a list attachment, creating it on first use. A list stored
    /// under the same name with another element type is replaced.
    pub fn add_to_list<T: Send + Sync + 'static>(&mut self, key: AttachmentList<T>, value: T) {
        let slot = self.lists.entry(key.name).or_insert_with(|| Box::new(Vec::<T>::new()));
        if !slot.is::<Vec<T>>() {
            tracing::warn!(attachment = key.name, "Replacing list attachment of another type");
            *slot = Box::new(Vec::<T>::new());
        }
        if let Some(list) = slot.downcast_mut::<Vec<T>>() {
            list.push(value);
        }
    }

    /// The list contents; empty when nothing was added.
    #[must_use]
    pub fn list<T: 'static>(&self, key: AttachmentList<T>) -> &[T] {
        self.lists
            .get(key.name)
            .and_then(|slot| slot.downcast_ref::<Vec<T>>())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Removes and returns the list contents.
    pub fn take_list<T: 'static>(&mut self, key: AttachmentList<T>) -> Vec<T> {
        if self.lists.get(key.name).is_none_or(|slot| !slot.is::<Vec<T>>()) {
            return Vec::new();
        }
        self.lists
            .remove(key.name)
            .and_then(|slot| slot.downcast::<Vec<T>>().ok())
            .map_or_else(Vec::new, |list| *list)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len() + self.lists.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Attachments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut values: Vec<_> = self.values.keys().collect();
        let mut lists: Vec<_> = self.lists.keys().collect();
        values.sort();
        lists.sort();
        f.debug_struct("Attachments").field("values", &values).field("lists", &lists).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNT: AttachmentKey<u32> = AttachmentKey::new("count");
    const COUNT_AS_TEXT: AttachmentKey<String> = AttachmentKey::new("count");
    const MODULES: AttachmentList<String> = AttachmentList::new("modules");

    #[test]
    fn test_put_get_replace() {
        let mut attachments = Attachments::default();
        assert_eq!(attachments.put(COUNT, 1), None);
        assert_eq!(attachments.put(COUNT, 2), Some(1));

        *attachments.get_mut(COUNT).unwrap() += 1;
        assert_eq!(attachments.get(COUNT), Some(&3));
        assert_eq!(attachments.remove(COUNT), Some(3));
        assert!(!attachments.contains(COUNT));
    }

    #[test]
    fn test_type_mismatch_is_absent() {
        let mut attachments = Attachments::default();
        attachments.put(COUNT, 7);

        assert_eq!(attachments.get(COUNT_AS_TEXT), None);
        assert!(!attachments.contains(COUNT_AS_TEXT));
        assert_eq!(attachments.remove(COUNT_AS_TEXT), None);
        assert_eq!(attachments.get(COUNT), Some(&7), "mismatched remove keeps the value");
    }

    #[test]
    fn test_lists_accumulate_and_drain() {
        let mut attachments = Attachments::default();
        assert!(attachments.list(MODULES).is_empty());

        attachments.add_to_list(MODULES, "a.jar".to_owned());
        attachments.add_to_list(MODULES, "b.jar".to_owned());
        assert_eq!(attachments.list(MODULES), ["a.jar", "b.jar"]);

        assert_eq!(attachments.take_list(MODULES).len(), 2);
        assert!(attachments.is_empty());
    }
}
