use std::marker::PhantomData;
use std::ops::Index;
use std::ops::IndexMut;

/// A simple trait which requires that the structures implementing this trait can generate an index.
pub(crate) trait StorageKey: Copy {
    fn index(&self) -> usize;

    fn create_from_index(index: usize) -> Self;
}

/// A vector which can only be indexed by `Key`, so that e.g. per-variable and per-literal data
/// cannot be mixed up.
#[derive(Debug)]
pub(crate) struct KeyedVec<Key, Value> {
    key: PhantomData<Key>,
    elements: Vec<Value>,
}

impl<Key, Value> Default for KeyedVec<Key, Value> {
    fn default() -> Self {
        Self {
            key: PhantomData,
            elements: Vec::default(),
        }
    }
}

impl<Key: StorageKey, Value: Clone> KeyedVec<Key, Value> {
    /// A vector holding `len` copies of `value`.
    pub(crate) fn filled(len: usize, value: Value) -> Self {
        Self {
            key: PhantomData,
            elements: vec![value; len],
        }
    }
}

impl<Key: StorageKey, Value> KeyedVec<Key, Value> {
    pub(crate) fn len(&self) -> usize {
        self.elements.len()
    }

    pub(crate) fn push(&mut self, value: Value) -> Key {
        self.elements.push(value);
        Key::create_from_index(self.elements.len() - 1)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = Key> {
        (0..self.elements.len()).map(Key::create_from_index)
    }

    pub(crate) fn get(&self, key: Key) -> Option<&Value> {
        self.elements.get(key.index())
    }
}

impl<Key: StorageKey, Value> Index<Key> for KeyedVec<Key, Value> {
    type Output = Value;

    fn index(&self, key: Key) -> &Self::Output {
        &self.elements[key.index()]
    }
}

impl<Key: StorageKey, Value> IndexMut<Key> for KeyedVec<Key, Value> {
    fn index_mut(&mut self, key: Key) -> &mut Self::Output {
        &mut self.elements[key.index()]
    }
}

impl StorageKey for usize {
    fn index(&self) -> usize {
        *self
    }

    fn create_from_index(index: usize) -> Self {
        index
    }
}
