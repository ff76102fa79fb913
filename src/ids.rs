//! Dense newtype identifiers for the arena-backed automata.
//!
//! TNFA states, TDFA states, registers and capture groups are all addressed
//! by small `usize` indices into a contiguous `Vec`, never by reference.
//! One macro generates each id type, keeping the index/arithmetic/`Display`
//! boilerplate in a single place instead of repeated per type.

macro_rules! impl_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(usize);

        impl $name {
            /// Create a new id from a raw index.
            #[inline]
            pub const fn new(index: usize) -> Self {
                $name(index)
            }

            /// Get the id as a `usize`.
            #[inline]
            pub fn as_usize(&self) -> usize {
                self.0
            }
        }

        impl core::ops::Add<usize> for $name {
            type Output = $name;

            #[inline]
            fn add(self, rhs: usize) -> Self::Output {
                $name(self.0 + rhs)
            }
        }

        impl<T> std::ops::Index<$name> for [T] {
            type Output = T;

            #[inline]
            fn index(&self, index: $name) -> &Self::Output {
                &self[index.0]
            }
        }

        impl<T> std::ops::IndexMut<$name> for [T] {
            #[inline]
            fn index_mut(&mut self, index: $name) -> &mut T {
                &mut self[index.0]
            }
        }

        impl<T> std::ops::Index<$name> for Vec<T> {
            type Output = T;

            #[inline]
            fn index(&self, index: $name) -> &Self::Output {
                &self[index.0]
            }
        }

        impl<T> std::ops::IndexMut<$name> for Vec<T> {
            #[inline]
            fn index_mut(&mut self, index: $name) -> &mut T {
                &mut self[index.0]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<usize> for $name {
            fn from(index: usize) -> Self {
                $name::new(index)
            }
        }
    };
}

impl_id!(
    /// Id of a state in a [`crate::tnfa::Tnfa`].
    NfaStateId
);
impl_id!(
    /// Id of a state in a [`crate::tdfa::Tdfa`].
    DfaStateId
);
impl_id!(
    /// Id of a capture group, `0` is the whole match.
    GroupId
);
impl_id!(
    /// Id of a register allocated during determinization.
    RegisterId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_index_vecs() {
        let v = vec!["a", "b", "c"];
        assert_eq!(v[NfaStateId::new(1)], "b");
    }

    #[test]
    fn ids_add_offset() {
        assert_eq!(NfaStateId::new(3) + 4, NfaStateId::new(7));
    }
}
