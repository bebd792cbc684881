//! Type-safe SAI object ID wrappers.
//!
//! This module provides strongly-typed wrappers for SAI object IDs,
//! preventing accidental mixing of different object types (e.g., passing a
//! next-hop OID where a next-hop group OID is expected).

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw SAI object ID type (matches sai_object_id_t in C).
pub type RawSaiObjectId = u64;

/// Marker trait for SAI object kinds.
///
/// Each SAI object type implements this trait to enable compile-time
/// type checking of object IDs.
pub trait SaiObjectKind: Send + Sync + 'static {
    /// Returns the SAI object type name for debugging.
    fn type_name() -> &'static str;
}

/// A type-safe SAI object ID.
///
/// The phantom type parameter `T` indicates what kind of SAI object this
/// ID refers to; IDs of different kinds cannot be compared or substituted
/// for one another.
#[derive(Clone, Copy)]
pub struct SaiObjectId<T: SaiObjectKind> {
    raw: RawSaiObjectId,
    _marker: PhantomData<T>,
}

impl<T: SaiObjectKind> SaiObjectId<T> {
    /// The null object ID (SAI_NULL_OBJECT_ID).
    pub const NULL: Self = Self {
        raw: 0,
        _marker: PhantomData,
    };

    /// Creates a new object ID from a raw value.
    ///
    /// Returns `None` if the raw value is 0 (null object ID).
    pub fn from_raw(raw: RawSaiObjectId) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self {
                raw,
                _marker: PhantomData,
            })
        }
    }

    /// Creates a new object ID from a raw value, including null.
    pub const fn from_raw_unchecked(raw: RawSaiObjectId) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Returns the raw object ID value.
    pub const fn as_raw(&self) -> RawSaiObjectId {
        self.raw
    }

    /// Returns true if this is a null object ID.
    pub const fn is_null(&self) -> bool {
        self.raw == 0
    }

    /// Returns true if this is a valid (non-null) object ID.
    pub const fn is_valid(&self) -> bool {
        self.raw != 0
    }
}

impl<T: SaiObjectKind> fmt::Debug for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:016x})", T::type_name(), self.raw)
    }
}

impl<T: SaiObjectKind> fmt::Display for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.raw)
    }
}

impl<T: SaiObjectKind> PartialEq for SaiObjectId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: SaiObjectKind> Eq for SaiObjectId<T> {}

impl<T: SaiObjectKind> Hash for SaiObjectId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: SaiObjectKind> Default for SaiObjectId<T> {
    fn default() -> Self {
        Self::NULL
    }
}

macro_rules! define_object_kind {
    ($name:ident, $type_name:literal, $oid_alias:ident) => {
        /// Marker type for SAI objects of this kind.
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl SaiObjectKind for $name {
            fn type_name() -> &'static str {
                $type_name
            }
        }

        /// Type alias for object IDs of this kind.
        pub type $oid_alias = SaiObjectId<$name>;
    };
}

define_object_kind!(SwitchKind, "Switch", SwitchOid);
define_object_kind!(PortKind, "Port", PortOid);
define_object_kind!(VirtualRouterKind, "VirtualRouter", VirtualRouterOid);
define_object_kind!(RouterInterfaceKind, "RouterInterface", RouterInterfaceOid);
define_object_kind!(NextHopKind, "NextHop", NextHopOid);
define_object_kind!(NextHopGroupKind, "NextHopGroup", NextHopGroupOid);
define_object_kind!(
    NextHopGroupMemberKind,
    "NextHopGroupMember",
    NextHopGroupMemberOid
);
define_object_kind!(NeighborEntryKind, "NeighborEntry", NeighborEntryOid);
define_object_kind!(RouteEntryKind, "RouteEntry", RouteEntryOid);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid_creation() {
        let group = NextHopGroupOid::from_raw(0x4000000000001).unwrap();
        assert_eq!(group.as_raw(), 0x4000000000001);
        assert!(group.is_valid());
        assert!(!group.is_null());
    }

    #[test]
    fn test_null_oid() {
        assert!(NextHopOid::from_raw(0).is_none());
        assert!(NextHopOid::NULL.is_null());
        assert!(!NextHopOid::NULL.is_valid());
    }

    #[test]
    fn test_oid_debug() {
        let rif = RouterInterfaceOid::from_raw(0x6000000000001).unwrap();
        let debug = format!("{:?}", rif);
        assert!(debug.contains("RouterInterface"));
        assert!(debug.contains("0x0006000000000001"));
    }

    #[test]
    fn test_oid_equality() {
        let a = NextHopOid::from_raw(1).unwrap();
        let b = NextHopOid::from_raw(1).unwrap();
        let c = NextHopOid::from_raw(2).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
