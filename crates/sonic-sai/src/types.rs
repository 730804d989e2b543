//! Type-safe SAI object ID wrappers.
//!
//! Each object id carries its SAI object type in the upper 16 bits, the way
//! the virtual switch (and sairedis) encodes them, and a phantom kind so a
//! bridge port id cannot be passed where a VLAN id is expected.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw SAI object ID type (matches sai_object_id_t in C).
pub type RawSaiObjectId = u64;

/// Prefix used when an object id is written into ASIC_DB.
pub const OID_PREFIX: &str = "oid:0x";

/// Marker trait for SAI object kinds.
pub trait SaiObjectKind: Send + Sync + 'static {
    /// Returns the SAI object type name for debugging.
    fn type_name() -> &'static str;

    /// Returns the `SAI_OBJECT_TYPE_*` value for this kind.
    fn object_type() -> u16;
}

/// A type-safe SAI object ID.
///
/// # Examples
///
/// ```
/// use sonic_sai::{BridgePortOid, VlanOid};
///
/// let vlan = VlanOid::new(1);
/// assert_eq!(vlan.to_oid_string(), "oid:0x26000000000001");
///
/// // This would fail to compile:
/// // fn takes_bridge_port(p: BridgePortOid) {}
/// // takes_bridge_port(vlan);
/// ```
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

    /// Builds the id of the `index`-th object of this kind.
    pub fn new(index: u64) -> Self {
        let raw = (u64::from(T::object_type()) << 48) | (index & 0x0000_ffff_ffff_ffff);
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Creates an object ID from a raw value.
    ///
    /// Returns `None` for the null id or a value encoding another type.
    pub fn from_raw(raw: RawSaiObjectId) -> Option<Self> {
        if raw == 0 || (raw >> 48) as u16 != T::object_type() {
            None
        } else {
            Some(Self {
                raw,
                _marker: PhantomData,
            })
        }
    }

    /// Parses the `oid:0x...` form used in ASIC_DB.
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.strip_prefix(OID_PREFIX)?;
        RawSaiObjectId::from_str_radix(hex, 16)
            .ok()
            .and_then(Self::from_raw)
    }

    /// Returns the raw object ID value.
    pub const fn as_raw(&self) -> RawSaiObjectId {
        self.raw
    }

    pub const fn is_null(&self) -> bool {
        self.raw == 0
    }

    /// Formats the id the way ASIC_DB keys and attribute values carry it.
    pub fn to_oid_string(&self) -> String {
        format!("{}{:x}", OID_PREFIX, self.raw)
    }
}

impl<T: SaiObjectKind> fmt::Debug for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:016x})", T::type_name(), self.raw)
    }
}

impl<T: SaiObjectKind> fmt::Display for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:x}", OID_PREFIX, self.raw)
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

impl<T: SaiObjectKind> PartialOrd for SaiObjectId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: SaiObjectKind> Ord for SaiObjectId<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T: SaiObjectKind> Default for SaiObjectId<T> {
    fn default() -> Self {
        Self::NULL
    }
}

// ============================================================================
// Object Kind Markers
// ============================================================================

macro_rules! define_object_kind {
    ($name:ident, $type_name:literal, $object_type:literal, $oid_alias:ident) => {
        #[doc = concat!("Marker type for SAI ", $type_name, " objects.")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl SaiObjectKind for $name {
            fn type_name() -> &'static str {
                $type_name
            }

            fn object_type() -> u16 {
                $object_type
            }
        }

        #[doc = concat!("Type alias for ", $type_name, " object IDs.")]
        pub type $oid_alias = SaiObjectId<$name>;
    };
}

define_object_kind!(PortKind, "Port", 0x01, PortOid);
define_object_kind!(SwitchKind, "Switch", 0x21, SwitchOid);
define_object_kind!(VlanKind, "Vlan", 0x26, VlanOid);
define_object_kind!(VlanMemberKind, "VlanMember", 0x27, VlanMemberOid);
define_object_kind!(BridgePortKind, "BridgePort", 0x3a, BridgePortOid);
