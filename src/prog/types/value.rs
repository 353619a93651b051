//! Constant values kept in the native representation of their VARIANT-style packing code.

use std::fmt;

/// Packing code describing how a constant is stored (mirrors the VARIANT type codes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariantPacking {
    I1,
    UI1,
    I2,
    UI2,
    I4,
    UI4,
    I8,
    UI8,
    R4,
    R8,
    Bool,
}

impl VariantPacking {
    pub fn byte_size(self) -> u64 {
        match self {
            VariantPacking::I1 | VariantPacking::UI1 | VariantPacking::Bool => 1,
            VariantPacking::I2 | VariantPacking::UI2 => 2,
            VariantPacking::I4 | VariantPacking::UI4 | VariantPacking::R4 => 4,
            VariantPacking::I8 | VariantPacking::UI8 | VariantPacking::R8 => 8,
        }
    }

    /// Integral packings are the only ones an enum may use as its underlying storage.
    pub fn is_integral(self) -> bool {
        !matches!(
            self,
            VariantPacking::R4 | VariantPacking::R8 | VariantPacking::Bool
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            VariantPacking::I1
                | VariantPacking::I2
                | VariantPacking::I4
                | VariantPacking::I8
                | VariantPacking::R4
                | VariantPacking::R8
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstValue {
    I1(i8),
    UI1(u8),
    I2(i16),
    UI2(u16),
    I4(i32),
    UI4(u32),
    I8(i64),
    UI8(u64),
    R4(f32),
    R8(f64),
    Bool(bool),
}

impl ConstValue {
    pub fn packing(&self) -> VariantPacking {
        match self {
            ConstValue::I1(_) => VariantPacking::I1,
            ConstValue::UI1(_) => VariantPacking::UI1,
            ConstValue::I2(_) => VariantPacking::I2,
            ConstValue::UI2(_) => VariantPacking::UI2,
            ConstValue::I4(_) => VariantPacking::I4,
            ConstValue::UI4(_) => VariantPacking::UI4,
            ConstValue::I8(_) => VariantPacking::I8,
            ConstValue::UI8(_) => VariantPacking::UI8,
            ConstValue::R4(_) => VariantPacking::R4,
            ConstValue::R8(_) => VariantPacking::R8,
            ConstValue::Bool(_) => VariantPacking::Bool,
        }
    }

    pub fn zero(packing: VariantPacking) -> Self {
        match packing {
            VariantPacking::I1 => ConstValue::I1(0),
            VariantPacking::UI1 => ConstValue::UI1(0),
            VariantPacking::I2 => ConstValue::I2(0),
            VariantPacking::UI2 => ConstValue::UI2(0),
            VariantPacking::I4 => ConstValue::I4(0),
            VariantPacking::UI4 => ConstValue::UI4(0),
            VariantPacking::I8 => ConstValue::I8(0),
            VariantPacking::UI8 => ConstValue::UI8(0),
            VariantPacking::R4 => ConstValue::R4(0.0),
            VariantPacking::R8 => ConstValue::R8(0.0),
            VariantPacking::Bool => ConstValue::Bool(false),
        }
    }

    /// Packs `value` into `packing`, returning `None` when it does not fit.
    pub fn from_i128(packing: VariantPacking, value: i128) -> Option<Self> {
        let packed = match packing {
            VariantPacking::I1 => ConstValue::I1(i8::try_from(value).ok()?),
            VariantPacking::UI1 => ConstValue::UI1(u8::try_from(value).ok()?),
            VariantPacking::I2 => ConstValue::I2(i16::try_from(value).ok()?),
            VariantPacking::UI2 => ConstValue::UI2(u16::try_from(value).ok()?),
            VariantPacking::I4 => ConstValue::I4(i32::try_from(value).ok()?),
            VariantPacking::UI4 => ConstValue::UI4(u32::try_from(value).ok()?),
            VariantPacking::I8 => ConstValue::I8(i64::try_from(value).ok()?),
            VariantPacking::UI8 => ConstValue::UI8(u64::try_from(value).ok()?),
            VariantPacking::R4 => ConstValue::R4(value as f32),
            VariantPacking::R8 => ConstValue::R8(value as f64),
            VariantPacking::Bool => match value {
                0 => ConstValue::Bool(false),
                1 => ConstValue::Bool(true),
                _ => return None,
            },
        };
        Some(packed)
    }

    /// Integral view of the value; floating point constants have none.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            ConstValue::I1(v) => Some(v.into()),
            ConstValue::UI1(v) => Some(v.into()),
            ConstValue::I2(v) => Some(v.into()),
            ConstValue::UI2(v) => Some(v.into()),
            ConstValue::I4(v) => Some(v.into()),
            ConstValue::UI4(v) => Some(v.into()),
            ConstValue::I8(v) => Some(v.into()),
            ConstValue::UI8(v) => Some(v.into()),
            ConstValue::Bool(v) => Some(i128::from(v)),
            ConstValue::R4(_) | ConstValue::R8(_) => None,
        }
    }

    /// Re-packs the value into another packing code when the value is representable there.
    pub fn convert(self, packing: VariantPacking) -> Option<Self> {
        if self.packing() == packing {
            return Some(self);
        }
        match (self, packing) {
            (ConstValue::R4(v), VariantPacking::R8) => Some(ConstValue::R8(v.into())),
            (ConstValue::R8(v), VariantPacking::R4) => Some(ConstValue::R4(v as f32)),
            _ => ConstValue::from_i128(packing, self.as_i128()?),
        }
    }

    /// Adds one in the native representation. The flag reports whether the add wrapped.
    pub fn wrapping_increment(&self) -> Option<(Self, bool)> {
        let next = match *self {
            ConstValue::I1(v) => {
                let (n, o) = v.overflowing_add(1);
                (ConstValue::I1(n), o)
            }
            ConstValue::UI1(v) => {
                let (n, o) = v.overflowing_add(1);
                (ConstValue::UI1(n), o)
            }
            ConstValue::I2(v) => {
                let (n, o) = v.overflowing_add(1);
                (ConstValue::I2(n), o)
            }
            ConstValue::UI2(v) => {
                let (n, o) = v.overflowing_add(1);
                (ConstValue::UI2(n), o)
            }
            ConstValue::I4(v) => {
                let (n, o) = v.overflowing_add(1);
                (ConstValue::I4(n), o)
            }
            ConstValue::UI4(v) => {
                let (n, o) = v.overflowing_add(1);
                (ConstValue::UI4(n), o)
            }
            ConstValue::I8(v) => {
                let (n, o) = v.overflowing_add(1);
                (ConstValue::I8(n), o)
            }
            ConstValue::UI8(v) => {
                let (n, o) = v.overflowing_add(1);
                (ConstValue::UI8(n), o)
            }
            ConstValue::R4(_) | ConstValue::R8(_) | ConstValue::Bool(_) => return None,
        };
        Some(next)
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::R4(v) => write!(f, "{v}"),
            ConstValue::R8(v) => write!(f, "{v}"),
            ConstValue::Bool(v) => write!(f, "{v}"),
            other => match other.as_i128() {
                Some(value) => write!(f, "{value}"),
                None => write!(f, "?"),
            },
        }
    }
}
