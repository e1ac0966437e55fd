//! Numerator/denominator pairs as stored in ISO 21496-1 metadata.

use std::fmt;

use serde::ser::{Serialize, SerializeStruct, Serializer};

macro_rules! rational {
    ($(#[$meta:meta])* $name:ident, $numerator:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name {
            pub numerator: $numerator,
            pub denominator: u32,
        }

        impl $name {
            pub const fn new(numerator: $numerator, denominator: u32) -> Self {
                Self {
                    numerator,
                    denominator,
                }
            }

            /// Returns the quotient, or `None` for a zero denominator.
            pub fn value(self) -> Option<f64> {
                if self.denominator == 0 {
                    return None;
                }
                Some(f64::from(self.numerator) / f64::from(self.denominator))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}/{}", self.numerator, self.denominator)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut state = serializer.serialize_struct(stringify!($name), 3)?;
                state.serialize_field("numerator", &self.numerator)?;
                state.serialize_field("denominator", &self.denominator)?;
                state.serialize_field("value", &self.value())?;
                state.end()
            }
        }
    };
}

rational!(
    /// Unsigned fraction (headrooms, gamma).
    URational,
    u32
);

rational!(
    /// Signed fraction (gain map range, offsets).
    SRational,
    i32
);
