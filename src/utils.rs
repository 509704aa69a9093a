use core::fmt;

/// Creates an enum that can be converted from and to a primitive type, with invalid values becoming
/// a catch-all `Unknown` variant.
///
/// This is copied almost verbatim from [smoltcp].
///
/// [smoltcp]: https://github.com/m-labs/smoltcp/blob/cd893e6ab60f094d684b37be7bc013bf79f0459d/src/macros.rs
macro_rules! enum_with_unknown {
    (
        $( #[$enum_attr:meta] )*
        $v:vis enum $name:ident($ty:ty) {
            $(
              $( #[$variant_attr:meta] )*
              $variant:ident = $value:expr $(,)*
            ),*
        }
    ) => {
        $( #[$enum_attr] )*
        $v enum $name {
            $(
              $( #[$variant_attr] )*
              $variant,
            )*
            Unknown($ty)
        }

        impl ::core::convert::From<$ty> for $name {
            fn from(value: $ty) -> Self {
                match value {
                    $( $value => $name::$variant, )*
                    other => $name::Unknown(other)
                }
            }
        }

        impl ::core::convert::From<$name> for $ty {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $value, )*
                    $name::Unknown(other) => other
                }
            }
        }
    }
}

/// `Debug`-formats the head of a captured buffer as a hex dump.
///
/// Captured frames run to kilobytes; per-frame trace lines only need
/// enough of the buffer to recognize the radiotap preamble and frame
/// control, so the dump is capped and the total length is appended
/// instead.
#[derive(Copy, Clone)]
pub struct FrameDump<'a>(&'a [u8]);

impl<'a> FrameDump<'a> {
    /// How many leading bytes are printed before the dump is cut off.
    const HEAD: usize = 16;

    pub fn new(frame: &'a [u8]) -> Self {
        FrameDump(frame)
    }
}

impl fmt::Debug for FrameDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().take(Self::HEAD).enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        if self.0.len() > Self::HEAD {
            write!(f, " .. ({} bytes)", self.0.len())?;
        }
        Ok(())
    }
}
