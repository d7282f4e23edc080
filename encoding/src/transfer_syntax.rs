//! Module for the set of supported transfer syntaxes.
//!
//! The full registry of the standard is out of scope: the supported set
//! comprises the uncompressed little endian syntaxes. Anything else is
//! deliberately kept out so that callers receive a typed
//! unsupported-transfer-syntax error instead of garbled pixel data.

use std::fmt;

/// Enumeration of the supported transfer syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferSyntax {
    /// _Implicit VR Little Endian_: the default transfer syntax.
    /// Element headers carry no VR; it is resolved from the data dictionary.
    ImplicitVRLittleEndian,
    /// _Explicit VR Little Endian_:
    /// element headers carry the VR of the value.
    ExplicitVRLittleEndian,
}

impl TransferSyntax {
    /// The unique identifier of Implicit VR Little Endian.
    pub const IMPLICIT_VR_LITTLE_ENDIAN: &'static str = "1.2.840.10008.1.2";
    /// The unique identifier of Explicit VR Little Endian.
    pub const EXPLICIT_VR_LITTLE_ENDIAN: &'static str = "1.2.840.10008.1.2.1";

    /// Look up a transfer syntax by its unique identifier.
    ///
    /// Trailing null padding in the UID is ignored, as UI values are
    /// padded to an even length on encoding. `None` means the transfer
    /// syntax is not in the supported set, whether or not the UID is a
    /// registered one.
    pub fn from_uid(uid: &str) -> Option<Self> {
        match uid.trim_end_matches(|c| c == '\0' || c == ' ') {
            Self::IMPLICIT_VR_LITTLE_ENDIAN => Some(TransferSyntax::ImplicitVRLittleEndian),
            Self::EXPLICIT_VR_LITTLE_ENDIAN => Some(TransferSyntax::ExplicitVRLittleEndian),
            _ => None,
        }
    }

    /// Retrieve the unique identifier of this transfer syntax.
    pub fn uid(self) -> &'static str {
        match self {
            TransferSyntax::ImplicitVRLittleEndian => Self::IMPLICIT_VR_LITTLE_ENDIAN,
            TransferSyntax::ExplicitVRLittleEndian => Self::EXPLICIT_VR_LITTLE_ENDIAN,
        }
    }

    /// Retrieve the readable name of this transfer syntax.
    pub fn name(self) -> &'static str {
        match self {
            TransferSyntax::ImplicitVRLittleEndian => "Implicit VR Little Endian",
            TransferSyntax::ExplicitVRLittleEndian => "Explicit VR Little Endian",
        }
    }

    /// Whether element headers carry an explicit VR field.
    pub fn explicit_vr(self) -> bool {
        match self {
            TransferSyntax::ImplicitVRLittleEndian => false,
            TransferSyntax::ExplicitVRLittleEndian => true,
        }
    }
}

impl fmt::Display for TransferSyntax {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::TransferSyntax;

    #[test]
    fn supported_uids_resolve() {
        assert_eq!(
            TransferSyntax::from_uid("1.2.840.10008.1.2"),
            Some(TransferSyntax::ImplicitVRLittleEndian)
        );
        assert_eq!(
            TransferSyntax::from_uid("1.2.840.10008.1.2.1\0"),
            Some(TransferSyntax::ExplicitVRLittleEndian)
        );
    }

    #[test]
    fn unsupported_uids_do_not_resolve() {
        // explicit VR big endian
        assert_eq!(TransferSyntax::from_uid("1.2.840.10008.1.2.2"), None);
        // JPEG baseline
        assert_eq!(TransferSyntax::from_uid("1.2.840.10008.1.2.4.50"), None);
        // deflated explicit VR little endian
        assert_eq!(TransferSyntax::from_uid("1.2.840.10008.1.2.1.99"), None);
    }
}
