//! Raw type codes used to drive the signature parser.

raw_enum! {
    /// A single D-Bus type code, as it appears in a signature string.
    #[repr(u8)]
    pub enum Type {
        BYTE = b'y',
        BOOLEAN = b'b',
        INT16 = b'n',
        UINT16 = b'q',
        INT32 = b'i',
        UINT32 = b'u',
        INT64 = b'x',
        UINT64 = b't',
        DOUBLE = b'd',
        STRING = b's',
        OBJECT_PATH = b'o',
        SIGNATURE = b'g',
        VARIANT = b'v',
        UNIX_FD = b'h',
        ARRAY = b'a',
        OPEN_PAREN = b'(',
        CLOSE_PAREN = b')',
        OPEN_BRACE = b'{',
        CLOSE_BRACE = b'}',
    }
}

impl Type {
    /// Test if this type code denotes a basic (non-container) type, the
    /// only kind allowed as a dict key.
    pub const fn is_basic(self) -> bool {
        matches!(
            self,
            Self::BYTE
                | Self::BOOLEAN
                | Self::INT16
                | Self::UINT16
                | Self::INT32
                | Self::UINT32
                | Self::INT64
                | Self::UINT64
                | Self::DOUBLE
                | Self::STRING
                | Self::OBJECT_PATH
                | Self::SIGNATURE
                | Self::UNIX_FD
        )
    }
}
