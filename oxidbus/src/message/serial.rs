use std::fmt;
use std::num::NonZeroU32;

/// An opaque identifier for a message serial.
///
/// Serials are unique per [`Connection`] while a call is outstanding and
/// monotonically increasing.
///
/// [`Connection`]: crate::Connection
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Serial(NonZeroU32);

impl Serial {
    /// A placeholder serial carried by a [`Message`][crate::Message] that
    /// has not yet been sent; overwritten with the allocated serial at send
    /// time.
    pub(crate) const PLACEHOLDER: Serial = Serial(match NonZeroU32::new(1) {
        Some(v) => v,
        None => panic!("1 is never zero"),
    });

    #[inline]
    pub(crate) fn new(serial: NonZeroU32) -> Self {
        Self(serial)
    }

    /// Validate a serial read off the wire, where 0 is forbidden.
    pub(crate) fn from_wire(value: u32) -> crate::error::Result<Self> {
        match NonZeroU32::new(value) {
            Some(v) => Ok(Self(v)),
            None => Err(crate::error::Error::new(
                crate::error::ErrorKind::SignatureMismatch,
            )),
        }
    }

    #[inline]
    pub(crate) fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Serial {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Serial {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Allocates serials starting at 1, wrapping past 0 on overflow per the
/// D-Bus specification.
#[derive(Debug)]
pub(crate) struct SerialAllocator {
    next: u32,
}

impl SerialAllocator {
    pub(crate) fn new() -> Self {
        Self { next: 1 }
    }

    pub(crate) fn next(&mut self) -> Serial {
        let value = self.next;
        self.next = self.next.wrapping_add(1);

        if self.next == 0 {
            self.next = 1;
        }

        // SAFETY: `value` is never 0: the allocator starts at 1 and skips 0
        // on wraparound.
        Serial::new(NonZeroU32::new(value).expect("serial allocator never yields zero"))
    }
}
