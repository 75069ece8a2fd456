pub type Result<T, E> = core::result::Result<T, Error<E>>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The Bus was expected to be pulled high by a ~5K ohm pull-up resistor, but it wasn't
    BusNotHigh,

    /// Pin Error
    Pin(E),

    /// An unexpected response was received from a command. This generally happens when no device
    /// answers a reset, or a sensor is added or removed from the bus during a device search.
    UnexpectedResponse,

    FamilyCodeMismatch,
    CrcMismatch,
    Timeout,
}

impl<E> Error<E> {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BusNotHigh => "Bus not high",
            Self::Pin(_) => "Pin error",
            Self::UnexpectedResponse => "Unexpected response",
            Self::FamilyCodeMismatch => "Family code mismatch",
            Self::CrcMismatch => "CRC mismatch",
            Self::Timeout => "Timeout",
        }
    }
}

impl<E> From<E> for Error<E> {
    fn from(value: E) -> Self {
        Self::Pin(value)
    }
}
