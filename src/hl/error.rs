use core::fmt;
use core::fmt::{Display, Formatter};

use embedded_hal::spi;

use crate::image::ImageError;
use crate::ll;

/// An error that can occur while operating the device
pub enum Error<SPI>
where
    SPI: spi::ErrorType,
{
    /// Error occured while using SPI bus
    Spi(ll::Error<SPI>),

    /// An image chunk's length was zero or not a multiple of four bytes
    InvalidChunkSize {
        /// Length of the rejected chunk
        len: usize,
    },

    /// An image chunk's byte offset was not a multiple of four
    InvalidChunkOffset {
        /// Offset of the rejected chunk
        offset: u32,
    },

    /// An image container could not be parsed or failed verification
    Image(ImageError),

    /// The configuration was not valid. Some combinations of settings are not
    /// allowed.
    InvalidConfiguration,
}

impl<SPI> From<ll::Error<SPI>> for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: ll::Error<SPI>) -> Self {
        Error::Spi(error)
    }
}

impl<SPI> From<ImageError> for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: ImageError) -> Self {
        Error::Image(error)
    }
}

impl<SPI> Display for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "std")]
impl<SPI> std::error::Error for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
}

// We can't derive this implementation, as `Debug` is only implemented
// conditionally for `ll::Error`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spi(error) => write!(f, "Spi({:?})", error),
            Error::InvalidChunkSize { len } => {
                write!(f, "InvalidChunkSize {{ len: {:?} }}", len)
            }
            Error::InvalidChunkOffset { offset } => {
                write!(f, "InvalidChunkOffset {{ offset: {:?} }}", offset)
            }
            Error::Image(error) => write!(f, "Image({:?})", error),
            Error::InvalidConfiguration => write!(f, "InvalidConfiguration"),
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI> defmt::Format for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Spi(error) => defmt::write!(f, "Spi({})", error),
            Error::InvalidChunkSize { len } => {
                defmt::write!(f, "InvalidChunkSize {{ len: {} }}", len)
            }
            Error::InvalidChunkOffset { offset } => {
                defmt::write!(f, "InvalidChunkOffset {{ offset: {} }}", offset)
            }
            Error::Image(error) => defmt::write!(f, "Image({})", error),
            Error::InvalidConfiguration => defmt::write!(f, "InvalidConfiguration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use embedded_hal_mock::eh1::spi::Mock as SpiMock;

    #[test]
    fn image_errors_convert() {
        let error: Error<SpiMock<u8>> = ImageError::Truncated { required_len: 608 }.into();

        assert!(matches!(
            error,
            Error::Image(ImageError::Truncated { required_len: 608 })
        ));
    }
}
