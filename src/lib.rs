//! Driver crate for the ADRV904X RF transceiver ASIC
//!
//! The recommended way to use this driver is the [high-level interface]. If you
//! require a higher degree of flexibility, you can use the
//! [register-level interface] instead.
//!
//! The high-level interface carries the device's runtime load state: the
//! stream-processor firmware image and the radio sequencer image are delivered
//! through [`Adrv904x::stream_image_write`] and
//! [`Adrv904x::radio_sequencer_image_write`] in arbitrary 4-byte-aligned
//! chunks, exactly as the binary files are read from storage.
//!
//! This driver is built on top of [`embedded-hal`], which means it is portable
//! and can be used on any platform that implements the `embedded-hal` API.
//!
//! [high-level interface]: hl/index.html
//! [register-level interface]: ll/index.html
//! [`Adrv904x::stream_image_write`]: hl/struct.Adrv904x.html#method.stream_image_write
//! [`Adrv904x::radio_sequencer_image_write`]: hl/struct.Adrv904x.html#method.radio_sequencer_image_write
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal
#![cfg_attr(not(any(test, feature = "std")), no_main)]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "async")]
use maybe_async::must_be_async as maybe_async_attr;
#[cfg(not(feature = "async"))]
use maybe_async::must_be_sync as maybe_async_attr;

#[cfg(not(feature = "async"))]
use embedded_hal as spi_type;
#[cfg(feature = "async")]
use embedded_hal_async as spi_type;

pub mod configs;
pub mod crc;
pub mod hl;
pub mod image;
pub mod ll;

/// Redirection of nb::block
pub mod block {
    pub use nb::block;
}

pub use crate::{
    block::block,
    configs::{Channels, Config},
    hl::{Adrv904x, ApiState, Error},
};
