//! High-level interface to the ADRV904X
//!
//! The entry point to this API is the [Adrv904x] struct. Please refer to the
//! documentation there for more details.
//!
//! This module implements a high-level interface to the ADRV904X. This is the
//! recommended way to access the ADRV904X using this crate, unless you need
//! the greater flexibility provided by the [register-level interface].
//!
//! [register-level interface]: ../ll/index.html

use core::fmt;

pub use error::*;
pub use radio::*;

use crate::configs::{Config, StreamGpioMapping, TxToOrxMappingConfig};
use crate::ll;

use self::sequencer::RsLoadSession;
use self::stream::StreamLoadSession;

mod error;
mod radio;
mod sequencer;
mod stream;

/// Runtime state flags of the device
///
/// Parts of the API require an image to be present before they can operate;
/// these flags record which loads have completed on this device.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ApiState(u32);

impl ApiState {
    /// The stream processor image has been loaded
    pub const STREAM_LOADED: ApiState = ApiState(0x0000_0001);

    /// The radio sequencer image has been loaded
    pub const RADIO_SEQUENCER_LOADED: ApiState = ApiState(0x0000_0002);

    /// Whether all flags in `other` are set in `self`
    pub fn contains(self, other: ApiState) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn insert(&mut self, other: ApiState) {
        self.0 |= other.0;
    }
}

/// Runtime state carried alongside the register map
pub(crate) struct DeviceState {
    pub(crate) api_state: ApiState,
    pub(crate) initialized_channels: u32,
    pub(crate) stream: StreamLoadSession,
    pub(crate) rs: RsLoadSession,
    pub(crate) tx_to_orx: TxToOrxMappingConfig,
    pub(crate) gpio: StreamGpioMapping,
}

/// Entry point to the ADRV904X driver API
pub struct Adrv904x<SPI> {
    ll: ll::Adrv904x<SPI>,
    state: DeviceState,
}

impl<SPI> Adrv904x<SPI> {
    /// Create a new instance of `Adrv904x`
    ///
    /// Requires the SPI device the ADRV904X is connected to and the device
    /// configuration of the current use case.
    pub fn new(spi: SPI, config: Config) -> Self {
        Adrv904x {
            ll: ll::Adrv904x::new(spi),
            state: DeviceState {
                api_state: ApiState::default(),
                initialized_channels: config.initialized_channels,
                stream: StreamLoadSession::new(),
                rs: RsLoadSession::new(),
                tx_to_orx: TxToOrxMappingConfig::default(),
                gpio: StreamGpioMapping::default(),
            },
        }
    }

    /// Provides direct access to the register-level API
    ///
    /// Be aware that by using the register-level API, you can invalidate
    /// various assumptions that the high-level API makes about the operation
    /// of the ADRV904X. Don't use the register-level and high-level APIs in
    /// tandem, unless you know what you're doing.
    pub fn ll(&mut self) -> &mut ll::Adrv904x<SPI> {
        &mut self.ll
    }

    /// Returns the runtime state flags of the device
    pub fn api_state(&self) -> ApiState {
        self.state.api_state
    }

    /// Whether the stream processor image has been fully loaded
    pub fn is_stream_loaded(&self) -> bool {
        self.state.api_state.contains(ApiState::STREAM_LOADED)
    }

    /// Whether the radio sequencer image has been fully loaded
    pub fn is_radio_sequencer_loaded(&self) -> bool {
        self.state
            .api_state
            .contains(ApiState::RADIO_SEQUENCER_LOADED)
    }

    /// The initialized-channels mask this driver was created with
    pub fn initialized_channels(&self) -> u32 {
        self.state.initialized_channels
    }

    /// Tx to ORx mapping configuration extracted from the stream image
    ///
    /// Meaningful once a stream image header has been parsed.
    pub fn tx_to_orx_mapping(&self) -> &TxToOrxMappingConfig {
        &self.state.tx_to_orx
    }

    /// GPIO signal routing extracted from the stream image
    ///
    /// Meaningful once a stream image header has been parsed.
    pub fn stream_gpio_mapping(&self) -> &StreamGpioMapping {
        &self.state.gpio
    }
}

// Can't be derived without putting requirements on `SPI`.
impl<SPI> fmt::Debug for Adrv904x<SPI> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Adrv904x {{ api_state: ")?;
        self.state.api_state.fmt(f)?;
        write!(f, ", .. }}")?;

        Ok(())
    }
}
