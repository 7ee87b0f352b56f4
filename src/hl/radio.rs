//! Signal-path control: channel enables, synthesizer status, antenna cal
//!
//! These calls drive the radio-control registers in the direct SPI space.
//! Channel enables only affect channels that are in SPI control mode; pin
//! mode channels follow their TRX_CTRL pins instead and ignore these
//! registers.

use crate::configs::Channels;
use crate::{maybe_async_attr, spi_type};

use super::{Adrv904x, Error};

/// Lock status of the part's synthesizers
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllLockStatus {
    /// East RF PLL
    pub rf0: bool,
    /// West RF PLL
    pub rf1: bool,
    /// SERDES PLL
    pub serdes: bool,
    /// Clock generator PLL
    pub clkgen: bool,
}

impl PllLockStatus {
    /// Whether every synthesizer reports lock
    pub fn all_locked(&self) -> bool {
        self.rf0 && self.rf1 && self.serdes && self.clkgen
    }
}

/// Selects one of the two RF local oscillators
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoSel {
    /// East LO
    Lo0,
    /// West LO
    Lo1,
}

/// Gain settings forced while antenna cal is active on a channel
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AntCalCarrierGain {
    /// Rx gain index
    pub rx_gain: u8,
    /// Tx attenuation index
    pub tx_atten: u8,
}

/// LO tuning range of the part, in kHz
const LO_FREQ_MIN_KHZ: u64 = 650_000;
const LO_FREQ_MAX_KHZ: u64 = 6_000_000;

impl<SPI> Adrv904x<SPI>
where
    SPI: spi_type::spi::SpiDevice<u8>,
{
    /// Enables or disables Rx, ORx and Tx channels that are in SPI control
    /// mode
    ///
    /// The bits set in each `*_mask` select the channels affected by this
    /// call; the matching bit in the `*_enable` parameter decides whether the
    /// selected channel is enabled or disabled. All masks use the bit
    /// assignments of [`Channels`]. Bits outside the part's channels fail
    /// with [`Error::InvalidConfiguration`].
    ///
    /// This function should be called after initialization and loading the
    /// stream processors.
    #[maybe_async_attr]
    pub async fn rx_tx_enable_set(
        &mut self,
        orx_mask: u32,
        orx_enable: u32,
        rx_mask: u32,
        rx_enable: u32,
        tx_mask: u32,
        tx_enable: u32,
    ) -> Result<(), Error<SPI>> {
        if rx_mask & !Channels::RX_ALL != 0
            || orx_mask & !Channels::ORX_ALL != 0
            || tx_mask & !Channels::TX_ALL != 0
        {
            return Err(Error::InvalidConfiguration);
        }

        let rx_bits = rx_mask as u8;
        let rx_enable = rx_enable as u8;
        self.ll
            .radio_ctl_rx_en()
            .modify(|r, w| w.rx_spi_en((r.rx_spi_en() & !rx_bits) | (rx_enable & rx_bits)))
            .await?;

        let orx_bits = (orx_mask >> 8) as u8;
        let orx_enable = (orx_enable >> 8) as u8;
        self.ll
            .radio_ctl_orx_en()
            .modify(|r, w| w.orx_spi_en((r.orx_spi_en() & !orx_bits) | (orx_enable & orx_bits)))
            .await?;

        let tx_bits = (tx_mask >> Channels::TX_OFFSET) as u8;
        let tx_enable = (tx_enable >> Channels::TX_OFFSET) as u8;
        self.ll
            .radio_ctl_tx_en()
            .modify(|r, w| w.tx_spi_en((r.tx_spi_en() & !tx_bits) | (tx_enable & tx_bits)))
            .await?;

        Ok(())
    }

    /// Returns the channels currently enabled in SPI control mode
    ///
    /// The returned masks `(orx, rx, tx)` use the bit assignments of
    /// [`Channels`].
    #[maybe_async_attr]
    pub async fn rx_tx_enable_get(&mut self) -> Result<(u32, u32, u32), Error<SPI>> {
        let rx = self.ll.radio_ctl_rx_en().read().await?.rx_spi_en() as u32;
        let orx = (self.ll.radio_ctl_orx_en().read().await?.orx_spi_en() as u32) << 8;
        let tx =
            (self.ll.radio_ctl_tx_en().read().await?.tx_spi_en() as u32) << Channels::TX_OFFSET;

        Ok((orx, rx, tx))
    }

    /// Reads the lock status of all synthesizers
    #[maybe_async_attr]
    pub async fn pll_lock_status(&mut self) -> Result<PllLockStatus, Error<SPI>> {
        let status = self.ll.pll_status().read().await?;

        Ok(PllLockStatus {
            rf0: status.rf0_lock() == 0b1,
            rf1: status.rf1_lock() == 0b1,
            serdes: status.serdes_lock() == 0b1,
            clkgen: status.clkgen_lock() == 0b1,
        })
    }

    /// Waits for every synthesizer to report lock
    ///
    /// Returns `WouldBlock` while any PLL is still unlocked, so this can be
    /// driven with `block!` or polled from a loop.
    #[maybe_async_attr]
    pub async fn pll_locked(&mut self) -> nb::Result<(), Error<SPI>> {
        let status = self
            .pll_lock_status()
            .await
            .map_err(nb::Error::Other)?;

        if status.all_locked() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Reads the die temperature, in millidegrees Celsius
    #[maybe_async_attr]
    pub async fn temperature_millidegrees(&mut self) -> Result<i32, Error<SPI>> {
        let raw = self.ll.temp_sensor().read().await?.value();

        Ok((raw as i32 * 1000) / 16 - 273_000)
    }

    /// Returns the frequency of the selected LO, in kHz
    #[maybe_async_attr]
    pub async fn lo_frequency_khz(&mut self, lo: LoSel) -> Result<u64, Error<SPI>> {
        let freq = match lo {
            LoSel::Lo0 => self.ll.lo0_freq().read().await?.freq_khz(),
            LoSel::Lo1 => self.ll.lo1_freq().read().await?.freq_khz(),
        };

        Ok(freq)
    }

    /// Retunes the selected LO
    ///
    /// `freq_khz` must be within the part's tuning range of 650 MHz to 6 GHz.
    /// The synthesizer needs time to re-lock after a retune; poll
    /// [`Adrv904x::pll_locked`] before enabling signal paths on this LO.
    #[maybe_async_attr]
    pub async fn set_lo_frequency_khz(
        &mut self,
        lo: LoSel,
        freq_khz: u64,
    ) -> Result<(), Error<SPI>> {
        if !(LO_FREQ_MIN_KHZ..=LO_FREQ_MAX_KHZ).contains(&freq_khz) {
            return Err(Error::InvalidConfiguration);
        }

        match lo {
            LoSel::Lo0 => self.ll.lo0_freq().write(|w| w.freq_khz(freq_khz)).await?,
            LoSel::Lo1 => self.ll.lo1_freq().write(|w| w.freq_khz(freq_khz)).await?,
        }

        Ok(())
    }

    /// Reads the antenna cal carrier gain scratchpad
    #[maybe_async_attr]
    pub async fn ant_cal_carrier_gain(&mut self) -> Result<AntCalCarrierGain, Error<SPI>> {
        let reg = self.ll.ant_cal_gain().read().await?;

        Ok(AntCalCarrierGain {
            rx_gain: reg.rx_gain(),
            tx_atten: reg.tx_atten(),
        })
    }

    /// Programs the antenna cal carrier gain scratchpad
    ///
    /// The stream processors force these settings on a channel while its
    /// antenna cal streams are active.
    #[maybe_async_attr]
    pub async fn set_ant_cal_carrier_gain(
        &mut self,
        gain: AntCalCarrierGain,
    ) -> Result<(), Error<SPI>> {
        self.ll
            .ant_cal_gain()
            .write(|w| w.rx_gain(gain.rx_gain).tx_atten(gain.tx_atten))
            .await?;

        Ok(())
    }
}
