//! Low-level interface to the ADRV904X
//!
//! This module implements a register-level interface to the ADRV904X. Users of
//! this library should typically not need to use this. Please consider using
//! the [high-level interface] instead.
//!
//! The part is addressed through an SPI-to-AHB bridge: every access names a
//! 32-bit address, either in the direct SPI register space (small addresses,
//! byte-wide configuration registers) or in AHB memory (program memories of
//! the slice processors and the radio sequencer). The bridge instruction
//! format is one opcode byte followed by the big-endian address; data follows
//! little-endian, matching the byte order of the part's memories.
//!
//! **NOTE**: Many field access methods accept types that have a larger number
//! of bits than the field actually consists of. If you use such a method to
//! pass a value that is too large to be written to the field, it will be
//! silently truncated.
//!
//! [high-level interface]: ../hl/index.html

use core::{fmt, marker::PhantomData};

use embedded_hal::spi::Operation;

use crate::{maybe_async_attr, spi_type};

/// Bridge opcode: read one 32-bit register
const OP_REGISTER_READ: u8 = 0x01;
/// Bridge opcode: write one 32-bit register through a bit mask
const OP_REGISTER_WRITE: u8 = 0x02;
/// Bridge opcode: read a byte block from AHB memory
const OP_MEMORY_READ: u8 = 0x03;
/// Bridge opcode: write a byte block to AHB memory
const OP_MEMORY_WRITE: u8 = 0x04;

/// Per-slice stream control registers, in stream download order
///
/// The first two entries (main and kfa) are byte-wide control registers in the
/// direct SPI space; base address and stream count live in the three bytes
/// that follow each of them. The channel slices use 32-bit stream config
/// register pairs in AHB space, config 1 at offset 4.
pub(crate) const STREAM_CTL_ADDR: [u32; 20] = [
    0x0000_0800, // main
    0x0000_0810, // kfa
    0x6080_0000, // tx0
    0x6090_0000, // tx1
    0x60a0_0000, // tx2
    0x60b0_0000, // tx3
    0x60c0_0000, // tx4
    0x60d0_0000, // tx5
    0x60e0_0000, // tx6
    0x60f0_0000, // tx7
    0x6000_0000, // rx0
    0x6010_0000, // rx1
    0x6020_0000, // rx2
    0x6030_0000, // rx3
    0x6040_0000, // rx4
    0x6050_0000, // rx5
    0x6060_0000, // rx6
    0x6070_0000, // rx7
    0x6100_0000, // orx0
    0x6110_0000, // orx1
];

/// Hardware default of the core slice control register
pub(crate) const CORE_STREAM_CTL_DEFAULT: u32 = 0x80;
/// Reset-hold bit within the core slice control register
pub(crate) const CORE_STREAM_RESET_BIT: u32 = 6;
/// Byte offsets of the core stream base and count registers
pub(crate) const CORE_STREAM_BASE_BYTE0_OFFSET: u32 = 1;
pub(crate) const CORE_STREAM_BASE_BYTE1_OFFSET: u32 = 2;
pub(crate) const CORE_LAST_STREAM_NUM_OFFSET: u32 = 3;

/// Reset-hold bit within a channel slice's stream config 0 register
pub(crate) const CHAN_STREAM_RESET_BIT: u32 = 23;
/// Field positions within a channel slice's stream config 1 register
pub(crate) const CHAN_STREAM_BASE_BYTE0_BIT: u32 = 0;
pub(crate) const CHAN_STREAM_BASE_BYTE1_BIT: u32 = 8;
pub(crate) const CHAN_LAST_STREAM_NUM_BIT: u32 = 16;

/// Base address of the radio sequencer instruction memory
pub(crate) const SEQ_INSTR_MEM_ADDR: u32 = 0x0110_0000;
/// Registers holding the loaded sequence size and CRC for the sequencer's
/// own runtime cross-check
pub(crate) const SEQ_SEQUENCE_SIZE_ADDR: u32 = 0x0004_7c00;
pub(crate) const SEQ_SEQUENCE_CRC_ADDR: u32 = 0x0004_7c04;

/// Entry point to the ADRV904X driver's low-level API
///
/// Please consider using [hl::Adrv904x] instead.
///
/// [hl::Adrv904x]: ../hl/struct.Adrv904x.html
#[derive(Copy, Clone)]
pub struct Adrv904x<SPI> {
    pub(crate) spi: SPI,
}

impl<SPI> Adrv904x<SPI> {
    /// Create a new instance of `Adrv904x`
    ///
    /// Requires the SPI device the ADRV904X is connected to.
    pub fn new(spi: SPI) -> Self {
        Adrv904x { spi }
    }

    /// Allow access to the SPI bus
    pub fn bus(&mut self) -> &mut SPI {
        &mut self.spi
    }
}

fn instruction(opcode: u8, addr: u32) -> [u8; 5] {
    let addr = addr.to_be_bytes();
    [opcode, addr[0], addr[1], addr[2], addr[3]]
}

impl<SPI> Adrv904x<SPI>
where
    SPI: spi_type::spi::SpiDevice<u8>,
{
    /// Writes a 32-bit register through a bit mask
    ///
    /// Only the bits set in `mask` are changed by the bridge. Byte-wide
    /// registers in the direct SPI space are written with a mask of 0xFF.
    #[maybe_async_attr]
    pub async fn register_write(
        &mut self,
        addr: u32,
        value: u32,
        mask: u32,
    ) -> Result<(), Error<SPI>> {
        let mut buffer = [0; 13];
        buffer[..5].copy_from_slice(&instruction(OP_REGISTER_WRITE, addr));
        buffer[5..9].copy_from_slice(&value.to_le_bytes());
        buffer[9..13].copy_from_slice(&mask.to_le_bytes());

        self.spi.write(&buffer).await.map_err(Error::Spi)
    }

    /// Reads a 32-bit register
    #[maybe_async_attr]
    pub async fn register_read(&mut self, addr: u32) -> Result<u32, Error<SPI>> {
        let header = instruction(OP_REGISTER_READ, addr);
        let mut data = [0; 4];

        self.spi
            .transaction(&mut [Operation::Write(&header), Operation::Read(&mut data)])
            .await
            .map_err(Error::Spi)?;

        Ok(u32::from_le_bytes(data))
    }

    /// Writes a block of bytes to AHB memory, starting at `addr`
    #[maybe_async_attr]
    pub async fn memory_write(&mut self, addr: u32, data: &[u8]) -> Result<(), Error<SPI>> {
        let header = instruction(OP_MEMORY_WRITE, addr);

        self.spi
            .transaction(&mut [Operation::Write(&header), Operation::Write(data)])
            .await
            .map_err(Error::Spi)
    }

    /// Reads a block of bytes from AHB memory, starting at `addr`
    #[maybe_async_attr]
    pub async fn memory_read(&mut self, addr: u32, buffer: &mut [u8]) -> Result<(), Error<SPI>> {
        let header = instruction(OP_MEMORY_READ, addr);

        self.spi
            .transaction(&mut [Operation::Write(&header), Operation::Read(buffer)])
            .await
            .map_err(Error::Spi)
    }
}

/// Provides access to a register
///
/// You can get an instance for a given register using one of the methods on
/// [`Adrv904x`].
pub struct RegAccessor<'s, R, SPI>(&'s mut Adrv904x<SPI>, PhantomData<R>);

impl<'s, R, SPI> RegAccessor<'s, R, SPI>
where
    SPI: spi_type::spi::SpiDevice<u8>,
{
    /// Read from the register
    #[maybe_async_attr]
    pub async fn read(&mut self) -> Result<R::Read, Error<SPI>>
    where
        R: Register + Readable,
    {
        let mut r = R::read();
        self.0.memory_read(R::ADDR, R::buffer(&mut r)).await?;

        Ok(r)
    }

    /// Write to the register
    #[maybe_async_attr]
    pub async fn write<F>(&mut self, f: F) -> Result<(), Error<SPI>>
    where
        R: Register + Writable,
        F: FnOnce(&mut R::Write) -> &mut R::Write,
    {
        let mut w = R::write();
        f(&mut w);

        self.0.memory_write(R::ADDR, R::buffer(&mut w)).await
    }

    /// Modify the register
    #[maybe_async_attr]
    pub async fn modify<F>(&mut self, f: F) -> Result<(), Error<SPI>>
    where
        R: Register + Readable + Writable,
        F: for<'r> FnOnce(&mut R::Read, &'r mut R::Write) -> &'r mut R::Write,
    {
        let mut r = self.read().await?;
        let mut w = R::write();

        <R as Writable>::buffer(&mut w).copy_from_slice(<R as Readable>::buffer(&mut r));

        f(&mut r, &mut w);

        self.0.memory_write(R::ADDR, <R as Writable>::buffer(&mut w)).await
    }
}

/// An SPI error that can occur when communicating with the ADRV904X
pub enum Error<SPI>
where
    SPI: embedded_hal::spi::ErrorType,
{
    /// SPI error occured during a transaction
    Spi(SPI::Error),
}

// We can't derive this implementation, as the compiler will complain that the
// associated error type doesn't implement `Debug`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: embedded_hal::spi::ErrorType,
    SPI::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spi(error) => write!(f, "Spi({:?})", error),
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI> defmt::Format for Error<SPI>
where
    SPI: embedded_hal::spi::ErrorType,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Spi(_) => defmt::write!(f, "Spi()"),
        }
    }
}

/// Implemented for all registers
///
/// This is a mostly internal trait that should not be implemented or used
/// directly by users of this crate. It is exposed through the public API
/// though, so it can't be made private.
pub trait Register {
    /// The register's bridge address
    const ADDR: u32;

    /// The length of the register in bytes
    const LEN: usize;
}

/// Marker trait for registers that can be read from
///
/// This is a mostly internal trait that should not be implemented or used
/// directly by users of this crate. It is exposed through the public API
/// though, so it can't be made private.
pub trait Readable {
    /// The type that is used to read from the register
    type Read;

    /// Return the read type for this register
    fn read() -> Self::Read;

    /// Return the read type's internal buffer
    fn buffer(r: &mut Self::Read) -> &mut [u8];
}

/// Marker trait for registers that can be written to
///
/// This is a mostly internal trait that should not be implemented or used
/// directly by users of this crate. It is exposed through the public API
/// though, so it can't be made private.
pub trait Writable {
    /// The type that is used to write to the register
    type Write;

    /// Return the write type for this register
    fn write() -> Self::Write;

    /// Return the write type's internal buffer
    fn buffer(w: &mut Self::Write) -> &mut [u8];
}

/// Generates register implementations
macro_rules! impl_register {
    (
        $(
            $addr:expr,
            $len:expr,
            $rw:tt,
            $name:ident($name_lower:ident) {
            #[$doc:meta]
            $(
                $field:ident,
                $first_bit:expr,
                $last_bit:expr,
                $ty:ty;
                #[$field_doc:meta]
            )*
            }
        )*
    ) => {
        $(
            #[$doc]
            #[allow(non_camel_case_types)]
            pub struct $name;

            impl Register for $name {
                const ADDR: u32   = $addr;
                const LEN:  usize = $len;
            }

            #[$doc]
            pub mod $name_lower {
                use core::fmt;

                /// Used to read from the register
                pub struct R(pub(crate) [u8; $len]);

                impl R {
                    $(
                        #[$field_doc]
                        #[inline(always)]
                        pub fn $field(&self) -> $ty {
                            // Registers are at most 8 bytes, so the whole
                            // value fits a u64 staging word.
                            let mut raw: u64 = 0;
                            for (i, &byte) in self.0.iter().enumerate() {
                                raw |= (byte as u64) << (i * 8);
                            }

                            const WIDTH: u32 = $last_bit - $first_bit + 1;
                            let mask: u64 = if WIDTH >= 64 {
                                u64::MAX
                            } else {
                                (1u64 << WIDTH) - 1
                            };

                            ((raw >> $first_bit) & mask) as $ty
                        }
                    )*
                }

                impl fmt::Debug for R {
                    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                        write!(f, "0x")?;
                        for i in (0 .. $len).rev() {
                            write!(f, "{:02x}", self.0[i])?;
                        }

                        Ok(())
                    }
                }

                #[cfg(feature = "defmt")]
                impl defmt::Format for R {
                    fn format(&self, f: defmt::Formatter) {
                        defmt::write!(f, "0x");
                        for i in (0 .. $len).rev() {
                            defmt::write!(f, "{:02x}", self.0[i]);
                        }
                    }
                }

                /// Used to write to the register
                pub struct W(pub(crate) [u8; $len]);

                impl W {
                    $(
                        #[$field_doc]
                        #[inline(always)]
                        pub fn $field(&mut self, value: $ty) -> &mut Self {
                            let mut raw: u64 = 0;
                            for (i, &byte) in self.0.iter().enumerate() {
                                raw |= (byte as u64) << (i * 8);
                            }

                            const WIDTH: u32 = $last_bit - $first_bit + 1;
                            let mask: u64 = if WIDTH >= 64 {
                                u64::MAX
                            } else {
                                (1u64 << WIDTH) - 1
                            };

                            raw &= !(mask << $first_bit);
                            raw |= ((value as u64) & mask) << $first_bit;

                            for (i, byte) in self.0.iter_mut().enumerate() {
                                *byte = (raw >> (i * 8)) as u8;
                            }

                            self
                        }
                    )*
                }
            }

            impl_rw!($rw, $name, $name_lower, $len);

            impl<SPI> Adrv904x<SPI> {
                #[$doc]
                pub fn $name_lower(&mut self) -> RegAccessor<$name, SPI> {
                    RegAccessor(self, PhantomData)
                }
            }
        )*
    }
}

// Helper macro, used internally by `impl_register!`
macro_rules! impl_rw {
    (RO, $name:ident, $name_lower:ident, $len:expr) => {
        impl_rw!(@R, $name, $name_lower, $len);
    };
    (RW, $name:ident, $name_lower:ident, $len:expr) => {
        impl_rw!(@R, $name, $name_lower, $len);
        impl_rw!(@W, $name, $name_lower, $len);
    };

    (@R, $name:ident, $name_lower:ident, $len:expr) => {
        impl Readable for $name {
            type Read = $name_lower::R;

            fn read() -> Self::Read {
                $name_lower::R([0; $len])
            }

            fn buffer(r: &mut Self::Read) -> &mut [u8] {
                &mut r.0
            }
        }
    };
    (@W, $name:ident, $name_lower:ident, $len:expr) => {
        impl Writable for $name {
            type Write = $name_lower::W;

            fn write() -> Self::Write {
                $name_lower::W([0; $len])
            }

            fn buffer(w: &mut Self::Write) -> &mut [u8] {
                &mut w.0
            }
        }
    };
}

// All registers are implemented in this macro invocation. It follows the
// following syntax:
// <address>, <size-bytes>, <RO/RW>, <NAME(name)> { /// <doc>
//     <field>, <first-bit-index>, <last-bit-index>, <type>; /// <doc>
// }

impl_register! {
    0x0000_0a00, 1, RW, RADIO_CTL_RX_EN(radio_ctl_rx_en) { /// Rx channel SPI-mode enables
        rx_spi_en, 0, 7, u8; /// Rx0-7 enable bits
    }
    0x0000_0a01, 1, RW, RADIO_CTL_ORX_EN(radio_ctl_orx_en) { /// ORx channel SPI-mode enables
        orx_spi_en, 0, 1, u8; /// ORx0-1 enable bits
    }
    0x0000_0a02, 1, RW, RADIO_CTL_TX_EN(radio_ctl_tx_en) { /// Tx channel SPI-mode enables
        tx_spi_en, 0, 7, u8; /// Tx0-7 enable bits
    }
    0x0000_1c40, 1, RO, PLL_STATUS(pll_status) { /// Synthesizer lock status
        rf0_lock,    0, 0, u8; /// East RF PLL locked
        rf1_lock,    1, 1, u8; /// West RF PLL locked
        serdes_lock, 2, 2, u8; /// SERDES PLL locked
        clkgen_lock, 3, 3, u8; /// Clock generator PLL locked
    }
    0x0000_1c44, 2, RO, TEMP_SENSOR(temp_sensor) { /// Die temperature sensor readback
        value, 0, 15, u16; /// Raw reading, in sixteenths of a degree C above -273 C
    }
    0x0000_1d10, 2, RW, ANT_CAL_GAIN(ant_cal_gain) { /// Antenna cal carrier gain scratchpad
        rx_gain,  0,  7, u8; /// Rx gain index forced while antenna cal is active
        tx_atten, 8, 15, u8; /// Tx attenuation index forced while antenna cal is active
    }
    0x0000_1e00, 8, RW, LO0_FREQ(lo0_freq) { /// East LO frequency control word
        freq_khz, 0, 47, u64; /// Carrier frequency in kHz
    }
    0x0000_1e08, 8, RW, LO1_FREQ(lo1_freq) { /// West LO frequency control word
        freq_khz, 0, 47, u64; /// Carrier frequency in kHz
    }
}
