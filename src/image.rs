//! Binary image container layouts
//!
//! Two containers are produced by the firmware tooling: the stream image
//! (`stream_image.bin`), carrying one code segment per slice processor plus a
//! large routing header, and the radio sequencer image, carrying the crossbar
//! settings, the pattern lookup table and the instruction sequence.
//!
//! Both are parsed from the first chunk the caller delivers. The layouts are
//! fixed; every field is described by its byte offset below rather than by
//! offset arithmetic spread through the loaders.

use byte::{ctx::Endian, BytesExt, TryRead, LE};
use core::marker::PhantomData;

use crate::configs::{
    gpio_for_selector, GpioAnalogPin, GpioPin, StreamGpioAnalogFeature, StreamGpioFeature,
    StreamGpioMapping, TxToOrxMappingConfig, GPIO_ANALOG_COUNT, GPIO_COUNT,
    TX_TO_ORX_PIN_TABLE_SIZE,
};

/// Version quadruple embedded in both image containers
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Version {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Maintenance version
    pub maintenance: u32,
    /// Build version
    pub build: u32,
}

/// Version of this API
///
/// Binary images are produced in lockstep with the API, so loaded images must
/// carry this exact version. No separate maximum is published; the minimum
/// version bounds the range on both sides.
pub const API_VERSION: Version = Version {
    major: 2,
    minor: 12,
    maintenance: 0,
    build: 4,
};

impl Version {
    /// Checks this version against an inclusive range, field by field
    pub fn within(&self, min: &Version, max: &Version) -> bool {
        self.major >= min.major
            && self.major <= max.major
            && self.minor >= min.minor
            && self.minor <= max.minor
            && self.maintenance >= min.maintenance
            && self.maintenance <= max.maintenance
            && self.build >= min.build
            && self.build <= max.build
    }
}

impl<'a> TryRead<'a, Endian> for Version {
    fn try_read(bytes: &'a [u8], endian: Endian) -> byte::Result<(Self, usize)> {
        let offset = &mut 0;

        let version = Version {
            major: bytes.read_with(offset, endian)?,
            minor: bytes.read_with(offset, endian)?,
            maintenance: bytes.read_with(offset, endian)?,
            build: bytes.read_with(offset, endian)?,
        };

        Ok((version, *offset))
    }
}

/// An error that can occur while parsing or verifying an image container
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ImageError {
    /// The supplied chunk is smaller than the data that must be parsed from
    /// it; retry with a first chunk of at least `required_len` bytes
    Truncated {
        /// Smallest first chunk that can be parsed
        required_len: usize,
    },

    /// The container does not start with the expected magic number
    BadMagic {
        /// Value found where the magic number belongs
        found: u32,
    },

    /// The image was built for a different API version
    UnsupportedVersion {
        /// Version embedded in the image
        found: Version,
    },

    /// The pattern lookup table does not fit the device's lookup memory
    LookupCapacity {
        /// Number of patterns declared by the header
        patterns: u32,
    },

    /// The instruction sequence does not fit the device's sequencer memory
    SequenceCapacity {
        /// Number of sequence words declared by the header
        words: u32,
    },

    /// The declared sequence load address is not the sequencer instruction
    /// memory base
    SequenceStart {
        /// Address declared by the header
        addr: u32,
    },

    /// A CRC embedded in the header did not match the delivered bytes
    Crc {
        /// Which checked region failed
        region: ImageRegion,
    },

    /// A field could not be decoded
    Decode(byte::Error),
}

/// CRC-checked regions of the radio sequencer image
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImageRegion {
    /// Pattern lookup table
    LookupTable,
    /// Instruction sequence
    Sequence,
    /// Whole file
    File,
}

impl From<byte::Error> for ImageError {
    fn from(error: byte::Error) -> Self {
        ImageError::Decode(error)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ImageError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ImageError::Truncated { required_len } => {
                defmt::write!(f, "Truncated {{ required_len: {} }}", required_len)
            }
            ImageError::BadMagic { found } => defmt::write!(f, "BadMagic {{ found: {:x} }}", found),
            ImageError::UnsupportedVersion { found } => {
                defmt::write!(f, "UnsupportedVersion {{ found: {} }}", found)
            }
            ImageError::LookupCapacity { patterns } => {
                defmt::write!(f, "LookupCapacity {{ patterns: {} }}", patterns)
            }
            ImageError::SequenceCapacity { words } => {
                defmt::write!(f, "SequenceCapacity {{ words: {} }}", words)
            }
            ImageError::SequenceStart { addr } => {
                defmt::write!(f, "SequenceStart {{ addr: {:x} }}", addr)
            }
            ImageError::Crc { region } => defmt::write!(f, "Crc {{ region: {} }}", region),
            ImageError::Decode(error) => {
                defmt::write!(f, "Decode({})", defmt::Debug2Format(error))
            }
        }
    }
}

/// A scalar field at a fixed byte offset within a container
pub(crate) struct Field<T> {
    offset: usize,
    ty: PhantomData<T>,
}

impl<T> Field<T>
where
    T: for<'a> TryRead<'a, Endian>,
{
    pub(crate) const fn at(offset: usize) -> Self {
        Field {
            offset,
            ty: PhantomData,
        }
    }

    pub(crate) fn read(&self, bytes: &[u8]) -> Result<T, ImageError> {
        let mut offset = self.offset;
        Ok(bytes.read_with(&mut offset, LE)?)
    }
}

/// Stream image layout
///
/// Offsets in bytes from the start of the file. The slice table carries 20
/// entries of 4-byte size plus 4-byte offset. Feature-selector tables carry
/// one 32-bit word per GPIO pin.
pub(crate) mod stream_layout {
    use super::{Field, Version};

    pub const VERSION: Field<Version> = Field::at(8);
    pub const HEADER_SIZE: Field<u32> = Field::at(24);
    pub const SLICE_TABLE: usize = 28;
    pub const SLICE_ENTRY_BYTES: usize = 8;
    pub const GPIO_FEATURES: usize = 190;
    pub const MAPPING_MODE: Field<u8> = Field::at(287);
    pub const TX_OBSERVABILITY: Field<u16> = Field::at(289);
    pub const ORX0_PIN_TABLE: usize = 291;
    pub const ORX1_PIN_TABLE: usize = 355;
    pub const AUTO_SWITCH_ORX_ATTEN: Field<u8> = Field::at(419);
    pub const AUTO_SWITCH_ORX_NCO: Field<u8> = Field::at(420);
    pub const VSWR_DIRECTION_POLARITY: usize = 437;
    pub const GPIO_ANALOG_FEATURES: usize = 440;
    pub const DTX_PIN_MODE: Field<u32> = Field::at(504);
    pub const MODEL_SWITCH_PIN_MODE: Field<u32> = Field::at(508);
    pub const ANT_CAL_OUT_PIN_MODE: Field<u32> = Field::at(512);
    pub const ANT_CAL_OUT_TABLE: usize = 563;
    pub const PREDRIVE_PIN_MODE: Field<u32> = Field::at(579);
    pub const DTX_EVENT_WAIT: Field<u32> = Field::at(596);

    /// End of the last parsed field; the declared header size is at least this
    pub const PARSED_SPAN: usize = 600;
}

/// Number of slice processors receiving a stream image segment
///
/// Download order: main, kfa, Tx0-7, Rx0-7, ORx0-1.
pub const STREAM_SLICE_COUNT: usize = 20;

/// Size and file offset of one slice's image segment
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SliceMeta {
    /// Segment size in bytes
    pub size: u32,
    /// Segment offset within the file in bytes
    pub offset: u32,
}

impl<'a> TryRead<'a, Endian> for SliceMeta {
    fn try_read(bytes: &'a [u8], endian: Endian) -> byte::Result<(Self, usize)> {
        let offset = &mut 0;

        let meta = SliceMeta {
            size: bytes.read_with(offset, endian)?,
            offset: bytes.read_with(offset, endian)?,
        };

        Ok((meta, *offset))
    }
}

/// Parsed stream image header
///
/// Produced from the first chunk of a stream image. Besides the slice table
/// that drives the load itself, the header carries the GPIO signal routing
/// authored in the stream generator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StreamImageHeader {
    /// Total header size in bytes; also where the main slice's segment starts
    pub header_size: u32,
    /// Version the image was built against
    pub version: Version,
    /// Per-slice segment size and offset
    pub slices: [SliceMeta; STREAM_SLICE_COUNT],
    /// Tx to ORx mapping configuration
    pub mapping: TxToOrxMappingConfig,
    /// GPIO feature routing
    pub gpio: StreamGpioMapping,
}

/// Parses the header of a stream image from its first chunk
///
/// The chunk must contain the complete header; its required size is declared
/// inside the header itself, so a too-small chunk fails with
/// [`ImageError::Truncated`] carrying the size to retry with.
pub fn parse_stream_header(chunk: &[u8]) -> Result<StreamImageHeader, ImageError> {
    // The header-size field itself must be readable before anything else.
    const HEADER_SIZE_FIELD_END: usize = 28;
    if chunk.len() < HEADER_SIZE_FIELD_END {
        return Err(ImageError::Truncated {
            required_len: HEADER_SIZE_FIELD_END,
        });
    }

    let header_size = stream_layout::HEADER_SIZE.read(chunk)?;
    let required_len = (header_size as usize).max(stream_layout::PARSED_SPAN);
    if chunk.len() < required_len {
        return Err(ImageError::Truncated { required_len });
    }

    let version: Version = stream_layout::VERSION.read(chunk)?;
    if !version.within(&API_VERSION, &API_VERSION) {
        return Err(ImageError::UnsupportedVersion { found: version });
    }

    let mut slices = [SliceMeta::default(); STREAM_SLICE_COUNT];
    let mut offset = stream_layout::SLICE_TABLE;
    for meta in slices.iter_mut() {
        *meta = chunk.read_with(&mut offset, LE)?;
    }

    let mut features = [0u32; GPIO_COUNT];
    let mut offset = stream_layout::GPIO_FEATURES;
    for word in features.iter_mut() {
        *word = chunk.read_with(&mut offset, LE)?;
    }

    let mut features_analog = [0u32; GPIO_ANALOG_COUNT];
    let mut offset = stream_layout::GPIO_ANALOG_FEATURES;
    for word in features_analog.iter_mut() {
        *word = chunk.read_with(&mut offset, LE)?;
    }

    let mapping = parse_tx_to_orx_mapping(chunk, &features)?;
    let gpio = parse_gpio_mapping(chunk, &features, &features_analog)?;

    Ok(StreamImageHeader {
        header_size,
        version,
        slices,
        mapping,
        gpio,
    })
}

fn parse_tx_to_orx_mapping(
    chunk: &[u8],
    features: &[u32; GPIO_COUNT],
) -> Result<TxToOrxMappingConfig, ImageError> {
    let mut gpio_select = [None; 8];
    for (bit, select) in gpio_select.iter_mut().enumerate() {
        let code = StreamGpioFeature::TxToOrxMappingBit0 as u32 + bit as u32;
        *select = gpio_for_selector(features, code).and_then(GpioPin::new);
    }

    let mut pin_table_orx0 = [0u32; TX_TO_ORX_PIN_TABLE_SIZE];
    let mut offset = stream_layout::ORX0_PIN_TABLE;
    for entry in pin_table_orx0.iter_mut() {
        *entry = chunk.read_with(&mut offset, LE)?;
    }

    let mut pin_table_orx1 = [0u32; TX_TO_ORX_PIN_TABLE_SIZE];
    let mut offset = stream_layout::ORX1_PIN_TABLE;
    for entry in pin_table_orx1.iter_mut() {
        *entry = chunk.read_with(&mut offset, LE)?;
    }

    Ok(TxToOrxMappingConfig {
        mode: stream_layout::MAPPING_MODE.read(chunk)?,
        tx_observability: stream_layout::TX_OBSERVABILITY.read(chunk)?,
        gpio_select,
        pin_table_orx0,
        pin_table_orx1,
        auto_switch_orx_atten: stream_layout::AUTO_SWITCH_ORX_ATTEN.read(chunk)? != 0,
        auto_switch_orx_nco: stream_layout::AUTO_SWITCH_ORX_NCO.read(chunk)? != 0,
    })
}

fn parse_gpio_mapping(
    chunk: &[u8],
    features: &[u32; GPIO_COUNT],
    features_analog: &[u32; GPIO_ANALOG_COUNT],
) -> Result<StreamGpioMapping, ImageError> {
    let mut gpio = StreamGpioMapping::default();

    // Features that act as plain stream trigger inputs need no further
    // decoding; the pin is simply armed.
    for (pin, &code) in features.iter().enumerate() {
        gpio.stream_input[pin] = code == StreamGpioFeature::TxAntennaCal as u32
            || code == StreamGpioFeature::RxAntennaCal as u32
            || code == StreamGpioFeature::TxPapForExtLo0Unlock as u32
            || code == StreamGpioFeature::TxPapForExtLo1Unlock as u32;
    }

    for (channel, input) in gpio.dtx_input.iter_mut().enumerate() {
        let code = StreamGpioFeature::DtxInputTx0 as u32 + channel as u32;
        *input = gpio_for_selector(features, code).and_then(GpioPin::new);
    }

    for (bit, select) in gpio.model_switch.iter_mut().enumerate() {
        let code = StreamGpioFeature::ModelSwitchBit0 as u32 + bit as u32;
        *select = gpio_for_selector(features, code).and_then(GpioPin::new);
    }

    gpio.tdd_switch = gpio_for_selector(features, StreamGpioFeature::TddSwitch as u32)
        .and_then(GpioPin::new);
    gpio.predrive =
        gpio_for_selector(features, StreamGpioFeature::Predrive as u32).and_then(GpioPin::new);
    gpio.sbet_latch_model_index =
        gpio_for_selector(features, StreamGpioFeature::SbetLatchModelIndex as u32)
            .and_then(GpioPin::new);

    gpio.tdd_switch_analog =
        gpio_for_selector(features_analog, StreamGpioAnalogFeature::TddSwitch as u32)
            .and_then(GpioAnalogPin::new);
    gpio.predrive_analog =
        gpio_for_selector(features_analog, StreamGpioAnalogFeature::Predrive as u32)
            .and_then(GpioAnalogPin::new);

    let mut offset = stream_layout::VSWR_DIRECTION_POLARITY;
    for byte in gpio.vswr_direction_polarity.iter_mut() {
        *byte = chunk.read_with(&mut offset, LE)?;
    }

    let mut offset = stream_layout::ANT_CAL_OUT_TABLE;
    for byte in gpio.ant_cal_out.iter_mut() {
        *byte = chunk.read_with(&mut offset, LE)?;
    }

    gpio.pin_modes = [
        stream_layout::DTX_PIN_MODE.read(chunk)?,
        stream_layout::MODEL_SWITCH_PIN_MODE.read(chunk)?,
        stream_layout::ANT_CAL_OUT_PIN_MODE.read(chunk)?,
    ];
    gpio.predrive_pin_mode = stream_layout::PREDRIVE_PIN_MODE.read(chunk)?;
    gpio.dtx_event_wait = stream_layout::DTX_EVENT_WAIT.read(chunk)?;

    Ok(gpio)
}

/// Magic number opening a radio sequencer image ("RSEQ")
pub const RS_IMAGE_MAGIC: u32 = 0x5145_5352;

/// Radio sequencer image header size in bytes
pub const RS_HEADER_BYTES: usize = 44;

/// Size of the crossbar settings region, in bytes
pub const RS_XBAR_BYTES: usize = 48;

/// Capacity of the pattern lookup table, in entries
pub const RS_LOOKUP_MAX_ENTRIES: usize = 256;

/// Capacity of the sequencer instruction memory, in 32-bit words
pub const RS_SEQUENCE_MAX_WORDS: usize = 16 * 1024;

/// Parsed radio sequencer image header
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RsImageHeader {
    /// Version the image was built against
    pub version: Version,
    /// Number of entries in the pattern lookup table
    pub number_patterns: u32,
    /// Instruction sequence length in 32-bit words
    pub sequence_size: u32,
    /// Load address of the instruction sequence
    pub seq_start_addr: u32,
    /// Expected CRC of the pattern lookup table
    pub lookup_crc: u32,
    /// Expected CRC of the instruction sequence
    pub sequence_crc: u32,
    /// Expected CRC of the file image
    pub file_image_crc: u32,
}

impl<'a> TryRead<'a, Endian> for RsImageHeader {
    fn try_read(bytes: &'a [u8], endian: Endian) -> byte::Result<(Self, usize)> {
        let offset = &mut 0;

        // The magic number has been checked by the caller at this point.
        let _magic: u32 = bytes.read_with(offset, endian)?;

        let header = RsImageHeader {
            version: bytes.read_with(offset, endian)?,
            number_patterns: bytes.read_with(offset, endian)?,
            sequence_size: bytes.read_with(offset, endian)?,
            seq_start_addr: bytes.read_with(offset, endian)?,
            lookup_crc: bytes.read_with(offset, endian)?,
            sequence_crc: bytes.read_with(offset, endian)?,
            file_image_crc: bytes.read_with(offset, endian)?,
        };

        Ok((header, *offset))
    }
}

/// Parses and validates the radio sequencer image header
///
/// The magic number is checked before any other field is interpreted. The
/// sequence load address must be `seq_mem_base`, the sequencer instruction
/// memory base of the part.
pub fn parse_rs_header(chunk: &[u8], seq_mem_base: u32) -> Result<RsImageHeader, ImageError> {
    if chunk.len() < RS_HEADER_BYTES {
        return Err(ImageError::Truncated {
            required_len: RS_HEADER_BYTES,
        });
    }

    let magic = Field::<u32>::at(0).read(chunk)?;
    if magic != RS_IMAGE_MAGIC {
        return Err(ImageError::BadMagic { found: magic });
    }

    let header: RsImageHeader = Field::at(0).read(chunk)?;

    if !header.version.within(&API_VERSION, &API_VERSION) {
        return Err(ImageError::UnsupportedVersion {
            found: header.version,
        });
    }

    if header.number_patterns as usize > RS_LOOKUP_MAX_ENTRIES {
        return Err(ImageError::LookupCapacity {
            patterns: header.number_patterns,
        });
    }

    if header.sequence_size as usize > RS_SEQUENCE_MAX_WORDS {
        return Err(ImageError::SequenceCapacity {
            words: header.sequence_size,
        });
    }

    if header.seq_start_addr != seq_mem_base {
        return Err(ImageError::SequenceStart {
            addr: header.seq_start_addr,
        });
    }

    Ok(header)
}

#[cfg(test)]
pub(crate) mod testimg {
    //! Builders for synthetic images, shared by the loader tests

    use super::*;
    use crate::crc::crc32_chunk;

    pub const TEST_HEADER_SIZE: u32 = 608;

    /// One slice's segment in a synthetic stream image
    #[derive(Clone)]
    pub struct SliceSpec {
        pub base_addr: u32,
        pub stream_base: u16,
        pub number_streams: u8,
        pub code: Vec<u8>,
    }

    impl SliceSpec {
        pub fn empty() -> Self {
            SliceSpec {
                base_addr: 0,
                stream_base: 0,
                number_streams: 0,
                code: Vec::new(),
            }
        }

        pub fn with_code(base_addr: u32, stream_base: u16, number_streams: u8, len: usize) -> Self {
            SliceSpec {
                base_addr,
                stream_base,
                number_streams,
                code: (0..len).map(|i| (i * 31 + 7) as u8).collect(),
            }
        }
    }

    /// Builds a stream image: header, then one segment per slice
    ///
    /// Each non-empty segment is the 12 metadata bytes (base address, stream
    /// base, stream count and size) followed by the code bytes. The main
    /// slice's declared size additionally covers the header, since the whole
    /// prefix of the file is downloaded to the main processor.
    pub fn build_stream_image(
        slices: &[SliceSpec; STREAM_SLICE_COUNT],
        features: &[u32; GPIO_COUNT],
        features_analog: &[u32; GPIO_ANALOG_COUNT],
    ) -> Vec<u8> {
        let mut header = vec![0u8; TEST_HEADER_SIZE as usize];

        let version = API_VERSION;
        header[8..12].copy_from_slice(&version.major.to_le_bytes());
        header[12..16].copy_from_slice(&version.minor.to_le_bytes());
        header[16..20].copy_from_slice(&version.maintenance.to_le_bytes());
        header[20..24].copy_from_slice(&version.build.to_le_bytes());
        header[24..28].copy_from_slice(&TEST_HEADER_SIZE.to_le_bytes());

        for (pin, word) in features.iter().enumerate() {
            let at = stream_layout::GPIO_FEATURES + pin * 4;
            header[at..at + 4].copy_from_slice(&word.to_le_bytes());
        }
        for (pin, word) in features_analog.iter().enumerate() {
            let at = stream_layout::GPIO_ANALOG_FEATURES + pin * 4;
            header[at..at + 4].copy_from_slice(&word.to_le_bytes());
        }

        // Segment sizes and offsets: segments are laid out back to back, and
        // the main slice's declared size counts from the start of the file.
        let mut sizes = [0u32; STREAM_SLICE_COUNT];
        let mut offsets = [0u32; STREAM_SLICE_COUNT];
        let mut cursor = 0u32;
        for (i, spec) in slices.iter().enumerate() {
            let segment = if spec.code.is_empty() && spec.base_addr == 0 {
                0
            } else {
                12 + spec.code.len() as u32
            };
            let size = if i == 0 {
                TEST_HEADER_SIZE + segment
            } else {
                segment
            };
            offsets[i] = cursor;
            sizes[i] = size;
            cursor += size;
        }

        for i in 0..STREAM_SLICE_COUNT {
            let at = stream_layout::SLICE_TABLE + i * stream_layout::SLICE_ENTRY_BYTES;
            header[at..at + 4].copy_from_slice(&sizes[i].to_le_bytes());
            header[at + 4..at + 8].copy_from_slice(&offsets[i].to_le_bytes());
        }

        let mut image = header;
        for (i, spec) in slices.iter().enumerate() {
            if sizes[i] == 0 {
                continue;
            }
            image.extend_from_slice(&spec.base_addr.to_le_bytes());
            image.extend_from_slice(&(spec.stream_base as u32).to_le_bytes());
            let size16 = sizes[i] as u16;
            image.extend_from_slice(&[
                spec.number_streams,
                0,
                (size16 & 0xff) as u8,
                (size16 >> 8) as u8,
            ]);
            image.extend_from_slice(&spec.code);
        }

        assert_eq!(image.len() % 4, 0, "test image must be 4-byte aligned");
        image
    }

    /// Builds a radio sequencer image with correct CRCs
    pub fn build_rs_image(patterns: &[u32], sequence: &[u32], seq_mem_base: u32) -> Vec<u8> {
        let lookup_bytes: Vec<u8> = patterns.iter().flat_map(|w| w.to_le_bytes()).collect();
        let sequence_bytes: Vec<u8> = sequence.iter().flat_map(|w| w.to_le_bytes()).collect();
        let xbar: Vec<u8> = (0..RS_XBAR_BYTES).map(|i| (i * 5 + 1) as u8).collect();

        let lookup_crc = crc32_chunk(&lookup_bytes, 0, true);
        let sequence_crc = crc32_chunk(&sequence_bytes, 0, true);
        let mut file_crc = crc32_chunk(&xbar, 0, false);
        file_crc = crc32_chunk(&lookup_bytes, file_crc, false);
        file_crc = crc32_chunk(&sequence_bytes, file_crc, true);

        let mut image = Vec::new();
        image.extend_from_slice(&RS_IMAGE_MAGIC.to_le_bytes());
        for word in [
            API_VERSION.major,
            API_VERSION.minor,
            API_VERSION.maintenance,
            API_VERSION.build,
            patterns.len() as u32,
            sequence.len() as u32,
            seq_mem_base,
            lookup_crc,
            sequence_crc,
            file_crc,
        ] {
            image.extend_from_slice(&word.to_le_bytes());
        }
        assert_eq!(image.len(), RS_HEADER_BYTES);

        image.extend_from_slice(&xbar);
        image.extend_from_slice(&lookup_bytes);
        image.extend_from_slice(&sequence_bytes);
        image
    }
}
