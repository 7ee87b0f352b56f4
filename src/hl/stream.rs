//! Chunked loading of the stream processor binary image
//!
//! `stream_image.bin` is delivered to the part in chunks, in file order. The
//! header names a size and file offset for each of the 20 slice processors;
//! each slice's segment opens with its own load address, stream base address
//! and stream count, followed by the code. While a slice's segment is being
//! written its processor is held in reset through its stream control
//! register, and released with the base address and stream count programmed
//! once the last byte has arrived.
//!
//! A chunk may end anywhere inside a segment, and one chunk may span several
//! segments; the session state below carries the load across calls so the
//! register traffic does not depend on how the caller chunks the file.

use byte::{BytesExt, LE};

use crate::configs::Channels;
use crate::image::{self, SliceMeta, StreamImageHeader, STREAM_SLICE_COUNT};
use crate::ll;
use crate::{maybe_async_attr, spi_type};

use super::{Adrv904x, ApiState, Error};

/// Channel gate for each slice, in download order
///
/// The main slice loads whenever any channel is initialized. The kfa slice
/// never receives writes, but its offset bookkeeping still advances.
const STREAM_CHANNEL: [u32; STREAM_SLICE_COUNT] = [
    0xffff_ffff,
    0x0,
    Channels::TX0,
    Channels::TX1,
    Channels::TX2,
    Channels::TX3,
    Channels::TX4,
    Channels::TX5,
    Channels::TX6,
    Channels::TX7,
    Channels::RX0,
    Channels::RX1,
    Channels::RX2,
    Channels::RX3,
    Channels::RX4,
    Channels::RX5,
    Channels::RX6,
    Channels::RX7,
    Channels::ORX0,
    Channels::ORX1,
];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum LoadState {
    Idle,
    Loading { slice: usize },
    Complete,
}

/// Per-slice progress, valid while a slice's segment is partially delivered
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
struct SliceProgress {
    /// Device address the next payload byte goes to; zero until the
    /// segment's first word has been seen
    bin_base_addr: u32,
    /// Stream base address for the post-load control step
    stream_base_addr: u32,
    /// Stream count for the post-load control step
    number_streams: u8,
    /// Segment bytes not yet written
    remaining: u32,
}

/// Load progress of a stream image, kept across `stream_image_write` calls
pub(crate) struct StreamLoadSession {
    state: LoadState,
    header_size: u32,
    slices: [SliceMeta; STREAM_SLICE_COUNT],
    progress: SliceProgress,
}

impl StreamLoadSession {
    pub(crate) fn new() -> Self {
        StreamLoadSession {
            state: LoadState::Idle,
            header_size: 0,
            slices: [SliceMeta::default(); STREAM_SLICE_COUNT],
            progress: SliceProgress::default(),
        }
    }

    /// Starts a fresh session from a parsed header, discarding any prior one
    fn begin(&mut self, header: &StreamImageHeader) {
        self.state = LoadState::Loading { slice: 0 };
        self.header_size = header.header_size;
        self.slices = header.slices;
        self.progress = SliceProgress::default();
    }

    fn advance_slice(&mut self, slice: usize) {
        self.state = LoadState::Loading { slice: slice + 1 };
        self.progress = SliceProgress::default();
    }

    /// File offset where this slice's segment starts
    ///
    /// The main slice's segment follows the header directly; its table offset
    /// counts data preceding the application code instead.
    fn segment_start(&self, slice: usize) -> u32 {
        if slice == 0 {
            0
        } else {
            self.slices[slice].offset
        }
    }

    fn segment_meta_addr(&self, slice: usize) -> u32 {
        if slice == 0 {
            self.header_size
        } else {
            self.slices[slice].offset
        }
    }
}

impl<SPI> Adrv904x<SPI>
where
    SPI: spi_type::spi::SpiDevice<u8>,
{
    /// Writes a chunk of the stream processor binary image
    ///
    /// `stream_image.bin` must be delivered from the beginning, in contiguous
    /// chunks whose offset and length are multiples of four bytes. The first
    /// chunk must contain the complete header; the header declares its own
    /// size, and a first chunk that is too short fails with
    /// [`Error::Image`]/[`ImageError::Truncated`] naming the size to retry
    /// with. Calling with `byte_offset == 0` always starts a new load and
    /// discards any session in progress.
    ///
    /// Once the final chunk has been processed, the stream-loaded flag
    /// reported by [`Adrv904x::is_stream_loaded`] is set.
    ///
    /// Slices whose channel is not in the initialized-channels mask receive
    /// no register writes, but their share of the file is still consumed so
    /// later slices land at the right offsets.
    ///
    /// [`ImageError::Truncated`]: crate::image::ImageError::Truncated
    #[maybe_async_attr]
    pub async fn stream_image_write(
        &mut self,
        byte_offset: u32,
        binary: &[u8],
    ) -> Result<(), Error<SPI>> {
        if binary.is_empty() || binary.len() % 4 != 0 {
            return Err(Error::InvalidChunkSize { len: binary.len() });
        }
        if byte_offset % 4 != 0 {
            return Err(Error::InvalidChunkOffset {
                offset: byte_offset,
            });
        }

        if byte_offset == 0 {
            let header = image::parse_stream_header(binary)?;
            self.state.tx_to_orx = header.mapping;
            self.state.gpio = header.gpio;
            self.state.stream.begin(&header);
        }

        let mut chunk = binary;
        let mut byte_offset = byte_offset;

        while let LoadState::Loading { slice } = self.state.stream.state {
            if slice >= STREAM_SLICE_COUNT {
                break;
            }

            let meta = self.state.stream.slices[slice];
            let meta_addr = self.state.stream.segment_meta_addr(slice);

            if meta.size == 0 {
                // Nothing to deliver and no control-register traffic; the
                // slice is done as soon as the cursor reaches it.
                if byte_offset >= meta_addr {
                    self.state.stream.advance_slice(slice);
                    continue;
                }
                break;
            }

            let chunk_end = byte_offset + chunk.len() as u32;

            // The segment's three metadata words become visible once the
            // chunk covers their fixed windows at the start of the segment.
            if byte_offset <= meta_addr && chunk_end >= meta_addr + 4 {
                let at = (meta_addr - byte_offset) as usize;
                let base = segment_word(chunk, at)?;
                // Bytes of the segment that went by before its load address
                // was known cannot be delivered anymore; account for them so
                // the cursor stays on the slice grid.
                let consumed = byte_offset.saturating_sub(self.state.stream.segment_start(slice));
                self.state.stream.progress.bin_base_addr = base + consumed;
                self.state.stream.progress.remaining = meta.size.saturating_sub(consumed);
            }
            if byte_offset <= meta_addr + 4 && chunk_end >= meta_addr + 8 {
                let at = (meta_addr + 4 - byte_offset) as usize;
                self.state.stream.progress.stream_base_addr = segment_word(chunk, at)?;
            }
            if byte_offset <= meta_addr + 8 && chunk_end >= meta_addr + 12 {
                let at = (meta_addr + 8 - byte_offset) as usize;
                self.state.stream.progress.number_streams = chunk[at];
            }

            if self.state.stream.progress.bin_base_addr > 0
                && self.state.stream.progress.remaining > 0
            {
                let ctl_addr = ll::STREAM_CTL_ADDR[slice];
                let enabled = self.state.initialized_channels & STREAM_CHANNEL[slice] != 0;

                // First touch of this segment: hold the slice processor in
                // reset while its image is written.
                if self.state.stream.progress.remaining == meta.size && enabled {
                    self.slice_reset_hold(slice, ctl_addr).await?;
                }

                let write_len = (self.state.stream.progress.remaining as usize).min(chunk.len());
                if enabled {
                    self.ll
                        .memory_write(self.state.stream.progress.bin_base_addr, &chunk[..write_len])
                        .await?;
                }

                chunk = &chunk[write_len..];
                byte_offset += write_len as u32;
                self.state.stream.progress.remaining -= write_len as u32;
                self.state.stream.progress.bin_base_addr += write_len as u32;

                if self.state.stream.progress.remaining == 0 {
                    if enabled {
                        self.slice_release(slice, ctl_addr).await?;
                    }
                    self.state.stream.advance_slice(slice);
                }
            } else {
                // The chunk does not reach this slice's metadata yet; wait
                // for the next one.
                break;
            }

            if chunk.is_empty() {
                break;
            }
        }

        if matches!(
            self.state.stream.state,
            LoadState::Loading {
                slice: STREAM_SLICE_COUNT
            }
        ) {
            self.state.stream.state = LoadState::Complete;
            self.state.api_state.insert(ApiState::STREAM_LOADED);
        }

        Ok(())
    }

    /// Pre-load control step: hold the slice processor in reset
    #[maybe_async_attr]
    async fn slice_reset_hold(&mut self, slice: usize, ctl_addr: u32) -> Result<(), Error<SPI>> {
        // Core slices are byte-wide control registers in the direct SPI
        // space; channel slices use a 32-bit stream config register whose
        // reset default is zero.
        let (value, mask) = if slice <= 1 {
            (
                ll::CORE_STREAM_CTL_DEFAULT | 1 << ll::CORE_STREAM_RESET_BIT,
                0xff,
            )
        } else {
            (1 << ll::CHAN_STREAM_RESET_BIT, 0xffff_ffff)
        };

        self.ll.register_write(ctl_addr, value, mask).await?;

        Ok(())
    }

    /// Post-load control step: program base address and stream count, then
    /// release the reset
    #[maybe_async_attr]
    async fn slice_release(&mut self, slice: usize, ctl_addr: u32) -> Result<(), Error<SPI>> {
        let stream_base = self.state.stream.progress.stream_base_addr;
        let last_stream = self.state.stream.progress.number_streams.wrapping_sub(1);

        if slice <= 1 {
            let mask = 0xff;

            self.ll
                .register_write(
                    ctl_addr + ll::CORE_STREAM_BASE_BYTE0_OFFSET,
                    stream_base & 0xff,
                    mask,
                )
                .await?;
            self.ll
                .register_write(
                    ctl_addr + ll::CORE_STREAM_BASE_BYTE1_OFFSET,
                    (stream_base >> 8) & 0xff,
                    mask,
                )
                .await?;
            self.ll
                .register_write(
                    ctl_addr + ll::CORE_LAST_STREAM_NUM_OFFSET,
                    last_stream as u32,
                    mask,
                )
                .await?;

            // Clearing the reset bit returns the register to its default.
            self.ll
                .register_write(ctl_addr, ll::CORE_STREAM_CTL_DEFAULT, mask)
                .await?;
        } else {
            let mut config1 = 0;
            config1 |= (stream_base & 0xff) << ll::CHAN_STREAM_BASE_BYTE0_BIT;
            config1 |= ((stream_base >> 8) & 0xff) << ll::CHAN_STREAM_BASE_BYTE1_BIT;
            config1 |= (last_stream as u32) << ll::CHAN_LAST_STREAM_NUM_BIT;

            // Stream config 1 holds the base address and last stream number;
            // config 0 goes back to zero, releasing the reset.
            self.ll
                .register_write(ctl_addr + 4, config1, 0xffff_ffff)
                .await?;
            self.ll.register_write(ctl_addr, 0, 0xffff_ffff).await?;
        }

        Ok(())
    }
}

/// Reads one little-endian segment word out of the current chunk
fn segment_word(chunk: &[u8], at: usize) -> Result<u32, crate::image::ImageError> {
    let mut offset = at;
    Ok(chunk.read_with(&mut offset, LE)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::{Config, GPIO_ANALOG_COUNT, GPIO_COUNT};
    use crate::image::testimg::{build_stream_image, SliceSpec, TEST_HEADER_SIZE};
    use crate::ll::mock::{decode, normalize, BusEvent, RecordingSpi};

    fn device(initialized_channels: u32) -> Adrv904x<RecordingSpi> {
        Adrv904x::new(
            RecordingSpi::new(),
            Config {
                initialized_channels,
            },
        )
    }

    fn events(device: &Adrv904x<RecordingSpi>) -> Vec<BusEvent> {
        normalize(decode(&device.ll.spi.frames))
    }

    fn test_slices() -> [SliceSpec; STREAM_SLICE_COUNT] {
        core::array::from_fn(|i| {
            SliceSpec::with_code(
                0x0100_0000 + (i as u32) * 0x0002_0000,
                0x4000 + (i as u16) * 0x10,
                3 + i as u8,
                32 + (i % 3) * 4,
            )
        })
    }

    async fn write_in_chunks(
        device: &mut Adrv904x<RecordingSpi>,
        image: &[u8],
        first: usize,
        chunk_size: usize,
    ) {
        device.stream_image_write(0, &image[..first]).await.unwrap();
        let mut offset = first;
        while offset < image.len() {
            let end = (offset + chunk_size).min(image.len());
            device
                .stream_image_write(offset as u32, &image[offset..end])
                .await
                .unwrap();
            offset = end;
        }
    }

    #[tokio::test]
    async fn single_chunk_load_reaches_complete() {
        let slices = test_slices();
        let image = build_stream_image(&slices, &[0; GPIO_COUNT], &[0; GPIO_ANALOG_COUNT]);

        let mut device = device(Channels::ALL);
        device.stream_image_write(0, &image).await.unwrap();

        assert!(device.is_stream_loaded());

        // Every enabled slice's payload lands at the base address declared in
        // its own segment, with exactly the declared size. The main slice's
        // image includes the file header.
        let events = events(&device);
        let segment = |i: usize| 12 + slices[i].code.len();
        let main_size = TEST_HEADER_SIZE as usize + segment(0);
        assert!(events.contains(&BusEvent::MemoryWrite {
            addr: slices[0].base_addr,
            data: image[..main_size].to_vec(),
        }));

        // Slice 2 (Tx0) follows the kfa segment: bytes written verbatim.
        let tx0_offset = main_size + segment(1);
        assert!(events.contains(&BusEvent::MemoryWrite {
            addr: slices[2].base_addr,
            data: image[tx0_offset..tx0_offset + segment(2)].to_vec(),
        }));
    }

    #[tokio::test]
    async fn chunking_does_not_change_register_traffic() {
        let slices = test_slices();
        let image = build_stream_image(&slices, &[0; GPIO_COUNT], &[0; GPIO_ANALOG_COUNT]);
        let initialized = Channels::RX0 | Channels::TX0 | Channels::ORX1;

        let mut whole = device(initialized);
        whole.stream_image_write(0, &image).await.unwrap();

        // Smallest legal chunks after a header-covering first chunk.
        let mut tiny = device(initialized);
        write_in_chunks(&mut tiny, &image, TEST_HEADER_SIZE as usize + 4, 4).await;

        // An odd in-between chunk size that splits segments unevenly.
        let mut uneven = device(initialized);
        write_in_chunks(&mut uneven, &image, TEST_HEADER_SIZE as usize + 12, 100).await;

        assert!(whole.is_stream_loaded());
        assert!(tiny.is_stream_loaded());
        assert!(uneven.is_stream_loaded());

        let expected = events(&whole);
        assert_eq!(events(&tiny), expected);
        assert_eq!(events(&uneven), expected);
    }

    #[tokio::test]
    async fn misaligned_chunks_are_rejected_before_any_write() {
        let slices = test_slices();
        let image = build_stream_image(&slices, &[0; GPIO_COUNT], &[0; GPIO_ANALOG_COUNT]);

        let mut device = device(Channels::ALL);

        assert!(matches!(
            device.stream_image_write(0, &image[..TEST_HEADER_SIZE as usize + 2]).await,
            Err(Error::InvalidChunkSize { .. })
        ));
        assert!(matches!(
            device.stream_image_write(0, &[]).await,
            Err(Error::InvalidChunkSize { len: 0 })
        ));
        assert!(matches!(
            device.stream_image_write(2, &image[2..6]).await,
            Err(Error::InvalidChunkOffset { offset: 2 })
        ));
        assert!(device.ll.spi.frames.is_empty());
    }

    #[tokio::test]
    async fn short_first_chunk_names_the_required_size() {
        let slices = test_slices();
        let image = build_stream_image(&slices, &[0; GPIO_COUNT], &[0; GPIO_ANALOG_COUNT]);

        let mut device = device(Channels::ALL);

        match device.stream_image_write(0, &image[..100]).await {
            Err(Error::Image(crate::image::ImageError::Truncated { required_len })) => {
                assert_eq!(required_len, TEST_HEADER_SIZE as usize);
            }
            other => panic!("expected truncation error, got {:?}", other),
        }
        assert!(device.ll.spi.frames.is_empty());
    }

    #[tokio::test]
    async fn empty_slice_is_skipped_without_control_writes() {
        let mut slices = test_slices();
        slices[5] = SliceSpec::empty();
        let image = build_stream_image(&slices, &[0; GPIO_COUNT], &[0; GPIO_ANALOG_COUNT]);

        let mut device = device(Channels::ALL);
        device.stream_image_write(0, &image).await.unwrap();

        assert!(device.is_stream_loaded());

        let events = events(&device);
        let tx3_ctl = ll::STREAM_CTL_ADDR[5];
        assert!(!events.iter().any(|event| matches!(
            event,
            BusEvent::RegisterWrite { addr, .. } if *addr == tx3_ctl || *addr == tx3_ctl + 4
        )));

        // The slice after the empty one still loads at its declared address.
        assert!(events
            .iter()
            .any(|event| matches!(event, BusEvent::MemoryWrite { addr, .. } if *addr == slices[6].base_addr)));
    }

    #[tokio::test]
    async fn uninitialized_channels_get_no_writes_but_keep_offsets() {
        let slices = test_slices();
        let image = build_stream_image(&slices, &[0; GPIO_COUNT], &[0; GPIO_ANALOG_COUNT]);

        // Only Rx1 initialized: main loads, Tx slices are skipped.
        let mut device = device(Channels::RX1);
        device.stream_image_write(0, &image).await.unwrap();

        assert!(device.is_stream_loaded());

        let events = events(&device);

        // No traffic at all for Tx0 (slice 2).
        assert!(!events.iter().any(|event| match event {
            BusEvent::RegisterWrite { addr, .. } =>
                *addr == ll::STREAM_CTL_ADDR[2] || *addr == ll::STREAM_CTL_ADDR[2] + 4,
            BusEvent::MemoryWrite { addr, .. } => *addr == slices[2].base_addr,
            BusEvent::Read { .. } => false,
        }));

        // Rx1 (slice 11) still loads its own bytes at its own address,
        // proving the skipped slices' bookkeeping advanced correctly.
        let rx1_start = image
            .len()
            - slices[11..]
                .iter()
                .map(|s| 12 + s.code.len())
                .sum::<usize>();
        let rx1_size = 12 + slices[11].code.len();
        assert!(events.contains(&BusEvent::MemoryWrite {
            addr: slices[11].base_addr,
            data: image[rx1_start..rx1_start + rx1_size].to_vec(),
        }));
    }

    #[tokio::test]
    async fn control_register_sequencing_per_slice_kind() {
        let slices = test_slices();
        let image = build_stream_image(&slices, &[0; GPIO_COUNT], &[0; GPIO_ANALOG_COUNT]);

        let mut device = device(Channels::RX0);
        device.stream_image_write(0, &image).await.unwrap();

        let events = events(&device);

        // Core slice: byte-wide reset hold, three byte-wide programming
        // writes, then the default value clears the reset.
        let main_ctl = ll::STREAM_CTL_ADDR[0];
        let core_writes: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                BusEvent::RegisterWrite { addr, value, mask } if *addr & !0x3 == main_ctl => {
                    Some((*addr - main_ctl, *value, *mask))
                }
                _ => None,
            })
            .collect();
        let stream_base = (slices[0].stream_base & 0xff) as u32;
        let stream_base_hi = (slices[0].stream_base >> 8) as u32;
        assert_eq!(
            core_writes,
            vec![
                (
                    0,
                    ll::CORE_STREAM_CTL_DEFAULT | 1 << ll::CORE_STREAM_RESET_BIT,
                    0xff
                ),
                (ll::CORE_STREAM_BASE_BYTE0_OFFSET, stream_base, 0xff),
                (ll::CORE_STREAM_BASE_BYTE1_OFFSET, stream_base_hi, 0xff),
                (
                    ll::CORE_LAST_STREAM_NUM_OFFSET,
                    (slices[0].number_streams - 1) as u32,
                    0xff
                ),
                (0, ll::CORE_STREAM_CTL_DEFAULT, 0xff),
            ]
        );

        // Channel slice: 32-bit reset hold on config 0, base and count packed
        // into config 1, then config 0 cleared.
        let rx0_ctl = ll::STREAM_CTL_ADDR[10];
        let chan_writes: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                BusEvent::RegisterWrite { addr, value, mask }
                    if *addr == rx0_ctl || *addr == rx0_ctl + 4 =>
                {
                    Some((*addr - rx0_ctl, *value, *mask))
                }
                _ => None,
            })
            .collect();
        let expected_config1 = (slices[10].stream_base & 0xff) as u32
            | ((slices[10].stream_base >> 8) as u32) << ll::CHAN_STREAM_BASE_BYTE1_BIT
            | ((slices[10].number_streams - 1) as u32) << ll::CHAN_LAST_STREAM_NUM_BIT;
        assert_eq!(
            chan_writes,
            vec![
                (0, 1 << ll::CHAN_STREAM_RESET_BIT, 0xffff_ffff),
                (4, expected_config1, 0xffff_ffff),
                (0, 0, 0xffff_ffff),
            ]
        );
    }

    #[tokio::test]
    async fn header_routing_lands_in_device_state() {
        use crate::configs::StreamGpioFeature;

        let mut features = [0u32; GPIO_COUNT];
        features[4] = StreamGpioFeature::TxToOrxMappingBit2 as u32;
        features[20] = StreamGpioFeature::RxAntennaCal as u32;

        let slices = test_slices();
        let image = build_stream_image(&slices, &features, &[0; GPIO_ANALOG_COUNT]);

        let mut device = device(Channels::ALL);
        device.stream_image_write(0, &image).await.unwrap();

        assert_eq!(
            device.tx_to_orx_mapping().gpio_select[2],
            crate::configs::GpioPin::new(4)
        );
        assert!(device.stream_gpio_mapping().stream_input[20]);
    }
}
