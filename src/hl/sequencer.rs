//! Chunked loading of the radio sequencer binary image
//!
//! The radio sequencer image is a single file of four regions: a fixed
//! header, the crossbar settings, the pattern lookup table and the
//! instruction sequence. The regions are consumed strictly in file order.
//! Crossbar settings and the lookup table are kept in the session for later
//! configuration stages; the instruction sequence streams straight into the
//! sequencer's instruction memory as its bytes arrive.
//!
//! Three CRCs guard the load: the lookup table and the sequence are each
//! checked the moment their last byte is consumed, and the whole-file CRC
//! (covering everything after the header) is checked after the sequence. Any
//! mismatch ends the session; the only recovery is to restart the load from
//! offset zero.

use byte::{BytesExt, LE};

use crate::crc::crc32_chunk;
use crate::image::{
    self, ImageError, ImageRegion, RsImageHeader, RS_HEADER_BYTES, RS_XBAR_BYTES,
    RS_LOOKUP_MAX_ENTRIES,
};
use crate::ll;
use crate::{maybe_async_attr, spi_type};

use super::{Adrv904x, ApiState, Error};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum RsState {
    Idle,
    Loading(RsProgress),
    Complete,
}

/// Parsed header and running CRCs, carried across calls
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct RsProgress {
    header: RsImageHeader,
    lookup_crc_run: u32,
    sequence_crc_run: u32,
    file_crc_run: u32,
}

/// Load progress of a radio sequencer image, kept across
/// `radio_sequencer_image_write` calls
pub(crate) struct RsLoadSession {
    state: RsState,
    patterns_len: usize,
    xbar: [u8; RS_XBAR_BYTES],
    lookup: [u32; RS_LOOKUP_MAX_ENTRIES],
}

impl RsLoadSession {
    pub(crate) fn new() -> Self {
        RsLoadSession {
            state: RsState::Idle,
            patterns_len: 0,
            xbar: [0; RS_XBAR_BYTES],
            lookup: [0; RS_LOOKUP_MAX_ENTRIES],
        }
    }

    /// Starts a fresh session from a parsed header, discarding any prior one
    fn begin(&mut self, header: RsImageHeader) {
        self.state = RsState::Loading(RsProgress {
            header,
            lookup_crc_run: 0,
            sequence_crc_run: 0,
            file_crc_run: 0,
        });
        self.patterns_len = header.number_patterns as usize;
        self.xbar = [0; RS_XBAR_BYTES];
        self.lookup = [0; RS_LOOKUP_MAX_ENTRIES];
    }
}

/// The part of `chunk` that falls inside `[start, end)`
///
/// Returns the overlapping bytes and their offset relative to the region
/// start. Chunks arrive contiguously, so a region is complete exactly when
/// the overlap reaches the region's last byte.
fn region_overlap<'a>(
    chunk_offset: u32,
    chunk: &'a [u8],
    start: u32,
    end: u32,
) -> Option<(&'a [u8], u32)> {
    let chunk_end = chunk_offset + chunk.len() as u32;
    let from = chunk_offset.max(start);
    let to = chunk_end.min(end);

    if from >= to {
        return None;
    }

    Some((
        &chunk[(from - chunk_offset) as usize..(to - chunk_offset) as usize],
        from - start,
    ))
}

impl<SPI> Adrv904x<SPI> {
    /// Crossbar settings from the most recently loaded radio sequencer image
    pub fn radio_sequencer_crossbar(&self) -> &[u8; RS_XBAR_BYTES] {
        &self.state.rs.xbar
    }

    /// Pattern lookup table from the most recently loaded radio sequencer
    /// image
    pub fn radio_sequencer_lookup_table(&self) -> &[u32] {
        &self.state.rs.lookup[..self.state.rs.patterns_len]
    }
}

impl<SPI> Adrv904x<SPI>
where
    SPI: spi_type::spi::SpiDevice<u8>,
{
    /// Writes a chunk of the radio sequencer binary image
    ///
    /// The file must be delivered from the beginning, in contiguous chunks
    /// whose offset and length are multiples of four bytes; the first chunk
    /// must contain the complete header. Calling with `byte_offset == 0`
    /// always starts a new load and discards any session in progress.
    ///
    /// A CRC mismatch in the lookup table, the sequence or the whole file
    /// fails with [`Error::Image`] and ends the session; the load must then
    /// be restarted from offset zero. Once the final chunk has been verified
    /// the sequence size and CRC are handed to the sequencer for its own
    /// runtime cross-check, and the flag reported by
    /// [`Adrv904x::is_radio_sequencer_loaded`] is set.
    #[maybe_async_attr]
    pub async fn radio_sequencer_image_write(
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
            let header = image::parse_rs_header(binary, ll::SEQ_INSTR_MEM_ADDR)?;
            self.state.rs.begin(header);
        }

        let progress = match self.state.rs.state {
            RsState::Loading(progress) => progress,
            _ => return Ok(()),
        };
        let header = progress.header;
        let mut lookup_crc_run = progress.lookup_crc_run;
        let mut sequence_crc_run = progress.sequence_crc_run;
        let mut file_crc_run = progress.file_crc_run;

        let xbar_start = RS_HEADER_BYTES as u32;
        let xbar_end = xbar_start + RS_XBAR_BYTES as u32;
        let lookup_end = xbar_end + header.number_patterns * 4;
        let seq_end = lookup_end + header.sequence_size * 4;

        if let Some((bytes, at)) = region_overlap(byte_offset, binary, xbar_start, xbar_end) {
            let at = at as usize;
            self.state.rs.xbar[at..at + bytes.len()].copy_from_slice(bytes);
        }

        // The whole-file CRC covers everything after the header, finalized
        // with the sequence's last byte.
        if let Some((bytes, at)) = region_overlap(byte_offset, binary, xbar_start, seq_end) {
            let is_final = at + bytes.len() as u32 == seq_end - xbar_start;
            file_crc_run = crc32_chunk(bytes, file_crc_run, is_final);
        }

        if let Some((bytes, at)) = region_overlap(byte_offset, binary, xbar_end, lookup_end) {
            let is_final = at + bytes.len() as u32 == lookup_end - xbar_end;
            lookup_crc_run = crc32_chunk(bytes, lookup_crc_run, is_final);

            let mut word_index = (at / 4) as usize;
            let mut offset = 0;
            while offset + 4 <= bytes.len() {
                let word = bytes.read_with(&mut offset, LE).map_err(ImageError::from)?;
                self.state.rs.lookup[word_index] = word;
                word_index += 1;
            }

            if is_final && lookup_crc_run != header.lookup_crc {
                self.state.rs.state = RsState::Idle;
                return Err(ImageError::Crc {
                    region: ImageRegion::LookupTable,
                }
                .into());
            }
        }

        let sequence = region_overlap(byte_offset, binary, lookup_end, seq_end);
        if let Some((bytes, at)) = sequence {
            let is_final = at + bytes.len() as u32 == seq_end - lookup_end;
            sequence_crc_run = crc32_chunk(bytes, sequence_crc_run, is_final);
        }

        // Bookkeeping for this chunk is settled; record it before touching
        // the bus, so a transport failure leaves the session consistent.
        self.state.rs.state = RsState::Loading(RsProgress {
            header,
            lookup_crc_run,
            sequence_crc_run,
            file_crc_run,
        });

        if let Some((bytes, at)) = sequence {
            self.ll
                .memory_write(ll::SEQ_INSTR_MEM_ADDR + at, bytes)
                .await?;

            if at + bytes.len() as u32 == seq_end - lookup_end {
                if sequence_crc_run != header.sequence_crc {
                    self.state.rs.state = RsState::Idle;
                    return Err(ImageError::Crc {
                        region: ImageRegion::Sequence,
                    }
                    .into());
                }
                if file_crc_run != header.file_image_crc {
                    self.state.rs.state = RsState::Idle;
                    return Err(ImageError::Crc {
                        region: ImageRegion::File,
                    }
                    .into());
                }

                // The sequencer cross-checks the loaded sequence against
                // these two registers at startup.
                self.ll
                    .register_write(ll::SEQ_SEQUENCE_SIZE_ADDR, header.sequence_size, 0xffff_ffff)
                    .await?;
                self.ll
                    .register_write(ll::SEQ_SEQUENCE_CRC_ADDR, header.sequence_crc, 0xffff_ffff)
                    .await?;

                self.state.rs.state = RsState::Complete;
                self.state
                    .api_state
                    .insert(ApiState::RADIO_SEQUENCER_LOADED);
            }
        }

        Ok(())
    }
}
