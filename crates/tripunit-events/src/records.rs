//! On-medium record formats.
//!
//! All fields are little-endian. Every indexed record carries its EID at byte 0
//! except the waveform header, which leads with its sample count.

use tripunit_nvram::{NvResult, RecordReader, RecordWriter};

use crate::codes::EventCode;
use crate::eid::Eid;
use crate::time::Timestamp;

/// Bytes in a metering snapshot block.
pub const SNAPSHOT_BLOCK_LEN: usize = 200;
/// Bytes of demand payload in an energy entry.
pub const ENERGY_PAYLOAD_LEN: usize = 116;
/// Channels in an RMS sample.
pub const RMS_CHANNELS: usize = 11;

/// A fixed-size record stored in a log slot.
pub trait Record: Sized {
    /// Encoded length in bytes.
    const LEN: u16;

    /// Write the fields in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too small.
    fn encode(&self, writer: &mut RecordWriter<'_>) -> NvResult<()>;

    /// Read the fields in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too small.
    fn decode(reader: &mut RecordReader<'_>) -> NvResult<Self>;

    /// Encode into `buf`, which must hold at least [`Record::LEN`] bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too small.
    fn write_to(&self, buf: &mut [u8]) -> NvResult<()> {
        self.encode(&mut RecordWriter::new(buf))
    }

    /// Decode from the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too small.
    fn read_from(buf: &[u8]) -> NvResult<Self> {
        Self::decode(&mut RecordReader::new(buf))
    }
}

fn put_timestamp(writer: &mut RecordWriter<'_>, ts: Timestamp) -> NvResult<()> {
    writer.put_u32(ts.seconds)?.put_u32(ts.nanos)?;
    Ok(())
}

fn timestamp(reader: &mut RecordReader<'_>) -> NvResult<Timestamp> {
    Ok(Timestamp {
        seconds: reader.u32()?,
        nanos: reader.u32()?,
    })
}

/// Identity, time and code of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummaryRecord {
    /// Raw EID (0 only in a never-written slot).
    pub eid: u32,
    /// When the event was admitted.
    pub timestamp: Timestamp,
    /// Event code.
    pub code: EventCode,
}

impl SummaryRecord {
    /// Build a record for an admitted event.
    #[must_use]
    pub fn new(eid: Eid, timestamp: Timestamp, code: EventCode) -> Self {
        Self {
            eid: eid.get(),
            timestamp,
            code,
        }
    }
}

impl Record for SummaryRecord {
    const LEN: u16 = 14;

    fn encode(&self, writer: &mut RecordWriter<'_>) -> NvResult<()> {
        writer.put_u32(self.eid)?;
        put_timestamp(writer, self.timestamp)?;
        writer.put_u16(u16::from(self.code.raw()))?;
        Ok(())
    }

    fn decode(reader: &mut RecordReader<'_>) -> NvResult<Self> {
        let eid = reader.u32()?;
        let timestamp = timestamp(reader)?;
        let code = u8::try_from(reader.u16()?).unwrap_or(0);
        Ok(Self {
            eid,
            timestamp,
            code: EventCode::new(code),
        })
    }
}

/// Measurement block captured by the metering subsystem, stored verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotBlock([u8; SNAPSHOT_BLOCK_LEN]);

impl SnapshotBlock {
    /// Wrap raw bytes.
    #[must_use]
    pub fn new(bytes: [u8; SNAPSHOT_BLOCK_LEN]) -> Self {
        Self(bytes)
    }

    /// Pack up to fifty `f32` readings; the remainder is zero.
    #[must_use]
    pub fn from_values(values: &[f32]) -> Self {
        let mut bytes = [0u8; SNAPSHOT_BLOCK_LEN];
        for (chunk, value) in bytes.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        Self(bytes)
    }

    /// Unpack the block as fifty `f32` readings.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.0.chunks_exact(4).map(|chunk| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(chunk);
            f32::from_le_bytes(raw)
        })
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SNAPSHOT_BLOCK_LEN] {
        &self.0
    }
}

impl Default for SnapshotBlock {
    fn default() -> Self {
        Self([0; SNAPSHOT_BLOCK_LEN])
    }
}

/// Summary header plus metering block, stored in the trip, alarm and extended logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotRecord {
    /// Event identity.
    pub header: SummaryRecord,
    /// Captured measurements.
    pub metering: SnapshotBlock,
}

impl Record for SnapshotRecord {
    const LEN: u16 = SummaryRecord::LEN + SNAPSHOT_BLOCK_LEN as u16;

    fn encode(&self, writer: &mut RecordWriter<'_>) -> NvResult<()> {
        self.header.encode(writer)?;
        writer.put_bytes(self.metering.as_bytes())?;
        Ok(())
    }

    fn decode(reader: &mut RecordReader<'_>) -> NvResult<Self> {
        let header = SummaryRecord::decode(reader)?;
        let metering = SnapshotBlock::new(reader.take::<SNAPSHOT_BLOCK_LEN>()?);
        Ok(Self { header, metering })
    }
}

/// Statistics of one completed disturbance episode.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisturbanceRecord {
    /// EID of the exit event.
    pub eid: u32,
    /// When the exit event was admitted.
    pub timestamp: Timestamp,
    /// When the episode started.
    pub entry_timestamp: Timestamp,
    /// Episode length in milliseconds.
    pub duration_ms: f32,
    /// Disturbance parameter index.
    pub value_code: u16,
    /// Reserved.
    pub spare: u16,
    /// Extremum per the parameter's processing mode.
    pub extremum: f32,
    /// Weighted average over the episode.
    pub average: f32,
    /// How close protection came to tripping, in percent.
    pub percent_to_trip: f32,
    /// EID of the event that started the episode, 0 if none.
    pub origin_eid: u32,
}

impl Record for DisturbanceRecord {
    const LEN: u16 = 44;

    fn encode(&self, writer: &mut RecordWriter<'_>) -> NvResult<()> {
        writer.put_u32(self.eid)?;
        put_timestamp(writer, self.timestamp)?;
        put_timestamp(writer, self.entry_timestamp)?;
        writer
            .put_f32(self.duration_ms)?
            .put_u16(self.value_code)?
            .put_u16(self.spare)?
            .put_f32(self.extremum)?
            .put_f32(self.average)?
            .put_f32(self.percent_to_trip)?
            .put_u32(self.origin_eid)?;
        Ok(())
    }

    fn decode(reader: &mut RecordReader<'_>) -> NvResult<Self> {
        Ok(Self {
            eid: reader.u32()?,
            timestamp: timestamp(reader)?,
            entry_timestamp: timestamp(reader)?,
            duration_ms: reader.f32()?,
            value_code: reader.u16()?,
            spare: reader.u16()?,
            extremum: reader.f32()?,
            average: reader.f32()?,
            percent_to_trip: reader.f32()?,
            origin_eid: reader.u32()?,
        })
    }
}

/// Metadata written once a waveform capture has been stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaveformHeader {
    /// Samples captured.
    pub num_samples: u16,
    /// EID of the event the capture belongs to.
    pub eid: u32,
    /// When the capture started.
    pub timestamp: Timestamp,
}

impl WaveformHeader {
    /// Byte offset of the EID within the header.
    pub const EID_OFFSET: u16 = 2;
}

impl Record for WaveformHeader {
    const LEN: u16 = 14;

    fn encode(&self, writer: &mut RecordWriter<'_>) -> NvResult<()> {
        writer.put_u16(self.num_samples)?.put_u32(self.eid)?;
        put_timestamp(writer, self.timestamp)
    }

    fn decode(reader: &mut RecordReader<'_>) -> NvResult<Self> {
        Ok(Self {
            num_samples: reader.u16()?,
            eid: reader.u32()?,
            timestamp: timestamp(reader)?,
        })
    }
}

/// One RMS reading of every channel: Ia, Ib, Ic, In, Ig, Van1, Vbn1, Vcn1,
/// Van2, Vbn2, Vcn2.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RmsSample {
    /// Channel values in the order above.
    pub values: [f32; RMS_CHANNELS],
}

impl Record for RmsSample {
    const LEN: u16 = (RMS_CHANNELS * 4) as u16;

    fn encode(&self, writer: &mut RecordWriter<'_>) -> NvResult<()> {
        for value in self.values {
            writer.put_f32(value)?;
        }
        Ok(())
    }

    fn decode(reader: &mut RecordReader<'_>) -> NvResult<Self> {
        let mut values = [0f32; RMS_CHANNELS];
        for value in &mut values {
            *value = reader.f32()?;
        }
        Ok(Self { values })
    }
}

/// Demand and energy totals for one interval, stored verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyPayload([u8; ENERGY_PAYLOAD_LEN]);

impl EnergyPayload {
    /// Wrap raw bytes.
    #[must_use]
    pub fn new(bytes: [u8; ENERGY_PAYLOAD_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ENERGY_PAYLOAD_LEN] {
        &self.0
    }
}

impl Default for EnergyPayload {
    fn default() -> Self {
        Self([0; ENERGY_PAYLOAD_LEN])
    }
}

/// One half-page of the energy log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnergyEntry {
    /// EID of the demand event.
    pub eid: u32,
    /// When the demand event was admitted.
    pub timestamp: Timestamp,
    /// Demand payload.
    pub payload: EnergyPayload,
}

impl Record for EnergyEntry {
    const LEN: u16 = 12 + ENERGY_PAYLOAD_LEN as u16;

    fn encode(&self, writer: &mut RecordWriter<'_>) -> NvResult<()> {
        writer.put_u32(self.eid)?;
        put_timestamp(writer, self.timestamp)?;
        writer.put_bytes(self.payload.as_bytes())?;
        Ok(())
    }

    fn decode(reader: &mut RecordReader<'_>) -> NvResult<Self> {
        Ok(Self {
            eid: reader.u32()?,
            timestamp: timestamp(reader)?,
            payload: EnergyPayload::new(reader.take::<ENERGY_PAYLOAD_LEN>()?),
        })
    }
}
