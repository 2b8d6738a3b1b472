//! Fixed layout, little endian records for the persisted settings.
//!
//! Field order is the on-disk order. There is no versioning; unknown caster flag bits are
//! preserved rather than rejected.

use std::io::{Read, Write};

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::{CasterFlags, ShadowCasterSettings, ShadowMasterSettings};

/// Error returned from reading or writing a settings record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("settings record i/o failed")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Copy, Clone, Pod, Zeroable)]
#[repr(C)]
struct RawCasterRecord {
    cast_flags: u8,
    boost: [u8; 4],
    atten_scale: [u8; 4],
    blur_scale: [u8; 4],
}

#[derive(Debug, Copy, Clone, Pod, Zeroable)]
#[repr(C)]
struct RawMasterRecord {
    atten_dist: [u8; 4],
    max_dist: [u8; 4],
    min_dist: [u8; 4],
    max_size: [u8; 4],
    min_size: [u8; 4],
    power: [u8; 4],
}

/// Size in bytes of a persisted [`ShadowCasterSettings`].
pub const CASTER_RECORD_SIZE: usize = std::mem::size_of::<RawCasterRecord>();
/// Size in bytes of a persisted [`ShadowMasterSettings`].
pub const MASTER_RECORD_SIZE: usize = std::mem::size_of::<RawMasterRecord>();

fn read_raw<T: Pod, const N: usize>(reader: &mut impl Read) -> Result<T, RecordError> {
    let mut bytes = [0_u8; N];
    reader.read_exact(&mut bytes)?;
    Ok(bytemuck::pod_read_unaligned(&bytes))
}

impl ShadowCasterSettings {
    pub fn read_from(reader: &mut impl Read) -> Result<Self, RecordError> {
        let raw: RawCasterRecord = read_raw::<_, CASTER_RECORD_SIZE>(reader)?;
        Ok(Self {
            cast_flags: CasterFlags::from_bits_retain(raw.cast_flags),
            boost: f32::from_le_bytes(raw.boost),
            atten_scale: f32::from_le_bytes(raw.atten_scale),
            blur_scale: f32::from_le_bytes(raw.blur_scale),
        })
    }

    pub fn write_to(&self, writer: &mut impl Write) -> Result<(), RecordError> {
        let raw = RawCasterRecord {
            cast_flags: self.cast_flags.bits(),
            boost: self.boost.to_le_bytes(),
            atten_scale: self.atten_scale.to_le_bytes(),
            blur_scale: self.blur_scale.to_le_bytes(),
        };
        writer.write_all(bytemuck::bytes_of(&raw))?;
        Ok(())
    }
}

impl ShadowMasterSettings {
    pub fn read_from(reader: &mut impl Read) -> Result<Self, RecordError> {
        let raw: RawMasterRecord = read_raw::<_, MASTER_RECORD_SIZE>(reader)?;
        Ok(Self {
            atten_dist: f32::from_le_bytes(raw.atten_dist),
            max_dist: f32::from_le_bytes(raw.max_dist),
            min_dist: f32::from_le_bytes(raw.min_dist),
            max_size: u32::from_le_bytes(raw.max_size),
            min_size: u32::from_le_bytes(raw.min_size),
            power: f32::from_le_bytes(raw.power),
        })
    }

    pub fn write_to(&self, writer: &mut impl Write) -> Result<(), RecordError> {
        let raw = RawMasterRecord {
            atten_dist: self.atten_dist.to_le_bytes(),
            max_dist: self.max_dist.to_le_bytes(),
            min_dist: self.min_dist.to_le_bytes(),
            max_size: self.max_size.to_le_bytes(),
            min_size: self.min_size.to_le_bytes(),
            power: self.power.to_le_bytes(),
        };
        writer.write_all(bytemuck::bytes_of(&raw))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn record_sizes() {
        assert_eq!(CASTER_RECORD_SIZE, 13);
        assert_eq!(MASTER_RECORD_SIZE, 24);
    }

    #[test]
    fn master_round_trip_is_bit_exact() {
        let settings = ShadowMasterSettings {
            atten_dist: 12.5,
            max_dist: -0.0,
            min_dist: f32::from_bits(0x7fc0_0001),
            max_size: 512,
            min_size: 33,
            power: 0.3,
        };

        let mut bytes = Vec::new();
        settings.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), MASTER_RECORD_SIZE);

        let read = ShadowMasterSettings::read_from(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(read.atten_dist.to_bits(), settings.atten_dist.to_bits());
        assert_eq!(read.max_dist.to_bits(), settings.max_dist.to_bits());
        assert_eq!(read.min_dist.to_bits(), settings.min_dist.to_bits());
        assert_eq!(read.max_size, settings.max_size);
        assert_eq!(read.min_size, settings.min_size);
        assert_eq!(read.power.to_bits(), settings.power.to_bits());
    }

    #[test]
    fn master_field_order_is_little_endian() {
        let settings = ShadowMasterSettings {
            max_size: 0x0102_0304,
            ..Default::default()
        };
        let mut bytes = Vec::new();
        settings.write_to(&mut bytes).unwrap();
        assert_eq!(&bytes[12..16], &[4, 3, 2, 1]);
    }

    #[test]
    fn caster_round_trip_keeps_unknown_flags() {
        let settings = ShadowCasterSettings {
            // 0x2 and 0x80 have no meaning here but still round trip.
            cast_flags: CasterFlags::from_bits_retain(0x87),
            boost: 2.0,
            atten_scale: 0.5,
            blur_scale: 1.25,
        };
        let mut bytes = Vec::new();
        settings.write_to(&mut bytes).unwrap();
        assert_eq!(bytes[0], 0x87);

        let read = ShadowCasterSettings::read_from(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(read, settings);
        assert!(read.self_shadow());
        assert!(read.limit_res());
    }

    #[test]
    fn truncated_record_is_an_error() {
        let bytes = [0_u8; MASTER_RECORD_SIZE - 1];
        let err = ShadowMasterSettings::read_from(&mut Cursor::new(&bytes[..])).unwrap_err();
        assert!(matches!(err, RecordError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }
}
