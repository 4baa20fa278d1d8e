//! Video duration probing
//!
//! [`ContainerProbe`] picks a reader from the file's leading bytes:
//! - Matroska / WebM: `Segment/Info/Duration` scaled by `TimecodeScale`
//! - anything else is read as ISO base media (MP4, MOV, M4V) from `moov/mvhd`

use async_trait::async_trait;
use thiserror::Error;

use super::file::MediaFile;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("file ends inside a {0} box")]
    Truncated(&'static str),

    #[error("no {0} box")]
    MissingBox(&'static str),

    #[error("no {0} element")]
    MissingElement(&'static str),

    #[error("malformed {0} element")]
    BadElement(&'static str),

    #[error("movie header has a zero timescale")]
    ZeroTimescale,

    #[error("unsupported mvhd version {0}")]
    UnsupportedVersion(u8),
}

/// Reads the playing time of a video
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Duration in seconds
    async fn duration_secs(&self, file: &MediaFile) -> Result<f64, ProbeError>;
}

/// Probe for the containers browsers record and phones export
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerProbe;

#[async_trait]
impl MediaProbe for ContainerProbe {
    async fn duration_secs(&self, file: &MediaFile) -> Result<f64, ProbeError> {
        container_duration(&file.data)
    }
}

/// Duration in seconds, dispatching on the container's magic bytes
pub fn container_duration(data: &[u8]) -> Result<f64, ProbeError> {
    if data.starts_with(&EBML_MAGIC) {
        webm_duration(data)
    } else {
        mp4_duration(data)
    }
}

/// Duration in seconds from an MP4 byte stream
pub fn mp4_duration(data: &[u8]) -> Result<f64, ProbeError> {
    let moov = find_box(data, b"moov")?.ok_or(ProbeError::MissingBox("moov"))?;
    let mvhd = find_box(moov, b"mvhd")?.ok_or(ProbeError::MissingBox("mvhd"))?;

    let version = *mvhd.first().ok_or(ProbeError::Truncated("mvhd"))?;
    // version(1) flags(3), then creation/modification times
    let (timescale, duration) = match version {
        0 => (read_u32(mvhd, 12)?, u64::from(read_u32(mvhd, 16)?)),
        1 => (read_u32(mvhd, 20)?, read_u64(mvhd, 24)?),
        v => return Err(ProbeError::UnsupportedVersion(v)),
    };
    if timescale == 0 {
        return Err(ProbeError::ZeroTimescale);
    }
    Ok(duration as f64 / f64::from(timescale))
}

/// Payload of the first child box of type `kind` within `data`
fn find_box<'a>(data: &'a [u8], kind: &[u8; 4]) -> Result<Option<&'a [u8]>, ProbeError> {
    let mut offset = 0usize;
    while offset + 8 <= data.len() {
        let size32 = read_u32(data, offset)?;
        let box_type = &data[offset + 4..offset + 8];

        let (header, size) = match size32 {
            0 => (8, data.len() - offset),
            1 => {
                let large = read_u64(data, offset + 8)?;
                (16, usize::try_from(large).map_err(|_| ProbeError::Truncated("box"))?)
            }
            n => (8, n as usize),
        };
        if size < header {
            return Err(ProbeError::Truncated("box"));
        }
        let end = offset
            .checked_add(size)
            .filter(|end| *end <= data.len())
            .ok_or(ProbeError::Truncated(box_name(kind)))?;

        if box_type == kind {
            return Ok(Some(&data[offset + header..end]));
        }
        offset = end;
    }
    Ok(None)
}

fn box_name(kind: &[u8; 4]) -> &'static str {
    match kind {
        b"moov" => "moov",
        b"mvhd" => "mvhd",
        _ => "box",
    }
}

fn read_u32(data: &[u8], at: usize) -> Result<u32, ProbeError> {
    data.get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or(ProbeError::Truncated("mvhd"))
}

fn read_u64(data: &[u8], at: usize) -> Result<u64, ProbeError> {
    data.get(at..at + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_be_bytes)
        .ok_or(ProbeError::Truncated("mvhd"))
}

// ==================== Matroska / WebM ====================

const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];
const EBML_HEADER: u32 = 0x1A45_DFA3;
const SEGMENT: u32 = 0x1853_8067;
const INFO: u32 = 0x1549_A966;
const TIMECODE_SCALE: u32 = 0x2A_D7B1;
const DURATION: u32 = 0x4489;

/// Nanoseconds per tick when `TimecodeScale` is absent
const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// Duration in seconds from a Matroska or WebM byte stream
pub fn webm_duration(data: &[u8]) -> Result<f64, ProbeError> {
    let (id, _) = read_element_id(data, 0)?;
    if id != EBML_HEADER {
        return Err(ProbeError::MissingElement("EBML header"));
    }
    let segment = find_element(data, SEGMENT)?.ok_or(ProbeError::MissingElement("Segment"))?;
    let info = find_element(segment, INFO)?.ok_or(ProbeError::MissingElement("Info"))?;

    let scale = match find_element(info, TIMECODE_SCALE)? {
        Some(raw) => read_uint(raw)?,
        None => DEFAULT_TIMECODE_SCALE,
    };
    if scale == 0 {
        return Err(ProbeError::ZeroTimescale);
    }

    // Live recordings often leave Duration out
    let raw = find_element(info, DURATION)?.ok_or(ProbeError::MissingElement("Duration"))?;
    let ticks = match raw.len() {
        4 => f64::from(f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])),
        8 => f64::from_be_bytes([raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7]]),
        _ => return Err(ProbeError::BadElement("Duration")),
    };
    Ok(ticks * scale as f64 / 1e9)
}

/// Payload of the first element with `id` among the elements in `data`.
/// An element of unknown size runs to the end of `data`.
fn find_element(data: &[u8], id: u32) -> Result<Option<&[u8]>, ProbeError> {
    let mut offset = 0usize;
    while offset < data.len() {
        let (element, id_len) = read_element_id(data, offset)?;
        let (size, size_len) = read_size(data, offset + id_len)?;
        let start = offset + id_len + size_len;
        let end = match size {
            Some(size) => usize::try_from(size)
                .ok()
                .and_then(|size| start.checked_add(size))
                .filter(|end| *end <= data.len())
                .ok_or(ProbeError::Truncated("element"))?,
            None => data.len(),
        };

        if element == id {
            return Ok(Some(&data[start..end]));
        }
        offset = end;
    }
    Ok(None)
}

/// Element id with its length marker kept, as ids are written in the format
fn read_element_id(data: &[u8], at: usize) -> Result<(u32, usize), ProbeError> {
    let first = *data.get(at).ok_or(ProbeError::Truncated("element"))?;
    let len = first.leading_zeros() as usize + 1;
    if len > 4 {
        return Err(ProbeError::BadElement("id"));
    }
    let bytes = data.get(at..at + len).ok_or(ProbeError::Truncated("element"))?;
    let id = bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
    Ok((id, len))
}

/// Element data size; `None` when the size is the reserved unknown value
fn read_size(data: &[u8], at: usize) -> Result<(Option<u64>, usize), ProbeError> {
    let first = *data.get(at).ok_or(ProbeError::Truncated("element"))?;
    if first == 0 {
        return Err(ProbeError::BadElement("size"));
    }
    let len = first.leading_zeros() as usize + 1;
    let bytes = data.get(at..at + len).ok_or(ProbeError::Truncated("element"))?;

    let marker_free = u64::from(first) & (0xFF >> len);
    let value = bytes[1..].iter().fold(marker_free, |acc, b| (acc << 8) | u64::from(*b));
    let unknown = (1u64 << (7 * len)) - 1;
    Ok((if value == unknown { None } else { Some(value) }, len))
}

fn read_uint(raw: &[u8]) -> Result<u64, ProbeError> {
    if raw.len() > 8 {
        return Err(ProbeError::BadElement("TimecodeScale"));
    }
    Ok(raw.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Minimal WebM (EBML header + Segment/Info) with the given duration in
/// ticks of `timecode_scale` nanoseconds, for tests
#[doc(hidden)]
pub fn synthetic_webm(timecode_scale: u32, duration: f64) -> Vec<u8> {
    fn element(id: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        // 8-byte size: marker byte then a 56-bit length
        out.push(0x01);
        out.extend_from_slice(&(payload.len() as u64).to_be_bytes()[1..]);
        out.extend_from_slice(payload);
        out
    }

    let mut info = element(&[0x2A, 0xD7, 0xB1], &timecode_scale.to_be_bytes());
    info.extend(element(&[0x44, 0x89], &duration.to_be_bytes()));

    let mut segment = element(&[0xEC], &[0u8; 6]); // Void
    segment.extend(element(&[0x15, 0x49, 0xA9, 0x66], &info));

    let mut out = element(&EBML_MAGIC, &element(&[0x42, 0x82], b"webm"));
    out.extend(element(&[0x18, 0x53, 0x80, 0x67], &segment));
    out
}

/// Minimal MP4 (ftyp + moov/mvhd v0) with the given duration, for tests
#[doc(hidden)]
pub fn synthetic_mp4(timescale: u32, duration: u32) -> Vec<u8> {
    fn boxed(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }

    let mut mvhd = vec![0u8; 4]; // version 0, no flags
    mvhd.extend_from_slice(&0u32.to_be_bytes()); // creation
    mvhd.extend_from_slice(&0u32.to_be_bytes()); // modification
    mvhd.extend_from_slice(&timescale.to_be_bytes());
    mvhd.extend_from_slice(&duration.to_be_bytes());
    mvhd.extend_from_slice(&[0u8; 80]);

    let mut out = boxed(b"ftyp", b"isom\0\0\0\0isommp41");
    out.extend(boxed(b"moov", &boxed(b"mvhd", &mvhd)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version0_duration() {
        let data = synthetic_mp4(1000, 30_000);
        assert_eq!(mp4_duration(&data).unwrap(), 30.0);

        let data = synthetic_mp4(1000, 30_100);
        assert!(mp4_duration(&data).unwrap() > 30.0);
    }

    #[test]
    fn test_version1_duration() {
        let mut mvhd = vec![1u8, 0, 0, 0];
        mvhd.extend_from_slice(&[0u8; 16]);
        mvhd.extend_from_slice(&600u32.to_be_bytes());
        mvhd.extend_from_slice(&9000u64.to_be_bytes());

        let mut inner = ((mvhd.len() + 8) as u32).to_be_bytes().to_vec();
        inner.extend_from_slice(b"mvhd");
        inner.extend_from_slice(&mvhd);
        let mut data = ((inner.len() + 8) as u32).to_be_bytes().to_vec();
        data.extend_from_slice(b"moov");
        data.extend_from_slice(&inner);

        assert_eq!(mp4_duration(&data).unwrap(), 15.0);
    }

    #[test]
    fn test_missing_and_truncated() {
        let ftyp_only = &synthetic_mp4(1000, 5000)[..24];
        assert_eq!(mp4_duration(ftyp_only), Err(ProbeError::MissingBox("moov")));
        assert!(matches!(mp4_duration(b"not a video"), Err(ProbeError::Truncated(_))));

        let mut data = synthetic_mp4(1000, 5000);
        data.truncate(data.len() - 10);
        assert!(matches!(mp4_duration(&data), Err(ProbeError::Truncated(_))));
    }

    #[test]
    fn test_zero_timescale() {
        assert_eq!(mp4_duration(&synthetic_mp4(0, 10)), Err(ProbeError::ZeroTimescale));
    }

    #[test]
    fn test_webm_duration_boundary() {
        assert_eq!(webm_duration(&synthetic_webm(1_000_000, 30_000.0)).unwrap(), 30.0);
        assert!(webm_duration(&synthetic_webm(1_000_000, 30_100.0)).unwrap() > 30.0);
        // Microsecond ticks
        assert_eq!(webm_duration(&synthetic_webm(1_000, 2_500_000.0)).unwrap(), 2.5);
    }

    #[test]
    fn test_webm_unknown_size_segment_and_float32() {
        let mut data = vec![0x1A, 0x45, 0xDF, 0xA3, 0x84, 0x42, 0x82, 0x81, b'w'];
        // Segment with the reserved unknown size, as streaming muxers write it
        data.extend_from_slice(&[0x18, 0x53, 0x80, 0x67, 0xFF]);
        // Info holding only a 4-byte Duration; TimecodeScale defaults to 1ms
        data.extend_from_slice(&[0x15, 0x49, 0xA9, 0x66, 0x87, 0x44, 0x89, 0x84]);
        data.extend_from_slice(&12_000f32.to_be_bytes());

        assert_eq!(webm_duration(&data).unwrap(), 12.0);
    }

    #[test]
    fn test_webm_missing_duration() {
        let mut data = vec![0x1A, 0x45, 0xDF, 0xA3, 0x80];
        data.extend_from_slice(&[0x18, 0x53, 0x80, 0x67, 0x85]);
        data.extend_from_slice(&[0x15, 0x49, 0xA9, 0x66, 0x80]);

        assert_eq!(webm_duration(&data), Err(ProbeError::MissingElement("Duration")));
        assert!(matches!(
            webm_duration(&data[..7]),
            Err(ProbeError::Truncated(_))
        ));
    }

    #[test]
    fn test_container_dispatch() {
        assert_eq!(container_duration(&synthetic_mp4(1000, 4000)).unwrap(), 4.0);
        assert_eq!(container_duration(&synthetic_webm(1_000_000, 4000.0)).unwrap(), 4.0);
        assert!(matches!(
            container_duration(b"ftypnothing"),
            Err(ProbeError::Truncated(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_trait() {
        let file = MediaFile::new("clip.mp4", "video/mp4", synthetic_mp4(90_000, 900_000));
        assert_eq!(ContainerProbe.duration_secs(&file).await.unwrap(), 10.0);

        let file = MediaFile::new("clip.webm", "video/webm", synthetic_webm(1_000_000, 7_000.0));
        assert_eq!(ContainerProbe.duration_secs(&file).await.unwrap(), 7.0);
    }
}
