//! Byte-level MP3 segment inspection
//!
//! Synthesized segments arrive as standalone MP3 files: an optional ID3v2
//! tag, then a run of frames each opening with the 11-bit frame-sync
//! marker. When segments are concatenated into one stream, every segment
//! after the first must lose its tag and any pre-sync preamble — the pot's
//! decoder treats a second ID3 tag mid-stream as garbage and desyncs.

/// Size of the fixed ID3v2 tag header
const ID3V2_HEADER_LEN: usize = 10;

/// Length of the ID3v2 tag at the start of `data`, or 0 if none
///
/// The tag size field is syncsafe: four bytes of 7 significant bits each.
#[must_use]
pub fn id3v2_len(data: &[u8]) -> usize {
    if data.len() < ID3V2_HEADER_LEN || &data[..3] != b"ID3" {
        return 0;
    }

    let size = data[6..10]
        .iter()
        .fold(0usize, |acc, &b| (acc << 7) | usize::from(b & 0x7f));
    ID3V2_HEADER_LEN + size
}

/// Whether an MP3 frame-sync marker starts at `offset`
///
/// A frame begins with 11 set bits: `0xFF` then a byte whose top three
/// bits are set.
#[must_use]
pub fn is_frame_sync(data: &[u8], offset: usize) -> bool {
    data.len() >= offset + 2 && data[offset] == 0xFF && data[offset + 1] & 0xE0 == 0xE0
}

/// Offset of the first MP3 frame in `data`, skipping any ID3v2 tag
#[must_use]
pub fn first_frame_offset(data: &[u8]) -> Option<usize> {
    let start = id3v2_len(data).min(data.len());
    (start..data.len().saturating_sub(1)).find(|&i| is_frame_sync(data, i))
}

/// The encoded frames of a continuation segment, preamble stripped
///
/// Returns `None` when the segment contains no frame-sync marker at all
/// (nothing in it is playable).
#[must_use]
pub fn continuation_frames(segment: &[u8]) -> Option<&[u8]> {
    first_frame_offset(segment).map(|offset| &segment[offset..])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fake two-frame MP3 body used across the audio tests
    pub(crate) fn fake_frames(fill: u8) -> Vec<u8> {
        let mut body = vec![0xFF, 0xFB, 0x90, 0x64];
        body.extend(std::iter::repeat_n(fill, 24));
        body.extend([0xFF, 0xFB, 0x90, 0x64]);
        body.extend(std::iter::repeat_n(fill, 24));
        body
    }

    /// Wrap frames in an ID3v2 tag with `tag_payload` bytes of padding
    pub(crate) fn with_id3(frames: &[u8], tag_payload: usize) -> Vec<u8> {
        let mut data = b"ID3\x04\x00\x00".to_vec();
        // Syncsafe size, 7 bits per byte
        data.push(u8::try_from((tag_payload >> 21) & 0x7f).unwrap());
        data.push(u8::try_from((tag_payload >> 14) & 0x7f).unwrap());
        data.push(u8::try_from((tag_payload >> 7) & 0x7f).unwrap());
        data.push(u8::try_from(tag_payload & 0x7f).unwrap());
        data.extend(std::iter::repeat_n(0u8, tag_payload));
        data.extend_from_slice(frames);
        data
    }

    #[test]
    fn no_tag_means_zero_length() {
        assert_eq!(id3v2_len(&fake_frames(1)), 0);
        assert_eq!(id3v2_len(b"ID"), 0);
    }

    #[test]
    fn syncsafe_tag_length() {
        let data = with_id3(&fake_frames(1), 200);
        assert_eq!(id3v2_len(&data), 10 + 200);
    }

    #[test]
    fn first_frame_skips_tag_and_preamble() {
        let frames = fake_frames(7);
        let tagged = with_id3(&frames, 32);
        assert_eq!(first_frame_offset(&frames), Some(0));
        assert_eq!(first_frame_offset(&tagged), Some(42));
    }

    #[test]
    fn continuation_strips_exactly_the_preamble() {
        let frames = fake_frames(9);
        let tagged = with_id3(&frames, 16);
        let stripped = continuation_frames(&tagged).unwrap();
        assert_eq!(stripped, frames.as_slice());
    }

    #[test]
    fn segment_without_sync_yields_nothing() {
        assert_eq!(continuation_frames(&[0x00; 64]), None);
        assert_eq!(continuation_frames(&[]), None);
    }

    #[test]
    fn sync_requires_top_three_bits() {
        // 0xFF 0xD0 has only two of the three high bits set
        assert!(!is_frame_sync(&[0xFF, 0xD0], 0));
        assert!(is_frame_sync(&[0xFF, 0xE0], 0));
        assert!(is_frame_sync(&[0xFF, 0xFB], 0));
    }
}
