mod checksum;
mod flags;

pub use flags::Flags;

use crate::constants::{HEADER_SIZE, PAYLOAD_SIZE};
use crate::error::{Error, Result};

// Immutable once built; retransmission re-encodes the same fields rather
// than mutating anything in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub seq_num: u16,
    pub ack_num: u16,
    pub flags: Flags,
    pub window_size: u8,
    pub payload: Vec<u8>,
}

impl Segment {
    pub fn new(seq_num: u16, ack_num: u16, flags: Flags, window_size: u8, payload: Vec<u8>) -> Segment {
        Segment { seq_num, ack_num, flags, window_size, payload }
    }

    pub fn data_length(&self) -> usize {
        self.payload.len()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.payload.len() > PAYLOAD_SIZE {
            return Err(Error::EncodeRange {
                reason: format!(
                    "payload of {} bytes exceeds PAYLOAD_SIZE ({PAYLOAD_SIZE})",
                    self.payload.len()
                ),
            });
        }

        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&self.seq_num.to_be_bytes());
        buf.extend_from_slice(&self.ack_num.to_be_bytes());
        buf.push(self.flags.to_byte());
        buf.push(self.window_size);
        buf.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(&[0x00, 0x00]); // checksum placeholder
        buf.extend_from_slice(&self.payload);

        let sum = checksum::checksum(&buf);
        buf[8..10].copy_from_slice(&sum.to_be_bytes());

        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Segment> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::DecodeMalformed {
                reason: format!("segment of {} bytes is shorter than the {HEADER_SIZE}-byte header", bytes.len()),
            });
        }

        let seq_num = u16::from_be_bytes([bytes[0], bytes[1]]);
        let ack_num = u16::from_be_bytes([bytes[2], bytes[3]]);
        let flags = Flags::from_byte(bytes[4]);
        let window_size = bytes[5];
        let data_length = u16::from_be_bytes([bytes[6], bytes[7]]) as usize;

        let payload = &bytes[HEADER_SIZE..];
        if payload.len() != data_length {
            return Err(Error::DecodeMalformed {
                reason: format!(
                    "declared data_length {data_length} does not match the {} trailing bytes",
                    payload.len()
                ),
            });
        }

        if !checksum::verify(bytes) {
            return Err(Error::DecodeChecksum);
        }

        Ok(Segment {
            seq_num,
            ack_num,
            flags,
            window_size,
            payload: payload.to_vec(),
        })
    }
}

// Rejects payloads needing more than 65535 segments: the send engine indexes
// segments by seq_num - isn without wraparound.
pub fn segment_payload(payload: &[u8], isn: u16) -> Result<Vec<Segment>> {
    let chunk_count = if payload.is_empty() { 0 } else { payload.len().div_ceil(PAYLOAD_SIZE) };

    if chunk_count > u16::MAX as usize {
        return Err(Error::EncodeRange {
            reason: format!("payload requires {chunk_count} segments, exceeding the supported 16-bit sequence space"),
        });
    }

    let mut segments = Vec::with_capacity(chunk_count);
    for i in 0..chunk_count {
        let start = i * PAYLOAD_SIZE;
        let end = (start + PAYLOAD_SIZE).min(payload.len());
        let seq_num = isn.wrapping_add(i as u16);
        segments.push(Segment::new(seq_num, 0, Flags::default(), 0, payload[start..end].to_vec()));
    }

    Ok(segments)
}

// Sorts by seq_num relative to isn, so wraparound orders correctly.
pub fn reassemble(received: &[(u16, Vec<u8>)], isn: u16) -> Vec<u8> {
    use std::collections::HashMap;

    let mut by_seq: HashMap<u16, &Vec<u8>> = HashMap::new();
    for (seq, payload) in received {
        by_seq.entry(*seq).or_insert(payload);
    }

    let mut ordered: Vec<(u16, &Vec<u8>)> = by_seq.into_iter().collect();
    ordered.sort_by_key(|(seq, _)| seq.wrapping_sub(isn));

    let mut out = Vec::new();
    for (_, payload) in ordered {
        out.extend_from_slice(payload);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_matches_reference_hex() {
        let segment = Segment::new(
            100,
            200,
            Flags { ack: true, syn: false, fin: true },
            5,
            vec![0x01, 0x23, 0x45, 0x67, 0x89],
        );

        let bytes = segment.encode().unwrap();
        let expected = [
            0x00, 0x64, 0x00, 0xc8, 0x05, 0x05, 0x00, 0x05, 0x2a, 0x3f, 0x01, 0x23, 0x45, 0x67, 0x89,
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let segment = Segment::new(0, 0, Flags::default(), 0, vec![0u8; PAYLOAD_SIZE + 1]);
        assert!(matches!(segment.encode(), Err(Error::EncodeRange { .. })));
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let segment = Segment::new(
            42,
            7,
            Flags { ack: true, syn: true, fin: false },
            200,
            b"hello, btcp".to_vec(),
        );

        let bytes = segment.encode().unwrap();
        let decoded = Segment::decode(&bytes).unwrap();
        assert_eq!(decoded, segment);
    }

    #[test]
    fn decode_rejects_bad_length() {
        let mut segment = Segment::new(1, 1, Flags::default(), 0, vec![1, 2, 3]).encode().unwrap();
        segment.pop(); // truncate the payload without fixing data_length
        assert!(matches!(Segment::decode(&segment), Err(Error::DecodeMalformed { .. })));
    }

    #[test]
    fn decode_rejects_corrupted_checksum() {
        let mut bytes = Segment::new(1, 1, Flags::default(), 0, vec![1, 2, 3]).encode().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(Segment::decode(&bytes), Err(Error::DecodeChecksum)));
    }

    #[test]
    fn decode_ignores_reserved_flag_bits() {
        let mut bytes = Segment::new(1, 1, Flags::ACK, 0, vec![]).encode().unwrap();
        bytes[4] |= 0xf8; // set every reserved bit
        // checksum no longer matches because we mutated a checksummed byte;
        // recompute so this test isolates flag handling from checksum handling.
        let sum = checksum::checksum(&{
            let mut tmp = bytes.clone();
            tmp[8] = 0;
            tmp[9] = 0;
            tmp
        });
        bytes[8..10].copy_from_slice(&sum.to_be_bytes());

        let decoded = Segment::decode(&bytes).unwrap();
        assert_eq!(decoded.flags, Flags::ACK);
    }

    #[test]
    fn segmentation_splits_on_payload_size_boundaries() {
        let mut payload = vec![0x00; PAYLOAD_SIZE];
        payload.extend(vec![0x01; PAYLOAD_SIZE]);
        payload.extend(vec![0x02; PAYLOAD_SIZE]);
        payload.extend(vec![0x03; 50]);

        let segments = segment_payload(&payload, 10).unwrap();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0].seq_num, 10);
        assert_eq!(segments[1].seq_num, 11);
        assert_eq!(segments[2].seq_num, 12);
        assert_eq!(segments[3].seq_num, 13);
        assert_eq!(segments[0].data_length(), PAYLOAD_SIZE);
        assert_eq!(segments[1].data_length(), PAYLOAD_SIZE);
        assert_eq!(segments[2].data_length(), PAYLOAD_SIZE);
        assert_eq!(segments[3].data_length(), 50);
    }

    #[test]
    fn segmentation_of_exact_multiple_has_no_short_segment() {
        let payload = vec![0xaa; PAYLOAD_SIZE * 3];
        let segments = segment_payload(&payload, 0).unwrap();
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.data_length() == PAYLOAD_SIZE));
    }

    #[test]
    fn segmentation_of_empty_payload_produces_no_segments() {
        let segments = segment_payload(&[], 0).unwrap();
        assert!(segments.is_empty());
    }

    #[test]
    fn segmentation_then_reassembly_is_identity() {
        let payload: Vec<u8> = (0..(PAYLOAD_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let isn = 65_000; // exercises the wraparound path
        let segments = segment_payload(&payload, isn).unwrap();

        let mut received: Vec<(u16, Vec<u8>)> =
            segments.iter().map(|s| (s.seq_num, s.payload.clone())).collect();
        // reorder and duplicate to exercise dedup + sort-by-offset-from-isn
        received.reverse();
        received.push(received[0].clone());

        let rebuilt = reassemble(&received, isn);
        assert_eq!(rebuilt, payload);
    }
}
