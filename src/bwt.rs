//! Burrows-Wheeler transform and move-to-front byte codec.
//!
//! The framed form carries the BWT start index as a big-endian u32 ahead
//! of the transformed bytes, so a stream can be decoded without side
//! channels. Encode-then-decode is the identity on arbitrary input.

/// Forward BWT: returns the index of the original rotation and the last
/// column of the sorted rotation matrix.
pub fn bwt_encode(input: &[u8]) -> (usize, Vec<u8>) {
    let n = input.len();
    let mut rotations: Vec<usize> = (0..n).collect();
    rotations.sort_by(|&a, &b| {
        for k in 0..n {
            let lhs = input[(a + k) % n];
            let rhs = input[(b + k) % n];
            if lhs != rhs {
                return lhs.cmp(&rhs);
            }
        }
        a.cmp(&b)
    });

    let mut index = 0;
    let mut coded = Vec::with_capacity(n);
    for (i, &rotation) in rotations.iter().enumerate() {
        if rotation == 0 {
            index = i;
        }
        coded.push(input[(rotation + n - 1) % n]);
    }
    (index, coded)
}

/// Inverse BWT: rebuild the original bytes from the last column and the
/// start index.
pub fn bwt_decode(input: &[u8], index: usize) -> Vec<u8> {
    let n = input.len();
    if n == 0 {
        return Vec::new();
    }
    // First-column transform: stable sort of (byte, source position).
    let mut pairs: Vec<(u8, usize)> = input.iter().copied().zip(0..n).collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut decoded = Vec::with_capacity(n);
    let mut position = index;
    for _ in 0..n {
        let (byte, next) = pairs[position];
        decoded.push(byte);
        position = next;
    }
    decoded
}

/// Frame an encoded block: 4-byte big-endian start index, then the bytes.
pub fn bwt_encode_framed(input: &[u8]) -> Vec<u8> {
    let (index, coded) = bwt_encode(input);
    let mut out = Vec::with_capacity(coded.len() + 4);
    out.extend_from_slice(&(index as u32).to_be_bytes());
    out.extend_from_slice(&coded);
    out
}

/// Decode a framed block. `None` when the header is short or the index
/// is out of range.
pub fn bwt_decode_framed(data: &[u8]) -> Option<Vec<u8>> {
    let header = data.get(..4)?;
    let index = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let body = &data[4..];
    if body.is_empty() {
        return if index == 0 { Some(Vec::new()) } else { None };
    }
    if index >= body.len() {
        return None;
    }
    Some(bwt_decode(body, index))
}

/// Move-to-front encoding: each byte becomes its current position in a
/// self-organizing alphabet.
pub fn mtf_encode(input: &[u8]) -> Vec<u8> {
    let mut alphabet = alphabet();
    input
        .iter()
        .map(|&byte| {
            let position = alphabet
                .iter()
                .position(|&b| b == byte)
                .unwrap_or_default();
            move_to_front(&mut alphabet, position);
            position as u8
        })
        .collect()
}

/// Inverse of [`mtf_encode`].
pub fn mtf_decode(input: &[u8]) -> Vec<u8> {
    let mut alphabet = alphabet();
    input
        .iter()
        .map(|&position| {
            let byte = alphabet[position as usize];
            move_to_front(&mut alphabet, position as usize);
            byte
        })
        .collect()
}

fn alphabet() -> [u8; 256] {
    let mut alphabet = [0u8; 256];
    for (i, slot) in alphabet.iter_mut().enumerate() {
        *slot = i as u8;
    }
    alphabet
}

fn move_to_front(alphabet: &mut [u8; 256], position: usize) {
    let byte = alphabet[position];
    alphabet.copy_within(0..position, 1);
    alphabet[0] = byte;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Vec<u8>> {
        vec![
            b"".to_vec(),
            b"a".to_vec(),
            b"banana".to_vec(),
            b"abracadabra".to_vec(),
            vec![0u8; 64],
            (0..=255u8).collect(),
            b"the quick brown fox jumps over the lazy dog".to_vec(),
            vec![0xff, 0x00, 0xff, 0x00, 0x7f],
        ]
    }

    #[test]
    fn bwt_round_trips() {
        for sample in samples() {
            let (index, coded) = bwt_encode(&sample);
            assert_eq!(coded.len(), sample.len());
            assert_eq!(bwt_decode(&coded, index), sample, "{sample:?}");
        }
    }

    #[test]
    fn bwt_groups_repeated_context() {
        let (index, coded) = bwt_encode(b"banana");
        assert_eq!(coded, b"nnbaaa");
        assert_eq!(index, 3);
    }

    #[test]
    fn framed_round_trips() {
        for sample in samples() {
            let framed = bwt_encode_framed(&sample);
            assert_eq!(bwt_decode_framed(&framed).as_deref(), Some(&sample[..]));
        }
    }

    #[test]
    fn framed_rejects_truncated_input() {
        assert_eq!(bwt_decode_framed(&[0, 0]), None);
        assert_eq!(bwt_decode_framed(&[0, 0, 0, 9, b'x']), None);
    }

    #[test]
    fn mtf_round_trips() {
        for sample in samples() {
            assert_eq!(mtf_decode(&mtf_encode(&sample)), sample);
        }
    }

    #[test]
    fn mtf_favors_runs() {
        // A run of one byte encodes as its first position followed by zeros.
        let encoded = mtf_encode(b"aaaa");
        assert_eq!(encoded, vec![b'a', 0, 0, 0]);
    }

    #[test]
    fn pipeline_round_trips() {
        for sample in samples() {
            let packed = mtf_encode(&bwt_encode_framed(&sample));
            let unpacked = bwt_decode_framed(&mtf_decode(&packed)).unwrap();
            assert_eq!(unpacked, sample);
        }
    }
}
