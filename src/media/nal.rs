//! H.264 NAL unit handling
//!
//! The dongle delivers a raw Annex-B elementary stream: NAL units separated
//! by 4-byte start codes, no container framing.
//!
//! Annex-B chunk structure:
//! ```text
//! +-------------+-----------+-------------+-----------+
//! | 00 00 00 01 | NAL unit  | 00 00 00 01 | NAL unit  | ...
//! | (start code)| (hdr+RBSP)| (start code)| (hdr+RBSP)|
//! +-------------+-----------+-------------+-----------+
//! ```
//!
//! NAL unit header (first byte of each unit):
//! ```text
//! +---+-------+-----------+
//! | F |  NRI  | unit type |
//! | 1 | 2 bits|  5 bits   |
//! +---+-------+-----------+
//! ```

/// The 4-byte Annex-B start code
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// NAL unit type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// Non-IDR slice
    Slice = 1,
    /// Slice data partition A
    SlicePartA = 2,
    /// Slice data partition B
    SlicePartB = 3,
    /// Slice data partition C
    SlicePartC = 4,
    /// IDR slice (keyframe)
    Idr = 5,
    /// Supplemental enhancement information
    Sei = 6,
    /// Sequence parameter set
    Sps = 7,
    /// Picture parameter set
    Pps = 8,
    /// Access unit delimiter
    Aud = 9,
    /// End of sequence
    EndSeq = 10,
    /// End of stream
    EndStream = 11,
    /// Filler data
    Filler = 12,
}

impl NalUnitType {
    /// Parse from a NAL unit header byte (low 5 bits)
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x1F {
            1 => Some(NalUnitType::Slice),
            2 => Some(NalUnitType::SlicePartA),
            3 => Some(NalUnitType::SlicePartB),
            4 => Some(NalUnitType::SlicePartC),
            5 => Some(NalUnitType::Idr),
            6 => Some(NalUnitType::Sei),
            7 => Some(NalUnitType::Sps),
            8 => Some(NalUnitType::Pps),
            9 => Some(NalUnitType::Aud),
            10 => Some(NalUnitType::EndSeq),
            11 => Some(NalUnitType::EndStream),
            12 => Some(NalUnitType::Filler),
            _ => None,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(self, NalUnitType::Idr)
    }

    pub fn is_parameter_set(&self) -> bool {
        matches!(self, NalUnitType::Sps | NalUnitType::Pps)
    }
}

/// Find the next start code at or after `from`
///
/// Returns the byte offset of the start code itself.
pub fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    if from > data.len() {
        return None;
    }
    data[from..]
        .windows(START_CODE.len())
        .position(|w| w == START_CODE)
        .map(|pos| pos + from)
}

/// Iterator over start-code-delimited NAL units in an Annex-B chunk
///
/// Each yielded slice is one unit without its start code, running to the
/// next start code or the end of the chunk. Data before the first start
/// code is not a unit and is skipped. A truncated final unit (no closing
/// start code) is yielded as-is.
pub struct AnnexBUnits<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> AnnexBUnits<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let offset = match find_start_code(data, 0) {
            Some(pos) => pos + START_CODE.len(),
            None => data.len(),
        };
        Self { data, offset }
    }
}

impl<'a> Iterator for AnnexBUnits<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }

        let start = self.offset;
        let end = match find_start_code(self.data, start) {
            Some(pos) => pos,
            None => self.data.len(),
        };
        self.offset = end + START_CODE.len();

        Some(&self.data[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_type_parsing() {
        assert_eq!(NalUnitType::from_byte(0x01), Some(NalUnitType::Slice));
        assert_eq!(NalUnitType::from_byte(0x02), Some(NalUnitType::SlicePartA));
        assert_eq!(NalUnitType::from_byte(0x03), Some(NalUnitType::SlicePartB));
        assert_eq!(NalUnitType::from_byte(0x04), Some(NalUnitType::SlicePartC));
        assert_eq!(NalUnitType::from_byte(0x05), Some(NalUnitType::Idr));
        assert_eq!(NalUnitType::from_byte(0x06), Some(NalUnitType::Sei));
        assert_eq!(NalUnitType::from_byte(0x07), Some(NalUnitType::Sps));
        assert_eq!(NalUnitType::from_byte(0x08), Some(NalUnitType::Pps));
        assert_eq!(NalUnitType::from_byte(0x09), Some(NalUnitType::Aud));
        assert_eq!(NalUnitType::from_byte(0x0A), Some(NalUnitType::EndSeq));
        assert_eq!(NalUnitType::from_byte(0x0B), Some(NalUnitType::EndStream));
        assert_eq!(NalUnitType::from_byte(0x0C), Some(NalUnitType::Filler));
        assert_eq!(NalUnitType::from_byte(0x00), None);

        // With nal_ref_idc bits set
        assert_eq!(NalUnitType::from_byte(0x65), Some(NalUnitType::Idr)); // 0x65 & 0x1F = 5
        assert_eq!(NalUnitType::from_byte(0x67), Some(NalUnitType::Sps)); // 0x67 & 0x1F = 7
        assert_eq!(NalUnitType::from_byte(0x68), Some(NalUnitType::Pps)); // 0x68 & 0x1F = 8
        assert_eq!(NalUnitType::from_byte(0x41), Some(NalUnitType::Slice));
    }

    #[test]
    fn test_unit_type_predicates() {
        assert!(NalUnitType::Idr.is_keyframe());
        assert!(!NalUnitType::Slice.is_keyframe());
        assert!(!NalUnitType::Sps.is_keyframe());

        assert!(NalUnitType::Sps.is_parameter_set());
        assert!(NalUnitType::Pps.is_parameter_set());
        assert!(!NalUnitType::Idr.is_parameter_set());
        assert!(!NalUnitType::Slice.is_parameter_set());
    }

    #[test]
    fn test_find_start_code() {
        let data: &[u8] = &[0xAA, 0x00, 0x00, 0x00, 0x01, 0x67];

        assert_eq!(find_start_code(data, 0), Some(1));
        assert_eq!(find_start_code(data, 1), Some(1));
        assert_eq!(find_start_code(data, 2), None);
        assert_eq!(find_start_code(&[], 0), None);
    }

    #[test]
    fn test_units_two_delimited() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x01, 0x67, 0xAA, // SPS
            0x00, 0x00, 0x00, 0x01, 0x68, 0xBB, // PPS
        ];

        let mut units = AnnexBUnits::new(data);

        let first = units.next().unwrap();
        assert_eq!(first, &[0x67, 0xAA]);
        assert_eq!(NalUnitType::from_byte(first[0]), Some(NalUnitType::Sps));

        let second = units.next().unwrap();
        assert_eq!(second, &[0x68, 0xBB]);
        assert_eq!(NalUnitType::from_byte(second[0]), Some(NalUnitType::Pps));

        assert!(units.next().is_none());
    }

    #[test]
    fn test_units_final_runs_to_end() {
        // No closing start code after the IDR unit
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x01, 0x67, 0xAA, //
            0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84,
        ];

        let units: Vec<&[u8]> = AnnexBUnits::new(data).collect();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1], &[0x65, 0x88, 0x84]);
    }

    #[test]
    fn test_units_skip_leading_bytes() {
        // Bytes before the first start code are not a unit
        let data: &[u8] = &[0x41, 0x9A, 0x00, 0x00, 0x00, 0x01, 0x68, 0xBB];

        let units: Vec<&[u8]> = AnnexBUnits::new(data).collect();
        assert_eq!(units, vec![&[0x68, 0xBB][..]]);
    }

    #[test]
    fn test_units_consecutive_start_codes() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x01, //
            0x00, 0x00, 0x00, 0x01, 0x67,
        ];

        let units: Vec<&[u8]> = AnnexBUnits::new(data).collect();
        assert_eq!(units.len(), 2);
        assert!(units[0].is_empty());
        assert_eq!(units[1], &[0x67]);
    }

    #[test]
    fn test_units_no_start_code() {
        let data: &[u8] = &[0x67, 0xAA, 0xBB];
        assert!(AnnexBUnits::new(data).next().is_none());
    }

    #[test]
    fn test_units_empty_input() {
        assert!(AnnexBUnits::new(&[]).next().is_none());
    }

    #[test]
    fn test_units_trailing_start_code() {
        // Chunk cut off right after a start code
        let data: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x67, 0x00, 0x00, 0x00, 0x01];

        let units: Vec<&[u8]> = AnnexBUnits::new(data).collect();
        assert_eq!(units, vec![&[0x67][..]]);
    }
}
