//! H.264 sequence parameter set parsing (ITU-T H.264 §7.3.2.1).
//!
//! Only the fields needed to report picture geometry are decoded; everything
//! before `pic_width_in_mbs_minus1` is read and discarded.

/// Remove `00 00 03` emulation prevention bytes (§7.4.1).
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 3 {
            rbsp.extend_from_slice(&[0, 0]);
            i += 3;
            continue;
        }
        rbsp.push(data[i]);
        i += 1;
    }
    rbsp
}

/// MSB-first bit reader with exp-Golomb support (§9.1).
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    pub fn read_bit(&mut self) -> Option<u32> {
        let byte = *self.data.get(self.bit_pos / 8)?;
        let bit = (byte >> (7 - self.bit_pos % 8)) & 1;
        self.bit_pos += 1;
        Some(bit as u32)
    }

    pub fn read_bits(&mut self, count: usize) -> Option<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            value = (value << 1) | self.read_bit()?;
        }
        Some(value)
    }

    /// Unsigned exp-Golomb `ue(v)`.
    pub fn read_ue(&mut self) -> Option<u32> {
        let mut zeros = 0usize;
        while self.read_bit()? == 0 {
            zeros += 1;
            if zeros > 31 {
                return None;
            }
        }
        let suffix = self.read_bits(zeros)?;
        Some(((1u64 << zeros) - 1 + suffix as u64) as u32)
    }

    /// Signed exp-Golomb `se(v)`.
    pub fn read_se(&mut self) -> Option<i32> {
        let code = self.read_ue()? as i64;
        let magnitude = (code + 1) / 2;
        let value = if code % 2 == 0 { -magnitude } else { magnitude };
        Some(value as i32)
    }
}

fn skip_scaling_list(reader: &mut BitReader<'_>, size: usize) -> Option<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta = reader.read_se()?;
            next_scale = (last_scale + delta + 256) % 256;
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Some(())
}

/// Cropped picture size in pixels from an SPS NAL (header byte included).
pub fn parse_sps_dimensions(sps: &[u8]) -> Option<(u32, u32)> {
    if sps.len() < 4 {
        return None;
    }
    let rbsp = remove_emulation_prevention(&sps[1..]);
    let mut r = BitReader::new(&rbsp);

    let profile_idc = r.read_bits(8)?;
    r.read_bits(16)?; // constraint flags, level_idc
    r.read_ue()?; // seq_parameter_set_id

    let mut chroma_format_idc = 1;
    if matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    ) {
        chroma_format_idc = r.read_ue()?;
        if chroma_format_idc == 3 {
            r.read_bit()?; // separate_colour_plane_flag
        }
        r.read_ue()?; // bit_depth_luma_minus8
        r.read_ue()?; // bit_depth_chroma_minus8
        r.read_bit()?; // qpprime_y_zero_transform_bypass_flag
        if r.read_bit()? == 1 {
            let lists = if chroma_format_idc == 3 { 12 } else { 8 };
            for i in 0..lists {
                if r.read_bit()? == 1 {
                    skip_scaling_list(&mut r, if i < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    r.read_ue()?; // log2_max_frame_num_minus4
    match r.read_ue()? {
        0 => {
            r.read_ue()?;
        }
        1 => {
            r.read_bit()?;
            r.read_se()?;
            r.read_se()?;
            for _ in 0..r.read_ue()? {
                r.read_se()?;
            }
        }
        _ => {}
    }
    r.read_ue()?; // max_num_ref_frames
    r.read_bit()?; // gaps_in_frame_num_value_allowed_flag

    let width_mbs = r.read_ue()? + 1;
    let height_map_units = r.read_ue()? + 1;
    let frame_mbs_only = r.read_bit()?;
    if frame_mbs_only == 0 {
        r.read_bit()?; // mb_adaptive_frame_field_flag
    }
    r.read_bit()?; // direct_8x8_inference_flag

    let (mut crop_left, mut crop_right, mut crop_top, mut crop_bottom) = (0, 0, 0, 0);
    if r.read_bit()? == 1 {
        crop_left = r.read_ue()?;
        crop_right = r.read_ue()?;
        crop_top = r.read_ue()?;
        crop_bottom = r.read_ue()?;
    }

    let width = width_mbs * 16;
    let height = height_map_units * 16 * (2 - frame_mbs_only);
    let (crop_x, crop_y) = match chroma_format_idc {
        0 | 3 => (1, 2 - frame_mbs_only),
        _ => (2, 2 * (2 - frame_mbs_only)),
    };

    Some((
        width.saturating_sub((crop_left + crop_right) * crop_x),
        height.saturating_sub((crop_top + crop_bottom) * crop_y),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Baseline profile, 320x240, progressive, no cropping.
    const SPS_320X240: [u8; 8] = [0x67, 0x42, 0x00, 0x1e, 0xf4, 0x0a, 0x0f, 0xc8];

    #[test]
    fn exp_golomb() {
        // 1 | 010 | 011 | 00100 -> 0, 1, 2, 3
        let data = [0b1010_0110, 0b0100_0000];
        let mut r = BitReader::new(&data);
        assert_eq!(r.read_ue(), Some(0));
        assert_eq!(r.read_ue(), Some(1));
        assert_eq!(r.read_ue(), Some(2));
        assert_eq!(r.read_ue(), Some(3));
    }

    #[test]
    fn signed_exp_golomb() {
        // 010 -> +1, 011 -> -1
        let data = [0b0100_1100];
        let mut r = BitReader::new(&data);
        assert_eq!(r.read_se(), Some(1));
        assert_eq!(r.read_se(), Some(-1));
    }

    #[test]
    fn reader_runs_dry() {
        let mut r = BitReader::new(&[0x00]);
        assert_eq!(r.read_ue(), None);
    }

    #[test]
    fn emulation_prevention_removed() {
        assert_eq!(
            remove_emulation_prevention(&[0x00, 0x00, 0x03, 0x01, 0x42]),
            vec![0x00, 0x00, 0x01, 0x42]
        );
    }

    #[test]
    fn baseline_sps_dimensions() {
        assert_eq!(parse_sps_dimensions(&SPS_320X240), Some((320, 240)));
    }

    #[test]
    fn truncated_sps() {
        assert_eq!(parse_sps_dimensions(&[0x67, 0x42]), None);
        assert_eq!(parse_sps_dimensions(&SPS_320X240[..5]), None);
    }
}
