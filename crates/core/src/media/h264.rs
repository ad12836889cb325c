use base64::prelude::{BASE64_STANDARD, Engine as _};

/// 4-byte Annex B start code.
pub const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// NAL unit types (ITU-T H.264 Table 7-1) the demuxer cares about.
pub const NAL_SLICE: u8 = 1;
pub const NAL_IDR: u8 = 5;
pub const NAL_SEI: u8 = 6;
pub const NAL_SPS: u8 = 7;
pub const NAL_PPS: u8 = 8;
pub const NAL_AUD: u8 = 9;

/// Split a codec init blob into its parameter units.
///
/// The blob is a run of units packed back to back, each introduced by a
/// 4-byte `00 00 00 01` start code (the first one is assumed, not checked).
/// Every returned slice keeps its own leading start code, so joining the
/// slices gives back the input byte for byte:
///
/// ```text
/// 00 00 00 01 AA BB 00 00 00 01 CC
/// └──── unit 0 ───┘ └── unit 1 ──┘
/// ```
///
/// Scanning starts at offset 4. Only 4-byte start codes cut; 3-byte ones
/// stay inside the unit. Input shorter than 4 bytes yields nothing.
///
/// ```
/// use rtsp_source::media::h264::split_init_data;
///
/// let blob = [0, 0, 0, 1, 0xAA, 0xBB, 0, 0, 0, 1, 0xCC];
/// let units = split_init_data(&blob);
/// assert_eq!(units, vec![&blob[..6], &blob[6..]]);
/// ```
pub fn split_init_data(data: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    if data.len() < START_CODE.len() {
        return units;
    }

    let mut start = 0usize;
    for i in START_CODE.len()..data.len() {
        if data[i..].starts_with(&START_CODE) {
            units.push(&data[start..i]);
            start = i;
        }
    }

    if data.len() > start {
        units.push(&data[start..]);
    }

    tracing::trace!(
        blob_bytes = data.len(),
        units = units.len(),
        "init data split"
    );

    units
}

/// Extract NAL units from an H.264 Annex B bitstream.
///
/// Scans for start codes (both 4-byte `00 00 00 01` and 3-byte
/// `00 00 01`) and returns the NAL data between them, excluding
/// the start codes themselves.
///
/// The start code length is tracked per-NAL so that boundaries between
/// adjacent NALs are correct when 3-byte and 4-byte start codes are mixed.
pub fn extract_nal_units(data: &[u8]) -> Vec<&[u8]> {
    let mut nal_units = Vec::new();
    let mut i = 0usize;

    // (nal_data_start_index, start_code_length)
    let mut start_entries: Vec<(usize, usize)> = Vec::new();

    while i < data.len() {
        if i + 3 < data.len() && data[i..i + 4] == START_CODE {
            start_entries.push((i + 4, 4));
            i += 4;
        } else if i + 2 < data.len() && data[i..i + 3] == [0, 0, 1] {
            start_entries.push((i + 3, 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    for (idx, &(start, _)) in start_entries.iter().enumerate() {
        let end = match start_entries.get(idx + 1) {
            Some(&(next_start, next_sc_len)) => next_start - next_sc_len,
            None => data.len(),
        };

        if start < end {
            nal_units.push(&data[start..end]);
        }
    }

    nal_units
}

/// NAL unit type from the first header byte; `None` for an empty unit.
pub fn nal_type(nal: &[u8]) -> Option<u8> {
    nal.first().map(|b| b & 0x1f)
}

/// Whether the NAL carries coded picture data (VCL, types 1–5).
pub fn is_vcl(nal: &[u8]) -> bool {
    matches!(nal_type(nal), Some(NAL_SLICE..=NAL_IDR))
}

/// `first_mb_in_slice == 0`: the slice opens a new picture.
///
/// `first_mb_in_slice` is the first exp-Golomb field after the header, so
/// a zero value is a single `1` bit at the top of the second byte.
pub fn starts_picture(nal: &[u8]) -> bool {
    is_vcl(nal) && nal.get(1).is_some_and(|b| b & 0x80 != 0)
}

/// Join NAL units (without start codes) into one Annex B blob.
pub fn build_annexb(units: &[&[u8]]) -> Vec<u8> {
    let total: usize = units.iter().map(|u| u.len() + START_CODE.len()).sum();
    let mut out = Vec::with_capacity(total);
    for unit in units.iter().filter(|u| !u.is_empty()) {
        out.extend_from_slice(&START_CODE);
        out.extend_from_slice(unit);
    }
    out
}

/// Strip a leading 4- or 3-byte start code, if any.
pub fn strip_start_code(unit: &[u8]) -> &[u8] {
    unit.strip_prefix(&START_CODE[..])
        .or_else(|| unit.strip_prefix(&START_CODE[1..]))
        .unwrap_or(unit)
}

/// Derive profile-level-id from an SPS NAL (RFC 6184 §8.1): bytes 1–3 are
/// profile_idc, constraint flags and level_idc.
pub fn profile_level_id(sps: &[u8]) -> Option<String> {
    if sps.len() < 4 {
        return None;
    }
    Some(format!("{:02x}{:02x}{:02x}", sps[1], sps[2], sps[3]))
}

/// Render init units as an RTSP `fmtp` parameter list (RFC 6184 §8.1).
///
/// Units may carry start codes (as returned by [`split_init_data`]); they
/// are stripped before encoding. Returns `None` when no SPS is present.
pub fn fmtp_parameters<T: AsRef<[u8]>>(units: &[T]) -> Option<String> {
    let nals: Vec<&[u8]> = units
        .iter()
        .map(|u| strip_start_code(u.as_ref()))
        .filter(|u| !u.is_empty())
        .collect();

    let sps = nals.iter().find(|n| nal_type(n) == Some(NAL_SPS))?;
    let mut fmtp = String::from("packetization-mode=1");
    if let Some(pl) = profile_level_id(sps) {
        fmtp.push_str(&format!(";profile-level-id={}", pl));
    }

    let sprop: Vec<String> = nals
        .iter()
        .filter(|n| matches!(nal_type(n), Some(NAL_SPS | NAL_PPS)))
        .map(|n| BASE64_STANDARD.encode(n))
        .collect();
    fmtp.push_str(&format!(";sprop-parameter-sets={}", sprop.join(",")));

    Some(fmtp)
}
