//! Advertising Data (AD structure) parsing.
//!
//! Payload layout is a sequence of `[len][type][len - 1 bytes]` records.
//! A zero length byte ends the significant part (the rest is padding).

/// Incomplete / complete list of 16-bit service UUIDs.
const AD_UUID16_INCOMPLETE: u8 = 0x02;
const AD_UUID16_COMPLETE: u8 = 0x03;
/// Incomplete / complete list of 32-bit service UUIDs.
const AD_UUID32_INCOMPLETE: u8 = 0x04;
const AD_UUID32_COMPLETE: u8 = 0x05;
/// Incomplete / complete list of 128-bit service UUIDs.
const AD_UUID128_INCOMPLETE: u8 = 0x06;
const AD_UUID128_COMPLETE: u8 = 0x07;
const AD_SHORTENED_NAME: u8 = 0x08;
const AD_COMPLETE_NAME: u8 = 0x09;
const AD_FLAGS: u8 = 0x01;
/// Service data keyed by a 16-bit UUID.
const AD_SERVICE_DATA16: u8 = 0x16;

/// Bluetooth Base UUID `0000xxxx-0000-1000-8000-00805F9B34FB`, little-endian,
/// with the 16-bit alias bytes (12, 13) zeroed.
const BASE_UUID_LE: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Malformed advertisement payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdError {
    /// A record's length runs past the end of the payload.
    Truncated { offset: usize },
    /// A UUID list whose length is not a multiple of the UUID width.
    BadUuidList { ad_type: u8 },
}

/// One AD record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdStructure<'a> {
    pub ad_type: u8,
    pub data: &'a [u8],
}

/// Iterator over the AD records of a payload. Yields one `Err` and then
/// stops on malformed input.
pub struct AdStructures<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> AdStructures<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = Result<AdStructure<'a>, AdError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }
        let len = self.data[self.offset] as usize;
        if len == 0 {
            self.offset = self.data.len();
            return None;
        }
        let start = self.offset;
        if start + len >= self.data.len() {
            self.failed = true;
            return Some(Err(AdError::Truncated { offset: start }));
        }
        self.offset = start + len + 1;
        Some(Ok(AdStructure {
            ad_type: self.data[start + 1],
            data: &self.data[start + 2..start + 1 + len],
        }))
    }
}

/// Calls `f` for every 16-bit service UUID the payload advertises.
///
/// 32-bit UUIDs that fit in 16 bits and 128-bit UUIDs on the Bluetooth
/// base are reported by their 16-bit alias; 16-bit service data counts as
/// advertising its UUID. Returns an error on malformed input (UUIDs seen
/// before the error have already been passed to `f`).
pub fn for_each_uuid16(data: &[u8], mut f: impl FnMut(u16)) -> Result<(), AdError> {
    for ad in AdStructures::new(data) {
        let ad = ad?;
        match ad.ad_type {
            AD_UUID16_INCOMPLETE | AD_UUID16_COMPLETE => {
                let chunks = exact_chunks(ad, 2)?;
                for c in chunks {
                    f(u16::from_le_bytes([c[0], c[1]]));
                }
            }
            AD_UUID32_INCOMPLETE | AD_UUID32_COMPLETE => {
                for c in exact_chunks(ad, 4)? {
                    let uuid = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                    if let Ok(short) = u16::try_from(uuid) {
                        f(short);
                    }
                }
            }
            AD_UUID128_INCOMPLETE | AD_UUID128_COMPLETE => {
                for c in exact_chunks(ad, 16)? {
                    if let Some(short) = uuid128_alias(c) {
                        f(short);
                    }
                }
            }
            AD_SERVICE_DATA16 => {
                if ad.data.len() < 2 {
                    return Err(AdError::BadUuidList { ad_type: ad.ad_type });
                }
                f(u16::from_le_bytes([ad.data[0], ad.data[1]]));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Whether the payload advertises any of `wanted`. Malformed payloads
/// never match.
pub fn advertises_any_uuid(data: &[u8], wanted: &[u16]) -> bool {
    let mut found = false;
    let parsed = for_each_uuid16(data, |uuid| {
        if wanted.contains(&uuid) {
            found = true;
        }
    });
    parsed.is_ok() && found
}

fn exact_chunks<'a>(ad: AdStructure<'a>, width: usize) -> Result<core::slice::ChunksExact<'a, u8>, AdError> {
    if ad.data.len() % width != 0 {
        return Err(AdError::BadUuidList { ad_type: ad.ad_type });
    }
    Ok(ad.data.chunks_exact(width))
}

fn uuid128_alias(uuid: &[u8]) -> Option<u16> {
    let on_base = uuid
        .iter()
        .zip(BASE_UUID_LE.iter())
        .enumerate()
        .all(|(i, (b, base))| i == 12 || i == 13 || b == base);
    on_base.then(|| u16::from_le_bytes([uuid[12], uuid[13]]))
}

/// The Flags byte, if present and well-formed.
pub fn flags(data: &[u8]) -> Option<u8> {
    AdStructures::new(data)
        .map_while(Result::ok)
        .find(|ad| ad.ad_type == AD_FLAGS)
        .and_then(|ad| ad.data.first().copied())
}

/// Complete or shortened local name, if present and valid UTF-8.
pub fn local_name(data: &[u8]) -> Option<&str> {
    AdStructures::new(data)
        .map_while(Result::ok)
        .find(|ad| ad.ad_type == AD_COMPLETE_NAME || ad.ad_type == AD_SHORTENED_NAME)
        .and_then(|ad| core::str::from_utf8(ad.data).ok())
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host)
// ═══════════════════════════════════════════════════════════════════════════
