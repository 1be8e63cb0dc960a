use num_enum::IntoPrimitive;
use serde::Serialize;

use crate::config::OutputFormat;

pub const STATUS_COMMAND: &[u8] = b"QPIGS";
pub const TERMINATOR: u8 = b'\r';
pub const FRAME_MARKER: u8 = b'(';
// checksum + terminator as the device sends them
pub const TRAILER_LEN: usize = 5;
pub const MIN_FRAME_LEN: usize = 1 + 1 + TRAILER_LEN;
pub const MIN_BITMASK_LEN: usize = 8;

const DEFAULT_RAW_STATUS: &str = "00000000";

pub fn checksum(data: &[u8]) -> u16 {
    crc16::State::<crc16::XMODEM>::calculate(data)
}

/// QPIGS + CRC16/XMODEM (big-endian) + CR.
pub fn encode_status_request() -> Vec<u8> {
    let mut request = Vec::with_capacity(STATUS_COMMAND.len() + 3);
    request.extend_from_slice(STATUS_COMMAND);
    request.extend_from_slice(&checksum(STATUS_COMMAND).to_be_bytes());
    request.push(TERMINATOR);
    request
}

// StatusRecord {{{
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatusRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_volt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_freq: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ac_volt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ac_freq: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ac_va: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ac_watt: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_percent: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus_volt: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batt_volt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batt_charge_amps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batt_capacity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv_amps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv_volts: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batt_volt_scc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batt_discharge_amps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_b: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_c: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv_watts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_d: Option<String>,
}

impl StatusRecord {
    pub const FIELD_COUNT: usize = 21;

    fn from_tokens<'a>(tokens: impl Iterator<Item = &'a str>) -> Option<Self> {
        let mut record = Self::default();

        for (i, token) in tokens.take(Self::FIELD_COUNT).enumerate() {
            match i {
                0 => record.grid_volt = Some(to_float(token)?),
                1 => record.grid_freq = Some(to_float(token)?),
                2 => record.ac_volt = Some(to_float(token)?),
                3 => record.ac_freq = Some(to_float(token)?),
                4 => record.ac_va = Some(to_int(token)?),
                5 => record.ac_watt = Some(to_int(token)?),
                6 => record.load_percent = Some(to_int(token)?),
                7 => record.bus_volt = Some(to_int(token)?),
                8 => record.batt_volt = Some(to_float(token)?),
                9 => record.batt_charge_amps = Some(to_int(token)?),
                10 => record.batt_capacity = Some(to_int(token)?),
                11 => record.temp = Some(to_int(token)?),
                12 => record.pv_amps = Some(to_int(token)?),
                13 => record.pv_volts = Some(to_float(token)?),
                14 => record.batt_volt_scc = Some(to_float(token)?),
                15 => record.batt_discharge_amps = Some(to_int(token)?),
                16 => record.raw_status = Some(token.to_string()),
                17 => record.mask_b = Some(token.to_string()),
                18 => record.mask_c = Some(token.to_string()),
                19 => record.pv_watts = Some(to_int(token)?),
                20 => record.mask_d = Some(token.to_string()),
                _ => {}
            }
        }

        Some(record)
    }
} // }}}

// blank and "NA" mean the device has no reading
fn is_null(token: &str) -> bool {
    token.is_empty() || token == "NA"
}

fn to_float(token: &str) -> Option<f64> {
    if is_null(token) {
        return Some(0.0);
    }
    let value: f64 = token.parse().ok()?;
    format!("{:.2}", value).parse().ok()
}

fn to_int(token: &str) -> Option<i64> {
    if is_null(token) {
        return Some(0);
    }
    token.parse().ok()
}

/// Decodes a QPIGS response (terminator already removed).
///
/// Returns `None` for anything that is not a complete, well-typed frame:
/// short input, non-UTF-8 bytes, a missing `(` marker or a numeric token
/// that does not parse.
pub fn decode_status(raw: &[u8]) -> Option<StatusRecord> {
    if raw.len() < MIN_FRAME_LEN || raw[0] != FRAME_MARKER {
        return None;
    }

    let payload = std::str::from_utf8(&raw[1..raw.len() - TRAILER_LEN]).ok()?;

    StatusRecord::from_tokens(payload.split(' '))
}

// ChargeSource {{{
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, IntoPrimitive)]
#[repr(u8)]
pub enum ChargeSource {
    #[serde(rename = "ac_charging")]
    Ac = 0b101,
    #[serde(rename = "solar_charging")]
    Solar = 0b110,
}

impl ChargeSource {
    pub const ALL: [ChargeSource; 2] = [ChargeSource::Ac, ChargeSource::Solar];

    pub fn matches(self, data: u32) -> bool {
        let mask = u8::from(self) as u32;
        (data & mask) == mask
    }
} // }}}

// DeviceStatusFlags {{{
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStatusFlags {
    pub charge_source: Vec<ChargeSource>,
    pub batt_volt_to_steady: bool,
    pub load_status: bool,
    pub ssc_firmware_updated: bool,
    pub configuration_changed: bool,
    pub sbu_priority_version: bool,
}

impl DeviceStatusFlags {
    fn is_bit_set(data: u32, bit: u32) -> bool {
        (data & bit) == bit
    }

    pub fn new(data: u32) -> Self {
        Self {
            charge_source: ChargeSource::ALL
                .into_iter()
                .filter(|source| source.matches(data))
                .collect(),
            batt_volt_to_steady: Self::is_bit_set(data, 1 << 3),
            load_status: Self::is_bit_set(data, 1 << 4),
            ssc_firmware_updated: Self::is_bit_set(data, 1 << 5),
            configuration_changed: Self::is_bit_set(data, 1 << 6),
            sbu_priority_version: Self::is_bit_set(data, 1 << 7),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
} // }}}

/// Decodes the `raw_status` bit-string token into flags.
///
/// Tokens shorter than eight characters, non-UTF-8 input or anything that is
/// not a binary number yield the empty flags value.
pub fn decode_bitmask(raw: &[u8]) -> DeviceStatusFlags {
    let text = match std::str::from_utf8(raw) {
        Ok(text) if text.len() >= MIN_BITMASK_LEN => text,
        _ => return DeviceStatusFlags::default(),
    };

    // the token may come through rendered as a byte literal, b'01000110'
    let digits: String = text.chars().filter(|c| *c != 'b' && *c != '\'').collect();

    if digits.is_empty() || !digits.chars().all(|c| c == '0' || c == '1') {
        return DeviceStatusFlags::default();
    }

    // every mask lives in the low byte, longer strings only add high bits
    let low = &digits[digits.len().saturating_sub(u32::BITS as usize)..];
    match u32::from_str_radix(low, 2) {
        Ok(data) => DeviceStatusFlags::new(data),
        Err(_) => DeviceStatusFlags::default(),
    }
}

// StatusReport {{{
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub record: StatusRecord,
    #[serde(flatten)]
    pub flags: DeviceStatusFlags,
}

impl StatusReport {
    pub fn new(record: StatusRecord) -> Self {
        let flags = decode_bitmask(
            record
                .raw_status
                .as_deref()
                .unwrap_or(DEFAULT_RAW_STATUS)
                .as_bytes(),
        );
        Self { record, flags }
    }
} // }}}

pub fn decode_report(raw: &[u8]) -> Option<StatusReport> {
    decode_status(raw).map(StatusReport::new)
}

impl OutputFormat {
    pub fn render<T: Serialize>(&self, value: &T) -> anyhow::Result<String> {
        Ok(match self {
            OutputFormat::Json => serde_json::to_string(value)?,
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
        })
    }
}
