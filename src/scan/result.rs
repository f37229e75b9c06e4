//! Advertisement reports (radio side) and scan results (client side).

use super::adv_parser;

/// 48-bit device address, least significant byte first (HCI order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BdAddr(pub [u8; 6]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AddrType {
    Public = 0,
    Random = 1,
    PublicId = 2,
    RandomId = 3,
    Anonymous = 0xFF,
}

impl From<u8> for AddrType {
    fn from(raw: u8) -> Self {
        match raw {
            0 => AddrType::Public,
            1 => AddrType::Random,
            2 => AddrType::PublicId,
            3 => AddrType::RandomId,
            _ => AddrType::Anonymous,
        }
    }
}

/// Advertising PDU type of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AdvType {
    AdvInd = 0,
    DirectInd = 1,
    ScanInd = 2,
    NonconnInd = 3,
    /// Scan response; only seen while scanning actively.
    ScanRsp = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DeviceType {
    Unknown = 0,
    BrEdr = 1,
    Ble = 2,
    Dual = 3,
}

/// Flags bit: BR/EDR not supported.
const FLAG_BREDR_NOT_SUPPORTED: u8 = 0x04;
/// Flags bits: simultaneous LE + BR/EDR (controller / host).
const FLAG_SIMULTANEOUS_LE_BREDR: u8 = 0x18;

impl DeviceType {
    /// Classify from the advertiser's Flags byte.
    pub fn from_flags(flags: Option<u8>) -> Self {
        match flags {
            Some(f) if f & FLAG_BREDR_NOT_SUPPORTED != 0 => DeviceType::Ble,
            Some(f) if f & FLAG_SIMULTANEOUS_LE_BREDR != 0 => DeviceType::Dual,
            // Heard over LE, nothing claims BR/EDR.
            _ => DeviceType::Ble,
        }
    }
}

/// A raw advertisement observation from the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvReport<'a> {
    pub addr: BdAddr,
    pub addr_type: AddrType,
    pub adv_type: AdvType,
    pub rssi: i8,
    pub data: &'a [u8],
}

/// What a scanner's result callback sees. Valid only for the duration of
/// the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanResult<'a> {
    pub addr: BdAddr,
    pub addr_type: AddrType,
    pub dev_type: DeviceType,
    pub adv_type: AdvType,
    pub rssi: i8,
    pub adv_data: &'a [u8],
}

impl<'a> ScanResult<'a> {
    pub fn from_report(report: &AdvReport<'a>) -> Self {
        Self {
            addr: report.addr,
            addr_type: report.addr_type,
            dev_type: DeviceType::from_flags(adv_parser::flags(report.data)),
            adv_type: report.adv_type,
            rssi: report.rssi,
            adv_data: report.data,
        }
    }

    /// Advertised local name, if any.
    pub fn local_name(&self) -> Option<&'a str> {
        adv_parser::local_name(self.adv_data)
    }

    /// Whether this report came from active scanning (scan response).
    pub fn is_scan_response(&self) -> bool {
        self.adv_type == AdvType::ScanRsp
    }
}
