use bytes::{BufMut, Bytes, BytesMut};
use hrbridge_core::{
    Address, DeviceInfo, Error, IdentityKey, Result,
    constants::{ADDR_SIZE, MAX_DEVICE_NAME_LEN, MAX_FRAME_SIZE},
};
use std::fmt;

/// One-byte tag at the start of every radio frame.
///
/// # Wire Format
/// All integers are single bytes and addresses are 6 bytes, most significant
/// first:
///
/// ```text
/// hr_data              0x63 | key | hr
/// named_hr_data        0x64 | key | addr[6] | hr
/// query_device_by_mac  0x35 | addr[6]
/// set_name_map_key     0x36 | key
/// repeater_status      0x37 | addr[6] | key | present [| dev_addr[6] | name_len | name]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Magic {
    HrData = 0x63,
    NamedHrData = 0x64,
    QueryDeviceByMac = 0x35,
    SetNameMapKey = 0x36,
    RepeaterStatus = 0x37,
}

impl Magic {
    /// Protocol name of the variant, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Magic::HrData => "hr_data",
            Magic::NamedHrData => "named_hr_data",
            Magic::QueryDeviceByMac => "query_device_by_mac",
            Magic::SetNameMapKey => "set_name_map_key",
            Magic::RepeaterStatus => "repeater_status",
        }
    }

    /// Minimum number of bytes (magic included) a frame of this type needs.
    pub fn min_len(&self) -> usize {
        match self {
            Magic::HrData => 3,
            Magic::NamedHrData => 2 + ADDR_SIZE + 1,
            Magic::QueryDeviceByMac => 1 + ADDR_SIZE,
            Magic::SetNameMapKey => 2,
            Magic::RepeaterStatus => 1 + ADDR_SIZE + 2,
        }
    }
}

impl TryFrom<u8> for Magic {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x63 => Ok(Magic::HrData),
            0x64 => Ok(Magic::NamedHrData),
            0x35 => Ok(Magic::QueryDeviceByMac),
            0x36 => Ok(Magic::SetNameMapKey),
            0x37 => Ok(Magic::RepeaterStatus),
            other => Err(Error::UnknownMagic(other)),
        }
    }
}

impl fmt::Display for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Identity of a repeater, sent in reply to queries and key assignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeaterStatus {
    /// The repeater's own address.
    pub address: Address,

    /// The repeater's identity key.
    pub key: IdentityKey,

    /// Upstream device the repeater is currently bound to, if any.
    pub device: Option<DeviceInfo>,
}

/// A decoded radio frame.
///
/// Frames are transient: built for one send or produced by one receive.
///
/// # Basic Usage
/// ```
/// use hrbridge_core::IdentityKey;
/// use hrbridge_protocol::RadioFrame;
///
/// let frame = RadioFrame::HrData { key: IdentityKey::new(7), heart_rate: 72 };
/// let bytes = frame.encode();
/// assert_eq!(&bytes[..], &[0x63, 7, 72]);
/// assert_eq!(RadioFrame::decode(&bytes).unwrap(), frame);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioFrame {
    /// Routine heart-rate sample.
    HrData { key: IdentityKey, heart_rate: u8 },

    /// Periodic heart-rate sample carrying the upstream address so peers can
    /// learn the address-to-key binding.
    NamedHrData {
        key: IdentityKey,
        address: Address,
        heart_rate: u8,
    },

    /// Ask repeaters matching `address` (or all, for broadcast) to report.
    QueryDeviceByMac { address: Address },

    /// Assign a new identity key to the receiving repeater.
    SetNameMapKey { key: IdentityKey },

    /// Reply describing a repeater.
    RepeaterStatus(RepeaterStatus),
}

impl RadioFrame {
    /// Magic byte of this frame.
    pub fn magic(&self) -> Magic {
        match self {
            RadioFrame::HrData { .. } => Magic::HrData,
            RadioFrame::NamedHrData { .. } => Magic::NamedHrData,
            RadioFrame::QueryDeviceByMac { .. } => Magic::QueryDeviceByMac,
            RadioFrame::SetNameMapKey { .. } => Magic::SetNameMapKey,
            RadioFrame::RepeaterStatus(_) => Magic::RepeaterStatus,
        }
    }

    /// Exact number of bytes [`encode`](Self::encode) produces.
    pub fn size_needed(&self) -> usize {
        match self {
            RadioFrame::RepeaterStatus(status) => {
                let base = Magic::RepeaterStatus.min_len();
                match &status.device {
                    Some(device) => base + ADDR_SIZE + 1 + device.transport_name().len(),
                    None => base,
                }
            }
            other => other.magic().min_len(),
        }
    }

    /// Encode the frame into a fresh buffer.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size_needed());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Append the encoded frame to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.magic() as u8);
        match self {
            RadioFrame::HrData { key, heart_rate } => {
                buf.put_u8(key.as_u8());
                buf.put_u8(*heart_rate);
            }
            RadioFrame::NamedHrData {
                key,
                address,
                heart_rate,
            } => {
                buf.put_u8(key.as_u8());
                buf.put_slice(address.as_bytes());
                buf.put_u8(*heart_rate);
            }
            RadioFrame::QueryDeviceByMac { address } => {
                buf.put_slice(address.as_bytes());
            }
            RadioFrame::SetNameMapKey { key } => {
                buf.put_u8(key.as_u8());
            }
            RadioFrame::RepeaterStatus(status) => {
                buf.put_slice(status.address.as_bytes());
                buf.put_u8(status.key.as_u8());
                match &status.device {
                    Some(device) => {
                        let name = device.transport_name().as_bytes();
                        buf.put_u8(1);
                        buf.put_slice(device.address.as_bytes());
                        buf.put_u8(name.len() as u8);
                        buf.put_slice(name);
                    }
                    None => buf.put_u8(0),
                }
            }
        }
    }

    /// Decode a frame from a received buffer.
    ///
    /// Bytes past the variant's layout are ignored.
    ///
    /// # Errors
    /// - `Error::InvalidFrame` for an empty or oversized buffer or a malformed
    ///   bound-device descriptor
    /// - `Error::UnknownMagic` for an unrecognised tag
    /// - `Error::FrameTooShort` when the buffer is shorter than the layout
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() > MAX_FRAME_SIZE {
            return Err(Error::FrameTooLarge {
                size: data.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        let Some(&tag) = data.first() else {
            return Err(Error::InvalidFrame("empty frame".to_string()));
        };
        let magic = Magic::try_from(tag)?;
        if data.len() < magic.min_len() {
            return Err(Error::too_short(magic.name(), magic.min_len(), data.len()));
        }

        let frame = match magic {
            Magic::HrData => RadioFrame::HrData {
                key: IdentityKey::new(data[1]),
                heart_rate: data[2],
            },
            Magic::NamedHrData => RadioFrame::NamedHrData {
                key: IdentityKey::new(data[1]),
                address: Address::from_slice(&data[2..2 + ADDR_SIZE])?,
                heart_rate: data[2 + ADDR_SIZE],
            },
            Magic::QueryDeviceByMac => RadioFrame::QueryDeviceByMac {
                address: Address::from_slice(&data[1..1 + ADDR_SIZE])?,
            },
            Magic::SetNameMapKey => RadioFrame::SetNameMapKey {
                key: IdentityKey::new(data[1]),
            },
            Magic::RepeaterStatus => RadioFrame::RepeaterStatus(decode_status(data)?),
        };
        Ok(frame)
    }
}

fn decode_status(data: &[u8]) -> Result<RepeaterStatus> {
    let address = Address::from_slice(&data[1..1 + ADDR_SIZE])?;
    let key = IdentityKey::new(data[1 + ADDR_SIZE]);
    let present = data[2 + ADDR_SIZE];

    let device = match present {
        0 => None,
        1 => {
            // dev_addr starts right after the presence byte
            let dev_start = Magic::RepeaterStatus.min_len();
            let name_start = dev_start + ADDR_SIZE + 1;
            if data.len() < name_start {
                return Err(Error::too_short("repeater_status", name_start, data.len()));
            }
            let dev_addr = Address::from_slice(&data[dev_start..dev_start + ADDR_SIZE])?;
            let name_len = data[name_start - 1] as usize;
            if name_len > MAX_DEVICE_NAME_LEN {
                return Err(Error::InvalidFrame(format!(
                    "device name length {name_len} exceeds {MAX_DEVICE_NAME_LEN}"
                )));
            }
            let name_end = name_start + name_len;
            let name_bytes = data
                .get(name_start..name_end)
                .ok_or_else(|| Error::too_short("repeater_status", name_end, data.len()))?;
            let name = String::from_utf8(name_bytes.to_vec())
                .map_err(|_| Error::InvalidFrame("device name is not UTF-8".to_string()))?;
            Some(DeviceInfo::new(name, dev_addr))
        }
        other => {
            return Err(Error::InvalidFrame(format!(
                "invalid device presence flag {other}"
            )));
        }
    };

    Ok(RepeaterStatus {
        address,
        key,
        device,
    })
}

impl fmt::Display for RadioFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioFrame::HrData { key, heart_rate } => {
                write!(f, "hr_data(key={key}, hr={heart_rate})")
            }
            RadioFrame::NamedHrData {
                key,
                address,
                heart_rate,
            } => write!(
                f,
                "named_hr_data(key={key}, addr={address}, hr={heart_rate})"
            ),
            RadioFrame::QueryDeviceByMac { address } => {
                write!(f, "query_device_by_mac({address})")
            }
            RadioFrame::SetNameMapKey { key } => write!(f, "set_name_map_key({key})"),
            RadioFrame::RepeaterStatus(status) => match &status.device {
                Some(device) => write!(
                    f,
                    "repeater_status(addr={}, key={}, device={device})",
                    status.address, status.key
                ),
                None => write!(
                    f,
                    "repeater_status(addr={}, key={})",
                    status.address, status.key
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const OWN: Address = Address::new([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);
    const MONITOR: Address = Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    #[test]
    fn test_hr_data_layout() {
        let frame = RadioFrame::HrData {
            key: IdentityKey::new(3),
            heart_rate: 88,
        };
        assert_eq!(&frame.encode()[..], &[0x63, 3, 88]);
        assert_eq!(frame.size_needed(), 3);
    }

    #[test]
    fn test_named_hr_data_layout() {
        let frame = RadioFrame::NamedHrData {
            key: IdentityKey::new(3),
            address: MONITOR,
            heart_rate: 88,
        };
        assert_eq!(
            &frame.encode()[..],
            &[0x64, 3, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 88]
        );
    }

    #[test]
    fn test_repeater_status_without_device() {
        let frame = RadioFrame::RepeaterStatus(RepeaterStatus {
            address: OWN,
            key: IdentityKey::new(9),
            device: None,
        });
        let bytes = frame.encode();
        assert_eq!(&bytes[..], &[0x37, 0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 9, 0]);
        assert_eq!(RadioFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_repeater_status_with_device() {
        let frame = RadioFrame::RepeaterStatus(RepeaterStatus {
            address: OWN,
            key: IdentityKey::new(9),
            device: Some(DeviceInfo::new("H10", MONITOR)),
        });
        let bytes = frame.encode();
        assert_eq!(bytes.len(), frame.size_needed());
        assert_eq!(&bytes[8..], &[1, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 3, b'H', b'1', b'0']);
        assert_eq!(RadioFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_repeater_status_truncates_long_name() {
        let frame = RadioFrame::RepeaterStatus(RepeaterStatus {
            address: OWN,
            key: IdentityKey::new(1),
            device: Some(DeviceInfo::new("A very long monitor name", MONITOR)),
        });
        let decoded = RadioFrame::decode(&frame.encode()).unwrap();
        let RadioFrame::RepeaterStatus(status) = decoded else {
            panic!("expected repeater_status");
        };
        assert_eq!(status.device.unwrap().name, "A very long moni");
    }

    #[rstest]
    #[case(&[0x63, 1], "hr_data")]
    #[case(&[0x64, 1, 2, 3, 4, 5, 6, 7], "named_hr_data")]
    #[case(&[0x35, 0xFF, 0xFF], "query_device_by_mac")]
    #[case(&[0x36], "set_name_map_key")]
    #[case(&[0x37, 1, 2, 3, 4, 5, 6, 7], "repeater_status")]
    fn test_short_frames_rejected(#[case] data: &[u8], #[case] kind: &str) {
        match RadioFrame::decode(data) {
            Err(Error::FrameTooShort { kind: k, .. }) => assert_eq!(k, kind),
            other => panic!("expected FrameTooShort, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_magic_rejected() {
        assert!(matches!(
            RadioFrame::decode(&[0x00, 1, 2]),
            Err(Error::UnknownMagic(0x00))
        ));
    }

    #[test]
    fn test_empty_and_oversized_rejected() {
        assert!(matches!(RadioFrame::decode(&[]), Err(Error::InvalidFrame(_))));
        let big = vec![0x63; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            RadioFrame::decode(&big),
            Err(Error::FrameTooLarge { .. })
        ));
    }

    #[rstest]
    #[case(&[0x37, 1, 2, 3, 4, 5, 6, 7, 2])]
    #[case(&[0x37, 1, 2, 3, 4, 5, 6, 7, 1, 0xAA])]
    #[case(&[0x37, 1, 2, 3, 4, 5, 6, 7, 1, 1, 2, 3, 4, 5, 6, 4, b'a'])]
    #[case(&[0x37, 1, 2, 3, 4, 5, 6, 7, 1, 1, 2, 3, 4, 5, 6, 17])]
    #[case(&[0x37, 1, 2, 3, 4, 5, 6, 7, 1, 1, 2, 3, 4, 5, 6, 1, 0xFF])]
    fn test_malformed_device_descriptor_rejected(#[case] data: &[u8]) {
        assert!(RadioFrame::decode(data).is_err());
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let frame = RadioFrame::decode(&[0x36, 5, 0xDE, 0xAD]).unwrap();
        assert_eq!(
            frame,
            RadioFrame::SetNameMapKey {
                key: IdentityKey::new(5)
            }
        );
    }

    #[test]
    fn test_frame_display() {
        let frame = RadioFrame::QueryDeviceByMac {
            address: Address::BROADCAST,
        };
        assert_eq!(frame.to_string(), "query_device_by_mac(FF:FF:FF:FF:FF:FF)");
        assert_eq!(Magic::SetNameMapKey.to_string(), "set_name_map_key");
    }
}
