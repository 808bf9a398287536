//! UPnP device-description parsing.
//!
//! Only a handful of tags matter, so they are pulled out with a regex rather
//! than a full XML parse. Malformed documents simply yield fewer fields.

use std::sync::LazyLock;

use regex::Regex;

static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?is)<(friendlyName|manufacturer|modelName|deviceType|UDN)\b[^>]*>\s*(.*?)\s*</").ok()
});

/// Fields of a UPnP root device description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpnpDevice {
    pub friendly_name: Option<String>,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    pub device_type: Option<String>,
    pub udn: Option<String>,
}

impl UpnpDevice {
    /// A media renderer, or anything whose name, type or model says TV.
    pub fn looks_like_tv(&self) -> bool {
        if self
            .device_type
            .as_deref()
            .is_some_and(|t| t.contains("MediaRenderer"))
        {
            return true;
        }
        [&self.friendly_name, &self.device_type, &self.model_name]
            .into_iter()
            .flatten()
            .any(|field| {
                let lower = field.to_ascii_lowercase();
                lower.contains("tv") || lower.contains("television")
            })
    }
}

/// Extract the first occurrence of each interesting tag.
///
/// Returns `None` when the document has none of them.
pub fn parse_description(xml: &str) -> Option<UpnpDevice> {
    let re = TAG.as_ref()?;
    let mut device = UpnpDevice::default();
    for caps in re.captures_iter(xml) {
        let (Some(tag), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let value = value.as_str();
        if value.is_empty() {
            continue;
        }
        let slot = match tag.as_str().to_ascii_lowercase().as_str() {
            "friendlyname" => &mut device.friendly_name,
            "manufacturer" => &mut device.manufacturer,
            "modelname" => &mut device.model_name,
            "devicetype" => &mut device.device_type,
            _ => &mut device.udn,
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }
    (device != UpnpDevice::default()).then_some(device)
}
