use crate::audio::error::{AudioError, AudioResult};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use serde::{Deserialize, Serialize};

/// Direction of an audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Microphone
    Input,
    /// Speaker
    Output,
}

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Device identifier (unique name)
    pub id: String,
    /// Human-readable device name
    pub name: String,
    /// Input or output
    pub kind: DeviceKind,
    /// Whether this is the default device of its kind
    pub is_default: bool,
    /// Supported sample rates
    pub sample_rates: Vec<u32>,
}

/// List all available input devices
///
/// # Errors
/// Returns `AudioError::DeviceNotFound` if no input devices are found.
/// Returns `AudioError::CpalError` if there's an error accessing devices.
///
/// # Example
/// ```no_run
/// use recyclens_lib::audio::device::list_input_devices;
///
/// let devices = list_input_devices().unwrap();
/// for device in devices {
///     println!("Device: {} ({})", device.name, device.id);
/// }
/// ```
pub fn list_input_devices() -> AudioResult<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    describe_devices(host.input_devices()?.collect(), DeviceKind::Input, default_name)
}

/// List all available output devices
///
/// # Errors
/// Returns `AudioError::DeviceNotFound` if no output devices are found.
pub fn list_output_devices() -> AudioResult<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    describe_devices(host.output_devices()?.collect(), DeviceKind::Output, default_name)
}

fn describe_devices(
    devices: Vec<Device>,
    kind: DeviceKind,
    default_name: Option<String>,
) -> AudioResult<Vec<AudioDevice>> {
    if devices.is_empty() {
        return Err(AudioError::DeviceNotFound);
    }

    let mut audio_devices = Vec::new();

    for device in devices {
        let name = device.name().map_err(|_| AudioError::InvalidDeviceName)?;
        let is_default = default_name.as_ref() == Some(&name);
        let sample_rates = get_supported_sample_rates(&device, kind);

        audio_devices.push(AudioDevice {
            id: name.clone(),
            name,
            kind,
            is_default,
            sample_rates,
        });
    }

    Ok(audio_devices)
}

/// Find an input device by name, or the default input device
pub(crate) fn find_input_device(host: &Host, device_id: Option<&str>) -> AudioResult<Device> {
    match device_id {
        Some(id) => find_by_name(host.input_devices()?, id),
        None => host.default_input_device().ok_or(AudioError::DeviceNotFound),
    }
}

/// Find an output device by name, or the default output device
pub(crate) fn find_output_device(host: &Host, device_id: Option<&str>) -> AudioResult<Device> {
    match device_id {
        Some(id) => find_by_name(host.output_devices()?, id),
        None => host.default_output_device().ok_or(AudioError::DeviceNotFound),
    }
}

fn find_by_name(devices: impl Iterator<Item = Device>, device_id: &str) -> AudioResult<Device> {
    for device in devices {
        if let Ok(name) = device.name() {
            if name == device_id {
                return Ok(device);
            }
        }
    }

    Err(AudioError::DeviceNotFound)
}

/// Get supported sample rates for a device
fn get_supported_sample_rates(device: &Device, kind: DeviceKind) -> Vec<u32> {
    let common_rates = [8000, 16000, 22050, 24000, 32000, 44100, 48000, 96000];
    let mut rates = Vec::new();

    let ranges: Vec<(u32, u32)> = match kind {
        DeviceKind::Input => device
            .supported_input_configs()
            .map(|configs| {
                configs
                    .map(|c| (c.min_sample_rate().0, c.max_sample_rate().0))
                    .collect()
            })
            .unwrap_or_default(),
        DeviceKind::Output => device
            .supported_output_configs()
            .map(|configs| {
                configs
                    .map(|c| (c.min_sample_rate().0, c.max_sample_rate().0))
                    .collect()
            })
            .unwrap_or_default(),
    };

    for (min, max) in ranges {
        for &rate in &common_rates {
            if rate >= min && rate <= max && !rates.contains(&rate) {
                rates.push(rate);
            }
        }
    }

    // If we couldn't get any rates, try the default config
    if rates.is_empty() {
        let default = match kind {
            DeviceKind::Input => device.default_input_config(),
            DeviceKind::Output => device.default_output_config(),
        };
        if let Ok(config) = default {
            rates.push(config.sample_rate().0);
        }
    }

    rates.sort_unstable();
    rates
}
