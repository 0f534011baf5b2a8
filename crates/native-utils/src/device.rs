use anyhow::Context;
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

// Picks the named input device, or the host default when no name is given.
pub fn get_or_default_input(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    match device_name {
        None => host
            .default_input_device()
            .context("No default input device"),
        Some(target) => host
            .input_devices()?
            .find(|d| d.name().is_ok_and(|name| name == target))
            .with_context(|| format!("No input device named {target:?}")),
    }
}

// Same as above for output.
pub fn get_or_default_output(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    match device_name {
        None => host
            .default_output_device()
            .context("No default output device"),
        Some(target) => host
            .output_devices()?
            .find(|d| d.name().is_ok_and(|name| name == target))
            .with_context(|| format!("No output device named {target:?}")),
    }
}

/// Lists input devices as ` * name(2ch, 48000hz) [default]` lines.
pub fn get_available_inputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let mut device_names = Vec::new();
    for device in host.input_devices()? {
        let Ok(name) = device.name() else { continue };
        let line = match device.default_input_config() {
            Ok(cfg) => describe(&name, cfg.channels(), cfg.sample_rate().0, &default_name),
            Err(e) => {
                tracing::debug!("skipping input {}: {}", name, e);
                continue;
            }
        };
        device_names.push(line);
    }
    Ok(device_names.join("\n"))
}

/// Lists output devices in the same format as [`get_available_inputs`].
pub fn get_available_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    let mut device_names = Vec::new();
    for device in host.output_devices()? {
        let Ok(name) = device.name() else { continue };
        let line = match device.default_output_config() {
            Ok(cfg) => describe(&name, cfg.channels(), cfg.sample_rate().0, &default_name),
            Err(e) => {
                tracing::debug!("skipping output {}: {}", name, e);
                continue;
            }
        };
        device_names.push(line);
    }
    Ok(device_names.join("\n"))
}

fn describe(name: &str, channels: u16, sample_rate: u32, default_name: &Option<String>) -> String {
    let mut d = format!(" * {}({}ch, {}hz)", name, channels, sample_rate);
    if default_name.as_deref() == Some(name) {
        d.push_str(" [default]");
    }
    d
}
