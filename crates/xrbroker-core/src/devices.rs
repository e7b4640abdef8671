//! The fixed device list the broker was started with (spec §3, §4.E.5).
//! Devices are discovered once at startup (hardware probing itself is out
//! of scope, spec §1) and never added or removed at runtime; `device_id`
//! on the wire is simply the index into this list.

use std::sync::atomic::{AtomicBool, Ordering};

use xrbroker_proto::ResultCode;

use crate::collaborators::Device;
use crate::shm::{pack_name, DeviceDescriptorRaw, ShmRegion, MAX_INPUTS_PER_DEVICE};

struct Entry {
    device: Box<dyn Device>,
    io_active: AtomicBool,
}

pub struct DeviceRegistry {
    entries: Vec<Entry>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<Box<dyn Device>>) -> Self {
        Self {
            entries: devices
                .into_iter()
                .map(|device| Entry {
                    device,
                    io_active: AtomicBool::new(true),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, device_id: u32) -> Result<&dyn Device, ResultCode> {
        self.entries
            .get(device_id as usize)
            .map(|e| e.device.as_ref())
            .ok_or(ResultCode::DeviceCreationFailed)
    }

    pub fn is_io_active(&self, device_id: u32) -> Result<bool, ResultCode> {
        self.entries
            .get(device_id as usize)
            .map(|e| e.io_active.load(Ordering::Relaxed))
            .ok_or(ResultCode::DeviceCreationFailed)
    }

    /// Flips the device's I/O flag, returning the new value.
    pub fn toggle_io_active(&self, device_id: u32) -> Result<bool, ResultCode> {
        let entry = self
            .entries
            .get(device_id as usize)
            .ok_or(ResultCode::DeviceCreationFailed)?;
        let new_value = !entry.io_active.load(Ordering::Relaxed);
        entry.io_active.store(new_value, Ordering::Relaxed);
        Ok(new_value)
    }

    /// Writes one `DeviceDescriptorRaw` per registered device, windowing
    /// each device's inputs at `device_id * MAX_INPUTS_PER_DEVICE` (spec
    /// §6.2). Called once at startup, before any client can map the
    /// region.
    pub fn populate_shm(&self, shm: &mut ShmRegion) {
        for (device_id, entry) in self.entries.iter().enumerate() {
            let input_count = entry.device.input_names().len().min(MAX_INPUTS_PER_DEVICE);
            shm.write_device_descriptor(
                device_id as u32,
                &DeviceDescriptorRaw {
                    name: pack_name(entry.device.name()),
                    first_input_index: device_id as u32 * MAX_INPUTS_PER_DEVICE as u32,
                    input_count: input_count as u32,
                },
            );
        }
        shm.set_device_count(self.entries.len() as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::mock::MockDevice;

    #[test]
    fn toggle_io_active_flips_value_for_the_right_device() {
        let registry = DeviceRegistry::new(vec![
            Box::new(MockDevice::new("hmd")),
            Box::new(MockDevice::new("controller")),
        ]);
        assert!(registry.is_io_active(0).unwrap());
        assert_eq!(registry.toggle_io_active(0), Ok(false));
        assert!(registry.is_io_active(1).unwrap());
    }

    #[test]
    fn lookup_out_of_range_device_fails() {
        let registry = DeviceRegistry::new(Vec::new());
        assert_eq!(registry.get(0).err(), Some(ResultCode::DeviceCreationFailed));
    }
}
