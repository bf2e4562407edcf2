use serde::Serialize;

use crate::error::DeviceError;

/// Device class values as reported by the runtime.
pub mod class {
    pub const HMD: i32 = 1;
    pub const CONTROLLER: i32 = 2;
    pub const GENERIC_TRACKER: i32 = 3;
}

/// Controller role hint values.
pub mod role {
    pub const LEFT_HAND: i32 = 1;
    pub const RIGHT_HAND: i32 = 2;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProperty {
    DeviceClass,
    ControllerRoleHint,
    ControllerType,
    ProvidesBatteryStatus,
    BatteryPercentage,
}

/// Tracked-device queries offered by the VR runtime.
pub trait DeviceProvider {
    /// Number of device slots to poll.
    fn device_count(&self) -> u32;
    fn is_connected(&self, index: u32) -> bool;
    fn get_bool(&self, index: u32, property: DeviceProperty) -> Result<bool, DeviceError>;
    fn get_i32(&self, index: u32, property: DeviceProperty) -> Result<i32, DeviceError>;
    fn get_f32(&self, index: u32, property: DeviceProperty) -> Result<f32, DeviceError>;
    fn get_string(&self, index: u32, property: DeviceProperty) -> Result<String, DeviceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedDevice {
    pub device_id: u32,
    pub label: String,
    /// Charge in `0.0..=1.0`; `None` until the first battery reading.
    pub battery: Option<f32>,
}

impl TrackedDevice {
    pub fn battery_percent(&self) -> Option<u8> {
        self.battery
            .map(|b| (b.clamp(0.0, 1.0) * 100.0) as u8)
    }
}

/// Human label for a generic tracker, from its controller-type string.
pub fn tracker_label(controller_type: &str) -> &'static str {
    const ROLES: [(&str, &str); 13] = [
        ("vive_tracker_left_foot", "Left Foot"),
        ("vive_tracker_right_foot", "Right Foot"),
        ("vive_tracker_left_shoulder", "Left Shoulder"),
        ("vive_tracker_right_shoulder", "Right Shoulder"),
        ("vive_tracker_left_elbow", "Left Elbow"),
        ("vive_tracker_right_elbow", "Right Elbow"),
        ("vive_tracker_left_knee", "Left Knee"),
        ("vive_tracker_right_knee", "Right Knee"),
        ("vive_tracker_waist", "Waist"),
        ("vive_tracker_chest", "Chest"),
        ("vive_tracker_camera", "Camera"),
        ("vive_tracker_keyboard", "Keyboard"),
        ("vive_tracker_handed", "Handed Tracker"),
    ];
    ROLES
        .iter()
        .find(|(needle, _)| controller_type.contains(needle))
        .map(|(_, label)| *label)
        .unwrap_or("Generic Tracker")
}

/// Battery-powered devices currently known to the session.
#[derive(Debug, Clone, Default)]
pub struct DeviceRoster {
    devices: Vec<TrackedDevice>,
}

impl DeviceRoster {
    pub fn devices(&self) -> &[TrackedDevice] {
        &self.devices
    }

    /// Polls every slot. A slot whose query fails is treated as removed;
    /// other slots are unaffected.
    pub fn poll(&mut self, provider: &dyn DeviceProvider) {
        for index in 0..provider.device_count() {
            if let Err(err) = self.poll_one(provider, index) {
                if self.remove(index) {
                    tracing::debug!(device = index, error = %err, "tracked device removed");
                }
            }
        }
    }

    fn poll_one(&mut self, provider: &dyn DeviceProvider, index: u32) -> Result<(), DeviceError> {
        if !provider.is_connected(index) {
            return Err(DeviceError::Disconnected(index));
        }

        let Some(label) = device_label(provider, index)? else {
            return Ok(());
        };

        let provides_battery = provider.get_bool(index, DeviceProperty::ProvidesBatteryStatus)?;
        let known = self.devices.iter().position(|d| d.device_id == index);

        match (known, provides_battery) {
            (None, true) => self.devices.push(TrackedDevice {
                device_id: index,
                label,
                battery: None,
            }),
            (Some(pos), true) => {
                let level = provider.get_f32(index, DeviceProperty::BatteryPercentage)?;
                self.devices[pos].battery = Some(level);
            }
            (Some(pos), false) => {
                self.devices.remove(pos);
            }
            (None, false) => {}
        }
        Ok(())
    }

    fn remove(&mut self, index: u32) -> bool {
        let before = self.devices.len();
        self.devices.retain(|d| d.device_id != index);
        before != self.devices.len()
    }
}

fn device_label(provider: &dyn DeviceProvider, index: u32) -> Result<Option<String>, DeviceError> {
    let label = match provider.get_i32(index, DeviceProperty::DeviceClass)? {
        class::HMD => "Headset".to_string(),
        class::CONTROLLER => {
            match provider.get_i32(index, DeviceProperty::ControllerRoleHint)? {
                role::LEFT_HAND => "Left Controller".to_string(),
                _ => "Right Controller".to_string(),
            }
        }
        class::GENERIC_TRACKER => {
            let ty = provider.get_string(index, DeviceProperty::ControllerType)?;
            tracker_label(&ty).to_string()
        }
        _ => return Ok(None),
    };
    Ok(Some(label))
}
