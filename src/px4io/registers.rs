//! # Typed Register Pages
//!
//! Decodes raw register arrays into named fields and flag sets. Values are
//! kept in register representation; no unit conversion happens here.

use num_enum::FromPrimitive;
use serde::Serialize;

use super::pages::Page;
use crate::error::{RcioError, Result};

/// Fail unless `data` holds at least `expected` registers
fn require(page: Page, data: &[u16], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(RcioError::PageTooShort {
            page: page.into(),
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Defines a 16-bit register bitmask with named single-bit flags
macro_rules! register_flags {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$flag_meta:meta])* $flag:ident = $bit:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u16);

        impl $name {
            $( $(#[$flag_meta])* pub const $flag: $name = $name(1 << $bit); )*

            /// Raw register value
            pub const fn bits(self) -> u16 {
                self.0
            }

            /// Whether every bit of `other` is set
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
    };
}

register_flags! {
    /// Status page monitoring flags
    MonitoringFlags {
        /// Armed okay and locally armed
        ARMED = 0;
        MANUAL_OVERRIDE = 1;
        /// RC input is valid
        RC_OK = 2;
        RC_PPM = 3;
        RC_DSM = 4;
        RC_SBUS = 5;
        /// Controls from the flight controller are valid
        FMU_OK = 6;
        /// Raw PWM from the flight controller is bypassing the mixer
        RAW_PWM = 7;
        MIXER_OK = 8;
        /// IO and flight controller agree on arming state
        ARM_SYNC = 9;
        INIT_OK = 10;
        FAILSAFE = 11;
        SAFETY_OFF = 12;
        FMU_INITIALIZED = 13;
        RC_ST24 = 14;
        RC_SUMD = 15;
    }
}

register_flags! {
    /// Status page alarm flags. Alarms latch; write 1 to clear.
    AlarmFlags {
        VBATT_LOW = 0;
        TEMPERATURE = 1;
        SERVO_CURRENT = 2;
        ACC_CURRENT = 3;
        FMU_LOST = 4;
        RC_LOST = 5;
        PWM_ERROR = 6;
        VSERVO_FAULT = 7;
    }
}

register_flags! {
    /// Status page mixer limit flags
    MixerFlags {
        LOWER_LIMIT = 0;
        UPPER_LIMIT = 1;
        YAW_LIMIT = 2;
    }
}

register_flags! {
    /// Setup page feature flags
    FeatureFlags {
        SBUS1_OUT = 0;
        SBUS2_OUT = 1;
        PWM_RSSI = 2;
        ADC_RSSI = 3;
    }
}

register_flags! {
    /// Setup page arming flags
    ArmingFlags {
        IO_ARM_OK = 0;
        FMU_ARMED = 1;
        MANUAL_OVERRIDE_OK = 2;
        FAILSAFE_CUSTOM = 3;
        INAIR_RESTART_OK = 4;
        /// Output PWM right after startup so ESCs initialize quietly
        ALWAYS_PWM_ENABLE = 5;
        RC_HANDLING_DISABLED = 6;
        /// Operate normally without actuating servos
        LOCKDOWN = 7;
        FORCE_FAILSAFE = 8;
        TERMINATION_FAILSAFE = 9;
        OVERRIDE_IMMEDIATE = 10;
    }
}

register_flags! {
    /// Setup page relay outputs
    RelayFlags {
        POWER1 = 0;
        POWER2 = 1;
        ACC1 = 2;
        ACC2 = 3;
    }
}

register_flags! {
    /// RC config page channel options
    RcConfigOptions {
        ENABLED = 0;
        REVERSE = 1;
    }
}

register_flags! {
    /// Raw RC input status flags
    RcInputStatus {
        FRAME_DROP = 0;
        FAILSAFE = 1;
        DSM11 = 2;
        MAPPING_OK = 3;
        RC_OK = 4;
    }
}

register_flags! {
    /// Control groups received from the flight controller
    GroupsValid {
        GROUP0 = 0;
        GROUP1 = 1;
        GROUP2 = 2;
        GROUP3 = 3;
    }
}

/// DSM receiver bind sequence step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive)]
#[repr(u16)]
pub enum DsmBindState {
    PowerDown = 0,
    PowerUp = 1,
    SetRxOut = 2,
    SendPulses = 3,
    ReinitUart = 4,
    #[num_enum(catch_all)]
    Unknown(u16),
}

/// [`Page::Config`] registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigRegisters {
    pub protocol_version: u16,
    /// Hardware revision magic
    pub hardware_version: u16,
    pub bootloader_version: u16,
    /// Maximum transfer size in bytes
    pub transfer_limit: u16,
    pub control_count: u16,
    pub actuator_count: u16,
    pub rc_input_count: u16,
    pub adc_input_count: u16,
    pub relay_count: u16,
}

impl ConfigRegisters {
    pub const REGISTER_COUNT: u16 = 9;

    pub const PROTOCOL_VERSION: u8 = 0;
    pub const HARDWARE_VERSION: u8 = 1;
    pub const BOOTLOADER_VERSION: u8 = 2;
    pub const TRANSFER_LIMIT: u8 = 3;
    pub const CONTROL_COUNT: u8 = 4;
    pub const ACTUATOR_COUNT: u8 = 5;
    pub const RC_INPUT_COUNT: u8 = 6;
    pub const ADC_INPUT_COUNT: u8 = 7;
    pub const RELAY_COUNT: u8 = 8;

    pub fn from_registers(data: &[u16]) -> Result<Self> {
        require(Page::Config, data, Self::REGISTER_COUNT as usize)?;

        Ok(Self {
            protocol_version: data[Self::PROTOCOL_VERSION as usize],
            hardware_version: data[Self::HARDWARE_VERSION as usize],
            bootloader_version: data[Self::BOOTLOADER_VERSION as usize],
            transfer_limit: data[Self::TRANSFER_LIMIT as usize],
            control_count: data[Self::CONTROL_COUNT as usize],
            actuator_count: data[Self::ACTUATOR_COUNT as usize],
            rc_input_count: data[Self::RC_INPUT_COUNT as usize],
            adc_input_count: data[Self::ADC_INPUT_COUNT as usize],
            relay_count: data[Self::RELAY_COUNT as usize],
        })
    }
}

/// [`Page::Status`] registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusRegisters {
    pub free_memory: u16,
    pub cpu_load: u16,
    pub monitoring: MonitoringFlags,
    pub alarms: AlarmFlags,
    /// Battery voltage in mV (hardware version 1)
    pub battery_voltage: u16,
    /// Battery current, raw ADC (hardware version 1)
    pub battery_current: u16,
    /// Servo rail voltage in mV (hardware version 2)
    pub servo_voltage: u16,
    pub rssi_voltage: u16,
    pub rssi_pwm: u16,
    pub mixer: MixerFlags,
}

impl StatusRegisters {
    pub const REGISTER_COUNT: u16 = 10;

    /// Alarm register offset, writable to clear latched alarms
    pub const ALARMS: u8 = 3;

    pub fn from_registers(data: &[u16]) -> Result<Self> {
        require(Page::Status, data, Self::REGISTER_COUNT as usize)?;

        Ok(Self {
            free_memory: data[0],
            cpu_load: data[1],
            monitoring: MonitoringFlags(data[2]),
            alarms: AlarmFlags(data[Self::ALARMS as usize]),
            battery_voltage: data[4],
            battery_current: data[5],
            servo_voltage: data[6],
            rssi_voltage: data[7],
            rssi_pwm: data[8],
            mixer: MixerFlags(data[9]),
        })
    }
}

/// [`Page::Setup`] registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetupRegisters {
    pub features: FeatureFlags,
    pub arming: ArmingFlags,
    /// Bitmask, 0 = default rate, 1 = alternate rate
    pub pwm_rates: u16,
    /// Default PWM frame rate in Hz
    pub pwm_default_rate: u16,
    /// Alternate PWM frame rate in Hz
    pub pwm_alternate_rate: u16,
    pub relays: RelayFlags,
    /// Battery (v1) or servo (v2) voltage correction factor
    pub voltage_scale: u16,
    pub dsm_bind_state: DsmBindState,
    pub debug: u16,
    pub reboot_bootloader: u16,
    /// IO firmware CRC, high word at offset 11
    pub firmware_crc: u32,
    pub rc_throttle_failsafe_us: u16,
    pub force_safety_on: u16,
}

impl SetupRegisters {
    pub const REGISTER_COUNT: u16 = 15;

    pub const FEATURES: u8 = 0;
    pub const ARMING: u8 = 1;
    pub const PWM_RATES: u8 = 2;
    pub const PWM_DEFAULT_RATE: u8 = 3;
    pub const PWM_ALTERNATE_RATE: u8 = 4;
    pub const RELAYS: u8 = 5;
    pub const VOLTAGE_SCALE: u8 = 6;
    pub const DSM_BIND: u8 = 7;
    // Offset 8 is unused
    pub const DEBUG: u8 = 9;
    pub const REBOOT_BOOTLOADER: u8 = 10;
    pub const CRC: u8 = 11;
    /// Write-only; reads return the low CRC word
    pub const FORCE_SAFETY_OFF: u8 = 12;
    pub const RC_THROTTLE_FAILSAFE_US: u8 = 13;
    pub const FORCE_SAFETY_ON: u8 = 14;

    /// Value that must be written to `REBOOT_BOOTLOADER` to take effect
    pub const REBOOT_BOOTLOADER_MAGIC: u16 = 14662;

    /// Value that must be written to `FORCE_SAFETY_OFF`/`FORCE_SAFETY_ON`
    pub const FORCE_SAFETY_MAGIC: u16 = 22027;

    pub fn from_registers(data: &[u16]) -> Result<Self> {
        require(Page::Setup, data, Self::REGISTER_COUNT as usize)?;

        let crc_high = data[Self::CRC as usize] as u32;
        let crc_low = data[Self::CRC as usize + 1] as u32;

        Ok(Self {
            features: FeatureFlags(data[Self::FEATURES as usize]),
            arming: ArmingFlags(data[Self::ARMING as usize]),
            pwm_rates: data[Self::PWM_RATES as usize],
            pwm_default_rate: data[Self::PWM_DEFAULT_RATE as usize],
            pwm_alternate_rate: data[Self::PWM_ALTERNATE_RATE as usize],
            relays: RelayFlags(data[Self::RELAYS as usize]),
            voltage_scale: data[Self::VOLTAGE_SCALE as usize],
            dsm_bind_state: DsmBindState::from(data[Self::DSM_BIND as usize]),
            debug: data[Self::DEBUG as usize],
            reboot_bootloader: data[Self::REBOOT_BOOTLOADER as usize],
            firmware_crc: (crc_high << 16) | crc_low,
            rc_throttle_failsafe_us: data[Self::RC_THROTTLE_FAILSAFE_US as usize],
            force_safety_on: data[Self::FORCE_SAFETY_ON as usize],
        })
    }
}

/// [`Page::RcConfig`] registers for the first channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RcConfigRegisters {
    pub minimum: u16,
    pub center: u16,
    pub maximum: u16,
    /// Band around center that is ignored
    pub dead_zone: u16,
    /// Mapped function; [`Self::ASSIGNMENT_MODE_SWITCH`] selects mode switch
    pub assignment: u16,
    pub options: RcConfigOptions,
    /// Spacing between channel configuration blocks
    pub stride: u16,
}

impl RcConfigRegisters {
    pub const REGISTER_COUNT: u16 = 7;

    pub const ASSIGNMENT_MODE_SWITCH: u16 = 100;

    pub fn from_registers(data: &[u16]) -> Result<Self> {
        require(Page::RcConfig, data, Self::REGISTER_COUNT as usize)?;

        Ok(Self {
            minimum: data[0],
            center: data[1],
            maximum: data[2],
            dead_zone: data[3],
            assignment: data[4],
            options: RcConfigOptions(data[5]),
            stride: data[6],
        })
    }
}

/// [`Page::RcInputRaw`] registers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RcInputRawRegisters {
    /// Number of valid channels
    pub channel_count: u16,
    pub status: RcInputStatus,
    /// Normalized RSSI, 0 = no reception, 255 = perfect
    pub rssi: u16,
    /// RC source detail (PPM frame length, Spektrum protocol type)
    pub data: u16,
    /// Received frames, wrapping
    pub frame_count: u16,
    /// Dropped frames, wrapping
    pub lost_frame_count: u16,
    /// Channel pulse widths in microseconds
    pub channels: Vec<u16>,
}

impl RcInputRawRegisters {
    /// Registers before the first channel
    pub const HEADER_COUNT: u16 = 6;

    pub fn from_registers(data: &[u16]) -> Result<Self> {
        let header = Self::HEADER_COUNT as usize;
        require(Page::RcInputRaw, data, header)?;

        let channel_count = data[0];
        require(Page::RcInputRaw, data, header + channel_count as usize)?;

        Ok(Self {
            channel_count,
            status: RcInputStatus(data[1]),
            rssi: data[2],
            data: data[3],
            frame_count: data[4],
            lost_frame_count: data[5],
            channels: data[header..header + channel_count as usize].to_vec(),
        })
    }
}

/// [`Page::RcInput`] registers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RcInputRegisters {
    /// Bitmask of valid channels
    pub valid: u16,
    /// Scaled channel values (-10000 to 10000 in register form)
    pub controls: Vec<u16>,
}

impl RcInputRegisters {
    pub const HEADER_COUNT: u16 = 1;

    pub fn from_registers(data: &[u16]) -> Result<Self> {
        require(Page::RcInput, data, Self::HEADER_COUNT as usize)?;

        Ok(Self {
            valid: data[0],
            controls: data[Self::HEADER_COUNT as usize..].to_vec(),
        })
    }
}

/// Controls per control group
pub const CONTROL_GROUP_WIDTH: usize = 8;

/// Number of control groups
pub const CONTROL_GROUP_COUNT: usize = 4;

/// [`Page::Controls`] registers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlRegisters {
    /// Four control groups of eight signed values
    pub groups: [[i16; CONTROL_GROUP_WIDTH]; CONTROL_GROUP_COUNT],
    pub groups_valid: GroupsValid,
}

impl ControlRegisters {
    pub const GROUPS_VALID: u8 = 64;
    pub const REGISTER_COUNT: u16 = Self::GROUPS_VALID as u16 + 1;

    pub fn from_registers(data: &[u16]) -> Result<Self> {
        require(Page::Controls, data, Self::REGISTER_COUNT as usize)?;

        let mut groups = [[0i16; CONTROL_GROUP_WIDTH]; CONTROL_GROUP_COUNT];
        for (group, chunk) in groups
            .iter_mut()
            .zip(data.chunks_exact(CONTROL_GROUP_WIDTH))
        {
            for (control, &raw) in group.iter_mut().zip(chunk) {
                *control = raw as i16;
            }
        }

        Ok(Self {
            groups,
            groups_valid: GroupsValid(data[Self::GROUPS_VALID as usize]),
        })
    }
}

/// [`Page::Sensors`] registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorRegisters {
    /// Altitude from an external sensor (HoTT or SBUS2)
    pub altitude: u16,
}

impl SensorRegisters {
    pub const REGISTER_COUNT: u16 = 1;

    pub fn from_registers(data: &[u16]) -> Result<Self> {
        require(Page::Sensors, data, Self::REGISTER_COUNT as usize)?;
        Ok(Self { altitude: data[0] })
    }
}

/// [`Page::Test`] registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TestRegisters {
    /// Amber LED state
    pub led: u16,
}

impl TestRegisters {
    pub const REGISTER_COUNT: u16 = 1;

    pub const LED: u8 = 0;

    pub fn from_registers(data: &[u16]) -> Result<Self> {
        require(Page::Test, data, Self::REGISTER_COUNT as usize)?;
        Ok(Self { led: data[Self::LED as usize] })
    }
}
