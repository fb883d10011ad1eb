//! # Register Page Catalog
//!
//! Static metadata for the IO board's register pages: page numbers, access
//! direction and how many registers each page holds. Several page lengths
//! are not fixed; they come from counts published on the configuration page.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::registers::{
    ConfigRegisters, ControlRegisters, RcConfigRegisters, RcInputRawRegisters,
    RcInputRegisters, SensorRegisters, SetupRegisters, StatusRegisters, TestRegisters,
};

/// Register page numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Page {
    /// Static configuration
    Config = 0,
    /// Dynamic status
    Status = 1,
    /// Post-mix actuator outputs (-10000 to 10000)
    Actuators = 2,
    /// Servo PWM outputs in microseconds
    Servos = 3,
    /// Raw RC input in microseconds
    RcInputRaw = 4,
    /// Scaled RC input (-10000 to 10000)
    RcInput = 5,
    /// Raw ADC values
    AdcInputRaw = 6,
    /// PWM rate group information
    Pwm = 7,
    /// Setup
    Setup = 50,
    /// Autopilot control groups, 8 wide
    Controls = 51,
    /// Mixer text upload (ignores offset)
    MixerLoad = 52,
    /// RC channel configuration
    RcConfig = 53,
    /// PWM output bypassing the mixer
    PwmDirect = 54,
    /// PWM failsafe values, zero disables output
    PwmFailsafe = 55,
    /// Sensors attached to the IO board
    Sensors = 56,
    /// PWM minimum values
    PwmMinimum = 106,
    /// PWM maximum values
    PwmMaximum = 107,
    /// PWM values output while disarmed
    PwmDisarmed = 108,
    /// Debug and test
    Test = 127,
}

/// Which directions a page supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    pub fn readable(self) -> bool {
        !matches!(self, Access::WriteOnly)
    }

    pub fn writable(self) -> bool {
        !matches!(self, Access::ReadOnly)
    }
}

/// How many registers a page holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLength {
    /// Fixed number of registers
    Fixed(u16),
    /// One register per actuator output
    PerActuator,
    /// Header registers followed by one register per RC input
    PerRcInput { header: u16 },
    /// One register per ADC input
    PerAdcInput,
    /// Not a register array
    Stream,
}

impl PageLength {
    /// Resolve the register count against configuration values
    pub fn resolve(self, config: &ConfigRegisters) -> u16 {
        match self {
            PageLength::Fixed(count) => count,
            PageLength::PerActuator => config.actuator_count,
            PageLength::PerRcInput { header } => header.saturating_add(config.rc_input_count),
            PageLength::PerAdcInput => config.adc_input_count,
            PageLength::Stream => 0,
        }
    }
}

/// Catalog entry for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDescriptor {
    pub page: Page,
    pub access: Access,
    pub length: PageLength,
    /// Whether a read must return exactly the resolved length
    pub exact: bool,
}

impl Page {
    /// Catalog entry for this page
    pub fn descriptor(self) -> PageDescriptor {
        use Access::*;
        use PageLength::*;

        let (access, length, exact) = match self {
            Page::Config => (ReadOnly, Fixed(ConfigRegisters::REGISTER_COUNT), true),
            Page::Status => (ReadWrite, Fixed(StatusRegisters::REGISTER_COUNT), true),
            Page::Actuators => (ReadOnly, PerActuator, true),
            Page::Servos => (ReadOnly, PerActuator, true),
            Page::RcInputRaw => (
                ReadOnly,
                PerRcInput { header: RcInputRawRegisters::HEADER_COUNT },
                true,
            ),
            // Boards may publish fewer scaled channels than their maximum
            Page::RcInput => (
                ReadOnly,
                PerRcInput { header: RcInputRegisters::HEADER_COUNT },
                false,
            ),
            Page::AdcInputRaw => (ReadOnly, PerAdcInput, false),
            Page::Pwm => (ReadOnly, PerActuator, false),
            Page::Setup => (ReadWrite, Fixed(SetupRegisters::REGISTER_COUNT), true),
            Page::Controls => (ReadWrite, Fixed(ControlRegisters::REGISTER_COUNT), true),
            Page::MixerLoad => (WriteOnly, Stream, false),
            Page::RcConfig => (ReadWrite, Fixed(RcConfigRegisters::REGISTER_COUNT), true),
            Page::PwmDirect => (ReadWrite, PerActuator, true),
            Page::PwmFailsafe => (ReadWrite, PerActuator, true),
            Page::Sensors => (ReadWrite, Fixed(SensorRegisters::REGISTER_COUNT), true),
            Page::PwmMinimum => (ReadWrite, PerActuator, true),
            Page::PwmMaximum => (ReadWrite, PerActuator, true),
            Page::PwmDisarmed => (ReadWrite, PerActuator, true),
            Page::Test => (ReadWrite, Fixed(TestRegisters::REGISTER_COUNT), true),
        };

        PageDescriptor {
            page: self,
            access,
            length,
            exact,
        }
    }
}

/// Pages read by a full refresh, in order
///
/// [`Page::Config`] comes first: the lengths of the dynamic pages that
/// follow are resolved from it.
pub const REFRESH_ORDER: [Page; 16] = [
    Page::Config,
    Page::Status,
    Page::Setup,
    Page::RcConfig,
    Page::RcInputRaw,
    Page::RcInput,
    Page::Controls,
    Page::AdcInputRaw,
    Page::Actuators,
    Page::Servos,
    Page::Pwm,
    Page::PwmDirect,
    Page::PwmFailsafe,
    Page::PwmMinimum,
    Page::PwmMaximum,
    Page::PwmDisarmed,
];
