//! # Device Session
//!
//! Holds the last-known state of the IO board and refreshes it with a full
//! register sweep on demand. Also carries the single-register commands a
//! host issues between sweeps (safety switch, arming, test LED).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{RcioError, Result};
use crate::px4io::pages::{Page, REFRESH_ORDER};
use crate::px4io::protocol::PROTOCOL_VERSION;
use crate::px4io::registers::{
    AlarmFlags, ArmingFlags, ConfigRegisters, ControlRegisters, MonitoringFlags,
    RcConfigRegisters, RcInputRawRegisters, RcInputRegisters, SensorRegisters, SetupRegisters,
    StatusRegisters, TestRegisters,
};
use crate::serial::RegisterBus;
use crate::transfer::TransferEngine;

/// Every page read by one sweep, decoded
///
/// A snapshot is built whole from a single sweep and never patched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub config: ConfigRegisters,
    pub status: StatusRegisters,
    pub setup: SetupRegisters,
    pub rc_config: RcConfigRegisters,
    pub rc_input_raw: RcInputRawRegisters,
    pub rc_input: RcInputRegisters,
    pub controls: ControlRegisters,
    pub adc_input_raw: Vec<u16>,
    /// Post-mix actuator values (-10000 to 10000)
    pub actuators: Vec<i16>,
    /// Servo outputs in microseconds
    pub servos: Vec<u16>,
    pub pwm: Vec<u16>,
    pub pwm_direct: Vec<u16>,
    pub pwm_failsafe: Vec<u16>,
    pub pwm_minimum: Vec<u16>,
    pub pwm_maximum: Vec<u16>,
    pub pwm_disarmed: Vec<u16>,
}

impl Snapshot {
    pub fn protocol_version_supported(&self) -> bool {
        self.config.protocol_version == PROTOCOL_VERSION
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rc_state = if self.status.monitoring.contains(MonitoringFlags::RC_OK) {
            "ok"
        } else {
            "lost"
        };
        let safety = if self.status.monitoring.contains(MonitoringFlags::SAFETY_OFF) {
            "off"
        } else {
            "on"
        };

        write!(
            f,
            "protocol v{}, rc {}ch {}, armed {}, safety {}, alarms 0x{:04X}, servos {:?}",
            self.config.protocol_version,
            self.rc_input_raw.channel_count,
            rc_state,
            self.status.monitoring.contains(MonitoringFlags::ARMED),
            safety,
            self.status.alarms.bits(),
            self.servos,
        )
    }
}

/// Owner of one IO board connection and its last snapshot
#[derive(Debug)]
pub struct DeviceSession<B: RegisterBus> {
    engine: TransferEngine<B>,
    snapshot: Option<Snapshot>,
}

impl<B: RegisterBus> DeviceSession<B> {
    pub fn new(engine: TransferEngine<B>) -> Self {
        Self {
            engine,
            snapshot: None,
        }
    }

    /// Last successful snapshot
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Sweep every readable page and replace the stored snapshot
    ///
    /// Dynamic page lengths are taken from the configuration page read at
    /// the start of the same sweep. Any failing page fails the whole
    /// refresh and leaves the previous snapshot in place.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rcio_bridge::config::SerialConfig;
    /// use rcio_bridge::serial::SerialBus;
    /// use rcio_bridge::session::DeviceSession;
    /// use rcio_bridge::transfer::TransferEngine;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let bus = SerialBus::open(&SerialConfig::default())?;
    ///     let mut session = DeviceSession::new(TransferEngine::new(bus));
    ///     let snapshot = session.refresh().await?;
    ///     println!("{}", snapshot);
    ///     Ok(())
    /// }
    /// ```
    pub async fn refresh(&mut self) -> Result<&Snapshot> {
        let snapshot = self.sweep().await?;

        if !snapshot.protocol_version_supported() {
            warn!(
                "IO board reports protocol version {}, expected {}",
                snapshot.config.protocol_version, PROTOCOL_VERSION
            );
        }

        Ok(&*self.snapshot.insert(snapshot))
    }

    async fn sweep(&mut self) -> Result<Snapshot> {
        let captured_at = Utc::now();
        debug!("Starting register sweep of {} pages", REFRESH_ORDER.len());

        let config = ConfigRegisters::from_registers(
            &self
                .read_registers(Page::Config, ConfigRegisters::REGISTER_COUNT as usize, true)
                .await?,
        )?;

        let status = StatusRegisters::from_registers(&self.read_page(Page::Status, &config).await?)?;
        let setup = SetupRegisters::from_registers(&self.read_page(Page::Setup, &config).await?)?;
        let rc_config =
            RcConfigRegisters::from_registers(&self.read_page(Page::RcConfig, &config).await?)?;
        let rc_input_raw =
            RcInputRawRegisters::from_registers(&self.read_page(Page::RcInputRaw, &config).await?)?;
        let rc_input =
            RcInputRegisters::from_registers(&self.read_page(Page::RcInput, &config).await?)?;
        let controls =
            ControlRegisters::from_registers(&self.read_page(Page::Controls, &config).await?)?;
        let adc_input_raw = self.read_page(Page::AdcInputRaw, &config).await?;
        let actuators = self
            .read_page(Page::Actuators, &config)
            .await?
            .into_iter()
            .map(|raw| raw as i16)
            .collect();

        Ok(Snapshot {
            captured_at,
            config,
            status,
            setup,
            rc_config,
            rc_input_raw,
            rc_input,
            controls,
            adc_input_raw,
            actuators,
            servos: self.read_page(Page::Servos, &config).await?,
            pwm: self.read_page(Page::Pwm, &config).await?,
            pwm_direct: self.read_page(Page::PwmDirect, &config).await?,
            pwm_failsafe: self.read_page(Page::PwmFailsafe, &config).await?,
            pwm_minimum: self.read_page(Page::PwmMinimum, &config).await?,
            pwm_maximum: self.read_page(Page::PwmMaximum, &config).await?,
            pwm_disarmed: self.read_page(Page::PwmDisarmed, &config).await?,
        })
    }

    /// Read a whole page, sized from `config`
    async fn read_page(&mut self, page: Page, config: &ConfigRegisters) -> Result<Vec<u16>> {
        let descriptor = page.descriptor();
        let count = descriptor.length.resolve(config) as usize;
        self.read_registers(page, count, descriptor.exact).await
    }

    /// Read from offset 0 of a readable page
    async fn read_registers(&mut self, page: Page, count: usize, exact: bool) -> Result<Vec<u16>> {
        let access = page.descriptor().access;
        if !access.readable() {
            return Err(RcioError::PageAccess {
                page: page.into(),
                access,
                operation: "read",
            });
        }
        self.engine.read(page.into(), 0, count, exact).await
    }

    /// Write to a writable page
    async fn write_registers(&mut self, page: Page, offset: u8, values: &[u16]) -> Result<()> {
        let access = page.descriptor().access;
        if !access.writable() {
            return Err(RcioError::PageAccess {
                page: page.into(),
                access,
                operation: "written",
            });
        }
        self.engine.write(page.into(), offset, values).await
    }

    /// Read the sensors page (not part of the sweep)
    pub async fn read_sensors(&mut self) -> Result<SensorRegisters> {
        let registers = self
            .read_registers(Page::Sensors, SensorRegisters::REGISTER_COUNT as usize, true)
            .await?;
        SensorRegisters::from_registers(&registers)
    }

    /// Read the test page (not part of the sweep)
    pub async fn read_test(&mut self) -> Result<TestRegisters> {
        let registers = self
            .read_registers(Page::Test, TestRegisters::REGISTER_COUNT as usize, true)
            .await?;
        TestRegisters::from_registers(&registers)
    }

    pub async fn set_test_led(&mut self, on: bool) -> Result<()> {
        self.write_registers(Page::Test, TestRegisters::LED, &[on as u16])
            .await
    }

    /// Engage the safety switch, disabling outputs
    pub async fn force_safety_on(&mut self) -> Result<()> {
        info!("Forcing safety on");
        self.write_registers(
            Page::Setup,
            SetupRegisters::FORCE_SAFETY_ON,
            &[SetupRegisters::FORCE_SAFETY_MAGIC],
        )
        .await
    }

    /// Release the safety switch, enabling outputs
    pub async fn force_safety_off(&mut self) -> Result<()> {
        info!("Forcing safety off");
        self.write_registers(
            Page::Setup,
            SetupRegisters::FORCE_SAFETY_OFF,
            &[SetupRegisters::FORCE_SAFETY_MAGIC],
        )
        .await
    }

    /// Restart the IO board into its bootloader
    ///
    /// The board stops answering until it is reflashed or power cycled.
    pub async fn reboot_bootloader(&mut self) -> Result<()> {
        warn!("Rebooting IO board into bootloader");
        self.write_registers(
            Page::Setup,
            SetupRegisters::REBOOT_BOOTLOADER,
            &[SetupRegisters::REBOOT_BOOTLOADER_MAGIC],
        )
        .await
    }

    /// Clear latched alarms; set bits are cleared
    pub async fn clear_alarms(&mut self, alarms: AlarmFlags) -> Result<()> {
        self.write_registers(Page::Status, StatusRegisters::ALARMS, &[alarms.bits()])
            .await
    }

    pub async fn set_arming(&mut self, arming: ArmingFlags) -> Result<()> {
        self.write_registers(Page::Setup, SetupRegisters::ARMING, &[arming.bits()])
            .await
    }

    /// Drive outputs directly in microseconds, bypassing the mixer
    pub async fn set_pwm_direct(&mut self, values: &[u16]) -> Result<()> {
        self.write_registers(Page::PwmDirect, 0, values).await
    }
}
