//! INA3221 sense bus driver.
//!
//! The three-channel monitor sits on I2C1; channel 1 senses the charger
//! input and channel 2 the battery. Register reads return 16-bit values
//! whose low three bits are reserved, so raw values shift right by three
//! before scaling (40 µV/LSB shunt, 8 mV/LSB bus).

use controller_core::power::sampler::{ChannelReading, SenseBus, SenseChannel, SenseError};
use embassy_stm32::i2c::I2c;
use embassy_stm32::mode::Blocking;

/// Fixed bus address of the monitor.
pub const INA3221_ADDRESS: u8 = 0x40;

const REG_CH1_SHUNT: u8 = 0x01;
const REG_CH1_BUS: u8 = 0x02;
const REG_CH2_SHUNT: u8 = 0x03;
const REG_CH2_BUS: u8 = 0x04;
const REG_MANUFACTURER_ID: u8 = 0xFE;

const SHUNT_VOLTS_PER_LSB: f32 = 0.000_040;
const BUS_VOLTS_PER_LSB: f32 = 0.008;

/// Blocking INA3221 driver implementing the core sense-bus trait.
pub struct Ina3221 {
    i2c: I2c<'static, Blocking>,
}

impl Ina3221 {
    /// Wraps an initialized blocking I2C bus.
    #[must_use]
    pub const fn new(i2c: I2c<'static, Blocking>) -> Self {
        Self { i2c }
    }

    fn read_register(&mut self, register: u8) -> Result<u16, SenseError> {
        let mut value = [0u8; 2];
        self.i2c
            .blocking_write_read(INA3221_ADDRESS, &[register], &mut value)
            .map_err(|_| SenseError::Nak)?;
        Ok(u16::from_be_bytes(value))
    }
}

impl SenseBus for Ina3221 {
    fn read_channel(&mut self, channel: SenseChannel) -> Result<ChannelReading, SenseError> {
        let (shunt_reg, bus_reg) = match channel {
            SenseChannel::Charger => (REG_CH1_SHUNT, REG_CH1_BUS),
            SenseChannel::Battery => (REG_CH2_SHUNT, REG_CH2_BUS),
        };

        let shunt_raw = self.read_register(shunt_reg)?;
        let bus_raw = self.read_register(bus_reg)?;
        Ok(ChannelReading::new(bus_volts(bus_raw), shunt_volts(shunt_raw)))
    }

    fn manufacturer_id(&mut self) -> Result<u16, SenseError> {
        self.read_register(REG_MANUFACTURER_ID)
    }
}

/// Converts a raw shunt register value (signed, 40 µV/LSB after shift).
#[allow(clippy::cast_possible_wrap)]
fn shunt_volts(raw: u16) -> f32 {
    f32::from((raw as i16) >> 3) * SHUNT_VOLTS_PER_LSB
}

/// Converts a raw bus register value (unsigned, 8 mV/LSB after shift).
fn bus_volts(raw: u16) -> f32 {
    f32::from(raw >> 3) * BUS_VOLTS_PER_LSB
}
