//! SSM2603 audio codec
//!
//! The codec is configured over I2C with 16-bit frames: a 7-bit register
//! address followed by a 9-bit value, most significant bit first.
//!
//! [`Ssm2603::init`] leaves the codec as an I2S slave with 24-bit words at
//! 48 kHz, the DAC routed to the headphone output and the ADC fed from the
//! microphone input. [`Ssm2603::select_line_input`] switches the ADC over to
//! the line input.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

/// 7-bit bus address with the CSB pin tied low.
pub const ADDRESS: u8 = 0x1A;

/// Time the codec needs after its references are powered before the output
/// stage may be enabled.
pub const POWER_UP_DELAY_MS: u32 = 75;

/// Codec control registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Register {
    LeftAdcVolume = 0,
    RightAdcVolume = 1,
    LeftDacVolume = 2,
    RightDacVolume = 3,
    AnalogPath = 4,
    DigitalPath = 5,
    PowerManagement = 6,
    DigitalInterface = 7,
    SamplingRate = 8,
    Active = 9,
    SoftwareReset = 15,
}

// Register values, 9 bits each
const ADC_VOLUME_0DB: u16 = 0b0_0001_0111;
const DAC_VOLUME_0DB: u16 = 0b0_0111_1001;
const PATH_MIC_TO_ADC_DAC_SELECTED: u16 = 0b0_0001_0000;
const PATH_LINE_IN: u16 = 0b0_0001_0010;
const DIGITAL_PATH_DEFAULT: u16 = 0;
// everything on except the output stage and the oscillator
const POWER_OUTPUT_OFF: u16 = 0b0_0011_0000;
const POWER_ALL_ON: u16 = 0;
// I2S, 24-bit words, slave
const INTERFACE_I2S_24BIT: u16 = 0b0_0000_1010;
// normal mode, 48 kHz from a 12.288 MHz MCLK
const SAMPLING_48K: u16 = 0;
const ACTIVATE: u16 = 1;
const RESET: u16 = 0;

/// Codec errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The I2C transfer failed.
    Bus(E),
}

/// Build the bus frame for one register write.
pub fn frame(register: Register, value: u16) -> [u8; 2] {
    let value = value & 0x1FF;
    [((register as u8) << 1) | (value >> 8) as u8, value as u8]
}

/// SSM2603 driver.
pub struct Ssm2603<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> Ssm2603<I2C> {
    /// Wrap the codec's bus.
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Write `value` (the low 9 bits) into `register`.
    pub fn write_register(
        &mut self,
        register: Register,
        value: u16,
    ) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .write(ADDRESS, &frame(register, value))
            .map_err(Error::Bus)
    }

    /// Reset and configure the codec, then activate its digital core.
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I2C::Error>> {
        self.write_register(Register::SoftwareReset, RESET)?;
        self.write_register(Register::PowerManagement, POWER_OUTPUT_OFF)?;
        self.write_register(Register::LeftAdcVolume, ADC_VOLUME_0DB)?;
        self.write_register(Register::RightAdcVolume, ADC_VOLUME_0DB)?;
        self.write_register(Register::LeftDacVolume, DAC_VOLUME_0DB)?;
        self.write_register(Register::RightDacVolume, DAC_VOLUME_0DB)?;
        self.write_register(Register::AnalogPath, PATH_MIC_TO_ADC_DAC_SELECTED)?;
        self.write_register(Register::DigitalPath, DIGITAL_PATH_DEFAULT)?;
        self.write_register(Register::DigitalInterface, INTERFACE_I2S_24BIT)?;
        self.write_register(Register::SamplingRate, SAMPLING_48K)?;

        delay.delay_ms(POWER_UP_DELAY_MS);

        self.write_register(Register::Active, ACTIVATE)?;
        self.write_register(Register::PowerManagement, POWER_ALL_ON)?;
        debug!("codec active");
        Ok(())
    }

    /// Feed the ADC from the line input.
    pub fn select_line_input(&mut self) -> Result<(), Error<I2C::Error>> {
        self.write_register(Register::AnalogPath, PATH_LINE_IN)
    }

    /// Release the bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    #[derive(Default)]
    struct Bus {
        frames: Vec<(u8, Vec<u8>)>,
        fail_after: Option<usize>,
    }

    impl ErrorType for Bus {
        type Error = ErrorKind;
    }

    impl I2c for Bus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail_after == Some(self.frames.len()) {
                return Err(ErrorKind::Other);
            }
            for operation in operations {
                if let Operation::Write(bytes) = operation {
                    self.frames.push((address, bytes.to_vec()));
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Delay {
        total_ns: u64,
    }

    impl DelayNs for Delay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    #[test]
    fn frame_carries_ninth_bit_in_address_byte() {
        assert_eq!(frame(Register::LeftDacVolume, 0x179), [0x05, 0x79]);
        assert_eq!(frame(Register::SoftwareReset, 0), [0x1E, 0x00]);
        assert_eq!(frame(Register::Active, 0xFFFF), [0x13, 0xFF]);
    }

    #[test]
    fn init_sequence() {
        let mut codec = Ssm2603::new(Bus::default());
        let mut delay = Delay::default();
        codec.init(&mut delay).unwrap();
        assert_eq!(delay.total_ns, 75_000_000);

        let bus = codec.release();
        assert!(bus.frames.iter().all(|(address, _)| *address == ADDRESS));
        let registers: Vec<u8> = bus.frames.iter().map(|(_, bytes)| bytes[0] >> 1).collect();
        assert_eq!(registers, [15, 6, 0, 1, 2, 3, 4, 5, 7, 8, 9, 6]);
        assert_eq!(bus.frames.last().unwrap().1, [0x0C, 0x00]);
    }

    #[test]
    fn line_input_selection() {
        let mut codec = Ssm2603::new(Bus::default());
        codec.select_line_input().unwrap();
        let bus = codec.release();
        assert_eq!(bus.frames, [(ADDRESS, vec![0x08, 0x12])]);
    }

    #[test]
    fn bus_error_stops_init() {
        let mut codec = Ssm2603::new(Bus {
            fail_after: Some(3),
            ..Bus::default()
        });
        let mut delay = Delay::default();
        assert_eq!(codec.init(&mut delay), Err(Error::Bus(ErrorKind::Other)));
        assert_eq!(delay.total_ns, 0);
        assert_eq!(codec.release().frames.len(), 3);
    }
}
