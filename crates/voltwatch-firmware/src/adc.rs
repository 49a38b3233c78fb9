//! Divider inputs on ADC1.
//!
//! Ten battery dividers on GPIO1 through GPIO10, all at 11 dB attenuation
//! so the divider output spans the converter's range. Each pin is a
//! distinct type in esp-hal, hence the field-per-channel layout and the
//! index dispatch.

use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::gpio::{GpioPin};
use esp_hal::peripherals::ADC1;

use voltwatch_core::sampling::{AdcError, AdcSource};

pub struct BoardAdc<'d> {
    adc: Adc<'d, ADC1<'d>, Blocking>,
    ch0: AdcPin<GpioPin<'d, 1>, ADC1<'d>>,
    ch1: AdcPin<GpioPin<'d, 2>, ADC1<'d>>,
    ch2: AdcPin<GpioPin<'d, 3>, ADC1<'d>>,
    ch3: AdcPin<GpioPin<'d, 4>, ADC1<'d>>,
    ch4: AdcPin<GpioPin<'d, 5>, ADC1<'d>>,
    ch5: AdcPin<GpioPin<'d, 6>, ADC1<'d>>,
    ch6: AdcPin<GpioPin<'d, 7>, ADC1<'d>>,
    ch7: AdcPin<GpioPin<'d, 8>, ADC1<'d>>,
    ch8: AdcPin<GpioPin<'d, 9>, ADC1<'d>>,
    ch9: AdcPin<GpioPin<'d, 10>, ADC1<'d>>,
}

impl<'d> BoardAdc<'d> {
    #[allow(clippy::too_many_arguments, reason = "one argument per wired divider")]
    pub fn new(
        adc1: ADC1<'d>,
        g1: GpioPin<'d, 1>,
        g2: GpioPin<'d, 2>,
        g3: GpioPin<'d, 3>,
        g4: GpioPin<'d, 4>,
        g5: GpioPin<'d, 5>,
        g6: GpioPin<'d, 6>,
        g7: GpioPin<'d, 7>,
        g8: GpioPin<'d, 8>,
        g9: GpioPin<'d, 9>,
        g10: GpioPin<'d, 10>,
    ) -> Self {
        let mut config = AdcConfig::new();
        let ch0 = config.enable_pin(g1, Attenuation::_11dB);
        let ch1 = config.enable_pin(g2, Attenuation::_11dB);
        let ch2 = config.enable_pin(g3, Attenuation::_11dB);
        let ch3 = config.enable_pin(g4, Attenuation::_11dB);
        let ch4 = config.enable_pin(g5, Attenuation::_11dB);
        let ch5 = config.enable_pin(g6, Attenuation::_11dB);
        let ch6 = config.enable_pin(g7, Attenuation::_11dB);
        let ch7 = config.enable_pin(g8, Attenuation::_11dB);
        let ch8 = config.enable_pin(g9, Attenuation::_11dB);
        let ch9 = config.enable_pin(g10, Attenuation::_11dB);
        let adc = Adc::new(adc1, config);
        Self {
            adc,
            ch0,
            ch1,
            ch2,
            ch3,
            ch4,
            ch5,
            ch6,
            ch7,
            ch8,
            ch9,
        }
    }
}

impl AdcSource for BoardAdc<'_> {
    fn read(&mut self, adc_index: u8) -> Result<u16, AdcError> {
        let raw = match adc_index {
            0 => self.adc.read_blocking(&mut self.ch0),
            1 => self.adc.read_blocking(&mut self.ch1),
            2 => self.adc.read_blocking(&mut self.ch2),
            3 => self.adc.read_blocking(&mut self.ch3),
            4 => self.adc.read_blocking(&mut self.ch4),
            5 => self.adc.read_blocking(&mut self.ch5),
            6 => self.adc.read_blocking(&mut self.ch6),
            7 => self.adc.read_blocking(&mut self.ch7),
            8 => self.adc.read_blocking(&mut self.ch8),
            9 => self.adc.read_blocking(&mut self.ch9),
            _ => return Err(AdcError::NoSuchInput),
        };
        // The converter is 12-bit; the conversion math is configured for
        // the divider's 10-bit calibration, so scale down here.
        Ok(raw >> 2)
    }
}
