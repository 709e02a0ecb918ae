//! On-board sensors: the die temperature sensor behind the ADC and the two
//! user buttons.

use embedded_hal::digital::{Error as _, InputPin};

/// ADC reference voltage.
const ADC_VREF: f32 = 3.3;

/// Full-scale count of the 12-bit ADC.
const ADC_FULL_SCALE: f32 = 4096.0;

/// Sensor voltage at 27 °C.
const SENSOR_V27: f32 = 0.706;

/// Sensor slope, volts per °C.
const SENSOR_SLOPE: f32 = 0.001721;

/// Unit a temperature is reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TemperatureUnit {
    /// Degrees Celsius.
    #[default]
    Celsius,
    /// Degrees Fahrenheit.
    Fahrenheit,
}

impl TemperatureUnit {
    /// Convert a Celsius reading into this unit.
    pub fn from_celsius(self, celsius: f32) -> f32 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }
}

/// A single-sample ADC channel wired to the temperature sensor.
pub trait TemperatureAdc {
    /// Take one raw 12-bit sample.
    fn read_raw(&mut self) -> u16;
}

impl<F: FnMut() -> u16> TemperatureAdc for F {
    fn read_raw(&mut self) -> u16 {
        self()
    }
}

/// Source of the two values the agent publishes.
///
/// Object-safe so publishers can sample through `&mut dyn SensorSource`
/// without knowing the concrete pins or ADC.
pub trait SensorSource {
    /// Current temperature in `unit`.
    fn temperature(&mut self, unit: TemperatureUnit) -> f32;

    /// Whether any button is currently pressed.
    fn button_pressed(&mut self) -> bool;
}

/// Convert a raw 12-bit ADC code from the die temperature sensor to Celsius.
pub fn celsius_from_raw(raw: u16) -> f32 {
    let volts = f32::from(raw) * ADC_VREF / ADC_FULL_SCALE;
    27.0 - (volts - SENSOR_V27) / SENSOR_SLOPE
}

/// Reads the temperature sensor and the two active-low buttons.
pub struct SensorReader<A, P1, P2> {
    adc: A,
    button_a: P1,
    button_b: P2,
}

impl<A, P1, P2> SensorReader<A, P1, P2>
where
    A: TemperatureAdc,
    P1: InputPin,
    P2: InputPin,
{
    /// Create a reader.
    ///
    /// The button pins must already be configured as inputs with pull-ups.
    pub fn new(adc: A, button_a: P1, button_b: P2) -> Self {
        Self {
            adc,
            button_a,
            button_b,
        }
    }

    /// Sample the temperature sensor once and convert to `unit`.
    pub fn read_temperature(&mut self, unit: TemperatureUnit) -> f32 {
        unit.from_celsius(celsius_from_raw(self.adc.read_raw()))
    }

    /// Whether button A or button B is held down.
    ///
    /// Both lines idle high; a low level means pressed. Button B is not
    /// sampled when A is already pressed.
    pub fn read_button_aggregate(&mut self) -> bool {
        is_pressed(&mut self.button_a) || is_pressed(&mut self.button_b)
    }
}

impl<A, P1, P2> SensorSource for SensorReader<A, P1, P2>
where
    A: TemperatureAdc,
    P1: InputPin,
    P2: InputPin,
{
    fn temperature(&mut self, unit: TemperatureUnit) -> f32 {
        self.read_temperature(unit)
    }

    fn button_pressed(&mut self) -> bool {
        self.read_button_aggregate()
    }
}

fn is_pressed<P: InputPin>(pin: &mut P) -> bool {
    match pin.is_low() {
        Ok(low) => low,
        Err(e) => {
            warn!("button read failed: {:?}", e.kind());
            false
        }
    }
}
