//! Board peripherals behind the controller traits.

use crank_core::controller::{Actuator, Indicator};
use crank_core::position::servo_duty;
use embassy_stm32::Peri;
use embassy_stm32::gpio::{Input, Output, OutputType};
use embassy_stm32::peripherals::{PA6, TIM3};
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::Ch1;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};

/// Hobby servo frame rate.
const SERVO_FRAME_HZ: u32 = 50;

/// Servo on TIM3 channel 1 (PA6) at 50 Hz.
pub struct ServoOutput<'d> {
    pwm: SimplePwm<'d, TIM3>,
}

impl<'d> ServoOutput<'d> {
    pub fn new(timer: Peri<'d, TIM3>, pin: Peri<'d, PA6>) -> Self {
        let pin: PwmPin<'d, TIM3, Ch1> = PwmPin::new(pin, OutputType::PushPull);
        let mut pwm = SimplePwm::new(
            timer,
            Some(pin),
            None,
            None,
            None,
            Hertz::hz(SERVO_FRAME_HZ),
            Default::default(),
        );
        pwm.ch1().enable();
        Self { pwm }
    }
}

impl Actuator for ServoOutput<'_> {
    fn set_pulse_width(&mut self, pulse_us: u16) {
        let mut channel = self.pwm.ch1();
        let max = channel.max_duty_cycle();
        let duty = servo_duty(pulse_us, u32::from(max));
        channel.set_duty_cycle(duty.try_into().unwrap_or(max));
    }
}

/// Push-pull status LED, lit when high.
pub struct StatusLed<'d> {
    pin: Output<'d>,
}

impl<'d> StatusLed<'d> {
    pub fn new(pin: Output<'d>) -> Self {
        Self { pin }
    }
}

impl Indicator for StatusLed<'_> {
    fn set_lit(&mut self, lit: bool) {
        if lit {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}

/// Push button to ground with the internal pull-up enabled.
pub struct CrankButton<'d> {
    pin: Input<'d>,
}

impl<'d> CrankButton<'d> {
    pub fn new(pin: Input<'d>) -> Self {
        Self { pin }
    }

    /// Raw sample for the debouncer; low means pressed.
    pub fn is_active(&self) -> bool {
        self.pin.is_low()
    }
}
