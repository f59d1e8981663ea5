use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crank_core::config::ControllerConfig;
use crank_core::controller::Controller;
use crank_core::remote::RemoteMailbox;

use crate::display::{FrameSignal, SignalDisplay};
use crate::hw::{CrankButton, ServoOutput, StatusLed};

mod control_task;
mod display_task;
mod remote_task;

// Pin map (STM32G0B1KE):
//   PA0  button to ground, internal pull-up
//   PA5  status LED
//   PA6  servo signal, TIM3_CH1
//   PB8  OLED SCL, I2C1
//   PB9  OLED SDA, I2C1
//   PB0  radio RX line, USART5_TX
//   PB1  radio TX line, USART5_RX

/// Factory baud rate of HM-10 style BLE-UART modules.
pub const RADIO_UART_BAUD: u32 = 9_600;
/// OLED bus speed.
pub const DISPLAY_I2C_HZ: u32 = 400_000;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) type Mailbox = RemoteMailbox<CriticalSectionRawMutex>;
pub(super) type CrankController = Controller<
    ServoOutput<'static>,
    SignalDisplay<'static, CriticalSectionRawMutex>,
    StatusLed<'static>,
>;

pub(super) static REMOTE: Mailbox = RemoteMailbox::new();
pub(super) static FRAMES: FrameSignal<CriticalSectionRawMutex> = Signal::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA5,
        PA6,
        PB0,
        PB1,
        PB8,
        PB9,
        TIM3,
        I2C1,
        USART5,
        ..
    } = hal::init(config);

    let controller = Controller::new(
        ControllerConfig::DEFAULT,
        ServoOutput::new(TIM3, PA6),
        SignalDisplay::new(&FRAMES),
        StatusLed::new(Output::new(PA5, Level::Low, Speed::Low)),
    )
    .expect("invalid controller configuration");
    let button = CrankButton::new(Input::new(PA0, Pull::Up));

    defmt::info!("window-crank: starting");

    spawner
        .spawn(display_task::run(&FRAMES, I2C1, PB8, PB9))
        .expect("failed to spawn display task");

    spawner
        .spawn(remote_task::run(&REMOTE, USART5, PB0, PB1))
        .expect("failed to spawn radio task");

    spawner
        .spawn(control_task::run(controller, button, &REMOTE))
        .expect("failed to spawn control task");

    core::future::pending::<()>().await;
}
