use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::i2c::{Config as I2cConfig, I2c};
use embassy_stm32::time::Hertz;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Timer};

use crate::display::{FrameSignal, PAGES, Ssd1306};

#[embassy_executor::task]
pub async fn run(
    frames: &'static FrameSignal<CriticalSectionRawMutex>,
    i2c: Peri<'static, hal::peripherals::I2C1>,
    scl: Peri<'static, hal::peripherals::PB8>,
    sda: Peri<'static, hal::peripherals::PB9>,
) -> ! {
    let mut config = I2cConfig::default();
    config.frequency = Hertz(super::DISPLAY_I2C_HZ);

    let mut oled = Ssd1306::new(I2c::new_blocking(i2c, scl, sda, config));
    if oled.init().is_err() {
        defmt::warn!("display: OLED did not acknowledge init");
    }

    loop {
        let frame = frames.wait().await;
        oled.draw_layout(&frame.layout());

        // Yield between pages so the control loop keeps its cadence.
        for page in 0..PAGES {
            if oled.flush_page(page).is_err() {
                defmt::warn!("display: I2C write failed on page {}", page);
                Timer::after(Duration::from_millis(5)).await;
                break;
            }
            embassy_futures::yield_now().await;
        }
    }
}
