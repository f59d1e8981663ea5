//! SSD1306 OLED driver and the controller's display seam.
//!
//! The controller pushes [`DisplayFrame`]s through [`SignalDisplay`]; only the
//! newest unsent frame survives. The display task lays the frame out, draws it
//! into the page buffer with embedded-graphics and flushes page by page so a
//! slow bus never holds the executor for a whole frame.

use core::convert::Infallible;

use crank_core::controller::StatusDisplay;
use crank_core::display::{DISPLAY_HEIGHT, DISPLAY_WIDTH, DisplayFrame, FrameLayout, Rect};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embedded_graphics::Drawable;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::iso_8859_1::FONT_6X10;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::Text;
use embedded_hal::i2c::I2c;

/// Default 7-bit address of SSD1306 breakout boards.
pub const SSD1306_ADDR: u8 = 0x3C;

const WIDTH: usize = DISPLAY_WIDTH as usize;
pub const PAGES: usize = DISPLAY_HEIGHT as usize / 8;

const COMMAND_PREFIX: u8 = 0x00;
const DATA_PREFIX: u8 = 0x40;

#[allow(dead_code)]
mod cmd {
    pub const DISPLAY_OFF: u8 = 0xAE;
    pub const DISPLAY_ON: u8 = 0xAF;
    pub const SET_CLOCK_DIV: u8 = 0xD5;
    pub const SET_MUX_RATIO: u8 = 0xA8;
    pub const SET_DISPLAY_OFFSET: u8 = 0xD3;
    pub const SET_START_LINE: u8 = 0x40;
    pub const SET_CHARGE_PUMP: u8 = 0x8D;
    pub const SET_MEMORY_MODE: u8 = 0x20;
    pub const SET_SEG_REMAP: u8 = 0xA1;
    pub const SET_COM_SCAN_DEC: u8 = 0xC8;
    pub const SET_COM_PINS: u8 = 0xDA;
    pub const SET_CONTRAST: u8 = 0x81;
    pub const SET_PRECHARGE: u8 = 0xD9;
    pub const SET_VCOM_DETECT: u8 = 0xDB;
    pub const RESUME_FROM_RAM: u8 = 0xA4;
    pub const SET_NORMAL: u8 = 0xA6;
    pub const DEACTIVATE_SCROLL: u8 = 0x2E;
    pub const SET_COLUMN_ADDR: u8 = 0x21;
    pub const SET_PAGE_ADDR: u8 = 0x22;
}

/// Power-up sequence for a 128x64 panel with the internal charge pump.
const INIT_SEQUENCE: &[&[u8]] = &[
    &[cmd::DISPLAY_OFF],
    &[cmd::SET_CLOCK_DIV, 0x80],
    &[cmd::SET_MUX_RATIO, 0x3F],
    &[cmd::SET_DISPLAY_OFFSET, 0x00],
    &[cmd::SET_START_LINE],
    &[cmd::SET_CHARGE_PUMP, 0x14],
    &[cmd::SET_MEMORY_MODE, 0x00],
    &[cmd::SET_SEG_REMAP],
    &[cmd::SET_COM_SCAN_DEC],
    &[cmd::SET_COM_PINS, 0x12],
    &[cmd::SET_CONTRAST, 0xCF],
    &[cmd::SET_PRECHARGE, 0xF1],
    &[cmd::SET_VCOM_DETECT, 0x40],
    &[cmd::RESUME_FROM_RAM],
    &[cmd::SET_NORMAL],
    &[cmd::DEACTIVATE_SCROLL],
    &[cmd::DISPLAY_ON],
];

/// Frame buffered SSD1306 over a blocking I2C bus.
pub struct Ssd1306<I2C> {
    i2c: I2C,
    address: u8,
    /// One byte per column per 8-row page, LSB on top.
    buffer: [[u8; WIDTH]; PAGES],
}

impl<I2C> Ssd1306<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            address: SSD1306_ADDR,
            buffer: [[0; WIDTH]; PAGES],
        }
    }

    pub fn clear(&mut self) {
        for page in &mut self.buffer {
            page.fill(0);
        }
    }

    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < WIDTH && y < PAGES * 8 && self.buffer[y / 8][x] & (1 << (y % 8)) != 0
    }

    /// Replaces the buffer contents with `layout`.
    pub fn draw_layout(&mut self, layout: &FrameLayout) {
        self.clear();

        let text_style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        for row in &layout.rows {
            let text = Text::new(
                row.text.as_str(),
                Point::new(row.x, row.baseline_y),
                text_style,
            );
            self.draw(&text);
        }

        if let Some(bar) = &layout.bar {
            let outline =
                rectangle(bar.frame).into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1));
            self.draw(&outline);
            let marker =
                rectangle(bar.marker).into_styled(PrimitiveStyle::with_fill(BinaryColor::On));
            self.draw(&marker);
        }
    }

    fn draw<D>(&mut self, item: &D)
    where
        D: Drawable<Color = BinaryColor>,
    {
        match item.draw(self) {
            Ok(_) => {}
            Err(never) => match never {},
        }
    }
}

impl<I2C> Ssd1306<I2C>
where
    I2C: I2c,
{
    pub fn init(&mut self) -> Result<(), I2C::Error> {
        for command in INIT_SEQUENCE {
            self.command(command)?;
        }
        Ok(())
    }

    fn command(&mut self, bytes: &[u8]) -> Result<(), I2C::Error> {
        let mut frame = [COMMAND_PREFIX; 4];
        let len = bytes.len().min(frame.len() - 1);
        frame[1..=len].copy_from_slice(&bytes[..len]);
        self.i2c.write(self.address, &frame[..=len])
    }

    /// Sends one 8-row page of the buffer.
    pub fn flush_page(&mut self, page: usize) -> Result<(), I2C::Error> {
        let Some(columns) = self.buffer.get(page) else {
            return Ok(());
        };
        let Ok(page_addr) = u8::try_from(page) else {
            return Ok(());
        };

        let mut data = [DATA_PREFIX; WIDTH + 1];
        data[1..].copy_from_slice(columns);

        self.command(&[cmd::SET_COLUMN_ADDR, 0, 0x7F])?;
        self.command(&[cmd::SET_PAGE_ADDR, page_addr, page_addr])?;
        self.i2c.write(self.address, &data)
    }

    pub fn flush(&mut self) -> Result<(), I2C::Error> {
        for page in 0..PAGES {
            self.flush_page(page)?;
        }
        Ok(())
    }
}

fn rectangle(rect: Rect) -> Rectangle {
    Rectangle::new(
        Point::new(rect.x, rect.y),
        Size::new(rect.width, rect.height),
    )
}

impl<I2C> OriginDimensions for Ssd1306<I2C> {
    fn size(&self) -> Size {
        Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }
}

impl<I2C> DrawTarget for Ssd1306<I2C> {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<P>(&mut self, pixels: P) -> Result<(), Self::Error>
    where
        P: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (usize::try_from(point.x), usize::try_from(point.y)) else {
                continue;
            };
            if x >= WIDTH || y >= PAGES * 8 {
                continue;
            }

            let bit = 1u8 << (y % 8);
            let byte = &mut self.buffer[y / 8][x];
            if color.is_on() {
                *byte |= bit;
            } else {
                *byte &= !bit;
            }
        }
        Ok(())
    }
}

/// Latest-frame-wins hand-off from the controller to the display task.
pub type FrameSignal<M> = Signal<M, DisplayFrame>;

/// [`StatusDisplay`] that posts frames to a [`FrameSignal`].
pub struct SignalDisplay<'a, M: RawMutex> {
    frames: &'a FrameSignal<M>,
}

impl<'a, M: RawMutex> SignalDisplay<'a, M> {
    pub const fn new(frames: &'a FrameSignal<M>) -> Self {
        Self { frames }
    }
}

impl<M: RawMutex> StatusDisplay for SignalDisplay<'_, M> {
    fn render(&mut self, frame: &DisplayFrame) {
        self.frames.signal(frame.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crank_core::display::StatusSnapshot;
    use crank_core::position::PositionIndex;
    use crank_core::remote::NotificationRecord;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embedded_hal::i2c::{ErrorType, Operation};

    #[derive(Default)]
    struct Bus {
        writes: Vec<(u8, Vec<u8>)>,
    }

    impl ErrorType for Bus {
        type Error = Infallible;
    }

    impl I2c for Bus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            for operation in operations {
                if let Operation::Write(bytes) = operation {
                    self.writes.push((address, bytes.to_vec()));
                }
            }
            Ok(())
        }
    }

    fn status(linked: bool) -> DisplayFrame {
        DisplayFrame::Status(StatusSnapshot {
            position: PositionIndex::HOME,
            position_count: 3,
            label: "0°",
            pulse_us: 1_000,
            button_down: false,
            link_connected: linked,
        })
    }

    #[test]
    fn init_sends_command_frames() {
        let mut oled = Ssd1306::new(Bus::default());
        oled.init().unwrap();

        let writes = &oled.i2c.writes;
        assert_eq!(writes.len(), INIT_SEQUENCE.len());
        assert_eq!(writes[0], (SSD1306_ADDR, vec![0x00, cmd::DISPLAY_OFF]));
        assert_eq!(writes[5].1, vec![0x00, cmd::SET_CHARGE_PUMP, 0x14]);
        assert_eq!(writes.last().unwrap().1, vec![0x00, cmd::DISPLAY_ON]);
    }

    #[test]
    fn flush_writes_every_page() {
        let mut oled = Ssd1306::new(Bus::default());
        oled.flush().unwrap();

        let data: Vec<_> = oled
            .i2c
            .writes
            .iter()
            .filter(|(_, bytes)| bytes[0] == DATA_PREFIX)
            .collect();
        assert_eq!(data.len(), PAGES);
        assert!(data.iter().all(|(_, bytes)| bytes.len() == WIDTH + 1));
        assert_eq!(oled.i2c.writes[1].1, vec![0x00, cmd::SET_PAGE_ADDR, 0, 0]);
    }

    #[test]
    fn status_frame_draws_bar_and_marker() {
        let mut oled = Ssd1306::new(Bus::default());
        oled.draw_layout(&status(false).layout());

        // Outline corners of the bar frame at (0,58)..(127,63).
        assert!(oled.pixel(0, 58));
        assert!(oled.pixel(127, 63));
        // Marker for the home position at (0,60) 4x2.
        assert!(oled.pixel(2, 60));
        assert!(oled.pixel(3, 61));
        // Inside the bar but away from the marker stays dark.
        assert!(!oled.pixel(64, 60));
    }

    #[test]
    fn redraw_clears_previous_frame() {
        let mut oled = Ssd1306::new(Bus::default());
        oled.draw_layout(&status(false).layout());
        assert!(oled.pixel(0, 58));

        let record = NotificationRecord::new("Alice", "09:41", "hi");
        oled.draw_layout(&DisplayFrame::Notification(record).layout());
        assert!(!oled.pixel(127, 63));
    }

    #[test]
    fn signal_display_keeps_only_the_newest_frame() {
        let frames = FrameSignal::<NoopRawMutex>::new();
        let mut display = SignalDisplay::new(&frames);

        display.render(&DisplayFrame::Splash);
        display.render(&status(true));

        assert_eq!(frames.try_take(), Some(status(true)));
        assert_eq!(frames.try_take(), None);
    }
}
