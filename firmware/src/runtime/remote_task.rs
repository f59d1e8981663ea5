use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Timer};
use embedded_io_async::Read;
use static_cell::StaticCell;

use crank_core::remote::{LineAssembler, MAX_LINE_LEN, RemoteFrame};

use super::Mailbox;

const RADIO_RX_BUFFER_SIZE: usize = MAX_LINE_LEN * 2;
const RADIO_TX_BUFFER_SIZE: usize = 16;

static UART_TX_BUFFER: StaticCell<[u8; RADIO_TX_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; RADIO_RX_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

#[embassy_executor::task]
pub async fn run(
    mailbox: &'static Mailbox,
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = super::RADIO_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        UART_TX_BUFFER.init([0; RADIO_TX_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; RADIO_RX_BUFFER_SIZE]),
        UartIrqs,
        config,
    )
    .expect("failed to initialize radio UART");

    // The module is only listened to; commands are never sent back.
    let (_uart_tx, mut uart_rx) = uart.split();

    let mut assembler = LineAssembler::<MAX_LINE_LEN>::new();
    let mut ingress = [0u8; 32];
    loop {
        match uart_rx.read(&mut ingress).await {
            Ok(count) => {
                for &byte in &ingress[..count] {
                    match assembler.push(byte) {
                        Ok(Some(line)) => ingest(mailbox, &line),
                        Ok(None) => {}
                        Err(error) => {
                            defmt::warn!("radio: {}", defmt::Display2Format(&error));
                        }
                    }
                }
            }
            Err(_) => {
                defmt::warn!("radio: UART read error");
                Timer::after(Duration::from_millis(5)).await;
            }
        }
    }
}

fn ingest(mailbox: &Mailbox, line: &str) {
    match mailbox.ingest_line(line) {
        Ok(RemoteFrame::Position(raw)) => defmt::info!("radio: position command {}", raw),
        Ok(RemoteFrame::Notification(record)) => {
            defmt::info!("radio: notification from {}", record.sender.as_str());
        }
        Ok(RemoteFrame::Link(status)) => {
            defmt::info!("radio: link {}", defmt::Debug2Format(&status));
        }
        Err(error) => defmt::warn!(
            "radio: dropped line ({}), {} rejected so far",
            defmt::Display2Format(&error),
            mailbox.rejected_frames()
        ),
    }
}
