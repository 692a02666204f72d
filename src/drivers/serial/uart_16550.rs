use core::convert::TryInto;

use bitflags::bitflags;

use crate::io::{Io, Pio, ReadOnly};

bitflags! {
    struct LineStsFlags: u8 {
        const INPUT_FULL = 1;
        const OUTPUT_EMPTY = 1 << 5;
    }
}

/// 16550 UART, addressed via port I/O.
pub struct SerialPort<T: Io> {
    data: T,
    int_en: T,
    fifo_ctrl: T,
    line_ctrl: T,
    modem_ctrl: T,
    line_sts: ReadOnly<T>,
    #[allow(dead_code)]
    modem_sts: ReadOnly<T>,
}

impl SerialPort<Pio<u8>> {
    pub const fn new(base: u16) -> SerialPort<Pio<u8>> {
        SerialPort {
            data: Pio::new(base),
            int_en: Pio::new(base + 1),
            fifo_ctrl: Pio::new(base + 2),
            line_ctrl: Pio::new(base + 3),
            modem_ctrl: Pio::new(base + 4),
            line_sts: ReadOnly::new(Pio::new(base + 5)),
            modem_sts: ReadOnly::new(Pio::new(base + 6)),
        }
    }
}

impl<T: Io> SerialPort<T>
where
    T::Value: From<u8> + TryInto<u8>,
{
    pub fn init(&mut self) {
        self.int_en.write(0x00.into());
        self.line_ctrl.write(0x80.into());
        self.data.write(0x01.into());
        self.int_en.write(0x00.into());
        self.line_ctrl.write(0x03.into());
        self.fifo_ctrl.write(0xC7.into());
        self.modem_ctrl.write(0x0B.into());
        self.int_en.write(0x01.into());
    }

    fn line_sts(&self) -> LineStsFlags {
        LineStsFlags::from_bits_truncate(
            (self.line_sts.read() & 0xFF.into()).try_into().unwrap_or(0),
        )
    }

    pub fn send(&mut self, data: u8) {
        while !self.line_sts().contains(LineStsFlags::OUTPUT_EMPTY) {}
        self.data.write(data.into())
    }

    pub fn write(&mut self, b: u8) {
        match b {
            8 | 0x7F => {
                self.send(8);
                self.send(b' ');
                self.send(8);
            }
            b'\n' => {
                self.send(b'\r');
                self.send(b'\n');
            }
            _ => self.send(b),
        }
    }
}
