//! panel.rs — UC8230 smart LCD bring-up over a GPIO-emulated i80 bus
//!
//! The SLCD controller of the SoC cannot read back from the panel, so the
//! 8-bit i80 bus is driven by hand: every register access is a short
//! sequence of [`BusOp`]s (line edges, data byte, waits) that the executor
//! plays on the GPIO block. The sequences are plain data, so the protocol
//! timing is visible to tests.
//!
//! Panel setup is a table of `(register, value)` pairs with two sentinels:
//! [`CMD_DELAY`] sleeps for the following value in milliseconds and
//! [`CMD_END`] stops playback.
//!
//! Nothing in the boot flow depends on the panel coming up; failures are
//! only visible on the screen.

use arrayvec::ArrayVec;

use crate::gpio::{self, GpioPin, Port};
use crate::hw::{Delay, RegisterBus};

pub const CMD_END: u16 = 0xFFFF;
pub const CMD_DELAY: u16 = 0xFFFE;

/// Hold time around every WR/RD edge.
pub const STROBE_US: u32 = 10;
/// Reset pulse width and index-pointer restore time.
pub const RESET_PULSE_MS: u32 = 10;

pub const WIDTH: usize = 240;
pub const HEIGHT: usize = 320;
/// Write strobes to clear GRAM: two bytes per RGB565 pixel.
pub const CLEAR_STROBES: usize = WIDTH * HEIGHT * 2;

/// Index register that points the data port at GRAM.
const GRAM_INDEX: u16 = 0x22;
const DATA_MASK: u32 = 0xFF;

/// UC8230 power-up and window setup.
#[rustfmt::skip]
pub const UC8230_INIT: &[u16] = &[
    CMD_DELAY, 100,
    0x0046, 0x0002, // MTP disable
    0x0010, 0x10b0, // SAP=1 BT=0 APE=1 AP=3
    0x0011, 0x0227, // DC1=2 DC0=2 VC=7
    0x0012, 0x80ff, // P5VMD=1 PON=7 VRH=15
    0x0013, 0x9F31, // VDV=31 VCM=49
    CMD_DELAY, 10,
    0x0003, 0x1038, // GRAM write direction, BGR
    0x0060, 0xa700, // gate scan start and line count
    0x0061, 0x0001, // normal colours
    0x0020, 0x0000,
    0x0021, 0x0000,
    0x0050, 0x0000,
    0x0051, (WIDTH - 1) as u16,
    0x0052, 0x0000,
    0x0053, (HEIGHT - 1) as u16,
    0x0080, 0x0000,
    0x0081, 0x0000,
    0x0082, 0x0000,
    0x0083, 0x0000,
    0x0084, 0x0000,
    0x0085, 0x0000,
    0x0092, 0x0200,
    0x0093, 0x0303,
    0x0090, 0x0010, // clocks per line
    0x000C, 0x0000,
    0x0000, 0x0001,
    CMD_DELAY, 200,
    0x0007, 0x0173, // display on
    CMD_END,
];

/// One step of a register table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelOp {
    Write { reg: u16, value: u16 },
    DelayMs(u16),
}

/// Iterator over a sentinel-terminated register table. A table without
/// [`CMD_END`] ends at its last complete pair.
pub struct PanelTable<'a> {
    words: &'a [u16],
}

impl<'a> PanelTable<'a> {
    pub fn new(words: &'a [u16]) -> Self {
        Self { words }
    }
}

impl Iterator for PanelTable<'_> {
    type Item = PanelOp;

    fn next(&mut self) -> Option<PanelOp> {
        let words = self.words;
        match words {
            [CMD_END, ..] | [] | [_] => {
                self.words = &[];
                None
            }
            [CMD_DELAY, ms, rest @ ..] => {
                self.words = rest;
                Some(PanelOp::DelayMs(*ms))
            }
            [reg, value, rest @ ..] => {
                self.words = rest;
                Some(PanelOp::Write { reg: *reg, value: *value })
            }
        }
    }
}

/// Control lines of the emulated bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Reset,
    Cs,
    /// Low selects the index register, high the data register.
    Rs,
    Wr,
    Rd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    High(Line),
    Low(Line),
    /// Drive a byte on D7..D0.
    Data(u8),
    DataOutput,
    DataInput,
    /// Shift D7..D0 into the read accumulator.
    Sample,
    Wait(u32),
}

pub type BusSeq = ArrayVec<BusOp, 32>;

/// Pin assignment of an i80 panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I80Pins {
    pub reset: GpioPin,
    pub cs: GpioPin,
    pub rs: GpioPin,
    pub wr: GpioPin,
    pub rd: GpioPin,
    /// D7..D0 are bits 7..0 of this port.
    pub data: Port,
}

fn strobe_write(seq: &mut BusSeq, byte: u8) {
    seq.extend([
        BusOp::Data(byte),
        BusOp::Wait(STROBE_US),
        BusOp::Low(Line::Wr),
        BusOp::Wait(STROBE_US),
        BusOp::High(Line::Wr),
    ]);
}

/// Select index register `reg`.
pub fn index_write(reg: u16) -> BusSeq {
    let mut seq = BusSeq::new();
    seq.extend([BusOp::DataOutput, BusOp::Low(Line::Rs)]);
    strobe_write(&mut seq, (reg >> 8) as u8);
    strobe_write(&mut seq, reg as u8);
    seq.extend([BusOp::Wait(STROBE_US), BusOp::High(Line::Rs)]);
    seq
}

/// Write `value` to register `reg`.
pub fn register_write(reg: u16, value: u16) -> BusSeq {
    let mut seq = index_write(reg);
    strobe_write(&mut seq, (value >> 8) as u8);
    strobe_write(&mut seq, value as u8);
    seq.push(BusOp::Wait(STROBE_US));
    seq
}

/// Select index 0 and read the 16-bit device code, high byte first.
pub fn chip_id_read() -> BusSeq {
    let mut seq = BusSeq::new();
    seq.extend([BusOp::DataOutput, BusOp::Low(Line::Rs), BusOp::Data(0)]);
    for _ in 0..2 {
        seq.extend([
            BusOp::Wait(STROBE_US),
            BusOp::Low(Line::Wr),
            BusOp::Wait(STROBE_US),
            BusOp::High(Line::Wr),
        ]);
    }
    seq.extend([BusOp::Wait(STROBE_US), BusOp::DataInput, BusOp::High(Line::Rs)]);
    for _ in 0..2 {
        seq.extend([
            BusOp::Wait(STROBE_US),
            BusOp::Low(Line::Rd),
            BusOp::Wait(STROBE_US),
            BusOp::Sample,
            BusOp::High(Line::Rd),
        ]);
    }
    seq.push(BusOp::DataOutput);
    seq
}

/// Plays bus sequences on GPIO.
pub struct I80Gpio<'r> {
    regs: &'r mut dyn RegisterBus,
    delay: &'r mut dyn Delay,
    pins: I80Pins,
}

impl<'r> I80Gpio<'r> {
    pub fn new(regs: &'r mut dyn RegisterBus, delay: &'r mut dyn Delay, pins: I80Pins) -> Self {
        Self { regs, delay, pins }
    }

    fn pin(&self, line: Line) -> GpioPin {
        match line {
            Line::Reset => self.pins.reset,
            Line::Cs => self.pins.cs,
            Line::Rs => self.pins.rs,
            Line::Wr => self.pins.wr,
            Line::Rd => self.pins.rd,
        }
    }

    /// Run `ops`; returns whatever [`BusOp::Sample`] accumulated.
    pub fn run(&mut self, ops: &[BusOp]) -> u16 {
        let mut acc = 0u16;
        for &op in ops {
            match op {
                BusOp::High(l) => {
                    let pin = self.pin(l);
                    gpio::set(self.regs, pin);
                }
                BusOp::Low(l) => {
                    let pin = self.pin(l);
                    gpio::clear(self.regs, pin);
                }
                BusOp::Data(b) => {
                    gpio::clear_mask(self.regs, self.pins.data, DATA_MASK);
                    gpio::set_mask(self.regs, self.pins.data, b as u32);
                }
                BusOp::DataOutput => gpio::as_output(self.regs, self.pins.data, DATA_MASK),
                BusOp::DataInput => gpio::as_input(self.regs, self.pins.data, DATA_MASK),
                BusOp::Sample => {
                    let byte = gpio::read_port(self.regs, self.pins.data) & DATA_MASK;
                    acc = (acc << 8) | byte as u16;
                }
                BusOp::Wait(us) => self.delay.udelay(us),
            }
        }
        acc
    }

    fn output(&mut self, line: Line, high: bool) {
        let pin = self.pin(line);
        if high {
            gpio::set(self.regs, pin);
        } else {
            gpio::clear(self.regs, pin);
        }
        gpio::as_output(self.regs, pin.port, pin.mask());
    }

    /// Play a register table.
    pub fn play(&mut self, table: PanelTable<'_>) {
        for op in table {
            match op {
                PanelOp::Write { reg, value } => {
                    self.run(&register_write(reg, value));
                }
                PanelOp::DelayMs(ms) => self.delay.mdelay(ms as u32),
            }
        }
    }

    /// Zero every pixel. The index register must already point at GRAM.
    fn clear_screen(&mut self) {
        self.run(&[BusOp::Data(0)]);
        for _ in 0..CLEAR_STROBES {
            self.run(&[BusOp::Low(Line::Wr), BusOp::High(Line::Wr)]);
        }
        // Restore the write-data pointer.
        self.run(&[BusOp::Low(Line::Rs)]);
        self.delay.mdelay(RESET_PULSE_MS);
        self.run(&[BusOp::High(Line::Rs)]);
    }
}

/// Reset the panel, log its chip ID, play the UC8230 table and blank the
/// screen. Returns the chip ID.
pub fn init_uc8230(regs: &mut dyn RegisterBus, delay: &mut dyn Delay, pins: I80Pins) -> u16 {
    let mut bus = I80Gpio::new(regs, delay, pins);

    bus.output(Line::Reset, true);
    bus.output(Line::Cs, false);
    bus.output(Line::Rs, true);
    bus.output(Line::Wr, true);
    bus.output(Line::Rd, true);
    bus.run(&[BusOp::DataOutput]);

    bus.run(&[BusOp::Low(Line::Reset)]);
    bus.delay.mdelay(RESET_PULSE_MS);
    bus.run(&[BusOp::High(Line::Reset)]);

    let id = bus.run(&chip_id_read());
    log::info!(target: "panel", "LCD controller ID: {:#06x}", id);

    bus.play(PanelTable::new(UC8230_INIT));
    bus.run(&index_write(GRAM_INDEX));
    bus.clear_screen();

    bus.run(&[BusOp::High(Line::Cs)]);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::{pin_reg, port_reg};
    use crate::testing::{RecordingDelay, SimRegs};

    const PINS: I80Pins = I80Pins {
        reset: GpioPin::new(Port::D, 21),
        cs: GpioPin::new(Port::C, 13),
        rs: GpioPin::new(Port::D, 19),
        wr: GpioPin::new(Port::D, 20),
        rd: GpioPin::new(Port::D, 18),
        data: Port::D,
    };

    #[test]
    fn table_sentinels() {
        let ops: Vec<PanelOp> = PanelTable::new(&[CMD_DELAY, 5, 0x10, 0x20, CMD_END, 0x30, 0x40]).collect();
        assert_eq!(ops, vec![PanelOp::DelayMs(5), PanelOp::Write { reg: 0x10, value: 0x20 }]);

        let unterminated: Vec<PanelOp> = PanelTable::new(&[0x10, 0x20, 0x30]).collect();
        assert_eq!(unterminated, vec![PanelOp::Write { reg: 0x10, value: 0x20 }]);
    }

    #[test]
    fn uc8230_table_shape() {
        let ops: Vec<PanelOp> = PanelTable::new(UC8230_INIT).collect();
        let delay_ms: u32 = ops
            .iter()
            .filter_map(|op| match op {
                PanelOp::DelayMs(ms) => Some(*ms as u32),
                _ => None,
            })
            .sum();
        assert_eq!(delay_ms, 310);
        assert_eq!(ops.last(), Some(&PanelOp::Write { reg: 0x0007, value: 0x0173 }));
        assert!(ops.contains(&PanelOp::Write { reg: 0x0053, value: 319 }));
    }

    #[test]
    fn register_write_strobes_four_bytes() {
        let seq = register_write(0x1234, 0xABCD);
        let bytes: Vec<u8> = seq
            .iter()
            .filter_map(|op| match op {
                BusOp::Data(b) => Some(*b),
                _ => None,
            })
            .collect();
        assert_eq!(bytes, vec![0x12, 0x34, 0xAB, 0xCD]);
        let strobes = seq.iter().filter(|op| **op == BusOp::Low(Line::Wr)).count();
        assert_eq!(strobes, 4);
        // Index bytes go out with RS low, data bytes with RS high.
        let rs_high = seq.iter().position(|op| *op == BusOp::High(Line::Rs)).unwrap();
        let third_byte = seq.iter().position(|op| *op == BusOp::Data(0xAB)).unwrap();
        assert!(rs_high < third_byte);
    }

    #[test]
    fn chip_id_is_sampled_high_byte_first() {
        let mut regs = SimRegs::new();
        let mut delay = RecordingDelay::default();
        regs.script(pin_reg(Port::D), [0xFF00_0089, 0x0000_0030]);
        let id = I80Gpio::new(&mut regs, &mut delay, PINS).run(&chip_id_read());
        assert_eq!(id, 0x8930);
    }

    #[test]
    fn full_bring_up() {
        let mut regs = SimRegs::new();
        let mut delay = RecordingDelay::default();
        regs.script(pin_reg(Port::D), [0x82, 0x30]);
        let id = init_uc8230(&mut regs, &mut delay, PINS);
        assert_eq!(id, 0x8230);

        // Reset pulse, table delays and the RS restore.
        let long: Vec<u32> = delay.waits.iter().copied().filter(|&w| w >= 1000).collect();
        assert_eq!(long, vec![10_000, 100_000, 10_000, 200_000, 10_000]);

        let wr_low = regs.writes_of(port_reg(Port::D, 0x18)).iter().filter(|&&m| m == PINS.wr.mask()).count();
        let table_writes = PanelTable::new(UC8230_INIT).filter(|op| matches!(op, PanelOp::Write { .. })).count();
        assert_eq!(wr_low, 2 + table_writes * 4 + 2 + CLEAR_STROBES);

        // CS released last.
        assert_eq!(regs.log().last(), Some(&(port_reg(Port::C, 0x14), PINS.cs.mask())));
    }
}
