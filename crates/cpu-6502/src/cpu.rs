//! 6502 interpreter core.
//!
//! The program counter follows the interpreter's internal convention of
//! pointing one byte *before* the next opcode; `emulate()` fetches from
//! `pc + 1`. Snapshots capture the raw fields, so the convention is part
//! of the state format.

use nes_core::{Bus, Irq};

use crate::opcodes::{
    self, ADDR_ABS, ADDR_ABSX, ADDR_ABSY, ADDR_ACC, ADDR_IMM, ADDR_IMP, ADDR_INDABS,
    ADDR_POSTIDXIND, ADDR_PREIDXIND, ADDR_REL, ADDR_ZP, ADDR_ZPX, ADDR_ZPY,
};

/// The 2A03's 6502 core (no decimal mode in hardware, but the D flag is
/// still tracked for status pushes).
#[derive(Debug, Clone)]
pub struct Cpu {
    /// Accumulator.
    pub a: u8,
    /// X index register.
    pub x: u8,
    /// Y index register.
    pub y: u8,
    /// Stack pointer, kept with the $0100 page base folded in.
    pub sp: u16,
    /// Program counter, pointing one byte before the next opcode.
    pub pc: u16,

    /// Carry flag.
    pub carry: bool,
    /// Zero flag.
    pub zero: bool,
    /// Interrupt disable flag.
    pub interrupt_disable: bool,
    /// Decimal flag (ignored by arithmetic, visible in status).
    pub decimal: bool,
    /// Break flag as it would appear in a status push.
    pub brk_flag: bool,
    /// Bit 5, always pushed as set.
    pub notused: bool,
    /// Overflow flag.
    pub overflow: bool,
    /// Negative flag.
    pub sign: bool,

    /// DMA stall cycles still owed before the next instruction.
    pub cycles_to_halt: u32,

    /// Latched interrupt request, dispatched before the next instruction.
    pub irq_requested: Option<Irq>,

    /// Interrupt-disable value staged during dispatch.
    interrupt_disable_new: bool,
    /// Break-flag value staged during dispatch.
    brk_new: bool,

    /// Set when an unassigned opcode is hit; the machine stops stepping.
    pub halt_message: Option<String>,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Create a CPU in power-on state.
    #[must_use]
    pub fn new() -> Self {
        let mut cpu = Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0x01FF,
            pc: 0x8000 - 1,
            carry: false,
            zero: false,
            interrupt_disable: true,
            decimal: false,
            brk_flag: true,
            notused: true,
            overflow: false,
            sign: false,
            cycles_to_halt: 0,
            irq_requested: None,
            interrupt_disable_new: true,
            brk_new: true,
            halt_message: None,
        };
        cpu.reset();
        cpu
    }

    /// Reset registers and flags to power-on values.
    pub fn reset(&mut self) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0x01FF;
        self.pc = 0x8000 - 1;

        self.carry = false;
        self.decimal = false;
        self.interrupt_disable = true;
        self.interrupt_disable_new = true;
        self.overflow = false;
        self.sign = false;
        self.zero = false;
        self.notused = true;
        self.brk_flag = true;
        self.brk_new = true;

        self.cycles_to_halt = 0;
        self.irq_requested = None;
        self.halt_message = None;
    }

    /// Whether the CPU hit an unassigned opcode and stopped.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halt_message.is_some()
    }

    /// Latch an interrupt request. A maskable IRQ never replaces a
    /// request that is already pending.
    pub fn request_irq(&mut self, kind: Irq) {
        if self.irq_requested.is_some() && kind == Irq::Normal {
            return;
        }
        self.irq_requested = Some(kind);
    }

    /// Add DMA stall cycles.
    pub fn halt_cycles(&mut self, cycles: u32) {
        self.cycles_to_halt += cycles;
    }

    /// Pack the flags into a status byte. The B and unused bits reflect
    /// the current flag values rather than being forced.
    #[must_use]
    pub fn status_byte(&self) -> u8 {
        u8::from(self.carry)
            | u8::from(self.zero) << 1
            | u8::from(self.interrupt_disable) << 2
            | u8::from(self.decimal) << 3
            | u8::from(self.brk_flag) << 4
            | u8::from(self.notused) << 5
            | u8::from(self.overflow) << 6
            | u8::from(self.sign) << 7
    }

    /// Unpack a status byte into the flags.
    pub fn set_status_byte(&mut self, st: u8) {
        self.carry = st & 1 != 0;
        self.zero = st >> 1 & 1 != 0;
        self.interrupt_disable = st >> 2 & 1 != 0;
        self.decimal = st >> 3 & 1 != 0;
        self.brk_flag = st >> 4 & 1 != 0;
        self.notused = st >> 5 & 1 != 0;
        self.overflow = st >> 6 & 1 != 0;
        self.sign = st >> 7 & 1 != 0;
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        bus.cpu_write(self.sp, value);
        self.sp = self.sp.wrapping_sub(1);
        self.sp = 0x0100 | (self.sp & 0xFF);
    }

    fn pull<B: Bus>(&mut self, bus: &mut B) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.sp = 0x0100 | (self.sp & 0xFF);
        bus.cpu_read(self.sp)
    }

    fn stack_wrap(&mut self) {
        self.sp = 0x0100 | (self.sp & 0xFF);
    }

    fn do_irq<B: Bus>(&mut self, bus: &mut B, status: u8) {
        self.pc = self.pc.wrapping_add(1);
        self.push(bus, (self.pc >> 8) as u8);
        self.push(bus, (self.pc & 0xFF) as u8);
        self.push(bus, status);
        self.interrupt_disable_new = true;
        self.brk_new = false;
        self.pc = bus.cpu_read_word(0xFFFE).wrapping_sub(1);
    }

    fn do_nmi<B: Bus>(&mut self, bus: &mut B, status: u8) {
        // Only fires when VBlank NMIs are enabled in PPUCTRL.
        if bus.cpu_read(0x2000) & 0x80 == 0 {
            return;
        }
        self.pc = self.pc.wrapping_add(1);
        self.push(bus, (self.pc >> 8) as u8);
        self.push(bus, (self.pc & 0xFF) as u8);
        self.push(bus, status);
        self.pc = bus.cpu_read_word(0xFFFA).wrapping_sub(1);
    }

    fn do_reset_interrupt<B: Bus>(&mut self, bus: &mut B) {
        self.pc = bus.cpu_read_word(0xFFFC).wrapping_sub(1);
    }

    /// Execute one instruction (dispatching any pending interrupt first)
    /// and return the cycles consumed.
    pub fn emulate<B: Bus>(&mut self, bus: &mut B) -> u32 {
        if let Some(kind) = self.irq_requested.take() {
            let status = self.status_byte();
            self.interrupt_disable_new = self.interrupt_disable;
            match kind {
                Irq::Normal => {
                    if !self.interrupt_disable {
                        self.do_irq(bus, status);
                    }
                }
                Irq::NonMaskable => self.do_nmi(bus, status),
                Irq::Reset => self.do_reset_interrupt(bus),
            }
            self.interrupt_disable = self.interrupt_disable_new;
            self.brk_flag = self.brk_new;
        }

        let opcode = bus.cpu_read(self.pc.wrapping_add(1));
        let entry = opcodes::OPDATA[opcode as usize];
        let mut cycle_count = opcodes::cycles(entry);
        let mut cycle_add: u32 = 0;

        let addr_mode = opcodes::mode(entry);
        let opaddr = self.pc;
        self.pc = self.pc.wrapping_add(opcodes::size(entry));

        let mut addr: u16 = 0;
        match addr_mode {
            ADDR_ZP => {
                addr = u16::from(bus.cpu_read(opaddr.wrapping_add(2)));
            }
            ADDR_REL => {
                let offset = u16::from(bus.cpu_read(opaddr.wrapping_add(2)));
                addr = if offset < 0x80 {
                    self.pc.wrapping_add(offset)
                } else {
                    self.pc.wrapping_add(offset).wrapping_sub(256)
                };
            }
            ADDR_IMP => {}
            ADDR_ABS => {
                addr = bus.cpu_read_word(opaddr.wrapping_add(2));
            }
            ADDR_ACC => {
                addr = u16::from(self.a);
            }
            ADDR_IMM => {
                addr = self.pc;
            }
            ADDR_ZPX => {
                addr = u16::from(bus.cpu_read(opaddr.wrapping_add(2)).wrapping_add(self.x));
            }
            ADDR_ZPY => {
                addr = u16::from(bus.cpu_read(opaddr.wrapping_add(2)).wrapping_add(self.y));
            }
            ADDR_ABSX => {
                let base = bus.cpu_read_word(opaddr.wrapping_add(2));
                addr = base.wrapping_add(u16::from(self.x));
                if base & 0xFF00 != addr & 0xFF00 {
                    cycle_add = 1;
                }
            }
            ADDR_ABSY => {
                let base = bus.cpu_read_word(opaddr.wrapping_add(2));
                addr = base.wrapping_add(u16::from(self.y));
                if base & 0xFF00 != addr & 0xFF00 {
                    cycle_add = 1;
                }
            }
            ADDR_PREIDXIND => {
                let base = u16::from(bus.cpu_read(opaddr.wrapping_add(2)));
                if base & 0xFF00 != base.wrapping_add(u16::from(self.x)) & 0xFF00 {
                    cycle_add = 1;
                }
                let ptr = base.wrapping_add(u16::from(self.x)) & 0xFF;
                addr = bus.cpu_read_word(ptr);
            }
            ADDR_POSTIDXIND => {
                let ptr = u16::from(bus.cpu_read(opaddr.wrapping_add(2)));
                let base = bus.cpu_read_word(ptr);
                addr = base.wrapping_add(u16::from(self.y));
                if base & 0xFF00 != addr & 0xFF00 {
                    cycle_add = 1;
                }
            }
            ADDR_INDABS => {
                // The 6502's pointer fetch never crosses a page: the
                // high byte comes from the same page, wrapped.
                let base = bus.cpu_read_word(opaddr.wrapping_add(2));
                let lo = u16::from(bus.cpu_read(base));
                let hi_addr = (base & 0xFF00) | (base.wrapping_add(1) & 0xFF);
                let hi = u16::from(bus.cpu_read(hi_addr));
                addr = lo | (hi << 8);
            }
            _ => {}
        }

        match opcodes::kind(entry) {
            opcodes::INS_ADC => {
                let value = bus.cpu_read(addr);
                let temp = u16::from(self.a) + u16::from(value) + u16::from(self.carry);
                self.overflow =
                    (self.a ^ value) & 0x80 == 0 && (u16::from(self.a) ^ temp) & 0x80 != 0;
                self.carry = temp > 255;
                self.sign = temp >> 7 & 1 != 0;
                self.zero = temp & 0xFF == 0;
                self.a = (temp & 0xFF) as u8;
                cycle_count += cycle_add;
            }
            opcodes::INS_AND => {
                self.a &= bus.cpu_read(addr);
                self.sign = self.a & 0x80 != 0;
                self.zero = self.a == 0;
                if addr_mode != ADDR_POSTIDXIND {
                    cycle_count += cycle_add;
                }
            }
            opcodes::INS_ASL => {
                if addr_mode == ADDR_ACC {
                    self.carry = self.a & 0x80 != 0;
                    self.a <<= 1;
                    self.sign = self.a & 0x80 != 0;
                    self.zero = self.a == 0;
                } else {
                    let mut temp = bus.cpu_read(addr);
                    self.carry = temp & 0x80 != 0;
                    temp <<= 1;
                    self.sign = temp & 0x80 != 0;
                    self.zero = temp == 0;
                    bus.cpu_write(addr, temp);
                }
            }
            opcodes::INS_BCC => {
                if !self.carry {
                    cycle_count += if opaddr & 0xFF00 == addr & 0xFF00 { 1 } else { 2 };
                    self.pc = addr;
                }
            }
            opcodes::INS_BCS => {
                if self.carry {
                    cycle_count += if opaddr & 0xFF00 == addr & 0xFF00 { 1 } else { 2 };
                    self.pc = addr;
                }
            }
            opcodes::INS_BEQ => {
                if self.zero {
                    cycle_count += if opaddr & 0xFF00 == addr & 0xFF00 { 1 } else { 2 };
                    self.pc = addr;
                }
            }
            opcodes::INS_BIT => {
                let value = bus.cpu_read(addr);
                self.sign = value & 0x80 != 0;
                self.overflow = value & 0x40 != 0;
                self.zero = value & self.a == 0;
            }
            opcodes::INS_BMI => {
                // BMI never pays the page-cross penalty.
                if self.sign {
                    cycle_count += 1;
                    self.pc = addr;
                }
            }
            opcodes::INS_BNE => {
                if !self.zero {
                    cycle_count += if opaddr & 0xFF00 == addr & 0xFF00 { 1 } else { 2 };
                    self.pc = addr;
                }
            }
            opcodes::INS_BPL => {
                if !self.sign {
                    cycle_count += if opaddr & 0xFF00 == addr & 0xFF00 { 1 } else { 2 };
                    self.pc = addr;
                }
            }
            opcodes::INS_BRK => {
                self.pc = self.pc.wrapping_add(2);
                self.push(bus, (self.pc >> 8) as u8);
                self.push(bus, (self.pc & 0xFF) as u8);
                self.brk_flag = true;
                let status = self.status_byte();
                self.push(bus, status);
                self.interrupt_disable = true;
                self.pc = bus.cpu_read_word(0xFFFE).wrapping_sub(1);
            }
            opcodes::INS_BVC => {
                if !self.overflow {
                    cycle_count += if opaddr & 0xFF00 == addr & 0xFF00 { 1 } else { 2 };
                    self.pc = addr;
                }
            }
            opcodes::INS_BVS => {
                if self.overflow {
                    cycle_count += if opaddr & 0xFF00 == addr & 0xFF00 { 1 } else { 2 };
                    self.pc = addr;
                }
            }
            opcodes::INS_CLC => self.carry = false,
            opcodes::INS_CLD => self.decimal = false,
            opcodes::INS_CLI => self.interrupt_disable = false,
            opcodes::INS_CLV => self.overflow = false,
            opcodes::INS_CMP => {
                let temp = i32::from(self.a) - i32::from(bus.cpu_read(addr));
                self.carry = temp >= 0;
                self.sign = temp >> 7 & 1 != 0;
                self.zero = temp & 0xFF == 0;
                cycle_count += cycle_add;
            }
            opcodes::INS_CPX => {
                let temp = i32::from(self.x) - i32::from(bus.cpu_read(addr));
                self.carry = temp >= 0;
                self.sign = temp >> 7 & 1 != 0;
                self.zero = temp & 0xFF == 0;
            }
            opcodes::INS_CPY => {
                let temp = i32::from(self.y) - i32::from(bus.cpu_read(addr));
                self.carry = temp >= 0;
                self.sign = temp >> 7 & 1 != 0;
                self.zero = temp & 0xFF == 0;
            }
            opcodes::INS_DEC => {
                let temp = bus.cpu_read(addr).wrapping_sub(1);
                self.sign = temp & 0x80 != 0;
                self.zero = temp == 0;
                bus.cpu_write(addr, temp);
            }
            opcodes::INS_DEX => {
                self.x = self.x.wrapping_sub(1);
                self.sign = self.x & 0x80 != 0;
                self.zero = self.x == 0;
            }
            opcodes::INS_DEY => {
                self.y = self.y.wrapping_sub(1);
                self.sign = self.y & 0x80 != 0;
                self.zero = self.y == 0;
            }
            opcodes::INS_EOR => {
                self.a ^= bus.cpu_read(addr);
                self.sign = self.a & 0x80 != 0;
                self.zero = self.a == 0;
                cycle_count += cycle_add;
            }
            opcodes::INS_INC => {
                let temp = bus.cpu_read(addr).wrapping_add(1);
                self.sign = temp & 0x80 != 0;
                self.zero = temp == 0;
                bus.cpu_write(addr, temp);
            }
            opcodes::INS_INX => {
                self.x = self.x.wrapping_add(1);
                self.sign = self.x & 0x80 != 0;
                self.zero = self.x == 0;
            }
            opcodes::INS_INY => {
                self.y = self.y.wrapping_add(1);
                self.sign = self.y & 0x80 != 0;
                self.zero = self.y == 0;
            }
            opcodes::INS_JMP => {
                self.pc = addr.wrapping_sub(1);
            }
            opcodes::INS_JSR => {
                self.push(bus, (self.pc >> 8) as u8);
                self.push(bus, (self.pc & 0xFF) as u8);
                self.pc = addr.wrapping_sub(1);
            }
            opcodes::INS_LDA => {
                self.a = bus.cpu_read(addr);
                self.sign = self.a & 0x80 != 0;
                self.zero = self.a == 0;
                cycle_count += cycle_add;
            }
            opcodes::INS_LDX => {
                self.x = bus.cpu_read(addr);
                self.sign = self.x & 0x80 != 0;
                self.zero = self.x == 0;
                cycle_count += cycle_add;
            }
            opcodes::INS_LDY => {
                self.y = bus.cpu_read(addr);
                self.sign = self.y & 0x80 != 0;
                self.zero = self.y == 0;
                cycle_count += cycle_add;
            }
            opcodes::INS_LSR => {
                let temp;
                if addr_mode == ADDR_ACC {
                    self.carry = self.a & 1 != 0;
                    self.a >>= 1;
                    temp = self.a;
                } else {
                    let mut value = bus.cpu_read(addr);
                    self.carry = value & 1 != 0;
                    value >>= 1;
                    bus.cpu_write(addr, value);
                    temp = value;
                }
                self.sign = false;
                self.zero = temp == 0;
            }
            opcodes::INS_NOP => {}
            opcodes::INS_ORA => {
                self.a |= bus.cpu_read(addr);
                self.sign = self.a & 0x80 != 0;
                self.zero = self.a == 0;
                if addr_mode != ADDR_POSTIDXIND {
                    cycle_count += cycle_add;
                }
            }
            opcodes::INS_PHA => {
                let a = self.a;
                self.push(bus, a);
            }
            opcodes::INS_PHP => {
                self.brk_flag = true;
                let status = self.status_byte();
                self.push(bus, status);
            }
            opcodes::INS_PLA => {
                self.a = self.pull(bus);
                self.sign = self.a & 0x80 != 0;
                self.zero = self.a == 0;
            }
            opcodes::INS_PLP => {
                let st = self.pull(bus);
                self.set_status_byte(st);
                self.notused = true;
            }
            opcodes::INS_ROL => {
                let temp;
                let add = u8::from(self.carry);
                if addr_mode == ADDR_ACC {
                    self.carry = self.a & 0x80 != 0;
                    self.a = (self.a << 1).wrapping_add(add);
                    temp = self.a;
                } else {
                    let value = bus.cpu_read(addr);
                    self.carry = value & 0x80 != 0;
                    temp = (value << 1).wrapping_add(add);
                    bus.cpu_write(addr, temp);
                }
                self.sign = temp & 0x80 != 0;
                self.zero = temp == 0;
            }
            opcodes::INS_ROR => {
                let temp;
                let add = u8::from(self.carry) << 7;
                if addr_mode == ADDR_ACC {
                    self.carry = self.a & 1 != 0;
                    self.a = (self.a >> 1).wrapping_add(add);
                    temp = self.a;
                } else {
                    let value = bus.cpu_read(addr);
                    self.carry = value & 1 != 0;
                    temp = (value >> 1).wrapping_add(add);
                    bus.cpu_write(addr, temp);
                }
                self.sign = temp & 0x80 != 0;
                self.zero = temp == 0;
            }
            opcodes::INS_RTI => {
                let st = self.pull(bus);
                self.set_status_byte(st);
                let lo = u16::from(self.pull(bus));
                let hi = u16::from(self.pull(bus));
                self.pc = lo | (hi << 8);
                if self.pc == 0xFFFF {
                    return cycle_count;
                }
                self.pc = self.pc.wrapping_sub(1);
                self.notused = true;
            }
            opcodes::INS_RTS => {
                let lo = u16::from(self.pull(bus));
                let hi = u16::from(self.pull(bus));
                self.pc = lo | (hi << 8);
                if self.pc == 0xFFFF {
                    return cycle_count;
                }
            }
            opcodes::INS_SBC => {
                let value = bus.cpu_read(addr);
                let temp =
                    i32::from(self.a) - i32::from(value) - i32::from(!self.carry);
                self.sign = temp >> 7 & 1 != 0;
                self.zero = temp & 0xFF == 0;
                self.overflow = (i32::from(self.a) ^ temp) & 0x80 != 0
                    && (self.a ^ value) & 0x80 != 0;
                self.carry = temp >= 0;
                self.a = (temp & 0xFF) as u8;
                if addr_mode != ADDR_POSTIDXIND {
                    cycle_count += cycle_add;
                }
            }
            opcodes::INS_SEC => self.carry = true,
            opcodes::INS_SED => self.decimal = true,
            opcodes::INS_SEI => self.interrupt_disable = true,
            opcodes::INS_STA => {
                bus.cpu_write(addr, self.a);
            }
            opcodes::INS_STX => {
                bus.cpu_write(addr, self.x);
            }
            opcodes::INS_STY => {
                bus.cpu_write(addr, self.y);
            }
            opcodes::INS_TAX => {
                self.x = self.a;
                self.sign = self.a & 0x80 != 0;
                self.zero = self.a == 0;
            }
            opcodes::INS_TAY => {
                self.y = self.a;
                self.sign = self.a & 0x80 != 0;
                self.zero = self.a == 0;
            }
            opcodes::INS_TSX => {
                self.x = (self.sp.wrapping_sub(0x0100) & 0xFF) as u8;
                self.sign = self.sp >> 7 & 1 != 0;
                self.zero = self.x == 0;
            }
            opcodes::INS_TXA => {
                self.a = self.x;
                self.sign = self.x & 0x80 != 0;
                self.zero = self.x == 0;
            }
            opcodes::INS_TXS => {
                self.sp = u16::from(self.x) + 0x0100;
                self.stack_wrap();
            }
            opcodes::INS_TYA => {
                self.a = self.y;
                self.sign = self.y & 0x80 != 0;
                self.zero = self.y == 0;
            }
            opcodes::INS_ALR => {
                let temp = self.a & bus.cpu_read(addr);
                self.carry = temp & 1 != 0;
                self.a = temp >> 1;
                self.zero = self.a == 0;
                self.sign = false;
            }
            opcodes::INS_ANC => {
                self.a &= bus.cpu_read(addr);
                self.zero = self.a == 0;
                self.carry = self.a & 0x80 != 0;
                self.sign = self.carry;
            }
            opcodes::INS_ARR => {
                let temp = self.a & bus.cpu_read(addr);
                self.a = (temp >> 1).wrapping_add(u8::from(self.carry) << 7);
                self.zero = self.a == 0;
                self.sign = self.carry;
                self.carry = temp & 0x80 != 0;
                self.overflow = (temp >> 7 ^ temp >> 6) & 1 != 0;
            }
            opcodes::INS_AXS => {
                let value = bus.cpu_read(addr);
                let temp = i32::from(self.x & self.a) - i32::from(value);
                self.sign = temp >> 7 & 1 != 0;
                self.zero = temp & 0xFF == 0;
                self.overflow = (i32::from(self.x) ^ temp) & 0x80 != 0
                    && (self.x ^ value) & 0x80 != 0;
                self.carry = temp >= 0;
                self.x = (temp & 0xFF) as u8;
            }
            opcodes::INS_LAX => {
                let value = bus.cpu_read(addr);
                self.a = value;
                self.x = value;
                self.zero = value == 0;
                self.sign = value & 0x80 != 0;
                cycle_count += cycle_add;
            }
            opcodes::INS_SAX => {
                bus.cpu_write(addr, self.a & self.x);
            }
            opcodes::INS_DCP => {
                let temp = bus.cpu_read(addr).wrapping_sub(1);
                bus.cpu_write(addr, temp);
                let diff = i32::from(self.a) - i32::from(temp);
                self.carry = diff >= 0;
                self.sign = diff >> 7 & 1 != 0;
                self.zero = diff & 0xFF == 0;
                if addr_mode != ADDR_POSTIDXIND {
                    cycle_count += cycle_add;
                }
            }
            opcodes::INS_ISC => {
                let value = bus.cpu_read(addr).wrapping_add(1);
                bus.cpu_write(addr, value);
                let temp =
                    i32::from(self.a) - i32::from(value) - i32::from(!self.carry);
                self.sign = temp >> 7 & 1 != 0;
                self.zero = temp & 0xFF == 0;
                self.overflow = (i32::from(self.a) ^ temp) & 0x80 != 0
                    && (self.a ^ value) & 0x80 != 0;
                self.carry = temp >= 0;
                self.a = (temp & 0xFF) as u8;
                if addr_mode != ADDR_POSTIDXIND {
                    cycle_count += cycle_add;
                }
            }
            opcodes::INS_RLA => {
                let value = bus.cpu_read(addr);
                let add = u8::from(self.carry);
                self.carry = value & 0x80 != 0;
                let temp = (value << 1).wrapping_add(add);
                bus.cpu_write(addr, temp);
                self.a &= temp;
                self.sign = self.a & 0x80 != 0;
                self.zero = self.a == 0;
                if addr_mode != ADDR_POSTIDXIND {
                    cycle_count += cycle_add;
                }
            }
            opcodes::INS_RRA => {
                let value = bus.cpu_read(addr);
                let add = u8::from(self.carry) << 7;
                self.carry = value & 1 != 0;
                let rotated = (value >> 1).wrapping_add(add);
                bus.cpu_write(addr, rotated);
                let temp =
                    u16::from(self.a) + u16::from(rotated) + u16::from(self.carry);
                self.overflow =
                    (self.a ^ rotated) & 0x80 == 0 && (u16::from(self.a) ^ temp) & 0x80 != 0;
                self.carry = temp > 255;
                self.sign = temp >> 7 & 1 != 0;
                self.zero = temp & 0xFF == 0;
                self.a = (temp & 0xFF) as u8;
                if addr_mode != ADDR_POSTIDXIND {
                    cycle_count += cycle_add;
                }
            }
            opcodes::INS_SLO => {
                let value = bus.cpu_read(addr);
                self.carry = value & 0x80 != 0;
                let temp = value << 1;
                bus.cpu_write(addr, temp);
                self.a |= temp;
                self.sign = self.a & 0x80 != 0;
                self.zero = self.a == 0;
                if addr_mode != ADDR_POSTIDXIND {
                    cycle_count += cycle_add;
                }
            }
            opcodes::INS_SRE => {
                let value = bus.cpu_read(addr);
                self.carry = value & 1 != 0;
                let temp = value >> 1;
                bus.cpu_write(addr, temp);
                self.a ^= temp;
                self.sign = self.a & 0x80 != 0;
                self.zero = self.a == 0;
                if addr_mode != ADDR_POSTIDXIND {
                    cycle_count += cycle_add;
                }
            }
            opcodes::INS_SKB => {}
            opcodes::INS_IGN => {
                // Read and discard. The access still has bus side effects.
                let _ = bus.cpu_read(addr);
                if addr_mode != ADDR_POSTIDXIND {
                    cycle_count += cycle_add;
                }
            }
            _ => {
                self.halt_message = Some(format!("invalid opcode at address ${opaddr:04x}"));
            }
        }

        cycle_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nes_core::RamBus;

    fn make_cpu() -> (Cpu, RamBus) {
        let mut cpu = Cpu::new();
        let bus = RamBus::new();
        // Execute from $8000 like a cartridge.
        cpu.pc = 0x8000 - 1;
        (cpu, bus)
    }

    /// Write a program at $8000 and point the CPU at it.
    fn load_program(bus: &mut RamBus, program: &[u8]) {
        bus.mem[0x8000..0x8000 + program.len()].copy_from_slice(program);
    }

    #[test]
    fn power_on_state() {
        let cpu = Cpu::new();
        assert_eq!(cpu.sp, 0x01FF);
        assert_eq!(cpu.pc, 0x7FFF);
        assert!(cpu.interrupt_disable);
        assert!(!cpu.zero);
        assert!(cpu.brk_flag);
        assert!(cpu.notused);
    }

    #[test]
    fn lda_immediate_sets_flags() {
        let (mut cpu, mut bus) = make_cpu();
        load_program(&mut bus, &[0xA9, 0x00, 0xA9, 0x80]);
        let cycles = cpu.emulate(&mut bus);
        assert_eq!(cycles, 2);
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.zero);
        assert!(!cpu.sign);
        cpu.emulate(&mut bus);
        assert_eq!(cpu.a, 0x80);
        assert!(!cpu.zero);
        assert!(cpu.sign);
    }

    #[test]
    fn adc_overflow_from_positive_wraparound() {
        let (mut cpu, mut bus) = make_cpu();
        // LDA #$7F ; CLC ; ADC #$01
        load_program(&mut bus, &[0xA9, 0x7F, 0x18, 0x69, 0x01]);
        cpu.emulate(&mut bus);
        cpu.emulate(&mut bus);
        cpu.emulate(&mut bus);
        assert_eq!(cpu.a, 0x80);
        assert!(cpu.overflow);
        assert!(cpu.sign);
        assert!(!cpu.carry);
        assert!(!cpu.zero);
    }

    #[test]
    fn sbc_borrow_clears_carry() {
        let (mut cpu, mut bus) = make_cpu();
        // LDA #$00 ; SEC ; SBC #$01 -> $FF, borrow taken
        load_program(&mut bus, &[0xA9, 0x00, 0x38, 0xE9, 0x01]);
        cpu.emulate(&mut bus);
        cpu.emulate(&mut bus);
        cpu.emulate(&mut bus);
        assert_eq!(cpu.a, 0xFF);
        assert!(!cpu.carry);
        assert!(cpu.sign);
        assert!(!cpu.overflow);
    }

    #[test]
    fn absolute_x_page_cross_costs_a_cycle() {
        let (mut cpu, mut bus) = make_cpu();
        // LDX #$01 ; LDA $80FF,X
        load_program(&mut bus, &[0xA2, 0x01, 0xBD, 0xFF, 0x80]);
        bus.mem[0x8100] = 0x42;
        cpu.emulate(&mut bus);
        let cycles = cpu.emulate(&mut bus);
        assert_eq!(cycles, 5); // 4 + page cross
        assert_eq!(cpu.a, 0x42);
    }

    #[test]
    fn sta_absolute_x_never_pays_page_cross() {
        let (mut cpu, mut bus) = make_cpu();
        // LDX #$01 ; STA $80FF,X
        load_program(&mut bus, &[0xA2, 0x01, 0x9D, 0xFF, 0x80]);
        cpu.emulate(&mut bus);
        let cycles = cpu.emulate(&mut bus);
        assert_eq!(cycles, 5);
    }

    #[test]
    fn branch_taken_same_page_costs_three() {
        let (mut cpu, mut bus) = make_cpu();
        // CLC ; BCC +2
        load_program(&mut bus, &[0x18, 0x90, 0x02]);
        cpu.emulate(&mut bus);
        let cycles = cpu.emulate(&mut bus);
        assert_eq!(cycles, 3);
    }

    #[test]
    fn branch_not_taken_costs_two() {
        let (mut cpu, mut bus) = make_cpu();
        // SEC ; BCC +2
        load_program(&mut bus, &[0x38, 0x90, 0x02]);
        cpu.emulate(&mut bus);
        let cycles = cpu.emulate(&mut bus);
        assert_eq!(cycles, 2);
    }

    #[test]
    fn branch_page_cross_costs_four() {
        let (mut cpu, mut bus) = make_cpu();
        // Branch backward across the page boundary into $7Fxx.
        load_program(&mut bus, &[0x18, 0x90, 0xFB]);
        cpu.emulate(&mut bus);
        let cycles = cpu.emulate(&mut bus);
        assert_eq!(cycles, 4);
    }

    #[test]
    fn stack_wraps_within_page_one() {
        let (mut cpu, mut bus) = make_cpu();
        // 256 pushes wrap the pointer back to where it started.
        let start = cpu.sp;
        for _ in 0..256 {
            cpu.push(&mut bus, 0xAA);
        }
        assert_eq!(cpu.sp, start);
        assert_eq!(cpu.sp & 0xFF00, 0x0100);
    }

    #[test]
    fn php_sets_break_bit() {
        let (mut cpu, mut bus) = make_cpu();
        load_program(&mut bus, &[0x08]);
        cpu.brk_flag = false;
        cpu.emulate(&mut bus);
        let pushed = bus.mem[0x01FF];
        assert_eq!(pushed & 0x10, 0x10);
        assert!(cpu.brk_flag);
    }

    #[test]
    fn jsr_rts_round_trip() {
        let (mut cpu, mut bus) = make_cpu();
        // JSR $8010 ... at $8010: RTS
        load_program(&mut bus, &[0x20, 0x10, 0x80]);
        bus.mem[0x8010] = 0x60;
        bus.mem[0x8003] = 0xEA; // NOP after the call
        cpu.emulate(&mut bus); // JSR
        assert_eq!(cpu.pc, 0x8010 - 1);
        cpu.emulate(&mut bus); // RTS
        assert_eq!(cpu.pc, 0x8002);
        let cycles = cpu.emulate(&mut bus); // NOP at $8003
        assert_eq!(cycles, 2);
    }

    #[test]
    fn jmp_indirect_wraps_pointer_within_page() {
        let (mut cpu, mut bus) = make_cpu();
        // JMP ($10FF): high byte fetched from $1000, not $1100.
        load_program(&mut bus, &[0x6C, 0xFF, 0x10]);
        bus.mem[0x10FF] = 0x34;
        bus.mem[0x1000] = 0x12;
        cpu.emulate(&mut bus);
        assert_eq!(cpu.pc, 0x1234_u16.wrapping_sub(1));
    }

    #[test]
    fn unknown_opcode_halts_with_address() {
        let (mut cpu, mut bus) = make_cpu();
        load_program(&mut bus, &[0x02]);
        cpu.emulate(&mut bus);
        assert!(cpu.is_halted());
        let message = cpu.halt_message.as_deref().unwrap_or("");
        assert!(message.contains("$7fff"));
    }

    #[test]
    fn irq_vectors_when_interrupts_enabled() {
        let (mut cpu, mut bus) = make_cpu();
        load_program(&mut bus, &[0xEA, 0xEA]);
        bus.mem[0xFFFE] = 0x00;
        bus.mem[0xFFFF] = 0x90;
        bus.mem[0x9000] = 0xEA; // handler body
        cpu.interrupt_disable = false;
        cpu.request_irq(Irq::Normal);
        // One step dispatches the IRQ and runs the handler's first NOP.
        cpu.emulate(&mut bus);
        assert_eq!(cpu.pc, 0x9000);
        assert!(cpu.interrupt_disable);
        assert!(!cpu.brk_flag);
    }

    #[test]
    fn masked_irq_does_not_vector() {
        let (mut cpu, mut bus) = make_cpu();
        load_program(&mut bus, &[0xEA]);
        cpu.interrupt_disable = true;
        cpu.request_irq(Irq::Normal);
        cpu.emulate(&mut bus);
        assert_eq!(cpu.pc, 0x8000); // just the NOP
    }

    #[test]
    fn nmi_gated_on_ppuctrl_bit_seven() {
        let (mut cpu, mut bus) = make_cpu();
        load_program(&mut bus, &[0xEA, 0xEA]);
        bus.mem[0xFFFA] = 0x00;
        bus.mem[0xFFFB] = 0xA0;
        bus.mem[0xA000] = 0xEA; // handler body

        // NMI disabled in $2000: no vectoring, the NOP at $8000 runs.
        cpu.request_irq(Irq::NonMaskable);
        cpu.emulate(&mut bus);
        assert_eq!(cpu.pc, 0x8000);

        // Enabled: vectors through $FFFA and runs the handler's NOP.
        bus.mem[0x2000] = 0x80;
        cpu.request_irq(Irq::NonMaskable);
        cpu.emulate(&mut bus);
        assert_eq!(cpu.pc, 0xA000);
    }

    #[test]
    fn normal_irq_never_replaces_pending_nmi() {
        let mut cpu = Cpu::new();
        cpu.request_irq(Irq::NonMaskable);
        cpu.request_irq(Irq::Normal);
        assert_eq!(cpu.irq_requested, Some(Irq::NonMaskable));
        // But an NMI replaces a pending IRQ.
        cpu.request_irq(Irq::Normal);
        assert_eq!(cpu.irq_requested, Some(Irq::NonMaskable));
    }

    #[test]
    fn brk_pushes_return_address_past_padding_byte() {
        let (mut cpu, mut bus) = make_cpu();
        load_program(&mut bus, &[0x00, 0xFF]);
        bus.mem[0xFFFE] = 0x00;
        bus.mem[0xFFFF] = 0xC0;
        cpu.emulate(&mut bus);
        assert_eq!(cpu.pc, 0xC000 - 1);
        assert!(cpu.interrupt_disable);
        // Return address on the stack skips the byte after BRK.
        let lo = bus.mem[0x01FE];
        let hi = bus.mem[0x01FF];
        assert_eq!(u16::from(lo) | u16::from(hi) << 8, 0x8002);
        // Pushed status has B set.
        assert_eq!(bus.mem[0x01FD] & 0x10, 0x10);
    }

    #[test]
    fn plp_forces_unused_bit() {
        let (mut cpu, mut bus) = make_cpu();
        // PHA-style setup: push a status byte with bit 5 clear, then PLP.
        load_program(&mut bus, &[0x28]);
        bus.mem[0x01FF] = 0x00;
        cpu.sp = 0x01FE;
        cpu.emulate(&mut bus);
        assert!(cpu.notused);
    }
}
