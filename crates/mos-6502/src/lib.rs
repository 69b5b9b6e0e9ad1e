//! Cycle-stepped MOS 6502 core (NMOS variant, including illegal opcodes).
//!
//! [`Mos6502`] advances one clock cycle per [`Cpu::tick`] call and performs
//! exactly one bus access per cycle. Execution is driven by a state machine
//! keyed on the current opcode's addressing mode and a cycle index within
//! the instruction (`t`), rather than by running a whole instruction to
//! completion in one call.

pub mod decode;
pub mod execute;
pub mod flags;
mod registers;

use decode::{Access, Mode, Op, OPCODES};
use emu_core::{Bus, Cpu, Observable, Value};
pub use flags::Status;
pub use registers::Registers;

/// Which 7-cycle sequence is in flight: hardware reset/interrupt, or a
/// software `BRK`. All four share the same push/vector-fetch shape; only
/// the vector, the pushed status byte, and whether the pushes are real
/// writes (reset suppresses them) differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntKind {
    Reset,
    Nmi,
    Irq,
    Brk,
}

impl IntKind {
    const fn vectors(self) -> (u16, u16) {
        match self {
            IntKind::Reset => (0xFFFC, 0xFFFD),
            IntKind::Nmi => (0xFFFA, 0xFFFB),
            IntKind::Irq | IntKind::Brk => (0xFFFE, 0xFFFF),
        }
    }
}

const fn branch_taken(op: Op, p: Status) -> bool {
    match op {
        Op::BCC => !p.is_set(flags::C),
        Op::BCS => p.is_set(flags::C),
        Op::BNE => !p.is_set(flags::Z),
        Op::BEQ => p.is_set(flags::Z),
        Op::BPL => !p.is_set(flags::N),
        Op::BMI => p.is_set(flags::N),
        Op::BVC => !p.is_set(flags::V),
        Op::BVS => p.is_set(flags::V),
        _ => unreachable!(),
    }
}

/// A MOS 6502 (NMOS) CPU core.
pub struct Mos6502 {
    pub regs: Registers,

    /// Cycle index within the current opcode/interrupt sequence. `0` means
    /// "the next tick is an opcode fetch / interrupt-poll cycle".
    t: u8,

    opcode: u8,
    op: Op,
    mode: Mode,
    access: Access,

    // Addressing-mode scratch, reused across instructions.
    low: u8,
    high: u8,
    ptr: u8,
    addr: u16,
    base: u16,
    page_crossed: bool,
    operand: u8,
    branch_target: u16,

    int_kind: Option<IntKind>,
    halted: bool,

    irq_line: bool,
    nmi_latched: bool,
    pending_reset: bool,
}

impl Default for Mos6502 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mos6502 {
    /// Construct a CPU ready to fetch its first opcode at `regs.pc`.
    ///
    /// Unlike real hardware, this does not start in the reset sequence;
    /// callers that want the 7-cycle power-on sequence should call
    /// [`Cpu::reset`] explicitly.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            t: 0,
            opcode: 0,
            op: Op::NOP,
            mode: Mode::Implied,
            access: Access::Control,
            low: 0,
            high: 0,
            ptr: 0,
            addr: 0,
            base: 0,
            page_crossed: false,
            operand: 0,
            branch_target: 0,
            int_kind: None,
            halted: false,
            irq_line: false,
            nmi_latched: false,
            pending_reset: false,
        }
    }

    fn finish(&mut self) {
        self.t = 0;
    }

    fn begin_next<B: Bus>(&mut self, bus: &mut B) {
        if self.pending_reset {
            self.pending_reset = false;
            self.halted = false;
            self.int_kind = Some(IntKind::Reset);
            bus.read(self.regs.pc);
            self.t = 2;
            return;
        }
        if self.nmi_latched {
            self.nmi_latched = false;
            self.int_kind = Some(IntKind::Nmi);
            bus.read(self.regs.pc);
            self.t = 2;
            return;
        }
        if self.irq_line && !self.regs.p.is_set(flags::I) {
            self.int_kind = Some(IntKind::Irq);
            bus.read(self.regs.pc);
            self.t = 2;
            return;
        }

        let opcode = bus.read(self.regs.pc).value();
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.opcode = opcode;
        let decoded = OPCODES[opcode as usize];
        self.op = decoded.op;
        self.mode = decoded.mode;
        self.access = decoded.access;
        self.page_crossed = false;

        if self.op == Op::BRK {
            self.int_kind = Some(IntKind::Brk);
        }
        self.t = 2;
    }

    fn step_interrupt<B: Bus>(&mut self, bus: &mut B, kind: IntKind) {
        match self.t {
            2 => {
                if kind == IntKind::Brk {
                    // The byte after a software BRK is a padding/signature
                    // byte: read and skipped, never executed.
                    bus.read(self.regs.pc);
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                } else {
                    bus.read(self.regs.pc);
                }
                self.t = 3;
            }
            3 => {
                let addr = self.regs.push();
                if kind == IntKind::Reset {
                    bus.read(addr);
                } else {
                    bus.write(addr, (self.regs.pc >> 8) as u8);
                }
                self.t = 4;
            }
            4 => {
                let addr = self.regs.push();
                if kind == IntKind::Reset {
                    bus.read(addr);
                } else {
                    bus.write(addr, (self.regs.pc & 0xFF) as u8);
                }
                // A pending NMI can hijack an in-flight BRK/IRQ sequence at
                // this point: the pushes already under way complete, but
                // the vector fetched at the end is the NMI vector.
                if kind != IntKind::Reset && kind != IntKind::Nmi && self.nmi_latched {
                    self.nmi_latched = false;
                    self.int_kind = Some(IntKind::Nmi);
                }
                self.t = 5;
            }
            5 => {
                let kind = self.int_kind.expect("interrupt sequence in flight");
                let addr = self.regs.push();
                if kind == IntKind::Reset {
                    bus.read(addr);
                } else {
                    let byte = if kind == IntKind::Brk {
                        self.regs.p.to_pushed_byte()
                    } else {
                        self.regs.p.to_pushed_byte_interrupt()
                    };
                    bus.write(addr, byte);
                }
                self.regs.p.set(flags::I, true);
                self.t = 6;
            }
            6 => {
                let kind = self.int_kind.expect("interrupt sequence in flight");
                let (lo, _) = kind.vectors();
                self.low = bus.read(lo).value();
                self.t = 7;
            }
            7 => {
                let kind = self.int_kind.expect("interrupt sequence in flight");
                let (_, hi) = kind.vectors();
                self.high = bus.read(hi).value();
                self.regs.pc = u16::from_le_bytes([self.low, self.high]);
                self.int_kind = None;
                self.finish();
            }
            _ => unreachable!("interrupt sequence cycle {} out of range", self.t),
        }
    }

    // -- Control-access opcodes --------------------------------------

    fn step_control<B: Bus>(&mut self, bus: &mut B) {
        match self.op {
            Op::JSR => self.step_jsr(bus),
            Op::RTS => self.step_rts(bus),
            Op::RTI => self.step_rti(bus),
            Op::JMP if self.mode == Mode::Absolute => self.step_jmp_abs(bus),
            Op::JMP => self.step_jmp_indirect(bus),
            Op::PHA | Op::PHP => self.step_push(bus),
            Op::PLA | Op::PLP => self.step_pull(bus),
            Op::JAM => self.step_jam(bus),
            _ if self.mode == Mode::Accumulator => self.step_accumulator(bus),
            _ => self.step_implied(bus),
        }
    }

    fn step_implied<B: Bus>(&mut self, bus: &mut B) {
        bus.read(self.regs.pc);
        match self.op {
            Op::CLC => self.regs.p.set(flags::C, false),
            Op::SEC => self.regs.p.set(flags::C, true),
            Op::CLI => self.regs.p.set(flags::I, false),
            Op::SEI => self.regs.p.set(flags::I, true),
            Op::CLD => self.regs.p.set(flags::D, false),
            Op::SED => self.regs.p.set(flags::D, true),
            Op::CLV => self.regs.p.set(flags::V, false),
            Op::DEX => {
                self.regs.x = self.regs.x.wrapping_sub(1);
                self.regs.p.set_zn(self.regs.x);
            }
            Op::DEY => {
                self.regs.y = self.regs.y.wrapping_sub(1);
                self.regs.p.set_zn(self.regs.y);
            }
            Op::INX => {
                self.regs.x = self.regs.x.wrapping_add(1);
                self.regs.p.set_zn(self.regs.x);
            }
            Op::INY => {
                self.regs.y = self.regs.y.wrapping_add(1);
                self.regs.p.set_zn(self.regs.y);
            }
            Op::TAX => {
                self.regs.x = self.regs.a;
                self.regs.p.set_zn(self.regs.x);
            }
            Op::TAY => {
                self.regs.y = self.regs.a;
                self.regs.p.set_zn(self.regs.y);
            }
            Op::TXA => {
                self.regs.a = self.regs.x;
                self.regs.p.set_zn(self.regs.a);
            }
            Op::TYA => {
                self.regs.a = self.regs.y;
                self.regs.p.set_zn(self.regs.a);
            }
            Op::TSX => {
                self.regs.x = self.regs.s;
                self.regs.p.set_zn(self.regs.x);
            }
            Op::TXS => self.regs.s = self.regs.x,
            Op::NOP => {}
            other => unreachable!("{other:?} is not an implied-access opcode"),
        }
        self.finish();
    }

    fn step_accumulator<B: Bus>(&mut self, bus: &mut B) {
        bus.read(self.regs.pc);
        let v = self.regs.a;
        self.regs.a = match self.op {
            Op::ASL => execute::asl(&mut self.regs.p, v),
            Op::LSR => execute::lsr(&mut self.regs.p, v),
            Op::ROL => execute::rol(&mut self.regs.p, v),
            Op::ROR => execute::ror(&mut self.regs.p, v),
            other => unreachable!("{other:?} is not an accumulator opcode"),
        };
        self.finish();
    }

    fn step_jam<B: Bus>(&mut self, bus: &mut B) {
        bus.read(self.regs.pc);
        self.halted = true;
    }

    fn step_push<B: Bus>(&mut self, bus: &mut B) {
        match self.t {
            2 => {
                bus.read(self.regs.pc);
                self.t = 3;
            }
            3 => {
                let addr = self.regs.push();
                let value = if self.op == Op::PHA {
                    self.regs.a
                } else {
                    self.regs.p.to_pushed_byte()
                };
                bus.write(addr, value);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn step_pull<B: Bus>(&mut self, bus: &mut B) {
        match self.t {
            2 => {
                bus.read(self.regs.pc);
                self.t = 3;
            }
            3 => {
                bus.read(self.regs.stack_addr());
                self.t = 4;
            }
            4 => {
                let addr = self.regs.pop();
                let value = bus.read(addr).value();
                if self.op == Op::PLA {
                    self.regs.a = value;
                    self.regs.p.set_zn(value);
                } else {
                    self.regs.p = Status::from_pulled_byte(value);
                }
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn step_jsr<B: Bus>(&mut self, bus: &mut B) {
        match self.t {
            2 => {
                self.low = bus.read(self.regs.pc).value();
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.t = 3;
            }
            3 => {
                bus.read(self.regs.stack_addr());
                self.t = 4;
            }
            4 => {
                let addr = self.regs.push();
                bus.write(addr, (self.regs.pc >> 8) as u8);
                self.t = 5;
            }
            5 => {
                let addr = self.regs.push();
                bus.write(addr, (self.regs.pc & 0xFF) as u8);
                self.t = 6;
            }
            6 => {
                self.high = bus.read(self.regs.pc).value();
                self.regs.pc = u16::from_le_bytes([self.low, self.high]);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn step_rts<B: Bus>(&mut self, bus: &mut B) {
        match self.t {
            2 => {
                bus.read(self.regs.pc);
                self.t = 3;
            }
            3 => {
                bus.read(self.regs.stack_addr());
                self.t = 4;
            }
            4 => {
                let addr = self.regs.pop();
                self.low = bus.read(addr).value();
                self.t = 5;
            }
            5 => {
                let addr = self.regs.pop();
                self.high = bus.read(addr).value();
                self.regs.pc = u16::from_le_bytes([self.low, self.high]);
                self.t = 6;
            }
            6 => {
                bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn step_rti<B: Bus>(&mut self, bus: &mut B) {
        match self.t {
            2 => {
                bus.read(self.regs.pc);
                self.t = 3;
            }
            3 => {
                bus.read(self.regs.stack_addr());
                self.t = 4;
            }
            4 => {
                let addr = self.regs.pop();
                let value = bus.read(addr).value();
                self.regs.p = Status::from_pulled_byte(value);
                self.t = 5;
            }
            5 => {
                let addr = self.regs.pop();
                self.low = bus.read(addr).value();
                self.t = 6;
            }
            6 => {
                let addr = self.regs.pop();
                self.high = bus.read(addr).value();
                self.regs.pc = u16::from_le_bytes([self.low, self.high]);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn step_jmp_abs<B: Bus>(&mut self, bus: &mut B) {
        match self.t {
            2 => {
                self.low = bus.read(self.regs.pc).value();
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.t = 3;
            }
            3 => {
                self.high = bus.read(self.regs.pc).value();
                self.regs.pc = u16::from_le_bytes([self.low, self.high]);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn step_jmp_indirect<B: Bus>(&mut self, bus: &mut B) {
        match self.t {
            2 => {
                self.low = bus.read(self.regs.pc).value();
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.t = 3;
            }
            3 => {
                self.high = bus.read(self.regs.pc).value();
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.addr = u16::from_le_bytes([self.low, self.high]);
                self.t = 4;
            }
            4 => {
                self.low = bus.read(self.addr).value();
                self.t = 5;
            }
            5 => {
                // Famous page-wrap bug: the high-byte fetch never carries
                // into the pointer's high byte.
                let hi_addr = (self.addr & 0xFF00) | u16::from((self.addr as u8).wrapping_add(1));
                self.high = bus.read(hi_addr).value();
                self.regs.pc = u16::from_le_bytes([self.low, self.high]);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn step_branch<B: Bus>(&mut self, bus: &mut B) {
        match self.t {
            2 => {
                let offset = bus.read(self.regs.pc).value() as i8;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                if branch_taken(self.op, self.regs.p) {
                    self.branch_target = self.regs.pc.wrapping_add(offset as i16 as u16);
                    self.t = 3;
                } else {
                    self.finish();
                }
            }
            3 => {
                bus.read(self.regs.pc);
                let partial = (self.regs.pc & 0xFF00) | (self.branch_target & 0x00FF);
                if partial == self.branch_target {
                    self.regs.pc = self.branch_target;
                    self.finish();
                } else {
                    self.regs.pc = partial;
                    self.t = 4;
                }
            }
            4 => {
                bus.read(self.regs.pc);
                self.regs.pc = self.branch_target;
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    // -- Read-access addressing ---------------------------------------

    fn step_read<B: Bus>(&mut self, bus: &mut B) {
        match self.mode {
            Mode::Immediate => {
                let v = bus.read(self.regs.pc).value();
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.do_read_op(v);
                self.finish();
            }
            Mode::ZeroPage => match self.t {
                2 => {
                    self.addr = u16::from(bus.read(self.regs.pc).value());
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    let v = bus.read(self.addr).value();
                    self.do_read_op(v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::ZeroPageX | Mode::ZeroPageY => match self.t {
                2 => {
                    self.ptr = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    bus.read(u16::from(self.ptr));
                    let index = self.index_reg();
                    self.ptr = self.ptr.wrapping_add(index);
                    self.t = 4;
                }
                4 => {
                    let v = bus.read(u16::from(self.ptr)).value();
                    self.do_read_op(v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::Absolute => match self.t {
                2 => {
                    self.low = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    self.high = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.addr = u16::from_le_bytes([self.low, self.high]);
                    self.t = 4;
                }
                4 => {
                    let v = bus.read(self.addr).value();
                    self.do_read_op(v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::AbsoluteX | Mode::AbsoluteY => match self.t {
                2 => {
                    self.low = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    self.high = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.index_absolute();
                    self.t = 4;
                }
                4 => {
                    let wrong = (self.base & 0xFF00) | (self.addr & 0x00FF);
                    if self.page_crossed {
                        bus.read(wrong);
                        self.t = 5;
                    } else {
                        let v = bus.read(wrong).value();
                        self.do_read_op(v);
                        self.finish();
                    }
                }
                5 => {
                    let v = bus.read(self.addr).value();
                    self.do_read_op(v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::IndirectX => match self.t {
                2 => {
                    self.ptr = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    bus.read(u16::from(self.ptr));
                    self.ptr = self.ptr.wrapping_add(self.regs.x);
                    self.t = 4;
                }
                4 => {
                    self.low = bus.read(u16::from(self.ptr)).value();
                    self.t = 5;
                }
                5 => {
                    self.high = bus.read(u16::from(self.ptr.wrapping_add(1))).value();
                    self.addr = u16::from_le_bytes([self.low, self.high]);
                    self.t = 6;
                }
                6 => {
                    let v = bus.read(self.addr).value();
                    self.do_read_op(v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::IndirectY => match self.t {
                2 => {
                    self.ptr = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    self.low = bus.read(u16::from(self.ptr)).value();
                    self.t = 4;
                }
                4 => {
                    self.high = bus.read(u16::from(self.ptr.wrapping_add(1))).value();
                    self.index_indirect_y();
                    self.t = 5;
                }
                5 => {
                    let wrong = (self.base & 0xFF00) | (self.addr & 0x00FF);
                    if self.page_crossed {
                        bus.read(wrong);
                        self.t = 6;
                    } else {
                        let v = bus.read(wrong).value();
                        self.do_read_op(v);
                        self.finish();
                    }
                }
                6 => {
                    let v = bus.read(self.addr).value();
                    self.do_read_op(v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            other => unreachable!("mode {other:?} is not valid for Read access"),
        }
    }

    fn index_reg(&self) -> u8 {
        if self.mode == Mode::ZeroPageX || self.mode == Mode::AbsoluteX {
            self.regs.x
        } else {
            self.regs.y
        }
    }

    fn index_absolute(&mut self) {
        let base = u16::from_le_bytes([self.low, self.high]);
        let index = if self.mode == Mode::AbsoluteX {
            self.regs.x
        } else {
            self.regs.y
        };
        self.base = base;
        self.addr = base.wrapping_add(u16::from(index));
        self.page_crossed = (self.addr & 0xFF00) != (base & 0xFF00);
    }

    fn index_indirect_y(&mut self) {
        let base = u16::from_le_bytes([self.low, self.high]);
        self.base = base;
        self.addr = base.wrapping_add(u16::from(self.regs.y));
        self.page_crossed = (self.addr & 0xFF00) != (base & 0xFF00);
    }

    #[allow(clippy::too_many_lines)]
    fn do_read_op(&mut self, v: u8) {
        match self.op {
            Op::LDA => {
                self.regs.a = v;
                self.regs.p.set_zn(v);
            }
            Op::LDX => {
                self.regs.x = v;
                self.regs.p.set_zn(v);
            }
            Op::LDY => {
                self.regs.y = v;
                self.regs.p.set_zn(v);
            }
            Op::ADC => execute::adc(&mut self.regs, v),
            Op::SBC => execute::sbc(&mut self.regs, v),
            Op::AND => {
                self.regs.a &= v;
                self.regs.p.set_zn(self.regs.a);
            }
            Op::ORA => {
                self.regs.a |= v;
                self.regs.p.set_zn(self.regs.a);
            }
            Op::EOR => {
                self.regs.a ^= v;
                self.regs.p.set_zn(self.regs.a);
            }
            Op::CMP => execute::cmp(&mut self.regs.p, self.regs.a, v),
            Op::CPX => execute::cmp(&mut self.regs.p, self.regs.x, v),
            Op::CPY => execute::cmp(&mut self.regs.p, self.regs.y, v),
            Op::BIT => execute::bit(&mut self.regs.p, self.regs.a, v),
            Op::NOP => {}
            Op::LAX => {
                self.regs.a = v;
                self.regs.x = v;
                self.regs.p.set_zn(v);
            }
            Op::ANC => {
                self.regs.a &= v;
                self.regs.p.set_zn(self.regs.a);
                self.regs.p.set(flags::C, self.regs.p.is_set(flags::N));
            }
            Op::ALR => {
                self.regs.a &= v;
                self.regs.a = execute::lsr(&mut self.regs.p, self.regs.a);
            }
            Op::ARR => {
                self.regs.a &= v;
                self.regs.a = execute::ror(&mut self.regs.p, self.regs.a);
                let bit6 = self.regs.a & 0x40 != 0;
                let bit5 = self.regs.a & 0x20 != 0;
                self.regs.p.set(flags::C, bit6);
                self.regs.p.set(flags::V, bit6 ^ bit5);
            }
            Op::XAA | Op::LXA => {
                // Unstable on real silicon; this models the commonly
                // observed magic-constant approximation.
                self.regs.a = (self.regs.a | 0xEE) & self.regs.x & v;
                self.regs.p.set_zn(self.regs.a);
            }
            Op::AXS => {
                let t = self.regs.a & self.regs.x;
                self.regs.p.set(flags::C, t >= v);
                self.regs.x = t.wrapping_sub(v);
                self.regs.p.set_zn(self.regs.x);
            }
            Op::LAS => {
                let v = v & self.regs.s;
                self.regs.a = v;
                self.regs.x = v;
                self.regs.s = v;
                self.regs.p.set_zn(v);
            }
            other => unreachable!("{other:?} is not a Read-access opcode"),
        }
    }

    // -- Write-access addressing ----------------------------------------

    fn step_write<B: Bus>(&mut self, bus: &mut B) {
        match self.mode {
            Mode::ZeroPage => match self.t {
                2 => {
                    self.addr = u16::from(bus.read(self.regs.pc).value());
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    let v = self.value_to_store();
                    bus.write(self.addr, v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::ZeroPageX | Mode::ZeroPageY => match self.t {
                2 => {
                    self.ptr = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    bus.read(u16::from(self.ptr));
                    let index = self.index_reg();
                    self.ptr = self.ptr.wrapping_add(index);
                    self.addr = u16::from(self.ptr);
                    self.t = 4;
                }
                4 => {
                    let v = self.value_to_store();
                    bus.write(self.addr, v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::Absolute => match self.t {
                2 => {
                    self.low = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    self.high = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.addr = u16::from_le_bytes([self.low, self.high]);
                    self.t = 4;
                }
                4 => {
                    let v = self.value_to_store();
                    bus.write(self.addr, v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::AbsoluteX | Mode::AbsoluteY => match self.t {
                2 => {
                    self.low = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    self.high = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.index_absolute();
                    self.t = 4;
                }
                4 => {
                    let wrong = (self.base & 0xFF00) | (self.addr & 0x00FF);
                    bus.read(wrong);
                    self.t = 5;
                }
                5 => {
                    let v = self.value_to_store();
                    bus.write(self.addr, v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::IndirectX => match self.t {
                2 => {
                    self.ptr = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    bus.read(u16::from(self.ptr));
                    self.ptr = self.ptr.wrapping_add(self.regs.x);
                    self.t = 4;
                }
                4 => {
                    self.low = bus.read(u16::from(self.ptr)).value();
                    self.t = 5;
                }
                5 => {
                    self.high = bus.read(u16::from(self.ptr.wrapping_add(1))).value();
                    self.addr = u16::from_le_bytes([self.low, self.high]);
                    self.t = 6;
                }
                6 => {
                    let v = self.value_to_store();
                    bus.write(self.addr, v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::IndirectY => match self.t {
                2 => {
                    self.ptr = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    self.low = bus.read(u16::from(self.ptr)).value();
                    self.t = 4;
                }
                4 => {
                    self.high = bus.read(u16::from(self.ptr.wrapping_add(1))).value();
                    self.index_indirect_y();
                    self.t = 5;
                }
                5 => {
                    let wrong = (self.base & 0xFF00) | (self.addr & 0x00FF);
                    bus.read(wrong);
                    self.t = 6;
                }
                6 => {
                    let v = self.value_to_store();
                    bus.write(self.addr, v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            other => unreachable!("mode {other:?} is not valid for Write access"),
        }
    }

    /// The byte a store opcode writes. For the unstable `SHA`/`SHX`/`SHY`/
    /// `TAS` family this also updates `S` (for `TAS`) and approximates the
    /// "AND with high-byte-of-base-plus-one" behavior seen on real parts.
    fn value_to_store(&mut self) -> u8 {
        let page_plus_one = ((self.base >> 8) as u8).wrapping_add(1);
        match self.op {
            Op::STA => self.regs.a,
            Op::STX => self.regs.x,
            Op::STY => self.regs.y,
            Op::SAX => self.regs.a & self.regs.x,
            Op::SHA => self.regs.a & self.regs.x & page_plus_one,
            Op::SHX => self.regs.x & page_plus_one,
            Op::SHY => self.regs.y & page_plus_one,
            Op::TAS => {
                self.regs.s = self.regs.a & self.regs.x;
                self.regs.s & page_plus_one
            }
            other => unreachable!("{other:?} is not a Write-access opcode"),
        }
    }

    // -- Read-modify-write addressing -------------------------------------

    fn step_rmw<B: Bus>(&mut self, bus: &mut B) {
        match self.mode {
            Mode::ZeroPage => match self.t {
                2 => {
                    self.addr = u16::from(bus.read(self.regs.pc).value());
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    self.operand = bus.read(self.addr).value();
                    self.t = 4;
                }
                4 => {
                    bus.write(self.addr, self.operand);
                    self.t = 5;
                }
                5 => {
                    let v = self.compute_rmw(self.operand);
                    bus.write(self.addr, v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::ZeroPageX => match self.t {
                2 => {
                    self.ptr = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    bus.read(u16::from(self.ptr));
                    self.ptr = self.ptr.wrapping_add(self.regs.x);
                    self.addr = u16::from(self.ptr);
                    self.t = 4;
                }
                4 => {
                    self.operand = bus.read(self.addr).value();
                    self.t = 5;
                }
                5 => {
                    bus.write(self.addr, self.operand);
                    self.t = 6;
                }
                6 => {
                    let v = self.compute_rmw(self.operand);
                    bus.write(self.addr, v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::Absolute => match self.t {
                2 => {
                    self.low = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    self.high = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.addr = u16::from_le_bytes([self.low, self.high]);
                    self.t = 4;
                }
                4 => {
                    self.operand = bus.read(self.addr).value();
                    self.t = 5;
                }
                5 => {
                    bus.write(self.addr, self.operand);
                    self.t = 6;
                }
                6 => {
                    let v = self.compute_rmw(self.operand);
                    bus.write(self.addr, v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::AbsoluteX | Mode::AbsoluteY => match self.t {
                2 => {
                    self.low = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    self.high = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.index_absolute();
                    self.t = 4;
                }
                4 => {
                    let wrong = (self.base & 0xFF00) | (self.addr & 0x00FF);
                    bus.read(wrong);
                    self.t = 5;
                }
                5 => {
                    self.operand = bus.read(self.addr).value();
                    self.t = 6;
                }
                6 => {
                    bus.write(self.addr, self.operand);
                    self.t = 7;
                }
                7 => {
                    let v = self.compute_rmw(self.operand);
                    bus.write(self.addr, v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::IndirectX => match self.t {
                2 => {
                    self.ptr = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    bus.read(u16::from(self.ptr));
                    self.ptr = self.ptr.wrapping_add(self.regs.x);
                    self.t = 4;
                }
                4 => {
                    self.low = bus.read(u16::from(self.ptr)).value();
                    self.t = 5;
                }
                5 => {
                    self.high = bus.read(u16::from(self.ptr.wrapping_add(1))).value();
                    self.addr = u16::from_le_bytes([self.low, self.high]);
                    self.t = 6;
                }
                6 => {
                    self.operand = bus.read(self.addr).value();
                    self.t = 7;
                }
                7 => {
                    bus.write(self.addr, self.operand);
                    self.t = 8;
                }
                8 => {
                    let v = self.compute_rmw(self.operand);
                    bus.write(self.addr, v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            Mode::IndirectY => match self.t {
                2 => {
                    self.ptr = bus.read(self.regs.pc).value();
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                    self.t = 3;
                }
                3 => {
                    self.low = bus.read(u16::from(self.ptr)).value();
                    self.t = 4;
                }
                4 => {
                    self.high = bus.read(u16::from(self.ptr.wrapping_add(1))).value();
                    self.index_indirect_y();
                    self.t = 5;
                }
                5 => {
                    let wrong = (self.base & 0xFF00) | (self.addr & 0x00FF);
                    bus.read(wrong);
                    self.t = 6;
                }
                6 => {
                    self.operand = bus.read(self.addr).value();
                    self.t = 7;
                }
                7 => {
                    bus.write(self.addr, self.operand);
                    self.t = 8;
                }
                8 => {
                    let v = self.compute_rmw(self.operand);
                    bus.write(self.addr, v);
                    self.finish();
                }
                _ => unreachable!(),
            },
            other => unreachable!("mode {other:?} is not valid for RMW access"),
        }
    }

    fn compute_rmw(&mut self, operand: u8) -> u8 {
        match self.op {
            Op::ASL => execute::asl(&mut self.regs.p, operand),
            Op::LSR => execute::lsr(&mut self.regs.p, operand),
            Op::ROL => execute::rol(&mut self.regs.p, operand),
            Op::ROR => execute::ror(&mut self.regs.p, operand),
            Op::INC => execute::inc(&mut self.regs.p, operand),
            Op::DEC => execute::dec(&mut self.regs.p, operand),
            Op::SLO => {
                let r = execute::asl(&mut self.regs.p, operand);
                self.regs.a |= r;
                self.regs.p.set_zn(self.regs.a);
                r
            }
            Op::RLA => {
                let r = execute::rol(&mut self.regs.p, operand);
                self.regs.a &= r;
                self.regs.p.set_zn(self.regs.a);
                r
            }
            Op::SRE => {
                let r = execute::lsr(&mut self.regs.p, operand);
                self.regs.a ^= r;
                self.regs.p.set_zn(self.regs.a);
                r
            }
            Op::RRA => {
                let r = execute::ror(&mut self.regs.p, operand);
                execute::adc(&mut self.regs, r);
                r
            }
            Op::DCP => {
                let r = execute::dec(&mut self.regs.p, operand);
                execute::cmp(&mut self.regs.p, self.regs.a, r);
                r
            }
            Op::ISC => {
                let r = execute::inc(&mut self.regs.p, operand);
                execute::sbc(&mut self.regs, r);
                r
            }
            other => unreachable!("{other:?} is not an RMW-access opcode"),
        }
    }
}

impl Cpu for Mos6502 {
    type Registers = Registers;

    fn tick<B: Bus>(&mut self, bus: &mut B) {
        if self.halted {
            bus.read(self.regs.pc);
            return;
        }
        if self.t == 0 {
            self.begin_next(bus);
            return;
        }
        if let Some(kind) = self.int_kind {
            self.step_interrupt(bus, kind);
        } else if self.mode == Mode::Relative {
            self.step_branch(bus);
        } else {
            match self.access {
                Access::Read => self.step_read(bus),
                Access::Write => self.step_write(bus),
                Access::ReadModifyWrite => self.step_rmw(bus),
                Access::Control => self.step_control(bus),
            }
        }
    }

    fn pc(&self) -> u32 {
        u32::from(self.regs.pc)
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    fn is_instruction_complete(&self) -> bool {
        self.t == 0
    }

    fn set_irq(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    fn pulse_nmi(&mut self) {
        self.nmi_latched = true;
    }

    fn pulse_so(&mut self) {
        // Real hardware sets V directly and asynchronously; we apply it
        // immediately rather than waiting for a specific clock phase.
        self.regs.p.set(flags::V, true);
    }

    fn reset(&mut self) {
        self.pending_reset = true;
    }
}

impl Observable for Mos6502 {
    fn query(&self, path: &str) -> Option<Value> {
        Some(match path {
            "pc" => Value::U16(self.regs.pc),
            "a" => Value::U8(self.regs.a),
            "x" => Value::U8(self.regs.x),
            "y" => Value::U8(self.regs.y),
            "s" => Value::U8(self.regs.s),
            "p" => Value::U8(self.regs.p.0),
            "flags.c" => Value::Bool(self.regs.p.is_set(flags::C)),
            "flags.z" => Value::Bool(self.regs.p.is_set(flags::Z)),
            "flags.i" => Value::Bool(self.regs.p.is_set(flags::I)),
            "flags.d" => Value::Bool(self.regs.p.is_set(flags::D)),
            "flags.v" => Value::Bool(self.regs.p.is_set(flags::V)),
            "flags.n" => Value::Bool(self.regs.p.is_set(flags::N)),
            "halted" => Value::Bool(self.halted),
            "opcode" => Value::U8(self.opcode),
            _ => return None,
        })
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc", "a", "x", "y", "s", "p", "flags.c", "flags.z", "flags.i", "flags.d", "flags.v",
            "flags.n", "halted", "opcode",
        ]
    }
}
