use std::collections::HashMap;

use log::trace;

use super::{
    assembler::{
        AluOp, BranchCond, FloatCond, FloatOp, Instruction, Operand, Program, Reg, DATA_BASE,
        TEXT_BASE,
    },
    emulator::{EmulatorError, Execution},
};

pub const GP_INIT: u32 = 0x1000_8000;
pub const SP_INIT: u32 = 0x7fff_fffc;
pub const HEAP_BASE: u32 = 0x1004_0000;

const PAGE_BITS: u32 = 12;
const PAGE_SIZE: usize = 1 << PAGE_BITS;

const V0: usize = 2;
const A0: usize = 4;
const A1: usize = 5;
const GP: usize = 28;
const SP: usize = 29;
const RA: usize = 31;
const F12: usize = 12;

/// Byte-addressed little-endian memory, allocated one page at a time on first write.
#[derive(Debug, Default)]
pub struct Memory {
    pages: HashMap<u32, Box<[u8; PAGE_SIZE]>>,
}

impl Memory {
    pub fn read_u8(&self, address: u32) -> u8 {
        self.pages
            .get(&(address >> PAGE_BITS))
            .map(|page| page[(address as usize) & (PAGE_SIZE - 1)])
            .unwrap_or(0)
    }

    pub fn write_u8(&mut self, address: u32, value: u8) {
        let page = self
            .pages
            .entry(address >> PAGE_BITS)
            .or_insert_with(|| Box::new([0; PAGE_SIZE]));
        page[(address as usize) & (PAGE_SIZE - 1)] = value;
    }

    pub fn read_word(&self, address: u32) -> Result<u32, EmulatorError> {
        if address % 4 != 0 {
            return Err(EmulatorError::Unaligned { address });
        }
        let bytes = [0, 1, 2, 3].map(|i| self.read_u8(address + i));
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn write_word(&mut self, address: u32, value: u32) -> Result<(), EmulatorError> {
        if address % 4 != 0 {
            return Err(EmulatorError::Unaligned { address });
        }
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_u8(address + i as u32, byte);
        }
        Ok(())
    }

    /// The null-terminated string at `address`.
    pub fn read_string(&self, address: u32) -> String {
        let mut bytes = vec![];
        let mut cursor = address;
        loop {
            let byte = self.read_u8(cursor);
            if byte == 0 {
                break;
            }
            bytes.push(byte);
            cursor = cursor.wrapping_add(1);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Processor state for one run of an assembled program.
pub struct Machine<'a> {
    text: &'a [Instruction],
    registers: [u32; 32],
    /// Raw bit patterns; every float operation reinterprets them as `f32`.
    floats: [u32; 32],
    condition: bool,
    pc: u32,
    memory: Memory,
    heap_end: u32,
    input: std::str::Lines<'a>,
    output: String,
    steps: u64,
    halted: bool,
}

impl<'a> Machine<'a> {
    pub fn new(program: &'a Program, input: &'a str) -> Result<Self, EmulatorError> {
        let entry = program.entry().ok_or(EmulatorError::MissingEntryPoint)?;

        let mut memory = Memory::default();
        for (offset, byte) in program.data.iter().enumerate() {
            memory.write_u8(DATA_BASE + offset as u32, *byte);
        }

        let mut registers = [0; 32];
        registers[GP] = GP_INIT;
        registers[SP] = SP_INIT;

        Ok(Machine {
            text: &program.text,
            registers,
            floats: [0; 32],
            condition: false,
            pc: entry,
            memory,
            heap_end: HEAP_BASE,
            input: input.lines(),
            output: String::new(),
            steps: 0,
            halted: false,
        })
    }

    pub fn register(&self, register: Reg) -> u32 {
        self.registers[register as usize]
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_execution(self) -> Execution {
        Execution {
            output: self.output,
            steps: self.steps,
        }
    }

    /// Executes until the exit syscall or until `limit` instructions have run.
    pub fn run(&mut self, limit: u64) -> Result<(), EmulatorError> {
        while !self.halted {
            if self.steps >= limit {
                return Err(EmulatorError::StepLimit { limit });
            }
            self.step()?;
        }
        Ok(())
    }

    fn set(&mut self, register: Reg, value: u32) {
        if register != 0 {
            self.registers[register as usize] = value;
        }
    }

    fn get(&self, register: Reg) -> u32 {
        self.registers[register as usize]
    }

    fn float(&self, register: Reg) -> f32 {
        f32::from_bits(self.floats[register as usize])
    }

    fn set_float(&mut self, register: Reg, value: f32) {
        self.floats[register as usize] = value.to_bits();
    }

    fn address(&self, base: Reg, offset: i32) -> u32 {
        self.get(base).wrapping_add(offset as u32)
    }

    fn fetch(&self) -> Result<Instruction, EmulatorError> {
        let index = self
            .pc
            .checked_sub(TEXT_BASE)
            .filter(|offset| offset % 4 == 0)
            .map(|offset| (offset / 4) as usize);
        index
            .and_then(|index| self.text.get(index))
            .copied()
            .ok_or(EmulatorError::PcOutOfRange { pc: self.pc })
    }

    pub fn step(&mut self) -> Result<(), EmulatorError> {
        let instruction = self.fetch()?;
        let pc = self.pc;
        let mut next = pc.wrapping_add(4);
        self.steps += 1;
        trace!("{:#010x}: {:?}", pc, instruction);

        match instruction {
            Instruction::Li { rd, value } => self.set(rd, value),
            Instruction::La { rd, address } => self.set(rd, address),
            Instruction::Move { rd, rs } => self.set(rd, self.get(rs)),
            Instruction::Alu { op, rd, rs, rhs } => {
                let left = self.get(rs);
                let right = match rhs {
                    Operand::Reg(register) => self.get(register),
                    Operand::Imm(value) => value,
                };
                let value = alu(op, left, right).ok_or(EmulatorError::DivisionByZero { pc })?;
                self.set(rd, value);
            }
            Instruction::LoadWord { rt, offset, base } => {
                let value = self.memory.read_word(self.address(base, offset))?;
                self.set(rt, value);
            }
            Instruction::StoreWord { rt, offset, base } => {
                self.memory
                    .write_word(self.address(base, offset), self.get(rt))?;
            }
            Instruction::LoadByte { rt, offset, base } => {
                let byte = self.memory.read_u8(self.address(base, offset));
                self.set(rt, byte as i8 as i32 as u32);
            }
            Instruction::StoreByte { rt, offset, base } => {
                self.memory
                    .write_u8(self.address(base, offset), self.get(rt) as u8);
            }
            Instruction::LoadFloat { ft, offset, base } => {
                self.floats[ft as usize] = self.memory.read_word(self.address(base, offset))?;
            }
            Instruction::StoreFloat { ft, offset, base } => {
                self.memory
                    .write_word(self.address(base, offset), self.floats[ft as usize])?;
            }
            Instruction::Branch {
                cond,
                rs,
                rt,
                target,
            } => {
                let left = self.get(rs) as i32;
                let taken = match cond {
                    BranchCond::Always => true,
                    BranchCond::Eq => self.get(rs) == self.get(rt),
                    BranchCond::Ne => self.get(rs) != self.get(rt),
                    BranchCond::Eqz => left == 0,
                    BranchCond::Nez => left != 0,
                    BranchCond::Lez => left <= 0,
                    BranchCond::Gtz => left > 0,
                    BranchCond::Ltz => left < 0,
                    BranchCond::Gez => left >= 0,
                };
                if taken {
                    next = target;
                }
            }
            Instruction::Jump { target } => next = target,
            Instruction::JumpAndLink { target } => {
                self.registers[RA] = next;
                next = target;
            }
            Instruction::JumpRegister { rs } => next = self.get(rs),
            Instruction::Mtc1 { rt, fs } => self.floats[fs as usize] = self.get(rt),
            Instruction::Mfc1 { rt, fs } => self.set(rt, self.floats[fs as usize]),
            Instruction::Float { op, fd, fs, ft } => {
                let (left, right) = (self.float(fs), self.float(ft));
                let value = match op {
                    FloatOp::Add => left + right,
                    FloatOp::Sub => left - right,
                    FloatOp::Mul => left * right,
                    FloatOp::Div => left / right,
                };
                self.set_float(fd, value);
            }
            Instruction::NegFloat { fd, fs } => self.set_float(fd, -self.float(fs)),
            Instruction::MoveFloat { fd, fs } => self.floats[fd as usize] = self.floats[fs as usize],
            Instruction::CvtSW { fd, fs } => {
                self.set_float(fd, self.floats[fs as usize] as i32 as f32)
            }
            Instruction::TruncWS { fd, fs } => {
                self.floats[fd as usize] = self.float(fs).trunc() as i32 as u32
            }
            Instruction::Compare { cond, fs, ft } => {
                let (left, right) = (self.float(fs), self.float(ft));
                self.condition = match cond {
                    FloatCond::Lt => left < right,
                    FloatCond::Le => left <= right,
                    FloatCond::Eq => left == right,
                };
            }
            Instruction::BranchFlag { on, target } => {
                if self.condition == on {
                    next = target;
                }
            }
            Instruction::Syscall => self.syscall(pc)?,
            Instruction::Nop => {}
        }

        self.pc = next;
        Ok(())
    }

    fn syscall(&mut self, pc: u32) -> Result<(), EmulatorError> {
        let code = self.registers[V0];
        match code {
            1 => {
                let value = self.registers[A0] as i32;
                self.output.push_str(&value.to_string());
            }
            2 => {
                let value = f32::from_bits(self.floats[F12]);
                self.output.push_str(&value.to_string());
            }
            4 => {
                let text = self.memory.read_string(self.registers[A0]);
                self.output.push_str(&text);
            }
            5 => {
                let value = self
                    .input
                    .next()
                    .and_then(|line| line.trim().parse::<i32>().ok())
                    .unwrap_or(0);
                self.registers[V0] = value as u32;
            }
            8 => {
                let buffer = self.registers[A0];
                let capacity = self.registers[A1] as usize;
                let mut bytes = self
                    .input
                    .next()
                    .map(|line| format!("{}\n", line).into_bytes())
                    .unwrap_or_default();
                bytes.truncate(capacity.saturating_sub(1));
                bytes.push(0);
                for (offset, byte) in bytes.into_iter().enumerate() {
                    self.memory.write_u8(buffer + offset as u32, byte);
                }
            }
            9 => {
                let size = self.registers[A0];
                let start = self.heap_end;
                self.heap_end = start.wrapping_add((size + 3) & !3);
                self.registers[V0] = start;
            }
            10 => self.halted = true,
            11 => self.output.push(self.registers[A0] as u8 as char),
            _ => return Err(EmulatorError::UnknownSyscall { code, pc }),
        }
        Ok(())
    }
}

/// `None` on division by zero.
fn alu(op: AluOp, left: u32, right: u32) -> Option<u32> {
    let (signed_left, signed_right) = (left as i32, right as i32);
    let value = match op {
        AluOp::Add => left.wrapping_add(right),
        AluOp::Sub => left.wrapping_sub(right),
        AluOp::Mul => signed_left.wrapping_mul(signed_right) as u32,
        AluOp::Div => signed_left.checked_div(signed_right).or_else(|| {
            // i32::MIN / -1 overflows rather than faulting
            (signed_right != 0).then(|| signed_left.wrapping_div(signed_right))
        })? as u32,
        AluOp::Rem => signed_left.checked_rem(signed_right).or_else(|| {
            (signed_right != 0).then(|| signed_left.wrapping_rem(signed_right))
        })? as u32,
        AluOp::Slt => (signed_left < signed_right) as u32,
        AluOp::Sle => (signed_left <= signed_right) as u32,
        AluOp::Sgt => (signed_left > signed_right) as u32,
        AluOp::Sge => (signed_left >= signed_right) as u32,
        AluOp::Seq => (left == right) as u32,
        AluOp::Sne => (left != right) as u32,
        AluOp::And => left & right,
        AluOp::Or => left | right,
        AluOp::Xor => left ^ right,
    };
    Some(value)
}
