use std::collections::HashMap;

use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

use super::emulator::EmulatorError;

pub const TEXT_BASE: u32 = 0x0040_0000;
pub const DATA_BASE: u32 = 0x1001_0000;

pub type Reg = u8;

const REGISTER_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "fp", "ra",
];

lazy_static! {
    static ref LABEL: Regex = Regex::new(r"^([A-Za-z_.][A-Za-z0-9_.$]*):").unwrap();
    static ref MEMORY: Regex =
        Regex::new(r"^(-?(?:0[xX][0-9a-fA-F]+|[0-9]+))?\((\$[A-Za-z0-9]+)\)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Slt,
    Sle,
    Sgt,
    Sge,
    Seq,
    Sne,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Imm(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCond {
    Always,
    Eq,
    Ne,
    Eqz,
    Nez,
    Lez,
    Gtz,
    Ltz,
    Gez,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatCond {
    Lt,
    Le,
    Eq,
}

/// A decoded instruction. Pseudo-instructions stay whole rather than being
/// expanded into their real-machine sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Li { rd: Reg, value: u32 },
    La { rd: Reg, address: u32 },
    Move { rd: Reg, rs: Reg },
    Alu { op: AluOp, rd: Reg, rs: Reg, rhs: Operand },
    LoadWord { rt: Reg, offset: i32, base: Reg },
    StoreWord { rt: Reg, offset: i32, base: Reg },
    LoadByte { rt: Reg, offset: i32, base: Reg },
    StoreByte { rt: Reg, offset: i32, base: Reg },
    LoadFloat { ft: Reg, offset: i32, base: Reg },
    StoreFloat { ft: Reg, offset: i32, base: Reg },
    Branch { cond: BranchCond, rs: Reg, rt: Reg, target: u32 },
    Jump { target: u32 },
    JumpAndLink { target: u32 },
    JumpRegister { rs: Reg },
    Mtc1 { rt: Reg, fs: Reg },
    Mfc1 { rt: Reg, fs: Reg },
    Float { op: FloatOp, fd: Reg, fs: Reg, ft: Reg },
    NegFloat { fd: Reg, fs: Reg },
    MoveFloat { fd: Reg, fs: Reg },
    CvtSW { fd: Reg, fs: Reg },
    TruncWS { fd: Reg, fs: Reg },
    Compare { cond: FloatCond, fs: Reg, ft: Reg },
    BranchFlag { on: bool, target: u32 },
    Syscall,
    Nop,
}

/// An assembled program: instructions from [`TEXT_BASE`], data from [`DATA_BASE`].
#[derive(Debug, Clone)]
pub struct Program {
    pub text: Vec<Instruction>,
    pub data: Vec<u8>,
    pub labels: HashMap<String, u32>,
}

impl Program {
    pub fn entry(&self) -> Option<u32> {
        self.labels.get("main").copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Text,
    Data,
}

/// Assembles SPIM-dialect source.
///
/// The first pass lays out labels and the data image; the second decodes
/// instructions against the finished label table.
pub fn assemble(source: &str) -> Result<Program, EmulatorError> {
    let mut labels: HashMap<String, u32> = HashMap::new();
    let mut data: Vec<u8> = vec![];
    let mut pending: Vec<(usize, &str)> = vec![];
    let mut segment = Segment::Text;

    for (index, raw) in source.lines().enumerate() {
        let number = index + 1;
        let mut line = strip_comment(raw).trim();

        while let Some(captures) = LABEL.captures(line) {
            let name = captures[1].to_string();
            let address = match segment {
                Segment::Text => TEXT_BASE + 4 * pending.len() as u32,
                Segment::Data => DATA_BASE + data.len() as u32,
            };
            if labels.insert(name.clone(), address).is_some() {
                return Err(EmulatorError::DuplicateLabel {
                    line: number,
                    label: name,
                });
            }
            line = line[captures[0].len()..].trim();
        }

        if line.is_empty() {
            continue;
        }

        if line.starts_with('.') {
            let (directive, rest) = split_mnemonic(line);
            match directive {
                ".text" => segment = Segment::Text,
                ".data" => segment = Segment::Data,
                ".globl" | ".global" => {}
                _ if segment == Segment::Text => {
                    return Err(syntax(number, format!("`{}` outside of .data", directive)))
                }
                ".asciiz" | ".ascii" => {
                    data.extend(parse_string(rest).map_err(|message| syntax(number, message))?);
                    if directive == ".asciiz" {
                        data.push(0);
                    }
                }
                ".word" => {
                    pad_to(&mut data, 4);
                    for value in rest.split(',') {
                        let value =
                            parse_immediate(value.trim()).map_err(|message| syntax(number, message))?;
                        data.extend(value.to_le_bytes());
                    }
                }
                ".space" => {
                    let size =
                        parse_immediate(rest.trim()).map_err(|message| syntax(number, message))?;
                    data.resize(data.len() + size as usize, 0);
                }
                ".align" => {
                    let power =
                        parse_immediate(rest.trim()).map_err(|message| syntax(number, message))?;
                    pad_to(&mut data, 1 << power.min(12));
                }
                _ => return Err(syntax(number, format!("unknown directive `{}`", directive))),
            }
            continue;
        }

        if segment == Segment::Data {
            return Err(syntax(number, String::from("instruction inside .data")));
        }
        pending.push((number, line));
    }

    let text = pending
        .iter()
        .map(|(number, line)| decode(*number, line, &labels))
        .collect::<Result<Vec<_>, _>>()?;
    trace!("labels: {:?}", labels);

    Ok(Program { text, data, labels })
}

fn syntax(line: usize, message: String) -> EmulatorError {
    EmulatorError::Syntax { line, message }
}

fn pad_to(data: &mut Vec<u8>, alignment: usize) {
    while data.len() % alignment != 0 {
        data.push(0);
    }
}

/// Drops a `#` comment, ignoring `#` inside string literals.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (index, ch) in line.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn split_mnemonic(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(index) => (&line[..index], line[index..].trim()),
        None => (line, ""),
    }
}

fn parse_string(text: &str) -> Result<Vec<u8>, String> {
    let inner = text
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(|| format!("expected a quoted string, found `{}`", text))?;

    let mut bytes = vec![];
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buffer = [0; 4];
            bytes.extend(ch.encode_utf8(&mut buffer).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            Some('0') => bytes.push(0),
            Some('\\') => bytes.push(b'\\'),
            Some('"') => bytes.push(b'"'),
            other => return Err(format!("bad escape `\\{}`", other.unwrap_or(' '))),
        }
    }
    Ok(bytes)
}

/// Decimal or `0x` hex, signed or unsigned, as a 32-bit pattern.
fn parse_immediate(text: &str) -> Result<u32, String> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| format!("bad immediate `{}`", text))?;

    let value = if negative { -magnitude } else { magnitude };
    if value < i32::MIN as i64 || value > u32::MAX as i64 {
        return Err(format!("immediate `{}` does not fit in 32 bits", text));
    }
    Ok(value as i32 as u32)
}

fn parse_gpr(text: &str) -> Result<Reg, String> {
    let name = text
        .strip_prefix('$')
        .ok_or_else(|| format!("expected a register, found `{}`", text))?;
    if let Ok(number) = name.parse::<u8>() {
        if number < 32 {
            return Ok(number);
        }
    }
    REGISTER_NAMES
        .iter()
        .position(|register| *register == name)
        .map(|index| index as Reg)
        .ok_or_else(|| format!("unknown register `{}`", text))
}

fn parse_fpr(text: &str) -> Result<Reg, String> {
    text.strip_prefix("$f")
        .and_then(|number| number.parse::<u8>().ok())
        .filter(|number| *number < 32)
        .ok_or_else(|| format!("expected a float register, found `{}`", text))
}

/// One instruction line split into mnemonic and operands.
struct Line<'a> {
    number: usize,
    mnemonic: &'a str,
    operands: Vec<&'a str>,
    labels: &'a HashMap<String, u32>,
}

impl<'a> Line<'a> {
    fn arity(&self, count: usize) -> Result<(), EmulatorError> {
        if self.operands.len() == count {
            Ok(())
        } else {
            Err(syntax(
                self.number,
                format!(
                    "`{}` takes {} operands, found {}",
                    self.mnemonic,
                    count,
                    self.operands.len()
                ),
            ))
        }
    }

    fn gpr(&self, index: usize) -> Result<Reg, EmulatorError> {
        parse_gpr(self.operands[index]).map_err(|message| syntax(self.number, message))
    }

    fn fpr(&self, index: usize) -> Result<Reg, EmulatorError> {
        parse_fpr(self.operands[index]).map_err(|message| syntax(self.number, message))
    }

    fn immediate(&self, index: usize) -> Result<u32, EmulatorError> {
        parse_immediate(self.operands[index]).map_err(|message| syntax(self.number, message))
    }

    fn operand(&self, index: usize) -> Result<Operand, EmulatorError> {
        if self.operands[index].starts_with('$') {
            Ok(Operand::Reg(self.gpr(index)?))
        } else {
            Ok(Operand::Imm(self.immediate(index)?))
        }
    }

    fn label(&self, index: usize) -> Result<u32, EmulatorError> {
        let name = self.operands[index];
        self.labels
            .get(name)
            .copied()
            .ok_or_else(|| EmulatorError::UnknownLabel {
                line: self.number,
                label: name.to_string(),
            })
    }

    /// `offset(base)` addressing.
    fn memory(&self, index: usize) -> Result<(i32, Reg), EmulatorError> {
        let text = self.operands[index];
        let captures = MEMORY
            .captures(text)
            .ok_or_else(|| syntax(self.number, format!("bad memory operand `{}`", text)))?;
        let offset = match captures.get(1) {
            Some(offset) => parse_immediate(offset.as_str())
                .map_err(|message| syntax(self.number, message))? as i32,
            None => 0,
        };
        let base = parse_gpr(&captures[2]).map_err(|message| syntax(self.number, message))?;
        Ok((offset, base))
    }
}

fn decode(number: usize, text: &str, labels: &HashMap<String, u32>) -> Result<Instruction, EmulatorError> {
    let (mnemonic, rest) = split_mnemonic(text);
    let operands = if rest.is_empty() {
        vec![]
    } else {
        rest.split(',').map(str::trim).collect()
    };
    let line = Line {
        number,
        mnemonic,
        operands,
        labels,
    };

    let alu = |op: AluOp| -> Result<Instruction, EmulatorError> {
        line.arity(3)?;
        Ok(Instruction::Alu {
            op,
            rd: line.gpr(0)?,
            rs: line.gpr(1)?,
            rhs: line.operand(2)?,
        })
    };
    let branch_zero = |cond: BranchCond| -> Result<Instruction, EmulatorError> {
        line.arity(2)?;
        Ok(Instruction::Branch {
            cond,
            rs: line.gpr(0)?,
            rt: 0,
            target: line.label(1)?,
        })
    };
    let float = |op: FloatOp| -> Result<Instruction, EmulatorError> {
        line.arity(3)?;
        Ok(Instruction::Float {
            op,
            fd: line.fpr(0)?,
            fs: line.fpr(1)?,
            ft: line.fpr(2)?,
        })
    };
    let compare = |cond: FloatCond| -> Result<Instruction, EmulatorError> {
        line.arity(2)?;
        Ok(Instruction::Compare {
            cond,
            fs: line.fpr(0)?,
            ft: line.fpr(1)?,
        })
    };

    let instruction = match mnemonic {
        "li" => {
            line.arity(2)?;
            Instruction::Li {
                rd: line.gpr(0)?,
                value: line.immediate(1)?,
            }
        }
        "la" => {
            line.arity(2)?;
            Instruction::La {
                rd: line.gpr(0)?,
                address: line.label(1)?,
            }
        }
        "move" => {
            line.arity(2)?;
            Instruction::Move {
                rd: line.gpr(0)?,
                rs: line.gpr(1)?,
            }
        }
        "neg" | "negu" => {
            line.arity(2)?;
            Instruction::Alu {
                op: AluOp::Sub,
                rd: line.gpr(0)?,
                rs: 0,
                rhs: Operand::Reg(line.gpr(1)?),
            }
        }
        "add" | "addu" | "addi" | "addiu" => alu(AluOp::Add)?,
        "sub" | "subu" => alu(AluOp::Sub)?,
        "mul" => alu(AluOp::Mul)?,
        "div" => alu(AluOp::Div)?,
        "rem" => alu(AluOp::Rem)?,
        "slt" | "slti" => alu(AluOp::Slt)?,
        "sle" => alu(AluOp::Sle)?,
        "sgt" => alu(AluOp::Sgt)?,
        "sge" => alu(AluOp::Sge)?,
        "seq" => alu(AluOp::Seq)?,
        "sne" => alu(AluOp::Sne)?,
        "and" | "andi" => alu(AluOp::And)?,
        "or" | "ori" => alu(AluOp::Or)?,
        "xor" | "xori" => alu(AluOp::Xor)?,
        "lw" | "sw" | "lb" | "sb" => {
            line.arity(2)?;
            let rt = line.gpr(0)?;
            let (offset, base) = line.memory(1)?;
            match mnemonic {
                "lw" => Instruction::LoadWord { rt, offset, base },
                "sw" => Instruction::StoreWord { rt, offset, base },
                "lb" => Instruction::LoadByte { rt, offset, base },
                _ => Instruction::StoreByte { rt, offset, base },
            }
        }
        "l.s" | "s.s" => {
            line.arity(2)?;
            let ft = line.fpr(0)?;
            let (offset, base) = line.memory(1)?;
            if mnemonic == "l.s" {
                Instruction::LoadFloat { ft, offset, base }
            } else {
                Instruction::StoreFloat { ft, offset, base }
            }
        }
        "beq" | "bne" => {
            line.arity(3)?;
            Instruction::Branch {
                cond: if mnemonic == "beq" {
                    BranchCond::Eq
                } else {
                    BranchCond::Ne
                },
                rs: line.gpr(0)?,
                rt: line.gpr(1)?,
                target: line.label(2)?,
            }
        }
        "beqz" => branch_zero(BranchCond::Eqz)?,
        "bnez" => branch_zero(BranchCond::Nez)?,
        "blez" => branch_zero(BranchCond::Lez)?,
        "bgtz" => branch_zero(BranchCond::Gtz)?,
        "bltz" => branch_zero(BranchCond::Ltz)?,
        "bgez" => branch_zero(BranchCond::Gez)?,
        "b" => {
            line.arity(1)?;
            Instruction::Branch {
                cond: BranchCond::Always,
                rs: 0,
                rt: 0,
                target: line.label(0)?,
            }
        }
        "j" => {
            line.arity(1)?;
            Instruction::Jump {
                target: line.label(0)?,
            }
        }
        "jal" => {
            line.arity(1)?;
            Instruction::JumpAndLink {
                target: line.label(0)?,
            }
        }
        "jr" => {
            line.arity(1)?;
            Instruction::JumpRegister { rs: line.gpr(0)? }
        }
        "mtc1" | "mfc1" => {
            line.arity(2)?;
            let rt = line.gpr(0)?;
            let fs = line.fpr(1)?;
            if mnemonic == "mtc1" {
                Instruction::Mtc1 { rt, fs }
            } else {
                Instruction::Mfc1 { rt, fs }
            }
        }
        "add.s" => float(FloatOp::Add)?,
        "sub.s" => float(FloatOp::Sub)?,
        "mul.s" => float(FloatOp::Mul)?,
        "div.s" => float(FloatOp::Div)?,
        "neg.s" | "mov.s" | "cvt.s.w" | "trunc.w.s" => {
            line.arity(2)?;
            let fd = line.fpr(0)?;
            let fs = line.fpr(1)?;
            match mnemonic {
                "neg.s" => Instruction::NegFloat { fd, fs },
                "mov.s" => Instruction::MoveFloat { fd, fs },
                "cvt.s.w" => Instruction::CvtSW { fd, fs },
                _ => Instruction::TruncWS { fd, fs },
            }
        }
        "c.lt.s" => compare(FloatCond::Lt)?,
        "c.le.s" => compare(FloatCond::Le)?,
        "c.eq.s" => compare(FloatCond::Eq)?,
        "bc1t" | "bc1f" => {
            line.arity(1)?;
            Instruction::BranchFlag {
                on: mnemonic == "bc1t",
                target: line.label(0)?,
            }
        }
        "syscall" => {
            line.arity(0)?;
            Instruction::Syscall
        }
        "nop" => {
            line.arity(0)?;
            Instruction::Nop
        }
        _ => {
            return Err(syntax(
                number,
                format!("unsupported instruction `{}`", mnemonic),
            ))
        }
    };

    Ok(instruction)
}
