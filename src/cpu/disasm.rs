//! 逆アセンブラとレジスタ表示（デバッガ用）
//!
//! オペコードテーブルをそのまま使うので、実行系と表記がずれることはない。
//! メモリはバス経由で読むため、$C0xxを逆アセンブルするとソフトスイッチが反応する点に注意。

use super::{flags, AddressingMode, Cpu, MemoryBus, OPCODES};

/// 1命令を逆アセンブルし、(行, 次の命令アドレス) を返す
///
/// 書式: `AAAA OP B1B2   MNE operand`
pub fn disassemble_one<M: MemoryBus>(memory: &mut M, address: u16) -> (String, u16) {
    let op = memory.read(address);
    let b1 = memory.read(address.wrapping_add(1));
    let b2 = memory.read(address.wrapping_add(2));
    let entry = &OPCODES[op as usize];
    let word = u16::from_le_bytes([b1, b2]);
    let next = address.wrapping_add(1 + entry.mode.operand_len());

    let operand = match entry.mode {
        AddressingMode::Implied => String::new(),
        AddressingMode::Accumulator => "A".to_string(),
        AddressingMode::Immediate => format!("#${:02X}", b1),
        AddressingMode::ZeroPage => format!("${:02X}", b1),
        AddressingMode::ZeroPageX => format!("${:02X},X", b1),
        AddressingMode::ZeroPageY => format!("${:02X},Y", b1),
        AddressingMode::Relative => {
            format!("${:04X}", next.wrapping_add(b1 as i8 as i16 as u16))
        }
        AddressingMode::Absolute => format!("${:04X}", word),
        AddressingMode::AbsoluteX => format!("${:04X},X", word),
        AddressingMode::AbsoluteY => format!("${:04X},Y", word),
        AddressingMode::Indirect => format!("(${:04X})", word),
        AddressingMode::ZeroPageIndirect => format!("(${:02X})", b1),
        AddressingMode::IndexedIndirect => format!("(${:02X},X)", b1),
        AddressingMode::IndirectIndexed => format!("(${:02X}),Y", b1),
        AddressingMode::AbsoluteIndexedIndirect => format!("(${:04X},X)", word),
        AddressingMode::ZeroPageRelative => {
            format!("${:02X},${:04X}", b1, next.wrapping_add(b2 as i8 as i16 as u16))
        }
    };

    let bytes = match entry.mode.operand_len() {
        0 => String::new(),
        1 => format!("{:02X}", b1),
        _ => format!("{:02X}{:02X}", b1, b2),
    };

    let line = format!("{:04X} {:02X} {:<4}   {:<4} {}", address, op, bytes, entry.mnemonic, operand);
    (line.trim_end().to_string(), next)
}

/// `address`から`lines`命令分を逆アセンブル
pub fn disassemble<M: MemoryBus>(memory: &mut M, address: u16, lines: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(lines);
    let mut pc = address;
    for _ in 0..lines {
        let (line, next) = disassemble_one(memory, pc);
        out.push(line);
        pc = next;
    }
    out
}

impl Cpu {
    /// レジスタ表示
    ///
    /// `A=.. X=.. Y=.. S=.. *S=..` と `PC=.... P=NV.BDIZC` の2行。
    /// *S はスタックポインタが指すバイト。
    pub fn registers_string<M: MemoryBus>(&self, memory: &mut M) -> String {
        let r = &self.regs;
        let top = memory.read(0x0100 | r.sp as u16);
        let flag = |mask: u8, c: char, off: char| if r.get_flag(mask) { c } else { off };
        format!(
            "A={:02X}  X={:02X}  Y={:02X}  S={:02X}  *S={:02X}\nPC={:04X}  P={}{}{}{}{}{}{}{}",
            r.a,
            r.x,
            r.y,
            r.sp,
            top,
            r.pc,
            flag(flags::NEGATIVE, 'N', '-'),
            flag(flags::OVERFLOW, 'V', '-'),
            flag(flags::UNUSED, 'U', '.'),
            flag(flags::BREAK, 'B', '-'),
            flag(flags::DECIMAL, 'D', '-'),
            flag(flags::IRQ_DISABLE, 'I', '-'),
            flag(flags::ZERO, 'Z', '-'),
            flag(flags::CARRY, 'C', '-'),
        )
    }
}
