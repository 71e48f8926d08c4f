//! 65C02 オペコードテーブル
//!
//! 256エントリすべてが定義されている。未定義オペコードは
//! WDC 65C02の仕様どおりのバイト長・サイクル数を持つNOPとして扱う。

use super::AddressingMode;

/// 命令の動作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Adc, And, Asl, Bit, Cmp, Cpx, Cpy, Dec, Eor, Inc, Lda, Ldx, Ldy, Lsr, Ora,
    Rol, Ror, Sbc, Sta, Stx, Sty, Stz, Trb, Tsb,
    Bcc, Bcs, Beq, Bmi, Bne, Bpl, Bra, Bvc, Bvs,
    Brk, Jmp, Jsr, Rti, Rts,
    Clc, Cld, Cli, Clv, Sec, Sed, Sei,
    Dex, Dey, Inx, Iny,
    Pha, Php, Phx, Phy, Pla, Plp, Plx, Ply,
    Tax, Tay, Tsx, Txa, Txs, Tya,
    /// ゼロページのビットnをクリア
    Rmb(u8),
    /// ゼロページのビットnをセット
    Smb(u8),
    /// ゼロページのビットnが0なら分岐
    Bbr(u8),
    /// ゼロページのビットnが1なら分岐
    Bbs(u8),
    Nop,
    Wai,
    Stp,
}

/// オペコードテーブルのエントリ
#[derive(Debug, Clone, Copy)]
pub struct Opcode {
    pub mnemonic: &'static str,
    pub mode: AddressingMode,
    pub operation: Operation,
    /// 基本サイクル数
    pub cycles: u8,
    /// インデックスでページを跨いだ場合に+1するか
    pub page_penalty: bool,
}

const fn o(mnemonic: &'static str, mode: AddressingMode, operation: Operation, cycles: u8) -> Opcode {
    Opcode { mnemonic, mode, operation, cycles, page_penalty: false }
}

const fn p(mnemonic: &'static str, mode: AddressingMode, operation: Operation, cycles: u8) -> Opcode {
    Opcode { mnemonic, mode, operation, cycles, page_penalty: true }
}

const IMP: AddressingMode = AddressingMode::Implied;
const ACC: AddressingMode = AddressingMode::Accumulator;
const IMM: AddressingMode = AddressingMode::Immediate;
const ZP: AddressingMode = AddressingMode::ZeroPage;
const ZPX: AddressingMode = AddressingMode::ZeroPageX;
const ZPY: AddressingMode = AddressingMode::ZeroPageY;
const REL: AddressingMode = AddressingMode::Relative;
const ABS: AddressingMode = AddressingMode::Absolute;
const ABX: AddressingMode = AddressingMode::AbsoluteX;
const ABY: AddressingMode = AddressingMode::AbsoluteY;
const IND: AddressingMode = AddressingMode::Indirect;
const IZP: AddressingMode = AddressingMode::ZeroPageIndirect;
const IZX: AddressingMode = AddressingMode::IndexedIndirect;
const IZY: AddressingMode = AddressingMode::IndirectIndexed;
const IAX: AddressingMode = AddressingMode::AbsoluteIndexedIndirect;
const ZPR: AddressingMode = AddressingMode::ZeroPageRelative;

use Operation::*;

/// 1バイト1サイクルの未定義NOP
const NOP1: Opcode = o("NOP", IMP, Nop, 1);
/// 2バイト2サイクルの未定義NOP
const NOP2: Opcode = o("NOP", IMM, Nop, 2);

#[rustfmt::skip]
pub const OPCODES: [Opcode; 256] = [
    // 0x00
    o("BRK", IMP, Brk, 7),   o("ORA", IZX, Ora, 6),   NOP2,                    NOP1,
    o("TSB", ZP, Tsb, 5),    o("ORA", ZP, Ora, 3),    o("ASL", ZP, Asl, 5),    o("RMB0", ZP, Rmb(0), 5),
    o("PHP", IMP, Php, 3),   o("ORA", IMM, Ora, 2),   o("ASL", ACC, Asl, 2),   NOP1,
    o("TSB", ABS, Tsb, 6),   o("ORA", ABS, Ora, 4),   o("ASL", ABS, Asl, 6),   o("BBR0", ZPR, Bbr(0), 5),
    // 0x10
    o("BPL", REL, Bpl, 2),   p("ORA", IZY, Ora, 5),   o("ORA", IZP, Ora, 5),   NOP1,
    o("TRB", ZP, Trb, 5),    o("ORA", ZPX, Ora, 4),   o("ASL", ZPX, Asl, 6),   o("RMB1", ZP, Rmb(1), 5),
    o("CLC", IMP, Clc, 2),   p("ORA", ABY, Ora, 4),   o("INC", ACC, Inc, 2),   NOP1,
    o("TRB", ABS, Trb, 6),   p("ORA", ABX, Ora, 4),   p("ASL", ABX, Asl, 6),   o("BBR1", ZPR, Bbr(1), 5),
    // 0x20
    o("JSR", ABS, Jsr, 6),   o("AND", IZX, And, 6),   NOP2,                    NOP1,
    o("BIT", ZP, Bit, 3),    o("AND", ZP, And, 3),    o("ROL", ZP, Rol, 5),    o("RMB2", ZP, Rmb(2), 5),
    o("PLP", IMP, Plp, 4),   o("AND", IMM, And, 2),   o("ROL", ACC, Rol, 2),   NOP1,
    o("BIT", ABS, Bit, 4),   o("AND", ABS, And, 4),   o("ROL", ABS, Rol, 6),   o("BBR2", ZPR, Bbr(2), 5),
    // 0x30
    o("BMI", REL, Bmi, 2),   p("AND", IZY, And, 5),   o("AND", IZP, And, 5),   NOP1,
    o("BIT", ZPX, Bit, 4),   o("AND", ZPX, And, 4),   o("ROL", ZPX, Rol, 6),   o("RMB3", ZP, Rmb(3), 5),
    o("SEC", IMP, Sec, 2),   p("AND", ABY, And, 4),   o("DEC", ACC, Dec, 2),   NOP1,
    p("BIT", ABX, Bit, 4),   p("AND", ABX, And, 4),   p("ROL", ABX, Rol, 6),   o("BBR3", ZPR, Bbr(3), 5),
    // 0x40
    o("RTI", IMP, Rti, 6),   o("EOR", IZX, Eor, 6),   NOP2,                    NOP1,
    o("NOP", ZP, Nop, 3),    o("EOR", ZP, Eor, 3),    o("LSR", ZP, Lsr, 5),    o("RMB4", ZP, Rmb(4), 5),
    o("PHA", IMP, Pha, 3),   o("EOR", IMM, Eor, 2),   o("LSR", ACC, Lsr, 2),   NOP1,
    o("JMP", ABS, Jmp, 3),   o("EOR", ABS, Eor, 4),   o("LSR", ABS, Lsr, 6),   o("BBR4", ZPR, Bbr(4), 5),
    // 0x50
    o("BVC", REL, Bvc, 2),   p("EOR", IZY, Eor, 5),   o("EOR", IZP, Eor, 5),   NOP1,
    o("NOP", ZPX, Nop, 4),   o("EOR", ZPX, Eor, 4),   o("LSR", ZPX, Lsr, 6),   o("RMB5", ZP, Rmb(5), 5),
    o("CLI", IMP, Cli, 2),   p("EOR", ABY, Eor, 4),   o("PHY", IMP, Phy, 3),   NOP1,
    o("NOP", ABS, Nop, 8),   p("EOR", ABX, Eor, 4),   p("LSR", ABX, Lsr, 6),   o("BBR5", ZPR, Bbr(5), 5),
    // 0x60
    o("RTS", IMP, Rts, 6),   o("ADC", IZX, Adc, 6),   NOP2,                    NOP1,
    o("STZ", ZP, Stz, 3),    o("ADC", ZP, Adc, 3),    o("ROR", ZP, Ror, 5),    o("RMB6", ZP, Rmb(6), 5),
    o("PLA", IMP, Pla, 4),   o("ADC", IMM, Adc, 2),   o("ROR", ACC, Ror, 2),   NOP1,
    o("JMP", IND, Jmp, 6),   o("ADC", ABS, Adc, 4),   o("ROR", ABS, Ror, 6),   o("BBR6", ZPR, Bbr(6), 5),
    // 0x70
    o("BVS", REL, Bvs, 2),   p("ADC", IZY, Adc, 5),   o("ADC", IZP, Adc, 5),   NOP1,
    o("STZ", ZPX, Stz, 4),   o("ADC", ZPX, Adc, 4),   o("ROR", ZPX, Ror, 6),   o("RMB7", ZP, Rmb(7), 5),
    o("SEI", IMP, Sei, 2),   p("ADC", ABY, Adc, 4),   o("PLY", IMP, Ply, 4),   NOP1,
    o("JMP", IAX, Jmp, 6),   p("ADC", ABX, Adc, 4),   p("ROR", ABX, Ror, 6),   o("BBR7", ZPR, Bbr(7), 5),
    // 0x80
    o("BRA", REL, Bra, 2),   o("STA", IZX, Sta, 6),   NOP2,                    NOP1,
    o("STY", ZP, Sty, 3),    o("STA", ZP, Sta, 3),    o("STX", ZP, Stx, 3),    o("SMB0", ZP, Smb(0), 5),
    o("DEY", IMP, Dey, 2),   o("BIT", IMM, Bit, 2),   o("TXA", IMP, Txa, 2),   NOP1,
    o("STY", ABS, Sty, 4),   o("STA", ABS, Sta, 4),   o("STX", ABS, Stx, 4),   o("BBS0", ZPR, Bbs(0), 5),
    // 0x90
    o("BCC", REL, Bcc, 2),   o("STA", IZY, Sta, 6),   o("STA", IZP, Sta, 5),   NOP1,
    o("STY", ZPX, Sty, 4),   o("STA", ZPX, Sta, 4),   o("STX", ZPY, Stx, 4),   o("SMB1", ZP, Smb(1), 5),
    o("TYA", IMP, Tya, 2),   o("STA", ABY, Sta, 5),   o("TXS", IMP, Txs, 2),   NOP1,
    o("STZ", ABS, Stz, 4),   o("STA", ABX, Sta, 5),   o("STZ", ABX, Stz, 5),   o("BBS1", ZPR, Bbs(1), 5),
    // 0xA0
    o("LDY", IMM, Ldy, 2),   o("LDA", IZX, Lda, 6),   o("LDX", IMM, Ldx, 2),   NOP1,
    o("LDY", ZP, Ldy, 3),    o("LDA", ZP, Lda, 3),    o("LDX", ZP, Ldx, 3),    o("SMB2", ZP, Smb(2), 5),
    o("TAY", IMP, Tay, 2),   o("LDA", IMM, Lda, 2),   o("TAX", IMP, Tax, 2),   NOP1,
    o("LDY", ABS, Ldy, 4),   o("LDA", ABS, Lda, 4),   o("LDX", ABS, Ldx, 4),   o("BBS2", ZPR, Bbs(2), 5),
    // 0xB0
    o("BCS", REL, Bcs, 2),   p("LDA", IZY, Lda, 5),   o("LDA", IZP, Lda, 5),   NOP1,
    o("LDY", ZPX, Ldy, 4),   o("LDA", ZPX, Lda, 4),   o("LDX", ZPY, Ldx, 4),   o("SMB3", ZP, Smb(3), 5),
    o("CLV", IMP, Clv, 2),   p("LDA", ABY, Lda, 4),   o("TSX", IMP, Tsx, 2),   NOP1,
    p("LDY", ABX, Ldy, 4),   p("LDA", ABX, Lda, 4),   p("LDX", ABY, Ldx, 4),   o("BBS3", ZPR, Bbs(3), 5),
    // 0xC0
    o("CPY", IMM, Cpy, 2),   o("CMP", IZX, Cmp, 6),   NOP2,                    NOP1,
    o("CPY", ZP, Cpy, 3),    o("CMP", ZP, Cmp, 3),    o("DEC", ZP, Dec, 5),    o("SMB4", ZP, Smb(4), 5),
    o("INY", IMP, Iny, 2),   o("CMP", IMM, Cmp, 2),   o("DEX", IMP, Dex, 2),   o("WAI", IMP, Wai, 3),
    o("CPY", ABS, Cpy, 4),   o("CMP", ABS, Cmp, 4),   o("DEC", ABS, Dec, 6),   o("BBS4", ZPR, Bbs(4), 5),
    // 0xD0
    o("BNE", REL, Bne, 2),   p("CMP", IZY, Cmp, 5),   o("CMP", IZP, Cmp, 5),   NOP1,
    o("NOP", ZPX, Nop, 4),   o("CMP", ZPX, Cmp, 4),   o("DEC", ZPX, Dec, 6),   o("SMB5", ZP, Smb(5), 5),
    o("CLD", IMP, Cld, 2),   p("CMP", ABY, Cmp, 4),   o("PHX", IMP, Phx, 3),   o("STP", IMP, Stp, 3),
    o("NOP", ABS, Nop, 4),   p("CMP", ABX, Cmp, 4),   o("DEC", ABX, Dec, 7),   o("BBS5", ZPR, Bbs(5), 5),
    // 0xE0
    o("CPX", IMM, Cpx, 2),   o("SBC", IZX, Sbc, 6),   NOP2,                    NOP1,
    o("CPX", ZP, Cpx, 3),    o("SBC", ZP, Sbc, 3),    o("INC", ZP, Inc, 5),    o("SMB6", ZP, Smb(6), 5),
    o("INX", IMP, Inx, 2),   o("SBC", IMM, Sbc, 2),   o("NOP", IMP, Nop, 2),   NOP1,
    o("CPX", ABS, Cpx, 4),   o("SBC", ABS, Sbc, 4),   o("INC", ABS, Inc, 6),   o("BBS6", ZPR, Bbs(6), 5),
    // 0xF0
    o("BEQ", REL, Beq, 2),   p("SBC", IZY, Sbc, 5),   o("SBC", IZP, Sbc, 5),   NOP1,
    o("NOP", ZPX, Nop, 4),   o("SBC", ZPX, Sbc, 4),   o("INC", ZPX, Inc, 6),   o("SMB7", ZP, Smb(7), 5),
    o("SED", IMP, Sed, 2),   p("SBC", ABY, Sbc, 4),   o("PLX", IMP, Plx, 4),   NOP1,
    o("NOP", ABS, Nop, 4),   p("SBC", ABX, Sbc, 4),   o("INC", ABX, Inc, 7),   o("BBS7", ZPR, Bbs(7), 5),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_spot_checks() {
        assert_eq!(OPCODES[0xA9].mnemonic, "LDA");
        assert_eq!(OPCODES[0xA9].mode, AddressingMode::Immediate);
        assert_eq!(OPCODES[0x6C].cycles, 6);
        assert_eq!(OPCODES[0xCE].cycles, 6);
        assert_eq!(OPCODES[0xCB].operation, Operation::Wai);
        assert_eq!(OPCODES[0xDB].operation, Operation::Stp);
        assert_eq!(OPCODES[0x5C].cycles, 8);
        assert_eq!(OPCODES[0xFF].operation, Operation::Bbs(7));
    }

    #[test]
    fn test_undefined_opcodes_are_nops() {
        for low in [0x03usize, 0x0B] {
            for high in 0..16 {
                let entry = &OPCODES[(high << 4) | low];
                if entry.operation == Operation::Wai || entry.operation == Operation::Stp {
                    continue;
                }
                assert_eq!(entry.operation, Operation::Nop);
                assert_eq!(entry.cycles, 1);
            }
        }
        for code in [0x02usize, 0x22, 0x42, 0x62, 0x82, 0xC2, 0xE2] {
            assert_eq!(OPCODES[code].operation, Operation::Nop);
            assert_eq!(OPCODES[code].mode.operand_len(), 1);
        }
    }

    #[test]
    fn test_only_reads_carry_page_penalty() {
        for entry in OPCODES.iter() {
            if entry.page_penalty {
                assert!(matches!(
                    entry.mode,
                    AddressingMode::AbsoluteX | AddressingMode::AbsoluteY | AddressingMode::IndirectIndexed
                ));
                assert!(!matches!(entry.operation, Operation::Sta | Operation::Stz));
            }
        }
    }
}
