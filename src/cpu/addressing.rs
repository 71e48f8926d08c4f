//! アドレッシングモードの実装
//!
//! 65C02のアドレッシングモードを定義し、オペランドを実効アドレスに解決する

use super::{Cpu, MemoryBus};

/// アドレッシングモードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// 暗黙的
    Implied,
    /// アキュムレータ - A
    Accumulator,
    /// 即値（Immediate） - #$nn
    Immediate,
    /// ゼロページ - $nn
    ZeroPage,
    /// ゼロページ,X - $nn,X
    ZeroPageX,
    /// ゼロページ,Y - $nn,Y
    ZeroPageY,
    /// 相対（ブランチ命令用） - $nn
    Relative,
    /// 絶対 - $nnnn
    Absolute,
    /// 絶対,X - $nnnn,X
    AbsoluteX,
    /// 絶対,Y - $nnnn,Y
    AbsoluteY,
    /// 間接 - ($nnnn)
    Indirect,
    /// 間接（ゼロページ、65C02のみ） - ($nn)
    ZeroPageIndirect,
    /// 間接,X（プリインデックス） - ($nn,X)
    IndexedIndirect,
    /// 間接,Y（ポストインデックス） - ($nn),Y
    IndirectIndexed,
    /// 絶対インデックス間接（JMPのみ） - ($nnnn,X)
    AbsoluteIndexedIndirect,
    /// ゼロページ相対（BBR/BBS） - $nn,$rr
    ZeroPageRelative,
}

impl AddressingMode {
    /// オペランドのバイト数（オペコード自体を除く）
    pub fn operand_len(self) -> u16 {
        match self {
            AddressingMode::Implied | AddressingMode::Accumulator => 0,
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::ZeroPageX
            | AddressingMode::ZeroPageY
            | AddressingMode::Relative
            | AddressingMode::ZeroPageIndirect
            | AddressingMode::IndexedIndirect
            | AddressingMode::IndirectIndexed => 1,
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect
            | AddressingMode::AbsoluteIndexedIndirect
            | AddressingMode::ZeroPageRelative => 2,
        }
    }
}

/// 解決済みのオペランド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Operand {
    None,
    Accumulator,
    /// 実効アドレス（即値の場合はオペランドバイト自身のアドレス）
    Address(u16),
    /// ブランチのオフセット
    Relative(i8),
    /// BBR/BBSのテスト対象ゼロページアドレスとオフセット
    ZeroPageRelative { zp: u8, offset: i8 },
}

/// base + indexで下位バイトが桁上がりするか
fn crosses_page(base: u16, index: u8) -> bool {
    (base & 0x00FF) + index as u16 > 0x00FF
}

impl Cpu {
    /// ゼロページ上の16ビットポインタを読む（上位バイトはページ0内で折り返す）
    fn read_zp_pointer<M: MemoryBus>(&mut self, memory: &mut M, ptr: u8) -> u16 {
        let low = memory.read(ptr as u16) as u16;
        let high = memory.read(ptr.wrapping_add(1) as u16) as u16;
        (high << 8) | low
    }

    fn fetch_word<M: MemoryBus>(&mut self, memory: &mut M) -> u16 {
        let low = self.fetch_byte(memory) as u16;
        let high = self.fetch_byte(memory) as u16;
        (high << 8) | low
    }

    /// オペランドを解決し、インデックスでページを跨いだかどうかを返す
    ///
    /// ターゲットアドレス自体は読まない（副作用のあるI/Oを二重に叩かないため）。
    pub(super) fn resolve_operand<M: MemoryBus>(
        &mut self,
        memory: &mut M,
        mode: AddressingMode,
    ) -> (Operand, bool) {
        match mode {
            AddressingMode::Implied => (Operand::None, false),
            AddressingMode::Accumulator => (Operand::Accumulator, false),
            AddressingMode::Immediate => {
                let addr = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                (Operand::Address(addr), false)
            }
            AddressingMode::ZeroPage => {
                let addr = self.fetch_byte(memory) as u16;
                (Operand::Address(addr), false)
            }
            AddressingMode::ZeroPageX => {
                let base = self.fetch_byte(memory);
                (Operand::Address(base.wrapping_add(self.regs.x) as u16), false)
            }
            AddressingMode::ZeroPageY => {
                let base = self.fetch_byte(memory);
                (Operand::Address(base.wrapping_add(self.regs.y) as u16), false)
            }
            AddressingMode::Relative => {
                let offset = self.fetch_byte(memory) as i8;
                (Operand::Relative(offset), false)
            }
            AddressingMode::Absolute => {
                let addr = self.fetch_word(memory);
                (Operand::Address(addr), false)
            }
            AddressingMode::AbsoluteX => {
                let base = self.fetch_word(memory);
                let crossed = crosses_page(base, self.regs.x);
                (Operand::Address(base.wrapping_add(self.regs.x as u16)), crossed)
            }
            AddressingMode::AbsoluteY => {
                let base = self.fetch_word(memory);
                let crossed = crosses_page(base, self.regs.y);
                (Operand::Address(base.wrapping_add(self.regs.y as u16)), crossed)
            }
            AddressingMode::Indirect => {
                // 65C02ではページ境界バグは修正されている
                let ptr = self.fetch_word(memory);
                let addr = self.read_word(memory, ptr);
                (Operand::Address(addr), false)
            }
            AddressingMode::ZeroPageIndirect => {
                let ptr = self.fetch_byte(memory);
                let addr = self.read_zp_pointer(memory, ptr);
                (Operand::Address(addr), false)
            }
            AddressingMode::IndexedIndirect => {
                let ptr = self.fetch_byte(memory).wrapping_add(self.regs.x);
                let addr = self.read_zp_pointer(memory, ptr);
                (Operand::Address(addr), false)
            }
            AddressingMode::IndirectIndexed => {
                let ptr = self.fetch_byte(memory);
                let base = self.read_zp_pointer(memory, ptr);
                let crossed = crosses_page(base, self.regs.y);
                (Operand::Address(base.wrapping_add(self.regs.y as u16)), crossed)
            }
            AddressingMode::AbsoluteIndexedIndirect => {
                let ptr = self.fetch_word(memory).wrapping_add(self.regs.x as u16);
                let addr = self.read_word(memory, ptr);
                (Operand::Address(addr), false)
            }
            AddressingMode::ZeroPageRelative => {
                let zp = self.fetch_byte(memory);
                let offset = self.fetch_byte(memory) as i8;
                (Operand::ZeroPageRelative { zp, offset }, false)
            }
        }
    }

    /// ブランチを実行し、追加サイクル数を返す（不成立0、成立+1、ページ跨ぎ+2）
    pub(super) fn branch(&mut self, offset: i8, condition: bool) -> u32 {
        if !condition {
            return 0;
        }
        let old_pc = self.regs.pc;
        self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
        if (old_pc & 0xFF00) != (self.regs.pc & 0xFF00) {
            2
        } else {
            1
        }
    }
}
