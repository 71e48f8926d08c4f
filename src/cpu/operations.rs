//! 命令の実行
//!
//! オペコードテーブルのエントリを受け取り、オペランド解決・演算・サイクル加算を行う

use super::addressing::Operand;
use super::opcodes::{Opcode, Operation};
use super::{flags, AddressingMode, Cpu, CpuMode, MemoryBus, IRQ_VECTOR};

impl Cpu {
    /// テーブルエントリを実行し、消費サイクル数を返す
    pub(super) fn dispatch<M: MemoryBus>(&mut self, memory: &mut M, entry: &Opcode) -> u32 {
        let (operand, crossed) = self.resolve_operand(memory, entry.mode);
        let mut cycles = entry.cycles as u32;
        if entry.page_penalty && crossed {
            cycles += 1;
        }

        match entry.operation {
            // ロード/ストア
            Operation::Lda => {
                let value = self.load(memory, operand);
                self.regs.a = value;
                self.regs.update_zero_negative_flags(value);
            }
            Operation::Ldx => {
                let value = self.load(memory, operand);
                self.regs.x = value;
                self.regs.update_zero_negative_flags(value);
            }
            Operation::Ldy => {
                let value = self.load(memory, operand);
                self.regs.y = value;
                self.regs.update_zero_negative_flags(value);
            }
            Operation::Sta => self.store(memory, operand, self.regs.a),
            Operation::Stx => self.store(memory, operand, self.regs.x),
            Operation::Sty => self.store(memory, operand, self.regs.y),
            Operation::Stz => self.store(memory, operand, 0),

            // 算術・論理
            Operation::Adc => {
                let value = self.load(memory, operand);
                self.adc(value);
            }
            Operation::Sbc => {
                let value = self.load(memory, operand);
                self.sbc(value);
            }
            Operation::And => {
                let value = self.load(memory, operand);
                self.regs.a &= value;
                self.regs.update_zero_negative_flags(self.regs.a);
            }
            Operation::Ora => {
                let value = self.load(memory, operand);
                self.regs.a |= value;
                self.regs.update_zero_negative_flags(self.regs.a);
            }
            Operation::Eor => {
                let value = self.load(memory, operand);
                self.regs.a ^= value;
                self.regs.update_zero_negative_flags(self.regs.a);
            }
            Operation::Cmp => {
                let value = self.load(memory, operand);
                self.compare(self.regs.a, value);
            }
            Operation::Cpx => {
                let value = self.load(memory, operand);
                self.compare(self.regs.x, value);
            }
            Operation::Cpy => {
                let value = self.load(memory, operand);
                self.compare(self.regs.y, value);
            }
            Operation::Bit => {
                let value = self.load(memory, operand);
                self.regs.set_flag(flags::ZERO, (self.regs.a & value) == 0);
                // BIT #imm はZのみ変更
                if !matches!(entry.mode, AddressingMode::Immediate) {
                    self.regs.set_flag(flags::NEGATIVE, (value & 0x80) != 0);
                    self.regs.set_flag(flags::OVERFLOW, (value & 0x40) != 0);
                }
            }
            Operation::Tsb => {
                let value = self.load(memory, operand);
                self.regs.set_flag(flags::ZERO, (self.regs.a & value) == 0);
                self.store(memory, operand, value | self.regs.a);
            }
            Operation::Trb => {
                let value = self.load(memory, operand);
                self.regs.set_flag(flags::ZERO, (self.regs.a & value) == 0);
                self.store(memory, operand, value & !self.regs.a);
            }

            // シフト・インクリメント（read-modify-write）
            Operation::Asl => self.modify(memory, operand, |cpu, v| {
                cpu.regs.set_flag(flags::CARRY, (v & 0x80) != 0);
                v << 1
            }),
            Operation::Lsr => self.modify(memory, operand, |cpu, v| {
                cpu.regs.set_flag(flags::CARRY, (v & 0x01) != 0);
                v >> 1
            }),
            Operation::Rol => self.modify(memory, operand, |cpu, v| {
                let carry_in = cpu.regs.get_flag(flags::CARRY) as u8;
                cpu.regs.set_flag(flags::CARRY, (v & 0x80) != 0);
                (v << 1) | carry_in
            }),
            Operation::Ror => self.modify(memory, operand, |cpu, v| {
                let carry_in = (cpu.regs.get_flag(flags::CARRY) as u8) << 7;
                cpu.regs.set_flag(flags::CARRY, (v & 0x01) != 0);
                (v >> 1) | carry_in
            }),
            Operation::Inc => self.modify(memory, operand, |_, v| v.wrapping_add(1)),
            Operation::Dec => self.modify(memory, operand, |_, v| v.wrapping_sub(1)),
            Operation::Inx => {
                self.regs.x = self.regs.x.wrapping_add(1);
                self.regs.update_zero_negative_flags(self.regs.x);
            }
            Operation::Iny => {
                self.regs.y = self.regs.y.wrapping_add(1);
                self.regs.update_zero_negative_flags(self.regs.y);
            }
            Operation::Dex => {
                self.regs.x = self.regs.x.wrapping_sub(1);
                self.regs.update_zero_negative_flags(self.regs.x);
            }
            Operation::Dey => {
                self.regs.y = self.regs.y.wrapping_sub(1);
                self.regs.update_zero_negative_flags(self.regs.y);
            }

            // ブランチ
            Operation::Bpl => cycles += self.branch_on(operand, !self.regs.get_flag(flags::NEGATIVE)),
            Operation::Bmi => cycles += self.branch_on(operand, self.regs.get_flag(flags::NEGATIVE)),
            Operation::Bvc => cycles += self.branch_on(operand, !self.regs.get_flag(flags::OVERFLOW)),
            Operation::Bvs => cycles += self.branch_on(operand, self.regs.get_flag(flags::OVERFLOW)),
            Operation::Bcc => cycles += self.branch_on(operand, !self.regs.get_flag(flags::CARRY)),
            Operation::Bcs => cycles += self.branch_on(operand, self.regs.get_flag(flags::CARRY)),
            Operation::Bne => cycles += self.branch_on(operand, !self.regs.get_flag(flags::ZERO)),
            Operation::Beq => cycles += self.branch_on(operand, self.regs.get_flag(flags::ZERO)),
            Operation::Bra => cycles += self.branch_on(operand, true),
            Operation::Bbr(bit) | Operation::Bbs(bit) => {
                if let Operand::ZeroPageRelative { zp, offset } = operand {
                    let set = memory.read(zp as u16) & (1 << bit) != 0;
                    let want_set = matches!(entry.operation, Operation::Bbs(_));
                    // BBR/BBSは成立・不成立に関わらず5サイクル固定
                    self.branch(offset, set == want_set);
                }
            }
            Operation::Rmb(bit) => {
                let value = self.load(memory, operand);
                self.store(memory, operand, value & !(1 << bit));
            }
            Operation::Smb(bit) => {
                let value = self.load(memory, operand);
                self.store(memory, operand, value | (1 << bit));
            }

            // ジャンプ・サブルーチン
            Operation::Jmp => {
                if let Operand::Address(addr) = operand {
                    self.regs.pc = addr;
                }
            }
            Operation::Jsr => {
                if let Operand::Address(addr) = operand {
                    self.push_word(memory, self.regs.pc.wrapping_sub(1));
                    self.regs.pc = addr;
                }
            }
            Operation::Rts => {
                self.regs.pc = self.pop_word(memory).wrapping_add(1);
            }
            Operation::Rti => {
                let status = self.pop_byte(memory);
                self.regs.status = status | flags::UNUSED;
                self.regs.pc = self.pop_word(memory);
            }
            Operation::Brk => {
                // パディングバイトを飛ばす
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.push_word(memory, self.regs.pc);
                self.push_byte(memory, self.regs.status | flags::BREAK | flags::UNUSED);
                self.regs.set_flag(flags::IRQ_DISABLE, true);
                self.regs.set_flag(flags::DECIMAL, false);
                self.regs.pc = self.read_word(memory, IRQ_VECTOR);
            }

            // スタック
            Operation::Pha => self.push_byte(memory, self.regs.a),
            Operation::Phx => self.push_byte(memory, self.regs.x),
            Operation::Phy => self.push_byte(memory, self.regs.y),
            Operation::Php => {
                self.push_byte(memory, self.regs.status | flags::BREAK | flags::UNUSED)
            }
            Operation::Pla => {
                self.regs.a = self.pop_byte(memory);
                self.regs.update_zero_negative_flags(self.regs.a);
            }
            Operation::Plx => {
                self.regs.x = self.pop_byte(memory);
                self.regs.update_zero_negative_flags(self.regs.x);
            }
            Operation::Ply => {
                self.regs.y = self.pop_byte(memory);
                self.regs.update_zero_negative_flags(self.regs.y);
            }
            Operation::Plp => {
                self.regs.status = self.pop_byte(memory) | flags::UNUSED;
            }

            // 転送
            Operation::Tax => {
                self.regs.x = self.regs.a;
                self.regs.update_zero_negative_flags(self.regs.x);
            }
            Operation::Tay => {
                self.regs.y = self.regs.a;
                self.regs.update_zero_negative_flags(self.regs.y);
            }
            Operation::Txa => {
                self.regs.a = self.regs.x;
                self.regs.update_zero_negative_flags(self.regs.a);
            }
            Operation::Tya => {
                self.regs.a = self.regs.y;
                self.regs.update_zero_negative_flags(self.regs.a);
            }
            Operation::Tsx => {
                self.regs.x = self.regs.sp;
                self.regs.update_zero_negative_flags(self.regs.x);
            }
            Operation::Txs => self.regs.sp = self.regs.x,

            // フラグ
            Operation::Clc => self.regs.set_flag(flags::CARRY, false),
            Operation::Sec => self.regs.set_flag(flags::CARRY, true),
            Operation::Cli => self.regs.set_flag(flags::IRQ_DISABLE, false),
            Operation::Sei => self.regs.set_flag(flags::IRQ_DISABLE, true),
            Operation::Cld => self.regs.set_flag(flags::DECIMAL, false),
            Operation::Sed => self.regs.set_flag(flags::DECIMAL, true),
            Operation::Clv => self.regs.set_flag(flags::OVERFLOW, false),

            Operation::Nop => {}
            Operation::Wai => self.mode = CpuMode::Waiting,
            Operation::Stp => self.mode = CpuMode::Stopped,
        }

        cycles
    }

    /// オペランドの値を読む
    fn load<M: MemoryBus>(&mut self, memory: &mut M, operand: Operand) -> u8 {
        match operand {
            Operand::Accumulator => self.regs.a,
            Operand::Address(addr) => memory.read(addr),
            _ => 0,
        }
    }

    /// オペランドに値を書く
    fn store<M: MemoryBus>(&mut self, memory: &mut M, operand: Operand, value: u8) {
        match operand {
            Operand::Accumulator => self.regs.a = value,
            Operand::Address(addr) => memory.write(addr, value),
            _ => {}
        }
    }

    /// read-modify-write。結果でZ/Nを更新する
    fn modify<M, F>(&mut self, memory: &mut M, operand: Operand, f: F)
    where
        M: MemoryBus,
        F: FnOnce(&mut Cpu, u8) -> u8,
    {
        let value = self.load(memory, operand);
        let result = f(self, value);
        self.regs.update_zero_negative_flags(result);
        self.store(memory, operand, result);
    }

    fn branch_on(&mut self, operand: Operand, condition: bool) -> u32 {
        match operand {
            Operand::Relative(offset) => self.branch(offset, condition),
            _ => 0,
        }
    }

    fn compare(&mut self, register: u8, value: u8) {
        let result = register.wrapping_sub(value);
        self.regs.set_flag(flags::CARRY, register >= value);
        self.regs.update_zero_negative_flags(result);
    }

    /// ADC（デシマルモード対応）
    ///
    /// Vは補正前の2進和から求め、Cは補正後の和から求める。
    fn adc(&mut self, value: u8) {
        let a = self.regs.a as u16;
        let v = value as u16;
        let mut sum = a + v + self.regs.get_flag(flags::CARRY) as u16;
        self.regs.set_flag(flags::OVERFLOW, ((sum ^ a) & (sum ^ v) & 0x80) != 0);
        if self.regs.get_flag(flags::DECIMAL) {
            sum += ((((sum + 0x66) ^ a ^ v) >> 3) & 0x22) * 3;
        }
        self.regs.set_flag(flags::CARRY, sum > 0xFF);
        self.regs.a = sum as u8;
        self.regs.update_zero_negative_flags(self.regs.a);
    }

    /// SBC: 補数をとった値でADCを行う（デシマルモードでは-0x66の事前補正）
    fn sbc(&mut self, value: u8) {
        let mut v = value ^ 0xFF;
        if self.regs.get_flag(flags::DECIMAL) {
            v = v.wrapping_sub(0x66);
        }
        self.adc(v);
    }
}
