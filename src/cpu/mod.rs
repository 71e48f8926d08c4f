//! WDC 65C02 CPU Emulator
//!
//! Apple IIe (Enhanced) で使用される65C02プロセッサのエミュレーション実装
//! 命令は256エントリのオペコードテーブルで駆動される

mod addressing;
mod operations;
pub mod disasm;
pub mod opcodes;

pub use addressing::AddressingMode;
pub use opcodes::{Opcode, Operation, OPCODES};

use serde::{Deserialize, Serialize};

/// CPUのステータスレジスタのフラグビット
pub mod flags {
    pub const CARRY: u8 = 0b0000_0001;      // C: キャリーフラグ
    pub const ZERO: u8 = 0b0000_0010;       // Z: ゼロフラグ
    pub const IRQ_DISABLE: u8 = 0b0000_0100; // I: 割り込み禁止フラグ
    pub const DECIMAL: u8 = 0b0000_1000;    // D: BCDモードフラグ
    pub const BREAK: u8 = 0b0001_0000;      // B: ブレークフラグ
    pub const UNUSED: u8 = 0b0010_0000;     // 未使用（常に1）
    pub const OVERFLOW: u8 = 0b0100_0000;   // V: オーバーフローフラグ
    pub const NEGATIVE: u8 = 0b1000_0000;   // N: 負数フラグ
}

/// リセットベクター
pub const RESET_VECTOR: u16 = 0xFFFC;
/// NMIベクター
pub const NMI_VECTOR: u16 = 0xFFFA;
/// IRQ/BRKベクター
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// リセット・割り込みシーケンスのサイクル数
const INTERRUPT_CYCLES: u64 = 7;

/// CPUの実行モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuMode {
    /// 通常実行
    Running,
    /// デバッガからの1命令実行（呼び出し側がRunningに戻す）
    SingleStep,
    /// STP命令で停止（リセットのみで復帰）
    Stopped,
    /// WAI命令で割り込み待ち
    Waiting,
}

/// CPUレジスタの状態
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// アキュムレータ（A）
    pub a: u8,
    /// Xインデックスレジスタ
    pub x: u8,
    /// Yインデックスレジスタ
    pub y: u8,
    /// スタックポインタ
    pub sp: u8,
    /// プログラムカウンタ
    pub pc: u16,
    /// ステータスレジスタ（プロセッサフラグ）
    pub status: u8,
}

impl Registers {
    /// フラグをセット
    pub fn set_flag(&mut self, flag: u8, value: bool) {
        if value {
            self.status |= flag;
        } else {
            self.status &= !flag;
        }
    }

    /// フラグを取得
    pub fn get_flag(&self, flag: u8) -> bool {
        (self.status & flag) != 0
    }

    /// ゼロフラグと負数フラグを値に基づいて更新
    pub fn update_zero_negative_flags(&mut self, value: u8) {
        self.set_flag(flags::ZERO, value == 0);
        self.set_flag(flags::NEGATIVE, (value & 0x80) != 0);
    }
}

/// メモリバスインターフェース
/// CPUがメモリにアクセスするために必要なトレイト
pub trait MemoryBus {
    /// メモリから1バイト読み取り
    fn read(&mut self, address: u16) -> u8;
    /// メモリに1バイト書き込み
    fn write(&mut self, address: u16, value: u8);
    /// 命令フェッチ直前にCPUの累積サイクルを通知する
    ///
    /// フローティングバスの値やパドルのタイマーはこの値から作られる。
    fn sync(&mut self, _ticks: u64) {}
}

/// 65C02 CPUエミュレータ
///
/// 生成直後は`Stopped`状態で、`reset`を呼ぶまで命令を実行しない。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPUレジスタ
    pub regs: Registers,
    /// 累積サイクル数
    pub ticks: u64,
    /// 実行モード
    pub mode: CpuMode,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// 新しいCPUインスタンスを作成（未リセット）
    pub fn new() -> Self {
        Cpu {
            regs: Registers::default(),
            ticks: 0,
            mode: CpuMode::Stopped,
        }
    }

    /// CPUをリセット
    pub fn reset<M: MemoryBus>(&mut self, memory: &mut M) {
        self.regs.pc = self.read_word(memory, RESET_VECTOR);
        self.regs.sp = 0xFF;
        self.regs.set_flag(flags::IRQ_DISABLE, true);
        self.regs.set_flag(flags::UNUSED, true);
        self.mode = CpuMode::Running;
        self.ticks += INTERRUPT_CYCLES;
    }

    /// IRQ（割り込み要求）
    ///
    /// WAIで待機中なら割り込み禁止フラグに関わらず実行を再開する。
    pub fn irq<M: MemoryBus>(&mut self, memory: &mut M) {
        if self.mode == CpuMode::Waiting {
            self.mode = CpuMode::Running;
        }
        if self.regs.get_flag(flags::IRQ_DISABLE) {
            return;
        }
        self.interrupt(memory, IRQ_VECTOR);
    }

    /// NMI（ノンマスカブル割り込み）
    pub fn nmi<M: MemoryBus>(&mut self, memory: &mut M) {
        if self.mode == CpuMode::Waiting {
            self.mode = CpuMode::Running;
        }
        self.interrupt(memory, NMI_VECTOR);
    }

    /// 割り込みシーケンス: PCH, PCL, P(B=0) をプッシュしてベクターへ
    fn interrupt<M: MemoryBus>(&mut self, memory: &mut M, vector: u16) {
        self.push_word(memory, self.regs.pc);
        let status = (self.regs.status | flags::UNUSED) & !flags::BREAK;
        self.push_byte(memory, status);
        self.regs.set_flag(flags::IRQ_DISABLE, true);
        self.regs.set_flag(flags::DECIMAL, false);
        self.regs.pc = self.read_word(memory, vector);
        self.ticks += INTERRUPT_CYCLES;
    }

    /// 指定サイクル数以上を消費するまで命令を実行し、PCを返す
    ///
    /// 命令は常に最後まで実行されるため、目標を数サイクル超えることがある。
    pub fn execute<M: MemoryBus>(&mut self, memory: &mut M, additional_cycles: u64) -> u16 {
        let target = self.ticks.saturating_add(additional_cycles);
        while self.ticks < target {
            if self.step(memory) == 0 {
                break;
            }
        }
        self.regs.pc
    }

    /// 1命令を実行し、消費したサイクル数を返す
    ///
    /// `Stopped` / `Waiting` 状態では何もせず0を返す。
    pub fn step<M: MemoryBus>(&mut self, memory: &mut M) -> u32 {
        match self.mode {
            CpuMode::Running | CpuMode::SingleStep => {}
            CpuMode::Stopped | CpuMode::Waiting => return 0,
        }

        memory.sync(self.ticks);
        let opcode = self.fetch_byte(memory);
        let entry = &OPCODES[opcode as usize];
        let cycles = self.dispatch(memory, entry);
        self.ticks += cycles as u64;
        cycles
    }

    /// プログラムカウンタを取得
    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    /// プログラムカウンタを設定（デバッガ用）
    pub fn set_pc(&mut self, address: u16) {
        self.regs.pc = address;
    }

    /// PCから1バイトフェッチしてPCをインクリメント
    fn fetch_byte<M: MemoryBus>(&mut self, memory: &mut M) -> u8 {
        let value = memory.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    /// リトルエンディアンの16ビット値を読み取り
    fn read_word<M: MemoryBus>(&mut self, memory: &mut M, address: u16) -> u16 {
        let low = memory.read(address) as u16;
        let high = memory.read(address.wrapping_add(1)) as u16;
        (high << 8) | low
    }

    /// スタックに1バイトプッシュ
    fn push_byte<M: MemoryBus>(&mut self, memory: &mut M, value: u8) {
        memory.write(0x0100 | self.regs.sp as u16, value);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
    }

    /// スタックから1バイトポップ
    fn pop_byte<M: MemoryBus>(&mut self, memory: &mut M) -> u8 {
        self.regs.sp = self.regs.sp.wrapping_add(1);
        memory.read(0x0100 | self.regs.sp as u16)
    }

    /// スタックに2バイトプッシュ（上位バイト先）
    fn push_word<M: MemoryBus>(&mut self, memory: &mut M, value: u16) {
        self.push_byte(memory, (value >> 8) as u8);
        self.push_byte(memory, value as u8);
    }

    /// スタックから2バイトポップ
    fn pop_word<M: MemoryBus>(&mut self, memory: &mut M) -> u16 {
        let low = self.pop_byte(memory) as u16;
        let high = self.pop_byte(memory) as u16;
        (high << 8) | low
    }
}
