//! Apple IIe エミュレータ
//!
//! CPUとメモリ（ディスクと周辺機器を含む）を統合し、フレーム単位で実行する

use std::path::Path;

use crate::cpu::{Cpu, CpuMode, MemoryBus};
use crate::disk::DiskError;
use crate::io::{Audio, Display, GameInput};
use crate::memory::{Memory, RomError};
use crate::savestate::{
    restore_slice, CpuState, DiskDriveState, DiskState, MemoryState, SaveState, StateError,
};

/// Apple IIeのクロック（Hz）
pub const CPU_FREQUENCY: f64 = 1_023_000.0;
/// 垂直帰線期間がフレームに占める割合
const VBLANK_FRACTION: f64 = 0.1;
/// ディスク高速化で追加実行する1回あたりのサイクル数
const DISK_SLICE_CYCLES: u64 = 5000;
/// 1フレームで追加実行する最大回数
const MAX_DISK_SLICES: u32 = 255;
/// 貼り付け時に1文字ごとに与えるサイクル数（Applesoftが処理できるだけ）
const PASTE_CYCLES_PER_KEY: u64 = 500_000;
/// ROMがコールドスタートかどうかを判定するパワーアップバイト
const POWER_UP_BYTE: u16 = 0x03F4;

/// Apple IIeエミュレータのメイン構造体
pub struct Apple2 {
    /// 65C02 CPU
    pub cpu: Cpu,
    /// メモリシステム（Disk IIを含む）
    pub memory: Memory,
    /// フレームカウンター
    pub frame_count: u64,
    /// 速度倍率（1.0 = 1.023MHz）
    pub speed: f64,
    /// 1秒あたりのフレーム数
    pub fps: u32,
    /// モーター回転中にCPUを余分に回してディスクアクセスを速くする
    pub disk_speedup: bool,
}

impl Default for Apple2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Apple2 {
    pub fn new() -> Self {
        Self::with_memory(Memory::new())
    }

    /// 周辺機器を接続して作成
    pub fn with_devices(
        display: Box<dyn Display + Send>,
        audio: Box<dyn Audio + Send>,
        input: Box<dyn GameInput + Send>,
    ) -> Self {
        Self::with_memory(Memory::with_devices(display, audio, input))
    }

    fn with_memory(memory: Memory) -> Self {
        Apple2 {
            cpu: Cpu::new(),
            memory,
            frame_count: 0,
            speed: 1.0,
            fps: 60,
            disk_speedup: true,
        }
    }

    /// システムROMを読み込む
    pub fn load_rom(&mut self, rom_data: &[u8]) -> Result<(), RomError> {
        self.memory.load_rom(rom_data)
    }

    /// Disk II ブートROMを読み込む
    pub fn load_disk_prom(&mut self, rom_data: &[u8]) -> Result<(), RomError> {
        self.memory.load_disk_prom(rom_data)
    }

    /// ディスクイメージを挿入
    pub fn insert_disk<P: AsRef<Path>>(&mut self, drive: usize, path: P) -> Result<(), DiskError> {
        self.memory.disk.load(path, drive)
    }

    /// 電源投入（RAMクリア、パワーアップバイトを壊してからリセット）
    pub fn cold_reset(&mut self) {
        self.memory.init();
        self.memory.write(POWER_UP_BYTE, 0);
        self.cpu.reset(&mut self.memory);
        log::info!("Cold reset, PC=${:04X}", self.cpu.regs.pc);
    }

    /// Ctrl-Reset
    pub fn warm_reset(&mut self) {
        self.cpu.reset(&mut self.memory);
        log::debug!("Warm reset, PC=${:04X}", self.cpu.regs.pc);
    }

    /// 1フレームあたりのCPUサイクル数
    pub fn frame_cycles(&self) -> u64 {
        (CPU_FREQUENCY * self.speed / self.fps.max(1) as f64) as u64
    }

    /// 指定サイクル数だけ実行
    pub fn run_cycles(&mut self, cycles: u64) -> u16 {
        self.cpu.execute(&mut self.memory, cycles)
    }

    /// 1フレーム分を実行
    ///
    /// フレームの最初の10%を垂直帰線期間とする。ディスク高速化が有効なら、
    /// 現在のドライブのモーターが止まるまで5000サイクルずつ追加で回す。
    pub fn run_frame(&mut self) {
        let budget = self.frame_cycles();
        let vbl = (budget as f64 * VBLANK_FRACTION) as u64;

        self.memory.set_vertical_blank(true);
        self.cpu.execute(&mut self.memory, vbl);
        self.memory.set_vertical_blank(false);
        self.cpu.execute(&mut self.memory, budget - vbl);

        if self.disk_speedup {
            let mut slices = 0;
            while self.memory.disk.is_motor_on() && slices < MAX_DISK_SLICES {
                self.cpu.execute(&mut self.memory, DISK_SLICE_CYCLES);
                slices += 1;
            }
        }

        self.frame_count += 1;
    }

    /// デバッガ用: 1命令だけ実行して消費サイクル数を返す
    pub fn step_instruction(&mut self) -> u32 {
        if self.cpu.mode != CpuMode::Running {
            return 0;
        }
        self.cpu.mode = CpuMode::SingleStep;
        let cycles = self.cpu.step(&mut self.memory);
        if self.cpu.mode == CpuMode::SingleStep {
            self.cpu.mode = CpuMode::Running;
        }
        cycles
    }

    /// キー入力
    pub fn key_down(&mut self, ascii: u8) {
        self.memory.set_key(ascii);
    }

    /// テキストをキー入力として流し込む（改行はリターンに変換）
    pub fn paste_text(&mut self, text: &str) {
        for byte in text.bytes() {
            let key = match byte {
                b'\n' => 0x0D,
                b'\r' => continue,
                b if b.is_ascii() => b,
                _ => continue,
            };
            self.memory.set_key(key);
            self.cpu.execute(&mut self.memory, PASTE_CYCLES_PER_KEY);
        }
    }

    /// 現在の状態をセーブステートとして取得
    pub fn save_state(&self) -> SaveState {
        let mem = &self.memory;
        let drive_state = |i: usize| {
            let unit = &mem.disk.units[i];
            DiskDriveState {
                data: unit.data.clone(),
                read_only: unit.read_only,
                motor_on: unit.motor_on,
                write_mode: unit.write_mode,
                track: unit.track,
                nibble: unit.nibble,
                path: unit.path.clone(),
                stepper: unit.stepper.clone(),
            }
        };
        SaveState {
            version: SaveState::CURRENT_VERSION,
            cpu: CpuState {
                regs: self.cpu.regs.clone(),
                ticks: self.cpu.ticks,
                mode: self.cpu.mode,
            },
            memory: MemoryState {
                main_ram: mem.main_ram.to_vec(),
                aux_ram: mem.aux_ram.to_vec(),
                main_lc: mem.main_lc.to_vec(),
                main_bank2: mem.main_bank2.to_vec(),
                aux_lc: mem.aux_lc.to_vec(),
                aux_bank2: mem.aux_bank2.to_vec(),
                switches: mem.switches.clone(),
            },
            disk: DiskState {
                current: mem.disk.current,
                latch: mem.disk.latch,
                drives: [drive_state(0), drive_state(1)],
            },
            frame_count: self.frame_count,
        }
    }

    /// セーブステートから状態を復元
    ///
    /// 検査に失敗した場合、状態は変更されない。
    pub fn load_state(&mut self, state: &SaveState) -> Result<(), StateError> {
        state.check_version()?;
        let m = &state.memory;
        let lengths = [
            (m.main_ram.len(), self.memory.main_ram.len(), "main_ram"),
            (m.aux_ram.len(), self.memory.aux_ram.len(), "aux_ram"),
            (m.main_lc.len(), self.memory.main_lc.len(), "main_lc"),
            (m.main_bank2.len(), self.memory.main_bank2.len(), "main_bank2"),
            (m.aux_lc.len(), self.memory.aux_lc.len(), "aux_lc"),
            (m.aux_bank2.len(), self.memory.aux_bank2.len(), "aux_bank2"),
        ];
        for (found, expected, field) in lengths {
            if found != expected {
                return Err(StateError::BadLength(field));
            }
        }
        for drive in &state.disk.drives {
            if drive.data.len() != crate::disk::IMAGE_SIZE {
                return Err(StateError::BadLength("disk.data"));
            }
            if !drive.stepper.is_valid() {
                return Err(StateError::BadValue("disk.stepper"));
            }
            if drive.track != drive.stepper.track() {
                return Err(StateError::BadValue("disk.track"));
            }
        }

        // CPU状態を復元
        self.cpu.regs = state.cpu.regs.clone();
        self.cpu.ticks = state.cpu.ticks;
        self.cpu.mode = state.cpu.mode;

        // メモリ状態を復元
        restore_slice(&mut self.memory.main_ram[..], &m.main_ram, "main_ram")?;
        restore_slice(&mut self.memory.aux_ram[..], &m.aux_ram, "aux_ram")?;
        restore_slice(&mut self.memory.main_lc[..], &m.main_lc, "main_lc")?;
        restore_slice(&mut self.memory.main_bank2[..], &m.main_bank2, "main_bank2")?;
        restore_slice(&mut self.memory.aux_lc[..], &m.aux_lc, "aux_lc")?;
        restore_slice(&mut self.memory.aux_bank2[..], &m.aux_bank2, "aux_bank2")?;
        self.memory.switches = m.switches.clone();

        // ディスク状態を復元
        let disk = &mut self.memory.disk;
        disk.current = state.disk.current & 1;
        disk.latch = state.disk.latch;
        for (unit, saved) in disk.units.iter_mut().zip(state.disk.drives.iter()) {
            restore_slice(&mut unit.data, &saved.data, "disk.data")?;
            unit.read_only = saved.read_only;
            unit.motor_on = saved.motor_on;
            unit.write_mode = saved.write_mode;
            unit.track = saved.stepper.track();
            unit.nibble = saved.nibble % crate::disk::TRACK_SIZE;
            unit.path = saved.path.clone();
            unit.file_name = saved
                .path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            unit.stepper = saved.stepper.clone();
        }

        self.frame_count = state.frame_count;
        log::info!("State restored, PC=${:04X}", self.cpu.regs.pc);
        Ok(())
    }
}

/// テスト用ROMを生成
///
/// リセットベクターが`entry`を指す16KBのROM。残りはNOPで埋める。
pub fn create_test_rom(entry: u16, program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0xEAu8; crate::memory::ROM_SIZE];
    let offset = entry.wrapping_sub(0xC000) as usize;
    if offset < rom.len() {
        let end = (offset + program.len()).min(rom.len());
        rom[offset..end].copy_from_slice(&program[..end - offset]);
    }
    rom[0x3FFC] = entry as u8;
    rom[0x3FFD] = (entry >> 8) as u8;
    rom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_with(program: &[u8]) -> Apple2 {
        let mut machine = Apple2::new();
        machine.load_rom(&create_test_rom(0xF000, program)).unwrap();
        machine.cold_reset();
        machine
    }

    #[test]
    fn test_cold_reset_clears_power_up_byte() {
        let mut machine = machine_with(&[]);
        assert_eq!(machine.cpu.regs.pc, 0xF000);
        assert_eq!(machine.memory.main_ram[0x03F4], 0);
        machine.memory.main_ram[0x0300] = 0x55;
        machine.warm_reset();
        assert_eq!(machine.memory.main_ram[0x0300], 0x55);
        machine.cold_reset();
        assert_eq!(machine.memory.main_ram[0x0300], 0);
    }

    #[test]
    fn test_frame_budget() {
        // JMP $F000
        let mut machine = machine_with(&[0x4C, 0x00, 0xF0]);
        assert_eq!(machine.frame_cycles(), 17050);
        let start = machine.cpu.ticks;
        machine.run_frame();
        let used = machine.cpu.ticks - start;
        // 2回のexecuteがそれぞれ最大2サイクル超過する
        assert!((17050..=17054).contains(&used), "used {}", used);
        assert!(!machine.memory.switches.vertical_blank);
        assert_eq!(machine.frame_count, 1);
    }

    #[test]
    fn test_step_instruction_returns_to_running() {
        // LDA #$2A
        let mut machine = machine_with(&[0xA9, 0x2A]);
        assert_eq!(machine.step_instruction(), 2);
        assert_eq!(machine.cpu.mode, CpuMode::Running);
        assert_eq!(machine.cpu.regs.a, 0x2A);
    }

    #[test]
    fn test_state_roundtrip_in_memory() {
        let mut machine = machine_with(&[0xA9, 0x2A]);
        machine.memory.aux_ram[0x1234] = 0x77;
        machine.memory.disk.units[1].data[100] = 0x96;
        let state = machine.save_state();

        let mut other = Apple2::new();
        other.load_state(&state).unwrap();
        assert_eq!(other.cpu.regs.pc, 0xF000);
        assert_eq!(other.memory.aux_ram[0x1234], 0x77);
        assert_eq!(other.memory.disk.units[1].data[100], 0x96);
    }

    #[test]
    fn test_load_state_rejects_version() {
        let machine = machine_with(&[]);
        let mut state = machine.save_state();
        state.version = 99;
        let mut other = Apple2::new();
        assert!(matches!(
            other.load_state(&state),
            Err(StateError::Version { found: 99, .. })
        ));
    }
}
