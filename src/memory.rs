//! Apple IIe メモリサブシステム
//!
//! 64KBのアドレス空間をメイン/補助RAM、ROM、スロットROM、ランゲージカードに
//! 振り分けるバンクデコーダと、$C000-$C0FFのソフトスイッチを実装

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpu::MemoryBus;
use crate::disk::DiskController;
use crate::io::{Access, Audio, BankTag, Display, GameInput, NullAudio, NullDisplay, NullInput};

/// メイン/補助RAMのサイズ（$0000-$BFFF）
pub const RAM_SIZE: usize = 0xC000;
/// ROMサイズ（$C000-$FFFF）
pub const ROM_SIZE: usize = 0x4000;
/// ランゲージカード（$D000-$FFFF、バンク1）
pub const LC_SIZE: usize = 0x3000;
/// ランゲージカードのバンク2（$D000-$DFFF）
pub const BANK2_SIZE: usize = 0x1000;
/// スロットROMのサイズ
pub const SLOT_ROM_SIZE: usize = 0x100;
/// 共有拡張ROM（$C800-$CFFF）
pub const EXPANSION_ROM_SIZE: usize = 0x800;

/// ROM読み込みのエラー
#[derive(Debug, Error)]
pub enum RomError {
    #[error("invalid ROM size: {0} bytes (expected 16384 or 32768)")]
    BadSize(usize),
    #[error("invalid slot ROM size: {0} bytes (expected 256)")]
    BadSlotSize(usize),
    #[error("invalid slot number: {0} (expected 1-7)")]
    BadSlot(usize),
    #[error("invalid expansion ROM size: {0} bytes (expected 2048)")]
    BadExpansionSize(usize),
}

/// ソフトスイッチの状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftSwitches {
    /// $C000 キーボードラッチ（bit7 = ストローブ）
    pub keyboard: u8,
    pub store_80: bool,
    pub ramrd: bool,
    pub ramwrt: bool,
    pub altzp: bool,
    pub intcxrom: bool,
    pub slotc3rom: bool,
    pub col_80: bool,
    pub alt_char: bool,
    pub text_mode: bool,
    pub mixed_mode: bool,
    pub page2: bool,
    pub hires: bool,
    pub dhires: bool,
    /// ランゲージカード読み出し有効
    pub lc_read: bool,
    /// ランゲージカード書き込み有効
    pub lc_write: bool,
    pub lc_bank2: bool,
    /// 書き込み有効化のプリライトフリップフロップ
    pub lc_prewrite: bool,
    pub annunciator: [bool; 4],
    pub ioudis: bool,
    pub vertical_blank: bool,
}

impl Default for SoftSwitches {
    /// 電源投入時の状態
    fn default() -> Self {
        SoftSwitches {
            keyboard: 0,
            store_80: false,
            ramrd: false,
            ramwrt: false,
            altzp: false,
            intcxrom: false,
            slotc3rom: false,
            col_80: false,
            alt_char: false,
            text_mode: true,
            mixed_mode: false,
            page2: false,
            hires: false,
            dhires: false,
            lc_read: false,
            lc_write: true,
            lc_bank2: true,
            lc_prewrite: false,
            annunciator: [false, false, true, true],
            ioudis: false,
            vertical_blank: true,
        }
    }
}

/// フラグを0x80/0x00に変換
fn status(flag: bool) -> u8 {
    if flag {
        0x80
    } else {
        0x00
    }
}

/// Apple IIeメモリシステム
///
/// Disk IIコントローラと周辺機器へのハンドルを所有する。
pub struct Memory {
    pub main_ram: Box<[u8; RAM_SIZE]>,
    pub aux_ram: Box<[u8; RAM_SIZE]>,
    pub main_lc: Box<[u8; LC_SIZE]>,
    pub main_bank2: Box<[u8; BANK2_SIZE]>,
    pub aux_lc: Box<[u8; LC_SIZE]>,
    pub aux_bank2: Box<[u8; BANK2_SIZE]>,
    pub rom: Box<[u8; ROM_SIZE]>,
    /// スロット1〜7のROM（インデックス0は未使用）
    pub slot_roms: [[u8; SLOT_ROM_SIZE]; 8],
    pub expansion_rom: Box<[u8; EXPANSION_ROM_SIZE]>,
    pub switches: SoftSwitches,
    /// スロット6のDisk II
    pub disk: DiskController,
    display: Box<dyn Display + Send>,
    audio: Box<dyn Audio + Send>,
    input: Box<dyn GameInput + Send>,
    /// 直近の命令フェッチ時のCPUサイクル（フローティングバス用）
    ticks: u64,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// 周辺機器なしで作成
    pub fn new() -> Self {
        Self::with_devices(Box::new(NullDisplay), Box::new(NullAudio), Box::new(NullInput))
    }

    pub fn with_devices(
        display: Box<dyn Display + Send>,
        audio: Box<dyn Audio + Send>,
        input: Box<dyn GameInput + Send>,
    ) -> Self {
        let mut memory = Memory {
            main_ram: Box::new([0; RAM_SIZE]),
            aux_ram: Box::new([0; RAM_SIZE]),
            main_lc: Box::new([0; LC_SIZE]),
            main_bank2: Box::new([0; BANK2_SIZE]),
            aux_lc: Box::new([0; LC_SIZE]),
            aux_bank2: Box::new([0; BANK2_SIZE]),
            rom: Box::new([0; ROM_SIZE]),
            slot_roms: [[0; SLOT_ROM_SIZE]; 8],
            expansion_rom: Box::new([0; EXPANSION_ROM_SIZE]),
            switches: SoftSwitches::default(),
            disk: DiskController::new(),
            display,
            audio,
            input,
            ticks: 0,
        };
        memory.init();
        memory
    }

    pub fn set_display(&mut self, display: Box<dyn Display + Send>) {
        self.display = display;
    }

    pub fn set_audio(&mut self, audio: Box<dyn Audio + Send>) {
        self.audio = audio;
    }

    pub fn set_input(&mut self, input: Box<dyn GameInput + Send>) {
        self.input = input;
    }

    /// 電源投入時の状態に戻す（ROMとディスクはそのまま）
    pub fn init(&mut self) {
        self.switches = SoftSwitches::default();
        self.main_ram.fill(0);
        self.aux_ram.fill(0);
        self.main_lc.fill(0);
        self.main_bank2.fill(0);
        self.aux_lc.fill(0);
        self.aux_bank2.fill(0);

        // $4D と $D0 がゼロだと起動しないソフトがある
        self.main_ram[0x4D] = 0xAA;
        self.main_ram[0xD0] = 0xAA;
        self.display.invalidate();
    }

    /// システムROMを読み込む
    ///
    /// 16KB: $C000-$FFFF にそのまま配置
    /// 32KB: Apple IIe ROMイメージ。後半16KB ($4000-$7FFF) を使用
    pub fn load_rom(&mut self, rom_data: &[u8]) -> Result<(), RomError> {
        let image = match rom_data.len() {
            ROM_SIZE => rom_data,
            0x8000 => &rom_data[0x4000..0x8000],
            other => return Err(RomError::BadSize(other)),
        };
        self.rom.copy_from_slice(image);
        log::info!(
            "ROM loaded ({} bytes), reset vector ${:02X}{:02X}",
            rom_data.len(),
            self.rom[0x3FFD],
            self.rom[0x3FFC]
        );
        Ok(())
    }

    /// スロットROM（256バイト）を読み込む
    pub fn load_slot_rom(&mut self, slot: usize, data: &[u8]) -> Result<(), RomError> {
        if !(1..=7).contains(&slot) {
            return Err(RomError::BadSlot(slot));
        }
        if data.len() != SLOT_ROM_SIZE {
            return Err(RomError::BadSlotSize(data.len()));
        }
        self.slot_roms[slot].copy_from_slice(data);
        log::info!("Slot {} ROM loaded", slot);
        Ok(())
    }

    /// $C800-$CFFE に現れる周辺カードの拡張ROM（2KB）を読み込む
    pub fn load_expansion_rom(&mut self, data: &[u8]) -> Result<(), RomError> {
        if data.len() != EXPANSION_ROM_SIZE {
            return Err(RomError::BadExpansionSize(data.len()));
        }
        self.expansion_rom.copy_from_slice(data);
        log::info!("Expansion ROM loaded");
        Ok(())
    }

    /// Disk II ブートPROM（P5）をスロット6に読み込む
    pub fn load_disk_prom(&mut self, data: &[u8]) -> Result<(), RomError> {
        self.load_slot_rom(6, data)
    }

    /// キー入力（ASCII）。bit7を立ててラッチする
    pub fn set_key(&mut self, ascii: u8) {
        self.switches.keyboard = ascii | 0x80;
    }

    /// キーボードストローブが立っているか
    pub fn key_strobe(&self) -> bool {
        self.switches.keyboard & 0x80 != 0
    }

    /// 垂直帰線期間フラグ（$C019）
    pub fn set_vertical_blank(&mut self, vbl: bool) {
        self.switches.vertical_blank = vbl;
    }

    /// フローティングバスの値
    fn floating(&self) -> u8 {
        (self.ticks & 0xFF) as u8
    }

    /// $0000-$BFFF のアクセス先が補助RAMか
    fn ram_is_aux(&self, address: u16, access: Access) -> bool {
        let s = &self.switches;
        match address {
            0x0000..=0x01FF => s.altzp,
            0x0400..=0x07FF if s.store_80 => s.page2,
            0x2000..=0x3FFF if s.store_80 => s.page2 && s.hires,
            _ => match access {
                Access::Read => s.ramrd,
                Access::Write => s.ramwrt,
            },
        }
    }

    /// $D000-$FFFF のランゲージカードRAMへの参照
    fn lc_cell(&mut self, address: u16) -> &mut u8 {
        let bank2 = address < 0xE000 && self.switches.lc_bank2;
        match (self.switches.altzp, bank2) {
            (false, true) => &mut self.main_bank2[(address - 0xD000) as usize],
            (true, true) => &mut self.aux_bank2[(address - 0xD000) as usize],
            (false, false) => &mut self.main_lc[(address - 0xD000) as usize],
            (true, false) => &mut self.aux_lc[(address - 0xD000) as usize],
        }
    }

    fn lc_tag(&self) -> BankTag {
        if self.switches.altzp {
            BankTag::Aux
        } else {
            BankTag::Main
        }
    }

    /// $C100-$C7FF
    fn read_slot_rom(&self, address: u16) -> u8 {
        let slot = ((address >> 8) & 0x07) as usize;
        let internal = self.switches.intcxrom || (slot == 3 && !self.switches.slotc3rom);
        if internal {
            self.rom[(address - 0xC000) as usize]
        } else {
            self.slot_roms[slot][(address & 0xFF) as usize]
        }
    }

    /// ソフトスイッチ ($C000-$C0FF)
    ///
    /// 読み書きのどちらでも同じスイッチが反応する（$C000-$C00F は書き込みのみ）。
    fn soft_switch(&mut self, address: u16, value: u8, write: bool) -> u8 {
        let s = &mut self.switches;
        match address {
            // メモリ管理（書き込みのみ）と$C000キーボード
            0xC000 if !write => return s.keyboard,
            0xC000..=0xC00F => {
                if write {
                    let on = address & 1 == 1;
                    match address & 0x0E {
                        0x00 => s.store_80 = on,
                        0x02 => s.ramrd = on,
                        0x04 => s.ramwrt = on,
                        0x06 => s.intcxrom = on,
                        0x08 => s.altzp = on,
                        0x0A => s.slotc3rom = on,
                        0x0C => s.col_80 = on,
                        _ => s.alt_char = on,
                    }
                }
            }
            0xC010 => {
                s.keyboard &= 0x7F;
                return s.keyboard;
            }

            // ステータス
            0xC011 => return status(s.lc_bank2),
            0xC012 => return status(s.lc_read),
            0xC013 => return status(s.ramrd),
            0xC014 => return status(s.ramwrt),
            0xC015 => return status(s.intcxrom),
            0xC016 => return status(s.altzp),
            0xC017 => return status(s.slotc3rom),
            0xC018 => return status(s.store_80),
            0xC019 => return status(s.vertical_blank),
            0xC01A => return status(s.text_mode),
            0xC01B => return status(s.mixed_mode),
            0xC01C => return status(s.page2),
            0xC01D => return status(s.hires),
            0xC01E => return status(s.alt_char),
            0xC01F => return status(s.col_80),

            // スピーカー（$C020はカセット出力、$C033を使うソフトもある）
            0xC020 | 0xC030 | 0xC033 => self.audio.toggle(self.ticks),

            // ビデオモード
            0xC050..=0xC057 => {
                let on = address & 1 == 1;
                match address & 0x06 {
                    0x00 => s.text_mode = on,
                    0x02 => s.mixed_mode = on,
                    0x04 => s.page2 = on,
                    _ => s.hires = on,
                }
                self.display.invalidate();
            }

            // アナンシエータ（$C05E/$C05F はIOUDISに関わらずDHIRESも切り替える）
            0xC058..=0xC05F => {
                let on = address & 1 == 1;
                let n = ((address - 0xC058) >> 1) as usize;
                if !s.ioudis {
                    s.annunciator[n] = on;
                }
                if n == 3 {
                    s.dhires = !on;
                }
            }

            // ゲームI/O
            0xC061..=0xC063 => return status(self.input.button((address - 0xC061) as usize)),
            0xC064..=0xC067 => return self.input.paddle((address - 0xC064) as usize, self.ticks),
            0xC070 => self.input.reset_paddles(self.ticks),

            0xC07E => {
                if write {
                    s.ioudis = false;
                } else {
                    return status(s.ioudis);
                }
            }
            0xC07F => {
                if write {
                    s.ioudis = true;
                } else {
                    return status(s.dhires);
                }
            }

            // ランゲージカード
            0xC080..=0xC08F => {
                let bits = address & 0x0F;
                s.lc_bank2 = bits & 0x08 == 0;
                s.lc_read = (bits & 1) == ((bits >> 1) & 1);
                if bits & 1 == 1 {
                    // 2回連続のアクセスで書き込み有効（書き込みアクセスはフリップフロップを落とす）
                    s.lc_write |= s.lc_prewrite;
                    s.lc_prewrite = !write;
                } else {
                    s.lc_write = false;
                    s.lc_prewrite = false;
                }
                log::trace!(
                    "LC ${:04X}: bank2={} read={} write={}",
                    address,
                    s.lc_bank2,
                    s.lc_read,
                    s.lc_write
                );
            }

            // スロット6 Disk II
            0xC0E0..=0xC0EF => {
                if let Some(v) = self.disk.access(address, value) {
                    return v;
                }
            }

            _ => {}
        }
        self.floating()
    }
}

impl MemoryBus for Memory {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            0x0000..=0xBFFF => {
                if self.ram_is_aux(address, Access::Read) {
                    self.display.touch(BankTag::Aux, address, Access::Read);
                    self.aux_ram[address as usize]
                } else {
                    self.display.touch(BankTag::Main, address, Access::Read);
                    self.main_ram[address as usize]
                }
            }
            0xC000..=0xC0FF => {
                self.display.touch(BankTag::Main, address, Access::Read);
                self.soft_switch(address, 0, false)
            }
            0xC100..=0xC7FF => {
                self.display.touch(BankTag::Main, address, Access::Read);
                self.read_slot_rom(address)
            }
            0xC800..=0xCFFE => {
                self.display.touch(BankTag::Main, address, Access::Read);
                if self.switches.intcxrom || !self.switches.slotc3rom {
                    self.rom[(address - 0xC000) as usize]
                } else {
                    self.expansion_rom[(address - 0xC800) as usize]
                }
            }
            0xCFFF => {
                // 拡張ROM無効化。ディスクのモーターも止まる
                self.disk.motor_off();
                0
            }
            0xD000..=0xFFFF => {
                if self.switches.lc_read {
                    let tag = self.lc_tag();
                    self.display.touch(tag, address, Access::Read);
                    *self.lc_cell(address)
                } else {
                    self.display.touch(BankTag::Main, address, Access::Read);
                    self.rom[(address - 0xC000) as usize]
                }
            }
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0xBFFF => {
                if self.ram_is_aux(address, Access::Write) {
                    self.display.touch(BankTag::Aux, address, Access::Write);
                    self.aux_ram[address as usize] = value;
                } else {
                    self.display.touch(BankTag::Main, address, Access::Write);
                    self.main_ram[address as usize] = value;
                }
            }
            0xC000..=0xC0FF => {
                self.display.touch(BankTag::Main, address, Access::Write);
                self.soft_switch(address, value, true);
            }
            // ROM領域への書き込みは無視
            0xC100..=0xCFFE => {}
            0xCFFF => self.disk.motor_off(),
            0xD000..=0xFFFF => {
                if self.switches.lc_write {
                    let tag = self.lc_tag();
                    self.display.touch(tag, address, Access::Write);
                    *self.lc_cell(address) = value;
                } else {
                    self.display.touch(BankTag::Main, address, Access::Write);
                }
            }
        }
    }

    fn sync(&mut self, ticks: u64) {
        self.ticks = ticks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_state() {
        let mem = Memory::new();
        assert!(mem.switches.text_mode);
        assert!(mem.switches.lc_write);
        assert!(mem.switches.lc_bank2);
        assert!(!mem.switches.lc_read);
        assert_eq!(mem.main_ram[0x4D], 0xAA);
        assert_eq!(mem.main_ram[0xD0], 0xAA);
    }

    #[test]
    fn test_load_rom_sizes() {
        let mut mem = Memory::new();
        let mut rom32 = vec![0u8; 0x8000];
        rom32[0x7FFC] = 0x62;
        rom32[0x7FFD] = 0xFA;
        mem.load_rom(&rom32).unwrap();
        assert_eq!(mem.read(0xFFFC), 0x62);
        assert_eq!(mem.read(0xFFFD), 0xFA);
        assert!(matches!(mem.load_rom(&[0; 12288]), Err(RomError::BadSize(12288))));
        assert!(matches!(mem.load_slot_rom(0, &[0; 256]), Err(RomError::BadSlot(0))));
        assert!(matches!(mem.load_slot_rom(6, &[0; 255]), Err(RomError::BadSlotSize(255))));
        assert!(matches!(mem.load_expansion_rom(&[0; 256]), Err(RomError::BadExpansionSize(256))));
    }

    #[test]
    fn test_keyboard_latch_and_strobe() {
        let mut mem = Memory::new();
        mem.set_key(b'A');
        assert!(mem.key_strobe());
        assert_eq!(mem.read(0xC000), 0xC1);
        assert_eq!(mem.read(0xC010), 0x41);
        assert_eq!(mem.read(0xC000), 0x41);
        mem.set_key(b'B');
        mem.write(0xC010, 0);
        assert!(!mem.key_strobe());
    }

    #[test]
    fn test_floating_bus_follows_ticks() {
        let mut mem = Memory::new();
        mem.sync(0x1234);
        assert_eq!(mem.read(0xC040), 0x34);
        assert_eq!(mem.read(0xC0F5), 0x34);
    }

    #[test]
    fn test_dhires_ignores_ioudis() {
        let mut mem = Memory::new();
        mem.write(0xC07F, 0); // IOUDIS on
        mem.read(0xC05E);
        assert!(mem.switches.dhires);
        assert!(mem.switches.annunciator[3]);
        assert_eq!(mem.read(0xC07F), 0x80);
        mem.read(0xC05F);
        assert!(!mem.switches.dhires);
        mem.write(0xC07E, 0);
        mem.read(0xC05E);
        assert!(!mem.switches.annunciator[3]);
    }
}
