//! Apple IIeのメモリマップとソフトスイッチ
use std::sync::{Arc, Mutex};

use a2e::cpu::MemoryBus;
use a2e::io::{Access, Audio, BankTag, Display, NullAudio, NullDisplay, NullInput, Paddles};
use a2e::memory::{Memory, ROM_SIZE};

fn memory_with_rom() -> Memory {
    let mut mem = Memory::new();
    let mut rom = vec![0u8; ROM_SIZE];
    // $D000 と $FFFF にROMの目印
    rom[0x1000] = 0xD0;
    rom[0x3FFF] = 0xFF;
    // $C300 内蔵80桁ファームウェア、$C800 内蔵拡張ROM
    rom[0x0300] = 0xC3;
    rom[0x0800] = 0xC8;
    mem.load_rom(&rom).unwrap();
    mem
}

mod language_card {
    use super::*;

    #[test]
    fn write_enable_needs_two_accesses() {
        let mut mem = memory_with_rom();
        mem.read(0xC08A); // ROM読み出し、書き込み禁止
        assert!(!mem.switches.lc_write);

        mem.read(0xC08B);
        mem.write(0xD000, 0x55);
        assert_eq!(mem.main_lc[0], 0);

        mem.read(0xC08B);
        assert!(mem.switches.lc_read);
        assert!(!mem.switches.lc_bank2);
        mem.write(0xD000, 0x55);
        assert_eq!(mem.read(0xD000), 0x55);
        assert_eq!(mem.main_lc[0], 0x55);
    }

    #[test]
    fn even_access_clears_prewrite() {
        let mut mem = memory_with_rom();
        mem.read(0xC08A);
        mem.read(0xC08B);
        mem.read(0xC08A);
        mem.read(0xC08B);
        assert!(!mem.switches.lc_write);
        mem.read(0xC08B);
        assert!(mem.switches.lc_write);
    }

    #[test]
    fn write_access_does_not_arm_prewrite() {
        let mut mem = memory_with_rom();
        mem.read(0xC08A);
        mem.write(0xC08B, 0);
        assert!(!mem.switches.lc_prewrite);
        mem.write(0xC08B, 0);
        assert!(!mem.switches.lc_write);
    }

    #[test]
    fn banks_are_separate() {
        let mut mem = memory_with_rom();
        // バンク2 読み書き
        mem.read(0xC083);
        mem.read(0xC083);
        mem.write(0xD000, 0x22);
        mem.write(0xE000, 0xEE);
        // バンク1 読み書き
        mem.read(0xC08B);
        mem.read(0xC08B);
        mem.write(0xD000, 0x11);

        assert_eq!(mem.read(0xD000), 0x11);
        assert_eq!(mem.read(0xE000), 0xEE);
        mem.read(0xC083);
        assert_eq!(mem.read(0xD000), 0x22);
        assert_eq!(mem.main_bank2[0], 0x22);
        assert_eq!(mem.main_lc[0], 0x11);
    }

    #[test]
    fn rom_when_lc_read_disabled() {
        let mut mem = memory_with_rom();
        mem.read(0xC081); // ROM読み出し、書き込み準備
        mem.read(0xC081);
        mem.write(0xD000, 0x99);
        assert_eq!(mem.read(0xD000), 0xD0);
        assert_eq!(mem.read(0xFFFF), 0xFF);
        assert_eq!(mem.main_bank2[0], 0x99);
    }

    #[test]
    fn altzp_selects_aux_language_card() {
        let mut mem = memory_with_rom();
        mem.read(0xC08B);
        mem.read(0xC08B);
        mem.write(0xC009, 0); // ALTZP on
        mem.write(0xE123, 0xA5);
        mem.write(0x0080, 0x5A);
        assert_eq!(mem.aux_lc[0x1123], 0xA5);
        assert_eq!(mem.main_lc[0x1123], 0);
        assert_eq!(mem.aux_ram[0x80], 0x5A);

        mem.write(0xC008, 0); // ALTZP off
        assert_eq!(mem.read(0xE123), 0);
        assert_eq!(mem.read(0x0080), 0);
    }
}

mod aux_memory {
    use super::*;

    #[test]
    fn ramwrt_without_ramrd_reads_main() {
        let mut mem = memory_with_rom();
        mem.write(0xC005, 0); // RAMWRT on
        mem.write(0x0500, 0x42);
        assert_eq!(mem.read(0x0500), 0);
        assert_eq!(mem.aux_ram[0x0500], 0x42);
        mem.write(0xC003, 0); // RAMRD on
        assert_eq!(mem.read(0x0500), 0x42);
    }

    #[test]
    fn store80_page2_overrides_ramrd() {
        let mut mem = memory_with_rom();
        mem.write(0xC001, 0); // 80STORE on
        mem.read(0xC055); // PAGE2
        mem.write(0x0400, 0x01);
        mem.write(0x2000, 0x02);
        assert_eq!(mem.aux_ram[0x0400], 0x01);
        // HIRESが立っていないのでハイレゾページはRAMWRTに従う
        assert_eq!(mem.main_ram[0x2000], 0x02);

        mem.read(0xC057); // HIRES
        mem.write(0x2000, 0x03);
        assert_eq!(mem.aux_ram[0x2000], 0x03);

        mem.write(0xC003, 0); // RAMRD on でも表示ページは80STOREが優先
        mem.read(0xC054); // PAGE1
        assert_eq!(mem.read(0x0400), 0);
    }

    #[test]
    fn status_reads() {
        let mut mem = memory_with_rom();
        assert_eq!(mem.read(0xC013), 0x00);
        mem.write(0xC003, 0);
        assert_eq!(mem.read(0xC013), 0x80);
        assert_eq!(mem.read(0xC01A), 0x80); // TEXT
        mem.read(0xC050);
        assert_eq!(mem.read(0xC01A), 0x00);
        assert_eq!(mem.read(0xC011), 0x80); // 電源投入時はバンク2
    }
}

mod slot_rom {
    use super::*;

    #[test]
    fn slot6_prom_and_intcxrom() {
        let mut mem = memory_with_rom();
        let mut prom = [0u8; 256];
        prom[0] = 0xA2;
        mem.load_disk_prom(&prom).unwrap();
        assert_eq!(mem.read(0xC600), 0xA2);
        mem.write(0xC007, 0); // INTCXROM on
        assert_eq!(mem.read(0xC600), 0x00);
    }

    #[test]
    fn slot3_internal_until_slotc3rom() {
        let mut mem = memory_with_rom();
        assert_eq!(mem.read(0xC300), 0xC3);
        mem.write(0xC00B, 0); // SLOTC3ROM on
        assert_eq!(mem.read(0xC300), 0x00);
    }

    #[test]
    fn expansion_rom_behind_slotc3rom() {
        let mut mem = memory_with_rom();
        let mut card = vec![0u8; 0x800];
        card[0] = 0xE5;
        card[0x7FE] = 0x7E;
        mem.load_expansion_rom(&card).unwrap();
        assert_eq!(mem.read(0xC800), 0xC8);

        mem.write(0xC00B, 0); // SLOTC3ROM on
        assert_eq!(mem.read(0xC800), 0xE5);
        assert_eq!(mem.read(0xCFFE), 0x7E);

        mem.write(0xC007, 0); // INTCXROM on
        assert_eq!(mem.read(0xC800), 0xC8);
    }

    #[test]
    fn rom_writes_ignored() {
        let mut mem = memory_with_rom();
        mem.write(0xC300, 0x12);
        mem.write(0xFFFF, 0x12);
        mem.read(0xC082);
        assert_eq!(mem.read(0xC300), 0xC3);
        assert_eq!(mem.read(0xFFFF), 0xFF);
    }

    #[test]
    fn cfff_stops_disk_motor() {
        let mut mem = memory_with_rom();
        mem.read(0xC0E9);
        assert!(mem.disk.is_motor_on());
        assert_eq!(mem.read(0xCFFF), 0);
        assert!(!mem.disk.is_motor_on());

        mem.read(0xC0E9);
        mem.write(0xCFFF, 0);
        assert!(!mem.disk.is_motor_on());
    }
}

/// 画面通知を記録する
#[derive(Clone, Default)]
struct Recorder {
    touches: Arc<Mutex<Vec<(BankTag, u16, Access)>>>,
    invalidations: Arc<Mutex<u32>>,
    clicks: Arc<Mutex<Vec<u64>>>,
}

impl Display for Recorder {
    fn invalidate(&mut self) {
        *self.invalidations.lock().unwrap() += 1;
    }
    fn touch(&mut self, tag: BankTag, address: u16, access: Access) {
        self.touches.lock().unwrap().push((tag, address, access));
    }
}

impl Audio for Recorder {
    fn toggle(&mut self, ticks: u64) {
        self.clicks.lock().unwrap().push(ticks);
    }
}

mod devices {
    use super::*;

    #[test]
    fn every_access_reports_bank() {
        let rec = Recorder::default();
        let mut mem = Memory::with_devices(Box::new(rec.clone()), Box::new(rec.clone()), Box::new(NullInput));
        rec.touches.lock().unwrap().clear();

        mem.write(0xC005, 0);
        mem.write(0x0800, 1);
        mem.read(0x0800);
        let touches = rec.touches.lock().unwrap().clone();
        assert_eq!(
            touches,
            vec![
                (BankTag::Main, 0xC005, Access::Write),
                (BankTag::Aux, 0x0800, Access::Write),
                (BankTag::Main, 0x0800, Access::Read),
            ]
        );
    }

    #[test]
    fn video_switch_invalidates_display() {
        let rec = Recorder::default();
        let mut mem = Memory::with_devices(Box::new(rec.clone()), Box::new(rec.clone()), Box::new(NullInput));
        let before = *rec.invalidations.lock().unwrap();
        mem.read(0xC057);
        assert!(mem.switches.hires);
        assert_eq!(*rec.invalidations.lock().unwrap(), before + 1);
    }

    #[test]
    fn speaker_toggle_carries_ticks() {
        let rec = Recorder::default();
        let mut mem = Memory::with_devices(Box::new(rec.clone()), Box::new(rec.clone()), Box::new(NullInput));
        mem.sync(1000);
        mem.read(0xC030);
        mem.sync(1200);
        mem.write(0xC030, 0);
        assert_eq!(*rec.clicks.lock().unwrap(), vec![1000, 1200]);
    }

    #[test]
    fn game_port_through_bus() {
        let mut paddles = Paddles::new();
        paddles.buttons[1] = true;
        paddles.set_position(0, 10); // カウントダウン100 → 660サイクル
        paddles.set_position(3, 0);
        let mut mem = Memory::with_devices(Box::new(NullDisplay), Box::new(NullAudio), Box::new(paddles));

        assert_eq!(mem.read(0xC061), 0x00);
        assert_eq!(mem.read(0xC062), 0x80);
        assert_eq!(mem.read(0xC063), 0x00);

        // $C070を読んだ時刻からタイマーが始まる
        mem.sync(1000);
        mem.read(0xC070);
        mem.sync(1600);
        assert_eq!(mem.read(0xC064), 0x80);
        assert_eq!(mem.read(0xC067), 0x00);
        mem.sync(1700);
        assert_eq!(mem.read(0xC064), 0x00);

        // 再トリガーでまた動作中になる
        mem.read(0xC070);
        mem.sync(1800);
        assert_eq!(mem.read(0xC064), 0x80);
    }
}
