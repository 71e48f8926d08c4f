//! Apple II Disk II ドライブエミュレーション
//!
//! スロット6のDisk IIコントローラ（$C0E0-$C0EF）と2台のドライブ。
//! イメージはNIB形式（35トラック × 0x1A00ニブル、ヘッダなし）を
//! そのままニブルストリームとして回転させる。

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ディスクの定数
pub const TRACKS: usize = 35;
/// 1トラックのニブル数
pub const TRACK_SIZE: usize = 0x1A00;
/// イメージサイズ（232,960バイト）
pub const IMAGE_SIZE: usize = TRACKS * TRACK_SIZE;
/// ハーフトラック位置の上限
pub const MAX_HALF_TRACK: i32 = 140;

/// ディスクイメージ入出力のエラー
#[derive(Debug, Error)]
pub enum DiskError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid disk image size: expected {IMAGE_SIZE} bytes, got {0}")]
    BadSize(usize),
    #[error("invalid drive number: {0}")]
    InvalidDrive(usize),
    #[error("drive {0} has no image file")]
    NoImage(usize),
    #[error("drive {0} is write protected")]
    ReadOnly(usize),
    #[error("short write: {written} of {IMAGE_SIZE} bytes")]
    ShortWrite { written: usize },
}

/// ステッパーモーターのフェーズ履歴（ドライブごと）
///
/// 2世代前のフェーズ状態を見てヘッドの移動方向を決める。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepperPhaseHistory {
    phases: [bool; 4],
    before: [bool; 4],
    before_before: [bool; 4],
    index: usize,
    index_before: usize,
    /// ハーフトラック位置（0〜140）
    pub half_track: i32,
}

impl StepperPhaseHistory {
    /// フェーズスイッチへのアクセスを反映し、新しいトラック番号を返す
    ///
    /// アドレスのbit1-2がフェーズ番号、bit0が通電(1)/断(0)。
    /// 断の場合はフラグを落とすだけでヘッドは動かない（Noneを返す）。
    pub fn apply(&mut self, address: u16) -> Option<usize> {
        let address = (address & 7) as usize;
        let phase = address >> 1;

        self.before_before[self.index_before] = self.before[self.index_before];
        self.before[self.index] = self.phases[self.index];
        self.index_before = self.index;
        self.index = phase;

        if address & 1 == 0 {
            self.phases[phase] = false;
            return None;
        }

        if self.before_before[(phase + 1) & 3] {
            self.half_track = (self.half_track - 1).max(0);
        }
        if self.before_before[(phase + 3) & 3] {
            self.half_track = (self.half_track + 1).min(MAX_HALF_TRACK);
        }

        self.phases[phase] = true;
        Some(self.track())
    }

    /// フェーズ番号とヘッド位置が範囲内か（セーブステート復元時の検査用）
    pub fn is_valid(&self) -> bool {
        self.index < 4 && self.index_before < 4 && (0..=MAX_HALF_TRACK).contains(&self.half_track)
    }

    /// ハーフトラック位置から求めたトラック番号
    pub fn track(&self) -> usize {
        ((self.half_track + 1) / 2) as usize
    }
}

/// ドライブ1台分の状態
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveUnit {
    /// ニブルイメージ
    pub data: Vec<u8>,
    /// 書き込みプロテクト
    pub read_only: bool,
    pub motor_on: bool,
    /// 書き込みモード（Q7）
    pub write_mode: bool,
    /// 現在のトラック（0〜35）
    pub track: usize,
    /// トラック内のニブル位置（0〜0x19FF）
    pub nibble: usize,
    /// イメージファイルのパス
    pub path: Option<PathBuf>,
    /// 表示用のファイル名
    pub file_name: String,
    pub stepper: StepperPhaseHistory,
}

impl Default for DriveUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveUnit {
    pub fn new() -> Self {
        DriveUnit {
            data: vec![0; IMAGE_SIZE],
            read_only: false,
            motor_on: false,
            write_mode: false,
            track: 0,
            nibble: 0,
            path: None,
            file_name: String::new(),
            stepper: StepperPhaseHistory::default(),
        }
    }

    /// ヘッド位置のイメージ内オフセット
    ///
    /// 最外周のハーフトラックでは35になりうるので、イメージ末尾で折り返す。
    fn offset(&self) -> usize {
        (self.track * TRACK_SIZE + self.nibble) % IMAGE_SIZE
    }
}

/// Disk IIインターフェースカード
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskController {
    /// ドライブ0と1
    pub units: [DriveUnit; 2],
    /// 現在選択中のドライブ
    pub current: usize,
    /// データラッチ
    pub latch: u8,
}

impl Default for DiskController {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskController {
    pub fn new() -> Self {
        DiskController {
            units: [DriveUnit::new(), DriveUnit::new()],
            current: 0,
            latch: 0,
        }
    }

    /// 現在のドライブ
    pub fn current_unit(&self) -> &DriveUnit {
        &self.units[self.current]
    }

    fn current_unit_mut(&mut self) -> &mut DriveUnit {
        &mut self.units[self.current]
    }

    /// 現在のドライブのモーターが回っているか
    pub fn is_motor_on(&self) -> bool {
        self.current_unit().motor_on
    }

    /// $C0E0-$C0E7: ステッパーモーター
    pub fn step_phase(&mut self, address: u16) {
        let unit = self.current_unit_mut();
        if let Some(track) = unit.stepper.apply(address) {
            if track != unit.track {
                log::debug!("Disk: track {} -> {}", unit.track, track);
            }
            unit.track = track;
        }
    }

    /// $C0E8
    pub fn motor_off(&mut self) {
        self.current_unit_mut().motor_on = false;
    }

    /// $C0E9
    pub fn motor_on(&mut self) {
        self.current_unit_mut().motor_on = true;
    }

    /// $C0EA/$C0EB: ドライブ選択
    ///
    /// どちらかのモーターが回っていれば新しいドライブで回り続け、もう一方は止まる。
    pub fn set_drive(&mut self, which: usize) {
        let which = which & 1;
        let other = which ^ 1;
        self.units[which].motor_on = self.units[other].motor_on || self.units[which].motor_on;
        self.units[other].motor_on = false;
        if self.current != which {
            log::debug!("Disk: drive {} selected", which + 1);
        }
        self.current = which;
    }

    /// $C0EC: シフトラッチ
    ///
    /// 書き込みモードならラッチをヘッド位置に書き、読み込みモードならヘッド位置から読む。
    /// どちらの場合もディスクは1ニブル回転する。
    pub fn shift_latch(&mut self) -> u8 {
        let latch = self.latch;
        let unit = &mut self.units[self.current];
        let offset = unit.offset();
        if unit.write_mode {
            unit.data[offset] = latch;
        } else {
            self.latch = unit.data[offset];
        }
        unit.nibble = (unit.nibble + 1) % TRACK_SIZE;
        self.latch
    }

    /// $C0ED: ラッチに値をロード
    pub fn load_latch(&mut self, value: u8) {
        self.latch = value;
    }

    /// $C0EE: 読み込みモードにして書き込みプロテクト状態を返す
    pub fn check_write_protect(&mut self) -> bool {
        let unit = self.current_unit_mut();
        unit.write_mode = false;
        unit.read_only
    }

    /// $C0EF: 書き込みモード
    pub fn set_write_mode(&mut self) {
        self.current_unit_mut().write_mode = true;
    }

    /// $C0E0-$C0EFへのアクセスを処理する
    ///
    /// 値を返すレジスタ（$C0EC, $C0EE）以外はNone（フローティングバス）。
    /// 読み込み・書き込みの両方で同じ動作をする。
    pub fn access(&mut self, address: u16, value: u8) -> Option<u8> {
        match address & 0x0F {
            0x00..=0x07 => self.step_phase(address),
            0x08 => self.motor_off(),
            0x09 => self.motor_on(),
            0x0A => self.set_drive(0),
            0x0B => self.set_drive(1),
            0x0C => return Some(self.shift_latch()),
            0x0D => self.load_latch(value),
            0x0E => return Some(if self.check_write_protect() { 0x80 } else { 0 }),
            _ => self.set_write_mode(),
        }
        None
    }

    fn check_drive(drive: usize) -> Result<(), DiskError> {
        if drive > 1 {
            return Err(DiskError::InvalidDrive(drive));
        }
        Ok(())
    }

    /// イメージファイルをドライブに挿入
    ///
    /// 失敗した場合ドライブの内容は変わらない。追記モードで開けないファイルは
    /// 書き込みプロテクト扱いになる。
    pub fn load<P: AsRef<Path>>(&mut self, path: P, drive: usize) -> Result<(), DiskError> {
        Self::check_drive(drive)?;
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| DiskError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if data.len() != IMAGE_SIZE {
            log::warn!("Rejected disk image {}: {} bytes", path.display(), data.len());
            return Err(DiskError::BadSize(data.len()));
        }

        let read_only = OpenOptions::new().append(true).open(path).is_err();
        let unit = &mut self.units[drive];
        unit.data = data;
        unit.read_only = read_only;
        unit.path = Some(path.to_path_buf());
        unit.file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!(
            "Disk {} loaded: {}{}",
            drive + 1,
            unit.file_name,
            if read_only { " (read only)" } else { "" }
        );
        Ok(())
    }

    /// メモリ上のイメージを挿入（ファイルとは結び付かない）
    pub fn load_bytes(&mut self, drive: usize, data: &[u8], read_only: bool) -> Result<(), DiskError> {
        Self::check_drive(drive)?;
        if data.len() != IMAGE_SIZE {
            return Err(DiskError::BadSize(data.len()));
        }
        let unit = &mut self.units[drive];
        unit.data.copy_from_slice(data);
        unit.read_only = read_only;
        unit.path = None;
        unit.file_name.clear();
        Ok(())
    }

    /// イメージを元のファイルに書き戻す
    pub fn save(&self, drive: usize) -> Result<(), DiskError> {
        Self::check_drive(drive)?;
        let unit = &self.units[drive];
        let path = unit.path.as_ref().ok_or(DiskError::NoImage(drive))?;
        if unit.read_only {
            return Err(DiskError::ReadOnly(drive));
        }
        fs::write(path, &unit.data).map_err(|source| DiskError::Io {
            path: path.clone(),
            source,
        })?;
        let written = fs::metadata(path)
            .map(|meta| meta.len() as usize)
            .map_err(|source| DiskError::Io { path: path.clone(), source })?;
        if written != IMAGE_SIZE {
            return Err(DiskError::ShortWrite { written });
        }
        log::info!("Disk {} saved: {}", drive + 1, unit.file_name);
        Ok(())
    }

    /// イメージを取り出す（データはゼロクリア）
    pub fn eject(&mut self, drive: usize) -> Result<(), DiskError> {
        Self::check_drive(drive)?;
        let unit = &mut self.units[drive];
        unit.file_name.clear();
        unit.path = None;
        unit.read_only = false;
        unit.data.fill(0);
        log::info!("Disk {} ejected", drive + 1);
        Ok(())
    }

    /// ドライブ1と2を入れ替え
    pub fn swap_drives(&mut self) {
        self.units.swap(0, 1);
        log::info!("Disks swapped: Drive1 <-> Drive2");
    }
}
