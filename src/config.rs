//! 設定ファイル管理モジュール
//!
//! エミュレータの設定をJSON形式で永続化

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 設定ファイルのデフォルトファイル名
pub const CONFIG_FILENAME: &str = "a2e_config.json";

/// 実行ファイルのディレクトリを取得
pub fn get_exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 設定ファイルのパスを取得
pub fn get_config_path() -> PathBuf {
    get_exe_dir().join(CONFIG_FILENAME)
}

/// エミュレータ設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// システムROM（16KBまたは32KB）
    #[serde(default = "default_rom")]
    pub rom: String,
    /// Disk II ブートPROM（256バイト）
    #[serde(default = "default_disk_prom")]
    pub disk_prom: String,
    /// 最後に使用したディスク1のパス
    #[serde(default)]
    pub last_disk1: Option<String>,
    /// 最後に使用したディスク2のパス
    #[serde(default)]
    pub last_disk2: Option<String>,
    /// 速度倍率（1.0 = 1.023MHz）
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// 1秒あたりのフレーム数
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// モーター回転中のディスク高速化
    #[serde(default = "default_true")]
    pub disk_speedup: bool,
}

fn default_rom() -> String { "rom/appleIIe.rom".to_string() }
fn default_disk_prom() -> String { "rom/diskII.rom".to_string() }
fn default_speed() -> f64 { 1.0 }
fn default_fps() -> u32 { 60 }
fn default_true() -> bool { true }

impl Default for Config {
    fn default() -> Self {
        Config {
            rom: default_rom(),
            disk_prom: default_disk_prom(),
            last_disk1: None,
            last_disk2: None,
            speed: default_speed(),
            fps: default_fps(),
            disk_speedup: true,
        }
    }
}

impl Config {
    /// 設定ファイルを読み込む（実行ファイルと同じディレクトリから）
    pub fn load() -> Self {
        Self::load_from(get_config_path())
    }

    /// 指定したパスから設定を読み込む
    ///
    /// ファイルがない、または壊れている場合はデフォルト値を使う。
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Failed to parse config {:?}: {}, using defaults", path.as_ref(), e);
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    /// 指定したパスに設定を保存する
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(path, json).map_err(|e| format!("Failed to write config: {}", e))?;
        Ok(())
    }

    /// 前回使用したディスクのパス
    pub fn last_disk(&self, drive: usize) -> Option<&str> {
        match drive {
            0 => self.last_disk1.as_deref(),
            _ => self.last_disk2.as_deref(),
        }
    }

    /// ディスクのパスを記録
    pub fn remember_disk(&mut self, drive: usize, path: &str) {
        match drive {
            0 => self.last_disk1 = Some(path.to_string()),
            _ => self.last_disk2 = Some(path.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("nope.json"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_broken_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let mut config = Config::default();
        config.speed = 2.0;
        config.remember_disk(1, "disks/dos33.nib");
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.speed, 2.0);
        assert_eq!(loaded.last_disk(1), Some("disks/dos33.nib"));
        assert_eq!(loaded.last_disk(0), None);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, r#"{ "fps": 50 }"#).unwrap();
        let config = Config::load_from(&path);
        assert_eq!(config.fps, 50);
        assert!(config.disk_speedup);
        assert_eq!(config.rom, default_rom());
    }
}
