// ============================================
// Render Settings - Настройки рендера из JSON
// ============================================
// Data-driven конфигурация хоста: размеры кадра, разрешение теней,
// дистанции каскадов, флаги. Валидация при загрузке, чтобы горячий
// цикл шейдинга не разбирался с мусором.

use serde::{Deserialize, Serialize};

use crate::lighting::MAX_CASCADES;

/// Ошибки загрузки настроек
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    /// Дистанции каскадов не строго возрастают
    BadCascadeSplits(Vec<f32>),
    /// Число каскадов вне 1..=MAX_CASCADES
    BadCascadeCount(usize),
    /// Нулевой размер кадра или shadow map
    ZeroDimension,
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "settings io error: {}", e),
            SettingsError::Parse(e) => write!(f, "settings parse error: {}", e),
            SettingsError::BadCascadeSplits(s) => {
                write!(f, "cascade splits must strictly increase, got {:?}", s)
            }
            SettingsError::BadCascadeCount(n) => {
                write!(f, "cascade count {} outside 1..={}", n, MAX_CASCADES)
            }
            SettingsError::ZeroDimension => write!(f, "frame and shadow dimensions must be non-zero"),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<std::io::Error> for SettingsError {
    fn from(e: std::io::Error) -> Self {
        SettingsError::Io(e)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::Parse(e)
    }
}

/// Настройки рендера
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Размер кадра
    pub width: usize,
    pub height: usize,
    /// Разрешение полосы каскада в атласе
    pub shadow_resolution: usize,
    /// Дистанции каскадов (пространство камеры, строго возрастают)
    pub cascade_splits: Vec<f32>,
    /// Сила фонового освещения
    pub ambient: f32,
    /// Normal mapping включён
    pub complex_normals: bool,
}

impl RenderSettings {
    /// Прочитать и провалидировать настройки из JSON файла
    pub fn load(path: &std::path::Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let settings: RenderSettings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.width == 0 || self.height == 0 || self.shadow_resolution == 0 {
            return Err(SettingsError::ZeroDimension);
        }
        let count = self.cascade_splits.len();
        if count == 0 || count > MAX_CASCADES {
            return Err(SettingsError::BadCascadeCount(count));
        }
        if self.cascade_splits.windows(2).any(|w| w[0] >= w[1]) {
            log::warn!("rejected settings: cascade splits {:?}", self.cascade_splits);
            return Err(SettingsError::BadCascadeSplits(self.cascade_splits.clone()));
        }
        Ok(())
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            shadow_resolution: 256,
            cascade_splits: vec![16.0, 64.0, 256.0, 1024.0],
            ambient: 0.1,
            complex_normals: true,
        }
    }
}
