// 配置模块
// 从 TOML 文件读取扫描、缩略图、输出目录和事件队列的参数，缺省值即固定行为

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 默认扫描的扩展名（区分大小写）
pub const DEFAULT_EXTENSION: &str = "jpg";
/// 缩略图默认尺寸（像素）
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 100;
/// 输出子目录名
pub const DEFAULT_OUTPUT_DIR: &str = "thumbnails";
/// JPEG 默认质量
pub const DEFAULT_JPEG_QUALITY: u8 = 75;
/// 日志队列默认容量
pub const DEFAULT_LOG_CAPACITY: usize = 64;

/// 顶层配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThumbnailerConfig {
    pub scan: ScanConfig,
    pub thumbnail: ThumbnailConfig,
    pub output: OutputConfig,
    pub events: EventConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    /// 不带点的扩展名
    pub extension: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub filter: ResizeFilter,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_THUMBNAIL_SIZE,
            height: DEFAULT_THUMBNAIL_SIZE,
            quality: DEFAULT_JPEG_QUALITY,
            filter: ResizeFilter::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// 输入目录下的输出子目录名
    pub dir_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir_name: DEFAULT_OUTPUT_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventConfig {
    /// 日志队列容量，队列满时生产者短暂阻塞
    pub log_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// 缩放滤波器
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl ThumbnailerConfig {
    /// 读取配置
    ///
    /// 显式指定的文件必须能读取；否则尝试用户配置目录下的
    /// `thumbgen/config.toml`，不存在时使用默认值
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.is_file() => {
                log::info!("加载配置文件: {}", path.display());
                Self::from_file(&path)
            }
            _ => {
                log::debug!("未找到配置文件，使用默认配置");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ext = &self.scan.extension;
        if ext.is_empty() || ext.contains('.') || ext.contains(std::path::is_separator) {
            return Err(ConfigError::Invalid(format!(
                "scan.extension must be a bare extension, got '{ext}'"
            )));
        }

        if self.thumbnail.width == 0 || self.thumbnail.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "thumbnail size must be non-zero, got {}x{}",
                self.thumbnail.width, self.thumbnail.height
            )));
        }

        if !(1..=100).contains(&self.thumbnail.quality) {
            return Err(ConfigError::Invalid(format!(
                "thumbnail.quality must be 1-100, got {}",
                self.thumbnail.quality
            )));
        }

        let dir = &self.output.dir_name;
        if dir.is_empty() || dir == "." || dir == ".." || dir.contains(std::path::is_separator) {
            return Err(ConfigError::Invalid(format!(
                "output.dir_name must be a single directory name, got '{dir}'"
            )));
        }

        if self.events.log_capacity == 0 {
            return Err(ConfigError::Invalid(
                "events.log_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// 用户级配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("thumbgen").join("config.toml"))
}
