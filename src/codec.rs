// 缩略图编解码模块
// 解码原图、缩放到固定尺寸、编码为 JPEG 并原子写入目标路径

use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;

use crate::config::{ThumbnailConfig, DEFAULT_JPEG_QUALITY, DEFAULT_THUMBNAIL_SIZE};
use crate::error::ProcessingError;

/// 缩略图生成能力
///
/// 实现方负责保证失败时不在 `destination` 留下可见的半成品文件。
pub trait ThumbnailCodec: Send + Sync {
    fn create_thumbnail(&self, source: &Path, destination: &Path) -> Result<(), ProcessingError>;
}

/// 基于 `image` crate 的默认实现
#[derive(Debug, Clone)]
pub struct ImageThumbnailCodec {
    width: u32,
    height: u32,
    quality: u8,
    filter: FilterType,
}

impl Default for ImageThumbnailCodec {
    fn default() -> Self {
        Self::new(DEFAULT_THUMBNAIL_SIZE, DEFAULT_THUMBNAIL_SIZE)
    }
}

impl ImageThumbnailCodec {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            quality: DEFAULT_JPEG_QUALITY,
            // 使用 Lanczos3 滤波器获得较好的缩放质量
            filter: FilterType::Lanczos3,
        }
    }

    pub fn from_config(config: &ThumbnailConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            quality: config.quality,
            filter: config.filter.into(),
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// 解码并缩放到目标尺寸，不保持宽高比，丢弃透明通道
    fn render(&self, source: &Path) -> Result<RgbImage, ProcessingError> {
        let img = image::open(source).map_err(|e| ProcessingError::Decode {
            path: source.to_path_buf(),
            source: e,
        })?;

        Ok(img
            .resize_exact(self.width, self.height, self.filter)
            .to_rgb8())
    }
}

impl ThumbnailCodec for ImageThumbnailCodec {
    fn create_thumbnail(&self, source: &Path, destination: &Path) -> Result<(), ProcessingError> {
        let thumbnail = self.render(source)?;

        let io_err = |e: std::io::Error| ProcessingError::Io {
            path: destination.to_path_buf(),
            source: e,
        };

        // 先写入同目录下的隐藏临时文件，成功后再重命名，失败时临时文件随 drop 删除
        let dir = destination.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::Builder::new()
            .prefix(".thumbgen-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(io_err)?;

        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            JpegEncoder::new_with_quality(&mut writer, self.quality)
                .encode_image(&thumbnail)
                .map_err(|e| ProcessingError::Encode {
                    path: source.to_path_buf(),
                    source: e,
                })?;
            writer.flush().map_err(io_err)?;
        }

        staged.persist(destination).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}
