//! 容器格式标识符.

use std::fmt;

/// 容器格式标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FormatId {
    /// Ogg
    Ogg,
    /// WAV (RIFF WAVE)
    Wav,
}

impl FormatId {
    /// 获取格式的人类可读名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ogg => "ogg",
            Self::Wav => "wav",
        }
    }

    /// 获取格式常用的文件扩展名
    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Ogg => &["ogg", "oga"],
            Self::Wav => &["wav", "wave"],
        }
    }

    /// 所有已知格式标识的列表
    pub const ALL: &'static [FormatId] = &[Self::Ogg, Self::Wav];

    /// 根据文件扩展名猜测格式
    ///
    /// # 参数
    /// - `ext`: 文件扩展名 (不含 `.`, 如 "ogg", "wav")
    pub fn from_extension(ext: &str) -> Option<FormatId> {
        let ext_lower = ext.to_lowercase();
        Self::ALL
            .iter()
            .find(|id| id.extensions().contains(&ext_lower.as_str()))
            .copied()
    }

    /// 从文件路径猜测格式
    pub fn from_filename(filename: &str) -> Option<FormatId> {
        let ext = filename.rsplit('.').next()?;
        Self::from_extension(ext)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(FormatId::from_extension("ogg"), Some(FormatId::Ogg));
        assert_eq!(FormatId::from_extension("WAV"), Some(FormatId::Wav));
        assert_eq!(FormatId::from_extension("mp3"), None);
    }

    #[test]
    fn test_from_filename() {
        assert_eq!(FormatId::from_filename("music.oga"), Some(FormatId::Ogg));
        assert_eq!(FormatId::from_filename("out.wave"), Some(FormatId::Wav));
    }
}
