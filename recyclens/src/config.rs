//! 会话配置模块
//!
//! 提供流式会话配置的加载、保存和校验
//!
//! # 使用示例
//!
//! ```no_run
//! use recyclens_lib::config::SessionConfig;
//!
//! // 文件不存在时使用默认配置
//! let mut config = SessionConfig::load_or_default("recyclens.json")?;
//!
//! // 修改配置
//! config.voice_name = "Puck".to_string();
//!
//! // 保存配置
//! config.save("recyclens.json")?;
//! # Ok::<(), recyclens_lib::config::ConfigError>(())
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::{INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
use crate::media::sampler::SamplerSettings;
use crate::network::SetupMessage;

/// 默认模型
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// 默认语音
pub const DEFAULT_VOICE: &str = "Kore";

/// 默认系统提示词
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = r#"You are RecycLens, an AI-powered Voice & Vision Recycling Assistant.

Your job:
- Look at the image captured from the user's camera.
- Identify the item as accurately as possible.
- Classify the item into one of these categories:
  • Recyclable
  • Compost
  • Trash
  • Hazardous Waste
- Then give the user clear, friendly verbal guidance about which bin to use.

Format your answer as a short, conversational response spoken in natural voice.

Rules:
1. Keep responses under 3 short sentences.
2. Always mention:
   - What the item appears to be.
   - Which bin the user should use.
   - A simple reason why.
3. If unsure, say:
   "I'm not fully certain, but this looks like ___, so I recommend placing it in ___."
4. If multiple possibilities exist, choose the *most likely* but note uncertainty.
5. For hazardous items (battery, chemicals, electronics), ALWAYS warn the user:
   "Do not throw this in regular bins."
6. If the image is unclear, ask:
   "Could you hold the item closer or in better lighting?"

Voice Behavior:
- Respond with a friendly, helpful tone.
- Speak as if you're guiding someone quickly sorting waste.
- Avoid technical jargon.
"#;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 配置值无效
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 配置结果类型
pub type ConfigResult<T> = Result<T, ConfigError>;

/// 会话配置
///
/// 在 `connect()` 时固定，会话期间不可更改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 模型 ID（不带 `models/` 前缀也可以）
    pub model: String,
    /// 系统提示词
    pub system_instruction: String,
    /// 预置语音名称
    pub voice_name: String,
    /// 音频配置
    pub audio: AudioConfig,
    /// 视频配置
    pub video: VideoConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            voice_name: DEFAULT_VOICE.to_string(),
            audio: AudioConfig::default(),
            video: VideoConfig::default(),
        }
    }
}

/// 音频配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// 上行采样率 (Hz)
    pub input_sample_rate: u32,
    /// 下行采样率 (Hz)
    pub output_sample_rate: u32,
    /// 每个上行音频块的采样数
    pub input_block_size: usize,
    /// 输入设备名称（None 表示使用默认设备）
    pub input_device: Option<String>,
    /// 输出设备名称（None 表示使用默认设备）
    pub output_device: Option<String>,
    /// 上行消息队列容量
    pub outbound_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: INPUT_SAMPLE_RATE,
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            input_block_size: 4096,
            input_device: None,
            output_device: None,
            outbound_capacity: 64,
        }
    }
}

/// 视频配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// 抽帧周期（毫秒）
    pub frame_interval_ms: u64,
    /// JPEG 质量 (1-100)
    pub jpeg_quality: u8,
    /// 缩放除数（2 表示宽高各减半）
    pub scale_divisor: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 1000,
            jpeg_quality: 60,
            scale_divisor: 2,
        }
    }
}

impl SessionConfig {
    /// 校验所有字段
    ///
    /// # Errors
    ///
    /// 第一个无效字段以 [`ConfigError::Invalid`] 返回
    pub fn validate(&self) -> ConfigResult<()> {
        fn invalid(message: &str) -> ConfigResult<()> {
            Err(ConfigError::Invalid(message.to_string()))
        }

        if self.model.trim().is_empty() {
            return invalid("model must not be empty");
        }
        if self.voice_name.trim().is_empty() {
            return invalid("voice_name must not be empty");
        }
        if self.audio.input_sample_rate == 0 {
            return invalid("audio.input_sample_rate must be positive");
        }
        if self.audio.output_sample_rate == 0 {
            return invalid("audio.output_sample_rate must be positive");
        }
        if self.audio.input_block_size == 0 {
            return invalid("audio.input_block_size must be positive");
        }
        if self.audio.outbound_capacity == 0 {
            return invalid("audio.outbound_capacity must be positive");
        }
        if self.video.frame_interval_ms == 0 {
            return invalid("video.frame_interval_ms must be positive");
        }
        if !(1..=100).contains(&self.video.jpeg_quality) {
            return invalid("video.jpeg_quality must be within 1..=100");
        }
        if self.video.scale_divisor == 0 {
            return invalid("video.scale_divisor must be positive");
        }

        Ok(())
    }

    /// 从文件加载配置
    ///
    /// 缺失的字段使用默认值填充，加载后会进行校验
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = serde_json::from_str(&content)?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// 加载配置，文件不存在时返回默认配置
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// 保存配置到文件
    ///
    /// 自动创建父目录
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// 构造会话建立消息
    pub fn setup_message(&self) -> SetupMessage {
        SetupMessage::new(&self.model, &self.voice_name, &self.system_instruction)
    }

    /// 抽帧参数
    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            interval: Duration::from_millis(self.video.frame_interval_ms),
            jpeg_quality: self.video.jpeg_quality,
            scale_divisor: self.video.scale_divisor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.voice_name, "Kore");
        assert!(config.system_instruction.contains("RecycLens"));

        assert_eq!(config.audio.input_sample_rate, 16000);
        assert_eq!(config.audio.output_sample_rate, 24000);
        assert_eq!(config.audio.input_block_size, 4096);
        assert!(config.audio.input_device.is_none());

        assert_eq!(config.video.frame_interval_ms, 1000);
        assert_eq!(config.video.jpeg_quality, 60);
        assert_eq!(config.video.scale_divisor, 2);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_json() {
        // 缺失字段使用默认值填充
        let json = r#"{
            "voice_name": "Puck",
            "video": { "jpeg_quality": 80 }
        }"#;

        let config: SessionConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.voice_name, "Puck");
        assert_eq!(config.video.jpeg_quality, 80);
        assert_eq!(config.video.frame_interval_ms, 1000); // 默认值
        assert_eq!(config.model, DEFAULT_MODEL); // 默认值
        assert_eq!(config.audio.input_block_size, 4096); // 默认值
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases: Vec<(&str, Box<dyn Fn(&mut SessionConfig)>)> = vec![
            ("model", Box::new(|c| c.model = "  ".into())),
            ("voice_name", Box::new(|c| c.voice_name.clear())),
            ("input_sample_rate", Box::new(|c| c.audio.input_sample_rate = 0)),
            ("output_sample_rate", Box::new(|c| c.audio.output_sample_rate = 0)),
            ("input_block_size", Box::new(|c| c.audio.input_block_size = 0)),
            ("outbound_capacity", Box::new(|c| c.audio.outbound_capacity = 0)),
            ("frame_interval_ms", Box::new(|c| c.video.frame_interval_ms = 0)),
            ("jpeg_quality", Box::new(|c| c.video.jpeg_quality = 0)),
            ("jpeg_quality", Box::new(|c| c.video.jpeg_quality = 101)),
            ("scale_divisor", Box::new(|c| c.video.scale_divisor = 0)),
        ];

        for (field, mutate) in cases {
            let mut config = SessionConfig::default();
            mutate(&mut config);

            match config.validate() {
                Err(ConfigError::Invalid(message)) => {
                    assert!(message.contains(field), "{message} should mention {field}")
                }
                other => panic!("{field}: expected Invalid, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_setup_message() {
        let config = SessionConfig::default();
        let setup = config.setup_message();

        assert_eq!(setup.model, format!("models/{}", DEFAULT_MODEL));
        assert_eq!(setup.voice_name(), "Kore");
    }

    #[test]
    fn test_sampler_settings() {
        let mut config = SessionConfig::default();
        config.video.frame_interval_ms = 250;

        let settings = config.sampler_settings();
        assert_eq!(settings.interval, Duration::from_millis(250));
        assert_eq!(settings.jpeg_quality, 60);
        assert_eq!(settings.scale_divisor, 2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("recyclens-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.json");

        let mut config = SessionConfig::default();
        config.voice_name = "Charon".to_string();
        config.audio.input_device = Some("USB Mic".to_string());
        config.save(&path).unwrap();

        let loaded = SessionConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let path = std::env::temp_dir().join("recyclens-does-not-exist.json");
        let config = SessionConfig::load_or_default(&path).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let path = std::env::temp_dir().join(format!("recyclens-invalid-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "video": { "jpeg_quality": 0 } }"#).unwrap();

        let result = SessionConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid("test error".to_string());
        assert!(err.to_string().contains("test error"));

        let err = ConfigError::Json(serde_json::from_str::<SessionConfig>("invalid").unwrap_err());
        assert!(err.to_string().contains("JSON"));
    }
}
