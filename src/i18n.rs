use serde::{Deserialize, Serialize};

/// 报告与多语言资产使用的语言代码
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum LanguageCode {
    #[serde(rename = "en")]
    #[default]
    English,
    #[serde(rename = "hi")]
    Hindi,
    #[serde(rename = "ar")]
    Arabic,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "pt")]
    Portuguese,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "ru")]
    Russian,
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for LanguageCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(LanguageCode::English),
            "hi" | "hindi" | "हिन्दी" => Ok(LanguageCode::Hindi),
            "ar" | "arabic" | "العربية" => Ok(LanguageCode::Arabic),
            "es" | "spanish" | "español" => Ok(LanguageCode::Spanish),
            "fr" | "french" | "français" => Ok(LanguageCode::French),
            "de" | "german" | "deutsch" => Ok(LanguageCode::German),
            "pt" | "portuguese" | "português" => Ok(LanguageCode::Portuguese),
            "zh" | "chinese" | "中文" => Ok(LanguageCode::Chinese),
            "ja" | "japanese" | "日本語" => Ok(LanguageCode::Japanese),
            "ru" | "russian" | "русский" => Ok(LanguageCode::Russian),
            _ => Err(format!("Unknown language: {}", s)),
        }
    }
}

impl LanguageCode {
    /// 默认的多语言分发集合
    pub const FAN_OUT_DEFAULT: [LanguageCode; 5] = [
        LanguageCode::English,
        LanguageCode::Hindi,
        LanguageCode::Arabic,
        LanguageCode::Spanish,
        LanguageCode::French,
    ];

    /// ISO 639-1 代码，同时用于翻译与语音接口
    pub fn code(&self) -> &'static str {
        match self {
            LanguageCode::English => "en",
            LanguageCode::Hindi => "hi",
            LanguageCode::Arabic => "ar",
            LanguageCode::Spanish => "es",
            LanguageCode::French => "fr",
            LanguageCode::German => "de",
            LanguageCode::Portuguese => "pt",
            LanguageCode::Chinese => "zh",
            LanguageCode::Japanese => "ja",
            LanguageCode::Russian => "ru",
        }
    }

    /// 获取语言的描述性名称
    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageCode::English => "English",
            LanguageCode::Hindi => "Hindi",
            LanguageCode::Arabic => "Arabic",
            LanguageCode::Spanish => "Spanish",
            LanguageCode::French => "French",
            LanguageCode::German => "German",
            LanguageCode::Portuguese => "Portuguese",
            LanguageCode::Chinese => "Chinese",
            LanguageCode::Japanese => "Japanese",
            LanguageCode::Russian => "Russian",
        }
    }

    /// 获取语言的提示词指令，追加在每个Agent的系统提示词之后
    pub fn prompt_instruction(&self) -> String {
        format!(
            "Write every answer in {}, keeping technical terms accurate and the tone professional.",
            self.display_name()
        )
    }

    /// 语音合成后端支持的语言
    pub fn supports_speech(&self) -> bool {
        matches!(
            self,
            LanguageCode::English
                | LanguageCode::Hindi
                | LanguageCode::Arabic
                | LanguageCode::Spanish
                | LanguageCode::French
        )
    }

    /// 多语言报告文件名
    pub fn report_filename(&self) -> String {
        format!("report_{}.md", self.code())
    }

    /// 多语言音频文件名
    pub fn audio_filename(&self) -> String {
        format!("audio_{}.mp3", self.code())
    }

    /// 解析逗号分隔的语言列表，忽略空项，保持首次出现的顺序
    pub fn parse_list(value: &str) -> Result<Vec<LanguageCode>, String> {
        let mut languages = Vec::new();
        for item in value.split(',').filter(|s| !s.trim().is_empty()) {
            let language = item.parse::<LanguageCode>()?;
            if !languages.contains(&language) {
                languages.push(language);
            }
        }
        Ok(languages)
    }
}

#[cfg(test)]
mod tests {
    use super::LanguageCode;

    #[test]
    fn test_language_code_roundtrip_through_display() {
        for language in LanguageCode::FAN_OUT_DEFAULT {
            assert_eq!(language.to_string().parse::<LanguageCode>().unwrap(), language);
        }
        assert_eq!("Français".parse::<LanguageCode>().unwrap(), LanguageCode::French);
        assert!("klingon".parse::<LanguageCode>().is_err());
    }

    #[test]
    fn test_speech_support_is_limited_to_fan_out_set() {
        assert!(LanguageCode::Arabic.supports_speech());
        assert!(!LanguageCode::Japanese.supports_speech());
        assert!(!LanguageCode::German.supports_speech());
    }

    #[test]
    fn test_parse_list_deduplicates() {
        let languages = LanguageCode::parse_list("en, fr,,en,ar").unwrap();
        assert_eq!(
            languages,
            vec![LanguageCode::English, LanguageCode::French, LanguageCode::Arabic]
        );
        assert!(LanguageCode::parse_list("en,xx").is_err());
    }

    #[test]
    fn test_file_names_carry_language_code() {
        assert_eq!(LanguageCode::Hindi.report_filename(), "report_hi.md");
        assert_eq!(LanguageCode::Spanish.audio_filename(), "audio_es.mp3");
    }
}
