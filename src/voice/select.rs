//! Synthesis voice selection for the target locale

use serde::Deserialize;

/// A voice offered by a speech synthesizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Display name (e.g. "Sin-ji", "Google 粵語（香港）")
    pub name: String,
    /// Locale tag as reported by the synthesizer (e.g. "zh-HK", "zh_HK")
    pub locale: String,
    /// Platform marks this voice as a premium/enhanced quality voice
    pub enhanced: bool,
}

impl Voice {
    #[must_use]
    pub fn new(name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
            enhanced: false,
        }
    }

    #[must_use]
    pub const fn enhanced(mut self) -> Self {
        self.enhanced = true;
        self
    }
}

/// Target language and region for recognition and synthesis
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocaleProfile {
    /// Locale passed to the recognizer (e.g. "yue-Hant-HK")
    pub recognition: String,
    /// Region locale used for synthesis (e.g. "zh-HK")
    pub synthesis: String,
    /// Language family code (e.g. "yue")
    pub family: String,
    /// Broader language code (e.g. "zh")
    pub broad: String,
    /// Native-script marker found in voice display names (e.g. "粵")
    pub native_marker: String,
}

impl Default for LocaleProfile {
    fn default() -> Self {
        Self {
            recognition: "yue-Hant-HK".to_string(),
            synthesis: "zh-HK".to_string(),
            family: "yue".to_string(),
            broad: "zh".to_string(),
            native_marker: "粵".to_string(),
        }
    }
}

impl LocaleProfile {
    /// Two-letter language part of the synthesis locale ("zh" for "zh-HK")
    #[must_use]
    pub fn synthesis_language(&self) -> &str {
        self.synthesis
            .split(['-', '_'])
            .next()
            .unwrap_or(&self.synthesis)
    }
}

/// Pick the best voice for `locale`, or `None` for the platform default
///
/// Priority: enhanced voice for the exact locale, native-script name,
/// exact region locale, language family, broad language.
#[must_use]
pub fn select_voice<'a>(voices: &'a [Voice], locale: &LocaleProfile) -> Option<&'a Voice> {
    let synthesis = normalize(&locale.synthesis);
    let recognition = normalize(&locale.recognition);
    let family = normalize(&locale.family);
    let broad = normalize(&locale.broad);

    let exact = |v: &Voice| {
        let l = normalize(&v.locale);
        l == synthesis || l == recognition
    };

    voices
        .iter()
        .find(|v| v.enhanced && exact(v))
        .or_else(|| {
            voices
                .iter()
                .find(|v| !locale.native_marker.is_empty() && v.name.contains(&locale.native_marker))
        })
        .or_else(|| voices.iter().find(|v| normalize(&v.locale) == synthesis))
        .or_else(|| {
            voices.iter().find(|v| {
                let l = normalize(&v.locale);
                l == recognition || l.contains(&family)
            })
        })
        .or_else(|| voices.iter().find(|v| normalize(&v.locale).contains(&broad)))
}

/// Lowercase with `_` folded into `-`
fn normalize(locale: &str) -> String {
    locale.trim().replace('_', "-").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> LocaleProfile {
        LocaleProfile::default()
    }

    #[test]
    fn test_enhanced_exact_voice_wins() {
        let voices = vec![
            Voice::new("Generic Chinese", "zh-CN"),
            Voice::new("粵語女聲", "zh-HK"),
            Voice::new("Sin-ji (Enhanced)", "zh_HK").enhanced(),
        ];
        let chosen = select_voice(&voices, &profile()).unwrap();
        assert_eq!(chosen.name, "Sin-ji (Enhanced)");
    }

    #[test]
    fn test_enhanced_voice_for_other_locale_is_skipped() {
        let voices = vec![
            Voice::new("Samantha (Enhanced)", "en-US").enhanced(),
            Voice::new("Sin-ji", "zh-HK"),
        ];
        assert_eq!(select_voice(&voices, &profile()).unwrap().name, "Sin-ji");
    }

    #[test]
    fn test_native_marker_beats_region() {
        let voices = vec![
            Voice::new("Sin-ji", "zh-HK"),
            Voice::new("粵語", "zh-TW"),
        ];
        assert_eq!(select_voice(&voices, &profile()).unwrap().name, "粵語");
    }

    #[test]
    fn test_region_beats_family() {
        let voices = vec![
            Voice::new("Cantonese", "yue"),
            Voice::new("Hong Kong", "ZH_hk"),
        ];
        assert_eq!(select_voice(&voices, &profile()).unwrap().name, "Hong Kong");
    }

    #[test]
    fn test_family_beats_broad_language() {
        let voices = vec![
            Voice::new("Mandarin", "zh-CN"),
            Voice::new("Cantonese", "yue-Hant-HK"),
        ];
        assert_eq!(select_voice(&voices, &profile()).unwrap().name, "Cantonese");
    }

    #[test]
    fn test_broad_language_fallback() {
        let voices = vec![Voice::new("English", "en-US"), Voice::new("Mandarin", "zh-CN")];
        assert_eq!(select_voice(&voices, &profile()).unwrap().name, "Mandarin");
    }

    #[test]
    fn test_no_match_uses_platform_default() {
        let voices = vec![Voice::new("English", "en-US")];
        assert!(select_voice(&voices, &profile()).is_none());
        assert!(select_voice(&[], &profile()).is_none());
    }

    #[test]
    fn test_synthesis_language() {
        assert_eq!(profile().synthesis_language(), "zh");
    }
}
