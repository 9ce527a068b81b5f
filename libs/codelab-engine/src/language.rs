// Language resolution
// Maps human-readable language names to execution-service language ids

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageInfo {
    /// Canonical lowercase name
    pub name: &'static str,
    /// Language id understood by the execution service
    pub id: u32,
    pub aliases: &'static [&'static str],
}

/// Fixed language table
/// This is the single source of truth for supported languages
const LANGUAGES: &[LanguageInfo] = &[
    LanguageInfo { name: "c", id: 50, aliases: &["gcc"] },
    LanguageInfo { name: "cpp", id: 54, aliases: &["c++", "g++", "cplusplus"] },
    LanguageInfo { name: "csharp", id: 51, aliases: &["c#", "cs"] },
    LanguageInfo { name: "go", id: 60, aliases: &["golang"] },
    LanguageInfo { name: "java", id: 62, aliases: &[] },
    LanguageInfo { name: "javascript", id: 63, aliases: &["js", "node", "nodejs"] },
    LanguageInfo { name: "kotlin", id: 78, aliases: &["kt"] },
    LanguageInfo { name: "php", id: 68, aliases: &[] },
    LanguageInfo { name: "python", id: 71, aliases: &["py", "python3"] },
    LanguageInfo { name: "ruby", id: 72, aliases: &["rb"] },
    LanguageInfo { name: "rust", id: 73, aliases: &["rs"] },
    LanguageInfo { name: "swift", id: 83, aliases: &[] },
    LanguageInfo { name: "typescript", id: 74, aliases: &["ts"] },
];

/// Look a language up by name or alias (case-insensitive)
pub fn lookup(name: &str) -> Option<&'static LanguageInfo> {
    let normalized = name.trim().to_lowercase();
    LANGUAGES.iter().find(|lang| {
        lang.name == normalized || lang.aliases.iter().any(|alias| *alias == normalized)
    })
}

/// Resolve a language name to the service language id
pub fn resolve(name: &str) -> Result<u32, EngineError> {
    lookup(name)
        .map(|lang| lang.id)
        .ok_or_else(|| EngineError::UnsupportedLanguage(name.to_string()))
}

/// Canonical name for a service language id
pub fn name_for_id(id: u32) -> Option<&'static str> {
    LANGUAGES.iter().find(|lang| lang.id == id).map(|lang| lang.name)
}

/// All supported languages, in table order
pub fn supported_languages() -> &'static [LanguageInfo] {
    LANGUAGES
}
