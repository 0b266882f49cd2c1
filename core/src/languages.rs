//! Languages offered by *Change language*, as `(display name, code)`.

pub const AUTODETECT: &str = "auto";

pub static LANGUAGES: &[(&str, &str)] = &[
    ("Autodetect", AUTODETECT),
    ("Arabic", "ar"),
    ("Asturian", "ast-ES"),
    ("Belarusian", "be-BY"),
    ("Breton", "br-FR"),
    ("Catalan", "ca-ES"),
    ("Catalan (Valencian)", "ca-ES-valencia"),
    ("Chinese", "zh-CN"),
    ("Danish", "da-DK"),
    ("Dutch", "nl"),
    ("Dutch (Belgium)", "nl-BE"),
    ("English (Australian)", "en-AU"),
    ("English (Canadian)", "en-CA"),
    ("English (GB)", "en-GB"),
    ("English (New Zealand)", "en-NZ"),
    ("English (South African)", "en-ZA"),
    ("English (US)", "en-US"),
    ("Esperanto", "eo"),
    ("French", "fr"),
    ("Galician", "gl-ES"),
    ("German (Austria)", "de-AT"),
    ("German (Germany)", "de-DE"),
    ("German (Swiss)", "de-CH"),
    ("Greek", "el-GR"),
    ("Irish", "ga-IE"),
    ("Italian", "it"),
    ("Japanese", "ja-JP"),
    ("Khmer", "km-KH"),
    ("Persian", "fa"),
    ("Polish", "pl-PL"),
    ("Portuguese (Angola)", "pt-AO"),
    ("Portuguese (Brazil)", "pt-BR"),
    ("Portuguese (Mozambique)", "pt-MZ"),
    ("Portuguese (Portugal)", "pt-PT"),
    ("Romanian", "ro-RO"),
    ("Russian", "ru-RU"),
    ("Slovak", "sk-SK"),
    ("Slovenian", "sl-SI"),
    ("Spanish", "es"),
    ("Swedish", "sv"),
    ("Tagalog", "tl-PH"),
    ("Tamil", "ta-IN"),
    ("Ukrainian", "uk-UA"),
];

/// Table spelling of `code`, matched case-insensitively.
pub fn canonical_code(code: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(_, c)| c.eq_ignore_ascii_case(code))
        .map(|(_, c)| *c)
}
