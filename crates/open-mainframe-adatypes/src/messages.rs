//! ADG message catalog.
//!
//! English messages are the `Display` text of [`AdaError`](crate::AdaError).
//! Other locales come from TOML catalogs embedded at build time and are
//! parsed once per process.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Embedded catalogs: (locale, TOML source).
const CATALOGS: &[(&str, &str)] = &[("de", include_str!("../messages/de.toml"))];

static LOCALES: LazyLock<HashMap<&'static str, HashMap<String, String>>> = LazyLock::new(|| {
    let mut locales = HashMap::new();
    for (locale, source) in CATALOGS {
        match toml::from_str::<HashMap<String, String>>(source) {
            Ok(messages) => {
                tracing::debug!(locale = %locale, count = messages.len(), "loaded message catalog");
                locales.insert(*locale, messages);
            }
            Err(e) => {
                tracing::warn!(locale = %locale, error = %e, "message catalog not loadable");
            }
        }
    }
    locales
});

/// Render a numeric code as `ADG%07d`.
pub fn code_string(code: u32) -> String {
    format!("ADG{code:07}")
}

/// Look up the message for `code` in `locale` and substitute `{n}` placeholders.
///
/// Returns `None` when the locale or the code has no catalog entry.
pub fn translate(locale: &str, code: u32, args: &[String]) -> Option<String> {
    let template = LOCALES.get(locale)?.get(&code_string(code))?;
    let mut message = template.clone();
    for (i, arg) in args.iter().enumerate() {
        message = message.replace(&format!("{{{i}}}"), arg);
    }
    Some(message)
}

/// Locales with a loaded catalog.
pub fn locales() -> Vec<&'static str> {
    let mut list: Vec<&'static str> = LOCALES.keys().copied().collect();
    list.sort_unstable();
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AdaError;

    #[test]
    fn test_code_string() {
        assert_eq!(code_string(41), "ADG0000041");
        assert_eq!(code_string(1234567), "ADG1234567");
    }

    #[test]
    fn test_translate_german() {
        let msg = translate("de", 41, &["CC".to_string()]);
        assert_eq!(
            msg.as_deref(),
            Some("Feld CC nicht in der Dateidefinition gefunden")
        );
        assert!(locales().contains(&"de"));
    }

    #[test]
    fn test_unknown_locale_falls_back() {
        assert!(translate("fr", 41, &[]).is_none());
        let err = AdaError::FieldNotFound { name: "CC".into() };
        assert_eq!(
            err.localized("fr"),
            "ADG0000041: no field CC found in file definition"
        );
    }

    #[test]
    fn test_localized_with_arguments() {
        let err = AdaError::RangeOverflow {
            name: "PA".into(),
            value: "123".into(),
            length: 1,
        };
        assert_eq!(
            err.localized("de"),
            "ADG0000057: Wert 123 passt nicht in Feld 'PA' der Länge 1"
        );
    }
}
