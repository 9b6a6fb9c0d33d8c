//! ISO 639 language-code normalization (alpha-2 <-> alpha-3 <-> display name).
//!
//! Mirrors the single responsibility the original `es_translator.alpha`
//! module has: total, pure conversions over a fixed table, failing cleanly
//! on anything outside it.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::error::CoreError;

/// `(alpha-2, alpha-3, English name)`. Not the full ISO 639-3 set — just the
/// languages Apertium and Argos actually ship pairs for, plus the common
/// majors. Extend as new pairs are needed.
const LANGUAGES: &[(&str, &str, &str)] = &[
    ("en", "eng", "English"),
    ("es", "spa", "Spanish"),
    ("pt", "por", "Portuguese"),
    ("ca", "cat", "Catalan"),
    ("fr", "fra", "French"),
    ("de", "deu", "German"),
    ("it", "ita", "Italian"),
    ("nl", "nld", "Dutch"),
    ("oc", "oci", "Occitan"),
    ("eu", "eus", "Basque"),
    ("gl", "glg", "Galician"),
    ("ro", "ron", "Romanian"),
    ("sv", "swe", "Swedish"),
    ("da", "dan", "Danish"),
    ("nb", "nob", "Norwegian Bokmal"),
    ("pl", "pol", "Polish"),
    ("ru", "rus", "Russian"),
    ("uk", "ukr", "Ukrainian"),
    ("cy", "cym", "Welsh"),
    ("ga", "gle", "Irish"),
    ("mt", "mlt", "Maltese"),
    ("is", "isl", "Icelandic"),
    ("af", "afr", "Afrikaans"),
    ("sq", "sqi", "Albanian"),
    ("hy", "hye", "Armenian"),
    ("ast", "ast", "Asturian"),
    ("bg", "bul", "Bulgarian"),
    ("hr", "hrv", "Croatian"),
    ("cs", "ces", "Czech"),
    ("eo", "epo", "Esperanto"),
    ("fi", "fin", "Finnish"),
    ("el", "ell", "Greek"),
    ("he", "heb", "Hebrew"),
    ("hi", "hin", "Hindi"),
    ("hu", "hun", "Hungarian"),
    ("id", "ind", "Indonesian"),
    ("ja", "jpn", "Japanese"),
    ("ko", "kor", "Korean"),
    ("lv", "lav", "Latvian"),
    ("lt", "lit", "Lithuanian"),
    ("mk", "mkd", "Macedonian"),
    ("ms", "msa", "Malay"),
    ("fa", "fas", "Persian"),
    ("sr", "srp", "Serbian"),
    ("sk", "slk", "Slovak"),
    ("sl", "slv", "Slovenian"),
    ("th", "tha", "Thai"),
    ("tr", "tur", "Turkish"),
    ("vi", "vie", "Vietnamese"),
    ("zh", "zho", "Chinese"),
    ("ar", "ara", "Arabic"),
    ("br", "bre", "Breton"),
    ("kk", "kaz", "Kazakh"),
    ("tt", "tat", "Tatar"),
    ("ky", "kir", "Kyrgyz"),
    ("uz", "uzb", "Uzbek"),
    ("nn", "nno", "Norwegian Nynorsk"),
];

static ALPHA2_TO_ALPHA3: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| LANGUAGES.iter().map(|(a2, a3, _)| (*a2, *a3)).collect());

static ALPHA3_TO_ALPHA2: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| LANGUAGES.iter().map(|(a2, a3, _)| (*a3, *a2)).collect());

static ALPHA2_TO_NAME: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| LANGUAGES.iter().map(|(a2, _, name)| (*a2, *name)).collect());

/// Normalizes `code` to its alpha-2 form. Accepts alpha-2 input unchanged.
pub fn to_alpha_2(code: &str) -> Result<String, CoreError> {
    let code = code.trim().to_lowercase();
    match code.len() {
        2 => {
            if ALPHA2_TO_ALPHA3.contains_key(code.as_str()) {
                Ok(code)
            } else {
                Err(CoreError::InvalidLanguageCode(code))
            }
        }
        3 => ALPHA3_TO_ALPHA2
            .get(code.as_str())
            .map(|s| s.to_string())
            .ok_or(CoreError::InvalidLanguageCode(code)),
        _ => Err(CoreError::InvalidLanguageCode(code)),
    }
}

/// Normalizes `code` to its alpha-3 form. Accepts alpha-3 input unchanged.
pub fn to_alpha_3(code: &str) -> Result<String, CoreError> {
    let code = code.trim().to_lowercase();
    match code.len() {
        3 => {
            if ALPHA3_TO_ALPHA2.contains_key(code.as_str()) {
                Ok(code)
            } else {
                Err(CoreError::InvalidLanguageCode(code))
            }
        }
        2 => ALPHA2_TO_ALPHA3
            .get(code.as_str())
            .map(|s| s.to_string())
            .ok_or(CoreError::InvalidLanguageCode(code)),
        _ => Err(CoreError::InvalidLanguageCode(code)),
    }
}

/// Display name for an alpha-2 code, e.g. used to build translation records.
pub fn to_name(alpha_2: &str) -> Result<String, CoreError> {
    let alpha_2 = to_alpha_2(alpha_2)?;
    ALPHA2_TO_NAME
        .get(alpha_2.as_str())
        .map(|s| s.to_string())
        .ok_or(CoreError::InvalidLanguageCode(alpha_2))
}

/// Maps both sides of a `"src-tgt"` pair string through [`to_alpha_3`].
pub fn to_alpha_3_pair(pair: &str) -> Result<String, CoreError> {
    let (src, tgt) = pair
        .split_once('-')
        .ok_or_else(|| CoreError::InvalidLanguageCode(pair.to_string()))?;
    Ok(format!("{}-{}", to_alpha_3(src)?, to_alpha_3(tgt)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha2_alpha3_roundtrip() {
        assert_eq!(to_alpha_2(&to_alpha_3("en").unwrap()).unwrap(), "en");
        assert_eq!(to_alpha_3(&to_alpha_2("eng").unwrap()).unwrap(), "eng");
    }

    #[test]
    fn alpha2_passthrough() {
        assert_eq!(to_alpha_2("es").unwrap(), "es");
        assert_eq!(to_alpha_3("spa").unwrap(), "spa");
    }

    #[test]
    fn unknown_code_is_invalid() {
        assert!(matches!(
            to_alpha_2("xx"),
            Err(CoreError::InvalidLanguageCode(_))
        ));
        assert!(matches!(
            to_alpha_3("zzz"),
            Err(CoreError::InvalidLanguageCode(_))
        ));
    }

    #[test]
    fn pair_roundtrip_idempotent() {
        let once = to_alpha_3_pair("en-es").unwrap();
        let twice = to_alpha_3_pair(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once, "eng-spa");
    }

    #[test]
    fn name_is_uppercased_by_caller_not_here() {
        assert_eq!(to_name("en").unwrap(), "English");
    }
}
