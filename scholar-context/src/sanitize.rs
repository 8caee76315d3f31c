//! Text sanitization for extracted document text.
//!
//! Text pulled out of PDFs routinely carries ligatures, subscripts, soft
//! hyphens, stray control bytes from broken font encodings and other
//! sequences that tokenizers choke on. [`sanitize`] reduces any input to a
//! printable-ASCII subset with single spaces, or `None` if nothing printable
//! is left.
//!
//! The steps are applied in this order:
//!
//! 1. decode (bytes only): invalid UTF-8 sequences are dropped
//! 2. NFKD compatibility normalization (`ﬁ` → `fi`, `é` → `e` + combining accent)
//! 3. C0/C1 control characters become spaces
//! 4. anything that is neither printable ASCII nor whitespace becomes a space
//! 5. whitespace runs collapse to one space and the ends are trimmed
//!
//! ```
//! use scholar_context::sanitize::sanitize;
//!
//! assert_eq!(sanitize("Caf\u{e9}\u{0}  au   lait\n"), Some("Cafe au lait".to_string()));
//! assert_eq!(sanitize("\u{1}\u{2}\u{4e2d}"), None);
//! ```

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static CONTROL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x1F\x7F-\x9F]").unwrap());

static NON_PRINTABLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^ -~\s]").unwrap());

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Sanitize text into printable ASCII with single spaces.
///
/// Returns `None` when the cleaned result is empty.
pub fn sanitize(text: &str) -> Option<String> {
    let normalized: String = text.nfkd().collect();
    let without_controls = CONTROL_CHARS.replace_all(&normalized, " ");
    let printable = NON_PRINTABLE.replace_all(&without_controls, " ");
    let collapsed = WHITESPACE_RUN.replace_all(&printable, " ");

    let cleaned = collapsed.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Sanitize raw bytes, dropping any invalid UTF-8 sequences before cleaning.
pub fn sanitize_bytes(bytes: &[u8]) -> Option<String> {
    let decoded: String = bytes.utf8_chunks().map(|chunk| chunk.valid()).collect();
    sanitize(&decoded)
}

/// Whether `text` already satisfies the output contract of [`sanitize`].
///
/// Used as a last check before text is handed to an embedding model.
pub fn is_clean(text: &str) -> bool {
    !text.is_empty()
        && text.bytes().all(|b| (b' '..=b'~').contains(&b))
        && !text.starts_with(' ')
        && !text.ends_with(' ')
        && !text.contains("  ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unprintable_input_is_none() {
        assert_eq!(sanitize(""), None);
        assert_eq!(sanitize("   \n\t  "), None);
        assert_eq!(sanitize("\u{0}\u{1}\u{1b}\u{7f}\u{85}\u{9f}"), None);
        assert_eq!(sanitize("\u{4e2d}\u{6587}\u{1f600}"), None);
        assert_eq!(sanitize("\u{200b}\u{feff}\u{3000}"), None);
    }

    #[test]
    fn test_mixed_input_is_printable_ascii() {
        let inputs = [
            "  Neural\u{0}networks\u{7}   approximate\r\n\tfunctions.  ",
            "\u{fb01}rst-order \u{2014} logic\u{2122}",
            "H\u{2082}O and x\u{b2} \u{2265} 0",
            "na\u{ef}ve r\u{e9}sum\u{e9} \u{1f600} end",
        ];

        for input in inputs {
            let cleaned = sanitize(input).expect("printable content should survive");
            assert!(cleaned.bytes().all(|b| (b' '..=b'~').contains(&b)), "{cleaned:?}");
            assert!(!cleaned.contains("  "), "{cleaned:?}");
            assert_eq!(cleaned, cleaned.trim());
            assert!(is_clean(&cleaned));
        }
    }

    #[test]
    fn test_compatibility_normalization() {
        assert_eq!(sanitize("\u{fb01}nal"), Some("final".to_string()));
        assert_eq!(sanitize("caf\u{e9}"), Some("cafe".to_string()));
        assert_eq!(sanitize("H\u{2082}O"), Some("H2O".to_string()));
        assert_eq!(sanitize("x\u{a0}y"), Some("x y".to_string()));
    }

    #[test]
    fn test_control_characters_split_words() {
        assert_eq!(sanitize("one\u{0}two"), Some("one two".to_string()));
        assert_eq!(sanitize("one\u{1b}[0mtwo"), Some("one [0mtwo".to_string()));
    }

    #[test]
    fn test_clean_text_is_unchanged() {
        let clean = "Neural networks approximate functions.";
        assert_eq!(sanitize(clean).as_deref(), Some(clean));

        let spaced = "Neural   networks\n\napproximate functions.";
        assert_eq!(sanitize(spaced).as_deref(), Some(clean));

        // Sanitizing twice changes nothing.
        let once = sanitize("R\u{e9}seaux \u{2013} neuronaux\u{0}").unwrap();
        assert_eq!(sanitize(&once), Some(once.clone()));
    }

    #[test]
    fn test_sanitize_bytes_drops_invalid_utf8() {
        assert_eq!(sanitize_bytes(b"ab\xffcd"), Some("abcd".to_string()));
        // Decomposed accents leave a gap where the combining mark was.
        assert_eq!(sanitize_bytes(b"\xc3\xa9t\xc3\xa9"), Some("e te".to_string()));
        assert_eq!(sanitize_bytes(b"\xff\xfe\x00"), None);
    }

    #[test]
    fn test_is_clean() {
        assert!(is_clean("plain ascii text"));
        assert!(!is_clean(""));
        assert!(!is_clean(" leading"));
        assert!(!is_clean("trailing "));
        assert!(!is_clean("double  space"));
        assert!(!is_clean("tab\there"));
        assert!(!is_clean("caf\u{e9}"));
    }
}
