use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Makes a client-supplied filename safe to embed in a storage key.
///
/// The name is decomposed into Unicode Normalization Form D, combining marks
/// are dropped, every character outside `[A-Za-z0-9._-]` becomes `_`, and
/// leading dots are removed. Returns `None` if nothing is left.
///
/// ```
/// use petransport::normalization::sanitize_filename;
/// assert_eq!(sanitize_filename("Cartão de vacina.pdf").as_deref(), Some("Cartao_de_vacina.pdf"));
/// assert_eq!(sanitize_filename("..."), None);
/// ```
pub fn sanitize_filename(name: impl AsRef<str>) -> Option<String> {
    let replaced: String = name
        .as_ref()
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = replaced.trim_start_matches('.');

    if sanitized.is_empty() {
        None
    } else {
        Some(sanitized.to_owned())
    }
}
