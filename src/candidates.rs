use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

// Feed names that only match warehouse reference rows under another label.
// Plain data: extend here, no code changes needed.
const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("republic of ireland", "ireland"),
    ("cote d'ivoire", "ivory coast"),
    ("korea republic", "south korea"),
];

/// Lookup variants for a free-text label, ordered and deduplicated. The first
/// entry is always the lowercase, whitespace-collapsed original. Empty or
/// blank input yields an empty set, meaning no match was attempted.
pub fn candidate_names(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut out: Vec<String> = Vec::new();
    push_shape_variants(&mut out, trimmed);

    // Punctuation stripped, hyphens kept.
    let no_punct: String = trimmed
        .chars()
        .filter(|ch| ch.is_alphanumeric() || ch.is_whitespace() || *ch == '-')
        .collect();
    push_shape_variants(&mut out, &no_punct);

    // Accent-folded, alone and combined with the punctuation strip.
    let folded = fold_accents(trimmed);
    push_shape_variants(&mut out, &folded);
    let folded_no_punct = fold_accents(&no_punct);
    push_shape_variants(&mut out, &folded_no_punct);

    let alias_key = normalize_label(&fold_accents(trimmed).replace('-', " "));
    for (needle, alias) in COUNTRY_ALIASES {
        if alias_key.contains(needle) {
            push_shape_variants(&mut out, alias);
        }
    }

    out
}

/// Lowercase and collapse runs of whitespace.
pub fn normalize_label(s: &str) -> String {
    s.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn fold_accents(s: &str) -> String {
    s.nfkd().filter(|ch| !is_combining_mark(*ch)).collect()
}

fn push_shape_variants(out: &mut Vec<String>, s: &str) {
    let base = normalize_label(s);
    if base.is_empty() {
        return;
    }
    let spaced = normalize_label(&base.replace('-', " "));
    let hyphenated = base.replace(' ', "-");
    push_unique(out, base);
    push_unique(out, spaced);
    push_unique(out, hyphenated);
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !value.is_empty() && !out.iter().any(|existing| existing == &value) {
        out.push(value);
    }
}
