// Recognized name suffixes, compared with punctuation ignored ("Jr." == "jr").
const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "v", "phd", "md", "esq"];

/// Split a display name into (first, last). Trailing suffixes are stripped as
/// long as a name remains; everything after the first token stays with the
/// surname, so middle names and particles like "van" or "de la" end up in the
/// family name. Single-token names have no last name.
pub fn split_full_name(full: &str) -> Option<(String, Option<String>)> {
    let mut tokens: Vec<&str> = full.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    while tokens.len() > 1 && NAME_SUFFIXES.contains(&norm_token(tokens[tokens.len() - 1]).as_str())
    {
        tokens.pop();
    }

    let first = tokens[0].to_string();
    if tokens.len() == 1 {
        return Some((first, None));
    }
    Some((first, Some(tokens[1..].join(" "))))
}

/// The canonical matching key for person names: lowercase, punctuation
/// replaced with whitespace, runs of whitespace collapsed. Accents are kept,
/// so names differing only in diacritics stay distinct.
pub fn canonical_full_name(s: &str) -> String {
    let spaced: String = s
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect();
    spaced
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn norm_token(token: &str) -> String {
    token
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{canonical_full_name, split_full_name};

    #[test]
    fn two_tokens_split_cleanly() {
        assert_eq!(
            split_full_name("Cristiano Ronaldo"),
            Some(("Cristiano".to_string(), Some("Ronaldo".to_string())))
        );
    }

    #[test]
    fn single_token_has_no_last_name() {
        assert_eq!(split_full_name("Pelé"), Some(("Pelé".to_string(), None)));
    }

    #[test]
    fn suffix_is_stripped() {
        assert_eq!(
            split_full_name("Jürgen Klopp Jr"),
            Some(("Jürgen".to_string(), Some("Klopp".to_string())))
        );
        assert_eq!(
            split_full_name("Ken Griffey Jr."),
            Some(("Ken".to_string(), Some("Griffey".to_string())))
        );
    }

    #[test]
    fn particle_stays_with_surname() {
        assert_eq!(
            split_full_name("Ludwig van Beethoven"),
            Some(("Ludwig".to_string(), Some("van Beethoven".to_string())))
        );
    }

    #[test]
    fn middle_names_fold_into_surname() {
        assert_eq!(
            split_full_name("John A. Smith"),
            Some(("John".to_string(), Some("A. Smith".to_string())))
        );
    }

    #[test]
    fn suffix_alone_survives_as_first_name() {
        assert_eq!(split_full_name("Jr"), Some(("Jr".to_string(), None)));
    }

    #[test]
    fn empty_input_does_not_split() {
        assert_eq!(split_full_name("   "), None);
    }

    #[test]
    fn canonical_form_drops_punctuation_and_case() {
        assert_eq!(canonical_full_name("John A. Smith"), "john a smith");
        assert_eq!(canonical_full_name("O'Neill, Martin"), "o neill martin");
        assert_eq!(canonical_full_name("José Mourinho"), "josé mourinho");
    }
}
